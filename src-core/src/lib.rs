//! HaremDB Backend
//!
//! Layered architecture:
//! - domain: Core entities and the error taxonomy
//! - repository: Embedded document store, queries and relation upkeep
//! - assets: Card and mod file relocation, folder scanning
//! - commands: Request handlers returning the response envelope

pub mod config;
pub mod domain;
pub mod repository;
pub mod assets;
pub mod commands;

use assets::AssetStore;
use config::AppConfig;
use domain::DomainResult;
use repository::{init_db, DbState, GroupRepository, ImageRepository, TagRepository};

/// Application state shared across commands
pub struct AppState {
    pub db_state: DbState,
    pub groups: GroupRepository,
    pub tags: TagRepository,
    pub images: ImageRepository,
    pub assets: AssetStore,
    pub config: AppConfig,
}

impl AppState {
    fn with_db(db_state: DbState, config: AppConfig) -> Self {
        let db = db_state.handle();
        Self {
            groups: GroupRepository::new(db.clone()),
            tags: TagRepository::new(db.clone()),
            images: ImageRepository::new(db),
            assets: AssetStore::new(config.data_root.clone()),
            db_state,
            config,
        }
    }

    /// Load the library under `config.data_root` and start autosaving it
    pub async fn open(config: AppConfig) -> DomainResult<Self> {
        tokio::fs::create_dir_all(&config.data_root).await?;
        let db_state = init_db(&config.db_path(), config.autosave_interval()).await?;
        log::info!("Library opened at {}", config.data_root.display());
        Ok(Self::with_db(db_state, config))
    }

    /// State over a store that is never written to disk
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_db(DbState::in_memory(), config)
    }

    /// Stop autosave and write pending changes
    pub async fn close(&self) -> DomainResult<()> {
        self.db_state.close().await
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
