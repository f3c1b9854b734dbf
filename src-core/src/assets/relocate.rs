//! File Relocation
//!
//! Brings card files into the repo directory under generated names and
//! installs mod files into the game.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::config::ImportSettings;
use crate::domain::{DomainError, DomainResult, ModFile};
use super::{AssetStore, REPO_DIR};

/// Mods are installed to `<gameRoot>/mods/haremdb/<name>`
pub const MOD_SUBDIR: [&str; 2] = ["mods", "haremdb"];

const NAME_ATTEMPTS: usize = 16;

/// `hdb_<millis>_<0..999><.ext>`
fn generated_name(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1000);
    format!("hdb_{}_{}{}", millis, suffix, extension)
}

fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Copy or move `src` to `dest`, creating parent directories
async fn transfer(src: &Path, dest: &Path, keep_source: bool) -> DomainResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if keep_source {
        tokio::fs::copy(src, dest).await?;
        return Ok(());
    }
    // rename fails across file systems
    if tokio::fs::rename(src, dest).await.is_err() {
        tokio::fs::copy(src, dest).await?;
        tokio::fs::remove_file(src).await?;
    }
    Ok(())
}

impl AssetStore {
    /// Bring a card file into the repo directory
    ///
    /// Returns the stored path relative to the root, e.g. `repo/hdb_..._42.png`.
    pub async fn import_card(&self, src: &Path, keep_source: bool) -> DomainResult<String> {
        if !tokio::fs::try_exists(src).await? {
            return Err(DomainError::NotFound(format!("card file {}", src.display())));
        }

        let extension = dotted_extension(src);
        let repo = self.repo_dir();
        let mut file_name = generated_name(&extension);
        let mut attempts = 1;
        while tokio::fs::try_exists(repo.join(&file_name)).await? {
            if attempts == NAME_ATTEMPTS {
                return Err(DomainError::Conflict(format!(
                    "no free file name in {}",
                    repo.display()
                )));
            }
            file_name = generated_name(&extension);
            attempts += 1;
        }

        transfer(src, &repo.join(&file_name), keep_source).await?;
        log::info!(
            "Card {} {} as {}",
            src.display(),
            if keep_source { "copied" } else { "moved" },
            file_name
        );
        Ok(format!("{}/{}", REPO_DIR, file_name))
    }

    /// Delete a stored card file; returns false when it was already gone
    pub async fn remove_card(&self, path: &str) -> DomainResult<bool> {
        let target = self.resolve(path);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Card file already missing: {}", target.display());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn mod_destination(game_root: &Path, name: &str) -> DomainResult<PathBuf> {
    let plain = Path::new(name).file_name().map(|f| f == name).unwrap_or(false);
    if !plain {
        return Err(DomainError::InvalidInput(format!("invalid mod file name: {}", name)));
    }
    let mut dest = game_root.to_path_buf();
    dest.extend(MOD_SUBDIR);
    Ok(dest.join(name))
}

/// Install mod files into the game
///
/// Each returned descriptor points at its installed location with `srcPath`
/// set to where it came from. A destination that already exists is left
/// untouched. Without a game root nothing is installed and the descriptors
/// are returned unchanged.
pub async fn install_mods(mods: &[ModFile], settings: &ImportSettings) -> DomainResult<Vec<ModFile>> {
    let Some(game_root) = settings.game_root.as_deref() else {
        if !mods.is_empty() {
            log::warn!("No game root configured, {} mods not installed", mods.len());
        }
        return Ok(mods.to_vec());
    };

    let mut installed = Vec::with_capacity(mods.len());
    for m in mods {
        let dest = mod_destination(game_root, &m.name)?;
        if tokio::fs::try_exists(&dest).await? {
            log::info!("Mod already installed, skipping: {}", dest.display());
        } else {
            transfer(Path::new(&m.path), &dest, settings.is_copy_file).await?;
            log::info!("Mod installed: {}", dest.display());
        }
        installed.push(ModFile {
            name: m.name.clone(),
            path: dest.to_string_lossy().into_owned(),
            src_path: Some(m.path.clone()),
            size: m.size,
        });
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_shape() {
        let name = generated_name(".png");
        let parts: Vec<&str> = name.trim_end_matches(".png").split('_').collect();
        assert_eq!(parts[0], "hdb");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u32>().unwrap() < 1000);
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_import_card_copy_and_move() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path().join("root"));
        let src = dir.path().join("card.png");
        std::fs::write(&src, b"png").unwrap();

        let copied = store.import_card(&src, true).await.unwrap();
        assert!(copied.starts_with("repo/hdb_"));
        assert!(copied.ends_with(".png"));
        assert!(src.exists());
        assert_eq!(std::fs::read(store.resolve(&copied)).unwrap(), b"png");

        let moved = store.import_card(&src, false).await.unwrap();
        assert_ne!(moved, copied);
        assert!(!src.exists());
        assert!(store.resolve(&moved).exists());
    }

    #[tokio::test]
    async fn test_import_missing_card() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path());
        let err = store.import_card(&dir.path().join("nope.png"), true).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_card() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path());
        std::fs::create_dir_all(store.repo_dir()).unwrap();
        std::fs::write(store.repo_dir().join("a.png"), b"x").unwrap();

        assert!(store.remove_card("repo/a.png").await.unwrap());
        assert!(!store.remove_card("repo/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_mods_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let game = dir.path().join("game");
        let src = dir.path().join("outfit.zipmod");
        std::fs::write(&src, b"v1").unwrap();

        let settings = ImportSettings {
            is_copy_file: true,
            game_root: Some(game.clone()),
        };
        let mods = vec![ModFile::new("outfit.zipmod", src.to_string_lossy())];

        let first = install_mods(&mods, &settings).await.unwrap();
        let dest = game.join("mods").join("haremdb").join("outfit.zipmod");
        assert_eq!(first[0].path, dest.to_string_lossy());
        assert_eq!(first[0].src_path.as_deref(), Some(&*src.to_string_lossy()));

        // a changed source does not overwrite the installed file
        std::fs::write(&src, b"v2").unwrap();
        let second = install_mods(&mods, &settings).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(std::fs::read(&dest).unwrap(), b"v1");
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_install_mods_without_game_root() {
        let mods = vec![ModFile::new("a.zipmod", "/tmp/a.zipmod")];
        let out = install_mods(&mods, &ImportSettings::default()).await.unwrap();
        assert_eq!(out, mods);
    }

    #[tokio::test]
    async fn test_mod_name_must_be_plain() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ImportSettings {
            is_copy_file: true,
            game_root: Some(dir.path().to_path_buf()),
        };
        let mods = vec![ModFile::new("../escape.zipmod", "/tmp/x")];
        assert!(matches!(
            install_mods(&mods, &settings).await,
            Err(DomainError::InvalidInput(_))
        ));
    }
}
