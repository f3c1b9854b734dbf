//! Asset Layer
//!
//! Card images live under `<root>/repo` and are referenced by paths relative
//! to the root. Mods are installed into the game's mod folder.

mod relocate;
mod scan;

pub use relocate::{install_mods, MOD_SUBDIR};
pub use scan::{scan_card_folders, ScannedCard};

use std::path::{Path, PathBuf};

/// Subdirectory of the asset root that holds imported cards
pub const REPO_DIR: &str = "repo";

/// The managed asset root
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.root.join(REPO_DIR)
    }

    /// Absolute location of a stored path; absolute inputs are returned as is
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let store = AssetStore::new("/data/haremdb");
        assert_eq!(store.resolve("repo/a.png"), PathBuf::from("/data/haremdb/repo/a.png"));
        assert_eq!(store.resolve("/elsewhere/b.png"), PathBuf::from("/elsewhere/b.png"));
        assert_eq!(store.repo_dir(), PathBuf::from("/data/haremdb/repo"));
    }
}
