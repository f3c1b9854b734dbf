//! Card Folder Scanner
//!
//! Finds `.png` cards below dropped folders and derives tags from the
//! directories they sit in.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// A card found on disk, ready to be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedCard {
    pub path: String,
    /// The scanned folder this card was found under
    pub folder_path: String,
    /// File stem
    pub name: String,
    pub size: u64,
    /// Directory names from the scanned folder down to the card
    pub tags: Vec<String>,
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

/// Directory components between the folder's parent and the file's directory
fn tags_for(folder: &Path, file: &Path) -> Vec<String> {
    let base = folder.parent().unwrap_or(folder);
    file.parent()
        .and_then(|dir| dir.strip_prefix(base).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Walk every folder recursively and collect its cards
///
/// Entries that are not directories are skipped, as are unreadable entries.
pub fn scan_card_folders(folders: &[PathBuf]) -> Vec<ScannedCard> {
    let mut cards = Vec::new();
    for folder in folders {
        if !folder.is_dir() {
            log::warn!("Not a folder, skipped: {}", folder.display());
            continue;
        }

        let walker = WalkDir::new(folder)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    log::warn!("Scan error under {}: {}", folder.display(), e);
                    None
                }
            });

        for entry in walker {
            if !entry.file_type().is_file() || !is_png(entry.path()) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            cards.push(ScannedCard {
                path: entry.path().to_string_lossy().into_owned(),
                folder_path: folder.to_string_lossy().into_owned(),
                name: entry
                    .path()
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size,
                tags: tags_for(folder, entry.path()),
            });
        }
    }
    log::info!("Scanned {} folders, found {} cards", folders.len(), cards.len());
    cards
}
