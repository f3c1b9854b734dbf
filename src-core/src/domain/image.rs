//! Image Entity
//!
//! A card image stored under the managed asset root, plus the game mod
//! files that belong to it.

use serde::{Deserialize, Serialize};
use super::entity::{Entity, RecordId};

/// A mod file shipped with a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModFile {
    /// File name inside the game's mod folder
    pub name: String,
    /// Installed location (source location before installation)
    pub path: String,
    /// Where the file was installed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ModFile {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            src_path: None,
            size: None,
        }
    }
}

/// A card image record
///
/// `path` is always relative to the managed asset root so the root can move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, alias = "$loki")]
    pub id: RecordId,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub mods: Vec<ModFile>,
    /// Times the card was used; unset until the first increment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_count: Option<u64>,
}

impl Image {
    pub fn new(id: RecordId, name: String, path: String) -> Self {
        Self {
            id,
            name,
            path,
            size: 0,
            remark: String::new(),
            mods: Vec::new(),
            use_count: None,
        }
    }

    /// Bump the use counter, treating an unset counter as zero
    pub fn record_use(&mut self) -> u64 {
        let next = self.use_count.unwrap_or(0) + 1;
        self.use_count = Some(next);
        next
    }
}

impl Entity for Image {
    type Id = RecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
