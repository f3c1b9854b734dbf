//! Tag Entity
//!
//! Tags are attached to images and optionally grouped.
//! Group and image links live in separate join collections.

use serde::{Deserialize, Serialize};
use super::entity::{Entity, RecordId};

/// A tag for categorizing images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier
    #[serde(default, alias = "$loki")]
    pub id: RecordId,
    /// Tag name (unique)
    pub name: String,
}

impl Tag {
    pub fn new(id: RecordId, name: String) -> Self {
        Self { id, name }
    }
}

impl Entity for Tag {
    type Id = RecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A tag as referenced by an image request: either an existing record or a bare name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Existing(Tag),
    Name(String),
}

impl TagRef {
    pub fn name(&self) -> &str {
        match self {
            TagRef::Existing(tag) => &tag.name,
            TagRef::Name(name) => name,
        }
    }
}

impl From<&str> for TagRef {
    fn from(name: &str) -> Self {
        TagRef::Name(name.to_string())
    }
}

/// Join table entry for group-tag relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTag {
    #[serde(default)]
    pub id: RecordId,
    pub group_id: RecordId,
    pub tag_id: RecordId,
}

impl Entity for GroupTag {
    type Id = RecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Join table entry for image-tag relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTag {
    #[serde(default)]
    pub id: RecordId,
    pub image_id: RecordId,
    pub tag_id: RecordId,
}

impl Entity for ImageTag {
    type Id = RecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
