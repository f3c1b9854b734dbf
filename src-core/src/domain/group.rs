//! Group Entity
//!
//! Groups organize tags (e.g. one group per game or franchise).

use serde::{Deserialize, Serialize};
use super::entity::{Entity, RecordId};

/// A named tag group with a user-defined sort position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier
    #[serde(default, alias = "$loki")]
    pub id: RecordId,
    /// Group name (unique)
    pub name: String,
    /// Sort position, unset until the user reorders groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

impl Group {
    pub fn new(id: RecordId, name: String) -> Self {
        Self {
            id,
            name,
            index: None,
        }
    }
}

impl Entity for Group {
    type Id = RecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// One entry of a bulk reorder request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupOrder {
    #[serde(alias = "$loki")]
    pub id: RecordId,
    pub index: i64,
}
