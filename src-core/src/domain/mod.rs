//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has NO external dependencies (except serde and thiserror).

mod entity;
mod group;
mod tag;
mod image;

pub use entity::{Entity, RecordId, DomainError, DomainResult};
pub use group::{Group, GroupOrder};
pub use tag::{Tag, TagRef, GroupTag, ImageTag};
pub use image::{Image, ModFile};
