//! Tag Repository Module
//!
//! This module provides tag repository functionality split into specialized sub-modules:
//! - tag_repo: Core CRUD operations and listing
//! - group_tag: Group-Tag relationship operations
//! - image_tag: Image-Tag relationship operations

mod tag_repo;
mod group_tag;
mod image_tag;

pub use tag_repo::{TagRepository, TagRow};

// Re-export all operation traits so they can be used by importing TagRepository
pub use group_tag::GroupTagOperations;
pub use image_tag::ImageTagOperations;
