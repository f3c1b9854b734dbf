//! Repository Layer
//!
//! Data access abstractions and implementations over the embedded
//! document store.

mod traits;
mod collection;
pub mod db;
pub mod query;
mod relations;
mod group_repo;
mod image_repo;
pub mod tag;


pub use traits::Repository;
pub use collection::{Collection, Document, FieldValue, Link, LinkKey};
pub use db::{init_db, Database, DbState};
pub use query::{ListQuery, Page, PageRequest, SortBy, SortOrder, SortSpec};
pub use group_repo::{GroupRepository, GroupRow};
pub use image_repo::{ensure_relative, ImageChanges, ImageRepository, ImageRow};
pub use tag::{GroupTagOperations, ImageTagOperations, TagRepository, TagRow};
