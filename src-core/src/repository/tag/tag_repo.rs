//! Tag Repository - Core CRUD Operations
//!
//! Store-backed implementation for Tag CRUD operations.
//! Specialized operations are in separate modules:
//! - group_tag: Group-Tag relationships
//! - image_tag: Image-Tag relationships

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult, Group, RecordId, Tag};
use super::super::db::Database;
use super::super::query::{self, ListQuery, Page, SortBy};
use super::super::traits::Repository;

/// A tag as listed, optionally with its groups joined in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRow {
    #[serde(flatten)]
    pub tag: Tag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Group>>,
}

/// Store-backed implementation of Tag repository
pub struct TagRepository {
    pub(super) db: Arc<Mutex<Database>>,
}

impl TagRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Newest first
    pub fn default_sort() -> Vec<SortBy> {
        vec![SortBy::desc("id")]
    }

    pub async fn page(&self, query: &ListQuery, join_groups: bool) -> DomainResult<Page<TagRow>> {
        let db = self.db.lock().await;
        let page = query::paginate(&db.tags, query)?;
        Ok(page.map(|tag| TagRow {
            groups: join_groups.then(|| db.groups_for_tag(tag.id)),
            tag,
        }))
    }

    /// Create a tag and link it to `group_ids`
    ///
    /// Every group is checked before anything is written.
    pub async fn create_in_groups(&self, name: &str, group_ids: &[RecordId]) -> DomainResult<Tag> {
        let mut db = self.db.lock().await;
        db.ensure_groups(group_ids)?;
        let tag = db.tags.insert(Tag::new(0, name.to_string()))?;
        for group_id in group_ids {
            db.link_group_tag(*group_id, tag.id)?;
        }
        Ok(tag)
    }

    /// Rename a tag and replace all of its group links
    ///
    /// Nothing changes unless every group exists.
    pub async fn update_with_groups(&self, id: RecordId, name: &str, group_ids: &[RecordId]) -> DomainResult<Tag> {
        let mut db = self.db.lock().await;
        db.ensure_groups(group_ids)?;
        let tag = db.tags.update(id, |tag| tag.name = name.to_string())?;
        db.replace_tag_groups(id, group_ids)?;
        Ok(tag)
    }

    /// Tags not linked to any group, in id order
    pub async fn ungrouped(&self) -> DomainResult<Vec<Tag>> {
        let db = self.db.lock().await;
        Ok(db.ungrouped_tags())
    }
}

#[async_trait]
impl Repository<Tag> for TagRepository {
    async fn create(&self, entity: &Tag) -> DomainResult<Tag> {
        let mut db = self.db.lock().await;
        db.tags.insert(Tag::new(0, entity.name.clone()))
    }

    async fn find_by_id(&self, id: RecordId) -> DomainResult<Option<Tag>> {
        let db = self.db.lock().await;
        Ok(db.tags.get(id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<Tag>> {
        let db = self.db.lock().await;
        Ok(db.tags.iter().cloned().collect())
    }

    async fn update(&self, entity: &Tag) -> DomainResult<Tag> {
        let mut db = self.db.lock().await;
        db.tags.update(entity.id, |tag| tag.name = entity.name.clone())
    }

    async fn delete(&self, id: RecordId) -> DomainResult<()> {
        let mut db = self.db.lock().await;
        if !db.tags.contains(id) {
            return Err(DomainError::not_found("tag", id));
        }
        db.cascade_delete_tags(&[id]);
        Ok(())
    }
}
