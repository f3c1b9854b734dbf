//! Group Repository
//!
//! Handles all group-related store operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult, Group, GroupOrder, RecordId, Tag};
use super::db::Database;
use super::query::{self, ListQuery, Page, SortBy};
use super::traits::Repository;

/// A group as listed, optionally with its tags joined in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    #[serde(flatten)]
    pub group: Group,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

/// Store-backed implementation of Group repository
pub struct GroupRepository {
    db: Arc<Mutex<Database>>,
}

impl GroupRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// User-defined order first
    pub fn default_sort() -> Vec<SortBy> {
        vec![SortBy::asc("index")]
    }

    pub async fn page(&self, query: &ListQuery, join_tags: bool) -> DomainResult<Page<GroupRow>> {
        let db = self.db.lock().await;
        let page = query::paginate(&db.groups, query)?;
        Ok(page.map(|group| GroupRow {
            tags: join_tags.then(|| db.tags_for_group(group.id)),
            group,
        }))
    }

    pub async fn rename(&self, id: RecordId, name: &str) -> DomainResult<Group> {
        let mut db = self.db.lock().await;
        db.groups.update(id, |group| group.name = name.to_string())
    }

    /// Apply new sort positions; ids that no longer exist are skipped
    ///
    /// Returns the number of groups updated.
    pub async fn reorder(&self, orders: &[GroupOrder]) -> DomainResult<usize> {
        let mut db = self.db.lock().await;
        let mut updated = 0;
        for order in orders {
            if !db.groups.contains(order.id) {
                log::warn!("Reorder skipped unknown group {}", order.id);
                continue;
            }
            db.groups.update(order.id, |group| group.index = Some(order.index))?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Delete a group and its links
    ///
    /// With `cascade_tags`, tags that belonged to this group only are deleted
    /// as well. Returns the number of tags deleted.
    pub async fn delete_with_tags(&self, id: RecordId, cascade_tags: bool) -> DomainResult<usize> {
        let mut db = self.db.lock().await;
        if db.groups.remove(id).is_none() {
            return Err(DomainError::not_found("group", id));
        }

        let orphaned: Vec<RecordId> = if cascade_tags {
            db.tags_for_group(id)
                .into_iter()
                .filter(|tag| db.groups_for_tag(tag.id).is_empty())
                .map(|tag| tag.id)
                .collect()
        } else {
            Vec::new()
        };

        db.unlink_by_group(id);
        let removed = db.cascade_delete_tags(&orphaned);
        log::info!("Deleted group {} ({} tags removed)", id, removed);
        Ok(removed)
    }
}

#[async_trait]
impl Repository<Group> for GroupRepository {
    async fn create(&self, entity: &Group) -> DomainResult<Group> {
        let mut db = self.db.lock().await;
        db.groups.insert(Group {
            id: 0,
            name: entity.name.clone(),
            index: entity.index,
        })
    }

    async fn find_by_id(&self, id: RecordId) -> DomainResult<Option<Group>> {
        let db = self.db.lock().await;
        Ok(db.groups.get(id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<Group>> {
        let db = self.db.lock().await;
        let sort = Self::default_sort();
        let mut groups: Vec<Group> = db.groups.iter().cloned().collect();
        groups.sort_by(|a, b| query::compare_by(a, b, &sort));
        Ok(groups)
    }

    async fn update(&self, entity: &Group) -> DomainResult<Group> {
        let mut db = self.db.lock().await;
        db.groups.update(entity.id, |group| {
            group.name = entity.name.clone();
            group.index = entity.index;
        })
    }

    async fn delete(&self, id: RecordId) -> DomainResult<()> {
        self.delete_with_tags(id, false).await.map(|_| ())
    }
}
