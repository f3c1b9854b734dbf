//! Group-Tag Relationship Operations
//!
//! Operations for managing the many-to-many relationship between groups and tags.

use async_trait::async_trait;

use crate::domain::{DomainError, DomainResult, Group, RecordId, Tag};

/// Trait for group-tag relationship operations
#[async_trait]
pub trait GroupTagOperations {
    /// Add a tag to a group by name, creating the tag if it does not exist
    ///
    /// Fails with `Conflict` when the group already holds a tag of that name.
    async fn add_tag_to_group(&self, name: &str, group_id: RecordId) -> DomainResult<Tag>;

    /// Remove a tag from a group; returns whether a link was removed
    async fn remove_tag_from_group(&self, tag_id: RecordId, group_id: RecordId) -> DomainResult<bool>;

    /// Get all tags of a group
    async fn get_tags_for_group(&self, group_id: RecordId) -> DomainResult<Vec<Tag>>;

    /// Get all groups a tag belongs to
    async fn get_groups_for_tag(&self, tag_id: RecordId) -> DomainResult<Vec<Group>>;
}

#[async_trait]
impl GroupTagOperations for super::tag_repo::TagRepository {
    async fn add_tag_to_group(&self, name: &str, group_id: RecordId) -> DomainResult<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidInput("tag name is empty".into()));
        }

        let mut db = self.db.lock().await;
        if !db.groups.contains(group_id) {
            return Err(DomainError::not_found("group", group_id));
        }
        if db.tags_for_group(group_id).iter().any(|tag| tag.name == name) {
            return Err(DomainError::Conflict(format!(
                "group {} already contains tag: {}",
                group_id, name
            )));
        }

        let existing = db.tags.find_one_by("name", name).cloned();
        let tag = match existing {
            Some(tag) => tag,
            None => db.tags.insert(Tag::new(0, name.to_string()))?,
        };
        db.link_group_tag(group_id, tag.id)?;
        Ok(tag)
    }

    async fn remove_tag_from_group(&self, tag_id: RecordId, group_id: RecordId) -> DomainResult<bool> {
        let mut db = self.db.lock().await;
        Ok(db.unlink_group_tag(group_id, tag_id) > 0)
    }

    async fn get_tags_for_group(&self, group_id: RecordId) -> DomainResult<Vec<Tag>> {
        let db = self.db.lock().await;
        Ok(db.tags_for_group(group_id))
    }

    async fn get_groups_for_tag(&self, tag_id: RecordId) -> DomainResult<Vec<Group>> {
        let db = self.db.lock().await;
        Ok(db.groups_for_tag(tag_id))
    }
}
