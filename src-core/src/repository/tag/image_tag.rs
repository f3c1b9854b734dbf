//! Image-Tag Relationship Operations
//!
//! Operations for managing the many-to-many relationship between images and tags.

use async_trait::async_trait;

use crate::domain::{DomainResult, RecordId, Tag, TagRef};

/// Trait for image-tag relationship operations
#[async_trait]
pub trait ImageTagOperations {
    /// Get all tags of an image
    async fn get_tags_for_image(&self, image_id: RecordId) -> DomainResult<Vec<Tag>>;

    /// Get the ids of images carrying every named tag, ascending
    async fn get_images_with_all_tags(&self, names: &[String]) -> DomainResult<Vec<RecordId>>;

    /// Replace the image's tags, creating tags for unknown names
    async fn set_image_tags(&self, image_id: RecordId, tags: &[TagRef]) -> DomainResult<Vec<Tag>>;
}

#[async_trait]
impl ImageTagOperations for super::tag_repo::TagRepository {
    async fn get_tags_for_image(&self, image_id: RecordId) -> DomainResult<Vec<Tag>> {
        let db = self.db.lock().await;
        Ok(db.tags_for_image(image_id))
    }

    async fn get_images_with_all_tags(&self, names: &[String]) -> DomainResult<Vec<RecordId>> {
        let db = self.db.lock().await;
        let mut ids: Vec<RecordId> = db.images_with_all_tags(names).into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn set_image_tags(&self, image_id: RecordId, tags: &[TagRef]) -> DomainResult<Vec<Tag>> {
        let mut db = self.db.lock().await;
        db.replace_image_tags(image_id, tags)
    }
}
