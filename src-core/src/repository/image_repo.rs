//! Image Repository
//!
//! Card image records, their tag links and the multi-tag listing query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult, Image, ModFile, RecordId, Tag, TagRef};
use super::db::Database;
use super::query::{self, ListQuery, Page, SortBy};
use super::traits::Repository;

/// An image as listed, optionally with its tags joined in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRow {
    #[serde(flatten)]
    pub image: Image,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

/// Editable fields of an image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageChanges {
    pub name: String,
    pub remark: String,
    pub mods: Vec<ModFile>,
}

/// Image paths must stay relative to the managed asset root
pub fn ensure_relative(path: &str) -> DomainResult<()> {
    let p = Path::new(path);
    let rooted = p
        .components()
        .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
    if path.trim().is_empty() || rooted {
        return Err(DomainError::InvalidInput(format!(
            "image path must be relative to the asset root: {}",
            path
        )));
    }
    Ok(())
}

/// `repo/<file name>` form of a stored path, if it differs
fn normalized_path(path: &str, repo_dir: &str) -> Option<String> {
    let file_name = path.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())?;
    let normalized = format!("{}/{}", repo_dir, file_name);
    (normalized != path).then_some(normalized)
}

/// Store-backed implementation of Image repository
pub struct ImageRepository {
    db: Arc<Mutex<Database>>,
}

impl ImageRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Newest first
    pub fn default_sort() -> Vec<SortBy> {
        vec![SortBy::desc("id")]
    }

    /// Page through images, keeping only those carrying every tag in `search_tags`
    pub async fn page(
        &self,
        query: ListQuery,
        search_tags: &[String],
        join_tags: bool,
    ) -> DomainResult<Page<ImageRow>> {
        let db = self.db.lock().await;

        let query = if search_tags.is_empty() {
            query
        } else {
            let ids = db.images_with_all_tags(search_tags);
            if ids.is_empty() {
                query.page.offset()?;
                return Ok(Page::empty());
            }
            query.with_ids(ids)
        };

        let page = query::paginate(&db.images, &query)?;
        Ok(page.map(|image| ImageRow {
            tags: join_tags.then(|| db.tags_for_image(image.id)),
            image,
        }))
    }

    pub async fn find_row(&self, id: RecordId, join_tags: bool) -> DomainResult<ImageRow> {
        let db = self.db.lock().await;
        let image = db
            .images
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("image", id))?;
        Ok(ImageRow {
            tags: join_tags.then(|| db.tags_for_image(id)),
            image,
        })
    }

    /// Insert an image and link its tags, creating unknown tag names
    pub async fn create_with_tags(&self, image: Image, tags: &[TagRef]) -> DomainResult<ImageRow> {
        ensure_relative(&image.path)?;
        let mut db = self.db.lock().await;
        let image = db.images.insert(Image { id: 0, ..image })?;
        let tags = db.replace_image_tags(image.id, tags)?;
        Ok(ImageRow {
            image,
            tags: Some(tags),
        })
    }

    /// Rewrite the editable fields and replace the tag links
    pub async fn update_with_tags(
        &self,
        id: RecordId,
        changes: ImageChanges,
        tags: &[TagRef],
    ) -> DomainResult<ImageRow> {
        let mut db = self.db.lock().await;
        let image = db.images.update(id, |image| {
            image.name = changes.name;
            image.remark = changes.remark;
            image.mods = changes.mods;
        })?;
        let tags = db.replace_image_tags(id, tags)?;
        Ok(ImageRow {
            image,
            tags: Some(tags),
        })
    }

    /// Bump the use counter; returns the new count
    pub async fn increment_use_count(&self, id: RecordId) -> DomainResult<u64> {
        let mut db = self.db.lock().await;
        let image = db.images.update(id, |image| {
            image.record_use();
        })?;
        Ok(image.use_count.unwrap_or(0))
    }

    /// Rewrite every stored path to `<repo_dir>/<file name>`
    ///
    /// Returns the number of records changed.
    pub async fn normalize_paths(&self, repo_dir: &str) -> DomainResult<usize> {
        let mut db = self.db.lock().await;
        let changes: Vec<(RecordId, String)> = db
            .images
            .iter()
            .filter_map(|image| normalized_path(&image.path, repo_dir).map(|p| (image.id, p)))
            .collect();
        for (id, path) in &changes {
            db.images.update(*id, |image| image.path = path.clone())?;
        }
        Ok(changes.len())
    }
}

#[async_trait]
impl Repository<Image> for ImageRepository {
    async fn create(&self, entity: &Image) -> DomainResult<Image> {
        ensure_relative(&entity.path)?;
        let mut db = self.db.lock().await;
        db.images.insert(Image {
            id: 0,
            ..entity.clone()
        })
    }

    async fn find_by_id(&self, id: RecordId) -> DomainResult<Option<Image>> {
        let db = self.db.lock().await;
        Ok(db.images.get(id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<Image>> {
        let db = self.db.lock().await;
        Ok(db.images.iter().cloned().collect())
    }

    async fn update(&self, entity: &Image) -> DomainResult<Image> {
        ensure_relative(&entity.path)?;
        let mut db = self.db.lock().await;
        db.images.update(entity.id, |image| *image = entity.clone())
    }

    async fn delete(&self, id: RecordId) -> DomainResult<()> {
        let mut db = self.db.lock().await;
        if db.images.remove(id).is_none() {
            return Err(DomainError::not_found("image", id));
        }
        db.unlink_by_image(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_relative() {
        assert!(ensure_relative("repo/hdb_1_2.png").is_ok());
        assert!(ensure_relative("/tmp/a.png").is_err());
        assert!(ensure_relative("").is_err());
    }

    #[test]
    fn test_normalized_path() {
        assert_eq!(normalized_path("C:\\cards\\a.png", "repo"), Some("repo/a.png".into()));
        assert_eq!(normalized_path("/old/root/repo/b.png", "repo"), Some("repo/b.png".into()));
        assert_eq!(normalized_path("repo/c.png", "repo"), None);
    }
}
