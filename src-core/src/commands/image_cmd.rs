//! Image Commands
//!
//! Card import, listing and editing. Imports relocate the card file and its
//! mods before the record is written.

use std::path::Path;

use serde::Deserialize;

use crate::assets::{install_mods, REPO_DIR};
use crate::config::ImportSettings;
use crate::domain::{DomainError, DomainResult, Image, ModFile, RecordId, TagRef};
use crate::repository::{
    ImageChanges, ImageRepository, ImageRow, ListQuery, Page, PageRequest, Repository, SortSpec,
};
use crate::AppState;
use super::response::Response;

/// An image as sent by the caller, with tags given by name or as records
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDescriptor {
    #[serde(default, alias = "$loki")]
    pub id: RecordId,
    pub name: String,
    /// Source file for imports; ignored on update
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub mods: Vec<ModFile>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveImageRequest {
    pub image: ImageDescriptor,
    /// Falls back to the configured settings
    #[serde(default)]
    pub settings: Option<ImportSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesRequest {
    pub current_page: usize,
    pub page_size: usize,
    #[serde(default)]
    pub sort_by: Option<SortSpec>,
    #[serde(default)]
    pub search_name: Option<String>,
    #[serde(default)]
    pub search_tags: Vec<String>,
    #[serde(default)]
    pub join_tag: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetImageRequest {
    pub image_id: RecordId,
    #[serde(default)]
    pub join_tag: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteImageRequest {
    #[serde(alias = "$loki")]
    pub id: RecordId,
    /// Card file to remove; the stored path is used when absent
    #[serde(default)]
    pub path: Option<String>,
}

fn settings_for<'a>(state: &'a AppState, requested: &'a Option<ImportSettings>) -> &'a ImportSettings {
    requested.as_ref().unwrap_or(&state.config.settings)
}

async fn import(state: &AppState, req: SaveImageRequest) -> DomainResult<ImageRow> {
    let settings = settings_for(state, &req.settings);
    let desc = req.image;
    if desc.path.trim().is_empty() {
        return Err(DomainError::InvalidInput("card source path is empty".into()));
    }

    let stored_path = state
        .assets
        .import_card(Path::new(&desc.path), settings.is_copy_file)
        .await?;

    match record_import(state, desc, stored_path.clone(), settings).await {
        Ok(row) => Ok(row),
        Err(e) if settings.is_copy_file => {
            // the source is still in place, so the copy is unreferenced
            if let Err(cleanup) = state.assets.remove_card(&stored_path).await {
                log::warn!("Could not remove {}: {}", stored_path, cleanup);
            }
            Err(e)
        }
        Err(e) => {
            log::warn!("Card was moved to {} but not recorded", stored_path);
            Err(e)
        }
    }
}

/// Install the mods of an imported card and write its record
async fn record_import(
    state: &AppState,
    desc: ImageDescriptor,
    stored_path: String,
    settings: &ImportSettings,
) -> DomainResult<ImageRow> {
    let mods = install_mods(&desc.mods, settings).await?;

    let mut image = Image::new(0, desc.name, stored_path);
    image.size = desc.size;
    image.remark = desc.remark;
    image.mods = mods;
    state.images.create_with_tags(image, &desc.tags).await
}

/// Import a card: relocate the file and mods, then store it with its tags
pub async fn add_image(state: &AppState, req: SaveImageRequest) -> Response<ImageRow> {
    Response::from_result(import(state, req).await, "Image added", "Failed to add image")
}

/// List images; `searchTags` must all be present on a returned image
pub async fn list_images(state: &AppState, req: ListImagesRequest) -> Response<Page<ImageRow>> {
    let sort = SortSpec::keys_or(req.sort_by.as_ref(), &ImageRepository::default_sort());
    let query = ListQuery::new(PageRequest::new(req.current_page, req.page_size), sort)
        .with_name(req.search_name.as_deref());
    let result = state.images.page(query, &req.search_tags, req.join_tag).await;
    Response::from_result(result, "Images listed", "Failed to list images")
}

pub async fn get_image_by_id(state: &AppState, req: GetImageRequest) -> Response<ImageRow> {
    let result = state.images.find_row(req.image_id, req.join_tag).await;
    Response::from_result(result, "Image found", "Failed to get image")
}

/// Mods the image already has are kept, new ones are installed
async fn merge_mods(existing: &[ModFile], requested: &[ModFile], settings: &ImportSettings) -> DomainResult<Vec<ModFile>> {
    let is_known = |m: &ModFile| existing.iter().any(|e| e.path == m.path);
    let fresh: Vec<ModFile> = requested.iter().filter(|m| !is_known(*m)).cloned().collect();
    let mut installed = install_mods(&fresh, settings).await?.into_iter();

    let merged = requested
        .iter()
        .map(|m| {
            if is_known(m) {
                Some(m.clone())
            } else {
                installed.next()
            }
        })
        .collect::<Option<Vec<ModFile>>>()
        .ok_or_else(|| DomainError::Internal("mod installation count mismatch".into()))?;
    Ok(merged)
}

async fn update(state: &AppState, req: SaveImageRequest) -> DomainResult<ImageRow> {
    let settings = settings_for(state, &req.settings);
    let desc = req.image;
    let current = state
        .images
        .find_by_id(desc.id)
        .await?
        .ok_or_else(|| DomainError::not_found("image", desc.id))?;

    let mods = merge_mods(&current.mods, &desc.mods, settings).await?;
    let changes = ImageChanges {
        name: desc.name,
        remark: desc.remark,
        mods,
    };
    state.images.update_with_tags(desc.id, changes, &desc.tags).await
}

/// Rewrite name, remark and mods, and replace the tags
pub async fn update_image(state: &AppState, req: SaveImageRequest) -> Response<ImageRow> {
    Response::from_result(update(state, req).await, "Image updated", "Failed to update image")
}

/// Returns the new use count
pub async fn increment_image_use_count(state: &AppState, image_id: RecordId) -> Response<u64> {
    let result = state.images.increment_use_count(image_id).await;
    Response::from_result(result, "Use count updated", "Failed to update use count")
}

async fn delete(state: &AppState, req: DeleteImageRequest) -> DomainResult<bool> {
    let stored = state.images.find_by_id(req.id).await?.map(|image| image.path);
    state.images.delete(req.id).await?;

    match req.path.or(stored) {
        Some(path) => state.assets.remove_card(&path).await,
        None => Ok(false),
    }
}

/// Remove the record, its tag links and the card file
///
/// `data` tells whether a file was deleted.
pub async fn delete_image(state: &AppState, req: DeleteImageRequest) -> Response<bool> {
    Response::from_result(delete(state, req).await, "Image deleted", "Failed to delete image")
}

/// Rewrite every stored path to `repo/<file name>`
pub async fn normalize_image_paths(state: &AppState) -> Response<usize> {
    let result = state.images.normalize_paths(REPO_DIR).await;
    Response::from_result(result, "Image paths updated", "Failed to update image paths")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::Tag;
    use crate::repository::ImageTagOperations;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        src: PathBuf,
        game: PathBuf,
        state: AppState,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("incoming");
        std::fs::create_dir_all(&src).unwrap();
        let game = dir.path().join("game");
        let state = AppState::in_memory(AppConfig::with_root(dir.path().join("root")));
        Fixture { _dir: dir, src, game, state }
    }

    impl Fixture {
        fn card(&self, name: &str) -> String {
            let path = self.src.join(format!("{}.png", name));
            std::fs::write(&path, name.as_bytes()).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn modfile(&self, name: &str) -> ModFile {
            let path = self.src.join(name);
            std::fs::write(&path, b"mod").unwrap();
            ModFile::new(name, path.to_string_lossy())
        }

        fn settings(&self) -> Option<ImportSettings> {
            Some(ImportSettings {
                is_copy_file: true,
                game_root: Some(self.game.clone()),
            })
        }

        async fn add(&self, name: &str, tags: Vec<TagRef>) -> ImageRow {
            let req = SaveImageRequest {
                image: ImageDescriptor {
                    id: 0,
                    name: name.into(),
                    path: self.card(name),
                    size: 3,
                    remark: String::new(),
                    mods: vec![],
                    tags,
                },
                settings: self.settings(),
            };
            let response = add_image(&self.state, req).await;
            assert!(response.is_success, "{}", response.message);
            response.data.unwrap()
        }
    }

    fn list_req(page: usize, tags: &[&str]) -> ListImagesRequest {
        ListImagesRequest {
            current_page: page,
            page_size: 10,
            sort_by: None,
            search_name: None,
            search_tags: tags.iter().map(|t| t.to_string()).collect(),
            join_tag: true,
        }
    }

    #[tokio::test]
    async fn test_add_image_relocates_and_tags() {
        let fx = fixture();
        fx.state.tags.create(&Tag::new(0, "a".into())).await.unwrap();

        let row = fx.add("raiden", vec!["a".into(), "b".into()]).await;

        assert!(row.image.path.starts_with("repo/hdb_"));
        assert!(fx.state.assets.resolve(&row.image.path).exists());
        assert!(fx.src.join("raiden.png").exists());

        let all_tags = fx.state.tags.list().await.unwrap();
        assert_eq!(all_tags.len(), 2);
        let linked = fx.state.tags.get_tags_for_image(row.image.id).await.unwrap();
        assert_eq!(linked.len(), 2);
    }

    #[tokio::test]
    async fn test_add_image_installs_mods() {
        let fx = fixture();
        let req = SaveImageRequest {
            image: ImageDescriptor {
                id: 0,
                name: "modded".into(),
                path: fx.card("modded"),
                size: 0,
                remark: "with outfit".into(),
                mods: vec![fx.modfile("outfit.zipmod")],
                tags: vec![],
            },
            settings: fx.settings(),
        };
        let row = add_image(&fx.state, req).await.data.unwrap();

        let installed = fx.game.join("mods").join("haremdb").join("outfit.zipmod");
        assert!(installed.exists());
        assert_eq!(row.image.mods[0].path, installed.to_string_lossy());
    }

    #[tokio::test]
    async fn test_failed_mod_install_removes_copied_card() {
        let fx = fixture();
        let mut bad = fx.modfile("outfit.zipmod");
        bad.name = "../outfit.zipmod".into();
        let req = SaveImageRequest {
            image: ImageDescriptor {
                id: 0,
                name: "modded".into(),
                path: fx.card("modded"),
                size: 0,
                remark: String::new(),
                mods: vec![bad],
                tags: vec![],
            },
            settings: fx.settings(),
        };

        let response = add_image(&fx.state, req).await;
        assert!(!response.is_success);
        assert!(matches!(response.error, Some(DomainError::InvalidInput(_))));

        assert!(fx.state.images.list().await.unwrap().is_empty());
        let left: Vec<_> = std::fs::read_dir(fx.state.assets.repo_dir())
            .map(|entries| entries.filter_map(Result::ok).collect())
            .unwrap_or_default();
        assert!(left.is_empty());
        assert!(fx.src.join("modded.png").exists());
    }

    #[tokio::test]
    async fn test_add_image_missing_source() {
        let fx = fixture();
        let req: SaveImageRequest = serde_json::from_value(serde_json::json!({
            "image": {"name": "ghost", "path": fx.src.join("ghost.png")}
        }))
        .unwrap();
        let response = add_image(&fx.state, req).await;
        assert!(!response.is_success);
        assert!(fx.state.images.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_images_tag_search() {
        let fx = fixture();
        fx.add("both", vec!["x".into(), "y".into()]).await;
        fx.add("only_x", vec!["x".into()]).await;

        let page = list_images(&fx.state, list_req(1, &["x", "y"])).await.data.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.list[0].image.name, "both");

        let page = list_images(&fx.state, list_req(1, &["x"])).await.data.unwrap();
        assert_eq!(page.total, 2);
        // newest first by default
        assert_eq!(page.list[0].image.name, "only_x");

        let bad = list_images(&fx.state, list_req(0, &[])).await;
        assert!(matches!(bad.error, Some(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_existing_mods() {
        let fx = fixture();
        let row = fx.add("card", vec!["a".into()]).await;

        let first = vec![fx.modfile("one.zipmod")];
        let installed = install_mods(&first, &fx.settings().unwrap()).await.unwrap();
        fx.state
            .images
            .update_with_tags(
                row.image.id,
                ImageChanges { name: "card".into(), remark: String::new(), mods: installed.clone() },
                &["a".into()],
            )
            .await
            .unwrap();

        let req = SaveImageRequest {
            image: ImageDescriptor {
                id: row.image.id,
                name: "card v2".into(),
                path: String::new(),
                size: 0,
                remark: "edited".into(),
                mods: vec![installed[0].clone(), fx.modfile("two.zipmod")],
                tags: vec!["b".into()],
            },
            settings: fx.settings(),
        };
        let updated = update_image(&fx.state, req).await.data.unwrap();

        assert_eq!(updated.image.name, "card v2");
        assert_eq!(updated.image.mods.len(), 2);
        assert_eq!(updated.image.mods[0], installed[0]);
        assert!(updated.image.mods[1].path.ends_with("two.zipmod"));
        assert_eq!(updated.tags.unwrap()[0].name, "b");
    }

    #[tokio::test]
    async fn test_get_increment_delete() {
        let fx = fixture();
        let row = fx.add("card", vec!["a".into()]).await;
        let id = row.image.id;

        assert_eq!(increment_image_use_count(&fx.state, id).await.data, Some(1));
        assert_eq!(increment_image_use_count(&fx.state, id).await.data, Some(2));

        let found = get_image_by_id(&fx.state, GetImageRequest { image_id: id, join_tag: true }).await;
        assert_eq!(found.data.unwrap().image.use_count, Some(2));
        let missing = get_image_by_id(&fx.state, GetImageRequest { image_id: 99, join_tag: false }).await;
        assert!(matches!(missing.error, Some(DomainError::NotFound(_))));

        let file = fx.state.assets.resolve(&row.image.path);
        let deleted = delete_image(&fx.state, DeleteImageRequest { id, path: None }).await;
        assert_eq!(deleted.data, Some(true));
        assert!(!file.exists());
        assert!(fx.state.tags.get_tags_for_image(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_normalize_image_paths() {
        let fx = fixture();
        fx.state
            .images
            .create(&Image::new(0, "legacy".into(), "cards/old/legacy.png".into()))
            .await
            .unwrap();

        assert_eq!(normalize_image_paths(&fx.state).await.data, Some(1));
        let images = fx.state.images.list().await.unwrap();
        assert_eq!(images[0].path, "repo/legacy.png");
    }
}
