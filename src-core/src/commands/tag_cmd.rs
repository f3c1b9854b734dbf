//! Tag Commands
//!
//! Tag CRUD and the group panel's tag operations.

use serde::Deserialize;

use crate::domain::{RecordId, Tag};
use crate::repository::{
    GroupTagOperations, ListQuery, Page, PageRequest, Repository, SortSpec, TagRepository, TagRow,
};
use crate::AppState;
use super::response::Response;

/// A group given either by id or as a full record
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GroupSelector {
    Id(RecordId),
    Group {
        #[serde(alias = "$loki")]
        id: RecordId,
    },
}

impl GroupSelector {
    pub fn id(&self) -> RecordId {
        match self {
            GroupSelector::Id(id) | GroupSelector::Group { id } => *id,
        }
    }
}

fn group_ids(groups: &[GroupSelector]) -> Vec<RecordId> {
    groups.iter().map(GroupSelector::id).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTagsRequest {
    pub current_page: usize,
    pub page_size: usize,
    #[serde(default)]
    pub sort_by: Option<SortSpec>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub join_group: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTagRequest {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupSelector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTagRequest {
    #[serde(alias = "$loki")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupSelector>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTagToGroupRequest {
    pub name: String,
    pub group_id: RecordId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveTagFromGroupRequest {
    pub tag_id: RecordId,
    pub group_id: RecordId,
}

/// List tags, optionally with the groups they belong to
pub async fn list_tags(state: &AppState, req: ListTagsRequest) -> Response<Page<TagRow>> {
    let sort = SortSpec::keys_or(req.sort_by.as_ref(), &TagRepository::default_sort());
    let query = ListQuery::new(PageRequest::new(req.current_page, req.page_size), sort)
        .with_name(req.search.as_deref());
    let result = state.tags.page(&query, req.join_group).await;
    Response::from_result(result, "Tags listed", "Failed to list tags")
}

pub async fn add_tag(state: &AppState, req: AddTagRequest) -> Response<Tag> {
    let result = state.tags.create_in_groups(&req.name, &group_ids(&req.groups)).await;
    Response::from_result(result, "Tag added", "Failed to add tag")
}

/// Rename a tag and replace its group links
pub async fn update_tag(state: &AppState, req: UpdateTagRequest) -> Response<Tag> {
    let result = state
        .tags
        .update_with_groups(req.id, &req.name, &group_ids(&req.groups))
        .await;
    Response::from_result(result, "Tag updated", "Failed to update tag")
}

pub async fn delete_tag(state: &AppState, tag_id: RecordId) -> Response<()> {
    let result = state.tags.delete(tag_id).await;
    Response::from_result(result, "Tag deleted", "Failed to delete tag")
}

pub async fn list_ungrouped_tags(state: &AppState) -> Response<Vec<Tag>> {
    let result = state.tags.ungrouped().await;
    Response::from_result(result, "Ungrouped tags listed", "Failed to list ungrouped tags")
}

/// Link a tag to a group by name, creating the tag when needed
pub async fn add_tag_to_group(state: &AppState, req: AddTagToGroupRequest) -> Response<Tag> {
    let result = state.tags.add_tag_to_group(&req.name, req.group_id).await;
    Response::from_result(result, "Tag added to group", "Failed to add tag to group")
}

/// Unlink; `data` tells whether a link existed
pub async fn remove_tag_from_group(state: &AppState, req: RemoveTagFromGroupRequest) -> Response<bool> {
    let result = state.tags.remove_tag_from_group(req.tag_id, req.group_id).await;
    Response::from_result(result, "Tag removed from group", "Failed to remove tag from group")
}

pub async fn list_tags_for_group(state: &AppState, group_id: RecordId) -> Response<Vec<Tag>> {
    let result = state.tags.get_tags_for_group(group_id).await;
    Response::from_result(result, "Group tags listed", "Failed to list group tags")
}
