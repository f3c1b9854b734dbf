//! Group Commands
//!
//! Group CRUD, ordering and cascade delete.

use serde::Deserialize;

use crate::domain::{Group, GroupOrder, RecordId};
use crate::repository::{GroupRepository, GroupRow, ListQuery, Page, PageRequest, Repository, SortSpec};
use crate::AppState;
use super::response::Response;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGroupsRequest {
    pub current_page: usize,
    pub page_size: usize,
    #[serde(default)]
    pub sort_by: Option<SortSpec>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub join_tag: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddGroupRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(alias = "$loki")]
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupRequest {
    pub group_id: RecordId,
    #[serde(default)]
    pub is_cascade_delete_tags: bool,
}

/// List groups, optionally with their tags
pub async fn list_groups(state: &AppState, req: ListGroupsRequest) -> Response<Page<GroupRow>> {
    let sort = SortSpec::keys_or(req.sort_by.as_ref(), &GroupRepository::default_sort());
    let query = ListQuery::new(PageRequest::new(req.current_page, req.page_size), sort)
        .with_name(req.search.as_deref());
    let result = state.groups.page(&query, req.join_tag).await;
    Response::from_result(result, "Groups listed", "Failed to list groups")
}

pub async fn add_group(state: &AppState, req: AddGroupRequest) -> Response<Group> {
    let result = state.groups.create(&Group::new(0, req.name)).await;
    Response::from_result(result, "Group added", "Failed to add group")
}

pub async fn update_group(state: &AppState, req: UpdateGroupRequest) -> Response<Group> {
    let result = state.groups.rename(req.id, &req.name).await;
    Response::from_result(result, "Group updated", "Failed to update group")
}

/// Bulk index update; returns how many groups were reordered
pub async fn reorder_groups(state: &AppState, orders: Vec<GroupOrder>) -> Response<usize> {
    let result = state.groups.reorder(&orders).await;
    Response::from_result(result, "Groups reordered", "Failed to reorder groups")
}

/// Delete a group; returns how many tags went with it
pub async fn delete_group(state: &AppState, req: DeleteGroupRequest) -> Response<usize> {
    let result = state
        .groups
        .delete_with_tags(req.group_id, req.is_cascade_delete_tags)
        .await;
    Response::from_result(result, "Group deleted", "Failed to delete group")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tag_cmd::{add_tag_to_group, list_tags_for_group, AddTagToGroupRequest};
    use crate::domain::DomainError;

    fn list_req(search: Option<&str>) -> ListGroupsRequest {
        ListGroupsRequest {
            current_page: 1,
            page_size: 10,
            sort_by: None,
            search: search.map(str::to_string),
            join_tag: true,
        }
    }

    #[tokio::test]
    async fn test_add_duplicate_group() {
        let state = AppState::for_tests();
        assert!(add_group(&state, AddGroupRequest { name: "Genshin".into() }).await.is_success);

        let response = add_group(&state, AddGroupRequest { name: "Genshin".into() }).await;
        assert!(!response.is_success);
        assert_eq!(response.message, "Group name already exists: Genshin");

        let page = list_groups(&state, list_req(None)).await.data.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_search_and_update() {
        let state = AppState::for_tests();
        add_group(&state, AddGroupRequest { name: "Genshin".into() }).await;
        add_group(&state, AddGroupRequest { name: "Honkai".into() }).await;

        let page = list_groups(&state, list_req(Some("gEn"))).await.data.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.list[0].tags, Some(vec![]));

        let updated = update_group(&state, UpdateGroupRequest { id: 2, name: "Genshin".into() }).await;
        assert!(matches!(updated.error, Some(DomainError::DuplicateKey { .. })));
    }

    #[tokio::test]
    async fn test_cascade_delete_through_commands() {
        let state = AppState::for_tests();
        add_group(&state, AddGroupRequest { name: "a".into() }).await;
        add_group(&state, AddGroupRequest { name: "b".into() }).await;
        for (name, group_id) in [("only_a", 1), ("shared", 1), ("shared", 2)] {
            let response = add_tag_to_group(&state, AddTagToGroupRequest { name: name.into(), group_id }).await;
            assert!(response.is_success, "{}", response.message);
        }

        let removed = delete_group(&state, DeleteGroupRequest { group_id: 1, is_cascade_delete_tags: true }).await;
        assert_eq!(removed.data, Some(1));

        let remaining = list_tags_for_group(&state, 2).await.data.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "shared");
    }

    #[tokio::test]
    async fn test_reorder_reports_count() {
        let state = AppState::for_tests();
        add_group(&state, AddGroupRequest { name: "a".into() }).await;
        let orders = vec![GroupOrder { id: 1, index: 4 }, GroupOrder { id: 9, index: 0 }];
        assert_eq!(reorder_groups(&state, orders).await.data, Some(1));
    }
}
