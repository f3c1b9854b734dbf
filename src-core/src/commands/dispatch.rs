//! Command Dispatch
//!
//! Routes a command name and JSON payload to its handler and returns the
//! serialized envelope.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::{DomainError, DomainResult, RecordId};
use crate::AppState;
use super::response::Response;
use super::{group_cmd, image_cmd, service_cmd, tag_cmd};

/// Every command `invoke` understands
pub const COMMANDS: &[&str] = &[
    "listGroups",
    "addGroup",
    "updateGroup",
    "reorderGroups",
    "deleteGroup",
    "listTags",
    "addTag",
    "updateTag",
    "deleteTag",
    "listUngroupedTags",
    "addTagToGroup",
    "removeTagFromGroup",
    "listTagsForGroup",
    "addImage",
    "listImages",
    "getImageById",
    "updateImage",
    "incrementImageUseCount",
    "deleteImage",
    "normalizeImagePaths",
    "scanCardFolders",
    "getAppRoot",
    "flush",
    "getRecentLogs",
];

fn parse<T: DeserializeOwned>(payload: Value) -> DomainResult<T> {
    serde_json::from_value(payload).map_err(|e| DomainError::InvalidInput(e.to_string()))
}

/// A bare number, or an object carrying it under `key`, `id` or `$loki`
fn parse_id(payload: &Value, key: &str) -> DomainResult<RecordId> {
    let found = match payload {
        Value::Object(map) => [key, "id", "$loki"].iter().find_map(|k| map.get(*k)),
        other => Some(other),
    };
    found
        .and_then(Value::as_u64)
        .and_then(|id| RecordId::try_from(id).ok())
        .ok_or_else(|| DomainError::InvalidInput(format!("expected {} in payload", key)))
}

fn encode<T: Serialize>(response: Response<T>) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|e| {
        json!({ "isSuccess": false, "message": format!("Failed to encode response: {}", e), "data": null })
    })
}

fn rejected(command: &str, error: DomainError) -> Value {
    log::warn!("Rejected {}: {}", command, error);
    encode(Response::<()>::failed(format!("Invalid request for {}", command), error))
}

macro_rules! route {
    ($state:expr, $command:expr, $payload:expr, $handler:path) => {
        match parse($payload) {
            Ok(req) => encode($handler($state, req).await),
            Err(e) => rejected($command, e),
        }
    };
    ($state:expr, $command:expr, $payload:expr, $handler:path, id = $key:expr) => {
        match parse_id(&$payload, $key) {
            Ok(id) => encode($handler($state, id).await),
            Err(e) => rejected($command, e),
        }
    };
}

/// Run `command` with `payload`; unknown commands yield a failed envelope
pub async fn invoke(state: &AppState, command: &str, payload: Value) -> Value {
    log::debug!("invoke {}", command);
    match command {
        "listGroups" => route!(state, command, payload, group_cmd::list_groups),
        "addGroup" => route!(state, command, payload, group_cmd::add_group),
        "updateGroup" => route!(state, command, payload, group_cmd::update_group),
        "reorderGroups" => route!(state, command, payload, group_cmd::reorder_groups),
        "deleteGroup" => route!(state, command, payload, group_cmd::delete_group),
        "listTags" => route!(state, command, payload, tag_cmd::list_tags),
        "addTag" => route!(state, command, payload, tag_cmd::add_tag),
        "updateTag" => route!(state, command, payload, tag_cmd::update_tag),
        "deleteTag" => route!(state, command, payload, tag_cmd::delete_tag, id = "tagId"),
        "listUngroupedTags" => encode(tag_cmd::list_ungrouped_tags(state).await),
        "addTagToGroup" => route!(state, command, payload, tag_cmd::add_tag_to_group),
        "removeTagFromGroup" => route!(state, command, payload, tag_cmd::remove_tag_from_group),
        "listTagsForGroup" => {
            route!(state, command, payload, tag_cmd::list_tags_for_group, id = "groupId")
        }
        "addImage" => route!(state, command, payload, image_cmd::add_image),
        "listImages" => route!(state, command, payload, image_cmd::list_images),
        "getImageById" => route!(state, command, payload, image_cmd::get_image_by_id),
        "updateImage" => route!(state, command, payload, image_cmd::update_image),
        "incrementImageUseCount" => {
            route!(state, command, payload, image_cmd::increment_image_use_count, id = "imageId")
        }
        "deleteImage" => route!(state, command, payload, image_cmd::delete_image),
        "normalizeImagePaths" => encode(image_cmd::normalize_image_paths(state).await),
        "scanCardFolders" => route!(state, command, payload, service_cmd::scan_card_folders),
        "getAppRoot" => encode(service_cmd::get_app_root(state).await),
        "flush" => encode(service_cmd::flush(state).await),
        "getRecentLogs" => {
            let lines = payload.get("lines").and_then(Value::as_u64).unwrap_or(100) as usize;
            encode(service_cmd::get_recent_logs(state, lines).await)
        }
        unknown => rejected(unknown, DomainError::InvalidInput(format!("unknown command: {}", unknown))),
    }
}
