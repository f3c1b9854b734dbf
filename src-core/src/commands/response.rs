//! Response Envelope
//!
//! Every command returns `{ isSuccess, message, data, error }` instead of
//! failing, so callers on the other side of the boundary get one shape.

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};
use crate::repository::db::{GROUPS, IMAGES, TAGS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    pub is_success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DomainError>,
}

impl<T> Response<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            is_success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: DomainError) -> Self {
        Self {
            is_success: false,
            message: message.into(),
            data: None,
            error: Some(error),
        }
    }

    /// Wrap an operation result, logging failures
    pub fn from_result(result: DomainResult<T>, ok_msg: &str, fail_msg: &str) -> Self {
        match result {
            Ok(data) => Self::ok(ok_msg, data),
            Err(e) => {
                log::error!("{}: {}", fail_msg, e);
                Self::failed(readable_message(&e, fail_msg), e)
            }
        }
    }
}

fn entity_label(collection: &str) -> &str {
    match collection {
        GROUPS => "Group",
        TAGS => "Tag",
        IMAGES => "Image",
        other => other,
    }
}

/// User-facing text for a failure
pub fn readable_message(error: &DomainError, fail_msg: &str) -> String {
    match error {
        DomainError::DuplicateKey { collection, field, value } if field == "name" => {
            format!("{} name already exists: {}", entity_label(collection), value)
        }
        DomainError::NotFound(what) => format!("{}: {} not found", fail_msg, what),
        other => format!("{}: {}", fail_msg, other),
    }
}
