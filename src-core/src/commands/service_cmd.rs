//! Service Commands
//!
//! Folder scanning, app root lookup, store flush and recent log lines.

use std::path::PathBuf;

use serde::Deserialize;

use crate::assets::{self, ScannedCard};
use crate::domain::DomainError;
use crate::AppState;
use super::response::Response;

#[derive(Debug, Clone, Deserialize)]
pub struct ScanFoldersRequest {
    pub folders: Vec<PathBuf>,
}

/// Collect the `.png` cards below each folder, tagged by directory
pub async fn scan_card_folders(_state: &AppState, req: ScanFoldersRequest) -> Response<Vec<ScannedCard>> {
    let result = tokio::task::spawn_blocking(move || assets::scan_card_folders(&req.folders))
        .await
        .map_err(|e| DomainError::Internal(e.to_string()));
    Response::from_result(result, "Folders scanned", "Failed to scan folders")
}

pub async fn get_app_root(state: &AppState) -> Response<String> {
    Response::ok("App root", state.assets.root().to_string_lossy().into_owned())
}

/// Persist pending changes now; `data` tells whether anything was written
pub async fn flush(state: &AppState) -> Response<bool> {
    Response::from_result(state.db_state.flush().await, "Flushed", "Failed to flush")
}

pub async fn get_recent_logs(_state: &AppState, lines: usize) -> Response<Vec<String>> {
    Response::ok("Recent log lines", rolling_logger::recent_lines(lines))
}
