use crate::permissions::{check_permission_detailed, request_permission_in_background, PermissionInfo};
use tauri::command;

/// Ask for camera access; on macOS this shows the system prompt
#[command]
pub async fn request_camera_permission() -> Result<PermissionInfo, String> {
    log::info!("Requesting camera permission");
    request_permission_in_background()
        .await
        .map_err(|e| format!("Permission request failed: {}", e))
}

#[command]
pub async fn check_camera_permission_status() -> Result<PermissionInfo, String> {
    log::debug!("Checking camera permission status");
    Ok(check_permission_detailed())
}
