//! Camera authorization
//!
//! Only macOS has a programmatic request; on Linux access is group based and
//! on Windows it is a privacy setting, so "requesting" there just reports what
//! the user has to do.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// User hasn't been asked yet
    NotDetermined,
    /// Parental controls or MDM policy
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

impl PermissionInfo {
    fn new(status: PermissionStatus, message: impl Into<String>, can_request: bool) -> Self {
        Self {
            status,
            message: message.into(),
            can_request,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.status == PermissionStatus::Granted
    }
}

pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

pub fn check_permission_detailed() -> PermissionInfo {
    #[cfg(target_os = "windows")]
    {
        check_permission_windows()
    }

    #[cfg(target_os = "macos")]
    {
        check_permission_macos()
    }

    #[cfg(target_os = "linux")]
    {
        check_permission_linux()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Platform not supported",
            false,
        )
    }
}

/// Ask for camera access, blocking until the user answers on macOS
pub fn request_permission() -> PermissionInfo {
    let current = check_permission_detailed();
    if current.is_granted() || !current.can_request {
        return current;
    }

    #[cfg(target_os = "macos")]
    {
        request_permission_macos()
    }

    #[cfg(target_os = "windows")]
    {
        PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Enable camera access in Windows Settings > Privacy > Camera",
            false,
        )
    }

    #[cfg(target_os = "linux")]
    {
        PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Run: sudo usermod -a -G video $USER && newgrp video",
            false,
        )
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        current
    }
}

/// Run [`request_permission`] off the async runtime
///
/// Anything but a grant is logged; the caller is never blocked.
pub fn request_permission_in_background() -> JoinHandle<PermissionInfo> {
    tokio::task::spawn_blocking(|| {
        let info = request_permission();
        if info.is_granted() {
            log::debug!("Camera access granted");
        } else {
            log::warn!("Camera access {}: {}", info.status, info.message);
        }
        info
    })
}

#[cfg(target_os = "windows")]
fn check_permission_windows() -> PermissionInfo {
    // Enumerating devices is the only observable proxy for the privacy toggle.
    #[cfg(feature = "camera")]
    {
        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(devices) if !devices.is_empty() => PermissionInfo::new(
                PermissionStatus::Granted,
                "Camera access granted via Windows Privacy settings",
                false,
            ),
            Ok(_) => PermissionInfo::new(
                PermissionStatus::NotDetermined,
                "No cameras found - permission may not be granted",
                true,
            ),
            Err(e) => PermissionInfo::new(
                PermissionStatus::Denied,
                format!("Camera access denied: {}", e),
                true,
            ),
        }
    }

    #[cfg(not(feature = "camera"))]
    {
        PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Built without camera support",
            false,
        )
    }
}

#[cfg(target_os = "macos")]
fn av_media_type_video() -> Option<(&'static objc::runtime::Class, *mut objc::runtime::Object)> {
    use objc::runtime::{Class, Object};
    use objc::{msg_send, sel, sel_impl};

    let class = Class::get("AVCaptureDevice")?;
    let media = std::ffi::CString::new("vide").ok()?;
    let media_type: *mut Object = unsafe { msg_send![class, mediaTypeForString: media.as_ptr()] };
    Some((class, media_type))
}

#[cfg(target_os = "macos")]
fn check_permission_macos() -> PermissionInfo {
    use objc::{msg_send, sel, sel_impl};

    let Some((class, media_type)) = av_media_type_video() else {
        return PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "AVFoundation not available",
            false,
        );
    };

    // AVAuthorizationStatus: 0 not determined, 1 restricted, 2 denied, 3 authorized
    let auth_status: i64 = unsafe { msg_send![class, authorizationStatusForMediaType: media_type] };

    match auth_status {
        3 => PermissionInfo::new(PermissionStatus::Granted, "Camera access authorized", false),
        2 => PermissionInfo::new(
            PermissionStatus::Denied,
            "Camera access denied - enable in System Settings > Privacy & Security > Camera",
            false,
        ),
        1 => PermissionInfo::new(
            PermissionStatus::Restricted,
            "Camera access restricted by system policy",
            false,
        ),
        _ => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Camera permission not yet requested",
            true,
        ),
    }
}

#[cfg(target_os = "macos")]
fn request_permission_macos() -> PermissionInfo {
    use block::ConcreteBlock;
    use objc::{msg_send, sel, sel_impl};
    use std::sync::mpsc;
    use std::time::Duration;

    let Some((class, media_type)) = av_media_type_video() else {
        return PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "AVFoundation not available",
            false,
        );
    };

    let (tx, rx) = mpsc::channel();
    let handler = ConcreteBlock::new(move |granted: bool| {
        let _ = tx.send(granted);
    });
    // The completion handler outlives this frame.
    let handler = handler.copy();

    unsafe {
        let _: () = msg_send![class, requestAccessForMediaType:media_type completionHandler:&*handler];
    }

    match rx.recv_timeout(Duration::from_secs(60)) {
        Ok(true) => PermissionInfo::new(PermissionStatus::Granted, "Camera access authorized", false),
        Ok(false) => PermissionInfo::new(
            PermissionStatus::Denied,
            "Camera access denied by user",
            false,
        ),
        Err(_) => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Permission request timed out",
            true,
        ),
    }
}

#[cfg(target_os = "linux")]
fn check_permission_linux() -> PermissionInfo {
    use std::path::Path;

    let Some(device) = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .find(|path| Path::new(path).exists())
    else {
        return PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "No video devices found at /dev/video*",
            false,
        );
    };

    match std::fs::File::open(&device) {
        Ok(_) => PermissionInfo::new(
            PermissionStatus::Granted,
            format!("Camera access granted ({} readable)", device),
            false,
        ),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => PermissionInfo::new(
            PermissionStatus::Denied,
            format!(
                "{} exists but is not readable - run: sudo usermod -a -G video $USER",
                device
            ),
            true,
        ),
        Err(e) => PermissionInfo::new(
            PermissionStatus::Denied,
            format!("Cannot access {}: {}", device, e),
            true,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(PermissionStatus::Granted.to_string(), "granted");
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
    }

    #[test]
    fn test_check_permission_is_consistent() {
        let detailed = check_permission_detailed();
        assert_eq!(check_permission(), detailed.status);
        assert!(!detailed.message.is_empty());
    }

    #[tokio::test]
    async fn test_background_request_never_blocks_caller() {
        let handle = request_permission_in_background();
        let info = handle.await.unwrap();
        assert!(!info.message.is_empty());
    }
}
