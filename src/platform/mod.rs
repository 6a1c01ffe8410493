//! Camera discovery and the native capture backend

#[cfg(all(feature = "camera", feature = "recording"))]
mod native;
#[cfg(feature = "camera")]
mod nokhwa_camera;

#[cfg(all(feature = "camera", feature = "recording"))]
pub use native::NativeBackend;
#[cfg(feature = "camera")]
pub use nokhwa_camera::{list_cameras, NokhwaCamera};

use crate::config::CameraConfig;
use crate::types::CameraDeviceInfo;

/// Name fragments of built-in user-facing cameras
const FRONT_HINTS: [&str; 4] = ["front", "facetime", "user", "integrated"];

/// Whether a device name looks like a front-facing camera
pub fn looks_front_facing(name: &str) -> bool {
    let name = name.to_lowercase();
    FRONT_HINTS.iter().any(|hint| name.contains(hint))
}

/// Pick the camera a diary session should use
///
/// Order of preference: the configured device index, a device whose name
/// contains the configured hint, any device that looks front facing, the
/// first device.
pub fn select_front_camera(
    devices: &[CameraDeviceInfo],
    config: &CameraConfig,
) -> Option<CameraDeviceInfo> {
    if let Some(index) = config.device_index {
        let id = index.to_string();
        match devices.iter().find(|d| d.id == id) {
            Some(device) => return Some(device.clone()),
            None => log::warn!("Configured camera index {} not found", index),
        }
    }

    let hint = config.device_hint.to_lowercase();
    if !hint.is_empty() {
        if let Some(device) = devices.iter().find(|d| d.name.to_lowercase().contains(&hint)) {
            return Some(device.clone());
        }
    }

    devices
        .iter()
        .find(|d| d.is_front_facing)
        .or_else(|| devices.first())
        .cloned()
}
