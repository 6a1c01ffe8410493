use crate::capture::backend::FrameSource;
use crate::errors::DiaryError;
use crate::types::{CameraDeviceInfo, CameraFrame};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};

fn native_api() -> ApiBackend {
    if cfg!(target_os = "linux") {
        ApiBackend::Video4Linux
    } else if cfg!(target_os = "macos") {
        ApiBackend::AVFoundation
    } else if cfg!(target_os = "windows") {
        ApiBackend::MediaFoundation
    } else {
        ApiBackend::Auto
    }
}

/// List available cameras through the platform's native API
pub fn list_cameras() -> Result<Vec<CameraDeviceInfo>, DiaryError> {
    let cameras = query(native_api())
        .map_err(|e| DiaryError::DeviceUnavailable(format!("Failed to query cameras: {}", e)))?;

    Ok(cameras
        .into_iter()
        .map(|info| {
            let name = info.human_name();
            let front = super::looks_front_facing(&name);
            CameraDeviceInfo::new(info.index().to_string(), name)
                .with_description(info.description().to_string())
                .front_facing(front)
        })
        .collect())
}

/// A nokhwa camera delivering RGB8 frames
pub struct NokhwaCamera {
    camera: CallbackCamera,
    device: CameraDeviceInfo,
}

impl NokhwaCamera {
    pub fn open(device: &CameraDeviceInfo) -> Result<Self, DiaryError> {
        let index = match device.id.parse::<u32>() {
            Ok(i) => CameraIndex::Index(i),
            Err(_) => CameraIndex::String(device.id.clone()),
        };
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);

        let camera = CallbackCamera::new(index, requested, |_| {}).map_err(|e| {
            DiaryError::DeviceUnavailable(format!("Failed to open '{}': {}", device.name, e))
        })?;

        Ok(Self {
            camera,
            device: device.clone(),
        })
    }
}

impl FrameSource for NokhwaCamera {
    fn start_stream(&mut self) -> Result<(), DiaryError> {
        self.camera
            .open_stream()
            .map_err(|e| DiaryError::CaptureError(format!("Failed to start stream: {}", e)))
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, DiaryError> {
        let buffer = self
            .camera
            .poll_frame()
            .map_err(|e| DiaryError::CaptureError(format!("Failed to capture frame: {}", e)))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| DiaryError::CaptureError(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (image.width(), image.height());
        Ok(CameraFrame::new(image.into_raw(), width, height, self.device.id.clone()))
    }

    fn stop_stream(&mut self) -> Result<(), DiaryError> {
        self.camera
            .stop_stream()
            .map_err(|e| DiaryError::CaptureError(format!("Failed to stop stream: {}", e)))
    }

    fn device_name(&self) -> String {
        self.device.name.clone()
    }
}
