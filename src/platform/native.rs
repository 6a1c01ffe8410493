use super::{list_cameras, select_front_camera, NokhwaCamera};
use crate::capture::backend::{AudioSource, CaptureBackend, ClipSink, FrameSource};
use crate::config::CameraConfig;
use crate::errors::DiaryError;
use crate::recording::{Mp4Recorder, RecordingConfig, RecordingQuality};
use crate::types::{AudioFormat, CameraFormat, MicrophoneInfo};
use std::path::Path;

/// Real hardware: nokhwa camera, cpal microphone, H.264/Opus MP4 clips
#[derive(Debug, Clone)]
pub struct NativeBackend {
    camera: CameraConfig,
    quality: RecordingQuality,
}

impl NativeBackend {
    pub fn new(camera: CameraConfig) -> Self {
        let quality = RecordingQuality::from_name(&camera.quality).unwrap_or_else(|| {
            log::warn!("Unknown quality '{}', using medium", camera.quality);
            RecordingQuality::Medium
        });
        Self { camera, quality }
    }
}

impl CaptureBackend for NativeBackend {
    fn front_camera(&self) -> Result<Box<dyn FrameSource>, DiaryError> {
        let devices = list_cameras()?;
        let device = select_front_camera(&devices, &self.camera)
            .ok_or_else(|| DiaryError::DeviceUnavailable("No cameras found".to_string()))?;
        log::info!("Using camera '{}' ({})", device.name, device.id);
        Ok(Box::new(NokhwaCamera::open(&device)?))
    }

    fn microphone(&self) -> Result<MicrophoneInfo, DiaryError> {
        #[cfg(feature = "audio")]
        {
            crate::audio::default_microphone()
        }

        #[cfg(not(feature = "audio"))]
        {
            Err(DiaryError::DeviceUnavailable(
                "built without audio support".to_string(),
            ))
        }
    }

    fn open_microphone(&self, microphone: &MicrophoneInfo) -> Result<Box<dyn AudioSource>, DiaryError> {
        #[cfg(feature = "audio")]
        {
            let format = crate::audio::track_format(microphone);
            let capture = crate::audio::MicrophoneCapture::open(microphone, format)?;
            log::info!("Recording audio from '{}' at {:?}", microphone.name, format);
            Ok(Box::new(capture))
        }

        #[cfg(not(feature = "audio"))]
        {
            Err(DiaryError::DeviceUnavailable(format!(
                "built without audio support, cannot open {}",
                microphone.name
            )))
        }
    }

    fn create_sink(
        &self,
        path: &Path,
        format: &CameraFormat,
        audio: Option<AudioFormat>,
    ) -> Result<Box<dyn ClipSink>, DiaryError> {
        let config = RecordingConfig::for_format(format, self.quality)
            .with_title("Video diary")
            .with_audio(audio);
        Ok(Box::new(Mp4Recorder::create(path, &config)?))
    }
}
