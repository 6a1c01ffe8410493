//! Poster frames: the picture at time zero of a stored clip

#[cfg(feature = "recording")]
mod h264;
pub mod mp4;

#[cfg(feature = "recording")]
pub use h264::H264PosterDecoder;
pub use mp4::{locate_first_sample, FirstSample};

use crate::errors::DiaryError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use std::path::Path;

/// Turns a stored clip into its poster frame
pub trait PosterDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<PosterFrame, DiaryError>;
}

/// Decoder for builds without a video codec; every clip keeps its placeholder
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPosterDecoder;

impl PosterDecoder for NoPosterDecoder {
    fn decode(&self, path: &Path) -> Result<PosterFrame, DiaryError> {
        Err(DiaryError::DecodeError(format!(
            "no video decoder available for {:?}",
            path
        )))
    }
}

/// Decoded RGB8 still
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl PosterFrame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        Self { width, height, rgb }
    }

    pub fn to_image(&self) -> Result<RgbImage, DiaryError> {
        RgbImage::from_raw(self.width, self.height, self.rgb.clone()).ok_or_else(|| {
            DiaryError::DecodeError(format!(
                "{} bytes do not form a {}x{} RGB image",
                self.rgb.len(),
                self.width,
                self.height
            ))
        })
    }

    /// Encode as JPEG, `quality` in 1..=100
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, DiaryError> {
        let image = self.to_image()?;
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode_image(&image)
            .map_err(|e| DiaryError::EncodingError(format!("JPEG encoding failed: {}", e)))?;
        Ok(out)
    }

    /// Scale down so the longer edge is at most `max_edge`, keeping aspect
    pub fn thumbnail(&self, max_edge: u32) -> Result<PosterFrame, DiaryError> {
        let longest = self.width.max(self.height);
        if max_edge == 0 || longest <= max_edge {
            return Ok(self.clone());
        }

        let scale = max_edge as f64 / longest as f64;
        let width = ((self.width as f64 * scale).round() as u32).max(1);
        let height = ((self.height as f64 * scale).round() as u32).max(1);

        let resized = image::imageops::resize(&self.to_image()?, width, height, FilterType::Lanczos3);
        Ok(PosterFrame::new(width, height, resized.into_raw()))
    }
}
