//! openh264 poster decoder

use super::mp4::locate_first_sample;
use super::{PosterDecoder, PosterFrame};
use crate::errors::DiaryError;
use openh264::decoder::Decoder;
use openh264::formats::YUVSource;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decodes the first video sample of an H.264 MP4 clip
#[derive(Debug, Clone, Copy, Default)]
pub struct H264PosterDecoder;

impl H264PosterDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PosterDecoder for H264PosterDecoder {
    fn decode(&self, path: &Path) -> Result<PosterFrame, DiaryError> {
        let file = File::open(path)
            .map_err(|e| DiaryError::IoError(format!("Failed to open {:?}: {}", path, e)))?;
        let sample = locate_first_sample(&mut BufReader::new(file))?;
        let access_unit = sample.to_annex_b()?;

        let mut decoder = Decoder::new()
            .map_err(|e| DiaryError::DecodeError(format!("Failed to create decoder: {}", e)))?;
        let yuv = decoder
            .decode(&access_unit)
            .map_err(|e| DiaryError::DecodeError(format!("H.264 decode failed: {}", e)))?
            .ok_or_else(|| DiaryError::DecodeError("first sample produced no picture".to_string()))?;

        let (width, height) = yuv.dimensions();
        let (stride_y, stride_u, stride_v) = yuv.strides();
        let rgb = yuv420_to_rgb(
            (yuv.y(), yuv.u(), yuv.v()),
            (stride_y, stride_u, stride_v),
            width,
            height,
        );

        Ok(PosterFrame::new(width as u32, height as u32, rgb))
    }
}

/// BT.601 planar YUV 4:2:0 to packed RGB8
fn yuv420_to_rgb(
    (y_plane, u_plane, v_plane): (&[u8], &[u8], &[u8]),
    (stride_y, stride_u, stride_v): (usize, usize, usize),
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut rgb = vec![0u8; width * height * 3];
    for row in 0..height {
        for col in 0..width {
            let y = y_plane[row * stride_y + col] as i32 - 16;
            let u = u_plane[(row / 2) * stride_u + col / 2] as i32 - 128;
            let v = v_plane[(row / 2) * stride_v + col / 2] as i32 - 128;

            let c = 298 * y;
            let idx = (row * width + col) * 3;
            rgb[idx] = ((c + 409 * v + 128) >> 8).clamp(0, 255) as u8;
            rgb[idx + 1] = ((c - 100 * u - 208 * v + 128) >> 8).clamp(0, 255) as u8;
            rgb[idx + 2] = ((c + 516 * u + 128) >> 8).clamp(0, 255) as u8;
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grey_roundtrip() {
        // Y=126, U=V=128 is mid grey in studio range
        let y = vec![126u8; 4 * 2];
        let u = vec![128u8; 2];
        let v = vec![128u8; 2];
        let rgb = yuv420_to_rgb((&y, &u, &v), (4, 2, 2), 4, 2);
        assert_eq!(rgb.len(), 4 * 2 * 3);
        assert!(rgb.iter().all(|&c| (126..=130).contains(&c)));
    }

    #[test]
    fn test_missing_file() {
        let result = H264PosterDecoder::new().decode(Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(result, Err(DiaryError::IoError(_))));
    }
}
