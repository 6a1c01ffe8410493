//! H.264 encoder wrapper using openh264

use crate::errors::DiaryError;
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl H264Encoder {
    /// Create an encoder for frames of the given size
    ///
    /// YUV 4:2:0 needs even dimensions, so odd sizes lose their last row or
    /// column. Rate control uses openh264 defaults.
    pub fn new(width: u32, height: u32) -> Result<Self, DiaryError> {
        let (width, height) = (width & !1, height & !1);
        if width == 0 || height == 0 {
            return Err(DiaryError::EncodingError(format!(
                "Frame too small to encode: {}x{}",
                width, height
            )));
        }

        let encoder = Encoder::new()
            .map_err(|e| DiaryError::EncodingError(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
        })
    }

    /// Encoded dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encode an RGB8 frame of `source_width` pixels per row
    ///
    /// Returns the NAL units as one Annex B buffer.
    pub fn encode_rgb(&mut self, rgb: &[u8], source_width: u32) -> Result<EncodedFrame, DiaryError> {
        let needed = (source_width as usize) * (self.height as usize) * 3;
        if source_width < self.width || rgb.len() < needed {
            return Err(DiaryError::EncodingError(format!(
                "Invalid frame: {} bytes at width {}, encoder expects {}x{}",
                rgb.len(),
                source_width,
                self.width,
                self.height
            )));
        }

        let yuv = rgb_to_yuv420(rgb, source_width, self.width, self.height);
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| DiaryError::EncodingError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;
        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Annex B bitstream (start-code delimited)
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// BT.601 RGB24 to planar YUV 4:2:0, cropping rows to `width`
fn rgb_to_yuv420(rgb: &[u8], stride: u32, width: u32, height: u32) -> Vec<u8> {
    let (stride, w, h) = (stride as usize, width as usize, height as usize);

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let idx = (y * stride + x) * 3;
            let r = rgb[idx] as i32;
            let g = rgb[idx + 1] as i32;
            let b = rgb[idx + 2] as i32;

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
