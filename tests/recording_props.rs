//! Property-based tests for clip recording
//!
//! Run with: cargo test --test recording_props --features recording

use proptest::prelude::*;
use tempfile::tempdir;
use videodiary::capture::ClipSink;
use videodiary::recording::{H264Encoder, Mp4Recorder, RecordingConfig, RecordingQuality};
use videodiary::testing::synthetic_video_frame;
use videodiary::types::CameraFormat;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Any non-degenerate frame size gets an encoder with even dimensions
    #[test]
    fn encoder_dimensions_are_even(width in 2u32..400, height in 2u32..300) {
        let encoder = H264Encoder::new(width, height).unwrap();
        let (w, h) = encoder.dimensions();
        prop_assert_eq!(w % 2, 0);
        prop_assert_eq!(h % 2, 0);
        prop_assert!(w <= width && width - w <= 1);
        prop_assert!(h <= height && height - h <= 1);
    }

    /// Encoded output is an Annex B bitstream
    #[test]
    fn encoded_frames_are_annex_b(gray_level in 0u8..=255) {
        let (width, height) = (64u32, 48u32);
        let mut encoder = H264Encoder::new(width, height).unwrap();
        let rgb = vec![gray_level; (width * height * 3) as usize];

        let encoded = encoder.encode_rgb(&rgb, width).unwrap();
        prop_assert!(!encoded.data.is_empty());
        prop_assert!(
            encoded.data.starts_with(&[0, 0, 0, 1]) || encoded.data.starts_with(&[0, 0, 1]),
            "unexpected prefix {:02x?}",
            &encoded.data[..encoded.data.len().min(4)]
        );
        prop_assert_eq!(encoder.frame_count(), 1);
    }

    /// Buffers shorter than one frame are rejected, never read past
    #[test]
    fn short_buffers_rejected(missing in 1usize..1000) {
        let (width, height) = (32u32, 32u32);
        let mut encoder = H264Encoder::new(width, height).unwrap();
        let full = (width * height * 3) as usize;
        let rgb = vec![0u8; full - missing.min(full)];

        prop_assert!(encoder.encode_rgb(&rgb, width).is_err());
    }

    /// Recording config follows the camera format it was built for
    #[test]
    fn config_follows_camera_format(width in 16u32..2000, height in 16u32..2000, fps in 1.0f32..120.0) {
        let format = CameraFormat::new(width, height, fps);
        let config = RecordingConfig::for_format(&format, RecordingQuality::High);

        prop_assert_eq!(config.width, width);
        prop_assert_eq!(config.height, height);
        prop_assert!((config.fps - fps as f64).abs() < 1e-3);
        prop_assert_eq!(config.bitrate, RecordingQuality::High.bitrate());
    }
}

#[test]
fn recorder_counts_written_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let config = RecordingConfig::new(96, 64, 1000.0);

    let mut recorder: Box<dyn ClipSink> = Box::new(Mp4Recorder::create(&path, &config).unwrap());
    for i in 0..8 {
        recorder.write_frame(&synthetic_video_frame(i, 96, 64)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    let stats = recorder.finish().unwrap();

    assert!(stats.video_frames >= 1);
    assert!(stats.video_frames + stats.dropped_frames == 8);
    assert_eq!(stats.output_path, path);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
