use std::io::Cursor;
use videodiary::errors::DiaryError;
use videodiary::poster::{locate_first_sample, PosterFrame};
use videodiary::testing::synthetic_mp4;

const SPS: [u8; 4] = [0x67, 0x42, 0x00, 0x1e];
const PPS: [u8; 3] = [0x68, 0xce, 0x38];

#[test]
fn test_first_sample_in_annex_b_form() {
    let idr = vec![0x65, 0x88, 0x84, 0x00, 0x10];
    let second = vec![0x41, 0x9a, 0x02];
    let file = synthetic_mp4(320, 240, &SPS, &PPS, &[idr.clone(), second]);

    let first = locate_first_sample(&mut Cursor::new(file)).unwrap();
    assert_eq!((first.width, first.height), (320, 240));
    assert_eq!(first.sps, vec![SPS.to_vec()]);
    assert_eq!(first.pps, vec![PPS.to_vec()]);

    let annex_b = first.to_annex_b().unwrap();
    let mut expected = vec![0, 0, 0, 1];
    expected.extend_from_slice(&SPS);
    expected.extend_from_slice(&[0, 0, 0, 1]);
    expected.extend_from_slice(&PPS);
    expected.extend_from_slice(&[0, 0, 0, 1]);
    expected.extend_from_slice(&idr);
    assert_eq!(annex_b, expected);
}

#[test]
fn test_garbage_is_a_decode_error() {
    let garbage = b"definitely not an mp4 file".to_vec();
    let result = locate_first_sample(&mut Cursor::new(garbage));
    assert!(matches!(result, Err(DiaryError::DecodeError(_))));
}

#[test]
fn test_truncated_file_is_a_decode_error() {
    let mut file = synthetic_mp4(64, 48, &SPS, &PPS, &[vec![0x65, 0x01, 0x02, 0x03]]);
    file.truncate(file.len() - 2);

    let result = locate_first_sample(&mut Cursor::new(file));
    assert!(matches!(result, Err(DiaryError::DecodeError(_))));
}

/// A `free` box followed by an `mdat` whose 64-bit size is `u64::MAX`
fn oversized_largesize_box() -> Vec<u8> {
    let mut file = vec![0, 0, 0, 8];
    file.extend_from_slice(b"free");
    file.extend_from_slice(&[0, 0, 0, 1]);
    file.extend_from_slice(b"mdat");
    file.extend_from_slice(&u64::MAX.to_be_bytes());
    file
}

#[test]
fn test_overflowing_box_size_is_a_decode_error() {
    let result = locate_first_sample(&mut Cursor::new(oversized_largesize_box()));
    assert!(matches!(result, Err(DiaryError::DecodeError(_))));
}

#[test]
fn test_box_larger_than_parent_is_a_decode_error() {
    let mut file = vec![0, 0, 0, 1];
    file.extend_from_slice(b"moov");
    file.extend_from_slice(&(u64::MAX - 4).to_be_bytes());
    file.extend_from_slice(&[0u8; 16]);

    let result = locate_first_sample(&mut Cursor::new(file));
    assert!(matches!(result, Err(DiaryError::DecodeError(_))));
}

#[test]
fn test_empty_file_is_a_decode_error() {
    let result = locate_first_sample(&mut Cursor::new(Vec::new()));
    assert!(matches!(result, Err(DiaryError::DecodeError(_))));
}

#[test]
fn test_poster_thumbnail_and_jpeg() {
    let frame = PosterFrame::new(640, 480, vec![200; 640 * 480 * 3]);
    let thumb = frame.thumbnail(320).unwrap();
    assert_eq!((thumb.width, thumb.height), (320, 240));

    let jpeg = thumb.to_jpeg(80).unwrap();
    assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
}

#[cfg(feature = "recording")]
mod recorded_clips {
    use std::fs::File;
    use videodiary::capture::ClipSink;
    use videodiary::poster::{locate_first_sample, H264PosterDecoder, PosterDecoder};
    use videodiary::recording::{Mp4Recorder, RecordingConfig};
    use videodiary::testing::synthetic_video_frame;

    #[tokio::test]
    async fn test_malformed_clip_falls_back_to_placeholder() {
        use std::sync::Arc;
        use videodiary::gallery::{Gallery, PosterState};
        use videodiary::storage::VideoStore;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("10.mp4"), super::oversized_largesize_box()).unwrap();
        let store = Arc::new(VideoStore::new(dir.path()));

        let mut gallery = Gallery::open(store, Arc::new(H264PosterDecoder::new()));
        gallery.load_posters().await;
        assert_eq!(gallery.poster(0), Some(&PosterState::Placeholder));
    }

    #[test]
    fn test_poster_from_recorded_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let config = RecordingConfig::new(160, 120, 1000.0);

        let mut recorder: Box<dyn ClipSink> = Box::new(Mp4Recorder::create(&path, &config).unwrap());
        for i in 0..5 {
            recorder.write_frame(&synthetic_video_frame(i, 160, 120)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        recorder.finish().unwrap();

        let first = locate_first_sample(&mut File::open(&path).unwrap()).unwrap();
        assert_eq!((first.width, first.height), (160, 120));
        assert!(!first.sample.is_empty());

        let poster = H264PosterDecoder::new().decode(&path).unwrap();
        assert_eq!((poster.width, poster.height), (160, 120));
        assert_eq!(poster.rgb.len(), 160 * 120 * 3);
    }
}
