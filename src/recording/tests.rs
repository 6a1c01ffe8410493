//! Tests for the recording module

#[cfg(test)]
mod recording_tests {
    use crate::recording::{RecordingConfig, RecordingQuality};
    use crate::types::CameraFormat;

    #[test]
    fn test_quality_presets() {
        assert!(RecordingQuality::Low.bitrate() < RecordingQuality::Medium.bitrate());
        assert!(RecordingQuality::Medium.bitrate() < RecordingQuality::High.bitrate());
        assert_eq!(RecordingQuality::default(), RecordingQuality::Medium);
    }

    #[test]
    fn test_quality_from_name() {
        assert_eq!(RecordingQuality::from_name("HIGH"), Some(RecordingQuality::High));
        assert_eq!(RecordingQuality::from_name("low"), Some(RecordingQuality::Low));
        assert_eq!(RecordingQuality::from_name("ultra"), None);
    }

    #[test]
    fn test_config_for_format() {
        let config = RecordingConfig::for_format(&CameraFormat::hd(), RecordingQuality::High);
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.fps, 30.0);
        assert_eq!(config.bitrate, RecordingQuality::High.bitrate());
        assert!(config.fast_start);
    }

    #[test]
    fn test_config_with_title() {
        let config = RecordingConfig::default().with_title("Monday");
        assert_eq!(config.title, Some("Monday".to_string()));
    }
}
