//! MP4 clip writer: openh264 video and Opus audio muxed by muxide

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(feature = "audio")]
use muxide::api::AudioCodec;
use muxide::api::{Metadata, MuxerBuilder, VideoCodec};

use super::config::RecordingConfig;
use super::encoder::H264Encoder;
#[cfg(feature = "audio")]
use crate::audio::{OpusEncoder, DEFAULT_AUDIO_BITRATE};
use crate::capture::backend::{ClipSink, ClipStats};
use crate::errors::DiaryError;
use crate::types::{AudioFrame, CameraFrame};

/// Writes camera frames into an H.264 MP4 file, with an Opus track when the
/// config asks for audio
pub struct Mp4Recorder {
    encoder: H264Encoder,
    #[cfg(feature = "audio")]
    audio: Option<OpusEncoder>,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    output_path: PathBuf,
    frame_count: u64,
    dropped_frames: u64,
    last_frame_time: Option<Instant>,
    frame_duration_secs: f64,
}

impl Mp4Recorder {
    pub fn create<P: AsRef<Path>>(output_path: P, config: &RecordingConfig) -> Result<Self, DiaryError> {
        let output_path = output_path.as_ref().to_path_buf();
        let file = File::create(&output_path)
            .map_err(|e| DiaryError::IoError(format!("Failed to create {:?}: {}", output_path, e)))?;

        let encoder = H264Encoder::new(config.width, config.height)?;
        let (width, height) = encoder.dimensions();

        let mut metadata = Metadata::new().with_current_time();
        if let Some(title) = &config.title {
            metadata = metadata.with_title(title);
        }

        #[cfg_attr(not(feature = "audio"), allow(unused_mut))]
        let mut builder = MuxerBuilder::new(BufWriter::new(file))
            .video(VideoCodec::H264, width, height, config.fps)
            .with_fast_start(config.fast_start)
            .with_metadata(metadata);

        #[cfg(feature = "audio")]
        let audio = match config.audio {
            Some(format) => {
                let encoder = OpusEncoder::new(format, DEFAULT_AUDIO_BITRATE)?;
                builder = builder.audio(AudioCodec::Opus, format.sample_rate, format.channels);
                Some(encoder)
            }
            None => None,
        };
        #[cfg(not(feature = "audio"))]
        if config.audio.is_some() {
            log::warn!("Built without audio support; {:?} will be video-only", output_path);
        }

        let muxer = builder
            .build()
            .map_err(|e| DiaryError::MuxingError(format!("Failed to create muxer: {}", e)))?;

        log::debug!(
            "MP4 recorder at {:?}: {}x{} @ {} fps, {} bps",
            output_path,
            width,
            height,
            config.fps,
            config.bitrate
        );

        Ok(Self {
            encoder,
            #[cfg(feature = "audio")]
            audio,
            muxer,
            output_path,
            frame_count: 0,
            dropped_frames: 0,
            last_frame_time: None,
            frame_duration_secs: 1.0 / config.fps.max(1.0),
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn has_audio(&self) -> bool {
        #[cfg(feature = "audio")]
        {
            self.audio.is_some()
        }
        #[cfg(not(feature = "audio"))]
        {
            false
        }
    }

    #[cfg(feature = "audio")]
    fn write_packets(&mut self, packets: Vec<crate::audio::OpusPacket>) -> Result<(), DiaryError> {
        for packet in packets {
            self.muxer
                .write_audio(packet.timestamp, &packet.data)
                .map_err(|e| DiaryError::MuxingError(format!("Failed to write audio: {}", e)))?;
        }
        Ok(())
    }
}

impl ClipSink for Mp4Recorder {
    fn write_frame(&mut self, frame: &CameraFrame) -> Result<(), DiaryError> {
        let now = Instant::now();

        // Frames arriving faster than the container rate are dropped.
        if let Some(last) = self.last_frame_time {
            if now.duration_since(last).as_secs_f64() < self.frame_duration_secs * 0.8 {
                self.dropped_frames += 1;
                return Ok(());
            }
        }

        let encoded = self.encoder.encode_rgb(&frame.data, frame.width)?;
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| DiaryError::MuxingError(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        self.last_frame_time = Some(now);
        Ok(())
    }

    fn write_audio(&mut self, frame: &AudioFrame) -> Result<(), DiaryError> {
        #[cfg(feature = "audio")]
        if let Some(encoder) = self.audio.as_mut() {
            let packets = encoder.encode(frame)?;
            self.write_packets(packets)?;
        }
        #[cfg(not(feature = "audio"))]
        let _ = frame;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<ClipStats, DiaryError> {
        #[cfg(feature = "audio")]
        if let Some(encoder) = self.audio.as_mut() {
            let packets = encoder.flush()?;
            self.write_packets(packets)?;
        }

        let Mp4Recorder {
            muxer,
            output_path,
            dropped_frames,
            ..
        } = *self;

        let stats = muxer
            .finish_with_stats()
            .map_err(|e| DiaryError::MuxingError(format!("Failed to finalize clip: {}", e)))?;

        Ok(ClipStats {
            video_frames: stats.video_frames,
            audio_frames: stats.audio_frames,
            dropped_frames,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
            output_path,
        })
    }
}
