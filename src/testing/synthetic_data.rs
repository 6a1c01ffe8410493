//! Synthetic frames and container files
//!
//! Lets the capture pipeline and the poster locator run offline, without a
//! camera or an encoder.

use crate::types::{AudioFrame, CameraFrame};
use byteorder::{BigEndian, WriteBytesExt};

/// Gradient frame whose content shifts with `frame_number`
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> CameraFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    CameraFrame::new(data, width, height, "synthetic_front".to_string())
}

/// Stereo 440 Hz tone at 48 kHz, continuous across consecutive frame numbers
pub fn synthetic_audio_frame(frame_number: u64, samples_per_channel: usize) -> AudioFrame {
    const RATE: f64 = 48_000.0;
    let first = frame_number * samples_per_channel as u64;

    let samples = (0..samples_per_channel)
        .flat_map(|i| {
            let t = (first + i as u64) as f64 / RATE;
            let value = ((std::f64::consts::TAU * 440.0 * t).sin() * 0.3) as f32;
            [value, value]
        })
        .collect();

    AudioFrame {
        samples,
        sample_rate: 48_000,
        channels: 2,
        timestamp: first as f64 / RATE,
    }
}

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn avcc_payload(sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let profile = sps.get(1).copied().unwrap_or(66);
    let compat = sps.get(2).copied().unwrap_or(0);
    let level = sps.get(3).copied().unwrap_or(30);

    let mut out = vec![1, profile, compat, level, 0xFF, 0xE1];
    out.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    out.extend_from_slice(sps);
    out.push(1);
    out.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    out.extend_from_slice(pps);
    out
}

fn avc1_entry(width: u16, height: u16, sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let mut payload = vec![0u8; 6];
    payload.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    payload.extend_from_slice(&[0u8; 16]);
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&height.to_be_bytes());
    payload.extend_from_slice(&[0u8; 50]);
    payload.extend_from_slice(&mp4_box(b"avcC", &avcc_payload(sps, pps)));
    mp4_box(b"avc1", &payload)
}

fn moov(width: u16, height: u16, sps: &[u8], pps: &[u8], sizes: &[u32], chunk_offset: u32) -> Vec<u8> {
    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0u8; 12]);
    hdlr.extend_from_slice(b"VideoHandler\0");

    let mut stsd = vec![0u8; 4];
    stsd.extend_from_slice(&1u32.to_be_bytes());
    stsd.extend_from_slice(&avc1_entry(width, height, sps, pps));

    let mut stsz = vec![0u8; 8];
    stsz.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
    for size in sizes {
        stsz.extend_from_slice(&size.to_be_bytes());
    }

    let mut stco = vec![0u8; 4];
    stco.extend_from_slice(&1u32.to_be_bytes());
    stco.extend_from_slice(&chunk_offset.to_be_bytes());

    let stbl = mp4_box(
        b"stbl",
        &[
            mp4_box(b"stsd", &stsd),
            mp4_box(b"stsz", &stsz),
            mp4_box(b"stco", &stco),
        ]
        .concat(),
    );
    let minf = mp4_box(b"minf", &stbl);
    let mdia = mp4_box(b"mdia", &[mp4_box(b"hdlr", &hdlr), minf].concat());
    mp4_box(b"moov", &mp4_box(b"trak", &mdia))
}

/// Minimal single-track H.264 MP4: `ftyp`, `moov`, then `mdat`
///
/// Every entry of `samples` becomes one length-prefixed NAL unit, all stored
/// in a single chunk.
pub fn synthetic_mp4(width: u16, height: u16, sps: &[u8], pps: &[u8], samples: &[Vec<u8>]) -> Vec<u8> {
    let mut mdat = Vec::new();
    let mut sizes = Vec::with_capacity(samples.len());
    for nal in samples {
        // Writes into a Vec cannot fail.
        let _ = mdat.write_u32::<BigEndian>(nal.len() as u32);
        mdat.extend_from_slice(nal);
        sizes.push(nal.len() as u32 + 4);
    }

    let mut ftyp = b"isom".to_vec();
    ftyp.extend_from_slice(&512u32.to_be_bytes());
    ftyp.extend_from_slice(b"isomavc1");
    let ftyp = mp4_box(b"ftyp", &ftyp);

    let moov_len = moov(width, height, sps, pps, &sizes, 0).len();
    let chunk_offset = (ftyp.len() + moov_len + 8) as u32;
    let moov = moov(width, height, sps, pps, &sizes, chunk_offset);

    [ftyp, moov, mp4_box(b"mdat", &mdat)].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_video_frame_correct_size() {
        let frame = synthetic_video_frame(0, 320, 240);
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.data.len(), 320 * 240 * 3);
    }

    #[test]
    fn test_synthetic_video_frames_differ() {
        let frame0 = synthetic_video_frame(0, 32, 24);
        let frame1 = synthetic_video_frame(1, 32, 24);
        assert_ne!(frame0.data[0], frame1.data[0]);
    }

    #[test]
    fn test_synthetic_mp4_layout() {
        let file = synthetic_mp4(16, 16, &[0x67, 66, 0, 30], &[0x68, 0xCE], &[vec![0x65, 1, 2]]);
        assert_eq!(&file[4..8], b"ftyp");
        let mdat_payload = &file[file.len() - 7..];
        assert_eq!(mdat_payload, &[0, 0, 0, 3, 0x65, 1, 2]);
    }
}
