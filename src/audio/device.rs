//! Microphone discovery through cpal

use cpal::traits::{DeviceTrait, HostTrait};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::errors::DiaryError;
use crate::types::MicrophoneInfo;

/// cpal has no portable device id, so one is derived from position and name
fn synthetic_id(index: usize, name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    format!("mic_{}_{:08x}", index, hasher.finish() & 0xFFFF_FFFF)
}

/// All input devices, the system default first, then by name
pub fn list_microphones() -> Result<Vec<MicrophoneInfo>, DiaryError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices: Vec<MicrophoneInfo> = host
        .input_devices()
        .map_err(|e| DiaryError::DeviceUnavailable(format!("Failed to enumerate microphones: {}", e)))?
        .enumerate()
        .filter_map(|(index, device)| {
            let name = device.name().ok()?;
            let config = device.default_input_config().ok()?;
            Some(MicrophoneInfo {
                id: synthetic_id(index, &name),
                name,
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
            })
        })
        .collect();

    let is_default = |mic: &MicrophoneInfo| default_name.as_deref() == Some(mic.name.as_str());
    devices.sort_by(|a, b| match (is_default(a), is_default(b)) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });

    Ok(devices)
}

/// The system default input device
pub fn default_microphone() -> Result<MicrophoneInfo, DiaryError> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| DiaryError::DeviceUnavailable("No default microphone".to_string()))?;

    let name = device
        .name()
        .map_err(|e| DiaryError::DeviceUnavailable(format!("Failed to get microphone name: {}", e)))?;
    let config = device
        .default_input_config()
        .map_err(|e| DiaryError::DeviceUnavailable(format!("Failed to get microphone config: {}", e)))?;

    Ok(MicrophoneInfo {
        id: synthetic_id(0, &name),
        name,
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}

/// The cpal input device behind `microphone`, matched by name
pub(crate) fn find_input_device(microphone: &MicrophoneInfo) -> Result<cpal::Device, DiaryError> {
    let host = cpal::default_host();
    let mut devices = host
        .input_devices()
        .map_err(|e| DiaryError::DeviceUnavailable(format!("Failed to enumerate microphones: {}", e)))?;

    devices
        .find(|d| d.name().ok().as_deref() == Some(microphone.name.as_str()))
        .or_else(|| host.default_input_device())
        .ok_or_else(|| {
            DiaryError::DeviceUnavailable(format!("Microphone not found: {}", microphone.name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_id_is_stable() {
        assert_eq!(synthetic_id(0, "Built-in"), synthetic_id(0, "Built-in"));
        assert_ne!(synthetic_id(0, "Built-in"), synthetic_id(1, "Built-in"));
        assert!(synthetic_id(2, "USB").starts_with("mic_2_"));
    }

    #[test]
    fn test_list_microphones_no_panic() {
        let _ = list_microphones();
    }

    #[test]
    fn test_default_microphone_is_listed() {
        if let (Ok(default), Ok(all)) = (default_microphone(), list_microphones()) {
            assert!(all.iter().any(|m| m.name == default.name));
        }
    }
}
