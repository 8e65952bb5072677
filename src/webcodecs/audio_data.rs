//! AudioData - WebCodecs API implementation
//!
//! Represents uncompressed audio samples that can be encoded or rendered.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioData
//!
//! Ownership mirrors VideoFrame: samples live in a shared, reference-counted
//! buffer; `clone` shares it, `close` releases this wrapper's reference.

use std::sync::{Arc, Mutex};

use crate::backend::DecodedAudio;
use crate::webcodecs::error::{invalid_state_error, not_supported_error, type_error, Result};

/// Audio sample format (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSampleFormat {
  /// Unsigned 8-bit integer samples, interleaved
  U8,
  /// Signed 16-bit integer samples, interleaved
  S16,
  /// Signed 32-bit integer samples, interleaved
  S32,
  /// 32-bit float samples, interleaved
  F32,
  /// Unsigned 8-bit integer samples, planar
  U8Planar,
  /// Signed 16-bit integer samples, planar
  S16Planar,
  /// Signed 32-bit integer samples, planar
  S32Planar,
  /// 32-bit float samples, planar
  F32Planar,
}

impl AudioSampleFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      AudioSampleFormat::U8 => "u8",
      AudioSampleFormat::S16 => "s16",
      AudioSampleFormat::S32 => "s32",
      AudioSampleFormat::F32 => "f32",
      AudioSampleFormat::U8Planar => "u8-planar",
      AudioSampleFormat::S16Planar => "s16-planar",
      AudioSampleFormat::S32Planar => "s32-planar",
      AudioSampleFormat::F32Planar => "f32-planar",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    Ok(match value {
      "u8" => AudioSampleFormat::U8,
      "s16" => AudioSampleFormat::S16,
      "s32" => AudioSampleFormat::S32,
      "f32" => AudioSampleFormat::F32,
      "u8-planar" => AudioSampleFormat::U8Planar,
      "s16-planar" => AudioSampleFormat::S16Planar,
      "s32-planar" => AudioSampleFormat::S32Planar,
      "f32-planar" => AudioSampleFormat::F32Planar,
      other => return Err(type_error(&format!("Invalid format: {}", other))),
    })
  }

  pub fn is_planar(&self) -> bool {
    matches!(
      self,
      AudioSampleFormat::U8Planar
        | AudioSampleFormat::S16Planar
        | AudioSampleFormat::S32Planar
        | AudioSampleFormat::F32Planar
    )
  }

  pub fn bytes_per_sample(&self) -> u32 {
    match self {
      AudioSampleFormat::U8 | AudioSampleFormat::U8Planar => 1,
      AudioSampleFormat::S16 | AudioSampleFormat::S16Planar => 2,
      AudioSampleFormat::S32
      | AudioSampleFormat::S32Planar
      | AudioSampleFormat::F32
      | AudioSampleFormat::F32Planar => 4,
    }
  }
}

/// Options for creating AudioData
#[derive(Debug, Clone)]
pub struct AudioDataInit<'a> {
  pub format: AudioSampleFormat,
  /// Sample rate in Hz
  pub sample_rate: f32,
  /// Frames (samples per channel)
  pub number_of_frames: u32,
  pub number_of_channels: u32,
  /// Timestamp in microseconds
  pub timestamp: i64,
  /// Sample bytes; copied at construction
  pub data: &'a [u8],
}

/// Options for copyTo and allocationSize
#[derive(Debug, Clone, Default)]
pub struct AudioDataCopyToOptions {
  /// Which plane to copy (0 for interleaved formats)
  pub plane_index: u32,
  /// First frame to copy (default 0)
  pub frame_offset: u32,
  /// Number of frames to copy (default: the rest)
  pub frame_count: Option<u32>,
  /// Target format; only `f32-planar` conversion is supported
  pub format: Option<AudioSampleFormat>,
}

struct AudioResource {
  buffer: Arc<Vec<u8>>,
  format: AudioSampleFormat,
  sample_rate: f32,
  number_of_frames: u32,
  number_of_channels: u32,
}

/// AudioData - uncompressed audio samples with timing metadata
pub struct AudioData {
  timestamp_us: i64,
  resource: Mutex<Option<AudioResource>>,
}

impl std::fmt::Debug for AudioData {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AudioData")
      .field("timestamp", &self.timestamp_us)
      .field("closed", &self.closed())
      .finish()
  }
}

impl AudioData {
  /// Create a new AudioData. The sample bytes are copied.
  pub fn new(init: AudioDataInit<'_>) -> Result<Self> {
    if init.sample_rate <= 0.0 {
      return Err(type_error("sampleRate must be greater than 0"));
    }
    if init.number_of_frames == 0 {
      return Err(type_error("numberOfFrames must be greater than 0"));
    }
    if init.number_of_channels == 0 {
      return Err(type_error("numberOfChannels must be greater than 0"));
    }

    let required = (init.number_of_frames
      * init.number_of_channels
      * init.format.bytes_per_sample()) as usize;
    if init.data.len() < required {
      return Err(type_error(&format!(
        "Buffer too small: need {} bytes, got {}",
        required,
        init.data.len()
      )));
    }

    Ok(Self {
      timestamp_us: init.timestamp,
      resource: Mutex::new(Some(AudioResource {
        buffer: Arc::new(init.data[..required].to_vec()),
        format: init.format,
        sample_rate: init.sample_rate,
        number_of_frames: init.number_of_frames,
        number_of_channels: init.number_of_channels,
      })),
    })
  }

  /// Create AudioData from decoder output (crate-internal)
  pub(crate) fn from_decoded(decoded: DecodedAudio) -> Self {
    Self {
      timestamp_us: decoded.pts,
      resource: Mutex::new(Some(AudioResource {
        buffer: Arc::new(decoded.data),
        format: decoded.format,
        sample_rate: decoded.sample_rate,
        number_of_frames: decoded.number_of_frames,
        number_of_channels: decoded.number_of_channels,
      })),
    }
  }

  /// The sample format, or `None` once closed
  pub fn format(&self) -> Option<AudioSampleFormat> {
    let guard = self.resource.lock().expect("audio lock poisoned");
    guard.as_ref().map(|resource| resource.format)
  }

  /// Sample rate in Hz (0 when closed)
  pub fn sample_rate(&self) -> f32 {
    let guard = self.resource.lock().expect("audio lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.sample_rate)
      .unwrap_or(0.0)
  }

  /// Frames per channel (0 when closed)
  pub fn number_of_frames(&self) -> u32 {
    let guard = self.resource.lock().expect("audio lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.number_of_frames)
      .unwrap_or(0)
  }

  /// Channel count (0 when closed)
  pub fn number_of_channels(&self) -> u32 {
    let guard = self.resource.lock().expect("audio lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.number_of_channels)
      .unwrap_or(0)
  }

  /// 1 for interleaved formats, `numberOfChannels` for planar
  pub fn number_of_planes(&self) -> u32 {
    let guard = self.resource.lock().expect("audio lock poisoned");
    guard
      .as_ref()
      .map(|resource| {
        if resource.format.is_planar() {
          resource.number_of_channels
        } else {
          1
        }
      })
      .unwrap_or(0)
  }

  /// Timestamp in microseconds; remains readable after close
  pub fn timestamp(&self) -> i64 {
    self.timestamp_us
  }

  /// Duration in microseconds, derived as numberOfFrames * 1e6 / sampleRate.
  /// Remains readable after close.
  pub fn duration(&self) -> i64 {
    let guard = self.resource.lock().expect("audio lock poisoned");
    match guard.as_ref() {
      Some(resource) => {
        (resource.number_of_frames as f64 * 1_000_000.0 / resource.sample_rate as f64) as i64
      }
      None => 0,
    }
  }

  pub fn closed(&self) -> bool {
    self.resource.lock().expect("audio lock poisoned").is_none()
  }

  /// Run `f` over the backing sample bytes without copying
  pub fn with_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
    let guard = self.resource.lock().expect("audio lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;
    Ok(f(&resource.buffer))
  }

  /// Bytes required by `copy_to` under the same options
  pub fn allocation_size(&self, options: &AudioDataCopyToOptions) -> Result<u32> {
    let guard = self.resource.lock().expect("audio lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;
    let plan = resolve_copy(resource, options)?;
    Ok(plan.byte_length)
  }

  /// Copy (and when requested, convert) one plane of samples into
  /// `destination`.
  ///
  /// Fails with TypeError when the destination is too small or the plane
  /// index is out of range; conversion targets other than `f32-planar` fail
  /// with NotSupportedError.
  pub fn copy_to(&self, destination: &mut [u8], options: &AudioDataCopyToOptions) -> Result<()> {
    let guard = self.resource.lock().expect("audio lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;

    let plan = resolve_copy(resource, options)?;
    if destination.len() < plan.byte_length as usize {
      return Err(type_error(&format!(
        "destination is too small: need {} bytes, got {}",
        plan.byte_length,
        destination.len()
      )));
    }

    let src = &resource.buffer;
    let bps = resource.format.bytes_per_sample() as usize;
    let channels = resource.number_of_channels as usize;
    let plane = options.plane_index as usize;
    let frame0 = options.frame_offset as usize;

    if plan.convert_to_f32 {
      // Convert to f32-planar: read frame-by-frame from the source plane
      for i in 0..plan.frame_count as usize {
        let src_index = if resource.format.is_planar() {
          (plane * resource.number_of_frames as usize + frame0 + i) * bps
        } else {
          ((frame0 + i) * channels + plane) * bps
        };
        let sample = read_sample_as_f32(resource.format, &src[src_index..src_index + bps]);
        destination[i * 4..i * 4 + 4].copy_from_slice(&sample.to_ne_bytes());
      }
    } else {
      // Identity copy of the requested plane region
      let (start, len) = if resource.format.is_planar() {
        (
          (plane * resource.number_of_frames as usize + frame0) * bps,
          plan.frame_count as usize * bps,
        )
      } else {
        (
          frame0 * channels * bps,
          plan.frame_count as usize * channels * bps,
        )
      };
      destination[..len].copy_from_slice(&src[start..start + len]);
    }

    Ok(())
  }

  /// Create a new AudioData sharing this one's sample buffer.
  /// Fails with InvalidStateError when closed.
  #[allow(clippy::should_implement_trait)]
  pub fn clone(&self) -> Result<AudioData> {
    let guard = self.resource.lock().expect("audio lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;
    Ok(AudioData {
      timestamp_us: self.timestamp_us,
      resource: Mutex::new(Some(AudioResource {
        buffer: resource.buffer.clone(),
        format: resource.format,
        sample_rate: resource.sample_rate,
        number_of_frames: resource.number_of_frames,
        number_of_channels: resource.number_of_channels,
      })),
    })
  }

  /// Release this wrapper's buffer reference. Double close is a no-op.
  pub fn close(&self) {
    let mut guard = self.resource.lock().expect("audio lock poisoned");
    guard.take();
  }
}

struct CopyPlan {
  frame_count: u32,
  byte_length: u32,
  convert_to_f32: bool,
}

fn resolve_copy(resource: &AudioResource, options: &AudioDataCopyToOptions) -> Result<CopyPlan> {
  let convert_to_f32 = match options.format {
    None => false,
    Some(format) if format == resource.format => false,
    Some(AudioSampleFormat::F32Planar) => true,
    Some(format) => {
      return Err(not_supported_error(&format!(
        "cannot convert {} to {}",
        resource.format.as_str(),
        format.as_str()
      )));
    }
  };

  // The plane index is interpreted against the destination format: one
  // plane per channel after f32-planar conversion
  let planes = if convert_to_f32 || resource.format.is_planar() {
    resource.number_of_channels
  } else {
    1
  };
  if options.plane_index >= planes {
    return Err(type_error(&format!(
      "planeIndex {} out of range for {} planes",
      options.plane_index, planes
    )));
  }
  if options.frame_offset >= resource.number_of_frames {
    return Err(type_error("frameOffset exceeds frame count"));
  }
  let available = resource.number_of_frames - options.frame_offset;
  let frame_count = match options.frame_count {
    Some(count) if count > available => {
      return Err(type_error("frameCount exceeds available frames"));
    }
    Some(count) => count,
    None => available,
  };

  let byte_length = if convert_to_f32 {
    frame_count * 4
  } else if resource.format.is_planar() {
    frame_count * resource.format.bytes_per_sample()
  } else {
    frame_count * resource.number_of_channels * resource.format.bytes_per_sample()
  };

  Ok(CopyPlan {
    frame_count,
    byte_length,
    convert_to_f32,
  })
}

fn read_sample_as_f32(format: AudioSampleFormat, bytes: &[u8]) -> f32 {
  match format {
    AudioSampleFormat::U8 | AudioSampleFormat::U8Planar => (bytes[0] as f32 - 128.0) / 128.0,
    AudioSampleFormat::S16 | AudioSampleFormat::S16Planar => {
      i16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / 32768.0
    }
    AudioSampleFormat::S32 | AudioSampleFormat::S32Planar => {
      i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 2147483648.0
    }
    AudioSampleFormat::F32 | AudioSampleFormat::F32Planar => {
      f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn f32_data(frames: u32, channels: u32, timestamp: i64) -> AudioData {
    let samples: Vec<f32> = (0..frames * channels).map(|i| i as f32 / 100.0).collect();
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
    AudioData::new(AudioDataInit {
      format: AudioSampleFormat::F32,
      sample_rate: 48000.0,
      number_of_frames: frames,
      number_of_channels: channels,
      timestamp,
      data: &bytes,
    })
    .unwrap()
  }

  #[test]
  fn test_construction_and_duration() {
    let data = f32_data(480, 2, 1000);
    assert_eq!(data.format(), Some(AudioSampleFormat::F32));
    assert_eq!(data.sample_rate(), 48000.0);
    assert_eq!(data.number_of_frames(), 480);
    assert_eq!(data.number_of_channels(), 2);
    assert_eq!(data.number_of_planes(), 1);
    assert_eq!(data.timestamp(), 1000);
    // 480 frames at 48 kHz = 10 ms
    assert_eq!(data.duration(), 10_000);
  }

  #[test]
  fn test_invalid_init() {
    let bytes = vec![0u8; 64];
    assert!(AudioData::new(AudioDataInit {
      format: AudioSampleFormat::S16,
      sample_rate: 0.0,
      number_of_frames: 16,
      number_of_channels: 2,
      timestamp: 0,
      data: &bytes,
    })
    .is_err());
    assert!(AudioData::new(AudioDataInit {
      format: AudioSampleFormat::S16,
      sample_rate: 48000.0,
      number_of_frames: 0,
      number_of_channels: 2,
      timestamp: 0,
      data: &bytes,
    })
    .is_err());
    // Buffer too small
    assert!(AudioData::new(AudioDataInit {
      format: AudioSampleFormat::S16,
      sample_rate: 48000.0,
      number_of_frames: 64,
      number_of_channels: 2,
      timestamp: 0,
      data: &bytes,
    })
    .is_err());
  }

  #[test]
  fn test_planar_plane_count() {
    let bytes = vec![0u8; 16 * 2 * 4];
    let data = AudioData::new(AudioDataInit {
      format: AudioSampleFormat::F32Planar,
      sample_rate: 44100.0,
      number_of_frames: 16,
      number_of_channels: 2,
      timestamp: 0,
      data: &bytes,
    })
    .unwrap();
    assert_eq!(data.number_of_planes(), 2);
  }

  #[test]
  fn test_copy_identity() {
    let data = f32_data(8, 2, 0);
    let options = AudioDataCopyToOptions::default();
    let size = data.allocation_size(&options).unwrap();
    assert_eq!(size, 8 * 2 * 4);
    let mut out = vec![0u8; size as usize];
    data.copy_to(&mut out, &options).unwrap();
    let first = f32::from_ne_bytes([out[0], out[1], out[2], out[3]]);
    assert_eq!(first, 0.0);
    let second = f32::from_ne_bytes([out[4], out[5], out[6], out[7]]);
    assert!((second - 0.01).abs() < 1e-6);
  }

  #[test]
  fn test_copy_converts_s16_to_f32_planar() {
    let samples: Vec<i16> = vec![0, i16::MAX, i16::MIN, 0];
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
    let data = AudioData::new(AudioDataInit {
      format: AudioSampleFormat::S16,
      sample_rate: 48000.0,
      number_of_frames: 2,
      number_of_channels: 2,
      timestamp: 0,
      data: &bytes,
    })
    .unwrap();

    // Extract channel 1 as f32
    let options = AudioDataCopyToOptions {
      plane_index: 1,
      format: Some(AudioSampleFormat::F32Planar),
      ..Default::default()
    };
    let mut out = vec![0u8; data.allocation_size(&options).unwrap() as usize];
    data.copy_to(&mut out, &options).unwrap();
    let first = f32::from_ne_bytes([out[0], out[1], out[2], out[3]]);
    assert!((first - (i16::MAX as f32 / 32768.0)).abs() < 1e-6);
    let second = f32::from_ne_bytes([out[4], out[5], out[6], out[7]]);
    assert_eq!(second, 0.0);
  }

  #[test]
  fn test_copy_plane_index_out_of_range() {
    let data = f32_data(8, 2, 0);
    let options = AudioDataCopyToOptions {
      plane_index: 1,
      ..Default::default()
    };
    // Interleaved data has exactly one plane
    assert!(data.copy_to(&mut [0u8; 64], &options).is_err());
  }

  #[test]
  fn test_close_semantics() {
    let data = f32_data(8, 2, 777);
    let clone = data.clone().unwrap();
    data.close();

    assert!(data.closed());
    assert_eq!(data.timestamp(), 777);
    assert_eq!(data.format(), None);
    assert_eq!(data.number_of_frames(), 0);
    assert!(data.clone().is_err());
    assert!(data
      .copy_to(&mut [0u8; 64], &AudioDataCopyToOptions::default())
      .is_err());

    // Double close is a no-op
    data.close();

    // The clone still works
    assert_eq!(clone.number_of_frames(), 8);
    let mut out = vec![0u8; 64];
    clone
      .copy_to(&mut out, &AudioDataCopyToOptions::default())
      .unwrap();
  }
}
