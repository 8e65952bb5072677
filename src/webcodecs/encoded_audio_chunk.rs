//! EncodedAudioChunk - WebCodecs API implementation
//!
//! Represents a chunk of encoded audio data.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedAudioChunk
//!
//! The audio encoder/decoder configuration dictionaries live here alongside
//! the chunk type, mirroring the video side.

use std::sync::Arc;

use crate::backend::EncodedPacket;
use crate::webcodecs::error::{type_error, Result};

/// Type of encoded audio chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedAudioChunkType {
  /// Keyframe - can be decoded independently
  Key,
  /// Delta frame - depends on previous frames
  Delta,
}

impl EncodedAudioChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EncodedAudioChunkType::Key => "key",
      EncodedAudioChunkType::Delta => "delta",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    match value {
      "key" => Ok(EncodedAudioChunkType::Key),
      "delta" => Ok(EncodedAudioChunkType::Delta),
      other => Err(type_error(&format!("Invalid chunk type: {}", other))),
    }
  }
}

/// Bitrate mode for audio encoding (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioBitrateMode {
  /// Variable bitrate (default)
  #[default]
  Variable,
  /// Constant bitrate
  Constant,
}

impl AudioBitrateMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      AudioBitrateMode::Variable => "variable",
      AudioBitrateMode::Constant => "constant",
    }
  }
}

/// Options for creating an EncodedAudioChunk
#[derive(Debug, Clone, Copy)]
pub struct EncodedAudioChunkInit<'a> {
  /// Chunk type (key or delta)
  pub chunk_type: EncodedAudioChunkType,
  /// Timestamp in microseconds (full 64-bit range, negatives included)
  pub timestamp: i64,
  /// Duration in microseconds (optional)
  pub duration: Option<i64>,
  /// Encoded bytes; copied at construction
  pub data: &'a [u8],
}

struct EncodedAudioChunkInner {
  data: Vec<u8>,
  chunk_type: EncodedAudioChunkType,
  timestamp_us: i64,
  duration_us: Option<i64>,
}

/// EncodedAudioChunk - represents encoded audio data
///
/// Immutable after construction; the bytes are a private copy taken at
/// construction.
#[derive(Clone)]
pub struct EncodedAudioChunk {
  inner: Arc<EncodedAudioChunkInner>,
}

impl std::fmt::Debug for EncodedAudioChunk {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EncodedAudioChunk")
      .field("type", &self.inner.chunk_type.as_str())
      .field("timestamp", &self.inner.timestamp_us)
      .field("byteLength", &self.inner.data.len())
      .finish()
  }
}

impl EncodedAudioChunk {
  /// Create a new EncodedAudioChunk. The data bytes are copied.
  pub fn new(init: EncodedAudioChunkInit<'_>) -> Result<Self> {
    Ok(Self {
      inner: Arc::new(EncodedAudioChunkInner {
        data: init.data.to_vec(),
        chunk_type: init.chunk_type,
        timestamp_us: init.timestamp,
        duration_us: init.duration,
      }),
    })
  }

  /// Create from an encoder packet (crate-internal)
  pub(crate) fn from_packet(packet: &EncodedPacket, timestamp: i64, duration: Option<i64>) -> Self {
    Self {
      inner: Arc::new(EncodedAudioChunkInner {
        data: packet.data.clone(),
        chunk_type: if packet.is_key {
          EncodedAudioChunkType::Key
        } else {
          EncodedAudioChunkType::Delta
        },
        timestamp_us: timestamp,
        duration_us: duration,
      }),
    }
  }

  /// The chunk type
  pub fn chunk_type(&self) -> EncodedAudioChunkType {
    self.inner.chunk_type
  }

  /// Timestamp in microseconds
  pub fn timestamp(&self) -> i64 {
    self.inner.timestamp_us
  }

  /// Duration in microseconds, when present
  pub fn duration(&self) -> Option<i64> {
    self.inner.duration_us
  }

  /// Byte length of the encoded data
  pub fn byte_length(&self) -> u32 {
    self.inner.data.len() as u32
  }

  /// Borrow the encoded bytes (crate-internal; the public read is `copy_to`)
  pub(crate) fn data(&self) -> &[u8] {
    &self.inner.data
  }

  /// Copy the encoded data into `destination`.
  /// Fails with TypeError if the destination is shorter than `byte_length`.
  pub fn copy_to(&self, destination: &mut [u8]) -> Result<()> {
    let data = &self.inner.data;
    if destination.len() < data.len() {
      return Err(type_error(&format!(
        "destination is too small: need {} bytes, got {}",
        data.len(),
        destination.len()
      )));
    }
    destination[..data.len()].copy_from_slice(data);
    Ok(())
  }
}

/// Decoder configuration synthesised by the audio encoder for its first
/// output after each configure
#[derive(Debug, Clone, Default)]
pub struct AudioDecoderConfigOutput {
  /// Codec string
  pub codec: String,
  /// Sample rate in Hz
  pub sample_rate: f64,
  /// Number of channels
  pub number_of_channels: u32,
  /// Codec description (OpusHead for Opus, AudioSpecificConfig for AAC)
  pub description: Option<Vec<u8>>,
}

/// Output callback metadata
#[derive(Debug, Clone, Default)]
pub struct EncodedAudioChunkMetadata {
  /// Decoder configuration for this chunk (first output after configure)
  pub decoder_config: Option<AudioDecoderConfigOutput>,
}

/// Opus codec-specific encoder configuration
#[derive(Debug, Clone, Default)]
pub struct OpusEncoderConfig {
  /// Frame duration in microseconds (default 20000)
  pub frame_duration: Option<u64>,
  /// Encoder complexity 0-10
  pub complexity: Option<u32>,
  /// Expected packet loss percentage 0-100
  pub packetlossperc: Option<u32>,
  /// Enable in-band forward error correction
  pub useinbandfec: Option<bool>,
  /// Enable discontinuous transmission
  pub usedtx: Option<bool>,
}

/// AAC codec-specific encoder configuration
#[derive(Debug, Clone, Default)]
pub struct AacEncoderConfig {
  /// Bitstream format: "aac" (raw) or "adts"
  pub format: Option<String>,
}

/// FLAC codec-specific encoder configuration
#[derive(Debug, Clone, Default)]
pub struct FlacEncoderConfig {
  /// Block size in samples
  pub block_size: Option<u32>,
  /// Compression level 0-8
  pub compress_level: Option<u32>,
}

/// AudioEncoderConfig (W3C WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct AudioEncoderConfig {
  /// Codec string (e.g., "mp4a.40.2" for AAC-LC, "opus")
  pub codec: String,
  /// Sample rate in Hz (required, nonzero)
  pub sample_rate: f64,
  /// Number of channels (required, nonzero)
  pub number_of_channels: u32,
  /// Target bitrate in bits per second
  pub bitrate: Option<u64>,
  /// Bitrate mode
  pub bitrate_mode: AudioBitrateMode,
  /// Opus codec-specific configuration
  pub opus: Option<OpusEncoderConfig>,
  /// AAC codec-specific configuration
  pub aac: Option<AacEncoderConfig>,
  /// FLAC codec-specific configuration
  pub flac: Option<FlacEncoderConfig>,
}

impl AudioEncoderConfig {
  pub fn new(codec: impl Into<String>, sample_rate: f64, number_of_channels: u32) -> Self {
    Self {
      codec: codec.into(),
      sample_rate,
      number_of_channels,
      ..Default::default()
    }
  }
}

/// AudioDecoderConfig (W3C WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct AudioDecoderConfig {
  /// Codec string (e.g., "mp4a.40.2" for AAC-LC, "opus")
  pub codec: String,
  /// Sample rate in Hz (required, nonzero)
  pub sample_rate: f64,
  /// Number of channels (required, nonzero)
  pub number_of_channels: u32,
  /// Codec-specific description data (e.g., AudioSpecificConfig for AAC)
  pub description: Option<Vec<u8>>,
}

impl AudioDecoderConfig {
  pub fn new(codec: impl Into<String>, sample_rate: f64, number_of_channels: u32) -> Self {
    Self {
      codec: codec.into(),
      sample_rate,
      number_of_channels,
      ..Default::default()
    }
  }
}

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct AudioEncoderSupport {
  /// Whether the configuration is supported
  pub supported: bool,
  /// Normalised echo of the configuration that was checked
  pub config: AudioEncoderConfig,
}

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct AudioDecoderSupport {
  /// Whether the configuration is supported
  pub supported: bool,
  /// Normalised echo of the configuration that was checked
  pub config: AudioDecoderConfig,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunk_round_trip() {
    let chunk = EncodedAudioChunk::new(EncodedAudioChunkInit {
      chunk_type: EncodedAudioChunkType::Key,
      timestamp: -42,
      duration: Some(20000),
      data: &[9, 8, 7],
    })
    .unwrap();

    assert_eq!(chunk.chunk_type(), EncodedAudioChunkType::Key);
    assert_eq!(chunk.timestamp(), -42);
    assert_eq!(chunk.duration(), Some(20000));
    assert_eq!(chunk.byte_length(), 3);

    let mut destination = [0u8; 3];
    chunk.copy_to(&mut destination).unwrap();
    assert_eq!(destination, [9, 8, 7]);
  }

  #[test]
  fn test_copy_to_too_small() {
    let chunk = EncodedAudioChunk::new(EncodedAudioChunkInit {
      chunk_type: EncodedAudioChunkType::Key,
      timestamp: 0,
      duration: None,
      data: &[1, 2, 3, 4],
    })
    .unwrap();
    assert!(chunk.copy_to(&mut [0u8; 2]).is_err());
  }

  #[test]
  fn test_buffer_independence() {
    let mut source = vec![5u8; 4];
    let chunk = EncodedAudioChunk::new(EncodedAudioChunkInit {
      chunk_type: EncodedAudioChunkType::Delta,
      timestamp: 0,
      duration: None,
      data: &source,
    })
    .unwrap();
    source.fill(0);

    let mut destination = [0u8; 4];
    chunk.copy_to(&mut destination).unwrap();
    assert_eq!(destination, [5, 5, 5, 5]);
  }
}
