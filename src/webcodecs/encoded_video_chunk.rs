//! EncodedVideoChunk - WebCodecs API implementation
//!
//! Represents a chunk of encoded video data.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedVideoChunk
//!
//! The video encoder/decoder configuration dictionaries and their enums live
//! here alongside the chunk type.

use std::sync::Arc;

use crate::backend::EncodedPacket;
use crate::webcodecs::error::{type_error, Result};
use crate::webcodecs::video_frame::VideoColorSpaceInit;

/// Type of encoded video chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedVideoChunkType {
  /// Keyframe - can be decoded independently
  Key,
  /// Delta frame - depends on previous frames
  Delta,
}

impl EncodedVideoChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EncodedVideoChunkType::Key => "key",
      EncodedVideoChunkType::Delta => "delta",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    match value {
      "key" => Ok(EncodedVideoChunkType::Key),
      "delta" => Ok(EncodedVideoChunkType::Delta),
      other => Err(type_error(&format!("Invalid chunk type: {}", other))),
    }
  }
}

/// Hardware acceleration preference (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAcceleration {
  /// No preference - may use hardware or software
  #[default]
  NoPreference,
  /// Prefer hardware acceleration
  PreferHardware,
  /// Prefer software implementation
  PreferSoftware,
}

impl HardwareAcceleration {
  pub fn as_str(&self) -> &'static str {
    match self {
      HardwareAcceleration::NoPreference => "no-preference",
      HardwareAcceleration::PreferHardware => "prefer-hardware",
      HardwareAcceleration::PreferSoftware => "prefer-software",
    }
  }
}

/// Latency mode for video encoding (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyMode {
  /// Optimize for quality (default)
  #[default]
  Quality,
  /// Optimize for low latency
  Realtime,
}

impl LatencyMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      LatencyMode::Quality => "quality",
      LatencyMode::Realtime => "realtime",
    }
  }
}

/// Bitrate mode for video encoding (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoEncoderBitrateMode {
  /// Variable bitrate (default)
  #[default]
  Variable,
  /// Constant bitrate
  Constant,
  /// Use the per-frame quantizer from encode options
  Quantizer,
}

impl VideoEncoderBitrateMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      VideoEncoderBitrateMode::Variable => "variable",
      VideoEncoderBitrateMode::Constant => "constant",
      VideoEncoderBitrateMode::Quantizer => "quantizer",
    }
  }
}

/// Alpha channel handling option (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaOption {
  /// Keep alpha channel if present
  Keep,
  /// Discard alpha channel (default per W3C spec)
  #[default]
  Discard,
}

/// AVC (H.264) bitstream format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvcBitstreamFormat {
  /// Length-prefixed NALUs with out-of-band avcC description (default)
  #[default]
  Avc,
  /// Annex-B start codes with in-band parameter sets; no description
  AnnexB,
}

/// AVC codec-specific encoder configuration
#[derive(Debug, Clone, Default)]
pub struct AvcEncoderConfig {
  pub format: AvcBitstreamFormat,
}

/// HEVC codec-specific encoder configuration
#[derive(Debug, Clone, Default)]
pub struct HevcEncoderConfig {
  /// Reuses the AVC selector: "hevc" (length-prefixed + hvcC) or Annex-B
  pub format: AvcBitstreamFormat,
}

/// Options for creating an EncodedVideoChunk
/// W3C spec: https://w3c.github.io/webcodecs/#dictdef-encodedvideochunkinit
#[derive(Debug, Clone, Copy)]
pub struct EncodedVideoChunkInit<'a> {
  /// Chunk type (key or delta)
  pub chunk_type: EncodedVideoChunkType,
  /// Timestamp in microseconds (full 64-bit range, negatives included)
  pub timestamp: i64,
  /// Duration in microseconds (optional)
  pub duration: Option<i64>,
  /// Encoded bytes; copied at construction
  pub data: &'a [u8],
}

struct EncodedVideoChunkInner {
  data: Vec<u8>,
  chunk_type: EncodedVideoChunkType,
  timestamp_us: i64,
  duration_us: Option<i64>,
}

/// EncodedVideoChunk - represents encoded video data
///
/// Immutable after construction. The bytes are a private copy: mutating the
/// source buffer afterwards does not affect the chunk. Cloning shares the
/// same underlying record; chunks are moved end-to-end once, so there is no
/// close/refcount protocol.
#[derive(Clone)]
pub struct EncodedVideoChunk {
  inner: Arc<EncodedVideoChunkInner>,
}

impl std::fmt::Debug for EncodedVideoChunk {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EncodedVideoChunk")
      .field("type", &self.inner.chunk_type.as_str())
      .field("timestamp", &self.inner.timestamp_us)
      .field("byteLength", &self.inner.data.len())
      .finish()
  }
}

impl EncodedVideoChunk {
  /// Create a new EncodedVideoChunk. The data bytes are copied.
  pub fn new(init: EncodedVideoChunkInit<'_>) -> Result<Self> {
    Ok(Self {
      inner: Arc::new(EncodedVideoChunkInner {
        data: init.data.to_vec(),
        chunk_type: init.chunk_type,
        timestamp_us: init.timestamp,
        duration_us: init.duration,
      }),
    })
  }

  /// Create from an encoder packet, overriding the timestamp with the input
  /// frame's timestamp (crate-internal)
  pub(crate) fn from_packet(packet: &EncodedPacket, timestamp: i64, duration: Option<i64>) -> Self {
    Self {
      inner: Arc::new(EncodedVideoChunkInner {
        data: packet.data.clone(),
        chunk_type: if packet.is_key {
          EncodedVideoChunkType::Key
        } else {
          EncodedVideoChunkType::Delta
        },
        timestamp_us: timestamp,
        duration_us: duration,
      }),
    }
  }

  /// The chunk type
  pub fn chunk_type(&self) -> EncodedVideoChunkType {
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

/// SVC output metadata attached to encoded chunks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvcOutputMetadata {
  /// Temporal layer the chunk belongs to
  pub temporal_layer_id: Option<u32>,
}

/// Decoder configuration synthesised by the encoder for its first output
/// after each configure (and whenever decoder-relevant parameters change)
#[derive(Debug, Clone, Default)]
pub struct VideoDecoderConfigOutput {
  /// Codec string
  pub codec: String,
  /// Coded width
  pub coded_width: Option<u32>,
  /// Coded height
  pub coded_height: Option<u32>,
  /// Color space of the stream, unless embedded in the bitstream
  pub color_space: Option<VideoColorSpaceInit>,
  /// Codec description (avcC for AVC, hvcC for HEVC, av1C for AV1);
  /// absent for Annex-B bitstreams
  pub description: Option<Vec<u8>>,
  /// Rotation recorded from the stream's frames
  pub rotation: f64,
  /// Flip recorded from the stream's frames
  pub flip: bool,
}

/// Output callback metadata
#[derive(Debug, Clone, Default)]
pub struct EncodedVideoChunkMetadata {
  /// Decoder configuration for this chunk (first output after configure)
  pub decoder_config: Option<VideoDecoderConfigOutput>,
  /// SVC side data
  pub svc: Option<SvcOutputMetadata>,
  /// Separately encoded alpha channel, written as block-additional side
  /// data by WebM/MKV muxers
  pub alpha_side_data: Option<Vec<u8>>,
}

/// VideoEncoderConfig (W3C WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct VideoEncoderConfig {
  /// Codec string (e.g., "avc1.42001E", "vp8", "vp09.00.10.08", "av01.0.04M.08")
  pub codec: String,
  /// Coded width in pixels (required, nonzero)
  pub width: u32,
  /// Coded height in pixels (required, nonzero)
  pub height: u32,
  /// Display width (optional, defaults to width)
  pub display_width: Option<u32>,
  /// Display height (optional, defaults to height)
  pub display_height: Option<u32>,
  /// Target bitrate in bits per second
  pub bitrate: Option<u64>,
  /// Framerate (frames per second)
  pub framerate: Option<f64>,
  /// Hardware acceleration preference
  pub hardware_acceleration: HardwareAcceleration,
  /// Latency mode
  pub latency_mode: LatencyMode,
  /// Bitrate mode
  pub bitrate_mode: VideoEncoderBitrateMode,
  /// Alpha handling
  pub alpha: AlphaOption,
  /// Scalability mode (SVC) - e.g., "L1T1", "L1T2", "L1T3"
  pub scalability_mode: Option<String>,
  /// Content hint for encoder tuning
  pub content_hint: Option<String>,
  /// Color space the stream should be tagged with
  pub color_space: Option<VideoColorSpaceInit>,
  /// AVC (H.264) codec-specific configuration
  pub avc: Option<AvcEncoderConfig>,
  /// HEVC (H.265) codec-specific configuration
  pub hevc: Option<HevcEncoderConfig>,
}

impl VideoEncoderConfig {
  pub fn new(codec: impl Into<String>, width: u32, height: u32) -> Self {
    Self {
      codec: codec.into(),
      width,
      height,
      ..Default::default()
    }
  }
}

/// VideoDecoderConfig (W3C WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct VideoDecoderConfig {
  /// Codec string (e.g., "avc1.42001E", "vp8", "vp09.00.10.08")
  pub codec: String,
  /// Coded width in pixels (optional for some codecs)
  pub coded_width: Option<u32>,
  /// Coded height in pixels (optional for some codecs)
  pub coded_height: Option<u32>,
  /// Display aspect width
  pub display_aspect_width: Option<u32>,
  /// Display aspect height
  pub display_aspect_height: Option<u32>,
  /// Color space decoded frames inherit when the bitstream leaves it unset
  pub color_space: Option<VideoColorSpaceInit>,
  /// Hardware acceleration preference
  pub hardware_acceleration: HardwareAcceleration,
  /// Optimize for latency
  pub optimize_for_latency: Option<bool>,
  /// Codec-specific description data (e.g., avcC for H.264)
  pub description: Option<Vec<u8>>,
  /// Rotation applied to decoded frames, degrees clockwise
  pub rotation: f64,
  /// Horizontal flip applied to decoded frames
  pub flip: bool,
}

impl VideoDecoderConfig {
  pub fn new(codec: impl Into<String>) -> Self {
    Self {
      codec: codec.into(),
      ..Default::default()
    }
  }
}

/// Encode options accepted alongside a frame
#[derive(Debug, Clone, Default)]
pub struct VideoEncoderEncodeOptions {
  /// Force this frame to be a keyframe
  pub key_frame: bool,
  /// Per-frame quantizer, honoured in quantizer bitrate mode
  pub quantizer: Option<f64>,
}

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct VideoEncoderSupport {
  /// Whether the configuration is supported
  pub supported: bool,
  /// Normalised echo of the configuration that was checked
  pub config: VideoEncoderConfig,
}

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct VideoDecoderSupport {
  /// Whether the configuration is supported
  pub supported: bool,
  /// Normalised echo of the configuration that was checked
  pub config: VideoDecoderConfig,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunk_round_trip() {
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 1000,
      duration: Some(33333),
      data: &[0, 1, 2, 3],
    })
    .unwrap();

    assert_eq!(chunk.chunk_type(), EncodedVideoChunkType::Key);
    assert_eq!(chunk.timestamp(), 1000);
    assert_eq!(chunk.duration(), Some(33333));
    assert_eq!(chunk.byte_length(), 4);

    let mut destination = [0u8; 10];
    chunk.copy_to(&mut destination).unwrap();
    assert_eq!(destination, [0, 1, 2, 3, 0, 0, 0, 0, 0, 0]);
  }

  #[test]
  fn test_copy_to_too_small() {
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Delta,
      timestamp: 0,
      duration: None,
      data: &[1, 2, 3, 4, 5],
    })
    .unwrap();

    let mut destination = [0u8; 3];
    let err = chunk.copy_to(&mut destination).unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::TypeError
    );
  }

  #[test]
  fn test_buffer_independence() {
    let mut source = vec![42u8; 8];
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 0,
      duration: None,
      data: &source,
    })
    .unwrap();

    source.iter_mut().for_each(|byte| *byte = 0);

    let mut destination = [0u8; 8];
    chunk.copy_to(&mut destination).unwrap();
    assert!(destination.iter().all(|&byte| byte == 42));
  }

  #[test]
  fn test_negative_timestamp_round_trips() {
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: -9007199254740991,
      duration: None,
      data: &[0],
    })
    .unwrap();
    assert_eq!(chunk.timestamp(), -9007199254740991);
  }

  #[test]
  fn test_chunk_type_parse() {
    assert_eq!(
      EncodedVideoChunkType::parse("key").unwrap(),
      EncodedVideoChunkType::Key
    );
    assert_eq!(
      EncodedVideoChunkType::parse("delta").unwrap(),
      EncodedVideoChunkType::Delta
    );
    assert!(EncodedVideoChunkType::parse("Key").is_err());
    assert!(EncodedVideoChunkType::parse("").is_err());
  }
}
