//! MkvMuxer - WebCodecs-style muxer for Matroska containers
//!
//! Matroska shares the EBML envelope with WebM (magic `1A 45 DF A3`) but
//! admits the full codec set, including H.264/H.265 video and PCM audio.

use std::sync::Arc;

use crate::backend::container::{ContainerBackend, ContainerFormat, WriterOptions};
use crate::webcodecs::codec_string::{parse_audio_codec_string, parse_codec_string, CodecId};
use crate::webcodecs::error::{type_error, Result};
use crate::webcodecs::muxer_base::{ContainerMuxer, MuxerFormat, StreamingMuxerOptions};

/// Matroska-specific format implementation
pub struct MkvMuxFormat;

impl MuxerFormat for MkvMuxFormat {
  const FORMAT: ContainerFormat = ContainerFormat::Mkv;

  fn parse_video_codec(codec: &str) -> Result<CodecId> {
    parse_codec_string(codec)
      .map(|parsed| parsed.codec_id)
      .ok_or_else(|| type_error(&format!("Invalid codec string: {}", codec)))
  }

  fn parse_audio_codec(codec: &str) -> Result<CodecId> {
    parse_audio_codec_string(codec)
      .ok_or_else(|| type_error(&format!("Unsupported audio codec for MKV: {}", codec)))
  }

  fn supports_alpha() -> bool {
    true
  }
}

/// Matroska muxer options
#[derive(Debug, Clone, Default)]
pub struct MkvMuxerOptions {
  /// Enable streaming output mode
  pub streaming: Option<StreamingMuxerOptions>,
}

impl MkvMuxerOptions {
  fn writer_options(&self) -> WriterOptions {
    WriterOptions {
      fast_start: false,
      fragmented: false,
      streaming_capacity: self
        .streaming
        .as_ref()
        .map(|streaming| streaming.buffer_capacity.unwrap_or(256 * 1024) as usize),
    }
  }
}

/// Matroska muxer
pub type MkvMuxer = ContainerMuxer<MkvMuxFormat>;

impl ContainerMuxer<MkvMuxFormat> {
  /// Create a new MKV muxer over the process-wide container backend
  pub fn new(options: MkvMuxerOptions) -> Result<Self> {
    Self::create(&options.writer_options())
  }

  /// Create a new MKV muxer over an explicit container backend
  pub fn with_backend(backend: Arc<dyn ContainerBackend>, options: MkvMuxerOptions) -> Result<Self> {
    Self::create_with_backend(backend, &options.writer_options())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codec_admission() {
    assert_eq!(
      MkvMuxFormat::parse_video_codec("avc1.42001E").unwrap(),
      CodecId::H264
    );
    assert_eq!(MkvMuxFormat::parse_video_codec("vp8").unwrap(), CodecId::Vp8);
    assert!(MkvMuxFormat::parse_video_codec("not-a-codec").is_err());

    assert_eq!(
      MkvMuxFormat::parse_audio_codec("pcm-s16").unwrap(),
      CodecId::Pcm
    );
    assert_eq!(MkvMuxFormat::parse_audio_codec("flac").unwrap(), CodecId::Flac);
  }
}
