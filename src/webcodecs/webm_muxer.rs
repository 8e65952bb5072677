//! WebMMuxer - WebCodecs-style muxer for WebM containers
//!
//! Interleaves encoded chunks into a WebM file (EBML magic `1A 45 DF A3`).
//! WebM restricts codecs to VP8/VP9/AV1 video and Opus/Vorbis audio; VP9
//! alpha side data is written as block additions.

use std::sync::Arc;

use crate::backend::container::{ContainerBackend, ContainerFormat, WriterOptions};
use crate::webcodecs::codec_string::{parse_audio_codec_string, parse_codec_string, CodecId};
use crate::webcodecs::error::{type_error, Result};
use crate::webcodecs::muxer_base::{ContainerMuxer, MuxerFormat, StreamingMuxerOptions};

/// WebM-specific format implementation
pub struct WebMMuxFormat;

impl MuxerFormat for WebMMuxFormat {
  const FORMAT: ContainerFormat = ContainerFormat::WebM;

  fn parse_video_codec(codec: &str) -> Result<CodecId> {
    let parsed = parse_codec_string(codec)
      .ok_or_else(|| type_error(&format!("Invalid codec string: {}", codec)))?;
    match parsed.codec_id {
      CodecId::Vp8 | CodecId::Vp9 | CodecId::Av1 => Ok(parsed.codec_id),
      _ => Err(type_error(&format!(
        "Unsupported video codec for WebM (VP8/VP9/AV1 only): {}",
        codec
      ))),
    }
  }

  fn parse_audio_codec(codec: &str) -> Result<CodecId> {
    match parse_audio_codec_string(codec) {
      Some(codec_id @ (CodecId::Opus | CodecId::Vorbis)) => Ok(codec_id),
      _ => Err(type_error(&format!(
        "Unsupported audio codec for WebM (Opus/Vorbis only): {}",
        codec
      ))),
    }
  }

  fn supports_alpha() -> bool {
    true
  }
}

/// WebM muxer options
#[derive(Debug, Clone, Default)]
pub struct WebMMuxerOptions {
  /// Enable streaming output mode
  pub streaming: Option<StreamingMuxerOptions>,
}

impl WebMMuxerOptions {
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

/// WebM muxer
pub type WebMMuxer = ContainerMuxer<WebMMuxFormat>;

impl ContainerMuxer<WebMMuxFormat> {
  /// Create a new WebM muxer over the process-wide container backend
  pub fn new(options: WebMMuxerOptions) -> Result<Self> {
    Self::create(&options.writer_options())
  }

  /// Create a new WebM muxer over an explicit container backend
  pub fn with_backend(
    backend: Arc<dyn ContainerBackend>,
    options: WebMMuxerOptions,
  ) -> Result<Self> {
    Self::create_with_backend(backend, &options.writer_options())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codec_admission() {
    assert_eq!(WebMMuxFormat::parse_video_codec("vp8").unwrap(), CodecId::Vp8);
    assert_eq!(
      WebMMuxFormat::parse_video_codec("vp09.00.10.08").unwrap(),
      CodecId::Vp9
    );
    assert!(WebMMuxFormat::parse_video_codec("avc1.42001E").is_err());

    assert_eq!(WebMMuxFormat::parse_audio_codec("opus").unwrap(), CodecId::Opus);
    assert_eq!(
      WebMMuxFormat::parse_audio_codec("vorbis").unwrap(),
      CodecId::Vorbis
    );
    assert!(WebMMuxFormat::parse_audio_codec("mp4a.40.2").is_err());
  }

  #[test]
  fn test_supports_alpha() {
    assert!(WebMMuxFormat::supports_alpha());
  }
}
