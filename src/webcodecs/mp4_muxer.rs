//! Mp4Muxer - WebCodecs-style muxer for MP4 containers
//!
//! Interleaves encoded video and audio chunks into an MP4 file (magic:
//! `ftyp` box). Supports `fast_start` (index atom moved to the head,
//! incompatible with streaming) and `fragmented` output.

use std::sync::Arc;

use crate::backend::container::{ContainerBackend, ContainerFormat, WriterOptions};
use crate::webcodecs::codec_string::{parse_audio_codec_string, parse_codec_string, CodecId};
use crate::webcodecs::error::{type_error, Result};
use crate::webcodecs::muxer_base::{ContainerMuxer, MuxerFormat, StreamingMuxerOptions};

/// MP4-specific format implementation
pub struct Mp4MuxFormat;

impl MuxerFormat for Mp4MuxFormat {
  const FORMAT: ContainerFormat = ContainerFormat::Mp4;

  fn parse_video_codec(codec: &str) -> Result<CodecId> {
    let parsed = parse_codec_string(codec)
      .ok_or_else(|| type_error(&format!("Invalid codec string: {}", codec)))?;

    // MP4 carries H.264, H.265, AV1 (VP8/VP9 are WebM-family codecs)
    match parsed.codec_id {
      CodecId::H264 | CodecId::Hevc | CodecId::Av1 => Ok(parsed.codec_id),
      CodecId::Vp8 | CodecId::Vp9 => Err(type_error(&format!(
        "VP8/VP9 are not supported in MP4 container. Use WebM or MKV instead: {}",
        codec
      ))),
      _ => Err(type_error(&format!(
        "Unsupported video codec for MP4: {}",
        codec
      ))),
    }
  }

  fn parse_audio_codec(codec: &str) -> Result<CodecId> {
    match parse_audio_codec_string(codec) {
      Some(codec_id @ (CodecId::Aac | CodecId::Opus | CodecId::Mp3 | CodecId::Flac)) => {
        Ok(codec_id)
      }
      Some(CodecId::Vorbis) => Err(type_error(
        "Vorbis is not supported in MP4 container. Use WebM or MKV instead",
      )),
      Some(CodecId::Pcm) => Err(type_error(
        "PCM audio is not supported in MP4 container. Use MKV instead",
      )),
      _ => Err(type_error(&format!(
        "Unsupported audio codec for MP4: {}",
        codec
      ))),
    }
  }
}

/// MP4 muxer options
#[derive(Debug, Clone, Default)]
pub struct Mp4MuxerOptions {
  /// Move the moov atom to the beginning for better streaming start
  /// (incompatible with streaming output mode)
  pub fast_start: bool,
  /// Produce fragment-friendly output
  pub fragmented: bool,
  /// Enable streaming output mode
  pub streaming: Option<StreamingMuxerOptions>,
}

impl Mp4MuxerOptions {
  fn writer_options(&self) -> Result<WriterOptions> {
    if self.fast_start && self.streaming.is_some() {
      return Err(type_error(
        "fastStart is not compatible with streaming mode. Use fragmented output for streaming.",
      ));
    }
    Ok(WriterOptions {
      fast_start: self.fast_start,
      fragmented: self.fragmented,
      streaming_capacity: self
        .streaming
        .as_ref()
        .map(|streaming| streaming.buffer_capacity.unwrap_or(256 * 1024) as usize),
    })
  }
}

/// MP4 muxer
pub type Mp4Muxer = ContainerMuxer<Mp4MuxFormat>;

impl ContainerMuxer<Mp4MuxFormat> {
  /// Create a new MP4 muxer over the process-wide container backend
  pub fn new(options: Mp4MuxerOptions) -> Result<Self> {
    Self::create(&options.writer_options()?)
  }

  /// Create a new MP4 muxer over an explicit container backend
  pub fn with_backend(backend: Arc<dyn ContainerBackend>, options: Mp4MuxerOptions) -> Result<Self> {
    Self::create_with_backend(backend, &options.writer_options()?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codec_admission() {
    assert_eq!(
      Mp4MuxFormat::parse_video_codec("avc1.42001E").unwrap(),
      CodecId::H264
    );
    assert_eq!(
      Mp4MuxFormat::parse_video_codec("av01.0.04M.08").unwrap(),
      CodecId::Av1
    );
    assert!(Mp4MuxFormat::parse_video_codec("vp8").is_err());
    assert!(Mp4MuxFormat::parse_video_codec("vp09.00.10.08").is_err());

    assert_eq!(
      Mp4MuxFormat::parse_audio_codec("mp4a.40.2").unwrap(),
      CodecId::Aac
    );
    assert_eq!(Mp4MuxFormat::parse_audio_codec("opus").unwrap(), CodecId::Opus);
    assert!(Mp4MuxFormat::parse_audio_codec("vorbis").is_err());
    assert!(Mp4MuxFormat::parse_audio_codec("pcm-s16").is_err());
  }

  #[test]
  fn test_fast_start_incompatible_with_streaming() {
    let options = Mp4MuxerOptions {
      fast_start: true,
      streaming: Some(StreamingMuxerOptions::default()),
      ..Default::default()
    };
    assert!(options.writer_options().is_err());
  }
}
