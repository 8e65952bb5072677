//! WebMDemuxer - WebCodecs-style demuxer for WebM containers
//!
//! WebM is a Matroska subset (magic: `1A 45 DF A3`) restricted to VP8/VP9/AV1
//! video and Opus/Vorbis audio; timestamps are recorded in milliseconds and
//! exposed in microseconds.

use crate::backend::container::ContainerFormat;
use crate::webcodecs::codec_string::CodecId;
use crate::webcodecs::demuxer_base::{
  parse_vp9_codec_string, ContainerDemuxer, DemuxerFormat,
};

/// WebM-specific format implementation
pub struct WebMDemuxFormat;

impl DemuxerFormat for WebMDemuxFormat {
  const FORMAT: ContainerFormat = ContainerFormat::WebM;

  fn codec_id_to_video_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String {
    match codec_id {
      CodecId::Vp8 => "vp8".to_string(),
      CodecId::Vp9 => parse_vp9_codec_string(extradata),
      CodecId::Av1 => "av01.0.04M.08".to_string(),
      _ => "unknown".to_string(),
    }
  }

  fn codec_id_to_audio_string(codec_id: CodecId, _extradata: Option<&[u8]>) -> String {
    match codec_id {
      CodecId::Opus => "opus".to_string(),
      CodecId::Vorbis => "vorbis".to_string(),
      _ => "unknown".to_string(),
    }
  }
}

/// WebM demuxer
pub type WebMDemuxer = ContainerDemuxer<WebMDemuxFormat>;
