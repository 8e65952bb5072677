//! MkvDemuxer - WebCodecs-style demuxer for Matroska containers
//!
//! Matroska shares the EBML envelope with WebM (magic: `1A 45 DF A3`) but
//! admits the full codec set.

use crate::backend::container::ContainerFormat;
use crate::webcodecs::codec_string::CodecId;
use crate::webcodecs::demuxer_base::{
  parse_aac_codec_string, parse_h264_codec_string, parse_hevc_codec_string,
  parse_vp9_codec_string, ContainerDemuxer, DemuxerFormat,
};

/// Matroska-specific format implementation
pub struct MkvDemuxFormat;

impl DemuxerFormat for MkvDemuxFormat {
  const FORMAT: ContainerFormat = ContainerFormat::Mkv;

  fn codec_id_to_video_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String {
    match codec_id {
      CodecId::H264 => parse_h264_codec_string(extradata),
      CodecId::Hevc => parse_hevc_codec_string(extradata),
      CodecId::Vp8 => "vp8".to_string(),
      CodecId::Vp9 => parse_vp9_codec_string(extradata),
      CodecId::Av1 => "av01.0.04M.08".to_string(),
      _ => "unknown".to_string(),
    }
  }

  fn codec_id_to_audio_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String {
    match codec_id {
      CodecId::Aac => parse_aac_codec_string(extradata),
      CodecId::Opus => "opus".to_string(),
      CodecId::Vorbis => "vorbis".to_string(),
      CodecId::Mp3 => "mp3".to_string(),
      CodecId::Flac => "flac".to_string(),
      CodecId::Pcm => "pcm-s16".to_string(),
      _ => "unknown".to_string(),
    }
  }
}

/// Matroska demuxer
pub type MkvDemuxer = ContainerDemuxer<MkvDemuxFormat>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codec_strings() {
    assert_eq!(
      MkvDemuxFormat::codec_id_to_video_string(CodecId::H264, None),
      "avc1.42001E"
    );
    assert_eq!(
      MkvDemuxFormat::codec_id_to_audio_string(CodecId::Flac, None),
      "flac"
    );
    assert_eq!(
      MkvDemuxFormat::codec_id_to_audio_string(CodecId::Pcm, None),
      "pcm-s16"
    );
  }
}
