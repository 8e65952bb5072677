//! Mp4Demuxer - WebCodecs-style demuxer for MP4 containers
//!
//! Reads MP4 files (magic: `ftyp` box) and emits EncodedVideoChunk /
//! EncodedAudioChunk streams with preserved microsecond timestamps.

use crate::backend::container::ContainerFormat;
use crate::webcodecs::codec_string::CodecId;
use crate::webcodecs::demuxer_base::{
  parse_aac_codec_string, parse_h264_codec_string, parse_hevc_codec_string,
  parse_vp9_codec_string, ContainerDemuxer, DemuxerFormat,
};

/// MP4-specific format implementation
pub struct Mp4DemuxFormat;

impl DemuxerFormat for Mp4DemuxFormat {
  const FORMAT: ContainerFormat = ContainerFormat::Mp4;

  fn codec_id_to_video_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String {
    match codec_id {
      CodecId::H264 => parse_h264_codec_string(extradata),
      CodecId::Hevc => parse_hevc_codec_string(extradata),
      CodecId::Vp9 => parse_vp9_codec_string(extradata),
      CodecId::Av1 => "av01.0.04M.08".to_string(),
      CodecId::Vp8 => "vp8".to_string(),
      _ => "unknown".to_string(),
    }
  }

  fn codec_id_to_audio_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String {
    match codec_id {
      CodecId::Aac => parse_aac_codec_string(extradata),
      CodecId::Opus => "opus".to_string(),
      CodecId::Mp3 => "mp3".to_string(),
      CodecId::Flac => "flac".to_string(),
      _ => "unknown".to_string(),
    }
  }
}

/// MP4 demuxer
pub type Mp4Demuxer = ContainerDemuxer<Mp4DemuxFormat>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codec_strings() {
    let avcc = [1u8, 0x64, 0x00, 0x28];
    assert_eq!(
      Mp4DemuxFormat::codec_id_to_video_string(CodecId::H264, Some(&avcc)),
      "avc1.640028"
    );
    assert_eq!(
      Mp4DemuxFormat::codec_id_to_audio_string(CodecId::Aac, None),
      "mp4a.40.2"
    );
    assert_eq!(
      Mp4DemuxFormat::codec_id_to_audio_string(CodecId::Opus, None),
      "opus"
    );
  }
}
