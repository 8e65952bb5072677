//! WebCodecs API implementation
//!
//! The W3C-observable surface: value objects, codec interfaces, container
//! muxers/demuxers, the image decoder, the DOMException taxonomy, and the
//! hardware-fallback registry.

pub mod audio_data;
pub mod audio_decoder;
pub mod audio_encoder;
pub mod codec_string;
pub mod demuxer_base;
pub mod encoded_audio_chunk;
pub mod encoded_video_chunk;
pub mod error;
pub mod hw_fallback;
pub mod image_decoder;
pub mod mkv_demuxer;
pub mod mkv_muxer;
pub mod mp4_demuxer;
pub mod mp4_muxer;
pub mod muxer_base;
pub mod video_decoder;
pub mod video_encoder;
pub mod video_frame;
pub mod webm_demuxer;
pub mod webm_muxer;

use crate::backend::{BackendError, BackendErrorKind};
use error::{DOMException, DOMExceptionName};

/// Map a backend fault into the DOMException family it surfaces as
pub(crate) fn backend_to_dom(err: BackendError) -> DOMException {
  let name = match err.kind {
    BackendErrorKind::NotSupported | BackendErrorKind::InvalidConfig => {
      DOMExceptionName::NotSupportedError
    }
    BackendErrorKind::Encoding | BackendErrorKind::Decoding | BackendErrorKind::Resource => {
      DOMExceptionName::EncodingError
    }
  };
  DOMException::new(name, err.message)
}

pub use audio_data::{AudioData, AudioDataCopyToOptions, AudioDataInit, AudioSampleFormat};
pub use audio_decoder::{AudioDecoder, AudioDecoderInit, AudioDecoderOutputCallback};
pub use audio_encoder::{AudioEncoder, AudioEncoderInit, AudioEncoderOutputCallback};
pub use demuxer_base::{
  ContainerDemuxer, DemuxedChunk, DemuxedChunkStream, DemuxerCallbacks, DemuxerFormat,
  DemuxerState, DemuxerTrackInfo, DemuxerAudioDecoderConfig, DemuxerVideoDecoderConfig,
};
pub use encoded_audio_chunk::{
  AudioBitrateMode, AudioDecoderConfig, AudioDecoderConfigOutput, AudioDecoderSupport,
  AudioEncoderConfig, AudioEncoderSupport, EncodedAudioChunk, EncodedAudioChunkInit,
  EncodedAudioChunkMetadata, EncodedAudioChunkType,
};
pub use encoded_video_chunk::{
  AlphaOption, AvcBitstreamFormat, AvcEncoderConfig, EncodedVideoChunk, EncodedVideoChunkInit,
  EncodedVideoChunkMetadata, EncodedVideoChunkType, HardwareAcceleration, HevcEncoderConfig,
  LatencyMode, SvcOutputMetadata, VideoDecoderConfig, VideoDecoderConfigOutput,
  VideoDecoderSupport, VideoEncoderBitrateMode, VideoEncoderConfig, VideoEncoderEncodeOptions,
  VideoEncoderSupport,
};
pub use error::{DOMException as WebCodecsError, DOMExceptionName as WebCodecsErrorName};
pub use hw_fallback::reset_hardware_fallback_state;
pub use image_decoder::{
  ImageDecodeOptions, ImageDecodeResult, ImageDecoder, ImageDecoderInit, ImageTrack,
  ImageTrackList,
};
pub use mkv_demuxer::{MkvDemuxFormat, MkvDemuxer};
pub use mkv_muxer::{MkvMuxFormat, MkvMuxer, MkvMuxerOptions};
pub use mp4_demuxer::{Mp4DemuxFormat, Mp4Demuxer};
pub use mp4_muxer::{Mp4MuxFormat, Mp4Muxer, Mp4MuxerOptions};
pub use muxer_base::{
  ContainerMuxer, MuxerAudioTrackConfig, MuxerFormat, MuxerState, MuxerVideoTrackConfig,
  StreamingMuxerOptions,
};
pub use video_decoder::{VideoDecoder, VideoDecoderInit, VideoDecoderOutputCallback};
pub use webm_demuxer::{WebMDemuxFormat, WebMDemuxer};
pub use webm_muxer::{WebMMuxFormat, WebMMuxer, WebMMuxerOptions};
pub use video_encoder::{VideoEncoder, VideoEncoderInit, VideoEncoderOutputCallback};
pub use video_frame::{
  CanvasImageSource, DOMRectInit, DOMRectReadOnly, PixelBuffer, PlaneLayout, VideoColorSpace,
  VideoColorSpaceInit, VideoColorPrimaries, VideoFrame, VideoFrameBufferInit,
  VideoFrameCopyToOptions, VideoFrameInit, VideoFrameMetadata, VideoFrameRect,
  VideoMatrixCoefficients, VideoPixelFormat, VideoTransferCharacteristics,
};
