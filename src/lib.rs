#![deny(clippy::all)]

//! Server-side implementation of the W3C WebCodecs API
//!
//! This crate provides the WebCodecs codec objects (`VideoEncoder`,
//! `VideoDecoder`, `AudioEncoder`, `AudioDecoder`, `ImageDecoder`) and their
//! companion value types, plus container muxers and demuxers for MP4, WebM
//! and MKV.
//!
//! The codec control engine is self-contained: per-instance state machines,
//! an asynchronous work pipeline with queue-depth accounting and `dequeue`
//! events, flush/reset/close ordering guarantees, and two-phase
//! configuration validation. Actual compression, container serialisation
//! and still-image parsing are collaborators behind the traits in
//! [`backend`]; install process-wide defaults with
//! [`backend::set_codec_backend`] and friends, or hand each instance an
//! explicit backend. [`backend::mock`] ships deterministic doubles for
//! testing.

// External collaborator interfaces (codec/container/image backends)
pub mod backend;

// Codec control engine (state machine, work pipeline, events)
pub mod codec;

// WebCodecs API surface
pub mod webcodecs;

// Re-export the API surface at the crate root
pub use codec::{AddEventListenerOptions, CodecState, ErrorCallback, Event, EventHandler};
pub use webcodecs::{
  // Errors
  error::{DOMException, DOMExceptionName},
  reset_hardware_fallback_state,
  // Video types
  AlphaOption, AvcBitstreamFormat, AvcEncoderConfig, EncodedVideoChunk, EncodedVideoChunkInit,
  EncodedVideoChunkMetadata, EncodedVideoChunkType, HardwareAcceleration, HevcEncoderConfig,
  LatencyMode, SvcOutputMetadata, VideoColorSpace, VideoColorSpaceInit, VideoColorPrimaries,
  VideoDecoder, VideoDecoderConfig, VideoDecoderConfigOutput, VideoDecoderInit,
  VideoDecoderOutputCallback, VideoDecoderSupport, VideoEncoder, VideoEncoderBitrateMode,
  VideoEncoderConfig, VideoEncoderEncodeOptions, VideoEncoderInit, VideoEncoderOutputCallback,
  VideoEncoderSupport, VideoFrame,
  VideoFrameBufferInit, VideoFrameCopyToOptions, VideoFrameInit, VideoFrameRect,
  VideoMatrixCoefficients, VideoPixelFormat, VideoTransferCharacteristics, CanvasImageSource,
  DOMRectInit, DOMRectReadOnly, PlaneLayout,
  // Audio types
  AudioBitrateMode, AudioData, AudioDataCopyToOptions, AudioDataInit, AudioDecoder,
  AudioDecoderConfig, AudioDecoderConfigOutput, AudioDecoderInit, AudioDecoderOutputCallback,
  AudioDecoderSupport, AudioEncoder, AudioEncoderConfig, AudioEncoderInit,
  AudioEncoderOutputCallback, AudioEncoderSupport, AudioSampleFormat,
  EncodedAudioChunk, EncodedAudioChunkInit, EncodedAudioChunkMetadata, EncodedAudioChunkType,
  // Image decoding
  ImageDecodeOptions, ImageDecodeResult, ImageDecoder, ImageDecoderInit, ImageTrack,
  ImageTrackList,
  // Containers
  DemuxedChunk, DemuxerCallbacks, DemuxerState, DemuxerTrackInfo, MkvDemuxer, MkvMuxer,
  MkvMuxerOptions, Mp4Demuxer, Mp4Muxer, Mp4MuxerOptions, MuxerAudioTrackConfig, MuxerState,
  MuxerVideoTrackConfig, StreamingMuxerOptions, WebMDemuxer, WebMMuxer, WebMMuxerOptions,
};
