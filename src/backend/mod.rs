//! External collaborator interfaces
//!
//! The engine does not compress media, parse containers, or decode still
//! images itself. It drives collaborators through the traits in this module:
//!
//! - [`CodecBackend`] opens and drives native encoders and decoders
//! - [`container::ContainerReader`] / [`container::ContainerWriter`] handle
//!   MP4/WebM/MKV parsing and serialisation
//! - [`image::ImageBackend`] wraps still-image formats
//!
//! A process-global default for each collaborator can be installed once at
//! startup; individual instances can also be constructed with an explicit
//! backend, which is how the mock-backed test suite runs.

pub mod container;
pub mod image;
pub mod mock;

use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::webcodecs::audio_data::{AudioData, AudioSampleFormat};
use crate::webcodecs::video_frame::{VideoColorSpaceInit, VideoFrame, VideoPixelFormat};

/// Whether a codec is being opened to produce or consume packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecDirection {
  Encode,
  Decode,
}

/// The four codec roles a backend can be probed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecRole {
  VideoEncoder,
  VideoDecoder,
  AudioEncoder,
  AudioDecoder,
}

impl CodecRole {
  pub fn direction(&self) -> CodecDirection {
    match self {
      CodecRole::VideoEncoder | CodecRole::AudioEncoder => CodecDirection::Encode,
      CodecRole::VideoDecoder | CodecRole::AudioDecoder => CodecDirection::Decode,
    }
  }

  pub fn is_video(&self) -> bool {
    matches!(self, CodecRole::VideoEncoder | CodecRole::VideoDecoder)
  }
}

/// Error kinds a backend can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
  /// The codec or configuration cannot be realised
  NotSupported,
  /// The configuration is structurally wrong for this backend
  InvalidConfig,
  /// A fatal fault while encoding
  Encoding,
  /// A fatal fault while decoding (corrupt chunk, parameter mismatch)
  Decoding,
  /// The backing resource went away
  Resource,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
  pub kind: BackendErrorKind,
  pub message: String,
}

impl BackendError {
  pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn not_supported(message: impl Into<String>) -> Self {
    Self::new(BackendErrorKind::NotSupported, message)
  }

  pub fn encoding(message: impl Into<String>) -> Self {
    Self::new(BackendErrorKind::Encoding, message)
  }

  pub fn decoding(message: impl Into<String>) -> Self {
    Self::new(BackendErrorKind::Decoding, message)
  }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// One step of a session's output pump
#[derive(Debug)]
pub enum PollOutput<T> {
  /// An output is ready
  Output(T),
  /// Nothing ready yet; feed more input
  AgainLater,
  /// The session has emitted everything it ever will
  EndOfStream,
}

/// An encoded packet produced by an encoder session
#[derive(Debug, Clone)]
pub struct EncodedPacket {
  pub data: Vec<u8>,
  /// Presentation timestamp in microseconds, carried through from the input
  pub pts: i64,
  pub duration: Option<i64>,
  pub is_key: bool,
  /// Temporal layer this packet belongs to (SVC)
  pub temporal_layer_id: Option<u32>,
  /// Separately encoded alpha channel, when the session keeps alpha
  pub alpha_data: Option<Vec<u8>>,
}

/// A raw picture produced by a decoder session
#[derive(Debug, Clone)]
pub struct DecodedPicture {
  pub format: VideoPixelFormat,
  pub coded_width: u32,
  pub coded_height: u32,
  /// Tightly packed planes in canonical format order
  pub data: Vec<u8>,
  /// Presentation timestamp in microseconds, carried through from the chunk
  pub pts: i64,
  /// Color space signalled in the bitstream, when present
  pub color_space: Option<VideoColorSpaceInit>,
}

/// A raw sample buffer produced by an audio decoder session
#[derive(Debug, Clone)]
pub struct DecodedAudio {
  pub format: AudioSampleFormat,
  pub sample_rate: f32,
  pub number_of_frames: u32,
  pub number_of_channels: u32,
  /// Tightly packed planes (one for interleaved formats)
  pub data: Vec<u8>,
  pub pts: i64,
}

/// Per-frame encode controls forwarded from `encode()` options
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeRequest {
  pub key_frame: bool,
  /// Per-frame quantizer, only meaningful in quantizer bitrate mode
  pub quantizer: Option<f64>,
}

/// Resolved video encoder settings handed to the backend
#[derive(Debug, Clone)]
pub struct VideoEncoderSettings {
  pub codec: String,
  pub width: u32,
  pub height: u32,
  pub bitrate: Option<u64>,
  pub framerate: Option<f64>,
  /// "constant" | "variable" | "quantizer"
  pub bitrate_mode: &'static str,
  /// "quality" | "realtime"
  pub latency_mode: &'static str,
  /// AVC/HEVC bitstream format: Annex-B (no out-of-band description) vs
  /// length-prefixed with avcC/hvcC description
  pub annex_b: bool,
  /// Temporal layers requested via scalabilityMode (1 when unset)
  pub temporal_layers: u32,
  /// Keep the alpha plane and encode it as side data
  pub keep_alpha: bool,
  pub prefer_hardware: bool,
}

/// Resolved video decoder settings handed to the backend
#[derive(Debug, Clone)]
pub struct VideoDecoderSettings {
  pub codec: String,
  pub coded_width: Option<u32>,
  pub coded_height: Option<u32>,
  /// Codec-specific description (avcC/hvcC/av1C); absent means in-band
  /// parameter sets (Annex-B)
  pub description: Option<Vec<u8>>,
  pub optimize_for_latency: bool,
  pub prefer_hardware: bool,
}

/// Resolved audio encoder settings handed to the backend
#[derive(Debug, Clone)]
pub struct AudioEncoderSettings {
  pub codec: String,
  pub sample_rate: f64,
  pub number_of_channels: u32,
  pub bitrate: Option<u64>,
}

/// Resolved audio decoder settings handed to the backend
#[derive(Debug, Clone)]
pub struct AudioDecoderSettings {
  pub codec: String,
  pub sample_rate: f64,
  pub number_of_channels: u32,
  /// Codec-specific description (AudioSpecificConfig, OpusHead)
  pub description: Option<Vec<u8>>,
}

/// A native codec library adapter.
///
/// The backend decides internally whether a session actually runs on
/// hardware; the engine only forwards the preference and tracks failures in
/// the hardware-fallback registry.
pub trait CodecBackend: Send + Sync + 'static {
  /// Answer whether this backend can realise the codec in the given role.
  /// Must not allocate a session.
  fn probe_support(&self, codec: &str, role: CodecRole) -> bool;

  fn open_video_encoder(
    &self,
    settings: &VideoEncoderSettings,
  ) -> BackendResult<Box<dyn VideoEncoderSession>>;

  fn open_video_decoder(
    &self,
    settings: &VideoDecoderSettings,
  ) -> BackendResult<Box<dyn VideoDecoderSession>>;

  fn open_audio_encoder(
    &self,
    settings: &AudioEncoderSettings,
  ) -> BackendResult<Box<dyn AudioEncoderSession>>;

  fn open_audio_decoder(
    &self,
    settings: &AudioDecoderSettings,
  ) -> BackendResult<Box<dyn AudioDecoderSession>>;
}

pub trait VideoEncoderSession: Send {
  /// Transfer the frame's pixel planes into the encoder
  fn feed_frame(&mut self, frame: &VideoFrame, request: &EncodeRequest) -> BackendResult<()>;

  fn poll_output(&mut self) -> BackendResult<PollOutput<EncodedPacket>>;

  /// Ask for trailing output; subsequent polls run to `EndOfStream`
  fn drain(&mut self) -> BackendResult<()>;

  /// Codec-specific decoder description (avcC / hvcC / av1C), when the
  /// bitstream format calls for out-of-band parameter sets
  fn decoder_description(&mut self) -> BackendResult<Option<Vec<u8>>>;

  /// Whether this session ended up on a hardware path
  fn is_hardware(&self) -> bool {
    false
  }
}

pub trait VideoDecoderSession: Send {
  fn feed_chunk(&mut self, data: &[u8], pts: i64, is_key: bool) -> BackendResult<()>;

  fn poll_output(&mut self) -> BackendResult<PollOutput<DecodedPicture>>;

  fn drain(&mut self) -> BackendResult<()>;

  fn is_hardware(&self) -> bool {
    false
  }
}

pub trait AudioEncoderSession: Send {
  fn feed_data(&mut self, data: &AudioData) -> BackendResult<()>;

  fn poll_output(&mut self) -> BackendResult<PollOutput<EncodedPacket>>;

  fn drain(&mut self) -> BackendResult<()>;

  /// Codec-specific decoder description (OpusHead, AudioSpecificConfig)
  fn decoder_description(&mut self) -> BackendResult<Option<Vec<u8>>>;
}

pub trait AudioDecoderSession: Send {
  fn feed_chunk(&mut self, data: &[u8], pts: i64, is_key: bool) -> BackendResult<()>;

  fn poll_output(&mut self) -> BackendResult<PollOutput<DecodedAudio>>;

  fn drain(&mut self) -> BackendResult<()>;
}

static CODEC_BACKEND: RwLock<Option<Arc<dyn CodecBackend>>> = RwLock::new(None);

/// Install the process-wide default codec backend.
///
/// Codec instances constructed without an explicit backend use this one.
pub fn set_codec_backend(backend: Arc<dyn CodecBackend>) {
  *CODEC_BACKEND.write().expect("backend registry poisoned") = Some(backend);
}

/// The process-wide default codec backend, if one is installed
pub fn codec_backend() -> Option<Arc<dyn CodecBackend>> {
  CODEC_BACKEND
    .read()
    .expect("backend registry poisoned")
    .clone()
}
