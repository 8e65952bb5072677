//! Container reader/writer collaborator interfaces
//!
//! The demuxer and muxer adapters in `webcodecs` drive these traits; the
//! actual MP4 box and Matroska EBML handling lives behind them.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::backend::BackendResult;
use crate::webcodecs::codec_string::CodecId;

/// Container format tags supported by the adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
  Mp4,
  WebM,
  Mkv,
}

impl ContainerFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      ContainerFormat::Mp4 => "mp4",
      ContainerFormat::WebM => "webm",
      ContainerFormat::Mkv => "mkv",
    }
  }
}

/// Track media kinds a container can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
  Video,
  Audio,
  Subtitle,
  Data,
}

/// What a reader knows about one track after opening the container
#[derive(Debug, Clone)]
pub struct TrackInfo {
  /// Zero-based track index
  pub index: u32,
  pub kind: TrackKind,
  pub codec_id: CodecId,
  /// Codec-specific configuration bytes (avcC/hvcC/vpcC/AudioSpecificConfig)
  pub extradata: Option<Vec<u8>>,
  /// Track duration in microseconds, when the container records one
  pub duration_us: Option<i64>,
  pub width: Option<u32>,
  pub height: Option<u32>,
  pub sample_rate: Option<u32>,
  pub channels: Option<u32>,
}

/// One packet read from a container
#[derive(Debug, Clone)]
pub struct PacketRecord {
  pub track_index: u32,
  pub data: Vec<u8>,
  /// Presentation timestamp in microseconds
  pub pts_us: i64,
  pub duration_us: Option<i64>,
  pub is_key: bool,
}

/// Where a reader gets its bytes
#[derive(Debug, Clone)]
pub enum ContainerSource {
  Bytes(Vec<u8>),
  Path(PathBuf),
}

/// Demux side of the container collaborator
pub trait ContainerReader: Send {
  fn tracks(&self) -> &[TrackInfo];

  /// Container duration in microseconds, when recorded
  fn duration_us(&self) -> Option<i64>;

  /// Restrict `read_packet` to the given track (additive; one per kind)
  fn select_track(&mut self, index: u32) -> BackendResult<()>;

  /// The next packet from any selected track, or `None` at end of stream
  fn read_packet(&mut self) -> BackendResult<Option<PacketRecord>>;

  /// Move the read head. Packets read afterwards may start earlier than the
  /// requested timestamp when the nearest keyframe precedes it.
  fn seek(&mut self, pts_us: i64) -> BackendResult<()>;
}

/// Options fixed when a writer is created
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
  /// MP4: move the index atom to the head of the file
  pub fast_start: bool,
  /// MP4: fragment-friendly output
  pub fragmented: bool,
  /// Streaming output buffer capacity; `None` means buffered output
  pub streaming_capacity: Option<usize>,
}

/// Video track parameters for a writer
#[derive(Debug, Clone)]
pub struct VideoTrackSpec {
  pub codec_id: CodecId,
  pub codec: String,
  pub width: u32,
  pub height: u32,
  pub extradata: Option<Vec<u8>>,
  /// Track carries an encoded alpha channel as block-additional side data
  pub has_alpha: bool,
}

/// Audio track parameters for a writer
#[derive(Debug, Clone)]
pub struct AudioTrackSpec {
  pub codec_id: CodecId,
  pub codec: String,
  pub sample_rate: u32,
  pub channels: u32,
  /// Samples per packet when fixed by the codec (AAC 1024, Opus 960)
  pub frame_size: Option<u32>,
  pub extradata: Option<Vec<u8>>,
}

/// One chunk write, with its encoder metadata already unpacked
#[derive(Debug, Clone, Copy)]
pub struct ChunkWrite<'a> {
  pub track_index: u32,
  pub data: &'a [u8],
  pub pts_us: i64,
  pub duration_us: Option<i64>,
  pub is_key: bool,
  /// Updated decoder description from encoder metadata, when present
  pub description: Option<&'a [u8]>,
  /// Encoded alpha channel for WebM/MKV block additions, when present
  pub alpha_data: Option<&'a [u8]>,
}

/// Mux side of the container collaborator
pub trait ContainerWriter: Send {
  fn add_video_track(&mut self, spec: &VideoTrackSpec) -> BackendResult<u32>;

  fn add_audio_track(&mut self, spec: &AudioTrackSpec) -> BackendResult<u32>;

  /// Write the container header; called once before the first chunk
  fn begin(&mut self) -> BackendResult<()>;

  fn write_chunk(&mut self, write: ChunkWrite<'_>) -> BackendResult<()>;

  /// Push buffered data out (streaming) or no-op (buffered)
  fn flush(&mut self) -> BackendResult<()>;

  /// Write the trailer and return the complete file bytes (buffered mode).
  /// Streaming writers return an empty vec; remaining bytes come from
  /// `read_available`.
  fn finalize(&mut self) -> BackendResult<Vec<u8>>;

  /// Streaming mode: the next available bytes, or `None` when drained
  fn read_available(&mut self) -> Option<Vec<u8>>;

  /// Streaming mode: whether the trailer has been written and read out
  fn is_eof(&self) -> bool;
}

/// A factory for readers and writers of the three supported formats
pub trait ContainerBackend: Send + Sync + 'static {
  fn open_reader(
    &self,
    format: ContainerFormat,
    source: ContainerSource,
  ) -> BackendResult<Box<dyn ContainerReader>>;

  fn new_writer(
    &self,
    format: ContainerFormat,
    options: &WriterOptions,
  ) -> BackendResult<Box<dyn ContainerWriter>>;
}

static CONTAINER_BACKEND: RwLock<Option<Arc<dyn ContainerBackend>>> = RwLock::new(None);

/// Install the process-wide default container backend
pub fn set_container_backend(backend: Arc<dyn ContainerBackend>) {
  *CONTAINER_BACKEND
    .write()
    .expect("backend registry poisoned") = Some(backend);
}

/// The process-wide default container backend, if one is installed
pub fn container_backend() -> Option<Arc<dyn ContainerBackend>> {
  CONTAINER_BACKEND
    .read()
    .expect("backend registry poisoned")
    .clone()
}
