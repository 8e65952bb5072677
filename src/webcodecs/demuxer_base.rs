//! Demuxer Base - Shared types and traits for container demuxers
//!
//! This module provides common functionality for Mp4Demuxer, WebMDemuxer,
//! and MkvDemuxer to eliminate code duplication across the three
//! implementations. Format-specific behaviour (codec-string synthesis from
//! container extradata) hangs off the [`DemuxerFormat`] trait.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;

use crate::backend::container::{
  ContainerBackend, ContainerFormat, ContainerReader, ContainerSource, PacketRecord, TrackInfo,
  TrackKind,
};
use crate::webcodecs::codec_string::CodecId;
use crate::webcodecs::encoded_audio_chunk::{
  EncodedAudioChunk, EncodedAudioChunkInit, EncodedAudioChunkType,
};
use crate::webcodecs::encoded_video_chunk::{
  EncodedVideoChunk, EncodedVideoChunkInit, EncodedVideoChunkType,
};
use crate::webcodecs::error::{
  encoding_error, invalid_state_error, type_error, DOMException, Result,
};

// ============================================================================
// Callback Type Aliases
// ============================================================================

/// Video output callback
pub type VideoChunkCallback = Arc<dyn Fn(EncodedVideoChunk) + Send + Sync>;

/// Audio output callback
pub type AudioChunkCallback = Arc<dyn Fn(EncodedAudioChunk) + Send + Sync>;

/// Error callback
pub type DemuxerErrorCallback = Arc<dyn Fn(DOMException) + Send + Sync>;

/// Callback set supplied at construction. `error` is mandatory; a demuxer
/// without at least one output callback can still be driven through the
/// chunk stream.
pub struct DemuxerCallbacks {
  pub video_output: Option<VideoChunkCallback>,
  pub audio_output: Option<AudioChunkCallback>,
  pub error: DemuxerErrorCallback,
}

// ============================================================================
// Shared State Types
// ============================================================================

/// Demuxer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerState {
  /// Initial state - not yet loaded
  Unloaded,
  /// File/buffer loaded, ready to demux
  Ready,
  /// Currently demuxing
  Demuxing,
  /// All packets read
  EndOfStream,
  /// Closed
  Closed,
}

impl DemuxerState {
  pub fn as_str(&self) -> &'static str {
    match self {
      DemuxerState::Unloaded => "unloaded",
      DemuxerState::Ready => "ready",
      DemuxerState::Demuxing => "demuxing",
      DemuxerState::EndOfStream => "ended",
      DemuxerState::Closed => "closed",
    }
  }
}

/// Track information exposed to callers
#[derive(Debug, Clone)]
pub struct DemuxerTrackInfo {
  /// Zero-based track index
  pub index: u32,
  /// Track type ("video", "audio", "subtitle", "data")
  pub track_type: &'static str,
  /// Codec string (WebCodecs format)
  pub codec: String,
  /// Duration in microseconds
  pub duration: Option<i64>,
  /// Coded width (video only)
  pub coded_width: Option<u32>,
  /// Coded height (video only)
  pub coded_height: Option<u32>,
  /// Sample rate (audio only)
  pub sample_rate: Option<u32>,
  /// Number of channels (audio only)
  pub number_of_channels: Option<u32>,
}

/// Video decoder configuration for the selected video track
#[derive(Debug, Clone)]
pub struct DemuxerVideoDecoderConfig {
  pub codec: String,
  pub coded_width: u32,
  pub coded_height: u32,
  /// Codec-specific description data (avcC/hvcC)
  pub description: Option<Vec<u8>>,
}

/// Audio decoder configuration for the selected audio track
#[derive(Debug, Clone)]
pub struct DemuxerAudioDecoderConfig {
  pub codec: String,
  pub sample_rate: u32,
  pub number_of_channels: u32,
  /// Codec-specific description data
  pub description: Option<Vec<u8>>,
}

/// A demuxed chunk: the tagged union yielded by the async iterator
#[derive(Debug, Clone)]
pub enum DemuxedChunk {
  Video(EncodedVideoChunk),
  Audio(EncodedAudioChunk),
}

impl DemuxedChunk {
  pub fn chunk_type(&self) -> &'static str {
    match self {
      DemuxedChunk::Video(_) => "video",
      DemuxedChunk::Audio(_) => "audio",
    }
  }

  pub fn video_chunk(&self) -> Option<&EncodedVideoChunk> {
    match self {
      DemuxedChunk::Video(chunk) => Some(chunk),
      DemuxedChunk::Audio(_) => None,
    }
  }

  pub fn audio_chunk(&self) -> Option<&EncodedAudioChunk> {
    match self {
      DemuxedChunk::Audio(chunk) => Some(chunk),
      DemuxedChunk::Video(_) => None,
    }
  }
}

// ============================================================================
// DemuxerFormat Trait - Format-specific behavior
// ============================================================================

/// Trait for format-specific demuxer behavior
pub trait DemuxerFormat: Send + Sync + 'static {
  /// Container format this demuxer reads
  const FORMAT: ContainerFormat;

  /// Convert a video codec ID to a WebCodecs codec string.
  ///
  /// The extradata parameter contains codec-specific configuration data
  /// (e.g., avcC for H.264, hvcC for HEVC) parsed to extract profile/level
  /// information for more accurate codec strings.
  fn codec_id_to_video_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String;

  /// Convert an audio codec ID to a WebCodecs codec string
  fn codec_id_to_audio_string(codec_id: CodecId, extradata: Option<&[u8]>) -> String;
}

// ============================================================================
// DemuxerInner - Generic demuxer implementation
// ============================================================================

/// Internal state for the generic demuxer
pub struct DemuxerInner<F: DemuxerFormat> {
  reader: Option<Box<dyn ContainerReader>>,
  state: DemuxerState,
  tracks: Vec<DemuxerTrackInfo>,
  raw_tracks: Vec<TrackInfo>,
  selected_video_track: Option<u32>,
  selected_audio_track: Option<u32>,
  callbacks: DemuxerCallbacks,
  _format: PhantomData<F>,
}

impl<F: DemuxerFormat> DemuxerInner<F> {
  pub fn new(callbacks: DemuxerCallbacks) -> Self {
    Self {
      reader: None,
      state: DemuxerState::Unloaded,
      tracks: Vec::new(),
      raw_tracks: Vec::new(),
      selected_video_track: None,
      selected_audio_track: None,
      callbacks,
      _format: PhantomData,
    }
  }

  /// Load from a file path
  pub fn load_file(&mut self, backend: &dyn ContainerBackend, path: &str) -> Result<()> {
    if self.state != DemuxerState::Unloaded {
      return Err(invalid_state_error("Demuxer already loaded. Call close() first."));
    }
    let reader = backend
      .open_reader(F::FORMAT, ContainerSource::Path(path.into()))
      .map_err(|err| encoding_error(&format!("Failed to open file: {}", err)))?;
    self.finish_load(reader);
    Ok(())
  }

  /// Load from a byte buffer
  pub fn load_buffer(&mut self, backend: &dyn ContainerBackend, bytes: Vec<u8>) -> Result<()> {
    if self.state != DemuxerState::Unloaded {
      return Err(invalid_state_error("Demuxer already loaded. Call close() first."));
    }
    let reader = backend
      .open_reader(F::FORMAT, ContainerSource::Bytes(bytes))
      .map_err(|err| encoding_error(&format!("Failed to open buffer: {}", err)))?;
    self.finish_load(reader);
    Ok(())
  }

  /// Complete the load process (shared between file and buffer loading)
  fn finish_load(&mut self, mut reader: Box<dyn ContainerReader>) {
    let raw_tracks = reader.tracks().to_vec();
    let tracks = parse_tracks::<F>(&raw_tracks);

    // Select the first video and audio tracks by default
    let selected_video_track = tracks
      .iter()
      .find(|track| track.track_type == "video")
      .map(|track| track.index);
    let selected_audio_track = tracks
      .iter()
      .find(|track| track.track_type == "audio")
      .map(|track| track.index);
    for index in selected_video_track.iter().chain(&selected_audio_track) {
      let _ = reader.select_track(*index);
    }

    self.reader = Some(reader);
    self.raw_tracks = raw_tracks;
    self.tracks = tracks;
    self.selected_video_track = selected_video_track;
    self.selected_audio_track = selected_audio_track;
    self.state = DemuxerState::Ready;
  }

  pub fn state(&self) -> DemuxerState {
    self.state
  }

  pub fn get_tracks(&self) -> Vec<DemuxerTrackInfo> {
    self.tracks.clone()
  }

  /// Container duration in microseconds
  pub fn get_duration(&self) -> Option<i64> {
    self.reader.as_ref().and_then(|reader| reader.duration_us())
  }

  /// Decoder configuration for the selected video track
  pub fn get_video_decoder_config(&self) -> Option<DemuxerVideoDecoderConfig> {
    let index = self.selected_video_track?;
    let track = self.raw_tracks.iter().find(|track| track.index == index)?;
    Some(DemuxerVideoDecoderConfig {
      codec: F::codec_id_to_video_string(track.codec_id, track.extradata.as_deref()),
      coded_width: track.width.unwrap_or(0),
      coded_height: track.height.unwrap_or(0),
      description: track.extradata.clone(),
    })
  }

  /// Decoder configuration for the selected audio track
  pub fn get_audio_decoder_config(&self) -> Option<DemuxerAudioDecoderConfig> {
    let index = self.selected_audio_track?;
    let track = self.raw_tracks.iter().find(|track| track.index == index)?;
    Some(DemuxerAudioDecoderConfig {
      codec: F::codec_id_to_audio_string(track.codec_id, track.extradata.as_deref()),
      sample_rate: track.sample_rate.unwrap_or(0),
      number_of_channels: track.channels.unwrap_or(0),
      description: track.extradata.clone(),
    })
  }

  /// Select a video track by index
  pub fn select_video_track(&mut self, index: u32) -> Result<()> {
    self.select_track(index, TrackKind::Video)
  }

  /// Select an audio track by index
  pub fn select_audio_track(&mut self, index: u32) -> Result<()> {
    self.select_track(index, TrackKind::Audio)
  }

  fn select_track(&mut self, index: u32, kind: TrackKind) -> Result<()> {
    let track = self
      .raw_tracks
      .iter()
      .find(|track| track.index == index)
      .ok_or_else(|| type_error(&format!("Track {} not found", index)))?;
    if track.kind != kind {
      return Err(type_error(&format!(
        "Track {} is not {} track",
        index,
        match kind {
          TrackKind::Video => "a video",
          TrackKind::Audio => "an audio",
          _ => "that kind of",
        }
      )));
    }
    let reader = self
      .reader
      .as_mut()
      .ok_or_else(|| invalid_state_error("Demuxer not loaded"))?;
    reader
      .select_track(index)
      .map_err(|err| encoding_error(&format!("Failed to select track: {}", err)))?;
    match kind {
      TrackKind::Video => self.selected_video_track = Some(index),
      TrackKind::Audio => self.selected_audio_track = Some(index),
      _ => {}
    }
    Ok(())
  }

  /// Read the next packet from the selected tracks as a tagged chunk.
  /// Transitions to `ended` at end of stream.
  pub fn next_chunk(&mut self) -> Result<Option<DemuxedChunk>> {
    if self.state == DemuxerState::Closed || self.state == DemuxerState::Unloaded {
      return Err(invalid_state_error("Demuxer is not ready. Call load() first."));
    }
    if self.state == DemuxerState::EndOfStream {
      return Ok(None);
    }

    let video_index = self.selected_video_track;
    let audio_index = self.selected_audio_track;
    let reader = self
      .reader
      .as_mut()
      .ok_or_else(|| invalid_state_error("Demuxer not loaded"))?;

    loop {
      match reader.read_packet() {
        Ok(Some(packet)) => {
          if Some(packet.track_index) == video_index {
            return Ok(Some(DemuxedChunk::Video(video_chunk_from_packet(&packet)?)));
          }
          if Some(packet.track_index) == audio_index {
            return Ok(Some(DemuxedChunk::Audio(audio_chunk_from_packet(&packet)?)));
          }
          // Packets from unselected tracks are skipped
        }
        Ok(None) => {
          self.state = DemuxerState::EndOfStream;
          return Ok(None);
        }
        Err(err) => {
          return Err(encoding_error(&format!("Demuxer error: {}", err)));
        }
      }
    }
  }

  /// Demux up to `max_packets` packets (all when absent), emitting chunks
  /// through the output callbacks. Returns the number of packets emitted.
  pub fn demux_sync(&mut self, max_packets: Option<u32>) -> u32 {
    if self.state != DemuxerState::Ready && self.state != DemuxerState::Demuxing {
      (self.callbacks.error)(invalid_state_error("Demuxer is not ready. Call load() first."));
      return 0;
    }
    self.state = DemuxerState::Demuxing;

    let limit = max_packets.unwrap_or(u32::MAX);
    let mut emitted = 0u32;

    while emitted < limit {
      match self.next_chunk() {
        Ok(Some(DemuxedChunk::Video(chunk))) => {
          if let Some(ref callback) = self.callbacks.video_output {
            callback(chunk);
          }
          emitted += 1;
        }
        Ok(Some(DemuxedChunk::Audio(chunk))) => {
          if let Some(ref callback) = self.callbacks.audio_output {
            callback(chunk);
          }
          emitted += 1;
        }
        Ok(None) => break,
        Err(err) => {
          (self.callbacks.error)(err);
          break;
        }
      }
    }

    if self.state == DemuxerState::Demuxing {
      self.state = DemuxerState::Ready;
    }
    emitted
  }

  /// Seek to a timestamp in microseconds. Chunks emitted afterwards may
  /// start earlier than requested when the nearest keyframe precedes it.
  pub fn seek(&mut self, timestamp_us: i64) -> Result<()> {
    let reader = self
      .reader
      .as_mut()
      .ok_or_else(|| invalid_state_error("Demuxer not loaded"))?;
    reader
      .seek(timestamp_us)
      .map_err(|err| encoding_error(&format!("Seek failed: {}", err)))?;
    if self.state == DemuxerState::EndOfStream {
      self.state = DemuxerState::Ready;
    }
    Ok(())
  }

  /// Close the demuxer and release resources
  pub fn close(&mut self) {
    self.reader = None;
    self.tracks.clear();
    self.raw_tracks.clear();
    self.selected_video_track = None;
    self.selected_audio_track = None;
    self.state = DemuxerState::Closed;
  }

  pub fn error_callback(&self) -> DemuxerErrorCallback {
    self.callbacks.error.clone()
  }
}

fn video_chunk_from_packet(packet: &PacketRecord) -> Result<EncodedVideoChunk> {
  EncodedVideoChunk::new(EncodedVideoChunkInit {
    chunk_type: if packet.is_key {
      EncodedVideoChunkType::Key
    } else {
      EncodedVideoChunkType::Delta
    },
    timestamp: packet.pts_us,
    duration: packet.duration_us,
    data: &packet.data,
  })
}

fn audio_chunk_from_packet(packet: &PacketRecord) -> Result<EncodedAudioChunk> {
  EncodedAudioChunk::new(EncodedAudioChunkInit {
    // Audio packets are typically keyframes
    chunk_type: if packet.is_key {
      EncodedAudioChunkType::Key
    } else {
      EncodedAudioChunkType::Delta
    },
    timestamp: packet.pts_us,
    duration: packet.duration_us,
    data: &packet.data,
  })
}

/// Parse reader track info into caller-facing track info using
/// format-specific codec conversion
fn parse_tracks<F: DemuxerFormat>(tracks: &[TrackInfo]) -> Vec<DemuxerTrackInfo> {
  tracks
    .iter()
    .map(|track| {
      let track_type = match track.kind {
        TrackKind::Video => "video",
        TrackKind::Audio => "audio",
        TrackKind::Subtitle => "subtitle",
        TrackKind::Data => "data",
      };
      let codec = match track.kind {
        TrackKind::Video => F::codec_id_to_video_string(track.codec_id, track.extradata.as_deref()),
        _ => F::codec_id_to_audio_string(track.codec_id, track.extradata.as_deref()),
      };
      DemuxerTrackInfo {
        index: track.index,
        track_type,
        codec,
        duration: track.duration_us,
        coded_width: track.width,
        coded_height: track.height,
        sample_rate: track.sample_rate,
        number_of_channels: track.channels,
      }
    })
    .collect()
}

// ============================================================================
// Async iteration
// ============================================================================

/// Stream of demuxed chunks; exhausting it transitions the demuxer from
/// ready to ended. Backed by the same packet loop as `demux`.
pub struct DemuxedChunkStream<F: DemuxerFormat> {
  inner: Arc<Mutex<DemuxerInner<F>>>,
}

impl<F: DemuxerFormat> DemuxedChunkStream<F> {
  pub(crate) fn new(inner: Arc<Mutex<DemuxerInner<F>>>) -> Self {
    Self { inner }
  }
}

impl<F: DemuxerFormat> Stream for DemuxedChunkStream<F> {
  type Item = DemuxedChunk;

  fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let mut inner = self.inner.lock().expect("demuxer lock poisoned");
    match inner.next_chunk() {
      Ok(Some(chunk)) => Poll::Ready(Some(chunk)),
      Ok(None) => Poll::Ready(None),
      Err(err) => {
        (inner.error_callback())(err);
        Poll::Ready(None)
      }
    }
  }
}

// ============================================================================
// ContainerDemuxer - the public adapter over one reader
// ============================================================================

/// The public demuxer adapter, generic over the container format.
///
/// `Mp4Demuxer`, `WebMDemuxer` and `MkvDemuxer` are aliases of this type
/// with their format markers.
pub struct ContainerDemuxer<F: DemuxerFormat> {
  inner: Arc<Mutex<DemuxerInner<F>>>,
  backend: Arc<dyn ContainerBackend>,
}

impl<F: DemuxerFormat> ContainerDemuxer<F> {
  /// Create a demuxer using the process-wide container backend
  pub fn new(callbacks: DemuxerCallbacks) -> Result<Self> {
    let backend = crate::backend::container::container_backend()
      .ok_or_else(|| crate::webcodecs::error::not_supported_error(
        "No container backend installed",
      ))?;
    Ok(Self::with_backend(callbacks, backend))
  }

  /// Create a demuxer over an explicit container backend
  pub fn with_backend(callbacks: DemuxerCallbacks, backend: Arc<dyn ContainerBackend>) -> Self {
    Self {
      inner: Arc::new(Mutex::new(DemuxerInner::new(callbacks))),
      backend,
    }
  }

  /// Current state ("unloaded", "ready", "demuxing", "ended", "closed")
  pub fn state(&self) -> &'static str {
    self.inner.lock().expect("demuxer lock poisoned").state().as_str()
  }

  /// Load a container file from a path. Rejects when already loaded.
  pub fn load(&self, path: &str) -> Result<()> {
    let mut inner = self.inner.lock().expect("demuxer lock poisoned");
    inner.load_file(self.backend.as_ref(), path)
  }

  /// Load a container from bytes. Rejects when already loaded.
  pub fn load_buffer(&self, bytes: Vec<u8>) -> Result<()> {
    let mut inner = self.inner.lock().expect("demuxer lock poisoned");
    inner.load_buffer(self.backend.as_ref(), bytes)
  }

  pub fn tracks(&self) -> Vec<DemuxerTrackInfo> {
    self.inner.lock().expect("demuxer lock poisoned").get_tracks()
  }

  /// Container duration in microseconds
  pub fn duration(&self) -> Option<i64> {
    self.inner.lock().expect("demuxer lock poisoned").get_duration()
  }

  pub fn video_decoder_config(&self) -> Option<DemuxerVideoDecoderConfig> {
    self
      .inner
      .lock()
      .expect("demuxer lock poisoned")
      .get_video_decoder_config()
  }

  pub fn audio_decoder_config(&self) -> Option<DemuxerAudioDecoderConfig> {
    self
      .inner
      .lock()
      .expect("demuxer lock poisoned")
      .get_audio_decoder_config()
  }

  pub fn select_video_track(&self, index: u32) -> Result<()> {
    self
      .inner
      .lock()
      .expect("demuxer lock poisoned")
      .select_video_track(index)
  }

  pub fn select_audio_track(&self, index: u32) -> Result<()> {
    self
      .inner
      .lock()
      .expect("demuxer lock poisoned")
      .select_audio_track(index)
  }

  /// Demux up to `max_packets` packets (all when absent), emitting chunks
  /// through the callbacks on the calling thread. Returns the number of
  /// packets emitted.
  pub fn demux(&self, max_packets: Option<u32>) -> u32 {
    self
      .inner
      .lock()
      .expect("demuxer lock poisoned")
      .demux_sync(max_packets)
  }

  /// The awaitable form of `demux`: the future resolves once `max_packets`
  /// packets have been emitted or end-of-stream is reached.
  pub async fn demux_async(&self, max_packets: Option<u32>) -> Result<u32> {
    let inner = self.inner.clone();
    tokio::task::spawn_blocking(move || {
      inner
        .lock()
        .expect("demuxer lock poisoned")
        .demux_sync(max_packets)
    })
    .await
    .map_err(|err| encoding_error(&format!("Demux task failed: {}", err)))
  }

  /// Async iterator over the selected tracks' chunks; exhausting it
  /// transitions the demuxer from ready to ended.
  pub fn chunks(&self) -> DemuxedChunkStream<F> {
    DemuxedChunkStream::new(self.inner.clone())
  }

  /// Seek to a timestamp in microseconds
  pub fn seek(&self, timestamp_us: i64) -> Result<()> {
    self.inner.lock().expect("demuxer lock poisoned").seek(timestamp_us)
  }

  /// Close the demuxer and release resources
  pub fn close(&self) {
    self.inner.lock().expect("demuxer lock poisoned").close();
  }
}

// ============================================================================
// Common Codec String Parsing Functions
// ============================================================================

/// Parse H.264 avcC extradata to generate a codec string
///
/// avcC format: [version, profile_idc, profile_compat, level_idc, ...]
pub fn parse_h264_codec_string(extradata: Option<&[u8]>) -> String {
  if let Some(data) = extradata.filter(|data| data.len() >= 4 && data[0] == 1) {
    let profile = data[1];
    let compat = data[2];
    let level = data[3];
    return format!("avc1.{:02X}{:02X}{:02X}", profile, compat, level);
  }
  "avc1.42001E".to_string() // Default: Baseline profile, level 3.0
}

/// Parse HEVC hvcC extradata to generate a codec string
///
/// hvcC format: [configurationVersion, general_profile_space/tier_flag/profile_idc, ...]
pub fn parse_hevc_codec_string(extradata: Option<&[u8]>) -> String {
  if let Some(data) = extradata.filter(|data| data.len() >= 13 && data[0] == 1) {
    let general_profile_idc = data[1] & 0x1F;
    let general_tier_flag = (data[1] >> 5) & 0x01;
    let general_level_idc = data[12];
    let tier = if general_tier_flag == 1 { "H" } else { "L" };
    return format!(
      "hev1.{}.6.{}{}.B0",
      general_profile_idc, tier, general_level_idc
    );
  }
  "hev1.1.6.L93.B0".to_string() // Default fallback
}

/// Parse VP9 vpcC extradata to generate a codec string
///
/// VP9CodecConfigurationRecord: version (1) + flags (3) + profile (1) +
/// level (1) + bitDepth (4 bits) + ...
pub fn parse_vp9_codec_string(extradata: Option<&[u8]>) -> String {
  if let Some(data) = extradata.filter(|data| data.len() >= 8) {
    let profile = data[4];
    let level = data[5];
    let bit_depth = (data[6] >> 4) & 0x0F;
    let bit_depth_code = match bit_depth {
      10 => 10,
      12 => 12,
      _ => 8,
    };
    return format!("vp09.{:02}.{:02}.{:02}", profile, level, bit_depth_code);
  }
  "vp09.00.10.08".to_string() // Default: Profile 0, level 1.0, 8-bit
}

/// Parse AAC AudioSpecificConfig to generate a codec string
///
/// AudioSpecificConfig: first 5 bits are audioObjectType
pub fn parse_aac_codec_string(extradata: Option<&[u8]>) -> String {
  if let Some(data) = extradata.filter(|data| !data.is_empty()) {
    let object_type = (data[0] >> 3) & 0x1F;
    return format!("mp4a.40.{}", object_type);
  }
  "mp4a.40.2".to_string() // Default: AAC-LC
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_h264_codec_string() {
    // Valid avcC with High profile, level 4.0
    let extradata = vec![1, 0x64, 0x00, 0x28];
    assert_eq!(parse_h264_codec_string(Some(&extradata)), "avc1.640028");

    // Invalid extradata falls back to the default
    assert_eq!(parse_h264_codec_string(None), "avc1.42001E");
    assert_eq!(parse_h264_codec_string(Some(&[0, 0, 0, 0])), "avc1.42001E");
  }

  #[test]
  fn test_parse_hevc_codec_string() {
    assert_eq!(parse_hevc_codec_string(None), "hev1.1.6.L93.B0");

    let mut extradata = vec![1u8, 0x01];
    extradata.extend_from_slice(&[0; 10]);
    extradata.push(93);
    assert_eq!(parse_hevc_codec_string(Some(&extradata)), "hev1.1.6.L93.B0");
  }

  #[test]
  fn test_parse_vp9_codec_string() {
    assert_eq!(parse_vp9_codec_string(None), "vp09.00.10.08");

    let extradata = vec![1, 0, 0, 0, 2, 20, 10 << 4, 0];
    assert_eq!(parse_vp9_codec_string(Some(&extradata)), "vp09.02.20.10");
  }

  #[test]
  fn test_parse_aac_codec_string() {
    let aac_lc = vec![0x10]; // 0x10 >> 3 = 2
    assert_eq!(parse_aac_codec_string(Some(&aac_lc)), "mp4a.40.2");

    let he_aac = vec![0x28]; // 0x28 >> 3 = 5
    assert_eq!(parse_aac_codec_string(Some(&he_aac)), "mp4a.40.5");

    assert_eq!(parse_aac_codec_string(None), "mp4a.40.2");
  }

  #[test]
  fn test_demuxer_state_strings() {
    assert_eq!(DemuxerState::Unloaded.as_str(), "unloaded");
    assert_eq!(DemuxerState::Ready.as_str(), "ready");
    assert_eq!(DemuxerState::Demuxing.as_str(), "demuxing");
    assert_eq!(DemuxerState::EndOfStream.as_str(), "ended");
    assert_eq!(DemuxerState::Closed.as_str(), "closed");
  }
}
