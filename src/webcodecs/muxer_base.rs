//! Muxer Base - Shared types and traits for container muxers
//!
//! This module provides common functionality for Mp4Muxer, WebMMuxer, and
//! MkvMuxer to eliminate code duplication across the three implementations.
//! Format-specific codec admission hangs off the [`MuxerFormat`] trait.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::backend::container::{
  AudioTrackSpec, ChunkWrite, ContainerBackend, ContainerFormat, ContainerWriter, VideoTrackSpec,
  WriterOptions,
};
use crate::webcodecs::codec_string::CodecId;
use crate::webcodecs::encoded_audio_chunk::{EncodedAudioChunk, EncodedAudioChunkMetadata};
use crate::webcodecs::encoded_video_chunk::{
  EncodedVideoChunk, EncodedVideoChunkMetadata, EncodedVideoChunkType,
};
use crate::webcodecs::error::{encoding_error, invalid_state_error, Result};

// ============================================================================
// Shared State Types
// ============================================================================

/// Muxer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
  /// Initial state - tracks can be added
  ConfiguringTracks,
  /// Tracks configured, accepting chunks
  Muxing,
  /// Finalized - no more operations allowed
  Finalized,
  /// Closed
  Closed,
}

impl MuxerState {
  pub fn as_str(&self) -> &'static str {
    match self {
      MuxerState::ConfiguringTracks => "configuring",
      MuxerState::Muxing => "muxing",
      MuxerState::Finalized => "finalized",
      MuxerState::Closed => "closed",
    }
  }
}

/// Stored video track info (extracted from config)
#[derive(Debug, Clone)]
pub struct StoredVideoTrackInfo {
  pub codec: String,
  pub width: u32,
  pub height: u32,
}

/// Stored audio track info (extracted from config)
#[derive(Debug, Clone)]
pub struct StoredAudioTrackInfo {
  pub codec: String,
  pub sample_rate: u32,
  pub channels: u32,
}

/// Streaming mode options for muxers
#[derive(Debug, Clone, Default)]
pub struct StreamingMuxerOptions {
  /// Buffer capacity for streaming output (default: 256KB)
  pub buffer_capacity: Option<u32>,
}

/// Video track configuration accepted by `add_video_track`
#[derive(Debug, Clone)]
pub struct MuxerVideoTrackConfig {
  /// Codec string (e.g., "avc1.42001E", "vp8", "av01.0.04M.08")
  pub codec: String,
  /// Video width in pixels
  pub width: u32,
  /// Video height in pixels
  pub height: u32,
  /// Codec-specific description data (avcC/hvcC/av1C from encoder metadata)
  pub description: Option<Vec<u8>>,
}

/// Audio track configuration accepted by `add_audio_track`
#[derive(Debug, Clone)]
pub struct MuxerAudioTrackConfig {
  /// Codec string (e.g., "mp4a.40.2" for AAC-LC, "opus")
  pub codec: String,
  /// Sample rate in Hz
  pub sample_rate: u32,
  /// Number of audio channels
  pub number_of_channels: u32,
  /// Codec-specific description data (esds for AAC, OpusHead for Opus)
  pub description: Option<Vec<u8>>,
}

// ============================================================================
// MuxerFormat Trait - Format-specific behavior
// ============================================================================

/// Trait for format-specific muxer behavior
pub trait MuxerFormat: Send + Sync + 'static {
  /// Container format for this muxer
  const FORMAT: ContainerFormat;

  /// Parse and admit a video codec string for this container
  fn parse_video_codec(codec: &str) -> Result<CodecId>;

  /// Parse and admit an audio codec string for this container
  fn parse_audio_codec(codec: &str) -> Result<CodecId>;

  /// Whether this container can carry an encoded alpha channel as
  /// block-additional side data
  fn supports_alpha() -> bool {
    false
  }

  /// Get audio frame size for a codec (if fixed by the codec)
  fn get_audio_frame_size(codec_id: CodecId) -> Option<u32> {
    match codec_id {
      CodecId::Aac => Some(1024),
      CodecId::Opus => Some(960), // 20ms at 48kHz
      CodecId::Mp3 => Some(1152),
      _ => None,
    }
  }
}

// ============================================================================
// MuxerInner - Generic muxer implementation
// ============================================================================

/// Internal state for the generic muxer
pub struct MuxerInner<F: MuxerFormat> {
  writer: Box<dyn ContainerWriter>,
  state: MuxerState,
  video_track: Option<(u32, StoredVideoTrackInfo)>,
  audio_track: Option<(u32, StoredAudioTrackInfo)>,
  is_streaming: bool,
  /// Last PTS written per track, to keep timestamps monotonic
  last_video_pts: i64,
  last_audio_pts: i64,
  _format: PhantomData<F>,
}

impl<F: MuxerFormat> MuxerInner<F> {
  pub fn new(writer: Box<dyn ContainerWriter>, is_streaming: bool) -> Self {
    Self {
      writer,
      state: MuxerState::ConfiguringTracks,
      video_track: None,
      audio_track: None,
      is_streaming,
      last_video_pts: i64::MIN,
      last_audio_pts: i64::MIN,
      _format: PhantomData,
    }
  }

  pub fn state(&self) -> MuxerState {
    self.state
  }

  /// Add a video track; at most one per muxer, before any chunk
  pub fn add_video_track(&mut self, config: MuxerVideoTrackConfig) -> Result<()> {
    if self.state != MuxerState::ConfiguringTracks {
      return Err(invalid_state_error("Cannot add track after muxing has started"));
    }
    if self.video_track.is_some() {
      return Err(invalid_state_error("Video track already added"));
    }

    let codec_id = F::parse_video_codec(&config.codec)?;
    let spec = VideoTrackSpec {
      codec_id,
      codec: config.codec.clone(),
      width: config.width,
      height: config.height,
      extradata: config.description,
      has_alpha: false,
    };
    let index = self
      .writer
      .add_video_track(&spec)
      .map_err(|err| encoding_error(&format!("Failed to add video stream: {}", err)))?;

    self.video_track = Some((
      index,
      StoredVideoTrackInfo {
        codec: config.codec,
        width: config.width,
        height: config.height,
      },
    ));
    Ok(())
  }

  /// Add an audio track; at most one per muxer, before any chunk
  pub fn add_audio_track(&mut self, config: MuxerAudioTrackConfig) -> Result<()> {
    if self.state != MuxerState::ConfiguringTracks {
      return Err(invalid_state_error("Cannot add track after muxing has started"));
    }
    if self.audio_track.is_some() {
      return Err(invalid_state_error("Audio track already added"));
    }

    let codec_id = F::parse_audio_codec(&config.codec)?;
    let spec = AudioTrackSpec {
      codec_id,
      codec: config.codec.clone(),
      sample_rate: config.sample_rate,
      channels: config.number_of_channels,
      frame_size: F::get_audio_frame_size(codec_id),
      extradata: config.description,
    };
    let index = self
      .writer
      .add_audio_track(&spec)
      .map_err(|err| encoding_error(&format!("Failed to add audio stream: {}", err)))?;

    self.audio_track = Some((
      index,
      StoredAudioTrackInfo {
        codec: config.codec,
        sample_rate: config.sample_rate,
        channels: config.number_of_channels,
      },
    ));
    Ok(())
  }

  /// Write the header and transition state if needed
  fn ensure_header_written(&mut self) -> Result<()> {
    if self.state == MuxerState::ConfiguringTracks {
      self
        .writer
        .begin()
        .map_err(|err| encoding_error(&format!("Failed to write header: {}", err)))?;
      self.state = MuxerState::Muxing;
    }
    Ok(())
  }

  /// Add an encoded video chunk with its encoder metadata
  pub fn add_video_chunk(
    &mut self,
    chunk: &EncodedVideoChunk,
    metadata: Option<&EncodedVideoChunkMetadata>,
  ) -> Result<()> {
    let (track_index, _) = *self
      .video_track
      .as_ref()
      .ok_or_else(|| invalid_state_error("No video track added"))?;

    self.ensure_header_written()?;
    if self.state != MuxerState::Muxing {
      return Err(invalid_state_error("Muxer is not in muxing state"));
    }

    // Keep PTS monotonically increasing per track
    let pts = if chunk.timestamp() <= self.last_video_pts {
      self.last_video_pts + 1
    } else {
      chunk.timestamp()
    };
    self.last_video_pts = pts;

    let description = metadata
      .and_then(|metadata| metadata.decoder_config.as_ref())
      .and_then(|config| config.description.as_deref())
      .filter(|description| !description.is_empty());

    let alpha_data = if F::supports_alpha() {
      metadata
        .and_then(|metadata| metadata.alpha_side_data.as_deref())
        .filter(|alpha| !alpha.is_empty())
    } else {
      let dropped = metadata.and_then(|metadata| metadata.alpha_side_data.as_ref());
      if dropped.is_some() {
        tracing::warn!(target: "webcodecs", "Alpha side data is not representable in {}", F::FORMAT.as_str());
      }
      None
    };

    self
      .writer
      .write_chunk(ChunkWrite {
        track_index,
        data: chunk.data(),
        pts_us: pts,
        duration_us: chunk.duration(),
        is_key: chunk.chunk_type() == EncodedVideoChunkType::Key,
        description,
        alpha_data,
      })
      .map_err(|err| encoding_error(&format!("Failed to write packet: {}", err)))
  }

  /// Add an encoded audio chunk with its encoder metadata
  pub fn add_audio_chunk(
    &mut self,
    chunk: &EncodedAudioChunk,
    metadata: Option<&EncodedAudioChunkMetadata>,
  ) -> Result<()> {
    let (track_index, _) = *self
      .audio_track
      .as_ref()
      .ok_or_else(|| invalid_state_error("No audio track added"))?;

    self.ensure_header_written()?;
    if self.state != MuxerState::Muxing {
      return Err(invalid_state_error("Muxer is not in muxing state"));
    }

    let pts = if chunk.timestamp() <= self.last_audio_pts {
      self.last_audio_pts + 1
    } else {
      chunk.timestamp()
    };
    self.last_audio_pts = pts;

    let description = metadata
      .and_then(|metadata| metadata.decoder_config.as_ref())
      .and_then(|config| config.description.as_deref())
      .filter(|description| !description.is_empty());

    self
      .writer
      .write_chunk(ChunkWrite {
        track_index,
        data: chunk.data(),
        pts_us: pts,
        duration_us: chunk.duration(),
        // Audio packets are typically all keyframes
        is_key: true,
        description,
        alpha_data: None,
      })
      .map_err(|err| encoding_error(&format!("Failed to write packet: {}", err)))
  }

  /// Flush any buffered data
  pub fn flush(&mut self) -> Result<()> {
    if self.state == MuxerState::Muxing {
      self
        .writer
        .flush()
        .map_err(|err| encoding_error(&format!("Failed to flush: {}", err)))?;
    }
    Ok(())
  }

  /// Finalize the muxer and return the complete file bytes.
  ///
  /// In streaming mode the data comes out of `read_streaming` instead and
  /// this returns an empty vec.
  pub fn finalize(&mut self) -> Result<Vec<u8>> {
    if self.state == MuxerState::ConfiguringTracks {
      if self.video_track.is_none() && self.audio_track.is_none() {
        return Err(invalid_state_error("No tracks added to muxer"));
      }
      self.ensure_header_written()?;
    }
    if self.state == MuxerState::Finalized {
      return Err(invalid_state_error("Muxer already finalized"));
    }

    let data = self
      .writer
      .finalize()
      .map_err(|err| encoding_error(&format!("Failed to finalize: {}", err)))?;
    self.state = MuxerState::Finalized;
    Ok(data)
  }

  /// Read available bytes in streaming mode
  pub fn read_streaming(&mut self) -> Result<Option<Vec<u8>>> {
    if !self.is_streaming {
      return Err(invalid_state_error("Not in streaming mode"));
    }
    Ok(self.writer.read_available())
  }

  /// Whether streaming output has been fully drained
  pub fn is_streaming_finished(&self) -> bool {
    self.writer.is_eof()
  }
}

// ============================================================================
// ContainerMuxer - the public adapter over one writer
// ============================================================================

/// The public muxer adapter, generic over the container format.
///
/// `Mp4Muxer`, `WebMMuxer` and `MkvMuxer` are aliases of this type with
/// their format markers; each provides its own options-taking constructor.
pub struct ContainerMuxer<F: MuxerFormat> {
  inner: Mutex<Option<MuxerInner<F>>>,
}

impl<F: MuxerFormat> std::fmt::Debug for ContainerMuxer<F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ContainerMuxer").finish()
  }
}

impl<F: MuxerFormat> ContainerMuxer<F> {
  /// Create a muxer over the process-wide container backend
  pub(crate) fn create(options: &WriterOptions) -> Result<Self> {
    let backend = crate::backend::container::container_backend().ok_or_else(|| {
      crate::webcodecs::error::not_supported_error("No container backend installed")
    })?;
    Self::create_with_backend(backend, options)
  }

  /// Create a muxer over an explicit container backend
  pub(crate) fn create_with_backend(
    backend: Arc<dyn ContainerBackend>,
    options: &WriterOptions,
  ) -> Result<Self> {
    let writer = backend
      .new_writer(F::FORMAT, options)
      .map_err(|err| encoding_error(&format!("Failed to create muxer: {}", err)))?;
    Ok(Self {
      inner: Mutex::new(Some(MuxerInner::new(
        writer,
        options.streaming_capacity.is_some(),
      ))),
    })
  }

  fn with_inner<R>(&self, f: impl FnOnce(&mut MuxerInner<F>) -> Result<R>) -> Result<R> {
    let mut guard = self.inner.lock().expect("muxer lock poisoned");
    let inner = guard
      .as_mut()
      .ok_or_else(|| invalid_state_error("Muxer is closed"))?;
    f(inner)
  }

  /// Current state ("configuring", "muxing", "finalized", "closed")
  pub fn state(&self) -> &'static str {
    let guard = self.inner.lock().expect("muxer lock poisoned");
    match guard.as_ref() {
      Some(inner) => inner.state().as_str(),
      None => MuxerState::Closed.as_str(),
    }
  }

  /// Add a video track. Must be called before adding any chunks.
  pub fn add_video_track(&self, config: MuxerVideoTrackConfig) -> Result<()> {
    self.with_inner(|inner| inner.add_video_track(config))
  }

  /// Add an audio track. Must be called before adding any chunks.
  pub fn add_audio_track(&self, config: MuxerAudioTrackConfig) -> Result<()> {
    self.with_inner(|inner| inner.add_audio_track(config))
  }

  /// Add an encoded video chunk, typically straight from a VideoEncoder
  /// output callback, with its metadata
  pub fn add_video_chunk(
    &self,
    chunk: &EncodedVideoChunk,
    metadata: Option<&EncodedVideoChunkMetadata>,
  ) -> Result<()> {
    self.with_inner(|inner| inner.add_video_chunk(chunk, metadata))
  }

  /// Add an encoded audio chunk with its metadata
  pub fn add_audio_chunk(
    &self,
    chunk: &EncodedAudioChunk,
    metadata: Option<&EncodedAudioChunkMetadata>,
  ) -> Result<()> {
    self.with_inner(|inner| inner.add_audio_chunk(chunk, metadata))
  }

  /// Drain buffered data
  pub fn flush(&self) -> Result<()> {
    self.with_inner(|inner| inner.flush())
  }

  /// Write the trailer and return the complete file bytes; locks the muxer
  pub fn finalize(&self) -> Result<Vec<u8>> {
    self.with_inner(|inner| inner.finalize())
  }

  /// Streaming mode: the next available output bytes, or `None` when
  /// nothing is pending
  pub fn read(&self) -> Result<Option<Vec<u8>>> {
    self.with_inner(|inner| inner.read_streaming())
  }

  /// Streaming mode: whether the trailer has been written and read out
  pub fn is_finished(&self) -> bool {
    let guard = self.inner.lock().expect("muxer lock poisoned");
    guard
      .as_ref()
      .map(|inner| inner.is_streaming_finished())
      .unwrap_or(true)
  }

  /// Close the muxer and release resources
  pub fn close(&self) {
    let mut guard = self.inner.lock().expect("muxer lock poisoned");
    guard.take();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_muxer_state_strings() {
    assert_eq!(MuxerState::ConfiguringTracks.as_str(), "configuring");
    assert_eq!(MuxerState::Muxing.as_str(), "muxing");
    assert_eq!(MuxerState::Finalized.as_str(), "finalized");
    assert_eq!(MuxerState::Closed.as_str(), "closed");
  }
}
