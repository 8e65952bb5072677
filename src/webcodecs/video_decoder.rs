//! VideoDecoder - WebCodecs API implementation
//!
//! Decodes EncodedVideoChunk objects into VideoFrame objects through the
//! codec backend. See:
//! https://developer.mozilla.org/en-US/docs/Web/API/VideoDecoder

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::{
  self, CodecBackend, CodecDirection, CodecRole, PollOutput, VideoDecoderSession,
  VideoDecoderSettings,
};
use crate::codec::{
  AddEventListenerOptions, CodecPipeline, CodecProcessor, CodecState, ErrorCallback, Event,
  EventHandler, EventTarget,
};
use crate::webcodecs::backend_to_dom;
use crate::webcodecs::encoded_video_chunk::{
  EncodedVideoChunk, EncodedVideoChunkType, HardwareAcceleration, VideoDecoderConfig,
  VideoDecoderSupport,
};
use crate::webcodecs::error::{
  data_error, invalid_state_error, not_supported_error, type_error, Result,
};
use crate::webcodecs::hw_fallback;
use crate::webcodecs::video_frame::{VideoColorSpace, VideoFrame};

/// Output callback signature: one decoded frame
pub type VideoDecoderOutputCallback = Arc<dyn Fn(VideoFrame) + Send + Sync>;

/// Construction-time callbacks (W3C VideoDecoderInit)
pub struct VideoDecoderInit {
  pub output: VideoDecoderOutputCallback,
  pub error: ErrorCallback,
}

fn validate_config(config: &VideoDecoderConfig) -> Result<()> {
  if config.codec.is_empty() {
    return Err(type_error("codec is required"));
  }
  if config.coded_width == Some(0) {
    return Err(type_error("codedWidth must be greater than 0"));
  }
  if config.coded_height == Some(0) {
    return Err(type_error("codedHeight must be greater than 0"));
  }
  if config.display_aspect_width == Some(0) {
    return Err(type_error("displayAspectWidth must be greater than 0"));
  }
  if config.display_aspect_height == Some(0) {
    return Err(type_error("displayAspectHeight must be greater than 0"));
  }
  Ok(())
}

struct VideoDecodeProcessor {
  backend: Arc<dyn CodecBackend>,
  session: Option<Box<dyn VideoDecoderSession>>,
  active: Option<ActiveDecode>,
}

struct ActiveDecode {
  config: VideoDecoderConfig,
  /// Color space decoded frames inherit when the bitstream leaves it unset
  config_color_space: Option<VideoColorSpace>,
  /// Durations of fed chunks, matched back to output frames by timestamp
  pending_durations: Vec<(i64, Option<i64>)>,
  hw_active: bool,
  produced_output: bool,
}

impl ActiveDecode {
  fn note_failure(&self) {
    if self.hw_active && !self.produced_output {
      hw_fallback::record_hw_failure(&self.config.codec, CodecDirection::Decode);
    }
  }

  fn make_frame(&mut self, picture: backend::DecodedPicture) -> VideoFrame {
    let duration = self
      .pending_durations
      .iter()
      .position(|(pts, _)| *pts == picture.pts)
      .map(|index| self.pending_durations.remove(index).1)
      .unwrap_or(None);

    // Configured color space wins; the bitstream's fills the gap
    let color_space = match (&self.config_color_space, &picture.color_space) {
      (Some(configured), _) => configured.clone(),
      (None, Some(in_band)) => VideoColorSpace::new(Some(in_band.clone())),
      (None, None) => VideoColorSpace::default(),
    };

    if !self.produced_output {
      self.produced_output = true;
      if self.hw_active {
        hw_fallback::record_hw_success(&self.config.codec, CodecDirection::Decode);
      }
    }

    VideoFrame::from_decoded(
      picture,
      duration,
      self.config.rotation,
      self.config.flip,
      color_space,
    )
  }
}

impl CodecProcessor for VideoDecodeProcessor {
  type Config = VideoDecoderConfig;
  type Input = EncodedVideoChunk;
  type Output = VideoFrame;

  fn configure(&mut self, config: VideoDecoderConfig) -> Result<()> {
    self.session = None;
    self.active = None;

    if !self
      .backend
      .probe_support(&config.codec, CodecRole::VideoDecoder)
    {
      return Err(not_supported_error(&format!(
        "Unsupported codec: {}",
        config.codec
      )));
    }

    let prefer_hardware = match config.hardware_acceleration {
      HardwareAcceleration::PreferSoftware => false,
      HardwareAcceleration::PreferHardware => true,
      HardwareAcceleration::NoPreference => {
        !hw_fallback::is_hw_disabled(&config.codec, CodecDirection::Decode)
      }
    };

    let settings = VideoDecoderSettings {
      codec: config.codec.clone(),
      coded_width: config.coded_width,
      coded_height: config.coded_height,
      description: config.description.clone(),
      optimize_for_latency: config.optimize_for_latency.unwrap_or(false),
      prefer_hardware,
    };

    let session = match self.backend.open_video_decoder(&settings) {
      Ok(session) => session,
      Err(err) => {
        if prefer_hardware {
          hw_fallback::record_hw_failure(&config.codec, CodecDirection::Decode);
        }
        return Err(backend_to_dom(err));
      }
    };

    let hw_active = prefer_hardware && session.is_hardware();
    let config_color_space = config
      .color_space
      .as_ref()
      .map(|init| VideoColorSpace::new(Some(init.clone())));
    self.session = Some(session);
    self.active = Some(ActiveDecode {
      config,
      config_color_space,
      pending_durations: Vec::new(),
      hw_active,
      produced_output: false,
    });
    Ok(())
  }

  fn process(&mut self, chunk: EncodedVideoChunk) -> Result<Vec<VideoFrame>> {
    let active = self
      .active
      .as_mut()
      .ok_or_else(|| invalid_state_error("Decoder is not configured"))?;
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Decoder is not configured"))?;

    let is_key = chunk.chunk_type() == EncodedVideoChunkType::Key;
    if let Err(err) = session.feed_chunk(chunk.data(), chunk.timestamp(), is_key) {
      active.note_failure();
      return Err(backend_to_dom(err));
    }
    active
      .pending_durations
      .push((chunk.timestamp(), chunk.duration()));

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(picture)) => outputs.push(active.make_frame(picture)),
        Ok(_) => break,
        Err(err) => {
          active.note_failure();
          return Err(backend_to_dom(err));
        }
      }
    }
    Ok(outputs)
  }

  fn drain(&mut self) -> Result<Vec<VideoFrame>> {
    let active = self
      .active
      .as_mut()
      .ok_or_else(|| invalid_state_error("Decoder is not configured"))?;
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Decoder is not configured"))?;

    if let Err(err) = session.drain() {
      active.note_failure();
      return Err(backend_to_dom(err));
    }

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(picture)) => outputs.push(active.make_frame(picture)),
        Ok(_) => break,
        Err(err) => {
          active.note_failure();
          return Err(backend_to_dom(err));
        }
      }
    }
    Ok(outputs)
  }

  fn teardown(&mut self) {
    self.session = None;
    self.active = None;
  }
}

/// VideoDecoder - WebCodecs-compliant video decoder
///
/// The first chunk accepted after configure or reset must be a keyframe; a
/// delta-first is rejected synchronously with DataError and the decoder
/// stays configured.
pub struct VideoDecoder {
  backend: Arc<dyn CodecBackend>,
  pipeline: CodecPipeline<VideoDecodeProcessor>,
  events: Arc<EventTarget>,
  key_chunk_required: AtomicBool,
}

impl VideoDecoder {
  /// Create a VideoDecoder using the process-wide codec backend
  pub fn new(init: VideoDecoderInit) -> Result<Self> {
    let backend = backend::codec_backend()
      .ok_or_else(|| not_supported_error("No codec backend installed"))?;
    Ok(Self::with_backend(init, backend))
  }

  /// Create a VideoDecoder over an explicit codec backend
  pub fn with_backend(init: VideoDecoderInit, backend: Arc<dyn CodecBackend>) -> Self {
    let events = Arc::new(EventTarget::new());
    let processor = VideoDecodeProcessor {
      backend: backend.clone(),
      session: None,
      active: None,
    };
    let pipeline = CodecPipeline::new(processor, init.output, init.error, events.clone());
    Self {
      backend,
      pipeline,
      events,
      key_chunk_required: AtomicBool::new(true),
    }
  }

  /// Current codec state
  pub fn state(&self) -> CodecState {
    self.pipeline.state()
  }

  /// Number of accepted decodes the worker has not yet dequeued
  pub fn decode_queue_size(&self) -> u32 {
    self.pipeline.queue_size()
  }

  /// Configure the decoder. A syntactically invalid config raises TypeError
  /// synchronously; a valid but unsupported one closes the decoder through
  /// the error callback with NotSupportedError.
  pub fn configure(&self, config: VideoDecoderConfig) -> Result<()> {
    if self.pipeline.state() == CodecState::Closed {
      return Err(invalid_state_error("Decoder is closed"));
    }
    validate_config(&config)?;
    self.key_chunk_required.store(true, Ordering::SeqCst);
    self.pipeline.configure(config)
  }

  /// Decode an encoded chunk
  pub fn decode(&self, chunk: &EncodedVideoChunk) -> Result<()> {
    if self.pipeline.state() != CodecState::Configured {
      return Err(invalid_state_error("Decoder is not configured"));
    }
    if self.key_chunk_required.load(Ordering::SeqCst) {
      if chunk.chunk_type() != EncodedVideoChunkType::Key {
        return Err(data_error("A key chunk is required after configure or reset"));
      }
      self.key_chunk_required.store(false, Ordering::SeqCst);
    }
    self.pipeline.submit(chunk.clone())
  }

  /// Enqueue a flush barrier; the future resolves when all prior work has
  /// drained, and fails with AbortError when superseded by reset/close.
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    self.pipeline.flush()
  }

  /// Cancel outstanding work and return to unconfigured
  pub fn reset(&self) -> Result<()> {
    self.pipeline.reset()?;
    self.key_chunk_required.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Close the decoder permanently. A second close raises InvalidStateError.
  pub fn close(&self) -> Result<()> {
    self.pipeline.close()
  }

  /// The `ondequeue` handler slot
  pub fn ondequeue(&self) -> Option<EventHandler> {
    self.events.ondequeue()
  }

  pub fn set_ondequeue(&self, handler: Option<EventHandler>) {
    self.events.set_ondequeue(handler);
  }

  pub fn add_event_listener(
    &self,
    event_type: &str,
    handler: EventHandler,
    options: AddEventListenerOptions,
  ) {
    self.events.add_event_listener(event_type, handler, options);
  }

  pub fn remove_event_listener(&self, event_type: &str, handler: &EventHandler, capture: bool) {
    self.events.remove_event_listener(event_type, handler, capture);
  }

  pub fn dispatch_event(&self, event: &Event) {
    self.events.dispatch_event(event);
  }

  /// The backend this instance drives
  pub fn backend(&self) -> &Arc<dyn CodecBackend> {
    &self.backend
  }

  /// Check whether a configuration is supported, without mutating any codec
  /// instance. Uses the process-wide backend.
  pub async fn is_config_supported(config: VideoDecoderConfig) -> Result<VideoDecoderSupport> {
    validate_config(&config)?;
    let supported = match backend::codec_backend() {
      Some(backend) => backend.probe_support(&config.codec, CodecRole::VideoDecoder),
      None => false,
    };
    Ok(VideoDecoderSupport { supported, config })
  }

  /// `is_config_supported` against an explicit backend
  pub async fn is_config_supported_with(
    backend: Arc<dyn CodecBackend>,
    config: VideoDecoderConfig,
  ) -> Result<VideoDecoderSupport> {
    validate_config(&config)?;
    let supported = backend.probe_support(&config.codec, CodecRole::VideoDecoder);
    Ok(VideoDecoderSupport { supported, config })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_config() {
    assert!(validate_config(&VideoDecoderConfig::new("vp8")).is_ok());
    assert!(validate_config(&VideoDecoderConfig::new("")).is_err());

    let mut config = VideoDecoderConfig::new("vp8");
    config.coded_width = Some(0);
    assert!(validate_config(&config).is_err());

    let mut config = VideoDecoderConfig::new("vp8");
    config.display_aspect_height = Some(0);
    assert!(validate_config(&config).is_err());

    // Whitespace is not stripped: still syntactically valid
    assert!(validate_config(&VideoDecoderConfig::new("  vp09.00.10.08  ")).is_ok());
  }
}
