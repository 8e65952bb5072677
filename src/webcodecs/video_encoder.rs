//! VideoEncoder - WebCodecs API implementation
//!
//! Encodes VideoFrame objects into EncodedVideoChunk objects through the
//! codec backend. See:
//! https://developer.mozilla.org/en-US/docs/Web/API/VideoEncoder

use std::sync::Arc;

use crate::backend::{
  self, CodecBackend, CodecDirection, CodecRole, EncodeRequest, PollOutput,
  VideoEncoderSession, VideoEncoderSettings,
};
use crate::codec::{
  AddEventListenerOptions, CodecPipeline, CodecProcessor, CodecState, ErrorCallback, Event,
  EventHandler, EventTarget,
};
use crate::webcodecs::backend_to_dom;
use crate::webcodecs::encoded_video_chunk::{
  AvcBitstreamFormat, AlphaOption, EncodedVideoChunk, EncodedVideoChunkMetadata,
  HardwareAcceleration, SvcOutputMetadata, VideoDecoderConfigOutput, VideoEncoderConfig,
  VideoEncoderEncodeOptions, VideoEncoderSupport, VideoEncoderBitrateMode,
};
use crate::webcodecs::error::{
  invalid_state_error, not_supported_error, type_error, Result,
};
use crate::webcodecs::hw_fallback;
use crate::webcodecs::video_frame::VideoFrame;

/// Output callback signature: encoded chunk plus its metadata
pub type VideoEncoderOutputCallback =
  Arc<dyn Fn(EncodedVideoChunk, EncodedVideoChunkMetadata) + Send + Sync>;

/// Construction-time callbacks (W3C VideoEncoderInit)
pub struct VideoEncoderInit {
  pub output: VideoEncoderOutputCallback,
  pub error: ErrorCallback,
}

/// Validate the syntactic half of an encoder config. Semantic support is
/// the backend's answer.
fn validate_config(config: &VideoEncoderConfig) -> Result<()> {
  if config.codec.is_empty() {
    return Err(type_error("codec is required"));
  }
  if config.width == 0 {
    return Err(type_error("width must be greater than 0"));
  }
  if config.height == 0 {
    return Err(type_error("height must be greater than 0"));
  }
  if config.display_width == Some(0) {
    return Err(type_error("displayWidth must be greater than 0"));
  }
  if config.display_height == Some(0) {
    return Err(type_error("displayHeight must be greater than 0"));
  }
  if let Some(mode) = &config.scalability_mode {
    if parse_scalability_mode(mode).is_none() {
      return Err(type_error(&format!("Invalid scalabilityMode: {}", mode)));
    }
  }
  Ok(())
}

/// Normalised echo of a config for isConfigSupported: the recognised fields
/// survive, anything the engine does not consume is dropped
fn normalise_config(config: &VideoEncoderConfig) -> VideoEncoderConfig {
  let mut echo = config.clone();
  echo.content_hint = None;
  echo
}

/// Worker-side half of the encoder: owns the backend session and the
/// first-output bookkeeping.
struct VideoEncodeProcessor {
  backend: Arc<dyn CodecBackend>,
  session: Option<Box<dyn VideoEncoderSession>>,
  active: Option<ActiveEncode>,
}

struct ActiveEncode {
  config: VideoEncoderConfig,
  annex_b: bool,
  /// Decoder config is attached to the first output after each configure
  config_pending: bool,
  /// Orientation recorded from the first frame; later frames are clamped
  /// to it
  recorded_orientation: Option<(u32, bool)>,
  hw_active: bool,
  fed_any: bool,
  produced_output: bool,
}

impl ActiveEncode {
  fn note_failure(&self) {
    if self.hw_active && !self.produced_output {
      hw_fallback::record_hw_failure(&self.config.codec, CodecDirection::Encode);
    }
  }
}

fn build_output(
  active: &mut ActiveEncode,
  session: &mut Box<dyn VideoEncoderSession>,
  packet: backend::EncodedPacket,
) -> Result<(EncodedVideoChunk, EncodedVideoChunkMetadata)> {
  let decoder_config = if active.config_pending {
    active.config_pending = false;
    let description = if active.annex_b {
      None
    } else {
      session.decoder_description().map_err(backend_to_dom)?
    };
    let (rotation, flip) = active.recorded_orientation.unwrap_or((0, false));
    Some(VideoDecoderConfigOutput {
      codec: active.config.codec.clone(),
      coded_width: Some(active.config.width),
      coded_height: Some(active.config.height),
      color_space: active.config.color_space.clone(),
      description,
      rotation: rotation as f64,
      flip,
    })
  } else {
    None
  };

  if !active.produced_output {
    active.produced_output = true;
    if active.hw_active {
      hw_fallback::record_hw_success(&active.config.codec, CodecDirection::Encode);
    }
  }

  let svc = packet.temporal_layer_id.map(|id| SvcOutputMetadata {
    temporal_layer_id: Some(id),
  });
  let alpha_side_data = packet.alpha_data.clone();
  let chunk = EncodedVideoChunk::from_packet(&packet, packet.pts, packet.duration);

  Ok((
    chunk,
    EncodedVideoChunkMetadata {
      decoder_config,
      svc,
      alpha_side_data,
    },
  ))
}

impl CodecProcessor for VideoEncodeProcessor {
  type Config = VideoEncoderConfig;
  type Input = (VideoFrame, VideoEncoderEncodeOptions);
  type Output = (EncodedVideoChunk, EncodedVideoChunkMetadata);

  fn configure(&mut self, config: VideoEncoderConfig) -> Result<()> {
    // Reconfigure tears down the previous backend before building anew
    self.session = None;
    self.active = None;

    if !self
      .backend
      .probe_support(&config.codec, CodecRole::VideoEncoder)
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
        !hw_fallback::is_hw_disabled(&config.codec, CodecDirection::Encode)
      }
    };

    let annex_b = matches!(
      config.avc.as_ref().map(|avc| avc.format),
      Some(AvcBitstreamFormat::AnnexB)
    ) || matches!(
      config.hevc.as_ref().map(|hevc| hevc.format),
      Some(AvcBitstreamFormat::AnnexB)
    );

    let temporal_layers = config
      .scalability_mode
      .as_deref()
      .and_then(parse_scalability_mode)
      .map(|(_, temporal)| temporal)
      .unwrap_or(1);

    let settings = VideoEncoderSettings {
      codec: config.codec.clone(),
      width: config.width,
      height: config.height,
      bitrate: config.bitrate,
      framerate: config.framerate,
      bitrate_mode: config.bitrate_mode.as_str(),
      latency_mode: config.latency_mode.as_str(),
      annex_b,
      temporal_layers,
      keep_alpha: config.alpha == AlphaOption::Keep,
      prefer_hardware,
    };

    let session = match self.backend.open_video_encoder(&settings) {
      Ok(session) => session,
      Err(err) => {
        if prefer_hardware {
          hw_fallback::record_hw_failure(&config.codec, CodecDirection::Encode);
        }
        return Err(backend_to_dom(err));
      }
    };

    let hw_active = prefer_hardware && session.is_hardware();
    self.session = Some(session);
    self.active = Some(ActiveEncode {
      config,
      annex_b,
      config_pending: true,
      recorded_orientation: None,
      hw_active,
      fed_any: false,
      produced_output: false,
    });
    Ok(())
  }

  fn process(
    &mut self,
    (frame, options): (VideoFrame, VideoEncoderEncodeOptions),
  ) -> Result<Vec<Self::Output>> {
    let active = self
      .active
      .as_mut()
      .ok_or_else(|| invalid_state_error("Encoder is not configured"))?;
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Encoder is not configured"))?;

    if active.recorded_orientation.is_none() {
      active.recorded_orientation = Some((frame.rotation(), frame.flip()));
    }
    active.fed_any = true;

    let request = EncodeRequest {
      key_frame: options.key_frame,
      quantizer: if active.config.bitrate_mode == VideoEncoderBitrateMode::Quantizer {
        options.quantizer
      } else {
        None
      },
    };

    if let Err(err) = session.feed_frame(&frame, &request) {
      active.note_failure();
      frame.close();
      return Err(backend_to_dom(err));
    }

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(packet)) => outputs.push(build_output(active, session, packet)?),
        Ok(_) => break,
        Err(err) => {
          active.note_failure();
          frame.close();
          return Err(backend_to_dom(err));
        }
      }
    }

    // The work item owned this frame reference
    frame.close();
    Ok(outputs)
  }

  fn drain(&mut self) -> Result<Vec<Self::Output>> {
    let active = self
      .active
      .as_mut()
      .ok_or_else(|| invalid_state_error("Encoder is not configured"))?;
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Encoder is not configured"))?;

    if let Err(err) = session.drain() {
      active.note_failure();
      return Err(backend_to_dom(err));
    }

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(packet)) => outputs.push(build_output(active, session, packet)?),
        Ok(_) => break,
        Err(err) => {
          active.note_failure();
          return Err(backend_to_dom(err));
        }
      }
    }

    if active.hw_active && active.fed_any && !active.produced_output {
      // The hardware path took frames but never produced anything
      hw_fallback::record_hw_failure(&active.config.codec, CodecDirection::Encode);
    }
    Ok(outputs)
  }

  fn teardown(&mut self) {
    self.session = None;
    self.active = None;
  }
}

/// VideoEncoder - WebCodecs-compliant video encoder
///
/// Construct with an output and error callback; call `configure`, then
/// `encode` repeatedly. Heavy work runs on the instance's worker; callbacks
/// are delivered from the dispatcher, never inline from public methods.
pub struct VideoEncoder {
  backend: Arc<dyn CodecBackend>,
  pipeline: CodecPipeline<VideoEncodeProcessor>,
  events: Arc<EventTarget>,
}

impl VideoEncoder {
  /// Create a VideoEncoder using the process-wide codec backend
  pub fn new(init: VideoEncoderInit) -> Result<Self> {
    let backend = backend::codec_backend()
      .ok_or_else(|| not_supported_error("No codec backend installed"))?;
    Ok(Self::with_backend(init, backend))
  }

  /// Create a VideoEncoder over an explicit codec backend
  pub fn with_backend(init: VideoEncoderInit, backend: Arc<dyn CodecBackend>) -> Self {
    let events = Arc::new(EventTarget::new());
    let processor = VideoEncodeProcessor {
      backend: backend.clone(),
      session: None,
      active: None,
    };
    let output = init.output;
    let pipeline = CodecPipeline::new(
      processor,
      Arc::new(move |(chunk, metadata)| output(chunk, metadata)),
      init.error,
      events.clone(),
    );
    Self {
      backend,
      pipeline,
      events,
    }
  }

  /// Current codec state
  pub fn state(&self) -> CodecState {
    self.pipeline.state()
  }

  /// Number of accepted encodes the worker has not yet dequeued
  pub fn encode_queue_size(&self) -> u32 {
    self.pipeline.queue_size()
  }

  /// Configure the encoder. A syntactically invalid config raises TypeError
  /// synchronously; a valid but unsupported one closes the encoder through
  /// the error callback with NotSupportedError.
  pub fn configure(&self, config: VideoEncoderConfig) -> Result<()> {
    if self.pipeline.state() == CodecState::Closed {
      return Err(invalid_state_error("Encoder is closed"));
    }
    validate_config(&config)?;
    self.pipeline.configure(config)
  }

  /// Encode a frame. The frame is adopted by the work item via a shared
  /// buffer reference; the caller's wrapper stays usable.
  pub fn encode(&self, frame: &VideoFrame) -> Result<()> {
    self.encode_with_options(frame, VideoEncoderEncodeOptions::default())
  }

  /// Encode a frame with per-frame options (keyFrame, quantizer)
  pub fn encode_with_options(
    &self,
    frame: &VideoFrame,
    options: VideoEncoderEncodeOptions,
  ) -> Result<()> {
    if self.pipeline.state() != CodecState::Configured {
      return Err(invalid_state_error("Encoder is not configured"));
    }
    if frame.closed() {
      return Err(type_error("frame is closed"));
    }
    let adopted = frame.clone()?;
    self.pipeline.submit((adopted, options))
  }

  /// Enqueue a flush barrier; the future resolves when all prior work has
  /// drained, and fails with AbortError when superseded by reset/close.
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    self.pipeline.flush()
  }

  /// Cancel outstanding work and return to unconfigured
  pub fn reset(&self) -> Result<()> {
    self.pipeline.reset()
  }

  /// Close the encoder permanently. A second close raises InvalidStateError.
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
  pub async fn is_config_supported(config: VideoEncoderConfig) -> Result<VideoEncoderSupport> {
    validate_config(&config)?;
    let supported = match backend::codec_backend() {
      Some(backend) => backend.probe_support(&config.codec, CodecRole::VideoEncoder),
      None => false,
    };
    Ok(VideoEncoderSupport {
      supported,
      config: normalise_config(&config),
    })
  }

  /// `is_config_supported` against an explicit backend
  pub async fn is_config_supported_with(
    backend: Arc<dyn CodecBackend>,
    config: VideoEncoderConfig,
  ) -> Result<VideoEncoderSupport> {
    validate_config(&config)?;
    let supported = backend.probe_support(&config.codec, CodecRole::VideoEncoder);
    Ok(VideoEncoderSupport {
      supported,
      config: normalise_config(&config),
    })
  }
}

/// Parse scalability mode string (e.g., "L1T1", "L1T2", "L1T3")
/// Returns (spatial_layers, temporal_layers)
fn parse_scalability_mode(mode: &str) -> Option<(u32, u32)> {
  let rest = mode.strip_prefix('L')?;
  let (spatial, temporal) = rest.split_once('T')?;
  let spatial = spatial.parse::<u32>().ok()?;
  let temporal = temporal.parse::<u32>().ok()?;
  if spatial == 0 || temporal == 0 {
    return None;
  }
  Some((spatial, temporal))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_scalability_mode() {
    assert_eq!(parse_scalability_mode("L1T1"), Some((1, 1)));
    assert_eq!(parse_scalability_mode("L1T3"), Some((1, 3)));
    assert_eq!(parse_scalability_mode("L2T2"), Some((2, 2)));
    assert_eq!(parse_scalability_mode("T1L1"), None);
    assert_eq!(parse_scalability_mode("L0T1"), None);
    assert_eq!(parse_scalability_mode("garbage"), None);
  }

  #[test]
  fn test_validate_config() {
    assert!(validate_config(&VideoEncoderConfig::new("vp8", 320, 240)).is_ok());
    assert!(validate_config(&VideoEncoderConfig::new("", 320, 240)).is_err());
    assert!(validate_config(&VideoEncoderConfig::new("vp8", 0, 240)).is_err());
    assert!(validate_config(&VideoEncoderConfig::new("vp8", 320, 0)).is_err());

    let mut config = VideoEncoderConfig::new("vp8", 320, 240);
    config.scalability_mode = Some("bogus".into());
    assert!(validate_config(&config).is_err());
  }
}
