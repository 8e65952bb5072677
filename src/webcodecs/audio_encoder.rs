//! AudioEncoder - WebCodecs API implementation
//!
//! Encodes AudioData objects into EncodedAudioChunk objects through the
//! codec backend; structurally the audio twin of VideoEncoder.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioEncoder

use std::sync::Arc;

use crate::backend::{
  self, AudioEncoderSession, AudioEncoderSettings, CodecBackend, CodecRole, PollOutput,
};
use crate::codec::{
  AddEventListenerOptions, CodecPipeline, CodecProcessor, CodecState, ErrorCallback, Event,
  EventHandler, EventTarget,
};
use crate::webcodecs::audio_data::AudioData;
use crate::webcodecs::backend_to_dom;
use crate::webcodecs::encoded_audio_chunk::{
  AudioDecoderConfigOutput, AudioEncoderConfig, AudioEncoderSupport, EncodedAudioChunk,
  EncodedAudioChunkMetadata,
};
use crate::webcodecs::error::{
  invalid_state_error, not_supported_error, type_error, Result,
};

/// Output callback signature: encoded chunk plus its metadata
pub type AudioEncoderOutputCallback =
  Arc<dyn Fn(EncodedAudioChunk, EncodedAudioChunkMetadata) + Send + Sync>;

/// Construction-time callbacks (W3C AudioEncoderInit)
pub struct AudioEncoderInit {
  pub output: AudioEncoderOutputCallback,
  pub error: ErrorCallback,
}

fn validate_config(config: &AudioEncoderConfig) -> Result<()> {
  if config.codec.is_empty() {
    return Err(type_error("codec is required"));
  }
  if config.sample_rate <= 0.0 {
    return Err(type_error("sampleRate must be greater than 0"));
  }
  if config.number_of_channels == 0 {
    return Err(type_error("numberOfChannels must be greater than 0"));
  }
  Ok(())
}

struct AudioEncodeProcessor {
  backend: Arc<dyn CodecBackend>,
  session: Option<Box<dyn AudioEncoderSession>>,
  active: Option<ActiveEncode>,
}

struct ActiveEncode {
  config: AudioEncoderConfig,
  config_pending: bool,
}

fn build_output(
  active: &mut ActiveEncode,
  session: &mut Box<dyn AudioEncoderSession>,
  packet: backend::EncodedPacket,
) -> Result<(EncodedAudioChunk, EncodedAudioChunkMetadata)> {
  let decoder_config = if active.config_pending {
    active.config_pending = false;
    let description = session.decoder_description().map_err(backend_to_dom)?;
    Some(AudioDecoderConfigOutput {
      codec: active.config.codec.clone(),
      sample_rate: active.config.sample_rate,
      number_of_channels: active.config.number_of_channels,
      description,
    })
  } else {
    None
  };

  let chunk = EncodedAudioChunk::from_packet(&packet, packet.pts, packet.duration);
  Ok((chunk, EncodedAudioChunkMetadata { decoder_config }))
}

impl CodecProcessor for AudioEncodeProcessor {
  type Config = AudioEncoderConfig;
  type Input = AudioData;
  type Output = (EncodedAudioChunk, EncodedAudioChunkMetadata);

  fn configure(&mut self, config: AudioEncoderConfig) -> Result<()> {
    self.session = None;
    self.active = None;

    if !self
      .backend
      .probe_support(&config.codec, CodecRole::AudioEncoder)
    {
      return Err(not_supported_error(&format!(
        "Unsupported codec: {}",
        config.codec
      )));
    }

    let settings = AudioEncoderSettings {
      codec: config.codec.clone(),
      sample_rate: config.sample_rate,
      number_of_channels: config.number_of_channels,
      bitrate: config.bitrate,
    };
    let session = self
      .backend
      .open_audio_encoder(&settings)
      .map_err(backend_to_dom)?;

    self.session = Some(session);
    self.active = Some(ActiveEncode {
      config,
      config_pending: true,
    });
    Ok(())
  }

  fn process(&mut self, data: AudioData) -> Result<Vec<Self::Output>> {
    let active = self
      .active
      .as_mut()
      .ok_or_else(|| invalid_state_error("Encoder is not configured"))?;
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Encoder is not configured"))?;

    if let Err(err) = session.feed_data(&data) {
      data.close();
      return Err(backend_to_dom(err));
    }

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(packet)) => outputs.push(build_output(active, session, packet)?),
        Ok(_) => break,
        Err(err) => {
          data.close();
          return Err(backend_to_dom(err));
        }
      }
    }

    // The work item owned this data reference
    data.close();
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

    session.drain().map_err(backend_to_dom)?;

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(packet)) => outputs.push(build_output(active, session, packet)?),
        Ok(_) => break,
        Err(err) => return Err(backend_to_dom(err)),
      }
    }
    Ok(outputs)
  }

  fn teardown(&mut self) {
    self.session = None;
    self.active = None;
  }
}

/// AudioEncoder - WebCodecs-compliant audio encoder
pub struct AudioEncoder {
  backend: Arc<dyn CodecBackend>,
  pipeline: CodecPipeline<AudioEncodeProcessor>,
  events: Arc<EventTarget>,
}

impl AudioEncoder {
  /// Create an AudioEncoder using the process-wide codec backend
  pub fn new(init: AudioEncoderInit) -> Result<Self> {
    let backend = backend::codec_backend()
      .ok_or_else(|| not_supported_error("No codec backend installed"))?;
    Ok(Self::with_backend(init, backend))
  }

  /// Create an AudioEncoder over an explicit codec backend
  pub fn with_backend(init: AudioEncoderInit, backend: Arc<dyn CodecBackend>) -> Self {
    let events = Arc::new(EventTarget::new());
    let processor = AudioEncodeProcessor {
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

  /// Configure the encoder
  pub fn configure(&self, config: AudioEncoderConfig) -> Result<()> {
    if self.pipeline.state() == CodecState::Closed {
      return Err(invalid_state_error("Encoder is closed"));
    }
    validate_config(&config)?;
    self.pipeline.configure(config)
  }

  /// Encode an AudioData. The data is adopted by the work item via a shared
  /// buffer reference; the caller's wrapper stays usable.
  pub fn encode(&self, data: &AudioData) -> Result<()> {
    if self.pipeline.state() != CodecState::Configured {
      return Err(invalid_state_error("Encoder is not configured"));
    }
    if data.closed() {
      return Err(type_error("data is closed"));
    }
    let adopted = data.clone()?;
    self.pipeline.submit(adopted)
  }

  /// Enqueue a flush barrier
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    self.pipeline.flush()
  }

  /// Cancel outstanding work and return to unconfigured
  pub fn reset(&self) -> Result<()> {
    self.pipeline.reset()
  }

  /// Close the encoder permanently
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
  pub async fn is_config_supported(config: AudioEncoderConfig) -> Result<AudioEncoderSupport> {
    validate_config(&config)?;
    let supported = match backend::codec_backend() {
      Some(backend) => backend.probe_support(&config.codec, CodecRole::AudioEncoder),
      None => false,
    };
    Ok(AudioEncoderSupport { supported, config })
  }

  /// `is_config_supported` against an explicit backend
  pub async fn is_config_supported_with(
    backend: Arc<dyn CodecBackend>,
    config: AudioEncoderConfig,
  ) -> Result<AudioEncoderSupport> {
    validate_config(&config)?;
    let supported = backend.probe_support(&config.codec, CodecRole::AudioEncoder);
    Ok(AudioEncoderSupport { supported, config })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_config() {
    assert!(validate_config(&AudioEncoderConfig::new("opus", 48000.0, 2)).is_ok());
    assert!(validate_config(&AudioEncoderConfig::new("", 48000.0, 2)).is_err());
    assert!(validate_config(&AudioEncoderConfig::new("opus", 0.0, 2)).is_err());
    assert!(validate_config(&AudioEncoderConfig::new("opus", 48000.0, 0)).is_err());
  }
}
