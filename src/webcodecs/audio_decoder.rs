//! AudioDecoder - WebCodecs API implementation
//!
//! Decodes EncodedAudioChunk objects into AudioData objects through the
//! codec backend; structurally the audio twin of VideoDecoder.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioDecoder

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::{
  self, AudioDecoderSession, AudioDecoderSettings, CodecBackend, CodecRole, PollOutput,
};
use crate::codec::{
  AddEventListenerOptions, CodecPipeline, CodecProcessor, CodecState, ErrorCallback, Event,
  EventHandler, EventTarget,
};
use crate::webcodecs::audio_data::AudioData;
use crate::webcodecs::backend_to_dom;
use crate::webcodecs::encoded_audio_chunk::{
  AudioDecoderConfig, AudioDecoderSupport, EncodedAudioChunk, EncodedAudioChunkType,
};
use crate::webcodecs::error::{
  data_error, invalid_state_error, not_supported_error, type_error, Result,
};

/// Output callback signature: one decoded AudioData
pub type AudioDecoderOutputCallback = Arc<dyn Fn(AudioData) + Send + Sync>;

/// Construction-time callbacks (W3C AudioDecoderInit)
pub struct AudioDecoderInit {
  pub output: AudioDecoderOutputCallback,
  pub error: ErrorCallback,
}

fn validate_config(config: &AudioDecoderConfig) -> Result<()> {
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

struct AudioDecodeProcessor {
  backend: Arc<dyn CodecBackend>,
  session: Option<Box<dyn AudioDecoderSession>>,
}

impl CodecProcessor for AudioDecodeProcessor {
  type Config = AudioDecoderConfig;
  type Input = EncodedAudioChunk;
  type Output = AudioData;

  fn configure(&mut self, config: AudioDecoderConfig) -> Result<()> {
    self.session = None;

    if !self
      .backend
      .probe_support(&config.codec, CodecRole::AudioDecoder)
    {
      return Err(not_supported_error(&format!(
        "Unsupported codec: {}",
        config.codec
      )));
    }

    let settings = AudioDecoderSettings {
      codec: config.codec.clone(),
      sample_rate: config.sample_rate,
      number_of_channels: config.number_of_channels,
      description: config.description.clone(),
    };
    let session = self
      .backend
      .open_audio_decoder(&settings)
      .map_err(backend_to_dom)?;

    self.session = Some(session);
    Ok(())
  }

  fn process(&mut self, chunk: EncodedAudioChunk) -> Result<Vec<AudioData>> {
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Decoder is not configured"))?;

    let is_key = chunk.chunk_type() == EncodedAudioChunkType::Key;
    session
      .feed_chunk(chunk.data(), chunk.timestamp(), is_key)
      .map_err(backend_to_dom)?;

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(decoded)) => outputs.push(AudioData::from_decoded(decoded)),
        Ok(_) => break,
        Err(err) => return Err(backend_to_dom(err)),
      }
    }
    Ok(outputs)
  }

  fn drain(&mut self) -> Result<Vec<AudioData>> {
    let session = self
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("Decoder is not configured"))?;

    session.drain().map_err(backend_to_dom)?;

    let mut outputs = Vec::new();
    loop {
      match session.poll_output() {
        Ok(PollOutput::Output(decoded)) => outputs.push(AudioData::from_decoded(decoded)),
        Ok(_) => break,
        Err(err) => return Err(backend_to_dom(err)),
      }
    }
    Ok(outputs)
  }

  fn teardown(&mut self) {
    self.session = None;
  }
}

/// AudioDecoder - WebCodecs-compliant audio decoder
///
/// The first chunk accepted after configure or reset must be a keyframe; a
/// delta-first is rejected synchronously with DataError.
pub struct AudioDecoder {
  backend: Arc<dyn CodecBackend>,
  pipeline: CodecPipeline<AudioDecodeProcessor>,
  events: Arc<EventTarget>,
  key_chunk_required: AtomicBool,
}

impl AudioDecoder {
  /// Create an AudioDecoder using the process-wide codec backend
  pub fn new(init: AudioDecoderInit) -> Result<Self> {
    let backend = backend::codec_backend()
      .ok_or_else(|| not_supported_error("No codec backend installed"))?;
    Ok(Self::with_backend(init, backend))
  }

  /// Create an AudioDecoder over an explicit codec backend
  pub fn with_backend(init: AudioDecoderInit, backend: Arc<dyn CodecBackend>) -> Self {
    let events = Arc::new(EventTarget::new());
    let processor = AudioDecodeProcessor {
      backend: backend.clone(),
      session: None,
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

  /// Configure the decoder
  pub fn configure(&self, config: AudioDecoderConfig) -> Result<()> {
    if self.pipeline.state() == CodecState::Closed {
      return Err(invalid_state_error("Decoder is closed"));
    }
    validate_config(&config)?;
    self.key_chunk_required.store(true, Ordering::SeqCst);
    self.pipeline.configure(config)
  }

  /// Decode an encoded chunk
  pub fn decode(&self, chunk: &EncodedAudioChunk) -> Result<()> {
    if self.pipeline.state() != CodecState::Configured {
      return Err(invalid_state_error("Decoder is not configured"));
    }
    if self.key_chunk_required.load(Ordering::SeqCst) {
      if chunk.chunk_type() != EncodedAudioChunkType::Key {
        return Err(data_error("A key chunk is required after configure or reset"));
      }
      self.key_chunk_required.store(false, Ordering::SeqCst);
    }
    self.pipeline.submit(chunk.clone())
  }

  /// Enqueue a flush barrier
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    self.pipeline.flush()
  }

  /// Cancel outstanding work and return to unconfigured
  pub fn reset(&self) -> Result<()> {
    self.pipeline.reset()?;
    self.key_chunk_required.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Close the decoder permanently
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
  pub async fn is_config_supported(config: AudioDecoderConfig) -> Result<AudioDecoderSupport> {
    validate_config(&config)?;
    let supported = match backend::codec_backend() {
      Some(backend) => backend.probe_support(&config.codec, CodecRole::AudioDecoder),
      None => false,
    };
    Ok(AudioDecoderSupport { supported, config })
  }

  /// `is_config_supported` against an explicit backend
  pub async fn is_config_supported_with(
    backend: Arc<dyn CodecBackend>,
    config: AudioDecoderConfig,
  ) -> Result<AudioDecoderSupport> {
    validate_config(&config)?;
    let supported = backend.probe_support(&config.codec, CodecRole::AudioDecoder);
    Ok(AudioDecoderSupport { supported, config })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_config() {
    assert!(validate_config(&AudioDecoderConfig::new("opus", 48000.0, 2)).is_ok());
    assert!(validate_config(&AudioDecoderConfig::new("", 48000.0, 2)).is_err());
    assert!(validate_config(&AudioDecoderConfig::new("opus", -1.0, 2)).is_err());
    assert!(validate_config(&AudioDecoderConfig::new("opus", 48000.0, 0)).is_err());
  }
}
