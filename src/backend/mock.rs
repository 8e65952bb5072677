//! Deterministic in-memory backends for tests
//!
//! [`MockCodecBackend`] is a "store codec": packets carry the raw planes plus
//! a small header, so encode -> decode round-trips exactly and everything is
//! reproducible without a native library. [`MockContainerBackend`] writes a
//! simple record stream behind spec-correct magic bytes (MP4 `ftyp`,
//! WebM/MKV `1A 45 DF A3`) that its reader parses back.
//!
//! These exist for the test suite and for downstream users writing tests;
//! production deployments install real backends instead.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::container::{
  AudioTrackSpec, ChunkWrite, ContainerBackend, ContainerFormat, ContainerReader,
  ContainerSource, ContainerWriter, PacketRecord, TrackInfo, TrackKind, VideoTrackSpec,
  WriterOptions,
};
use crate::backend::image::{ImageBackend, ImageSession, ImageTrackInfo};
use crate::backend::{
  AudioDecoderSession, AudioDecoderSettings, AudioEncoderSession, AudioEncoderSettings,
  BackendError, BackendResult, CodecBackend, CodecRole, DecodedAudio, DecodedPicture,
  EncodeRequest, EncodedPacket, PollOutput, VideoDecoderSession, VideoDecoderSettings,
  VideoEncoderSession, VideoEncoderSettings,
};
use crate::webcodecs::audio_data::{AudioData, AudioSampleFormat};
use crate::webcodecs::codec_string::{parse_audio_codec_string, parse_codec_string, CodecId};
use crate::webcodecs::video_frame::{VideoFrame, VideoPixelFormat};

const VIDEO_PACKET_MAGIC: &[u8; 4] = b"MCKV";
const AUDIO_PACKET_MAGIC: &[u8; 4] = b"MCKA";

// ============================================================================
// Codec backend
// ============================================================================

/// Store-codec backend: packets embed the raw media so decode inverts encode
pub struct MockCodecBackend {
  hardware_broken: bool,
  encode_latency: Option<Duration>,
}

impl MockCodecBackend {
  pub fn new() -> Self {
    Self {
      hardware_broken: false,
      encode_latency: None,
    }
  }

  /// A backend whose hardware path accepts configuration but never produces
  /// output, for exercising the fallback registry
  pub fn with_broken_hardware() -> Self {
    Self {
      hardware_broken: true,
      encode_latency: None,
    }
  }

  /// A backend whose encoder sessions sleep on every frame, for tests that
  /// need the worker observably busy
  pub fn with_encode_latency(latency: Duration) -> Self {
    Self {
      hardware_broken: false,
      encode_latency: Some(latency),
    }
  }
}

impl Default for MockCodecBackend {
  fn default() -> Self {
    Self::new()
  }
}

fn video_profile_is_known(codec: &str) -> bool {
  match parse_codec_string(codec) {
    None => false,
    Some(parsed) => match parsed.codec_id {
      CodecId::Vp9 => parsed.profile.map_or(true, |p| p <= 3),
      CodecId::Av1 => parsed.profile.map_or(true, |p| p <= 2),
      CodecId::H264 => parsed
        .profile
        .map_or(true, |p| matches!(p, 66 | 77 | 88 | 100 | 110 | 122 | 244)),
      CodecId::Hevc => parsed.profile.map_or(true, |p| (1..=4).contains(&p)),
      _ => true,
    },
  }
}

impl CodecBackend for MockCodecBackend {
  fn probe_support(&self, codec: &str, role: CodecRole) -> bool {
    if role.is_video() {
      video_profile_is_known(codec)
    } else {
      parse_audio_codec_string(codec).is_some()
    }
  }

  fn open_video_encoder(
    &self,
    settings: &VideoEncoderSettings,
  ) -> BackendResult<Box<dyn VideoEncoderSession>> {
    if !self.probe_support(&settings.codec, CodecRole::VideoEncoder) {
      return Err(BackendError::not_supported(format!(
        "Unsupported codec: {}",
        settings.codec
      )));
    }
    Ok(Box::new(MockVideoEncoderSession {
      settings: settings.clone(),
      queue: VecDeque::new(),
      frame_index: 0,
      drained: false,
      broken: self.hardware_broken && settings.prefer_hardware,
      latency: self.encode_latency,
    }))
  }

  fn open_video_decoder(
    &self,
    settings: &VideoDecoderSettings,
  ) -> BackendResult<Box<dyn VideoDecoderSession>> {
    if !self.probe_support(&settings.codec, CodecRole::VideoDecoder) {
      return Err(BackendError::not_supported(format!(
        "Unsupported codec: {}",
        settings.codec
      )));
    }
    Ok(Box::new(MockVideoDecoderSession {
      queue: VecDeque::new(),
      drained: false,
      hardware: settings.prefer_hardware,
    }))
  }

  fn open_audio_encoder(
    &self,
    settings: &AudioEncoderSettings,
  ) -> BackendResult<Box<dyn AudioEncoderSession>> {
    if !self.probe_support(&settings.codec, CodecRole::AudioEncoder) {
      return Err(BackendError::not_supported(format!(
        "Unsupported codec: {}",
        settings.codec
      )));
    }
    Ok(Box::new(MockAudioEncoderSession {
      settings: settings.clone(),
      queue: VecDeque::new(),
      drained: false,
    }))
  }

  fn open_audio_decoder(
    &self,
    settings: &AudioDecoderSettings,
  ) -> BackendResult<Box<dyn AudioDecoderSession>> {
    if !self.probe_support(&settings.codec, CodecRole::AudioDecoder) {
      return Err(BackendError::not_supported(format!(
        "Unsupported codec: {}",
        settings.codec
      )));
    }
    Ok(Box::new(MockAudioDecoderSession {
      settings: settings.clone(),
      queue: VecDeque::new(),
      drained: false,
    }))
  }
}

fn pixel_format_tag(format: VideoPixelFormat) -> u8 {
  match format {
    VideoPixelFormat::I420 => 0,
    VideoPixelFormat::I420A => 1,
    VideoPixelFormat::I422 => 2,
    VideoPixelFormat::I422A => 3,
    VideoPixelFormat::I444 => 4,
    VideoPixelFormat::I444A => 5,
    VideoPixelFormat::I420P10 => 6,
    VideoPixelFormat::I420AP10 => 7,
    VideoPixelFormat::I422P10 => 8,
    VideoPixelFormat::I422AP10 => 9,
    VideoPixelFormat::I444P10 => 10,
    VideoPixelFormat::I444AP10 => 11,
    VideoPixelFormat::I420P12 => 12,
    VideoPixelFormat::I422P12 => 13,
    VideoPixelFormat::I444P12 => 14,
    VideoPixelFormat::NV12 => 15,
    VideoPixelFormat::NV21 => 16,
    VideoPixelFormat::RGBA => 17,
    VideoPixelFormat::RGBX => 18,
    VideoPixelFormat::BGRA => 19,
    VideoPixelFormat::BGRX => 20,
  }
}

fn pixel_format_from_tag(tag: u8) -> Option<VideoPixelFormat> {
  Some(match tag {
    0 => VideoPixelFormat::I420,
    1 => VideoPixelFormat::I420A,
    2 => VideoPixelFormat::I422,
    3 => VideoPixelFormat::I422A,
    4 => VideoPixelFormat::I444,
    5 => VideoPixelFormat::I444A,
    6 => VideoPixelFormat::I420P10,
    7 => VideoPixelFormat::I420AP10,
    8 => VideoPixelFormat::I422P10,
    9 => VideoPixelFormat::I422AP10,
    10 => VideoPixelFormat::I444P10,
    11 => VideoPixelFormat::I444AP10,
    12 => VideoPixelFormat::I420P12,
    13 => VideoPixelFormat::I422P12,
    14 => VideoPixelFormat::I444P12,
    15 => VideoPixelFormat::NV12,
    16 => VideoPixelFormat::NV21,
    17 => VideoPixelFormat::RGBA,
    18 => VideoPixelFormat::RGBX,
    19 => VideoPixelFormat::BGRA,
    20 => VideoPixelFormat::BGRX,
    _ => return None,
  })
}

fn sample_format_tag(format: AudioSampleFormat) -> u8 {
  match format {
    AudioSampleFormat::U8 => 0,
    AudioSampleFormat::S16 => 1,
    AudioSampleFormat::S32 => 2,
    AudioSampleFormat::F32 => 3,
    AudioSampleFormat::U8Planar => 4,
    AudioSampleFormat::S16Planar => 5,
    AudioSampleFormat::S32Planar => 6,
    AudioSampleFormat::F32Planar => 7,
  }
}

fn sample_format_from_tag(tag: u8) -> Option<AudioSampleFormat> {
  Some(match tag {
    0 => AudioSampleFormat::U8,
    1 => AudioSampleFormat::S16,
    2 => AudioSampleFormat::S32,
    3 => AudioSampleFormat::F32,
    4 => AudioSampleFormat::U8Planar,
    5 => AudioSampleFormat::S16Planar,
    6 => AudioSampleFormat::S32Planar,
    7 => AudioSampleFormat::F32Planar,
    _ => return None,
  })
}

/// Synthesise the codec-specific decoder description for a codec string.
/// AVC gets an avcC box, HEVC an hvcC, AV1 an av1C; VP8/VP9 carry parameter
/// sets in-band and get none.
pub fn synthesise_video_description(codec: &str) -> Option<Vec<u8>> {
  let parsed = parse_codec_string(codec)?;
  match parsed.codec_id {
    CodecId::H264 => {
      let profile = parsed.profile.unwrap_or(66);
      let level = parsed.level.unwrap_or(30);
      // avcC: version, profile, compat, level, lengthSizeMinusOne, numSPS
      Some(vec![1, profile, 0, level, 0xFF, 0xE0])
    }
    CodecId::Hevc => {
      let profile = parsed.profile.unwrap_or(1);
      let level = parsed.level.unwrap_or(93);
      let mut description = vec![1u8, profile & 0x1F];
      description.extend_from_slice(&[0; 10]);
      description.push(level);
      description.extend_from_slice(&[0xF0, 0x00]);
      Some(description)
    }
    CodecId::Av1 => Some(vec![0x81, 0x00, 0x0C, 0x00]),
    _ => None,
  }
}

/// Synthesise the decoder description for an audio codec (OpusHead for Opus,
/// AudioSpecificConfig for AAC)
pub fn synthesise_audio_description(codec: &str, channels: u32, sample_rate: f64) -> Option<Vec<u8>> {
  match parse_audio_codec_string(codec)? {
    CodecId::Opus => {
      let mut head = Vec::with_capacity(19);
      head.extend_from_slice(b"OpusHead");
      head.push(1); // version
      head.push(channels as u8);
      head.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
      head.extend_from_slice(&(sample_rate as u32).to_le_bytes());
      head.extend_from_slice(&0u16.to_le_bytes()); // output gain
      head.push(0); // channel mapping family
      Some(head)
    }
    CodecId::Aac => {
      // AudioSpecificConfig: AAC-LC (2), frequency index 4 (44100 bucket)
      let object_type = 2u8;
      let freq_index = 4u8;
      Some(vec![
        (object_type << 3) | (freq_index >> 1),
        ((freq_index & 1) << 7) | ((channels as u8) << 3),
      ])
    }
    _ => None,
  }
}

struct MockVideoEncoderSession {
  settings: VideoEncoderSettings,
  queue: VecDeque<EncodedPacket>,
  frame_index: u64,
  drained: bool,
  broken: bool,
  latency: Option<Duration>,
}

impl VideoEncoderSession for MockVideoEncoderSession {
  fn feed_frame(&mut self, frame: &VideoFrame, request: &EncodeRequest) -> BackendResult<()> {
    if self.broken {
      return Err(BackendError::encoding(
        "hardware encoder produced no output",
      ));
    }
    if let Some(latency) = self.latency {
      std::thread::sleep(latency);
    }

    let gop: u64 = if self.settings.latency_mode == "realtime" {
      10
    } else {
      60
    };
    let is_key = request.key_frame || self.frame_index % gop == 0;

    let (format, width, height, mut payload, alpha_data) = frame
      .with_buffer(|buffer| {
        let alpha = if buffer.format().has_alpha() && self.settings.keep_alpha {
          Some(
            buffer
              .plane(buffer.format().number_of_planes() - 1)
              .to_vec(),
          )
        } else {
          None
        };
        (
          buffer.format(),
          buffer.coded_width(),
          buffer.coded_height(),
          buffer.data().to_vec(),
          alpha,
        )
      })
      .map_err(|err| BackendError::encoding(err.message().to_string()))?;

    let mut data = Vec::with_capacity(payload.len() + 20);
    data.extend_from_slice(VIDEO_PACKET_MAGIC);
    data.push(is_key as u8);
    data.push(
      request
        .quantizer
        .map(|q| q.clamp(0.0, 255.0) as u8)
        .unwrap_or(0),
    );
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.push(pixel_format_tag(format));
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.append(&mut payload);

    let temporal_layer_id = if self.settings.temporal_layers > 1 {
      Some((self.frame_index % self.settings.temporal_layers as u64) as u32)
    } else {
      None
    };

    self.queue.push_back(EncodedPacket {
      data,
      pts: frame.timestamp(),
      duration: frame.duration(),
      is_key,
      temporal_layer_id,
      alpha_data,
    });
    self.frame_index += 1;
    Ok(())
  }

  fn poll_output(&mut self) -> BackendResult<PollOutput<EncodedPacket>> {
    match self.queue.pop_front() {
      Some(packet) => Ok(PollOutput::Output(packet)),
      None if self.drained => Ok(PollOutput::EndOfStream),
      None => Ok(PollOutput::AgainLater),
    }
  }

  fn drain(&mut self) -> BackendResult<()> {
    self.drained = true;
    Ok(())
  }

  fn decoder_description(&mut self) -> BackendResult<Option<Vec<u8>>> {
    Ok(synthesise_video_description(&self.settings.codec))
  }

  fn is_hardware(&self) -> bool {
    self.settings.prefer_hardware
  }
}

struct MockVideoDecoderSession {
  queue: VecDeque<DecodedPicture>,
  drained: bool,
  hardware: bool,
}

impl VideoDecoderSession for MockVideoDecoderSession {
  fn feed_chunk(&mut self, data: &[u8], pts: i64, _is_key: bool) -> BackendResult<()> {
    if data.len() < 19 || &data[0..4] != VIDEO_PACKET_MAGIC {
      return Err(BackendError::decoding("corrupt or empty chunk"));
    }
    let width = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
    let height = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);
    let format = pixel_format_from_tag(data[14])
      .ok_or_else(|| BackendError::decoding("unknown pixel format tag"))?;
    let len = u32::from_le_bytes([data[15], data[16], data[17], data[18]]) as usize;
    if data.len() < 19 + len {
      return Err(BackendError::decoding("truncated chunk payload"));
    }

    self.queue.push_back(DecodedPicture {
      format,
      coded_width: width,
      coded_height: height,
      data: data[19..19 + len].to_vec(),
      pts,
      color_space: None,
    });
    Ok(())
  }

  fn poll_output(&mut self) -> BackendResult<PollOutput<DecodedPicture>> {
    match self.queue.pop_front() {
      Some(picture) => Ok(PollOutput::Output(picture)),
      None if self.drained => Ok(PollOutput::EndOfStream),
      None => Ok(PollOutput::AgainLater),
    }
  }

  fn drain(&mut self) -> BackendResult<()> {
    self.drained = true;
    Ok(())
  }

  fn is_hardware(&self) -> bool {
    self.hardware
  }
}

struct MockAudioEncoderSession {
  settings: AudioEncoderSettings,
  queue: VecDeque<EncodedPacket>,
  drained: bool,
}

impl AudioEncoderSession for MockAudioEncoderSession {
  fn feed_data(&mut self, data: &AudioData) -> BackendResult<()> {
    if data.number_of_channels() != self.settings.number_of_channels {
      return Err(BackendError::encoding(format!(
        "channel count mismatch: configured {}, got {}",
        self.settings.number_of_channels,
        data.number_of_channels()
      )));
    }
    if (data.sample_rate() as f64 - self.settings.sample_rate).abs() > f64::EPSILON {
      return Err(BackendError::encoding(format!(
        "sample rate mismatch: configured {}, got {}",
        self.settings.sample_rate,
        data.sample_rate()
      )));
    }

    let format = data
      .format()
      .ok_or_else(|| BackendError::encoding("AudioData is closed"))?;
    let mut payload = data
      .with_buffer(|bytes| bytes.to_vec())
      .map_err(|err| BackendError::encoding(err.message().to_string()))?;

    let mut bytes = Vec::with_capacity(payload.len() + 24);
    bytes.extend_from_slice(AUDIO_PACKET_MAGIC);
    bytes.extend_from_slice(&(data.sample_rate() as u32).to_le_bytes());
    bytes.extend_from_slice(&data.number_of_channels().to_le_bytes());
    bytes.extend_from_slice(&data.number_of_frames().to_le_bytes());
    bytes.push(sample_format_tag(format));
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.append(&mut payload);

    self.queue.push_back(EncodedPacket {
      data: bytes,
      pts: data.timestamp(),
      duration: Some(data.duration()),
      is_key: true,
      temporal_layer_id: None,
      alpha_data: None,
    });
    Ok(())
  }

  fn poll_output(&mut self) -> BackendResult<PollOutput<EncodedPacket>> {
    match self.queue.pop_front() {
      Some(packet) => Ok(PollOutput::Output(packet)),
      None if self.drained => Ok(PollOutput::EndOfStream),
      None => Ok(PollOutput::AgainLater),
    }
  }

  fn drain(&mut self) -> BackendResult<()> {
    self.drained = true;
    Ok(())
  }

  fn decoder_description(&mut self) -> BackendResult<Option<Vec<u8>>> {
    Ok(synthesise_audio_description(
      &self.settings.codec,
      self.settings.number_of_channels,
      self.settings.sample_rate,
    ))
  }
}

struct MockAudioDecoderSession {
  settings: AudioDecoderSettings,
  queue: VecDeque<DecodedAudio>,
  drained: bool,
}

impl AudioDecoderSession for MockAudioDecoderSession {
  fn feed_chunk(&mut self, data: &[u8], pts: i64, _is_key: bool) -> BackendResult<()> {
    if data.len() < 21 || &data[0..4] != AUDIO_PACKET_MAGIC {
      return Err(BackendError::decoding("corrupt or empty chunk"));
    }
    let sample_rate = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as f32;
    let channels = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let frames = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
    let format = sample_format_from_tag(data[16])
      .ok_or_else(|| BackendError::decoding("unknown sample format tag"))?;
    let len = u32::from_le_bytes([data[17], data[18], data[19], data[20]]) as usize;
    if data.len() < 21 + len {
      return Err(BackendError::decoding("truncated chunk payload"));
    }

    if channels != self.settings.number_of_channels {
      return Err(BackendError::decoding(format!(
        "channel count mismatch: configured {}, stream has {}",
        self.settings.number_of_channels, channels
      )));
    }

    self.queue.push_back(DecodedAudio {
      format,
      sample_rate,
      number_of_frames: frames,
      number_of_channels: channels,
      data: data[21..21 + len].to_vec(),
      pts,
    });
    Ok(())
  }

  fn poll_output(&mut self) -> BackendResult<PollOutput<DecodedAudio>> {
    match self.queue.pop_front() {
      Some(audio) => Ok(PollOutput::Output(audio)),
      None if self.drained => Ok(PollOutput::EndOfStream),
      None => Ok(PollOutput::AgainLater),
    }
  }

  fn drain(&mut self) -> BackendResult<()> {
    self.drained = true;
    Ok(())
  }
}

// ============================================================================
// Container backend
// ============================================================================

/// Container doubles writing spec-correct magic bytes over a simple record
/// stream. WebM/MKV record packet timestamps in milliseconds (their native
/// resolution); the reader converts back to microseconds.
pub struct MockContainerBackend;

impl MockContainerBackend {
  pub fn new() -> Self {
    Self
  }
}

impl Default for MockContainerBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl ContainerBackend for MockContainerBackend {
  fn open_reader(
    &self,
    format: ContainerFormat,
    source: ContainerSource,
  ) -> BackendResult<Box<dyn ContainerReader>> {
    let bytes = match source {
      ContainerSource::Bytes(bytes) => bytes,
      ContainerSource::Path(path) => std::fs::read(&path).map_err(|err| {
        BackendError::new(
          crate::backend::BackendErrorKind::Resource,
          format!("Failed to open file: {}", err),
        )
      })?,
    };
    MockReader::parse(format, &bytes).map(|reader| Box::new(reader) as Box<dyn ContainerReader>)
  }

  fn new_writer(
    &self,
    format: ContainerFormat,
    options: &WriterOptions,
  ) -> BackendResult<Box<dyn ContainerWriter>> {
    Ok(Box::new(MockWriter {
      format,
      options: options.clone(),
      buffer: Vec::new(),
      track_kinds: Vec::new(),
      started: false,
      finalized: false,
      read_cursor: 0,
    }))
  }
}

fn codec_id_tag(codec_id: CodecId) -> u8 {
  match codec_id {
    CodecId::H264 => 0,
    CodecId::Hevc => 1,
    CodecId::Vp8 => 2,
    CodecId::Vp9 => 3,
    CodecId::Av1 => 4,
    CodecId::Aac => 5,
    CodecId::Opus => 6,
    CodecId::Vorbis => 7,
    CodecId::Flac => 8,
    CodecId::Mp3 => 9,
    CodecId::Pcm => 10,
  }
}

fn codec_id_from_tag(tag: u8) -> Option<CodecId> {
  Some(match tag {
    0 => CodecId::H264,
    1 => CodecId::Hevc,
    2 => CodecId::Vp8,
    3 => CodecId::Vp9,
    4 => CodecId::Av1,
    5 => CodecId::Aac,
    6 => CodecId::Opus,
    7 => CodecId::Vorbis,
    8 => CodecId::Flac,
    9 => CodecId::Mp3,
    10 => CodecId::Pcm,
    _ => return None,
  })
}

fn push_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) {
  buffer.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
  buffer.extend_from_slice(bytes);
}

struct MockWriter {
  format: ContainerFormat,
  options: WriterOptions,
  buffer: Vec<u8>,
  track_kinds: Vec<TrackKind>,
  started: bool,
  finalized: bool,
  read_cursor: usize,
}

impl MockWriter {
  fn header(&self) -> Vec<u8> {
    let mut header = Vec::new();
    match self.format {
      ContainerFormat::Mp4 => {
        // ftyp box: size + type + major brand + minor version + compat brands
        header.extend_from_slice(&0x20u32.to_be_bytes());
        header.extend_from_slice(b"ftyp");
        header.extend_from_slice(b"isom");
        header.extend_from_slice(&0x200u32.to_be_bytes());
        header.extend_from_slice(b"isomiso2avc1mp41");
        if self.options.fast_start {
          header.extend_from_slice(b"moov");
        }
        if self.options.fragmented {
          header.extend_from_slice(b"styp");
        }
      }
      ContainerFormat::WebM | ContainerFormat::Mkv => {
        // EBML header magic
        header.extend_from_slice(&[0x1A, 0x45, 0xDF, 0xA3]);
        let doc_type: &[u8] = if self.format == ContainerFormat::WebM {
          b"webm"
        } else {
          b"matroska"
        };
        header.push(doc_type.len() as u8);
        header.extend_from_slice(doc_type);
      }
    }
    header
  }

  fn pts_to_container(&self, pts_us: i64) -> i64 {
    match self.format {
      ContainerFormat::Mp4 => pts_us,
      // Matroska timestamps are millisecond-scaled
      ContainerFormat::WebM | ContainerFormat::Mkv => pts_us / 1000,
    }
  }
}

impl ContainerWriter for MockWriter {
  fn add_video_track(&mut self, spec: &VideoTrackSpec) -> BackendResult<u32> {
    if self.started {
      return Err(BackendError::new(
        crate::backend::BackendErrorKind::InvalidConfig,
        "Cannot add track after muxing has started",
      ));
    }
    let index = self.track_kinds.len() as u32;
    self.track_kinds.push(TrackKind::Video);
    self.buffer.extend_from_slice(b"trak");
    self.buffer.push(0); // video
    self.buffer.push(codec_id_tag(spec.codec_id));
    push_bytes(&mut self.buffer, spec.codec.as_bytes());
    self.buffer.extend_from_slice(&spec.width.to_le_bytes());
    self.buffer.extend_from_slice(&spec.height.to_le_bytes());
    self.buffer.push(spec.has_alpha as u8);
    push_bytes(
      &mut self.buffer,
      spec.extradata.as_deref().unwrap_or_default(),
    );
    Ok(index)
  }

  fn add_audio_track(&mut self, spec: &AudioTrackSpec) -> BackendResult<u32> {
    if self.started {
      return Err(BackendError::new(
        crate::backend::BackendErrorKind::InvalidConfig,
        "Cannot add track after muxing has started",
      ));
    }
    let index = self.track_kinds.len() as u32;
    self.track_kinds.push(TrackKind::Audio);
    self.buffer.extend_from_slice(b"trak");
    self.buffer.push(1); // audio
    self.buffer.push(codec_id_tag(spec.codec_id));
    push_bytes(&mut self.buffer, spec.codec.as_bytes());
    self
      .buffer
      .extend_from_slice(&spec.sample_rate.to_le_bytes());
    self.buffer.extend_from_slice(&spec.channels.to_le_bytes());
    self
      .buffer
      .extend_from_slice(&spec.frame_size.unwrap_or(0).to_le_bytes());
    push_bytes(
      &mut self.buffer,
      spec.extradata.as_deref().unwrap_or_default(),
    );
    Ok(index)
  }

  fn begin(&mut self) -> BackendResult<()> {
    if self.started {
      return Ok(());
    }
    let mut framed = self.header();
    framed.append(&mut self.buffer);
    self.buffer = framed;
    self.started = true;
    Ok(())
  }

  fn write_chunk(&mut self, write: ChunkWrite<'_>) -> BackendResult<()> {
    if !self.started {
      return Err(BackendError::new(
        crate::backend::BackendErrorKind::InvalidConfig,
        "Header not written",
      ));
    }
    if write.track_index as usize >= self.track_kinds.len() {
      return Err(BackendError::new(
        crate::backend::BackendErrorKind::InvalidConfig,
        format!("Unknown track index {}", write.track_index),
      ));
    }

    if let Some(description) = write.description {
      if !description.is_empty() {
        self.buffer.extend_from_slice(b"xtra");
        self
          .buffer
          .extend_from_slice(&write.track_index.to_le_bytes());
        push_bytes(&mut self.buffer, description);
      }
    }

    self.buffer.extend_from_slice(b"pckt");
    self
      .buffer
      .extend_from_slice(&write.track_index.to_le_bytes());
    self
      .buffer
      .extend_from_slice(&self.pts_to_container(write.pts_us).to_le_bytes());
    self
      .buffer
      .extend_from_slice(&write.duration_us.unwrap_or(-1).to_le_bytes());
    self.buffer.push(write.is_key as u8);
    push_bytes(&mut self.buffer, write.data);

    if let Some(alpha) = write.alpha_data {
      if matches!(self.format, ContainerFormat::WebM | ContainerFormat::Mkv) {
        self.buffer.extend_from_slice(b"alfa");
        push_bytes(&mut self.buffer, alpha);
      }
    }
    Ok(())
  }

  fn flush(&mut self) -> BackendResult<()> {
    Ok(())
  }

  fn finalize(&mut self) -> BackendResult<Vec<u8>> {
    if self.finalized {
      return Err(BackendError::new(
        crate::backend::BackendErrorKind::InvalidConfig,
        "Muxer already finalized",
      ));
    }
    self.begin()?;
    if self.format == ContainerFormat::Mp4 && !self.options.fast_start {
      self.buffer.extend_from_slice(b"moov");
    }
    self.finalized = true;
    if self.options.streaming_capacity.is_some() {
      return Ok(Vec::new());
    }
    Ok(std::mem::take(&mut self.buffer))
  }

  fn read_available(&mut self) -> Option<Vec<u8>> {
    if self.options.streaming_capacity.is_none() {
      return None;
    }
    let capacity = self.options.streaming_capacity.unwrap_or(256 * 1024);
    if self.read_cursor >= self.buffer.len() {
      return None;
    }
    let end = (self.read_cursor + capacity).min(self.buffer.len());
    let slice = self.buffer[self.read_cursor..end].to_vec();
    self.read_cursor = end;
    Some(slice)
  }

  fn is_eof(&self) -> bool {
    self.finalized && self.read_cursor >= self.buffer.len()
  }
}

struct StoredPacket {
  record: PacketRecord,
}

struct MockReader {
  tracks: Vec<TrackInfo>,
  packets: Vec<StoredPacket>,
  cursor: usize,
  selected: Vec<u32>,
}

struct Cursor<'a> {
  bytes: &'a [u8],
  position: usize,
}

impl<'a> Cursor<'a> {
  fn take(&mut self, count: usize) -> BackendResult<&'a [u8]> {
    if self.position + count > self.bytes.len() {
      return Err(BackendError::new(
        crate::backend::BackendErrorKind::InvalidConfig,
        "Truncated container data",
      ));
    }
    let slice = &self.bytes[self.position..self.position + count];
    self.position += count;
    Ok(slice)
  }

  fn take_u32(&mut self) -> BackendResult<u32> {
    let bytes = self.take(4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
  }

  fn take_i64(&mut self) -> BackendResult<i64> {
    let bytes = self.take(8)?;
    Ok(i64::from_le_bytes([
      bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]))
  }

  fn take_block(&mut self) -> BackendResult<&'a [u8]> {
    let len = self.take_u32()? as usize;
    self.take(len)
  }

  fn done(&self) -> bool {
    self.position >= self.bytes.len()
  }
}

impl MockReader {
  fn parse(format: ContainerFormat, bytes: &[u8]) -> BackendResult<Self> {
    let mut cursor = Cursor { bytes, position: 0 };

    // Validate the magic for the requested format
    let pts_scale = match format {
      ContainerFormat::Mp4 => {
        let header = cursor.take(8)?;
        if &header[4..8] != b"ftyp" {
          return Err(BackendError::new(
            crate::backend::BackendErrorKind::InvalidConfig,
            "Not an MP4 file (missing ftyp)",
          ));
        }
        cursor.take(24)?; // rest of the ftyp box
        1
      }
      ContainerFormat::WebM | ContainerFormat::Mkv => {
        let magic = cursor.take(4)?;
        if magic != [0x1A, 0x45, 0xDF, 0xA3] {
          return Err(BackendError::new(
            crate::backend::BackendErrorKind::InvalidConfig,
            "Not an EBML file",
          ));
        }
        let len = cursor.take(1)?[0] as usize;
        cursor.take(len)?;
        1000
      }
    };

    let mut tracks: Vec<TrackInfo> = Vec::new();
    let mut packets = Vec::new();

    while !cursor.done() {
      let tag = cursor.take(4)?;
      match tag {
        b"trak" => {
          let kind_tag = cursor.take(1)?[0];
          let codec_id = codec_id_from_tag(cursor.take(1)?[0]).ok_or_else(|| {
            BackendError::new(
              crate::backend::BackendErrorKind::InvalidConfig,
              "Unknown codec tag",
            )
          })?;
          let _codec = cursor.take_block()?.to_vec();
          let index = tracks.len() as u32;
          if kind_tag == 0 {
            let width = cursor.take_u32()?;
            let height = cursor.take_u32()?;
            let _has_alpha = cursor.take(1)?[0];
            let extradata = cursor.take_block()?.to_vec();
            tracks.push(TrackInfo {
              index,
              kind: TrackKind::Video,
              codec_id,
              extradata: (!extradata.is_empty()).then_some(extradata),
              duration_us: None,
              width: Some(width),
              height: Some(height),
              sample_rate: None,
              channels: None,
            });
          } else {
            let sample_rate = cursor.take_u32()?;
            let channels = cursor.take_u32()?;
            let _frame_size = cursor.take_u32()?;
            let extradata = cursor.take_block()?.to_vec();
            tracks.push(TrackInfo {
              index,
              kind: TrackKind::Audio,
              codec_id,
              extradata: (!extradata.is_empty()).then_some(extradata),
              duration_us: None,
              width: None,
              height: None,
              sample_rate: Some(sample_rate),
              channels: Some(channels),
            });
          }
        }
        b"xtra" => {
          let track_index = cursor.take_u32()? as usize;
          let description = cursor.take_block()?.to_vec();
          if let Some(track) = tracks.get_mut(track_index) {
            track.extradata = Some(description);
          }
        }
        b"pckt" => {
          let track_index = cursor.take_u32()?;
          let pts = cursor.take_i64()?;
          let duration = cursor.take_i64()?;
          let is_key = cursor.take(1)?[0] != 0;
          let data = cursor.take_block()?.to_vec();
          let pts_us = pts.checked_mul(pts_scale).unwrap_or_else(|| {
            tracing::warn!(target: "webcodecs", "Timestamp overflow during conversion, saturating");
            if pts > 0 {
              i64::MAX
            } else {
              i64::MIN
            }
          });
          packets.push(StoredPacket {
            record: PacketRecord {
              track_index,
              data,
              pts_us,
              duration_us: (duration >= 0).then_some(duration),
              is_key,
            },
          });
        }
        b"alfa" => {
          cursor.take_block()?;
        }
        b"moov" | b"styp" => {}
        _ => {
          return Err(BackendError::new(
            crate::backend::BackendErrorKind::InvalidConfig,
            "Unknown record in container data",
          ));
        }
      }
    }

    // Derive per-track durations from the last packet timestamps
    for track in &mut tracks {
      let last = packets
        .iter()
        .filter(|packet| packet.record.track_index == track.index)
        .map(|packet| {
          packet.record.pts_us + packet.record.duration_us.unwrap_or(0).max(0)
        })
        .max();
      track.duration_us = last;
    }

    Ok(Self {
      tracks,
      packets,
      cursor: 0,
      selected: Vec::new(),
    })
  }

  fn is_selected(&self, track_index: u32) -> bool {
    self.selected.is_empty() || self.selected.contains(&track_index)
  }
}

impl ContainerReader for MockReader {
  fn tracks(&self) -> &[TrackInfo] {
    &self.tracks
  }

  fn duration_us(&self) -> Option<i64> {
    self.tracks.iter().filter_map(|track| track.duration_us).max()
  }

  fn select_track(&mut self, index: u32) -> BackendResult<()> {
    let track = self
      .tracks
      .iter()
      .find(|track| track.index == index)
      .ok_or_else(|| {
        BackendError::new(
          crate::backend::BackendErrorKind::InvalidConfig,
          format!("Track {} not found", index),
        )
      })?;
    // One selection per kind; replacing the previous selection of that kind
    let kind = track.kind;
    let replaced: Vec<u32> = self
      .selected
      .iter()
      .copied()
      .filter(|&selected| {
        self
          .tracks
          .iter()
          .find(|track| track.index == selected)
          .map(|track| track.kind != kind)
          .unwrap_or(false)
      })
      .collect();
    self.selected = replaced;
    self.selected.push(index);
    Ok(())
  }

  fn read_packet(&mut self) -> BackendResult<Option<PacketRecord>> {
    while self.cursor < self.packets.len() {
      let packet = &self.packets[self.cursor];
      self.cursor += 1;
      if self.is_selected(packet.record.track_index) {
        return Ok(Some(packet.record.clone()));
      }
    }
    Ok(None)
  }

  fn seek(&mut self, pts_us: i64) -> BackendResult<()> {
    // Land on the nearest preceding keyframe of the first selected video
    // track (or any track when none is video)
    let video_track = self
      .tracks
      .iter()
      .find(|track| track.kind == TrackKind::Video && self.is_selected(track.index))
      .map(|track| track.index);

    let mut target = 0usize;
    for (position, packet) in self.packets.iter().enumerate() {
      let relevant = match video_track {
        Some(index) => packet.record.track_index == index && packet.record.is_key,
        None => self.is_selected(packet.record.track_index),
      };
      if relevant && packet.record.pts_us <= pts_us {
        target = position;
      }
      if packet.record.pts_us > pts_us {
        break;
      }
    }
    self.cursor = target;
    Ok(())
  }
}

// ============================================================================
// Image backend
// ============================================================================

const IMAGE_MAGIC: &[u8; 4] = b"MIMG";

/// Build mock image bytes the [`MockImageBackend`] can decode: `frames`
/// RGBA frames of the given size with deterministic pixel values.
pub fn mock_image_bytes(width: u32, height: u32, frames: u32) -> Vec<u8> {
  let mut bytes = Vec::new();
  bytes.extend_from_slice(IMAGE_MAGIC);
  bytes.extend_from_slice(&width.to_le_bytes());
  bytes.extend_from_slice(&height.to_le_bytes());
  bytes.extend_from_slice(&frames.to_le_bytes());
  for frame in 0..frames {
    let size = (width * height * 4) as usize;
    bytes.extend((0..size).map(|i| ((i as u32 + frame * 7) % 251) as u8));
  }
  bytes
}

/// Mock still-image backend decoding the `mock_image_bytes` format
pub struct MockImageBackend;

impl MockImageBackend {
  pub fn new() -> Self {
    Self
  }
}

impl Default for MockImageBackend {
  fn default() -> Self {
    Self::new()
  }
}

const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

impl ImageBackend for MockImageBackend {
  fn probe(&self, mime_type: &str) -> bool {
    SUPPORTED_IMAGE_TYPES.contains(&mime_type)
  }

  fn open(&self, data: &[u8], mime_type: &str) -> BackendResult<Box<dyn ImageSession>> {
    if !self.probe(mime_type) {
      return Err(BackendError::not_supported(format!(
        "Unsupported image type: {}",
        mime_type
      )));
    }
    if data.len() < 16 || &data[0..4] != IMAGE_MAGIC {
      return Err(BackendError::decoding("corrupt image data"));
    }
    let width = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let height = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let frames = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
    if width == 0 || height == 0 || frames == 0 {
      return Err(BackendError::decoding("empty image"));
    }

    Ok(Box::new(MockImageSession {
      tracks: vec![ImageTrackInfo {
        animated: frames > 1,
        frame_count: frames,
        repetition_count: if frames > 1 { f64::INFINITY } else { 0.0 },
      }],
      width,
      height,
      frames,
      payload: data[16..].to_vec(),
    }))
  }
}

struct MockImageSession {
  tracks: Vec<ImageTrackInfo>,
  width: u32,
  height: u32,
  frames: u32,
  payload: Vec<u8>,
}

impl ImageSession for MockImageSession {
  fn tracks(&self) -> &[ImageTrackInfo] {
    &self.tracks
  }

  fn decode_frame(&mut self, index: u32) -> BackendResult<DecodedPicture> {
    if index >= self.frames {
      return Err(BackendError::decoding(format!(
        "frame index {} out of range",
        index
      )));
    }
    let size = (self.width * self.height * 4) as usize;
    let start = size * index as usize;
    Ok(DecodedPicture {
      format: VideoPixelFormat::RGBA,
      coded_width: self.width,
      coded_height: self.height,
      data: self.payload[start..start + size].to_vec(),
      pts: 0,
      color_space: None,
    })
  }

  fn select_track(&mut self, index: u32) -> BackendResult<()> {
    if index as usize >= self.tracks.len() {
      return Err(BackendError::decoding("track index out of range"));
    }
    Ok(())
  }
}

/// Serialise access to the process-global backend registries in tests
pub static REGISTRY_TEST_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_probe_support_known_and_unknown() {
    let backend = MockCodecBackend::new();
    assert!(backend.probe_support("vp8", CodecRole::VideoEncoder));
    assert!(backend.probe_support("avc1.42001E", CodecRole::VideoDecoder));
    assert!(backend.probe_support("opus", CodecRole::AudioEncoder));
    // Case variants and MIME wrappers are unknown codecs
    assert!(!backend.probe_support("VP8", CodecRole::VideoEncoder));
    assert!(!backend.probe_support("video/mp4; codecs=vp8", CodecRole::VideoEncoder));
    // Audio codec in a video role is unsupported
    assert!(!backend.probe_support("opus", CodecRole::VideoDecoder));
    // Future profile digits are unsupported
    assert!(!backend.probe_support("vp09.99.10.08", CodecRole::VideoDecoder));
  }

  #[test]
  fn test_description_synthesis() {
    let avcc = synthesise_video_description("avc1.42001E").unwrap();
    assert_eq!(avcc[0], 1);
    assert_eq!(avcc[1], 0x42);
    assert_eq!(avcc[3], 0x1E);

    let hvcc = synthesise_video_description("hev1.1.6.L93.B0").unwrap();
    assert_eq!(hvcc[0], 1);
    assert_eq!(hvcc[1] & 0x1F, 1);
    assert!(hvcc.len() >= 13);

    assert!(synthesise_video_description("vp8").is_none());

    let opus_head = synthesise_audio_description("opus", 2, 48000.0).unwrap();
    assert_eq!(&opus_head[0..8], b"OpusHead");
    assert_eq!(opus_head[9], 2);
  }

  #[test]
  fn test_mp4_writer_magic() {
    let backend = MockContainerBackend::new();
    let mut writer = backend
      .new_writer(ContainerFormat::Mp4, &WriterOptions::default())
      .unwrap();
    writer
      .add_video_track(&VideoTrackSpec {
        codec_id: CodecId::H264,
        codec: "avc1.42001E".into(),
        width: 320,
        height: 240,
        extradata: None,
        has_alpha: false,
      })
      .unwrap();
    writer.begin().unwrap();
    let bytes = writer.finalize().unwrap();
    assert_eq!(&bytes[4..8], b"ftyp");
  }

  #[test]
  fn test_webm_writer_magic() {
    let backend = MockContainerBackend::new();
    let mut writer = backend
      .new_writer(ContainerFormat::WebM, &WriterOptions::default())
      .unwrap();
    writer.begin().unwrap();
    let bytes = writer.finalize().unwrap();
    assert_eq!(&bytes[0..4], &[0x1A, 0x45, 0xDF, 0xA3]);
  }

  #[test]
  fn test_writer_reader_round_trip() {
    let backend = MockContainerBackend::new();
    let mut writer = backend
      .new_writer(ContainerFormat::Mp4, &WriterOptions::default())
      .unwrap();
    let video = writer
      .add_video_track(&VideoTrackSpec {
        codec_id: CodecId::H264,
        codec: "avc1.42001E".into(),
        width: 320,
        height: 240,
        extradata: Some(vec![1, 0x42, 0, 0x1E, 0xFF, 0xE0]),
        has_alpha: false,
      })
      .unwrap();
    writer.begin().unwrap();
    writer
      .write_chunk(ChunkWrite {
        track_index: video,
        data: &[1, 2, 3],
        pts_us: 0,
        duration_us: Some(33333),
        is_key: true,
        description: None,
        alpha_data: None,
      })
      .unwrap();
    writer
      .write_chunk(ChunkWrite {
        track_index: video,
        data: &[4, 5],
        pts_us: 33333,
        duration_us: Some(33333),
        is_key: false,
        description: None,
        alpha_data: None,
      })
      .unwrap();
    let bytes = writer.finalize().unwrap();

    let mut reader = backend
      .open_reader(ContainerFormat::Mp4, ContainerSource::Bytes(bytes))
      .unwrap();
    assert_eq!(reader.tracks().len(), 1);
    assert_eq!(reader.tracks()[0].codec_id, CodecId::H264);
    assert_eq!(reader.tracks()[0].width, Some(320));
    assert!(reader.duration_us().unwrap() >= 33333);

    let first = reader.read_packet().unwrap().unwrap();
    assert_eq!(first.data, vec![1, 2, 3]);
    assert!(first.is_key);
    let second = reader.read_packet().unwrap().unwrap();
    assert_eq!(second.pts_us, 33333);
    assert!(!second.is_key);
    assert!(reader.read_packet().unwrap().is_none());

    // Seek back to the keyframe at the head
    reader.seek(40000).unwrap();
    let after_seek = reader.read_packet().unwrap().unwrap();
    assert!(after_seek.is_key);
    assert_eq!(after_seek.pts_us, 0);
  }

  #[test]
  fn test_webm_millisecond_resolution() {
    let backend = MockContainerBackend::new();
    let mut writer = backend
      .new_writer(ContainerFormat::WebM, &WriterOptions::default())
      .unwrap();
    let video = writer
      .add_video_track(&VideoTrackSpec {
        codec_id: CodecId::Vp8,
        codec: "vp8".into(),
        width: 64,
        height: 64,
        extradata: None,
        has_alpha: false,
      })
      .unwrap();
    writer.begin().unwrap();
    writer
      .write_chunk(ChunkWrite {
        track_index: video,
        data: &[0],
        pts_us: 1_234_567,
        duration_us: None,
        is_key: true,
        description: None,
        alpha_data: None,
      })
      .unwrap();
    let bytes = writer.finalize().unwrap();

    let mut reader = backend
      .open_reader(ContainerFormat::WebM, ContainerSource::Bytes(bytes))
      .unwrap();
    let packet = reader.read_packet().unwrap().unwrap();
    // Millisecond container resolution, re-exposed as microseconds
    assert_eq!(packet.pts_us, 1_234_000);
  }

  #[test]
  fn test_reader_rejects_wrong_magic() {
    let backend = MockContainerBackend::new();
    assert!(backend
      .open_reader(
        ContainerFormat::Mp4,
        ContainerSource::Bytes(vec![0x1A, 0x45, 0xDF, 0xA3, 0, 0, 0, 0])
      )
      .is_err());
  }

  #[test]
  fn test_image_backend() {
    let backend = MockImageBackend::new();
    assert!(backend.probe("image/png"));
    assert!(!backend.probe("image/x-unknown"));

    let bytes = mock_image_bytes(8, 8, 3);
    let mut session = backend.open(&bytes, "image/gif").unwrap();
    assert_eq!(session.tracks().len(), 1);
    assert!(session.tracks()[0].animated);
    assert_eq!(session.tracks()[0].frame_count, 3);

    let frame = session.decode_frame(2).unwrap();
    assert_eq!(frame.coded_width, 8);
    assert_eq!(frame.format, VideoPixelFormat::RGBA);
    assert!(session.decode_frame(3).is_err());
  }
}
