#![allow(dead_code)]

//! Shared helpers for the integration suites: deterministic frames and
//! samples, collecting callbacks, and a polling wait for asynchronous
//! callback delivery.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use webcodecs::{
  AudioData, AudioDataInit, AudioSampleFormat, DOMException, EncodedAudioChunk,
  EncodedAudioChunkMetadata, EncodedVideoChunk, EncodedVideoChunkMetadata, ErrorCallback,
  VideoFrame, VideoFrameBufferInit, VideoPixelFormat,
};

/// Build an I420 frame with deterministic pixel values
pub fn i420_frame(width: u32, height: u32, timestamp: i64, duration: Option<i64>) -> VideoFrame {
  let size = VideoPixelFormat::I420.allocation_size(width, height) as usize;
  let data: Vec<u8> = (0..size)
    .map(|i| ((i as i64 + timestamp.rem_euclid(251)) % 251) as u8)
    .collect();
  let mut init = VideoFrameBufferInit::new(VideoPixelFormat::I420, width, height, timestamp);
  init.duration = duration;
  VideoFrame::new(&data, init).unwrap()
}

/// Build interleaved f32 AudioData with deterministic sample values
pub fn f32_audio(frames: u32, channels: u32, sample_rate: f32, timestamp: i64) -> AudioData {
  let samples: Vec<f32> = (0..frames * channels)
    .map(|i| (i as f32 / 1000.0).sin())
    .collect();
  let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
  AudioData::new(AudioDataInit {
    format: AudioSampleFormat::F32,
    sample_rate,
    number_of_frames: frames,
    number_of_channels: channels,
    timestamp,
    data: &bytes,
  })
  .unwrap()
}

/// Read a frame's full pixel bytes
pub fn frame_bytes(frame: &VideoFrame) -> Vec<u8> {
  let mut bytes = vec![0u8; frame.allocation_size(None).unwrap() as usize];
  frame.copy_to(&mut bytes, None).unwrap();
  bytes
}

pub type VideoOutputs = Arc<Mutex<Vec<(EncodedVideoChunk, EncodedVideoChunkMetadata)>>>;
pub type AudioOutputs = Arc<Mutex<Vec<(EncodedAudioChunk, EncodedAudioChunkMetadata)>>>;
pub type FrameOutputs = Arc<Mutex<Vec<VideoFrame>>>;
pub type AudioDataOutputs = Arc<Mutex<Vec<AudioData>>>;
pub type Errors = Arc<Mutex<Vec<DOMException>>>;

pub fn video_chunk_collector() -> (webcodecs::VideoEncoderOutputCallback, VideoOutputs) {
  let outputs: VideoOutputs = Arc::new(Mutex::new(Vec::new()));
  let sink = outputs.clone();
  (
    Arc::new(move |chunk, metadata| sink.lock().unwrap().push((chunk, metadata))),
    outputs,
  )
}

pub fn audio_chunk_collector() -> (webcodecs::AudioEncoderOutputCallback, AudioOutputs) {
  let outputs: AudioOutputs = Arc::new(Mutex::new(Vec::new()));
  let sink = outputs.clone();
  (
    Arc::new(move |chunk, metadata| sink.lock().unwrap().push((chunk, metadata))),
    outputs,
  )
}

pub fn frame_collector() -> (webcodecs::VideoDecoderOutputCallback, FrameOutputs) {
  let outputs: FrameOutputs = Arc::new(Mutex::new(Vec::new()));
  let sink = outputs.clone();
  (
    Arc::new(move |frame| sink.lock().unwrap().push(frame)),
    outputs,
  )
}

pub fn audio_data_collector() -> (webcodecs::AudioDecoderOutputCallback, AudioDataOutputs) {
  let outputs: AudioDataOutputs = Arc::new(Mutex::new(Vec::new()));
  let sink = outputs.clone();
  (
    Arc::new(move |data| sink.lock().unwrap().push(data)),
    outputs,
  )
}

pub fn error_collector() -> (ErrorCallback, Errors) {
  let errors: Errors = Arc::new(Mutex::new(Vec::new()));
  let sink = errors.clone();
  (
    Arc::new(move |err| sink.lock().unwrap().push(err)),
    errors,
  )
}

/// Poll `condition` until it holds or two seconds elapse. Callback delivery
/// is asynchronous, so state assertions after errors need this.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
  let deadline = Instant::now() + Duration::from_secs(2);
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    std::thread::sleep(Duration::from_millis(5));
  }
  condition()
}
