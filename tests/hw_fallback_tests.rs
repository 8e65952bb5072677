//! Hardware fallback registry behaviour through the encoder path, using a
//! backend whose hardware sessions accept configuration but never produce
//! output.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use webcodecs::backend::mock::MockCodecBackend;
use webcodecs::{
  reset_hardware_fallback_state, CodecState, DOMExceptionName, HardwareAcceleration,
  VideoEncoder, VideoEncoderConfig, VideoEncoderInit,
};

// The fallback registry is process-wide; serialize these tests
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn broken_hw_encoder() -> (VideoEncoder, Errors) {
  let (output, _outputs) = video_chunk_collector();
  let (error, errors) = error_collector();
  let encoder = VideoEncoder::with_backend(
    VideoEncoderInit { output, error },
    Arc::new(MockCodecBackend::with_broken_hardware()),
  );
  (encoder, errors)
}

fn config(codec: &str, acceleration: HardwareAcceleration) -> VideoEncoderConfig {
  let mut config = VideoEncoderConfig::new(codec, 64, 64);
  config.hardware_acceleration = acceleration;
  config
}

/// Drive one encode to failure and wait for the close
fn fail_once(codec: &str) {
  let (encoder, errors) = broken_hw_encoder();
  encoder
    .configure(config(codec, HardwareAcceleration::NoPreference))
    .unwrap();
  let frame = i420_frame(64, 64, 0, None);
  encoder.encode(&frame).unwrap();
  assert!(wait_until(|| encoder.state() == CodecState::Closed));
  assert_eq!(
    errors.lock().unwrap()[0].name(),
    DOMExceptionName::EncodingError
  );
}

#[tokio::test]
async fn test_repeated_hw_failures_bias_to_software() {
  let _guard = TEST_LOCK.lock().unwrap();
  reset_hardware_fallback_state();

  // Three hardware failures cross the threshold for this codec+direction
  for _ in 0..3 {
    fail_once("vp8");
  }

  // The next no-preference configure silently chooses software and works
  let (encoder, errors) = broken_hw_encoder();
  encoder
    .configure(config("vp8", HardwareAcceleration::NoPreference))
    .unwrap();
  let frame = i420_frame(64, 64, 0, None);
  encoder.encode(&frame).unwrap();
  encoder.flush().await.unwrap();
  assert_eq!(encoder.state(), CodecState::Configured);
  assert!(errors.lock().unwrap().is_empty());

  reset_hardware_fallback_state();
}

#[tokio::test]
async fn test_prefer_hardware_ignores_the_registry() {
  let _guard = TEST_LOCK.lock().unwrap();
  reset_hardware_fallback_state();

  for _ in 0..3 {
    fail_once("vp09.00.10.08");
  }

  // prefer-hardware keeps hitting the broken path and reports the failure
  let (encoder, errors) = broken_hw_encoder();
  encoder
    .configure(config("vp09.00.10.08", HardwareAcceleration::PreferHardware))
    .unwrap();
  let frame = i420_frame(64, 64, 0, None);
  encoder.encode(&frame).unwrap();
  assert!(wait_until(|| encoder.state() == CodecState::Closed));
  assert!(!errors.lock().unwrap().is_empty());

  reset_hardware_fallback_state();
}

#[tokio::test]
async fn test_prefer_software_bypasses_hardware() {
  let _guard = TEST_LOCK.lock().unwrap();
  reset_hardware_fallback_state();

  // Software works on the first try even though hardware is broken
  let (encoder, errors) = broken_hw_encoder();
  encoder
    .configure(config("vp8", HardwareAcceleration::PreferSoftware))
    .unwrap();
  let frame = i420_frame(64, 64, 0, None);
  encoder.encode(&frame).unwrap();
  encoder.flush().await.unwrap();
  assert!(errors.lock().unwrap().is_empty());

  reset_hardware_fallback_state();
}

#[tokio::test]
async fn test_reset_restores_the_hardware_path() {
  let _guard = TEST_LOCK.lock().unwrap();
  reset_hardware_fallback_state();

  for _ in 0..3 {
    fail_once("av01.0.04M.08");
  }

  // Clearing the registry re-enables the (still broken) hardware path
  reset_hardware_fallback_state();
  let (encoder, errors) = broken_hw_encoder();
  encoder
    .configure(config("av01.0.04M.08", HardwareAcceleration::NoPreference))
    .unwrap();
  let frame = i420_frame(64, 64, 0, None);
  encoder.encode(&frame).unwrap();
  assert!(wait_until(|| encoder.state() == CodecState::Closed));
  assert!(!errors.lock().unwrap().is_empty());

  reset_hardware_fallback_state();
}
