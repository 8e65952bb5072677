//! VideoDecoder behaviour over the mock backend: key-first validation,
//! timestamp/duration/colorSpace inheritance, and fatal decode errors.

mod common;

use std::sync::Arc;

use common::*;
use webcodecs::backend::mock::MockCodecBackend;
use webcodecs::{
  CodecState, DOMExceptionName, EncodedVideoChunk, EncodedVideoChunkInit, EncodedVideoChunkType,
  VideoColorPrimaries, VideoColorSpaceInit, VideoDecoder, VideoDecoderConfig, VideoDecoderInit,
  VideoEncoder, VideoEncoderConfig, VideoEncoderEncodeOptions, VideoEncoderInit,
  VideoPixelFormat,
};

fn mock_decoder() -> (VideoDecoder, FrameOutputs, Errors) {
  let (output, outputs) = frame_collector();
  let (error, errors) = error_collector();
  let decoder = VideoDecoder::with_backend(
    VideoDecoderInit { output, error },
    Arc::new(MockCodecBackend::new()),
  );
  (decoder, outputs, errors)
}

/// Encode frames through the store codec and collect the chunks
async fn encode_frames(
  codec: &str,
  timestamps: &[(i64, Option<i64>)],
) -> Vec<(EncodedVideoChunk, Vec<u8>)> {
  let (output, outputs) = video_chunk_collector();
  let (error, _errors) = error_collector();
  let encoder = VideoEncoder::with_backend(
    VideoEncoderInit { output, error },
    Arc::new(MockCodecBackend::new()),
  );
  encoder
    .configure(VideoEncoderConfig::new(codec, 64, 64))
    .unwrap();

  let mut pixels = Vec::new();
  for &(timestamp, duration) in timestamps {
    let frame = i420_frame(64, 64, timestamp, duration);
    pixels.push(frame_bytes(&frame));
    encoder
      .encode_with_options(
        &frame,
        VideoEncoderEncodeOptions {
          key_frame: true,
          ..Default::default()
        },
      )
      .unwrap();
  }
  encoder.flush().await.unwrap();

  let chunks = outputs.lock().unwrap();
  chunks
    .iter()
    .zip(pixels)
    .map(|((chunk, _), bytes)| (chunk.clone(), bytes))
    .collect()
}

#[tokio::test]
async fn test_delta_first_raises_data_error_and_stays_configured() {
  let (decoder, _outputs, _errors) = mock_decoder();
  decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();

  let delta = EncodedVideoChunk::new(EncodedVideoChunkInit {
    chunk_type: EncodedVideoChunkType::Delta,
    timestamp: 0,
    duration: None,
    data: &[1, 2, 3],
  })
  .unwrap();

  let err = decoder.decode(&delta).unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::DataError);
  assert_eq!(decoder.state(), CodecState::Configured);
}

#[tokio::test]
async fn test_decode_round_trips_pixels_and_timing() {
  let chunks = encode_frames("vp8", &[(-250_000, Some(33333)), (33333, None)]).await;

  let (decoder, outputs, errors) = mock_decoder();
  decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();
  for (chunk, _) in &chunks {
    decoder.decode(chunk).unwrap();
  }
  decoder.flush().await.unwrap();

  let frames = outputs.lock().unwrap();
  assert_eq!(frames.len(), 2);

  // Negative timestamps round-trip verbatim; duration is inherited from
  // the chunk
  assert_eq!(frames[0].timestamp(), -250_000);
  assert_eq!(frames[0].duration(), Some(33333));
  assert_eq!(frames[1].timestamp(), 33333);
  assert_eq!(frames[1].duration(), None);

  assert_eq!(frames[0].format(), Some(VideoPixelFormat::I420));
  assert_eq!(frames[0].coded_width(), 64);
  assert_eq!(frame_bytes(&frames[0]), chunks[0].1);
  assert_eq!(frame_bytes(&frames[1]), chunks[1].1);

  assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_chunk_closes_through_error_callback() {
  let (decoder, _outputs, errors) = mock_decoder();
  decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();

  // A zero-length key chunk reaches the backend and faults there
  let empty = EncodedVideoChunk::new(EncodedVideoChunkInit {
    chunk_type: EncodedVideoChunkType::Key,
    timestamp: 0,
    duration: None,
    data: &[],
  })
  .unwrap();
  decoder.decode(&empty).unwrap();

  assert!(wait_until(|| decoder.state() == CodecState::Closed));
  assert!(wait_until(|| !errors.lock().unwrap().is_empty()));
  assert_eq!(
    errors.lock().unwrap()[0].name(),
    DOMExceptionName::EncodingError
  );

  // Pending flushes after a fatal fault reject too
  let err = decoder.flush().await.unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::InvalidStateError);
}

#[tokio::test]
async fn test_configured_color_space_is_inherited() {
  let chunks = encode_frames("vp8", &[(0, None)]).await;

  let (decoder, outputs, _errors) = mock_decoder();
  let mut config = VideoDecoderConfig::new("vp8");
  config.color_space = Some(VideoColorSpaceInit {
    primaries: Some(VideoColorPrimaries::Bt2020),
    ..Default::default()
  });
  decoder.configure(config).unwrap();
  decoder.decode(&chunks[0].0).unwrap();
  decoder.flush().await.unwrap();

  let frames = outputs.lock().unwrap();
  assert_eq!(
    frames[0].color_space().primaries(),
    Some(VideoColorPrimaries::Bt2020)
  );
}

#[tokio::test]
async fn test_decoder_rotation_flip_from_config() {
  let chunks = encode_frames("vp8", &[(0, None)]).await;

  let (decoder, outputs, _errors) = mock_decoder();
  let mut config = VideoDecoderConfig::new("vp8");
  config.rotation = 90.0;
  config.flip = true;
  decoder.configure(config).unwrap();
  decoder.decode(&chunks[0].0).unwrap();
  decoder.flush().await.unwrap();

  let frames = outputs.lock().unwrap();
  assert_eq!(frames[0].rotation(), 90);
  assert!(frames[0].flip());
}

#[tokio::test]
async fn test_reset_requires_new_key_chunk() {
  let chunks = encode_frames("vp8", &[(0, None), (1000, None)]).await;

  let (decoder, _outputs, _errors) = mock_decoder();
  decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();
  decoder.decode(&chunks[0].0).unwrap();

  decoder.reset().unwrap();
  assert_eq!(decoder.state(), CodecState::Unconfigured);
  assert_eq!(decoder.decode_queue_size(), 0);

  decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();

  let delta = EncodedVideoChunk::new(EncodedVideoChunkInit {
    chunk_type: EncodedVideoChunkType::Delta,
    timestamp: 2000,
    duration: None,
    data: &[0],
  })
  .unwrap();
  let err = decoder.decode(&delta).unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::DataError);

  // A key chunk is accepted and clears the requirement
  decoder.decode(&chunks[1].0).unwrap();
  decoder.flush().await.unwrap();
}

#[tokio::test]
async fn test_decode_on_closed_raises_invalid_state() {
  let (decoder, _outputs, _errors) = mock_decoder();
  decoder.close().unwrap();

  let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
    chunk_type: EncodedVideoChunkType::Key,
    timestamp: 0,
    duration: None,
    data: &[0],
  })
  .unwrap();
  let err = decoder.decode(&chunk).unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::InvalidStateError);

  let err = decoder.configure(VideoDecoderConfig::new("vp8")).unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::InvalidStateError);

  let err = decoder.reset().unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::InvalidStateError);
}

#[tokio::test]
async fn test_is_config_supported_never_mutates() {
  let backend = Arc::new(MockCodecBackend::new());

  let support =
    VideoDecoder::is_config_supported_with(backend.clone(), VideoDecoderConfig::new("vp8"))
      .await
      .unwrap();
  assert!(support.supported);

  // An audio codec in a video decoder config is valid but unsupported
  let support =
    VideoDecoder::is_config_supported_with(backend.clone(), VideoDecoderConfig::new("opus"))
      .await
      .unwrap();
  assert!(!support.supported);

  let mut config = VideoDecoderConfig::new("vp8");
  config.coded_width = Some(0);
  let err = VideoDecoder::is_config_supported_with(backend, config)
    .await
    .unwrap_err();
  assert_eq!(err.name(), DOMExceptionName::TypeError);
}
