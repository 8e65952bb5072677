//! Process-wide backend registries: instances constructed without an
//! explicit backend pick up the installed defaults.

mod common;

use std::sync::Arc;

use common::*;
use webcodecs::backend::container::set_container_backend;
use webcodecs::backend::image::set_image_backend;
use webcodecs::backend::mock::{
  mock_image_bytes, MockCodecBackend, MockContainerBackend, MockImageBackend, REGISTRY_TEST_LOCK,
};
use webcodecs::backend::set_codec_backend;
use webcodecs::{
  ImageDecoder, ImageDecoderInit, Mp4Muxer, Mp4MuxerOptions, MuxerVideoTrackConfig,
  VideoEncoder, VideoEncoderConfig, VideoEncoderInit,
};

#[tokio::test]
async fn test_default_backends() {
  let _guard = REGISTRY_TEST_LOCK.lock().unwrap();
  set_codec_backend(Arc::new(MockCodecBackend::new()));
  set_container_backend(Arc::new(MockContainerBackend::new()));
  set_image_backend(Arc::new(MockImageBackend::new()));

  // Codec path
  let support = VideoEncoder::is_config_supported(VideoEncoderConfig::new("vp8", 64, 64))
    .await
    .unwrap();
  assert!(support.supported);

  let (output, outputs) = video_chunk_collector();
  let (error, _errors) = error_collector();
  let encoder = VideoEncoder::new(VideoEncoderInit { output, error }).unwrap();
  encoder
    .configure(VideoEncoderConfig::new("vp8", 64, 64))
    .unwrap();
  let frame = i420_frame(64, 64, 0, None);
  encoder.encode(&frame).unwrap();
  encoder.flush().await.unwrap();
  assert_eq!(outputs.lock().unwrap().len(), 1);

  // Container path
  let muxer = Mp4Muxer::new(Mp4MuxerOptions::default()).unwrap();
  muxer
    .add_video_track(MuxerVideoTrackConfig {
      codec: "avc1.42001E".into(),
      width: 64,
      height: 64,
      description: None,
    })
    .unwrap();
  let bytes = muxer.finalize().unwrap();
  assert_eq!(&bytes[4..8], b"ftyp");

  // Image path
  assert!(ImageDecoder::is_type_supported("image/png").await.unwrap());
  let decoder = ImageDecoder::new(ImageDecoderInit {
    data: mock_image_bytes(4, 4, 1),
    mime_type: "image/png".into(),
    prefer_animation: None,
  })
  .unwrap();
  let result = decoder.decode(None).await.unwrap();
  assert_eq!(result.image.coded_width(), 4);
}
