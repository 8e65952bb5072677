//! Full pipeline: encode -> mux -> demux -> decode over the mock backends,
//! with exact pixel and timestamp round-trips.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use webcodecs::backend::container::ContainerBackend;
use webcodecs::backend::mock::{MockCodecBackend, MockContainerBackend};
use webcodecs::{
  DemuxerCallbacks, EncodedVideoChunk, EncodedVideoChunkType, Mp4Demuxer, Mp4Muxer,
  Mp4MuxerOptions, MuxerVideoTrackConfig, VideoDecoder, VideoDecoderConfig, VideoDecoderInit,
  VideoEncoder, VideoEncoderConfig, VideoEncoderEncodeOptions, VideoEncoderInit,
};

#[tokio::test]
async fn test_encode_mux_demux_decode() {
  let codec_backend = Arc::new(MockCodecBackend::new());
  let container_backend: Arc<dyn ContainerBackend> = Arc::new(MockContainerBackend::new());

  // Encode three frames
  let (output, encoded) = video_chunk_collector();
  let (error, _errors) = error_collector();
  let encoder = VideoEncoder::with_backend(
    VideoEncoderInit { output, error },
    codec_backend.clone(),
  );
  encoder
    .configure(VideoEncoderConfig::new("avc1.42001E", 64, 64))
    .unwrap();

  let timestamps = [0i64, 33333, 66666];
  let mut source_pixels = Vec::new();
  for (index, &timestamp) in timestamps.iter().enumerate() {
    let frame = i420_frame(64, 64, timestamp, Some(33333));
    source_pixels.push(frame_bytes(&frame));
    encoder
      .encode_with_options(
        &frame,
        VideoEncoderEncodeOptions {
          key_frame: index == 0,
          ..Default::default()
        },
      )
      .unwrap();
    frame.close();
  }
  encoder.flush().await.unwrap();
  encoder.close().unwrap();

  // Mux them, forwarding the encoder metadata
  let muxer =
    Mp4Muxer::with_backend(container_backend.clone(), Mp4MuxerOptions::default()).unwrap();
  {
    let encoded = encoded.lock().unwrap();
    assert_eq!(encoded.len(), 3);
    let first_config = encoded[0].1.decoder_config.as_ref().unwrap();
    muxer
      .add_video_track(MuxerVideoTrackConfig {
        codec: first_config.codec.clone(),
        width: first_config.coded_width.unwrap(),
        height: first_config.coded_height.unwrap(),
        description: first_config.description.clone(),
      })
      .unwrap();
    for (chunk, metadata) in encoded.iter() {
      muxer.add_video_chunk(chunk, Some(metadata)).unwrap();
    }
  }
  let file_bytes = muxer.finalize().unwrap();
  assert_eq!(&file_bytes[4..8], b"ftyp");

  // Demux the file
  let demuxed: Arc<Mutex<Vec<EncodedVideoChunk>>> = Arc::new(Mutex::new(Vec::new()));
  let (error, _errors) = error_collector();
  let demuxer = Mp4Demuxer::with_backend(
    DemuxerCallbacks {
      video_output: Some({
        let sink = demuxed.clone();
        Arc::new(move |chunk| sink.lock().unwrap().push(chunk))
      }),
      audio_output: None,
      error,
    },
    container_backend,
  );
  demuxer.load_buffer(file_bytes).unwrap();

  // The demuxer synthesises the decoder configuration from the container
  let decoder_config = demuxer.video_decoder_config().unwrap();
  assert_eq!(decoder_config.codec, "avc1.42001E");
  assert_eq!(decoder_config.coded_width, 64);

  demuxer.demux_async(None).await.unwrap();
  assert_eq!(demuxer.state(), "ended");

  let demuxed = demuxed.lock().unwrap();
  assert_eq!(demuxed.len(), 3);
  assert_eq!(demuxed[0].chunk_type(), EncodedVideoChunkType::Key);

  // Decode the demuxed chunks
  let (output, frames) = frame_collector();
  let (error, _errors) = error_collector();
  let decoder = VideoDecoder::with_backend(
    VideoDecoderInit { output, error },
    codec_backend,
  );
  let mut config = VideoDecoderConfig::new(decoder_config.codec.clone());
  config.coded_width = Some(decoder_config.coded_width);
  config.coded_height = Some(decoder_config.coded_height);
  config.description = decoder_config.description.clone();
  decoder.configure(config).unwrap();

  for chunk in demuxed.iter() {
    decoder.decode(chunk).unwrap();
  }
  decoder.flush().await.unwrap();
  decoder.close().unwrap();

  // Pixels and timestamps survive the full loop exactly
  let frames = frames.lock().unwrap();
  assert_eq!(frames.len(), 3);
  for (index, frame) in frames.iter().enumerate() {
    assert_eq!(frame.timestamp(), timestamps[index]);
    assert_eq!(frame.duration(), Some(33333));
    assert_eq!(frame_bytes(frame), source_pixels[index]);
  }
}
