//! ImageDecoder - WebCodecs API implementation
//!
//! Decodes still images (including animated formats) into VideoFrame
//! objects through the image backend.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/ImageDecoder

use std::sync::{Arc, Mutex};

use crate::backend::image::{self, ImageBackend, ImageSession};
use crate::webcodecs::backend_to_dom;
use crate::webcodecs::error::{
  encoding_error, invalid_state_error, not_supported_error, type_error, Result,
};
use crate::webcodecs::video_frame::{VideoColorSpace, VideoFrame};

/// Options for creating an ImageDecoder
pub struct ImageDecoderInit {
  /// Complete encoded image bytes
  pub data: Vec<u8>,
  /// Image MIME type, e.g. "image/png"
  pub mime_type: String,
  /// Prefer the animated track when the image carries both
  pub prefer_animation: Option<bool>,
}

/// Options for a decode request
#[derive(Debug, Clone)]
pub struct ImageDecodeOptions {
  /// Index of the frame to decode
  pub frame_index: u32,
  /// Only emit frames whose data has fully arrived (default true)
  pub complete_frames_only: bool,
}

impl Default for ImageDecodeOptions {
  fn default() -> Self {
    Self {
      frame_index: 0,
      complete_frames_only: true,
    }
  }
}

/// Result of a decode request
pub struct ImageDecodeResult {
  pub image: VideoFrame,
  /// Whether the frame was decoded from complete data
  pub complete: bool,
}

/// One track of an image file
#[derive(Debug, Clone)]
pub struct ImageTrack {
  pub animated: bool,
  pub frame_count: u32,
  /// Number of repetitions; `f64::INFINITY` for endless loops
  pub repetition_count: f64,
  pub selected: bool,
}

/// The track list of an image file; exactly one track is selected
#[derive(Debug, Clone)]
pub struct ImageTrackList {
  pub tracks: Vec<ImageTrack>,
  pub selected_index: Option<u32>,
}

struct ImageDecoderShared {
  session: Option<Box<dyn ImageSession>>,
  selected_track: u32,
}

/// ImageDecoder - decodes still-image formats into VideoFrames
pub struct ImageDecoder {
  mime_type: String,
  shared: Arc<Mutex<ImageDecoderShared>>,
}

impl std::fmt::Debug for ImageDecoder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ImageDecoder")
      .field("mime_type", &self.mime_type)
      .finish()
  }
}

impl ImageDecoder {
  /// Create an ImageDecoder using the process-wide image backend
  pub fn new(init: ImageDecoderInit) -> Result<Self> {
    let backend = image::image_backend()
      .ok_or_else(|| not_supported_error("No image backend installed"))?;
    Self::with_backend(init, backend.as_ref())
  }

  /// Create an ImageDecoder over an explicit image backend
  pub fn with_backend(init: ImageDecoderInit, backend: &dyn ImageBackend) -> Result<Self> {
    if !init.mime_type.contains('/') {
      return Err(type_error(&format!(
        "Invalid image MIME type: {}",
        init.mime_type
      )));
    }
    if !backend.probe(&init.mime_type) {
      return Err(not_supported_error(&format!(
        "Unsupported image type: {}",
        init.mime_type
      )));
    }

    let session = backend
      .open(&init.data, &init.mime_type)
      .map_err(backend_to_dom)?;

    // Prefer the animated track when asked and present
    let selected_track = if init.prefer_animation.unwrap_or(false) {
      session
        .tracks()
        .iter()
        .position(|track| track.animated)
        .unwrap_or(0) as u32
    } else {
      0
    };

    Ok(Self {
      mime_type: init.mime_type,
      shared: Arc::new(Mutex::new(ImageDecoderShared {
        session: Some(session),
        selected_track,
      })),
    })
  }

  /// The MIME type this decoder was created with
  pub fn mime_type(&self) -> &str {
    &self.mime_type
  }

  /// Whether all encoded data has been received. Construction takes the
  /// complete buffer, so this is true for the decoder's whole lifetime.
  pub fn complete(&self) -> bool {
    true
  }

  /// The image's track list
  pub fn tracks(&self) -> Result<ImageTrackList> {
    let shared = self.shared.lock().expect("image decoder lock poisoned");
    let session = shared
      .session
      .as_ref()
      .ok_or_else(|| invalid_state_error("ImageDecoder is closed"))?;
    let tracks = session
      .tracks()
      .iter()
      .enumerate()
      .map(|(index, track)| ImageTrack {
        animated: track.animated,
        frame_count: track.frame_count,
        repetition_count: track.repetition_count,
        selected: index as u32 == shared.selected_track,
      })
      .collect();
    Ok(ImageTrackList {
      tracks,
      selected_index: Some(shared.selected_track),
    })
  }

  /// Select a track by index
  pub fn select_track(&self, index: u32) -> Result<()> {
    let mut shared = self.shared.lock().expect("image decoder lock poisoned");
    let session = shared
      .session
      .as_mut()
      .ok_or_else(|| invalid_state_error("ImageDecoder is closed"))?;
    session
      .select_track(index)
      .map_err(|err| type_error(&format!("Failed to select track: {}", err)))?;
    shared.selected_track = index;
    Ok(())
  }

  /// Decode one frame of the selected track
  pub async fn decode(&self, options: Option<ImageDecodeOptions>) -> Result<ImageDecodeResult> {
    let options = options.unwrap_or_default();
    let shared = self.shared.clone();

    let picture = tokio::task::spawn_blocking(move || {
      let mut shared = shared.lock().expect("image decoder lock poisoned");
      let session = shared
        .session
        .as_mut()
        .ok_or_else(|| invalid_state_error("ImageDecoder is closed"))?;
      session.decode_frame(options.frame_index).map_err(backend_to_dom)
    })
    .await
    .map_err(|err| encoding_error(&format!("Decode task failed: {}", err)))??;

    Ok(ImageDecodeResult {
      image: VideoFrame::from_decoded(picture, None, 0.0, false, VideoColorSpace::default()),
      complete: true,
    })
  }

  /// Abort outstanding decodes. Construction takes the complete buffer and
  /// decode requests run to completion, so there is never queued work to
  /// cancel; the call is valid on a live decoder and does not change state.
  pub fn reset(&self) -> Result<()> {
    let shared = self.shared.lock().expect("image decoder lock poisoned");
    shared
      .session
      .as_ref()
      .map(|_| ())
      .ok_or_else(|| invalid_state_error("ImageDecoder is closed"))
  }

  /// Release the backing session; subsequent calls fail with
  /// InvalidStateError
  pub fn close(&self) {
    let mut shared = self.shared.lock().expect("image decoder lock poisoned");
    shared.session.take();
  }

  /// Whether the MIME type can be decoded, using the process-wide backend
  pub async fn is_type_supported(mime_type: &str) -> Result<bool> {
    if !mime_type.contains('/') {
      return Err(type_error(&format!("Invalid image MIME type: {}", mime_type)));
    }
    Ok(
      image::image_backend()
        .map(|backend| backend.probe(mime_type))
        .unwrap_or(false),
    )
  }

  /// `is_type_supported` against an explicit backend
  pub async fn is_type_supported_with(backend: &dyn ImageBackend, mime_type: &str) -> Result<bool> {
    if !mime_type.contains('/') {
      return Err(type_error(&format!("Invalid image MIME type: {}", mime_type)));
    }
    Ok(backend.probe(mime_type))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::mock::{mock_image_bytes, MockImageBackend};

  fn decoder(frames: u32) -> ImageDecoder {
    ImageDecoder::with_backend(
      ImageDecoderInit {
        data: mock_image_bytes(8, 8, frames),
        mime_type: "image/gif".into(),
        prefer_animation: Some(true),
      },
      &MockImageBackend::new(),
    )
    .unwrap()
  }

  #[test]
  fn test_invalid_mime_type() {
    let err = ImageDecoder::with_backend(
      ImageDecoderInit {
        data: Vec::new(),
        mime_type: "not a mime".into(),
        prefer_animation: None,
      },
      &MockImageBackend::new(),
    )
    .unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::TypeError
    );
  }

  #[test]
  fn test_unsupported_mime_type() {
    let err = ImageDecoder::with_backend(
      ImageDecoderInit {
        data: Vec::new(),
        mime_type: "image/x-unknown".into(),
        prefer_animation: None,
      },
      &MockImageBackend::new(),
    )
    .unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::NotSupportedError
    );
  }

  #[tokio::test]
  async fn test_decode_frames() {
    let decoder = decoder(3);
    assert_eq!(decoder.mime_type(), "image/gif");
    assert!(decoder.complete());

    let tracks = decoder.tracks().unwrap();
    assert_eq!(tracks.tracks.len(), 1);
    assert!(tracks.tracks[0].animated);
    assert_eq!(tracks.tracks[0].frame_count, 3);
    assert_eq!(tracks.selected_index, Some(0));

    let result = decoder.decode(None).await.unwrap();
    assert_eq!(result.image.coded_height(), 8);
  }

  #[tokio::test]
  async fn test_decode_and_close() {
    let decoder = decoder(2);

    let result = decoder
      .decode(Some(ImageDecodeOptions {
        frame_index: 1,
        complete_frames_only: true,
      }))
      .await
      .unwrap();
    assert!(result.complete);
    assert_eq!(result.image.coded_width(), 8);

    // Out-of-range frame index is a decode error
    assert!(decoder
      .decode(Some(ImageDecodeOptions {
        frame_index: 5,
        complete_frames_only: true,
      }))
      .await
      .is_err());

    decoder.close();
    assert!(decoder.tracks().is_err());
    assert!(decoder.reset().is_err());
    assert!(decoder.decode(None).await.is_err());
  }

  #[tokio::test]
  async fn test_is_type_supported() {
    let backend = MockImageBackend::new();
    assert!(
      ImageDecoder::is_type_supported_with(&backend, "image/png")
        .await
        .unwrap()
    );
    assert!(
      !ImageDecoder::is_type_supported_with(&backend, "image/x-unknown")
        .await
        .unwrap()
    );
    assert!(ImageDecoder::is_type_supported_with(&backend, "garbage")
      .await
      .is_err());
  }
}
