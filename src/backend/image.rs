//! Still-image decoder collaborator interface

use std::sync::{Arc, RwLock};

use crate::backend::{BackendResult, DecodedPicture};

/// What an image session knows about one track of an image file.
///
/// Most formats carry exactly one track; animated GIF/WebP/AVIF carry an
/// animated track with a frame count and repetition count.
#[derive(Debug, Clone)]
pub struct ImageTrackInfo {
  pub animated: bool,
  pub frame_count: u32,
  /// Number of repetitions; infinity is represented as `f64::INFINITY`
  pub repetition_count: f64,
}

/// An open still-image decode session
pub trait ImageSession: Send {
  fn tracks(&self) -> &[ImageTrackInfo];

  /// Decode the frame at `index` of the selected track
  fn decode_frame(&mut self, index: u32) -> BackendResult<DecodedPicture>;

  fn select_track(&mut self, index: u32) -> BackendResult<()>;
}

/// Glue over still-image formats
pub trait ImageBackend: Send + Sync + 'static {
  /// Whether the MIME type can be decoded. Must not allocate a session.
  fn probe(&self, mime_type: &str) -> bool;

  fn open(&self, data: &[u8], mime_type: &str) -> BackendResult<Box<dyn ImageSession>>;
}

static IMAGE_BACKEND: RwLock<Option<Arc<dyn ImageBackend>>> = RwLock::new(None);

/// Install the process-wide default image backend
pub fn set_image_backend(backend: Arc<dyn ImageBackend>) {
  *IMAGE_BACKEND.write().expect("backend registry poisoned") = Some(backend);
}

/// The process-wide default image backend, if one is installed
pub fn image_backend() -> Option<Arc<dyn ImageBackend>> {
  IMAGE_BACKEND
    .read()
    .expect("backend registry poisoned")
    .clone()
}
