//! VideoFrame - WebCodecs API implementation
//!
//! Represents a frame of video data that can be displayed or encoded.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoFrame
//!
//! Pixel bytes live in a shared, reference-counted buffer record. `clone`
//! produces a new frame sharing the buffer; `close` releases this wrapper's
//! reference. After close, timestamp and duration remain readable while the
//! resource-dependent fields read as their closed sentinels.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::backend::DecodedPicture;
use crate::webcodecs::encoded_video_chunk::AlphaOption;
use crate::webcodecs::error::{invalid_state_error, not_supported_error, type_error, Result};

/// Video pixel format (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoPixelFormat {
  // 8-bit YUV formats
  /// Planar YUV 4:2:0, 12bpp (1 Cr & Cb sample per 2x2 Y samples)
  I420,
  /// Planar YUV 4:2:0, 12bpp, with alpha plane
  I420A,
  /// Planar YUV 4:2:2, 16bpp
  I422,
  /// Planar YUV 4:2:2, 16bpp, with alpha plane
  I422A,
  /// Planar YUV 4:4:4, 24bpp
  I444,
  /// Planar YUV 4:4:4, 24bpp, with alpha plane
  I444A,

  // 10-bit YUV formats
  I420P10,
  I420AP10,
  I422P10,
  I422AP10,
  I444P10,
  I444AP10,

  // 12-bit YUV formats
  I420P12,
  I422P12,
  I444P12,

  // Semi-planar formats
  /// Semi-planar YUV 4:2:0 (Y plane + interleaved UV)
  NV12,
  /// Semi-planar YUV 4:2:0 (Y plane + interleaved VU)
  NV21,

  // RGB formats
  /// RGBA 32bpp
  RGBA,
  /// RGBX 32bpp (alpha ignored)
  RGBX,
  /// BGRA 32bpp
  BGRA,
  /// BGRX 32bpp (alpha ignored)
  BGRX,
}

impl VideoPixelFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      VideoPixelFormat::I420 => "I420",
      VideoPixelFormat::I420A => "I420A",
      VideoPixelFormat::I422 => "I422",
      VideoPixelFormat::I422A => "I422A",
      VideoPixelFormat::I444 => "I444",
      VideoPixelFormat::I444A => "I444A",
      VideoPixelFormat::I420P10 => "I420P10",
      VideoPixelFormat::I420AP10 => "I420AP10",
      VideoPixelFormat::I422P10 => "I422P10",
      VideoPixelFormat::I422AP10 => "I422AP10",
      VideoPixelFormat::I444P10 => "I444P10",
      VideoPixelFormat::I444AP10 => "I444AP10",
      VideoPixelFormat::I420P12 => "I420P12",
      VideoPixelFormat::I422P12 => "I422P12",
      VideoPixelFormat::I444P12 => "I444P12",
      VideoPixelFormat::NV12 => "NV12",
      VideoPixelFormat::NV21 => "NV21",
      VideoPixelFormat::RGBA => "RGBA",
      VideoPixelFormat::RGBX => "RGBX",
      VideoPixelFormat::BGRA => "BGRA",
      VideoPixelFormat::BGRX => "BGRX",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    Ok(match value {
      "I420" => VideoPixelFormat::I420,
      "I420A" => VideoPixelFormat::I420A,
      "I422" => VideoPixelFormat::I422,
      "I422A" => VideoPixelFormat::I422A,
      "I444" => VideoPixelFormat::I444,
      "I444A" => VideoPixelFormat::I444A,
      "I420P10" => VideoPixelFormat::I420P10,
      "I420AP10" => VideoPixelFormat::I420AP10,
      "I422P10" => VideoPixelFormat::I422P10,
      "I422AP10" => VideoPixelFormat::I422AP10,
      "I444P10" => VideoPixelFormat::I444P10,
      "I444AP10" => VideoPixelFormat::I444AP10,
      "I420P12" => VideoPixelFormat::I420P12,
      "I422P12" => VideoPixelFormat::I422P12,
      "I444P12" => VideoPixelFormat::I444P12,
      "NV12" => VideoPixelFormat::NV12,
      "NV21" => VideoPixelFormat::NV21,
      "RGBA" => VideoPixelFormat::RGBA,
      "RGBX" => VideoPixelFormat::RGBX,
      "BGRA" => VideoPixelFormat::BGRA,
      "BGRX" => VideoPixelFormat::BGRX,
      other => return Err(type_error(&format!("Invalid format: {}", other))),
    })
  }

  /// Number of planes for this format
  pub fn number_of_planes(&self) -> u32 {
    match self {
      VideoPixelFormat::RGBA
      | VideoPixelFormat::RGBX
      | VideoPixelFormat::BGRA
      | VideoPixelFormat::BGRX => 1,
      VideoPixelFormat::NV12 | VideoPixelFormat::NV21 => 2,
      VideoPixelFormat::I420
      | VideoPixelFormat::I422
      | VideoPixelFormat::I444
      | VideoPixelFormat::I420P10
      | VideoPixelFormat::I422P10
      | VideoPixelFormat::I444P10
      | VideoPixelFormat::I420P12
      | VideoPixelFormat::I422P12
      | VideoPixelFormat::I444P12 => 3,
      VideoPixelFormat::I420A
      | VideoPixelFormat::I422A
      | VideoPixelFormat::I444A
      | VideoPixelFormat::I420AP10
      | VideoPixelFormat::I422AP10
      | VideoPixelFormat::I444AP10 => 4,
    }
  }

  /// Get bytes per sample for this format (1 for 8-bit, 2 for 10/12-bit,
  /// 4 per pixel for RGB formats)
  pub fn bytes_per_sample(&self) -> u32 {
    match self {
      VideoPixelFormat::I420
      | VideoPixelFormat::I420A
      | VideoPixelFormat::I422
      | VideoPixelFormat::I422A
      | VideoPixelFormat::I444
      | VideoPixelFormat::I444A
      | VideoPixelFormat::NV12
      | VideoPixelFormat::NV21 => 1,
      VideoPixelFormat::I420P10
      | VideoPixelFormat::I420AP10
      | VideoPixelFormat::I422P10
      | VideoPixelFormat::I422AP10
      | VideoPixelFormat::I444P10
      | VideoPixelFormat::I444AP10
      | VideoPixelFormat::I420P12
      | VideoPixelFormat::I422P12
      | VideoPixelFormat::I444P12 => 2,
      VideoPixelFormat::RGBA
      | VideoPixelFormat::RGBX
      | VideoPixelFormat::BGRA
      | VideoPixelFormat::BGRX => 4,
    }
  }

  /// Whether the format carries an alpha channel
  pub fn has_alpha(&self) -> bool {
    matches!(
      self,
      VideoPixelFormat::I420A
        | VideoPixelFormat::I422A
        | VideoPixelFormat::I444A
        | VideoPixelFormat::I420AP10
        | VideoPixelFormat::I422AP10
        | VideoPixelFormat::I444AP10
        | VideoPixelFormat::RGBA
        | VideoPixelFormat::BGRA
    )
  }

  /// The equivalent format with the alpha channel discarded
  pub fn without_alpha(&self) -> VideoPixelFormat {
    match self {
      VideoPixelFormat::I420A => VideoPixelFormat::I420,
      VideoPixelFormat::I422A => VideoPixelFormat::I422,
      VideoPixelFormat::I444A => VideoPixelFormat::I444,
      VideoPixelFormat::I420AP10 => VideoPixelFormat::I420P10,
      VideoPixelFormat::I422AP10 => VideoPixelFormat::I422P10,
      VideoPixelFormat::I444AP10 => VideoPixelFormat::I444P10,
      VideoPixelFormat::RGBA => VideoPixelFormat::RGBX,
      VideoPixelFormat::BGRA => VideoPixelFormat::BGRX,
      other => *other,
    }
  }

  /// Horizontal/vertical chroma subsampling divisors for the whole format
  pub fn subsampling(&self) -> (u32, u32) {
    match self {
      VideoPixelFormat::I420
      | VideoPixelFormat::I420A
      | VideoPixelFormat::I420P10
      | VideoPixelFormat::I420AP10
      | VideoPixelFormat::I420P12
      | VideoPixelFormat::NV12
      | VideoPixelFormat::NV21 => (2, 2),
      VideoPixelFormat::I422
      | VideoPixelFormat::I422A
      | VideoPixelFormat::I422P10
      | VideoPixelFormat::I422AP10
      | VideoPixelFormat::I422P12 => (2, 1),
      _ => (1, 1),
    }
  }

  /// Row bytes and row count of one plane for a region of the given size.
  ///
  /// Plane order is canonical: Y[,U,V][,A] for planar YUV, Y,UV for
  /// semi-planar, the single interleaved plane for RGB.
  pub fn plane_dims(&self, plane: u32, width: u32, height: u32) -> (u32, u32) {
    let bps = self.bytes_per_sample();
    let (sub_x, sub_y) = self.subsampling();
    match self {
      VideoPixelFormat::RGBA
      | VideoPixelFormat::RGBX
      | VideoPixelFormat::BGRA
      | VideoPixelFormat::BGRX => (width * bps, height),
      VideoPixelFormat::NV12 | VideoPixelFormat::NV21 => {
        if plane == 0 {
          (width * bps, height)
        } else {
          // Interleaved UV: two samples per chroma position
          ((width / sub_x) * 2 * bps, height / sub_y)
        }
      }
      _ => match plane {
        0 => (width * bps, height),
        1 | 2 => ((width / sub_x) * bps, height / sub_y),
        // Alpha plane is full resolution
        _ => (width * bps, height),
      },
    }
  }

  /// Byte offset into a row for an x position in pixels
  fn plane_x_bytes(&self, plane: u32, x: u32) -> u32 {
    // Row bytes are linear in width for every format once the position is
    // aligned to the subsampling grid
    self.plane_dims(plane, x, 1).0
  }

  /// Total bytes of a tightly packed copy of a region of the given size
  pub fn allocation_size(&self, width: u32, height: u32) -> u32 {
    (0..self.number_of_planes())
      .map(|plane| {
        let (row_bytes, rows) = self.plane_dims(plane, width, height);
        row_bytes * rows
      })
      .sum()
  }

  /// Tightly packed plane layouts for a region of the given size
  pub fn packed_layout(&self, width: u32, height: u32) -> Vec<PlaneLayout> {
    let mut layouts = Vec::with_capacity(self.number_of_planes() as usize);
    let mut offset = 0u32;
    for plane in 0..self.number_of_planes() {
      let (row_bytes, rows) = self.plane_dims(plane, width, height);
      layouts.push(PlaneLayout {
        offset,
        stride: row_bytes,
      });
      offset += row_bytes * rows;
    }
    layouts
  }
}

/// Video color primaries (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoColorPrimaries {
  #[serde(rename = "bt709")]
  Bt709,
  #[serde(rename = "bt470bg")]
  Bt470bg,
  #[serde(rename = "smpte170m")]
  Smpte170m,
  #[serde(rename = "bt2020")]
  Bt2020,
  #[serde(rename = "smpte432")]
  Smpte432,
}

impl VideoColorPrimaries {
  pub fn as_str(&self) -> &'static str {
    match self {
      VideoColorPrimaries::Bt709 => "bt709",
      VideoColorPrimaries::Bt470bg => "bt470bg",
      VideoColorPrimaries::Smpte170m => "smpte170m",
      VideoColorPrimaries::Bt2020 => "bt2020",
      VideoColorPrimaries::Smpte432 => "smpte432",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    Ok(match value {
      "bt709" => VideoColorPrimaries::Bt709,
      "bt470bg" => VideoColorPrimaries::Bt470bg,
      "smpte170m" => VideoColorPrimaries::Smpte170m,
      "bt2020" => VideoColorPrimaries::Bt2020,
      "smpte432" => VideoColorPrimaries::Smpte432,
      other => return Err(type_error(&format!("Invalid primaries value: {}", other))),
    })
  }
}

/// Video transfer characteristics (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoTransferCharacteristics {
  #[serde(rename = "bt709")]
  Bt709,
  #[serde(rename = "smpte170m")]
  Smpte170m,
  #[serde(rename = "iec61966-2-1")]
  Iec6196621,
  #[serde(rename = "srgb")]
  Srgb,
  #[serde(rename = "linear")]
  Linear,
  #[serde(rename = "pq")]
  Pq,
  #[serde(rename = "hlg")]
  Hlg,
}

impl VideoTransferCharacteristics {
  pub fn as_str(&self) -> &'static str {
    match self {
      VideoTransferCharacteristics::Bt709 => "bt709",
      VideoTransferCharacteristics::Smpte170m => "smpte170m",
      VideoTransferCharacteristics::Iec6196621 => "iec61966-2-1",
      VideoTransferCharacteristics::Srgb => "srgb",
      VideoTransferCharacteristics::Linear => "linear",
      VideoTransferCharacteristics::Pq => "pq",
      VideoTransferCharacteristics::Hlg => "hlg",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    Ok(match value {
      "bt709" => VideoTransferCharacteristics::Bt709,
      "smpte170m" => VideoTransferCharacteristics::Smpte170m,
      "iec61966-2-1" => VideoTransferCharacteristics::Iec6196621,
      "srgb" => VideoTransferCharacteristics::Srgb,
      "linear" => VideoTransferCharacteristics::Linear,
      "pq" => VideoTransferCharacteristics::Pq,
      "hlg" => VideoTransferCharacteristics::Hlg,
      other => return Err(type_error(&format!("Invalid transfer value: {}", other))),
    })
  }
}

/// Video matrix coefficients (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoMatrixCoefficients {
  #[serde(rename = "rgb")]
  Rgb,
  #[serde(rename = "bt709")]
  Bt709,
  #[serde(rename = "bt470bg")]
  Bt470bg,
  #[serde(rename = "smpte170m")]
  Smpte170m,
  #[serde(rename = "bt2020-ncl")]
  Bt2020Ncl,
}

impl VideoMatrixCoefficients {
  pub fn as_str(&self) -> &'static str {
    match self {
      VideoMatrixCoefficients::Rgb => "rgb",
      VideoMatrixCoefficients::Bt709 => "bt709",
      VideoMatrixCoefficients::Bt470bg => "bt470bg",
      VideoMatrixCoefficients::Smpte170m => "smpte170m",
      VideoMatrixCoefficients::Bt2020Ncl => "bt2020-ncl",
    }
  }

  pub fn parse(value: &str) -> Result<Self> {
    Ok(match value {
      "rgb" => VideoMatrixCoefficients::Rgb,
      "bt709" => VideoMatrixCoefficients::Bt709,
      "bt470bg" => VideoMatrixCoefficients::Bt470bg,
      "smpte170m" => VideoMatrixCoefficients::Smpte170m,
      "bt2020-ncl" => VideoMatrixCoefficients::Bt2020Ncl,
      other => return Err(type_error(&format!("Invalid matrix value: {}", other))),
    })
  }
}

/// VideoColorSpaceInit for constructing VideoColorSpace.
///
/// Serializes with explicit nulls for unset fields, which is the `toJSON`
/// contract of the class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoColorSpaceInit {
  pub primaries: Option<VideoColorPrimaries>,
  pub transfer: Option<VideoTransferCharacteristics>,
  pub matrix: Option<VideoMatrixCoefficients>,
  pub full_range: Option<bool>,
}

/// Video color space parameters (WebCodecs spec) - as a class per spec
///
/// Unset fields read as an explicit null, distinct from absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoColorSpace {
  primaries: Option<VideoColorPrimaries>,
  transfer: Option<VideoTransferCharacteristics>,
  matrix: Option<VideoMatrixCoefficients>,
  full_range: Option<bool>,
}

impl VideoColorSpace {
  pub fn new(init: Option<VideoColorSpaceInit>) -> Self {
    match init {
      Some(init) => VideoColorSpace {
        primaries: init.primaries,
        transfer: init.transfer,
        matrix: init.matrix,
        full_range: init.full_range,
      },
      None => VideoColorSpace::default(),
    }
  }

  pub fn primaries(&self) -> Option<VideoColorPrimaries> {
    self.primaries
  }

  pub fn transfer(&self) -> Option<VideoTransferCharacteristics> {
    self.transfer
  }

  pub fn matrix(&self) -> Option<VideoMatrixCoefficients> {
    self.matrix
  }

  pub fn full_range(&self) -> Option<bool> {
    self.full_range
  }

  /// Convert to the init record (W3C spec uses toJSON).
  ///
  /// All four fields are present in the result; unset fields serialize as
  /// explicit nulls.
  pub fn to_json(&self) -> VideoColorSpaceInit {
    VideoColorSpaceInit {
      primaries: self.primaries,
      transfer: self.transfer,
      matrix: self.matrix,
      full_range: self.full_range,
    }
  }

  /// The serialized JSON value, with explicit nulls for unset fields
  pub fn to_json_value(&self) -> serde_json::Value {
    serde_json::to_value(self.to_json()).expect("color space serialization cannot fail")
  }
}

/// DOMRectInit for specifying regions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DOMRectInit {
  pub x: Option<f64>,
  pub y: Option<f64>,
  pub width: Option<f64>,
  pub height: Option<f64>,
}

/// DOMRectReadOnly - W3C WebCodecs spec compliant rect class
/// Used for codedRect and visibleRect properties
#[derive(Debug, Clone, PartialEq)]
pub struct DOMRectReadOnly {
  x: f64,
  y: f64,
  width: f64,
  height: f64,
}

impl DOMRectReadOnly {
  pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
    DOMRectReadOnly {
      x,
      y,
      width,
      height,
    }
  }

  pub fn x(&self) -> f64 {
    self.x
  }

  pub fn y(&self) -> f64 {
    self.y
  }

  pub fn width(&self) -> f64 {
    self.width
  }

  pub fn height(&self) -> f64 {
    self.height
  }

  /// Top edge (same as y)
  pub fn top(&self) -> f64 {
    self.y
  }

  /// Right edge (x + width)
  pub fn right(&self) -> f64 {
    self.x + self.width
  }

  /// Bottom edge (y + height)
  pub fn bottom(&self) -> f64 {
    self.y + self.height
  }

  /// Left edge (same as x)
  pub fn left(&self) -> f64 {
    self.x
  }

  pub fn to_json(&self) -> DOMRectInit {
    DOMRectInit {
      x: Some(self.x),
      y: Some(self.y),
      width: Some(self.width),
      height: Some(self.height),
    }
  }
}

/// Layout information for a single plane per WebCodecs spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
  /// Byte offset from the start of the buffer to the start of the plane
  pub offset: u32,
  /// Number of bytes per row (stride)
  pub stride: u32,
}

/// Rectangle in integer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrameRect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

/// VideoFrameMetadata - metadata associated with a VideoFrame (W3C spec)
/// Members defined in VideoFrame Metadata Registry - currently empty per spec
#[derive(Debug, Clone, Default)]
pub struct VideoFrameMetadata {}

/// The shared pixel-buffer record behind one or more VideoFrame wrappers.
///
/// The buffer itself is immutable after construction; sharing is plain `Arc`
/// reference counting, released when the last wrapper closes or drops.
#[derive(Debug)]
pub struct PixelBuffer {
  data: Vec<u8>,
  format: VideoPixelFormat,
  coded_width: u32,
  coded_height: u32,
  layout: Vec<PlaneLayout>,
}

impl PixelBuffer {
  /// Build a canonical, tightly packed buffer for the format and size
  pub(crate) fn new_packed(
    format: VideoPixelFormat,
    coded_width: u32,
    coded_height: u32,
    data: Vec<u8>,
  ) -> Self {
    let layout = format.packed_layout(coded_width, coded_height);
    Self {
      data,
      format,
      coded_width,
      coded_height,
      layout,
    }
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn format(&self) -> VideoPixelFormat {
    self.format
  }

  pub fn coded_width(&self) -> u32 {
    self.coded_width
  }

  pub fn coded_height(&self) -> u32 {
    self.coded_height
  }

  pub fn layout(&self) -> &[PlaneLayout] {
    &self.layout
  }

  /// Borrow one plane's bytes
  pub fn plane(&self, plane: u32) -> &[u8] {
    let (row_bytes, rows) = self
      .format
      .plane_dims(plane, self.coded_width, self.coded_height);
    let layout = &self.layout[plane as usize];
    let start = layout.offset as usize;
    let end = start + (layout.stride * rows) as usize;
    let _ = row_bytes;
    &self.data[start..end.min(self.data.len())]
  }
}

/// Options for creating a VideoFrame from buffer data (VideoFrameBufferInit per spec)
#[derive(Debug, Clone)]
pub struct VideoFrameBufferInit {
  /// Pixel format (required)
  pub format: VideoPixelFormat,
  /// Coded width in pixels (required)
  pub coded_width: u32,
  /// Coded height in pixels (required)
  pub coded_height: u32,
  /// Timestamp in microseconds (required)
  pub timestamp: i64,
  /// Duration in microseconds (optional)
  pub duration: Option<i64>,
  /// Layout of the input planes (default is tightly-packed)
  pub layout: Option<Vec<PlaneLayout>>,
  /// Visible rect within coded size (default is full coded size at 0,0)
  pub visible_rect: Option<DOMRectInit>,
  /// Rotation in degrees clockwise (0, 90, 180, 270) - default 0
  pub rotation: f64,
  /// Horizontal flip - default false
  pub flip: bool,
  /// Display width (defaults to visible width)
  pub display_width: Option<u32>,
  /// Display height (defaults to visible height)
  pub display_height: Option<u32>,
  /// Color space parameters
  pub color_space: Option<VideoColorSpaceInit>,
  /// Metadata associated with the frame
  pub metadata: Option<VideoFrameMetadata>,
}

impl VideoFrameBufferInit {
  pub fn new(format: VideoPixelFormat, coded_width: u32, coded_height: u32, timestamp: i64) -> Self {
    Self {
      format,
      coded_width,
      coded_height,
      timestamp,
      duration: None,
      layout: None,
      visible_rect: None,
      rotation: 0.0,
      flip: false,
      display_width: None,
      display_height: None,
      color_space: None,
      metadata: None,
    }
  }
}

/// Options for creating a VideoFrame from an image source (VideoFrameInit per spec)
#[derive(Debug, Clone, Default)]
pub struct VideoFrameInit {
  /// Timestamp in microseconds (required when the source carries none)
  pub timestamp: Option<i64>,
  /// Duration in microseconds
  pub duration: Option<i64>,
  /// Alpha handling: keep (default) or discard
  pub alpha: Option<AlphaOption>,
  /// Visible rect override
  pub visible_rect: Option<DOMRectInit>,
  /// Rotation in degrees clockwise, composed with the source's rotation
  pub rotation: f64,
  /// Horizontal flip, composed with the source's flip
  pub flip: bool,
  pub display_width: Option<u32>,
  pub display_height: Option<u32>,
  pub metadata: Option<VideoFrameMetadata>,
}

/// Options for copyTo and allocationSize
#[derive(Debug, Clone, Default)]
pub struct VideoFrameCopyToOptions {
  /// Target pixel format; only the alpha-reinterpret pairs are convertible
  pub format: Option<VideoPixelFormat>,
  /// Region to copy; defaults to the visible rect
  pub rect: Option<DOMRectInit>,
  /// Layout override for the destination planes
  pub layout: Option<Vec<PlaneLayout>>,
}

/// A source that can paint itself into a VideoFrame: width, height, and a
/// tightly packed RGBA byte accessor. The canvas analogue for a host with no
/// canvas.
pub trait CanvasImageSource {
  fn width(&self) -> u32;
  fn height(&self) -> u32;
  fn rgba_data(&self) -> Vec<u8>;
}

/// Parse rotation per the W3C algorithm: round to the nearest 90, ties
/// towards positive infinity, normalized to 0..360.
fn parse_rotation(rotation: f64) -> u32 {
  let aligned = (rotation / 90.0).round() * 90.0;
  let full_turns = (aligned / 360.0).floor() * 360.0;
  (aligned - full_turns) as u32
}

/// The live (not yet closed) half of a VideoFrame
struct FrameResource {
  buffer: Arc<PixelBuffer>,
  format: VideoPixelFormat,
  visible_rect: VideoFrameRect,
  display_width: u32,
  display_height: u32,
}

/// VideoFrame - represents a frame of video
pub struct VideoFrame {
  timestamp_us: i64,
  duration_us: Option<i64>,
  rotation: u32,
  flip: bool,
  color_space: VideoColorSpace,
  metadata: VideoFrameMetadata,
  resource: Mutex<Option<FrameResource>>,
}

impl std::fmt::Debug for VideoFrame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("VideoFrame")
      .field("timestamp", &self.timestamp_us)
      .field("closed", &self.closed())
      .finish()
  }
}

impl VideoFrame {
  /// Create a new VideoFrame from raw buffer data (BufferSource per spec).
  ///
  /// The pixel bytes are copied into a private buffer; mutating `data`
  /// afterwards does not affect the frame.
  pub fn new(data: &[u8], init: VideoFrameBufferInit) -> Result<Self> {
    let width = init.coded_width;
    let height = init.coded_height;

    if width == 0 {
      return Err(type_error("codedWidth must be greater than 0"));
    }
    if height == 0 {
      return Err(type_error("codedHeight must be greater than 0"));
    }

    let format = init.format;

    // Validate the source buffer holds every plane under the given layout
    let required = match &init.layout {
      Some(layout) => {
        if layout.len() != format.number_of_planes() as usize {
          return Err(type_error(&format!(
            "layout must describe {} planes, got {}",
            format.number_of_planes(),
            layout.len()
          )));
        }
        let mut required = 0usize;
        for (plane, entry) in layout.iter().enumerate() {
          let (row_bytes, rows) = format.plane_dims(plane as u32, width, height);
          if entry.stride < row_bytes {
            return Err(type_error(&format!(
              "layout stride {} is smaller than plane {} row size {}",
              entry.stride, plane, row_bytes
            )));
          }
          required = required.max((entry.offset + entry.stride * rows) as usize);
        }
        required
      }
      None => format.allocation_size(width, height) as usize,
    };
    if data.len() < required {
      return Err(type_error(&format!(
        "Buffer too small: need {} bytes, got {}",
        required,
        data.len()
      )));
    }

    // Normalize into a canonical tightly packed buffer
    let packed = match &init.layout {
      Some(layout) => {
        let mut packed = Vec::with_capacity(format.allocation_size(width, height) as usize);
        for (plane, entry) in layout.iter().enumerate() {
          let (row_bytes, rows) = format.plane_dims(plane as u32, width, height);
          for row in 0..rows {
            let start = (entry.offset + row * entry.stride) as usize;
            packed.extend_from_slice(&data[start..start + row_bytes as usize]);
          }
        }
        packed
      }
      None => data[..required].to_vec(),
    };

    let visible_rect = match &init.visible_rect {
      Some(rect) => validate_rect(rect, format, width, height)?,
      None => VideoFrameRect {
        x: 0,
        y: 0,
        width,
        height,
      },
    };

    let rotation = parse_rotation(init.rotation);

    // Display dimensions default to the visible size, swapped for 90/270
    let (default_w, default_h) = if rotation == 90 || rotation == 270 {
      (visible_rect.height, visible_rect.width)
    } else {
      (visible_rect.width, visible_rect.height)
    };
    let display_width = init.display_width.unwrap_or(default_w);
    let display_height = init.display_height.unwrap_or(default_h);
    if init.display_width == Some(0) || init.display_height == Some(0) {
      return Err(type_error("display dimensions must be greater than 0"));
    }

    let buffer = Arc::new(PixelBuffer::new_packed(format, width, height, packed));

    Ok(Self {
      timestamp_us: init.timestamp,
      duration_us: init.duration,
      rotation,
      flip: init.flip,
      color_space: VideoColorSpace::new(init.color_space),
      metadata: init.metadata.unwrap_or_default(),
      resource: Mutex::new(Some(FrameResource {
        buffer,
        format,
        visible_rect,
        display_width,
        display_height,
      })),
    })
  }

  /// Create a new VideoFrame from another VideoFrame (image source
  /// constructor per spec). Omitted init fields are inherited; fails with
  /// InvalidStateError when the source is closed.
  pub fn from_frame(source: &VideoFrame, init: VideoFrameInit) -> Result<Self> {
    let guard = source.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;

    let timestamp_us = init.timestamp.unwrap_or(source.timestamp_us);
    let duration_us = init.duration.or(source.duration_us);

    // Alpha discard retags RGB formats and drops the alpha plane for planar
    // YUV (which requires a copy)
    let discard_alpha = matches!(init.alpha, Some(AlphaOption::Discard));
    let (format, buffer) = if discard_alpha && resource.format.has_alpha() {
      let target = resource.format.without_alpha();
      if target.number_of_planes() == resource.format.number_of_planes() {
        (target, resource.buffer.clone())
      } else {
        let mut packed = Vec::with_capacity(
          target.allocation_size(resource.buffer.coded_width, resource.buffer.coded_height)
            as usize,
        );
        for plane in 0..target.number_of_planes() {
          packed.extend_from_slice(resource.buffer.plane(plane));
        }
        (
          target,
          Arc::new(PixelBuffer::new_packed(
            target,
            resource.buffer.coded_width,
            resource.buffer.coded_height,
            packed,
          )),
        )
      }
    } else {
      (resource.format, resource.buffer.clone())
    };

    let visible_rect = match &init.visible_rect {
      Some(rect) => validate_rect(
        rect,
        format,
        buffer.coded_width(),
        buffer.coded_height(),
      )?,
      None => resource.visible_rect,
    };

    // Per spec "Add Rotations": combined = base ± init depending on flip,
    // and flip is the XOR of both
    let init_rotation = parse_rotation(init.rotation);
    let combined_rotation = if !source.flip {
      parse_rotation((source.rotation + init_rotation) as f64)
    } else {
      parse_rotation(source.rotation as f64 - init_rotation as f64)
    };
    let combined_flip = source.flip != init.flip;

    let display_width = init.display_width.unwrap_or(resource.display_width);
    let display_height = init.display_height.unwrap_or(resource.display_height);

    Ok(Self {
      timestamp_us,
      duration_us,
      rotation: combined_rotation,
      flip: combined_flip,
      color_space: source.color_space.clone(),
      metadata: init.metadata.unwrap_or_default(),
      resource: Mutex::new(Some(FrameResource {
        buffer,
        format,
        visible_rect,
        display_width,
        display_height,
      })),
    })
  }

  /// Create a VideoFrame from a canvas-like source. `init.timestamp` is
  /// mandatory for sources that carry no timing.
  pub fn from_canvas_source(source: &dyn CanvasImageSource, init: VideoFrameInit) -> Result<Self> {
    let timestamp = init
      .timestamp
      .ok_or_else(|| type_error("timestamp is required"))?;
    let width = source.width();
    let height = source.height();
    if width == 0 || height == 0 {
      return Err(type_error("source dimensions must be greater than 0"));
    }

    let data = source.rgba_data();
    let mut buffer_init = VideoFrameBufferInit::new(VideoPixelFormat::RGBA, width, height, timestamp);
    buffer_init.duration = init.duration;
    buffer_init.visible_rect = init.visible_rect.clone();
    buffer_init.rotation = init.rotation;
    buffer_init.flip = init.flip;
    buffer_init.display_width = init.display_width;
    buffer_init.display_height = init.display_height;
    buffer_init.metadata = init.metadata.clone();
    let mut frame = Self::new(&data, buffer_init)?;
    if matches!(init.alpha, Some(AlphaOption::Discard)) {
      frame = Self::from_frame(
        &frame,
        VideoFrameInit {
          alpha: Some(AlphaOption::Discard),
          ..Default::default()
        },
      )?;
    }
    Ok(frame)
  }

  /// Create a VideoFrame from decoder output (crate-internal)
  pub(crate) fn from_decoded(
    picture: DecodedPicture,
    duration_us: Option<i64>,
    rotation: f64,
    flip: bool,
    color_space: VideoColorSpace,
  ) -> Self {
    let width = picture.coded_width;
    let height = picture.coded_height;
    let parsed_rotation = parse_rotation(rotation);
    let (display_width, display_height) = if parsed_rotation == 90 || parsed_rotation == 270 {
      (height, width)
    } else {
      (width, height)
    };

    let buffer = Arc::new(PixelBuffer::new_packed(
      picture.format,
      width,
      height,
      picture.data,
    ));

    Self {
      timestamp_us: picture.pts,
      duration_us,
      rotation: parsed_rotation,
      flip,
      color_space,
      metadata: VideoFrameMetadata::default(),
      resource: Mutex::new(Some(FrameResource {
        buffer,
        format: picture.format,
        visible_rect: VideoFrameRect {
          x: 0,
          y: 0,
          width,
          height,
        },
        display_width,
        display_height,
      })),
    }
  }

  /// The pixel format, or `None` once the frame is closed
  pub fn format(&self) -> Option<VideoPixelFormat> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    guard.as_ref().map(|resource| resource.format)
  }

  /// Coded width in pixels (0 when closed per W3C spec)
  pub fn coded_width(&self) -> u32 {
    let guard = self.resource.lock().expect("frame lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.buffer.coded_width())
      .unwrap_or(0)
  }

  /// Coded height in pixels (0 when closed per W3C spec)
  pub fn coded_height(&self) -> u32 {
    let guard = self.resource.lock().expect("frame lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.buffer.coded_height())
      .unwrap_or(0)
  }

  /// Display width in pixels (0 when closed per W3C spec)
  pub fn display_width(&self) -> u32 {
    let guard = self.resource.lock().expect("frame lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.display_width)
      .unwrap_or(0)
  }

  /// Display height in pixels (0 when closed per W3C spec)
  pub fn display_height(&self) -> u32 {
    let guard = self.resource.lock().expect("frame lock poisoned");
    guard
      .as_ref()
      .map(|resource| resource.display_height)
      .unwrap_or(0)
  }

  /// The region containing valid pixel data.
  /// Fails with InvalidStateError when the frame is closed.
  pub fn coded_rect(&self) -> Result<DOMRectReadOnly> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;
    Ok(DOMRectReadOnly::new(
      0.0,
      0.0,
      resource.buffer.coded_width() as f64,
      resource.buffer.coded_height() as f64,
    ))
  }

  /// The region of coded data that should be displayed.
  /// Fails with InvalidStateError when the frame is closed.
  pub fn visible_rect(&self) -> Result<DOMRectReadOnly> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;
    Ok(DOMRectReadOnly::new(
      resource.visible_rect.x as f64,
      resource.visible_rect.y as f64,
      resource.visible_rect.width as f64,
      resource.visible_rect.height as f64,
    ))
  }

  /// Presentation timestamp in microseconds; remains readable after close
  pub fn timestamp(&self) -> i64 {
    self.timestamp_us
  }

  /// Duration in microseconds; remains readable after close
  pub fn duration(&self) -> Option<i64> {
    self.duration_us
  }

  /// Rotation in degrees clockwise (0, 90, 180, 270)
  pub fn rotation(&self) -> u32 {
    self.rotation
  }

  /// Whether horizontal flip is applied
  pub fn flip(&self) -> bool {
    self.flip
  }

  pub fn color_space(&self) -> VideoColorSpace {
    self.color_space.clone()
  }

  pub fn metadata(&self) -> VideoFrameMetadata {
    self.metadata.clone()
  }

  pub fn closed(&self) -> bool {
    self.resource.lock().expect("frame lock poisoned").is_none()
  }

  /// Number of planes for the frame's format.
  /// Fails with InvalidStateError when the frame is closed.
  pub fn number_of_planes(&self) -> Result<u32> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;
    Ok(resource.format.number_of_planes())
  }

  /// Run `f` over the frame's backing pixel buffer without copying
  pub fn with_buffer<R>(&self, f: impl FnOnce(&PixelBuffer) -> R) -> Result<R> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;
    Ok(f(&resource.buffer))
  }

  /// Bytes required by `copy_to` under the same options
  pub fn allocation_size(&self, options: Option<&VideoFrameCopyToOptions>) -> Result<u32> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;

    let (format, rect, layout) = resolve_copy_options(resource, options)?;
    match layout {
      Some(layout) => {
        let mut required = 0u32;
        for (plane, entry) in layout.iter().enumerate() {
          let (row_bytes, rows) = format.plane_dims(plane as u32, rect.width, rect.height);
          if entry.stride < row_bytes {
            return Err(type_error("layout stride smaller than plane row size"));
          }
          required = required.max(entry.offset + entry.stride * rows);
        }
        Ok(required)
      }
      None => Ok(format.allocation_size(rect.width, rect.height)),
    }
  }

  /// Copy plane bytes into `destination` and return the realised plane
  /// layouts. When no layout is given, planes are packed in canonical format
  /// order with their natural strides.
  pub fn copy_to(
    &self,
    destination: &mut [u8],
    options: Option<&VideoFrameCopyToOptions>,
  ) -> Result<Vec<PlaneLayout>> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;

    let (format, rect, layout_override) = resolve_copy_options(resource, options)?;

    let layouts = match layout_override {
      Some(layout) => {
        if layout.len() != format.number_of_planes() as usize {
          return Err(type_error(&format!(
            "layout must describe {} planes, got {}",
            format.number_of_planes(),
            layout.len()
          )));
        }
        layout
      }
      None => format.packed_layout(rect.width, rect.height),
    };

    // Destination must hold every plane extent
    let mut required = 0usize;
    for (plane, entry) in layouts.iter().enumerate() {
      let (row_bytes, rows) = format.plane_dims(plane as u32, rect.width, rect.height);
      if entry.stride < row_bytes {
        return Err(type_error("layout stride smaller than plane row size"));
      }
      required = required.max((entry.offset + entry.stride * rows) as usize);
    }
    if destination.len() < required {
      return Err(type_error(&format!(
        "destination is too small: need {} bytes, got {}",
        required,
        destination.len()
      )));
    }

    let buffer = &resource.buffer;
    let src_layout = buffer.layout();
    for plane in 0..format.number_of_planes() {
      let (row_bytes, rows) = format.plane_dims(plane, rect.width, rect.height);
      let src_entry = src_layout[plane as usize];
      let dst_entry = layouts[plane as usize];
      let (_, v_div) = plane_divisors(format, plane);
      let src_y0 = rect.y / v_div;
      let src_x_bytes = format.plane_x_bytes(plane, rect.x);

      for row in 0..rows {
        let src_start =
          (src_entry.offset + (src_y0 + row) * src_entry.stride + src_x_bytes) as usize;
        let dst_start = (dst_entry.offset + row * dst_entry.stride) as usize;
        destination[dst_start..dst_start + row_bytes as usize]
          .copy_from_slice(&buffer.data()[src_start..src_start + row_bytes as usize]);
      }
    }

    Ok(layouts)
  }

  /// Create a new frame sharing this frame's pixel buffer.
  /// Fails with InvalidStateError when the frame is closed.
  #[allow(clippy::should_implement_trait)]
  pub fn clone(&self) -> Result<VideoFrame> {
    let guard = self.resource.lock().expect("frame lock poisoned");
    let resource = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;
    Ok(VideoFrame {
      timestamp_us: self.timestamp_us,
      duration_us: self.duration_us,
      rotation: self.rotation,
      flip: self.flip,
      color_space: self.color_space.clone(),
      metadata: self.metadata.clone(),
      resource: Mutex::new(Some(FrameResource {
        buffer: resource.buffer.clone(),
        format: resource.format,
        visible_rect: resource.visible_rect,
        display_width: resource.display_width,
        display_height: resource.display_height,
      })),
    })
  }

  /// Release this wrapper's buffer reference. Double close is a no-op.
  pub fn close(&self) {
    let mut guard = self.resource.lock().expect("frame lock poisoned");
    guard.take();
  }
}

/// Per-plane subsampling divisors (horizontal, vertical)
fn plane_divisors(format: VideoPixelFormat, plane: u32) -> (u32, u32) {
  let (sub_x, sub_y) = format.subsampling();
  match format {
    VideoPixelFormat::NV12 | VideoPixelFormat::NV21 => {
      if plane == 0 {
        (1, 1)
      } else {
        (sub_x, sub_y)
      }
    }
    _ => match plane {
      1 | 2 if format.number_of_planes() >= 3 => (sub_x, sub_y),
      _ => (1, 1),
    },
  }
}

fn resolve_copy_options(
  resource: &FrameResource,
  options: Option<&VideoFrameCopyToOptions>,
) -> Result<(VideoPixelFormat, VideoFrameRect, Option<Vec<PlaneLayout>>)> {
  let source_format = resource.format;
  let format = match options.and_then(|o| o.format) {
    None => source_format,
    Some(requested) if requested == source_format => requested,
    Some(requested) => {
      // Only the alpha-reinterpret pairs share a memory layout; real pixel
      // conversion is the codec backend's concern
      let compatible = requested.without_alpha() == source_format
        || source_format.without_alpha() == requested;
      let single_plane = requested.number_of_planes() == source_format.number_of_planes();
      if compatible && single_plane {
        requested
      } else {
        return Err(not_supported_error(&format!(
          "cannot convert {} to {}",
          source_format.as_str(),
          requested.as_str()
        )));
      }
    }
  };

  let rect = match options.and_then(|o| o.rect.as_ref()) {
    Some(rect) => validate_rect(
      rect,
      format,
      resource.buffer.coded_width(),
      resource.buffer.coded_height(),
    )?,
    None => resource.visible_rect,
  };

  Ok((format, rect, options.and_then(|o| o.layout.clone())))
}

/// Validate a DOMRectInit against the coded size and the format's sample
/// alignment, returning the integer rect.
fn validate_rect(
  rect: &DOMRectInit,
  format: VideoPixelFormat,
  coded_width: u32,
  coded_height: u32,
) -> Result<VideoFrameRect> {
  let x = rect.x.unwrap_or(0.0);
  let y = rect.y.unwrap_or(0.0);
  let width = rect.width.unwrap_or(0.0);
  let height = rect.height.unwrap_or(0.0);

  if x < 0.0 || y < 0.0 || width <= 0.0 || height <= 0.0 {
    return Err(type_error("rect dimensions must be positive"));
  }
  if x.fract() != 0.0 || y.fract() != 0.0 || width.fract() != 0.0 || height.fract() != 0.0 {
    return Err(type_error("rect values must be integers"));
  }

  let (x, y, width, height) = (x as u32, y as u32, width as u32, height as u32);

  if x + width > coded_width || y + height > coded_height {
    return Err(type_error("rect exceeds the coded size"));
  }

  let (sub_x, sub_y) = format.subsampling();
  if x % sub_x != 0 || width % sub_x != 0 {
    return Err(type_error("rect is not horizontally sample-aligned"));
  }
  if y % sub_y != 0 || height % sub_y != 0 {
    return Err(type_error("rect is not vertically sample-aligned"));
  }

  Ok(VideoFrameRect {
    x,
    y,
    width,
    height,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn i420_frame(width: u32, height: u32, timestamp: i64) -> VideoFrame {
    let size = VideoPixelFormat::I420.allocation_size(width, height) as usize;
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    VideoFrame::new(
      &data,
      VideoFrameBufferInit::new(VideoPixelFormat::I420, width, height, timestamp),
    )
    .unwrap()
  }

  #[test]
  fn test_plane_geometry_i420() {
    let format = VideoPixelFormat::I420;
    assert_eq!(format.number_of_planes(), 3);
    assert_eq!(format.plane_dims(0, 320, 240), (320, 240));
    assert_eq!(format.plane_dims(1, 320, 240), (160, 120));
    assert_eq!(format.allocation_size(320, 240), 320 * 240 * 3 / 2);
  }

  #[test]
  fn test_plane_geometry_nv12() {
    let format = VideoPixelFormat::NV12;
    assert_eq!(format.number_of_planes(), 2);
    assert_eq!(format.plane_dims(0, 320, 240), (320, 240));
    assert_eq!(format.plane_dims(1, 320, 240), (320, 120));
    assert_eq!(format.allocation_size(320, 240), 320 * 240 * 3 / 2);
  }

  #[test]
  fn test_plane_geometry_rgba_and_10bit() {
    assert_eq!(VideoPixelFormat::RGBA.allocation_size(16, 16), 16 * 16 * 4);
    assert_eq!(
      VideoPixelFormat::I420P10.allocation_size(320, 240),
      320 * 240 * 3
    );
    assert_eq!(VideoPixelFormat::I420A.number_of_planes(), 4);
  }

  #[test]
  fn test_zero_dimensions_raise_type_error() {
    let err = VideoFrame::new(
      &[0u8; 16],
      VideoFrameBufferInit::new(VideoPixelFormat::I420, 0, 16, 0),
    )
    .unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::TypeError
    );
  }

  #[test]
  fn test_short_buffer_raises_type_error() {
    let err = VideoFrame::new(
      &[0u8; 8],
      VideoFrameBufferInit::new(VideoPixelFormat::I420, 16, 16, 0),
    )
    .unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::TypeError
    );
  }

  #[test]
  fn test_buffer_independence() {
    let size = VideoPixelFormat::I420.allocation_size(16, 16) as usize;
    let mut data = vec![7u8; size];
    let frame = VideoFrame::new(
      &data,
      VideoFrameBufferInit::new(VideoPixelFormat::I420, 16, 16, 0),
    )
    .unwrap();

    // Mutate the caller's buffer after construction
    data.iter_mut().for_each(|byte| *byte = 0);

    let mut out = vec![0u8; size];
    frame.copy_to(&mut out, None).unwrap();
    assert!(out.iter().all(|&byte| byte == 7));
  }

  #[test]
  fn test_copy_to_layouts_packed() {
    let frame = i420_frame(16, 16, 0);
    let mut out = vec![0u8; frame.allocation_size(None).unwrap() as usize];
    let layouts = frame.copy_to(&mut out, None).unwrap();
    assert_eq!(layouts.len(), 3);
    assert_eq!(layouts[0], PlaneLayout { offset: 0, stride: 16 });
    assert_eq!(
      layouts[1],
      PlaneLayout {
        offset: 256,
        stride: 8
      }
    );
    assert_eq!(
      layouts[2],
      PlaneLayout {
        offset: 320,
        stride: 8
      }
    );
  }

  #[test]
  fn test_copy_to_with_layout_override() {
    let frame = i420_frame(16, 16, 0);
    let layout = vec![
      PlaneLayout {
        offset: 0,
        stride: 32,
      },
      PlaneLayout {
        offset: 512,
        stride: 16,
      },
      PlaneLayout {
        offset: 640,
        stride: 16,
      },
    ];
    let mut out = vec![0u8; 768];
    let realised = frame
      .copy_to(
        &mut out,
        Some(&VideoFrameCopyToOptions {
          layout: Some(layout.clone()),
          ..Default::default()
        }),
      )
      .unwrap();
    assert_eq!(realised, layout);

    // First row of Y lands at offset 0 regardless of stride padding
    let mut packed = vec![0u8; frame.allocation_size(None).unwrap() as usize];
    frame.copy_to(&mut packed, None).unwrap();
    assert_eq!(&out[..16], &packed[..16]);
    assert_eq!(&out[32..48], &packed[16..32]);
  }

  #[test]
  fn test_copy_to_rect() {
    let frame = i420_frame(16, 16, 0);
    let options = VideoFrameCopyToOptions {
      rect: Some(DOMRectInit {
        x: Some(4.0),
        y: Some(4.0),
        width: Some(8.0),
        height: Some(8.0),
      }),
      ..Default::default()
    };
    let size = frame.allocation_size(Some(&options)).unwrap();
    assert_eq!(size, VideoPixelFormat::I420.allocation_size(8, 8));
    let mut out = vec![0u8; size as usize];
    let layouts = frame.copy_to(&mut out, Some(&options)).unwrap();
    assert_eq!(layouts[0].stride, 8);

    // Misaligned rect fails
    let bad = VideoFrameCopyToOptions {
      rect: Some(DOMRectInit {
        x: Some(3.0),
        y: Some(0.0),
        width: Some(8.0),
        height: Some(8.0),
      }),
      ..Default::default()
    };
    assert!(frame.copy_to(&mut out, Some(&bad)).is_err());
  }

  #[test]
  fn test_close_semantics() {
    let frame = i420_frame(16, 16, 12345);
    assert_eq!(frame.coded_width(), 16);
    frame.close();

    // Metadata stays readable, resource-dependent fields read sentinels
    assert_eq!(frame.timestamp(), 12345);
    assert_eq!(frame.duration(), None);
    assert_eq!(frame.format(), None);
    assert_eq!(frame.coded_width(), 0);
    assert_eq!(frame.coded_height(), 0);
    assert_eq!(frame.display_width(), 0);
    assert!(frame.coded_rect().is_err());
    assert!(frame.visible_rect().is_err());
    assert!(frame.allocation_size(None).is_err());
    assert!(frame.clone().is_err());
    let mut out = vec![0u8; 16];
    assert!(frame.copy_to(&mut out, None).is_err());

    // Double close is a silent no-op
    frame.close();
    assert!(frame.closed());
  }

  #[test]
  fn test_clone_shares_buffer() {
    let frame = i420_frame(16, 16, 1);
    let clone = frame.clone().unwrap();
    frame.close();

    // The clone still reads the shared buffer after the source closes
    let mut out = vec![0u8; clone.allocation_size(None).unwrap() as usize];
    clone.copy_to(&mut out, None).unwrap();
    assert_eq!(clone.timestamp(), 1);
  }

  #[test]
  fn test_from_frame_inherits_and_overrides() {
    let frame = i420_frame(16, 16, 100);
    let derived = VideoFrame::from_frame(
      &frame,
      VideoFrameInit {
        timestamp: Some(999),
        ..Default::default()
      },
    )
    .unwrap();
    assert_eq!(derived.timestamp(), 999);
    assert_eq!(derived.format(), Some(VideoPixelFormat::I420));
    assert_eq!(derived.coded_width(), 16);

    frame.close();
    let err = VideoFrame::from_frame(&frame, VideoFrameInit::default()).unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::InvalidStateError
    );
  }

  #[test]
  fn test_rotation_composition() {
    let size = VideoPixelFormat::I420.allocation_size(16, 16) as usize;
    let mut init = VideoFrameBufferInit::new(VideoPixelFormat::I420, 16, 16, 0);
    init.rotation = 90.0;
    let frame = VideoFrame::new(&vec![0u8; size], init).unwrap();
    assert_eq!(frame.rotation(), 90);
    // 90-degree rotation swaps the default display dimensions
    assert_eq!(frame.display_width(), 16);
    assert_eq!(frame.display_height(), 16);

    let derived = VideoFrame::from_frame(
      &frame,
      VideoFrameInit {
        rotation: 180.0,
        flip: true,
        ..Default::default()
      },
    )
    .unwrap();
    assert_eq!(derived.rotation(), 270);
    assert!(derived.flip());
  }

  #[test]
  fn test_parse_rotation_rounding() {
    assert_eq!(parse_rotation(0.0), 0);
    assert_eq!(parse_rotation(44.0), 0);
    assert_eq!(parse_rotation(45.0), 90);
    assert_eq!(parse_rotation(-90.0), 270);
    assert_eq!(parse_rotation(450.0), 90);
  }

  #[test]
  fn test_alpha_discard_retags_rgba() {
    let data = vec![9u8; 16 * 16 * 4];
    let frame = VideoFrame::new(
      &data,
      VideoFrameBufferInit::new(VideoPixelFormat::RGBA, 16, 16, 0),
    )
    .unwrap();
    let derived = VideoFrame::from_frame(
      &frame,
      VideoFrameInit {
        alpha: Some(AlphaOption::Discard),
        ..Default::default()
      },
    )
    .unwrap();
    assert_eq!(derived.format(), Some(VideoPixelFormat::RGBX));
  }

  #[test]
  fn test_alpha_discard_drops_planar_alpha() {
    let size = VideoPixelFormat::I420A.allocation_size(16, 16) as usize;
    let frame = VideoFrame::new(
      &vec![3u8; size],
      VideoFrameBufferInit::new(VideoPixelFormat::I420A, 16, 16, 0),
    )
    .unwrap();
    let derived = VideoFrame::from_frame(
      &frame,
      VideoFrameInit {
        alpha: Some(AlphaOption::Discard),
        ..Default::default()
      },
    )
    .unwrap();
    assert_eq!(derived.format(), Some(VideoPixelFormat::I420));
    assert_eq!(derived.number_of_planes().unwrap(), 3);
  }

  #[test]
  fn test_copy_to_format_conversion_limits() {
    let frame = i420_frame(16, 16, 0);
    let mut out = vec![0u8; 16 * 16 * 4];
    let err = frame
      .copy_to(
        &mut out,
        Some(&VideoFrameCopyToOptions {
          format: Some(VideoPixelFormat::RGBA),
          ..Default::default()
        }),
      )
      .unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::NotSupportedError
    );
  }

  #[test]
  fn test_color_space_round_trip() {
    let space = VideoColorSpace::new(Some(VideoColorSpaceInit {
      primaries: Some(VideoColorPrimaries::Bt2020),
      transfer: Some(VideoTransferCharacteristics::Pq),
      matrix: Some(VideoMatrixCoefficients::Bt2020Ncl),
      full_range: Some(false),
    }));
    let round_tripped = VideoColorSpace::new(Some(space.to_json()));
    assert_eq!(space, round_tripped);

    let empty = VideoColorSpace::new(None);
    assert_eq!(empty.primaries(), None);
    assert_eq!(empty.transfer(), None);
    assert_eq!(empty.matrix(), None);
    assert_eq!(empty.full_range(), None);

    // toJSON emits explicit nulls
    let value = empty.to_json_value();
    assert!(value.get("primaries").unwrap().is_null());
    assert!(value.get("transfer").unwrap().is_null());
    assert!(value.get("matrix").unwrap().is_null());
    assert!(value.get("fullRange").unwrap().is_null());
  }

  #[test]
  fn test_dom_rect_read_only_edges() {
    let rect = DOMRectReadOnly::new(2.0, 3.0, 10.0, 20.0);
    assert_eq!(rect.left(), 2.0);
    assert_eq!(rect.top(), 3.0);
    assert_eq!(rect.right(), 12.0);
    assert_eq!(rect.bottom(), 23.0);
    assert_eq!(rect.to_json().width, Some(10.0));
  }

  #[test]
  fn test_canvas_source_requires_timestamp() {
    struct Canvas;
    impl CanvasImageSource for Canvas {
      fn width(&self) -> u32 {
        4
      }
      fn height(&self) -> u32 {
        4
      }
      fn rgba_data(&self) -> Vec<u8> {
        vec![1u8; 4 * 4 * 4]
      }
    }

    let err = VideoFrame::from_canvas_source(&Canvas, VideoFrameInit::default()).unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::TypeError
    );

    let frame = VideoFrame::from_canvas_source(
      &Canvas,
      VideoFrameInit {
        timestamp: Some(5),
        ..Default::default()
      },
    )
    .unwrap();
    assert_eq!(frame.format(), Some(VideoPixelFormat::RGBA));
    assert_eq!(frame.timestamp(), 5);
  }
}
