//! Codec string parser for WebCodecs API
//!
//! Parses codec strings like vp09.PP.LL.DD, av01.P.LLT.DD, avc1.PPCCLL, hev1.P.T.Lxxx
//! into structured information including profile, level, and bit depth.
//!
//! Matching is case-sensitive: the WebCodecs codec registry defines the
//! canonical strings in lowercase, and casing variants of known strings are
//! treated as unknown codecs (valid but unsupported).

/// Codec identifier independent of any particular backend library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
  // Video
  H264,
  Hevc,
  Vp8,
  Vp9,
  Av1,
  // Audio
  Aac,
  Opus,
  Vorbis,
  Flac,
  Mp3,
  Pcm,
}

impl CodecId {
  pub fn is_video(&self) -> bool {
    matches!(
      self,
      CodecId::H264 | CodecId::Hevc | CodecId::Vp8 | CodecId::Vp9 | CodecId::Av1
    )
  }

  pub fn is_audio(&self) -> bool {
    !self.is_video()
  }
}

/// Parsed codec information extracted from a WebCodecs codec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCodec {
  /// The codec identifier
  pub codec_id: CodecId,
  /// Profile number (codec-specific interpretation)
  pub profile: Option<u8>,
  /// Level value (codec-specific, often needs multiplication by 10)
  pub level: Option<u8>,
  /// Bit depth (8, 10, or 12)
  pub bit_depth: Option<u8>,
  /// Chroma subsampling (420, 422, 444)
  pub chroma_subsampling: Option<u16>,
}

impl ParsedCodec {
  /// Create a new ParsedCodec with just the codec ID
  pub fn new(codec_id: CodecId) -> Self {
    Self {
      codec_id,
      profile: None,
      level: None,
      bit_depth: None,
      chroma_subsampling: None,
    }
  }
}

/// Parse a WebCodecs video codec string into structured information
///
/// Supported formats:
/// - VP9: `vp09.PP.LL.DD.CC.cp.tc.mc.FF` or `vp9`
/// - AV1: `av01.P.LLT.DD.M.CCC.cp.tc.mc.F` or `av1`
/// - H.264: `avc1.PPCCLL` or `avc3.PPCCLL`
/// - H.265: `hev1.P.T.Lxxx` or `hvc1.P.T.Lxxx`
/// - VP8: `vp8`
///
/// Returns `None` if the codec string is not recognized.
pub fn parse_codec_string(codec: &str) -> Option<ParsedCodec> {
  // VP9: vp09.PP.LL.DD or vp9
  if codec.starts_with("vp09") {
    return parse_vp9(codec);
  }
  if codec == "vp9" {
    return Some(ParsedCodec::new(CodecId::Vp9));
  }

  // AV1: av01.P.LLT.DD or av1
  if codec.starts_with("av01") {
    return parse_av1(codec);
  }
  if codec == "av1" {
    return Some(ParsedCodec::new(CodecId::Av1));
  }

  // H.264: avc1.PPCCLL or avc3.PPCCLL
  if codec.starts_with("avc1") || codec.starts_with("avc3") {
    return parse_avc(codec);
  }

  // H.265: hev1.P.T.Lxxx or hvc1.P.T.Lxxx
  if codec.starts_with("hev1") || codec.starts_with("hvc1") {
    return parse_hevc(codec);
  }

  // VP8 (simple, no parameters)
  if codec == "vp8" {
    return Some(ParsedCodec::new(CodecId::Vp8));
  }

  None
}

/// Parse a WebCodecs audio codec string
///
/// Supported: `mp4a.40.x` (AAC), `opus`, `vorbis`, `flac`, `mp3`,
/// `pcm-u8`/`pcm-s16`/`pcm-s24`/`pcm-s32`/`pcm-f32`, `ulaw`, `alaw`.
///
/// Returns `None` if the codec string is not recognized.
pub fn parse_audio_codec_string(codec: &str) -> Option<CodecId> {
  if codec == "mp4a.40.2" || codec == "mp4a.40.5" || codec == "mp4a.40.29" {
    return Some(CodecId::Aac);
  }
  // Other mp4a object types pass through as AAC variants
  if let Some(rest) = codec.strip_prefix("mp4a.40.") {
    if rest.parse::<u8>().is_ok() {
      return Some(CodecId::Aac);
    }
    return None;
  }
  match codec {
    "opus" => Some(CodecId::Opus),
    "vorbis" => Some(CodecId::Vorbis),
    "flac" => Some(CodecId::Flac),
    "mp3" => Some(CodecId::Mp3),
    "ulaw" | "alaw" | "pcm-u8" | "pcm-s16" | "pcm-s24" | "pcm-s32" | "pcm-f32" => {
      Some(CodecId::Pcm)
    }
    _ => None,
  }
}

/// Parse VP9 codec string: vp09.PP.LL.DD.CC.cp.tc.mc.FF
/// - PP: profile (00-03)
/// - LL: level (10-62)
/// - DD: bit depth (08, 10, 12)
/// - CC: chroma subsampling (00=420, 01=422, 02=444, 03=440)
fn parse_vp9(codec: &str) -> Option<ParsedCodec> {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedCodec::new(CodecId::Vp9);

  if parts.len() >= 2 {
    // Profile
    if let Ok(profile) = parts[1].parse::<u8>() {
      parsed.profile = Some(profile);
    }
  }

  if parts.len() >= 3 {
    // Level
    if let Ok(level) = parts[2].parse::<u8>() {
      parsed.level = Some(level);
    }
  }

  if parts.len() >= 4 {
    // Bit depth
    if let Ok(depth) = parts[3].parse::<u8>() {
      parsed.bit_depth = Some(depth);
    }
  }

  if parts.len() >= 5 {
    // Chroma subsampling
    match parts[4] {
      "00" => parsed.chroma_subsampling = Some(420),
      "01" => parsed.chroma_subsampling = Some(422),
      "02" => parsed.chroma_subsampling = Some(444),
      "03" => parsed.chroma_subsampling = Some(440),
      _ => {}
    }
  }

  Some(parsed)
}

/// Parse AV1 codec string: av01.P.LLT.DD.M.CCC.cp.tc.mc.F
/// - P: profile (0=Main, 1=High, 2=Professional)
/// - LLT: level and tier (level*10 + tier_flag)
/// - DD: bit depth (08, 10, 12)
/// - M: monochrome flag (0=not monochrome, 1=monochrome)
/// - CCC: chroma subsampling (110=420, 100=422, 000=444)
fn parse_av1(codec: &str) -> Option<ParsedCodec> {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedCodec::new(CodecId::Av1);

  if parts.len() >= 2 {
    // Profile
    if let Ok(profile) = parts[1].parse::<u8>() {
      parsed.profile = Some(profile);
    }
  }

  if parts.len() >= 3 {
    // Level and tier (e.g., "04M" -> level 4, Main tier)
    let level_tier = parts[2];
    let level_str: String = level_tier
      .chars()
      .take_while(|c| c.is_ascii_digit())
      .collect();
    if let Ok(level) = level_str.parse::<u8>() {
      parsed.level = Some(level);
    }
  }

  if parts.len() >= 4 {
    // Bit depth
    if let Ok(depth) = parts[3].parse::<u8>() {
      parsed.bit_depth = Some(depth);
    }
  }

  // Chroma subsampling is at index 5 if monochrome flag is present
  if parts.len() >= 6 {
    match parts[5] {
      "110" => parsed.chroma_subsampling = Some(420),
      "100" => parsed.chroma_subsampling = Some(422),
      "000" => parsed.chroma_subsampling = Some(444),
      _ => {}
    }
  }

  Some(parsed)
}

/// Parse AVC/H.264 codec string: avc1.PPCCLL
/// - PP: profile_idc (42=Baseline, 4D=Main, 58=Extended, 64=High, etc.)
/// - CC: constraint_set flags
/// - LL: level_idc (1F=3.1, 28=4.0, 33=5.1, etc.)
fn parse_avc(codec: &str) -> Option<ParsedCodec> {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedCodec::new(CodecId::H264);

  if parts.len() >= 2 && parts[1].len() >= 6 {
    let hex = parts[1];

    // Profile (first 2 hex digits)
    if let Ok(profile) = u8::from_str_radix(&hex[0..2], 16) {
      parsed.profile = Some(profile);
    }

    // Level (last 2 hex digits)
    if let Ok(level) = u8::from_str_radix(&hex[4..6], 16) {
      parsed.level = Some(level);
    }
  }

  // H.264 is 8-bit outside the rare High 10 profiles
  parsed.bit_depth = Some(8);

  Some(parsed)
}

/// Parse HEVC/H.265 codec string: hev1.P.TC.Lxxx.Bx
/// - P: profile (1=Main, 2=Main10, 3=Main Still Picture)
/// - TC: tier and compatibility flags
/// - Lxxx: level (L120 = level 4.0, L150 = level 5.0)
fn parse_hevc(codec: &str) -> Option<ParsedCodec> {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedCodec::new(CodecId::Hevc);

  if parts.len() >= 2 {
    // Profile
    if let Ok(profile) = parts[1].parse::<u8>() {
      parsed.profile = Some(profile);
      // Infer bit depth from profile
      if profile == 2 {
        parsed.bit_depth = Some(10); // Main 10
      } else {
        parsed.bit_depth = Some(8);
      }
    }
  }

  if parts.len() >= 4 {
    // Level: Lxxx format (e.g., L120 = level 4.0, L150 = level 5.0)
    let level_str = parts[3];
    if let Some(rest) = level_str
      .strip_prefix('L')
      .or_else(|| level_str.strip_prefix('H'))
    {
      if let Ok(level) = rest.parse::<u8>() {
        parsed.level = Some(level);
      }
    }
  }

  Some(parsed)
}
