//! Clip Generation Settings
//!
//! Typed configuration for a single generation request. All invariants are
//! checked when the settings value is built; the value is immutable
//! afterwards, and derived sizing is computed during the build rather than
//! patched in later.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ClipError, ClipResult};
use crate::ffmpeg::FfmpegTool;
use crate::style::TextStyle;

// =============================================================================
// Output Format
// =============================================================================

/// Supported clip output formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    Gif,
    Webp,
    Mp4,
}

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Mp4 => "mp4",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// A validated clip generation request.
///
/// Construct through [`ClipSettings::builder`]; direct construction is not
/// exposed so that every instance has passed the invariant checks and has
/// concrete output dimensions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClipSettings {
    /// Source video
    pub input_path: PathBuf,
    /// Intermediate trimmed clip
    pub clip_path: PathBuf,
    /// Final generated clip
    pub output_path: PathBuf,
    pub output_format: VideoFormat,
    /// Clip start within the source, in milliseconds
    pub start_ms: u64,
    /// Clip end within the source, in milliseconds
    pub end_ms: u64,
    pub fps: u32,
    /// Output width in pixels (derived from `resolution` when that was given)
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Requested output height when sizing was derived, kept for reference
    pub resolution: Option<u32>,
    pub subtitle_style: TextStyle,
    pub caption_style: TextStyle,
    /// Center-crop the clip to a square
    pub crop: bool,
    /// Append a time-reversed copy, doubling the duration
    pub boomerang: bool,
    /// Full-palette GIF instead of the reduced 32-color dithered palette
    pub hd_gif: bool,
    /// Also produce a burned-in MP4 companion
    pub mp4_copy: bool,
    /// Constant Rate Factor used when re-encoding
    pub crf: u32,
    /// Encoder preset used when re-encoding
    pub preset: String,
}

impl ClipSettings {
    pub fn builder(
        input_path: impl Into<PathBuf>,
        clip_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        output_format: VideoFormat,
        start_ms: u64,
        end_ms: u64,
    ) -> ClipSettingsBuilder {
        ClipSettingsBuilder {
            input_path: input_path.into(),
            clip_path: clip_path.into(),
            output_path: output_path.into(),
            output_format,
            start_ms,
            end_ms,
            fps: 20,
            size: None,
            resolution: None,
            subtitle_style: None,
            caption_style: None,
            crop: false,
            boomerang: false,
            hd_gif: false,
            mp4_copy: false,
            crf: 18,
            preset: "fast".to_string(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    pub fn start_s(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ClipSettings`]; validation and sizing derivation happen in
/// one pass inside [`ClipSettingsBuilder::build`].
#[derive(Clone, Debug)]
pub struct ClipSettingsBuilder {
    input_path: PathBuf,
    clip_path: PathBuf,
    output_path: PathBuf,
    output_format: VideoFormat,
    start_ms: u64,
    end_ms: u64,
    fps: u32,
    size: Option<(u32, u32)>,
    resolution: Option<u32>,
    subtitle_style: Option<TextStyle>,
    caption_style: Option<TextStyle>,
    crop: bool,
    boomerang: bool,
    hd_gif: bool,
    mp4_copy: bool,
    crf: u32,
    preset: String,
}

impl ClipSettingsBuilder {
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Explicit output dimensions; mutually exclusive with [`Self::resolution`]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Output height with aspect-preserving width; mutually exclusive with
    /// [`Self::size`]
    pub fn resolution(mut self, resolution: u32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn subtitle_style(mut self, style: TextStyle) -> Self {
        self.subtitle_style = Some(style);
        self
    }

    pub fn caption_style(mut self, style: TextStyle) -> Self {
        self.caption_style = Some(style);
        self
    }

    pub fn crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn boomerang(mut self, boomerang: bool) -> Self {
        self.boomerang = boomerang;
        self
    }

    pub fn hd_gif(mut self, hd_gif: bool) -> Self {
        self.hd_gif = hd_gif;
        self
    }

    pub fn mp4_copy(mut self, mp4_copy: bool) -> Self {
        self.mp4_copy = mp4_copy;
        self
    }

    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = crf;
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Validates the request and resolves derived sizing.
    ///
    /// When sizing comes from `resolution` without `crop`, the source's
    /// native dimensions are probed; a failed probe is a fatal error, never
    /// a silent default.
    pub async fn build(self, tool: &FfmpegTool) -> ClipResult<ClipSettings> {
        let source_dims = if self.resolution.is_some() && !self.crop {
            Some(tool.probe_dimensions(&self.input_path).await?)
        } else {
            None
        };
        self.finish(source_dims)
    }

    pub(crate) fn finish(self, source_dims: Option<(u32, u32)>) -> ClipResult<ClipSettings> {
        if self.start_ms >= self.end_ms {
            return Err(ClipError::Configuration(format!(
                "Clip start ({} ms) must be before end ({} ms)",
                self.start_ms, self.end_ms
            )));
        }

        match (self.resolution, self.size) {
            (Some(_), Some(_)) => {
                return Err(ClipError::Configuration(
                    "Set either resolution or width+height, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(ClipError::Configuration(
                    "Either resolution or width+height must be set".to_string(),
                ));
            }
            _ => {}
        }

        let extension = self
            .output_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if VideoFormat::from_extension(extension) != Some(self.output_format) {
            return Err(ClipError::Configuration(format!(
                "Output path extension '{extension}' does not match format {:?}",
                self.output_format
            )));
        }

        if self.mp4_copy && self.output_format == VideoFormat::Mp4 {
            return Err(ClipError::Configuration(
                "An MP4 companion copy is redundant when the output is already MP4".to_string(),
            ));
        }

        let (width, height) = match (self.resolution, self.size) {
            (Some(resolution), None) => {
                if self.crop {
                    // A square crop makes the aspect ratio moot; no probe needed.
                    (resolution, resolution)
                } else {
                    let (src_w, src_h) = source_dims.ok_or_else(|| {
                        ClipError::Probe("Source dimensions required to derive sizing".to_string())
                    })?;
                    derived_size(resolution, src_w, src_h)
                }
            }
            (None, Some((width, height))) => {
                if self.crop && width != height {
                    return Err(ClipError::Configuration(format!(
                        "Crop requires matching dimensions, got {width}x{height}"
                    )));
                }
                (width, height)
            }
            _ => unreachable!("mutual exclusion checked above"),
        };

        let subtitle_style = self.subtitle_style.unwrap_or_default();
        let caption_style = self
            .caption_style
            .unwrap_or_else(|| TextStyle::caption_default(subtitle_style.font_size));

        Ok(ClipSettings {
            input_path: self.input_path,
            clip_path: self.clip_path,
            output_path: self.output_path,
            output_format: self.output_format,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            fps: self.fps,
            width,
            height,
            resolution: self.resolution,
            subtitle_style,
            caption_style,
            crop: self.crop,
            boomerang: self.boomerang,
            hd_gif: self.hd_gif,
            mp4_copy: self.mp4_copy,
            crf: self.crf,
            preset: self.preset,
        })
    }
}

/// Derives output dimensions from a target height, preserving the source
/// aspect ratio and rounding the width to an even pixel count.
pub(crate) fn derived_size(resolution: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    let width = 2.0 * (resolution as f64 * src_w as f64 / src_h as f64 / 2.0).round();
    (width as u32, resolution)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> ClipSettingsBuilder {
        ClipSettings::builder(
            "input.mkv",
            "work/clip.mp4",
            "out.gif",
            VideoFormat::Gif,
            1_000,
            4_000,
        )
    }

    #[test]
    fn test_rejects_start_equal_to_end() {
        let result = ClipSettings::builder(
            "input.mkv",
            "clip.mp4",
            "out.gif",
            VideoFormat::Gif,
            2_000,
            2_000,
        )
        .resolution(320)
        .crop(true)
        .finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_rejects_start_after_end() {
        let result = ClipSettings::builder(
            "input.mkv",
            "clip.mp4",
            "out.gif",
            VideoFormat::Gif,
            5_000,
            2_000,
        )
        .size(320, 240)
        .finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_rejects_resolution_and_explicit_size_together() {
        let result = base_builder().resolution(320).size(320, 240).finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_rejects_no_sizing_at_all() {
        let result = base_builder().finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_rejects_extension_format_mismatch() {
        let result = ClipSettings::builder(
            "input.mkv",
            "clip.mp4",
            "out.gif",
            VideoFormat::Mp4,
            0,
            1_000,
        )
        .size(320, 240)
        .finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_rejects_mp4_copy_for_mp4_output() {
        let result = ClipSettings::builder(
            "input.mkv",
            "clip.mp4",
            "out.mp4",
            VideoFormat::Mp4,
            0,
            1_000,
        )
        .size(320, 240)
        .mp4_copy(true)
        .finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_mp4_copy_accepted_for_animated_formats() {
        let settings = base_builder().size(320, 240).mp4_copy(true).finish(None).unwrap();
        assert!(settings.mp4_copy);
    }

    #[test]
    fn test_rejects_crop_with_non_square_explicit_size() {
        let result = base_builder().size(320, 240).crop(true).finish(None);
        assert!(matches!(result, Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_derived_size_from_resolution() {
        // 1920x1080 source at target height 320
        assert_eq!(derived_size(320, 1920, 1080), (568, 320));
        // Derived width is always even
        assert_eq!(derived_size(240, 1280, 720).0 % 2, 0);
    }

    #[test]
    fn test_resolution_with_crop_needs_no_probe() {
        let settings = base_builder().resolution(320).crop(true).finish(None).unwrap();
        assert_eq!((settings.width, settings.height), (320, 320));
    }

    #[test]
    fn test_resolution_derivation_uses_probed_dimensions() {
        let settings = base_builder()
            .resolution(320)
            .finish(Some((1920, 1080)))
            .unwrap();
        assert_eq!((settings.width, settings.height), (568, 320));
        assert_eq!(settings.resolution, Some(320));
    }

    #[test]
    fn test_defaults_and_styles() {
        let settings = base_builder()
            .size(400, 300)
            .subtitle_style(TextStyle {
                font_size: 36,
                ..TextStyle::subtitle_default()
            })
            .finish(None)
            .unwrap();
        assert_eq!(settings.fps, 20);
        assert_eq!(settings.crf, 18);
        assert_eq!(settings.preset, "fast");
        // Caption style inherits the subtitle font size
        assert_eq!(settings.caption_style.font_size, 36);
        assert_eq!(settings.caption_style.alignment, 7);
    }

    #[test]
    fn test_duration_helpers() {
        let settings = base_builder().size(320, 320).finish(None).unwrap();
        assert_eq!(settings.duration_ms(), 3_000);
        assert!((settings.start_s() - 1.0).abs() < f64::EPSILON);
        assert!((settings.duration_s() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_extension_mapping() {
        assert_eq!(VideoFormat::from_extension("GIF"), Some(VideoFormat::Gif));
        assert_eq!(VideoFormat::from_extension("webp"), Some(VideoFormat::Webp));
        assert_eq!(VideoFormat::from_extension("avi"), None);
        assert_eq!(VideoFormat::Mp4.extension(), "mp4");
    }
}
