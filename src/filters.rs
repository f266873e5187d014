//! Filter-Graph Builder
//!
//! Converts a clip request into an ordered list of typed filter stages and
//! serializes them into the FFmpeg `-filter_complex` expression. Stage order
//! is fixed and semantically required: geometry before text, text before
//! palette. Palette quantization must come last because its color choices
//! depend on the final pixel content.

use std::path::{Path, PathBuf};

use crate::settings::{ClipSettings, VideoFormat};

// =============================================================================
// Stage Model
// =============================================================================

/// One visual transformation in the filter graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterStage {
    /// Concatenate the stream with its own mirror, doubling the duration
    ReverseConcat,
    /// Frame-rate normalization
    Fps(u32),
    /// Center square-crop to the smaller of the two frame dimensions
    CropSquare,
    /// Scale to the target frame with high-quality resampling
    Scale { width: u32, height: u32 },
    /// Reserve vertical space above the video for the caption block
    PadTop(u32),
    /// Burn in the ASS markup script at the given path
    Subtitles(PathBuf),
    /// GIF palette generation and application
    Palette { hd: bool },
}

impl FilterStage {
    /// Renders this stage as an FFmpeg filtergraph fragment
    pub fn render(&self) -> String {
        match self {
            Self::ReverseConcat => "[0]reverse[r];[0][r]concat=n=2:v=1:a=0".to_string(),
            Self::Fps(fps) => format!("fps={fps}"),
            Self::CropSquare => r"crop=min(iw\,ih):min(iw\,ih)".to_string(),
            Self::Scale { width, height } => format!("scale={width}:{height}:flags=lanczos"),
            Self::PadTop(padding) => format!("pad=iw:ih+{padding}:0:{padding}"),
            Self::Subtitles(path) => format!("subtitles={}", escape_filter_path(path)),
            Self::Palette { hd: true } => {
                "split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse".to_string()
            }
            Self::Palette { hd: false } => {
                "split[s0][s1];[s0]palettegen=max_colors=32[p];[s1][p]paletteuse=dither=bayer"
                    .to_string()
            }
        }
    }
}

// =============================================================================
// Graph Assembly
// =============================================================================

/// Builds the ordered stage list for a clip request.
///
/// `ass_path` is the markup script to burn in, if one was produced;
/// `caption_padding` is the measured vertical padding when a caption is
/// present (a present-but-zero padding still emits the pad stage so the
/// script's play resolution matches the padded frame).
pub fn build_stages(
    settings: &ClipSettings,
    ass_path: Option<&Path>,
    caption_padding: Option<u32>,
) -> Vec<FilterStage> {
    let mut stages = Vec::new();

    if settings.boomerang {
        stages.push(FilterStage::ReverseConcat);
    }
    stages.push(FilterStage::Fps(settings.fps));
    if settings.crop {
        stages.push(FilterStage::CropSquare);
    }
    stages.push(FilterStage::Scale {
        width: settings.width,
        height: settings.height,
    });
    if let Some(padding) = caption_padding {
        stages.push(FilterStage::PadTop(padding));
    }
    if let Some(path) = ass_path {
        stages.push(FilterStage::Subtitles(path.to_path_buf()));
    }
    if settings.output_format == VideoFormat::Gif {
        stages.push(FilterStage::Palette {
            hd: settings.hd_gif,
        });
    }

    stages
}

/// Serializes an ordered stage list into one `-filter_complex` expression
pub fn render_graph(stages: &[FilterStage]) -> String {
    stages
        .iter()
        .map(FilterStage::render)
        .collect::<Vec<_>>()
        .join(",")
}

/// Escapes a filesystem path for embedding in a filtergraph expression.
///
/// Filtergraphs treat `:` and `,` as separators and `\` as an escape
/// character; Windows paths contain both `\` and a drive-letter `:`.
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => escaped.push_str(r"\\"),
            ':' => escaped.push_str(r"\:"),
            ',' => escaped.push_str(r"\,"),
            '\'' => escaped.push_str(r"\'"),
            '[' => escaped.push_str(r"\["),
            ']' => escaped.push_str(r"\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ClipSettings;

    fn settings(format: VideoFormat, output: &str) -> ClipSettings {
        // Explicit square size satisfies the crop invariant without probing
        ClipSettings::builder("in.mkv", "clip.mp4", output, format, 0, 5_000)
            .size(320, 320)
            .crop(true)
            .boomerang(true)
            .finish(None)
            .unwrap()
    }

    #[test]
    fn test_stage_order_boomerang_crop_gif() {
        let settings = settings(VideoFormat::Gif, "out.gif");
        let ass = PathBuf::from("/tmp/work/sub.ass");
        let stages = build_stages(&settings, Some(&ass), None);

        assert_eq!(
            stages,
            vec![
                FilterStage::ReverseConcat,
                FilterStage::Fps(20),
                FilterStage::CropSquare,
                FilterStage::Scale {
                    width: 320,
                    height: 320
                },
                FilterStage::Subtitles(ass),
                FilterStage::Palette { hd: false },
            ]
        );
    }

    #[test]
    fn test_caption_padding_inserts_pad_before_subtitles() {
        let settings = settings(VideoFormat::Gif, "out.gif");
        let ass = PathBuf::from("sub.ass");
        let stages = build_stages(&settings, Some(&ass), Some(44));

        let pad_idx = stages
            .iter()
            .position(|s| matches!(s, FilterStage::PadTop(44)))
            .unwrap();
        let sub_idx = stages
            .iter()
            .position(|s| matches!(s, FilterStage::Subtitles(_)))
            .unwrap();
        assert!(pad_idx < sub_idx);
    }

    #[test]
    fn test_no_palette_stage_for_mp4() {
        let settings = settings(VideoFormat::Mp4, "out.mp4");
        let stages = build_stages(&settings, None, None);
        assert!(!stages.iter().any(|s| matches!(s, FilterStage::Palette { .. })));
    }

    #[test]
    fn test_palette_renders_reduced_and_hd_variants() {
        assert_eq!(
            FilterStage::Palette { hd: true }.render(),
            "split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"
        );
        assert!(FilterStage::Palette { hd: false }
            .render()
            .contains("max_colors=32"));
        assert!(FilterStage::Palette { hd: false }
            .render()
            .contains("dither=bayer"));
    }

    #[test]
    fn test_render_graph_joins_with_commas() {
        let graph = render_graph(&[
            FilterStage::Fps(20),
            FilterStage::Scale {
                width: 568,
                height: 320,
            },
        ]);
        assert_eq!(graph, "fps=20,scale=568:320:flags=lanczos");
    }

    #[test]
    fn test_crop_square_escapes_inner_commas() {
        assert_eq!(
            FilterStage::CropSquare.render(),
            r"crop=min(iw\,ih):min(iw\,ih)"
        );
    }

    #[test]
    fn test_escape_filter_path_windows_style() {
        let path = PathBuf::from(r"C:\clips\sub.ass");
        assert_eq!(escape_filter_path(&path), r"C\:\\clips\\sub.ass");
    }

    #[test]
    fn test_escape_filter_path_quote_and_brackets() {
        let path = PathBuf::from("/tmp/it's [a] clip.ass");
        assert_eq!(escape_filter_path(&path), r"/tmp/it\'s \[a\] clip.ass");
    }
}
