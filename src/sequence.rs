//! Multi-Segment Sequence Concatenation
//!
//! Renders a run of consecutive cues as one seamless clip: each segment is
//! rendered as an MP4 with its cue burned in, the segments are stream-copy
//! concatenated, and a single final filter pass over the combined clip
//! applies the global caption and output-format encoding. Per-segment pieces
//! carry neither palette nor caption so the final pass stays the only place
//! those decisions are made.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{ClipError, ClipResult};
use crate::ffmpeg::FfmpegTool;
use crate::pipeline;
use crate::settings::{derived_size, ClipSettings, VideoFormat};
use crate::style::TextStyle;
use crate::subtitles::Subtitle;

// =============================================================================
// Request
// =============================================================================

/// A validated-on-use request for a multi-segment sequence clip.
///
/// Sizing follows the same rules as [`ClipSettings`]: either `resolution`
/// or `size`, with `crop` forcing a square. The shared dimensions are
/// resolved once so every segment renders at exactly the same size, a
/// precondition for stream-copy concatenation.
#[derive(Clone, Debug)]
pub struct SequenceSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub output_format: VideoFormat,
    pub fps: u32,
    pub size: Option<(u32, u32)>,
    pub resolution: Option<u32>,
    pub crop: bool,
    pub hd_gif: bool,
    pub crf: u32,
    pub preset: String,
    pub subtitle_style: TextStyle,
    pub caption_style: TextStyle,
}

/// One segment of a sequence: the cue to burn in, plus an optional style
/// override for that segment's text (the shared subtitle style applies
/// otherwise).
#[derive(Clone, Debug)]
pub struct SequenceSegment {
    pub cue: Subtitle,
    pub style: Option<TextStyle>,
}

impl SequenceSegment {
    pub fn new(cue: Subtitle) -> Self {
        Self { cue, style: None }
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.style = Some(style);
        self
    }
}

impl SequenceSettings {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        output_format: VideoFormat,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            output_format,
            fps: 20,
            size: None,
            resolution: None,
            crop: false,
            hd_gif: false,
            crf: 18,
            preset: "fast".to_string(),
            subtitle_style: TextStyle::subtitle_default(),
            caption_style: TextStyle::caption_default(20),
        }
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Generates one clip spanning a run of consecutive cues.
///
/// `segments` must hold at least two cues with contiguous `sequence_id`s.
/// Each segment's video extends to the next segment's start so the combined
/// clip has no gaps; the last segment keeps its own end. `caption_lines`
/// apply to the combined clip as a whole.
pub async fn generate_sequence(
    tool: &FfmpegTool,
    settings: &SequenceSettings,
    segments: &[SequenceSegment],
    caption_lines: Option<&[String]>,
) -> ClipResult<()> {
    if segments.len() < 2 {
        return Err(ClipError::Sequence(format!(
            "A sequence needs at least two cues, got {}",
            segments.len()
        )));
    }
    check_contiguous(segments)?;

    let (width, height) = resolve_shared_size(tool, settings).await?;
    let windows = segment_windows(segments);
    check_windows(&windows)?;

    info!(
        input = %settings.input_path.display(),
        output = %settings.output_path.display(),
        segment_count = segments.len(),
        "generating sequence clip"
    );

    let workdir = tempfile::tempdir()?;

    let mut part_paths = Vec::with_capacity(segments.len());
    for (i, (segment, &(start_ms, end_ms))) in segments.iter().zip(&windows).enumerate() {
        let part_path = workdir.path().join(format!("part_{i}.mp4"));
        let part_settings = ClipSettings::builder(
            &settings.input_path,
            workdir.path().join(format!("part_{i}_trim.mp4")),
            &part_path,
            VideoFormat::Mp4,
            start_ms,
            end_ms,
        )
        .fps(settings.fps)
        .size(width, height)
        .crop(settings.crop)
        .crf(settings.crf)
        .preset(settings.preset.clone())
        .subtitle_style(
            segment
                .style
                .clone()
                .unwrap_or_else(|| settings.subtitle_style.clone()),
        )
        .build(tool)
        .await?;

        debug!(segment = i, start_ms, end_ms, "rendering sequence segment");
        pipeline::generate(tool, &part_settings, std::slice::from_ref(&segment.cue), None).await?;
        part_paths.push(part_path);
    }

    let list_path = workdir.path().join("concat.txt");
    tokio::fs::write(&list_path, concat_list(&part_paths)).await?;

    let combined_path = workdir.path().join("combined.mp4");
    tool.concat_copy(&list_path, &combined_path).await?;

    // The combined clip starts at zero; its length is the span of the windows.
    let first_start = windows[0].0;
    let last_end = windows[windows.len() - 1].1;
    let final_settings = ClipSettings::builder(
        &combined_path,
        workdir.path().join("final_trim.mp4"),
        &settings.output_path,
        settings.output_format,
        0,
        last_end - first_start,
    )
    .fps(settings.fps)
    .size(width, height)
    .hd_gif(settings.hd_gif)
    .crf(settings.crf)
    .preset(settings.preset.clone())
    .caption_style(settings.caption_style.clone())
    .build(tool)
    .await?;

    pipeline::generate(tool, &final_settings, &[], caption_lines).await?;

    info!(output = %settings.output_path.display(), "sequence clip generated");
    Ok(())
}

/// Adjacent cues must come straight from the same track with nothing skipped
fn check_contiguous(segments: &[SequenceSegment]) -> ClipResult<()> {
    for pair in segments.windows(2) {
        if pair[1].cue.sequence_id != pair[0].cue.sequence_id + 1 {
            return Err(ClipError::Sequence(format!(
                "Cues {} and {} are not consecutive",
                pair[0].cue.sequence_id, pair[1].cue.sequence_id
            )));
        }
    }
    Ok(())
}

/// Per-segment `(start, end)` windows: each segment runs until the next one
/// starts, the last keeps its own end
fn segment_windows(segments: &[SequenceSegment]) -> Vec<(u64, u64)> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let end = match segments.get(i + 1) {
                Some(next) => next.cue.start_ms,
                None => segment.cue.end_ms,
            };
            (segment.cue.start_ms, end)
        })
        .collect()
}

/// Every window must span forward in time; contiguous `sequence_id`s say
/// nothing about the cue times themselves. Checked before any rendering so
/// a disordered selection fails without wasted tool invocations, and so the
/// combined span arithmetic cannot underflow.
fn check_windows(windows: &[(u64, u64)]) -> ClipResult<()> {
    for (i, &(start_ms, end_ms)) in windows.iter().enumerate() {
        if start_ms >= end_ms {
            return Err(ClipError::Sequence(format!(
                "Segment {i} spans {start_ms}..{end_ms} ms, which is empty or reversed"
            )));
        }
    }
    Ok(())
}

/// Resolves the shared output dimensions for every segment.
///
/// Probes the source at most once, mirroring the sizing rules of the
/// single-clip builder.
async fn resolve_shared_size(
    tool: &FfmpegTool,
    settings: &SequenceSettings,
) -> ClipResult<(u32, u32)> {
    match (settings.resolution, settings.size) {
        (Some(_), Some(_)) => Err(ClipError::Configuration(
            "Set either resolution or width+height, not both".to_string(),
        )),
        (None, None) => Err(ClipError::Configuration(
            "Either resolution or width+height must be set".to_string(),
        )),
        (Some(resolution), None) => {
            if settings.crop {
                Ok((resolution, resolution))
            } else {
                let (src_w, src_h) = tool.probe_dimensions(&settings.input_path).await?;
                Ok(derived_size(resolution, src_w, src_h))
            }
        }
        (None, Some((width, height))) => {
            if settings.crop && width != height {
                return Err(ClipError::Configuration(format!(
                    "Crop requires matching dimensions, got {width}x{height}"
                )));
            }
            Ok((width, height))
        }
    }
}

/// Renders the concat demuxer list file; single quotes in paths are closed,
/// escaped and reopened per the demuxer's quoting rules
fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
