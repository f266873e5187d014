//! Clip Generation Pipeline
//!
//! Orchestrates one generation request end to end: trim the source, derive
//! the cue set, measure caption padding, write the markup script, run the
//! filter pass, and optionally produce an MP4 companion. Intermediate files
//! live in a scratch directory that is removed when the run finishes,
//! succeed or fail.

use std::path::Path;

use tracing::{debug, info};

use crate::caption::measure_caption_padding;
use crate::error::ClipResult;
use crate::ffmpeg::FfmpegTool;
use crate::filters::{build_stages, render_graph, FilterStage};
use crate::script::{boomerang_caption, build_ass, mirrored_cues};
use crate::settings::ClipSettings;
use crate::subtitles::Subtitle;

/// Generates a clip from a validated request.
///
/// `cues` carry source-timeline times overlapping the `[start, end]` window;
/// `caption_lines`, when given, become a caption displayed for the whole
/// clip above the video.
pub async fn generate(
    tool: &FfmpegTool,
    settings: &ClipSettings,
    cues: &[Subtitle],
    caption_lines: Option<&[String]>,
) -> ClipResult<()> {
    info!(
        input = %settings.input_path.display(),
        output = %settings.output_path.display(),
        start_ms = settings.start_ms,
        end_ms = settings.end_ms,
        "generating clip"
    );

    tool.trim_clip(settings).await?;

    let workdir = tempfile::tempdir()?;
    let (ass_path, caption_padding) =
        prepare_script(tool, settings, cues, caption_lines, workdir.path()).await?;

    let stages = build_stages(settings, ass_path.as_deref(), caption_padding);
    let graph = render_graph(&stages);
    debug!(%graph, "running filter pass");
    tool.run_filter(&settings.clip_path, &settings.output_path, &graph)
        .await?;

    if settings.mp4_copy {
        generate_mp4_companion(tool, settings, &stages).await?;
    }

    info!(output = %settings.output_path.display(), "clip generated");
    Ok(())
}

/// Builds the markup script and measures caption padding.
///
/// Returns the script path (when there is anything to burn in) and the
/// measured padding (when a caption is present). Boomerang requests get the
/// time-reflected cue copies and a caption stretched across the doubled
/// duration.
async fn prepare_script(
    tool: &FfmpegTool,
    settings: &ClipSettings,
    cues: &[Subtitle],
    caption_lines: Option<&[String]>,
    workdir: &Path,
) -> ClipResult<(Option<std::path::PathBuf>, Option<u32>)> {
    let mut all_cues = cues.to_vec();
    if settings.boomerang {
        all_cues.extend(mirrored_cues(cues, settings.start_ms, settings.duration_ms()));
    }

    let caption = caption_lines.map(|lines| {
        let cue = Subtitle::new(settings.start_ms, settings.end_ms, lines.to_vec());
        if settings.boomerang {
            boomerang_caption(&cue, settings.start_ms)
        } else {
            cue
        }
    });

    let caption_padding = match caption_lines {
        Some(lines) => Some(
            measure_caption_padding(
                tool,
                &settings.caption_style,
                lines,
                settings.width,
                settings.height,
                workdir,
            )
            .await?,
        ),
        None => None,
    };

    if all_cues.is_empty() && caption.is_none() {
        return Ok((None, None));
    }

    let doc = build_ass(
        settings,
        &all_cues,
        caption.as_ref(),
        caption_padding.unwrap_or(0),
    );
    let ass_path = workdir.join("sub.ass");
    tokio::fs::write(&ass_path, doc).await?;
    debug!(script = %ass_path.display(), cue_count = all_cues.len(), "wrote markup script");

    Ok((Some(ass_path), caption_padding))
}

/// Runs a second filter pass producing a burned-in MP4 next to the output.
///
/// Reuses the stage list minus palette quantization, which only applies to
/// GIF encoding. The settings builder rejects a companion for MP4 output,
/// so the companion path never collides with the output path.
async fn generate_mp4_companion(
    tool: &FfmpegTool,
    settings: &ClipSettings,
    stages: &[FilterStage],
) -> ClipResult<()> {
    let mp4_path = settings.output_path.with_extension("mp4");
    let mp4_stages: Vec<FilterStage> = stages
        .iter()
        .filter(|stage| !matches!(stage, FilterStage::Palette { .. }))
        .cloned()
        .collect();
    let graph = render_graph(&mp4_stages);
    debug!(%graph, output = %mp4_path.display(), "running companion filter pass");
    tool.run_filter(&settings.clip_path, &mp4_path, &graph).await
}
