//! Subtitle Extraction Facade
//!
//! Pulls a subtitle track out of a video container and parses it into cues.
//! The extracted SRT only exists inside a scoped working directory; callers
//! get the parsed cue list.

use std::path::Path;

use tracing::info;

use crate::error::{ClipError, ClipResult};
use crate::ffmpeg::FfmpegTool;
use crate::subtitles::{parse_srt, Subtitle};

/// Extracts the first subtitle track of `video` into a cue list
pub async fn extract_subs(tool: &FfmpegTool, video: &Path) -> ClipResult<Vec<Subtitle>> {
    extract_track(tool, video, 0).await
}

/// Extracts the best subtitle track for the given language priority list.
///
/// `languages` are ISO 639 tags in order of preference. Closed-caption and
/// hearing-impaired tracks are skipped unless `include_cc`.
pub async fn extract_subs_by_language(
    tool: &FfmpegTool,
    video: &Path,
    languages: &[&str],
    include_cc: bool,
) -> ClipResult<Vec<Subtitle>> {
    let track = tool
        .subtitle_track_by_language(video, languages, include_cc)
        .await?;
    extract_track(tool, video, track).await
}

async fn extract_track(tool: &FfmpegTool, video: &Path, track: usize) -> ClipResult<Vec<Subtitle>> {
    let workdir = tempfile::tempdir()?;
    let srt_path = workdir.path().join("subs.srt");

    tool.extract_subtitle_track(video, track, &srt_path).await?;

    let content = tokio::fs::read_to_string(&srt_path).await?;
    let cues = parse_srt(&content)?;
    if cues.is_empty() {
        return Err(ClipError::Extraction(format!(
            "Subtitle track {track} of {} contains no cues",
            video.display()
        )));
    }

    info!(
        video = %video.display(),
        track,
        cue_count = cues.len(),
        "extracted subtitle track"
    );
    Ok(cues)
}
