//! External Tool Wrapper
//!
//! Invokes ffmpeg/ffprobe-compatible binaries for probing, trimming,
//! subtitle extraction, filtering and concatenation. Every call site returns
//! a result; failures carry the reconstructed command line so a failing run
//! can be replayed from a shell.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ClipError, ClipResult};
use crate::settings::ClipSettings;

/// Default per-invocation deadline
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Title-tag substrings marking closed-caption / hearing-impaired tracks
const CC_MARKERS: [&str; 3] = ["sdh", "cc", "hearing impaired"];

/// Solid background color for caption probe frames; magenta is unlikely to
/// collide with rendered text or outlines
const PROBE_BACKGROUND: &str = "0xFF00FF";

// =============================================================================
// Tool Handle
// =============================================================================

/// Handle to an ffmpeg/ffprobe pair.
///
/// Invocations are sequential, blocking calls bounded by a per-invocation
/// timeout; expiry is fatal for the running pipeline and left to the caller
/// to retry.
#[derive(Clone, Debug)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one invocation to completion and returns its stdout
    async fn run(&self, program: &Path, args: &[String]) -> ClipResult<Vec<u8>> {
        let command = render_command(program, args);
        debug!(%command, "invoking external tool");

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(program)
                .args(args)
                .stdin(std::process::Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ClipError::Timeout {
            command: command.clone(),
        })?;

        let output = result.map_err(|err| ClipError::ToolInvocation {
            command: command.clone(),
            message: format!("failed to spawn: {err}"),
        })?;

        if !output.status.success() {
            return Err(ClipError::ToolInvocation {
                command,
                message: stderr_tail(&output.stderr),
            });
        }

        Ok(output.stdout)
    }

    // -------------------------------------------------------------------------
    // Probing
    // -------------------------------------------------------------------------

    /// Queries the native width/height of the first video stream
    pub async fn probe_dimensions(&self, input: &Path) -> ClipResult<(u32, u32)> {
        let args = string_args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
            &input.to_string_lossy(),
        ]);
        let stdout = self.run(&self.ffprobe, &args).await?;
        let text = String::from_utf8_lossy(&stdout);

        let line = text.trim();
        let (w, h) = line
            .split_once(',')
            .ok_or_else(|| ClipError::Probe(format!("Unexpected dimension output: '{line}'")))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| ClipError::Probe(format!("Unparseable width: '{w}'")))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| ClipError::Probe(format!("Unparseable height: '{h}'")))?;
        Ok((width, height))
    }

    /// Lists all streams with the metadata relevant to track selection
    pub async fn probe_streams(&self, input: &Path) -> ClipResult<Vec<StreamInfo>> {
        let args = string_args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            &input.to_string_lossy(),
        ]);
        let stdout = self.run(&self.ffprobe, &args).await?;
        parse_streams(&String::from_utf8_lossy(&stdout))
    }

    /// Whether the file contains at least one video stream.
    ///
    /// A stream copy across an incompatible container boundary can silently
    /// drop video, so trim results are verified rather than trusted.
    pub async fn has_video_stream(&self, input: &Path) -> ClipResult<bool> {
        let streams = self.probe_streams(input).await?;
        Ok(streams.iter().any(|s| s.codec_type == "video"))
    }

    /// Resolves a subtitle track index by language priority
    pub async fn subtitle_track_by_language(
        &self,
        input: &Path,
        languages: &[&str],
        include_cc: bool,
    ) -> ClipResult<usize> {
        let streams = self.probe_streams(input).await?;
        select_subtitle_track(&streams, languages, include_cc)
    }

    // -------------------------------------------------------------------------
    // Extraction and Trimming
    // -------------------------------------------------------------------------

    /// Extracts a subtitle track to an SRT file on disk.
    ///
    /// The track index is relative to subtitle streams only. The output file
    /// must exist afterwards; a clean exit without one still counts as a
    /// failed extraction.
    pub async fn extract_subtitle_track(
        &self,
        input: &Path,
        track: usize,
        output: &Path,
    ) -> ClipResult<()> {
        let args = string_args([
            "-y",
            "-i",
            &input.to_string_lossy(),
            "-map",
            &format!("0:s:{track}"),
            "-an",
            "-vn",
            &output.to_string_lossy(),
        ]);
        self.run(&self.ffmpeg, &args).await?;

        if !output.exists() {
            return Err(ClipError::Extraction(format!(
                "Extraction of track {track} from {} produced no output file",
                input.display()
            )));
        }
        Ok(())
    }

    /// Extracts `[start, end]` from the source into the intermediate clip.
    ///
    /// Stream copy first; if the result lacks a video stream, the trim is
    /// re-run with re-encoding using the configured crf/preset.
    pub async fn trim_clip(&self, settings: &ClipSettings) -> ClipResult<()> {
        let input = settings.input_path.to_string_lossy().to_string();
        let clip = settings.clip_path.to_string_lossy().to_string();
        let start = format!("{:.3}", settings.start_s());
        let duration = format!("{:.3}", settings.duration_s());

        let copy_args = string_args([
            "-y", "-i", &input, "-ss", &start, "-t", &duration, "-c", "copy", &clip,
        ]);
        self.run(&self.ffmpeg, &copy_args).await?;

        if !self.has_video_stream(&settings.clip_path).await? {
            warn!(
                clip = %settings.clip_path.display(),
                "stream copy dropped the video stream, re-encoding trim"
            );
            let encode_args = string_args([
                "-y",
                "-i",
                &input,
                "-ss",
                &start,
                "-t",
                &duration,
                "-c:v",
                "libx265",
                "-crf",
                &settings.crf.to_string(),
                "-preset",
                &settings.preset,
                &clip,
            ]);
            self.run(&self.ffmpeg, &encode_args).await?;
        }

        if !settings.clip_path.exists() {
            return Err(ClipError::MissingArtifact(settings.clip_path.clone()));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Filtering and Concatenation
    // -------------------------------------------------------------------------

    /// Applies a filter graph to `input`, producing `output`
    pub async fn run_filter(&self, input: &Path, output: &Path, graph: &str) -> ClipResult<()> {
        let args = string_args([
            "-y",
            "-i",
            &input.to_string_lossy(),
            "-filter_complex",
            graph,
            "-loop",
            "0",
            &output.to_string_lossy(),
        ]);
        self.run(&self.ffmpeg, &args).await?;

        if !output.exists() {
            return Err(ClipError::MissingArtifact(output.to_path_buf()));
        }
        Ok(())
    }

    /// Renders one probe frame over a solid magenta source and returns the
    /// raw RGB24 pixels.
    ///
    /// Used by caption layout measurement; the distinctive background makes
    /// any rendered text detectable by a per-row pixel scan.
    pub async fn render_caption_probe(
        &self,
        width: u32,
        height: u32,
        vf: &str,
    ) -> ClipResult<Vec<u8>> {
        let args = string_args([
            "-y",
            "-f",
            "lavfi",
            "-i",
            &probe_source(width, height),
            "-vf",
            vf,
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ]);
        self.run(&self.ffmpeg, &args).await
    }

    /// Stream-copy concatenation of the files named in a concat list
    pub async fn concat_copy(&self, list_file: &Path, output: &Path) -> ClipResult<()> {
        let args = string_args([
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &list_file.to_string_lossy(),
            "-c",
            "copy",
            &output.to_string_lossy(),
        ]);
        self.run(&self.ffmpeg, &args).await?;

        if !output.exists() {
            return Err(ClipError::MissingArtifact(output.to_path_buf()));
        }
        Ok(())
    }
}

// =============================================================================
// Stream Metadata
// =============================================================================

/// Metadata for one container stream, as reported by the probe tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    /// Absolute stream index within the container
    pub index: usize,
    /// Codec type tag ("video", "audio", "subtitle", ...)
    pub codec_type: String,
    /// ISO 639 language tag, if present
    pub language: Option<String>,
    /// Human-readable title tag, if present
    pub title: Option<String>,
}

/// Parses ffprobe `-show_streams` JSON output
fn parse_streams(json_str: &str) -> ClipResult<Vec<StreamInfo>> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|err| ClipError::Probe(format!("Failed to parse probe output: {err}")))?;

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| ClipError::Probe("Probe output has no stream list".to_string()))?;

    Ok(streams
        .iter()
        .enumerate()
        .map(|(position, stream)| {
            let tags = stream.get("tags");
            let tag = |name: &str| {
                tags.and_then(|t| t.get(name))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };
            StreamInfo {
                index: stream
                    .get("index")
                    .and_then(|i| i.as_u64())
                    .unwrap_or(position as u64) as usize,
                codec_type: stream
                    .get("codec_type")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                language: tag("language"),
                title: tag("title"),
            }
        })
        .collect())
}

/// Selects a subtitle track by language priority.
///
/// Walks `languages` in priority order and picks the first subtitle stream
/// with a matching language tag whose title does not look like a
/// closed-caption / hearing-impaired track (unless `include_cc`). The
/// returned index is relative to subtitle streams only: the tool's
/// `0:s:<n>` mapping counts subtitle tracks, not container streams.
pub fn select_subtitle_track(
    streams: &[StreamInfo],
    languages: &[&str],
    include_cc: bool,
) -> ClipResult<usize> {
    let subtitle_streams: Vec<&StreamInfo> = streams
        .iter()
        .filter(|s| s.codec_type == "subtitle")
        .collect();
    if subtitle_streams.is_empty() {
        return Err(ClipError::Extraction(
            "No subtitle streams found".to_string(),
        ));
    }

    let non_subtitle_count = streams.len() - subtitle_streams.len();

    for language in languages {
        for stream in &subtitle_streams {
            if stream.language.as_deref() != Some(*language) {
                continue;
            }
            let title = stream.title.as_deref().unwrap_or("").to_lowercase();
            if include_cc || !CC_MARKERS.iter().any(|marker| title.contains(marker)) {
                return Ok(stream.index.saturating_sub(non_subtitle_count));
            }
        }
    }

    Err(ClipError::Extraction(format!(
        "No subtitle stream exists for any of the requested languages: {}",
        languages.join(",")
    )))
}

// =============================================================================
// Command Rendering
// =============================================================================

/// lavfi source specification for a caption probe frame
fn probe_source(width: u32, height: u32) -> String {
    format!("color={PROBE_BACKGROUND}:size={width}x{height}:duration=1")
}

fn string_args<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.into_iter().map(str::to_string).collect()
}

/// Reconstructs the full command line, quoting arguments that a shell would
/// otherwise split or expand. Makes failures copy-pasteable for diagnosis.
fn render_command(program: &Path, args: &[String]) -> String {
    let mut parts = vec![shell_quote(&program.to_string_lossy())];
    parts.extend(args.iter().map(|arg| shell_quote(arg)));
    parts.join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Last non-empty stderr lines, newest last; enough context to diagnose
/// without dumping the full transcode log into the error value.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let mut tail: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .rev()
        .take(4)
        .collect();
    tail.reverse();
    if tail.is_empty() {
        "process exited with an error".to_string()
    } else {
        tail.join(" | ")
    }
}

// =============================================================================
// Tests
// =============================================================================
