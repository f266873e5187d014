//! ASS Markup Script Builder
//!
//! Turns subtitle and caption cues into the styled-subtitle document the
//! renderer burns into the clip: a script-info block whose play resolution
//! matches the final (padded) frame, one style line per style in use, and
//! one dialogue line per cue with times rebased onto the clip.

use crate::settings::ClipSettings;
use crate::style::{TextStyle, ASS_STYLE_FORMAT};
use crate::subtitles::{ass_timestamp, Subtitle};

const EVENT_FORMAT: &str = "[Events]\n\
    Format: Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text";

/// Forced line break between display lines of one cue
pub const LINE_BREAK: &str = r"\N";

// =============================================================================
// Boomerang Time Reflection
// =============================================================================

/// Produces the time-reflected copies of `cues` for the mirrored half of a
/// boomerang clip.
///
/// A cue at relative times `(rel_s, rel_e)` within a clip of duration `D`
/// reappears at `(2D − rel_e, 2D − rel_s)`. Both the originals and the
/// mirrored copies belong in the markup script.
pub fn mirrored_cues(cues: &[Subtitle], clip_start_ms: u64, duration_ms: u64) -> Vec<Subtitle> {
    cues.iter()
        .map(|cue| {
            let rel_s = cue.start_ms.saturating_sub(clip_start_ms);
            let rel_e = cue.end_ms.saturating_sub(clip_start_ms);
            let doubled = 2 * duration_ms;
            Subtitle {
                start_ms: clip_start_ms + doubled.saturating_sub(rel_e),
                end_ms: clip_start_ms + doubled.saturating_sub(rel_s),
                text: cue.text.clone(),
                delay_ms: cue.delay_ms,
                sequence_id: cue.sequence_id,
            }
        })
        .collect()
}

/// Stretches a caption cue across the doubled duration of a boomerang clip
pub fn boomerang_caption(caption: &Subtitle, clip_start_ms: u64) -> Subtitle {
    let rel_e = caption.end_ms.saturating_sub(clip_start_ms);
    Subtitle {
        end_ms: clip_start_ms + 2 * rel_e,
        ..caption.clone()
    }
}

// =============================================================================
// Document Assembly
// =============================================================================

/// Builds the complete ASS document for a clip.
///
/// `padding` is the measured caption padding already added to the frame; the
/// script's `PlayResY` covers the padded height so caption placement lands in
/// the reserved band. Overlapping cues are all emitted — the renderer
/// composites them.
pub fn build_ass(
    settings: &ClipSettings,
    cues: &[Subtitle],
    caption: Option<&Subtitle>,
    padding: u32,
) -> String {
    let mut sections = vec![
        "[Script Info]".to_string(),
        "ScriptType: v4.00+".to_string(),
        format!("PlayResX: {}", settings.width),
        format!("PlayResY: {}", settings.height + padding),
        String::new(),
        ASS_STYLE_FORMAT.to_string(),
    ];

    if !cues.is_empty() {
        sections.push(settings.subtitle_style.ass_style_line());
    }
    if caption.is_some() {
        sections.push(settings.caption_style.ass_style_line());
    }

    sections.push(String::new());
    sections.push(EVENT_FORMAT.to_string());

    if !cues.is_empty() {
        sections.push(dialogues(cues, settings.start_ms, &settings.subtitle_style));
    }
    if let Some(caption) = caption {
        sections.push(dialogues(
            std::slice::from_ref(caption),
            settings.start_ms,
            &settings.caption_style,
        ));
    }

    sections.join("\n")
}

/// One dialogue line per cue, sorted by start time, times rebased onto the
/// clip. The delay offset applies only to the start.
fn dialogues(cues: &[Subtitle], clip_start_ms: u64, style: &TextStyle) -> String {
    let mut ordered: Vec<&Subtitle> = cues.iter().collect();
    ordered.sort();

    ordered
        .iter()
        .map(|cue| {
            let start = ass_timestamp(cue.start_ms as i64 + cue.delay_ms - clip_start_ms as i64);
            let end = ass_timestamp(cue.end_ms as i64 - clip_start_ms as i64);
            let text = cue.text.join(LINE_BREAK);
            format!(
                "Dialogue: 0,{start},{end},{},,{},{},{},,{text}",
                style.name, style.margin_l, style.margin_r, style.margin_v
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Counts the dialogue lines in an ASS document
pub fn dialogue_count(doc: &str) -> usize {
    doc.lines()
        .filter(|line| line.starts_with("Dialogue:"))
        .count()
}

// =============================================================================
// Tests
// =============================================================================
