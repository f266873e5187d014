//! Caption Layout Measurement
//!
//! Determines how much vertical padding a caption block needs before the
//! frame is padded. The caption is burned onto a probe frame with a solid
//! magenta background and the rendered text extent is measured with a
//! per-row pixel scan; guessing from font metrics would miss wrapping and
//! outline effects that only the renderer knows about.

use std::path::Path;

use tracing::debug;

use crate::error::{ClipError, ClipResult};
use crate::ffmpeg::FfmpegTool;
use crate::filters::escape_filter_path;
use crate::style::{TextStyle, ASS_STYLE_FORMAT};
use crate::subtitles::ass_timestamp;

const BYTES_PER_PIXEL: usize = 3;

/// Measures the vertical padding the caption block requires.
///
/// Renders `lines` in `style` onto a probe frame of the clip's output size,
/// measures the rendered text extent, and returns it with the style's
/// vertical margin applied above and below. A caption that renders no pixels
/// still gets the margin band.
pub async fn measure_caption_padding(
    tool: &FfmpegTool,
    style: &TextStyle,
    lines: &[String],
    width: u32,
    height: u32,
    workdir: &Path,
) -> ClipResult<u32> {
    let script_path = workdir.join("caption_probe.ass");
    tokio::fs::write(&script_path, probe_script(style, lines, width, height)).await?;

    let vf = format!("subtitles={}", escape_filter_path(&script_path));
    let frame = tool.render_caption_probe(width, height, &vf).await?;

    let text_height = text_block_height(&frame, width, height)?;
    let padding = text_height + 2 * style.margin_v;
    debug!(text_height, padding, "measured caption extent");
    Ok(padding)
}

/// One-cue ASS document rendering the caption at its real size and position
fn probe_script(style: &TextStyle, lines: &[String], width: u32, height: u32) -> String {
    let text = lines.join(crate::script::LINE_BREAK);
    format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX: {width}\n\
         PlayResY: {height}\n\
         \n\
         {ASS_STYLE_FORMAT}\n\
         {style_line}\n\
         \n\
         [Events]\n\
         Format: Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text\n\
         Dialogue: 0,{start},{end},{name},,{ml},{mr},{mv},,{text}",
        style_line = style.ass_style_line(),
        start = ass_timestamp(0),
        end = ass_timestamp(1_000),
        name = style.name,
        ml = style.margin_l,
        mr = style.margin_r,
        mv = style.margin_v,
    )
}

/// Height in pixels of the span of rows containing rendered text.
///
/// The frame is raw RGB24. Every pixel differing from the top-left
/// background pixel counts as text; the result is the distance from the
/// first such row to the last, inclusive.
fn text_block_height(frame: &[u8], width: u32, height: u32) -> ClipResult<u32> {
    let row_len = width as usize * BYTES_PER_PIXEL;
    let expected = row_len * height as usize;
    if frame.len() != expected {
        return Err(ClipError::Probe(format!(
            "Probe frame has {} bytes, expected {expected} for {width}x{height} rgb24",
            frame.len()
        )));
    }

    let background = &frame[..BYTES_PER_PIXEL];
    let mut first = None;
    let mut last = 0;
    for (row_idx, row) in frame.chunks_exact(row_len).enumerate() {
        let has_text = row
            .chunks_exact(BYTES_PER_PIXEL)
            .any(|pixel| pixel != background);
        if has_text {
            first.get_or_insert(row_idx);
            last = row_idx;
        }
    }

    Ok(match first {
        Some(first) => (last - first + 1) as u32,
        None => 0,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MAGENTA: [u8; 3] = [0xFF, 0x00, 0xFF];
    const WHITE: [u8; 3] = [0xFF, 0xFF, 0xFF];

    fn frame(width: u32, height: u32, text_rows: &[usize]) -> Vec<u8> {
        let mut buf = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height as usize {
            for col in 0..width as usize {
                // Put text pixels in the middle third of marked rows
                let text = text_rows.contains(&row)
                    && col > width as usize / 3
                    && col < 2 * width as usize / 3;
                buf.extend_from_slice(if text { &WHITE } else { &MAGENTA });
            }
        }
        buf
    }

    #[test]
    fn test_text_block_height_span_is_inclusive() {
        let frame = frame(12, 10, &[2, 3, 5]);
        // Rows 2..=5 span four rows even though row 4 is blank
        assert_eq!(text_block_height(&frame, 12, 10).unwrap(), 4);
    }

    #[test]
    fn test_text_block_height_single_row() {
        let frame = frame(12, 10, &[7]);
        assert_eq!(text_block_height(&frame, 12, 10).unwrap(), 1);
    }

    #[test]
    fn test_text_block_height_blank_frame() {
        let frame = frame(12, 10, &[]);
        assert_eq!(text_block_height(&frame, 12, 10).unwrap(), 0);
    }

    #[test]
    fn test_text_block_height_rejects_short_frame() {
        let result = text_block_height(&[0u8; 10], 12, 10);
        assert!(matches!(result, Err(ClipError::Probe(_))));
    }

    #[test]
    fn test_probe_script_contains_caption_text() {
        let style = TextStyle::caption_default(24);
        let doc = probe_script(&style, &["hello".into(), "world".into()], 568, 320);
        assert!(doc.contains("PlayResX: 568"));
        assert!(doc.contains("PlayResY: 320"));
        assert!(doc.contains(r"hello\Nworld"));
        assert!(doc.contains("Style: caption_style,"));
    }
}
