//! Subtitle Cue Model
//!
//! Millisecond-precision subtitle cues, ASS timestamp formatting, and SRT
//! parsing for tracks extracted from a source video.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ClipError;

// =============================================================================
// Cue Model
// =============================================================================

/// A single subtitle or caption cue.
///
/// `sequence_id` is the stable position of the cue within its source track,
/// used to test contiguity of a multi-cue selection. Neighbouring cues are
/// reached through the owning slice (`cues[i - 1]` / `cues[i + 1]`) rather
/// than through references held by the cue itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Start time in milliseconds
    pub start_ms: u64,
    /// End time in milliseconds (always after `start_ms`)
    pub end_ms: u64,
    /// Display lines, top to bottom
    pub text: Vec<String>,
    /// Offset applied only to the start time at render time
    pub delay_ms: i64,
    /// Stable position within the source cue list
    pub sequence_id: usize,
}

impl Subtitle {
    pub fn new(start_ms: u64, end_ms: u64, text: Vec<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text,
            delay_ms: 0,
            sequence_id: 0,
        }
    }

    pub fn with_sequence_id(mut self, sequence_id: usize) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    pub fn with_delay(mut self, delay_ms: i64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

impl PartialOrd for Subtitle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Subtitle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start_ms
            .cmp(&other.start_ms)
            .then(self.end_ms.cmp(&other.end_ms))
    }
}

// =============================================================================
// Timestamp Formatting
// =============================================================================

/// Formats a millisecond offset as an ASS timestamp (`H:MM:SS.CC`).
///
/// Milliseconds round half-up to centiseconds. Hours are unbounded and carry
/// no leading zero. Negative offsets (a cue overlapping the clip boundary)
/// clamp to the earliest representable instant.
pub fn ass_timestamp(ms: i64) -> String {
    let clamped = ms.max(0) as u64;
    let mut cs = (clamped + 5) / 10;

    let hours = cs / 360_000;
    cs %= 360_000;
    let minutes = cs / 6_000;
    cs %= 6_000;
    let seconds = cs / 100;
    cs %= 100;

    format!("{hours}:{minutes:02}:{seconds:02}.{cs:02}")
}

// =============================================================================
// SRT Parsing
// =============================================================================

/// Errors that can occur while parsing an extracted subtitle file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

impl From<ParseError> for ClipError {
    fn from(err: ParseError) -> Self {
        ClipError::Extraction(err.to_string())
    }
}

/// Parses SRT (SubRip) content into an ordered list of cues.
///
/// Cue `sequence_id`s are assigned from file order, starting at zero. The
/// numeric index lines in the file itself are ignored; renumbered or sparse
/// source files are common enough that trusting them would be a bug.
pub fn parse_srt(content: &str) -> Result<Vec<Subtitle>, ParseError> {
    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    while lines.peek().is_some() {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        if lines.peek().is_none() {
            break;
        }

        // Index line, unused
        let _ = lines.next().ok_or(ParseError::UnexpectedEnd)?;

        let timestamp_line = lines.next().ok_or(ParseError::UnexpectedEnd)?;
        let (start_ms, end_ms) = parse_srt_timestamp_line(timestamp_line)?;

        let mut text = Vec::new();
        while let Some(line) = lines.peek() {
            if line.trim().is_empty() {
                break;
            }
            text.push(lines.next().unwrap_or_default().to_string());
        }

        if text.is_empty() {
            return Err(ParseError::InvalidFormat(format!(
                "Cue at {timestamp_line} has no text"
            )));
        }

        let sequence_id = cues.len();
        cues.push(Subtitle::new(start_ms, end_ms, text).with_sequence_id(sequence_id));
    }

    Ok(cues)
}

/// Parses an SRT timestamp line (e.g. `00:00:01,000 --> 00:00:04,000`)
fn parse_srt_timestamp_line(line: &str) -> Result<(u64, u64), ParseError> {
    let (start, end) = line.split_once("-->").ok_or_else(|| {
        ParseError::InvalidFormat(format!("Expected 'start --> end' format: {line}"))
    })?;
    Ok((
        parse_srt_timestamp(start.trim())?,
        parse_srt_timestamp(end.trim())?,
    ))
}

/// Parses an SRT timestamp (`HH:MM:SS,mmm`) into milliseconds
fn parse_srt_timestamp(ts: &str) -> Result<u64, ParseError> {
    let normalized = ts.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() != 3 {
        return Err(ParseError::InvalidTimestamp(ts.to_string()));
    }

    let invalid = || ParseError::InvalidTimestamp(ts.to_string());
    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let (secs, millis) = match parts[2].split_once('.') {
        Some((s, m)) => {
            // Pad/truncate the fractional part to exactly three digits
            let frac = format!("{m:0<3}");
            (
                s.parse::<u64>().map_err(|_| invalid())?,
                frac[..3].parse::<u64>().map_err(|_| invalid())?,
            )
        }
        None => (parts[2].parse::<u64>().map_err(|_| invalid())?, 0),
    };

    Ok(((hours * 60 + minutes) * 60 + secs) * 1000 + millis)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ass_timestamp_zero() {
        assert_eq!(ass_timestamp(0), "0:00:00.00");
    }

    #[test]
    fn test_ass_timestamp_minutes_and_centiseconds() {
        assert_eq!(ass_timestamp(61_230), "0:01:01.23");
    }

    #[test]
    fn test_ass_timestamp_exact_second_boundary() {
        assert_eq!(ass_timestamp(5_000), "0:00:05.00");
    }

    #[test]
    fn test_ass_timestamp_past_one_hour() {
        assert_eq!(ass_timestamp(3_600_000), "1:00:00.00");
        assert_eq!(ass_timestamp(36_061_500), "10:01:01.50");
    }

    #[test]
    fn test_ass_timestamp_rounds_half_up() {
        assert_eq!(ass_timestamp(15), "0:00:00.02");
        assert_eq!(ass_timestamp(14), "0:00:00.01");
    }

    #[test]
    fn test_ass_timestamp_clamps_negative() {
        assert_eq!(ass_timestamp(-250), "0:00:00.00");
    }

    #[test]
    fn test_cues_order_by_start() {
        let mut cues = vec![
            Subtitle::new(5_000, 6_000, vec!["b".into()]),
            Subtitle::new(1_000, 2_000, vec!["a".into()]),
        ];
        cues.sort();
        assert_eq!(cues[0].text, vec!["a"]);
    }

    #[test]
    fn test_parse_srt_basic() {
        let srt = "1\n00:00:01,000 --> 00:00:04,000\nHello World\n\n\
                   2\n00:00:05,500 --> 00:00:08,000\nSecond cue\n";
        let cues = parse_srt(srt).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start_ms, 1_000);
        assert_eq!(cues[0].end_ms, 4_000);
        assert_eq!(cues[0].text, vec!["Hello World"]);
        assert_eq!(cues[1].start_ms, 5_500);
        assert_eq!(cues[1].sequence_id, 1);
    }

    #[test]
    fn test_parse_srt_multiline_cue() {
        let srt = "1\n00:00:00,000 --> 00:00:05,000\nLine one\nLine two\n";
        let cues = parse_srt(srt).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, vec!["Line one", "Line two"]);
    }

    #[test]
    fn test_parse_srt_ignores_file_numbering() {
        let srt = "17\n00:00:01,000 --> 00:00:02,000\nFirst\n\n\
                   42\n00:00:03,000 --> 00:00:04,000\nSecond\n";
        let cues = parse_srt(srt).unwrap();
        assert_eq!(cues[0].sequence_id, 0);
        assert_eq!(cues[1].sequence_id, 1);
    }

    #[test]
    fn test_parse_srt_invalid_timestamp() {
        let srt = "1\n00:00:bogus --> 00:00:04,000\nHello\n";
        let result = parse_srt(srt);
        assert!(matches!(result, Err(ParseError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_parse_srt_timestamp_values() {
        assert_eq!(parse_srt_timestamp("00:00:01,500").unwrap(), 1_500);
        assert_eq!(parse_srt_timestamp("01:30:00,000").unwrap(), 5_400_000);
        assert_eq!(parse_srt_timestamp("00:00:00,100").unwrap(), 100);
    }
}
