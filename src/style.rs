//! Text Style Model
//!
//! Named ASS rendering styles for subtitles and captions.
//! See <http://www.tcax.org/docs/ass-specs.htm> for the field layout.

use serde::{Deserialize, Serialize};

/// Format line preceding the style definitions in an ASS document
pub const ASS_STYLE_FORMAT: &str = "[V4+ Styles]\n\
    Format: Name,Fontname,Fontsize,PrimaryColour,SecondaryColour,\
    OutlineColour,BackColour,Bold,Italic,Underline,StrikeOut,\
    ScaleX,ScaleY,Spacing,Angle,BorderStyle,Outline,Shadow,\
    Alignment,MarginL,MarginR,MarginV,Encoding";

/// A named rendering style mapped onto an ASS `Style:` line.
///
/// Colors use the ASS `&HAABBGGRR` notation. The outline width defaults to
/// one twentieth of the font size unless overridden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Style name referenced by dialogue lines
    pub name: String,
    /// Font family name
    pub font: String,
    pub font_size: u32,
    pub font_color: String,
    /// Explicit outline width; `None` derives from the font size
    pub outline_width: Option<u32>,
    pub outline_color: String,
    pub bold: bool,
    pub italic: bool,
    pub shadow: bool,
    /// ASS numpad alignment code (2 = bottom center, 7 = top left)
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::subtitle_default()
    }
}

impl TextStyle {
    /// Default style for burned-in subtitles (white, bottom center)
    pub fn subtitle_default() -> Self {
        Self {
            name: "subtitle_style".to_string(),
            font: "Arial".to_string(),
            font_size: 20,
            font_color: "&H00FFFFFF".to_string(),
            outline_width: None,
            outline_color: "&H00000000".to_string(),
            bold: false,
            italic: false,
            shadow: false,
            alignment: 2,
            margin_l: 0,
            margin_r: 0,
            margin_v: 10,
        }
    }

    /// Default style for the caption block above the video (top left)
    pub fn caption_default(font_size: u32) -> Self {
        Self {
            name: "caption_style".to_string(),
            font_size,
            alignment: 7,
            margin_l: 15,
            margin_r: 0,
            margin_v: 10,
            ..Self::subtitle_default()
        }
    }

    /// Effective outline width in pixels
    pub fn outline_width(&self) -> u32 {
        self.outline_width.unwrap_or(self.font_size / 20)
    }

    /// Renders the `Style:` line for this style
    pub fn ass_style_line(&self) -> String {
        format!(
            "Style: {},{},{},{},&H00000000,{},&H00000000,{},{},0,0,\
             100,100,0,0,1,{},{},{},{},{},{},1",
            self.name,
            self.font,
            self.font_size,
            self.font_color,
            self.outline_color,
            self.bold as u8,
            self.italic as u8,
            self.outline_width(),
            self.shadow as u8,
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_width_derives_from_font_size() {
        let style = TextStyle {
            font_size: 40,
            ..TextStyle::subtitle_default()
        };
        assert_eq!(style.outline_width(), 2);
    }

    #[test]
    fn test_outline_width_explicit_override() {
        let style = TextStyle {
            font_size: 40,
            outline_width: Some(5),
            ..TextStyle::subtitle_default()
        };
        assert_eq!(style.outline_width(), 5);
    }

    #[test]
    fn test_subtitle_default_is_bottom_center() {
        let style = TextStyle::subtitle_default();
        assert_eq!(style.alignment, 2);
        assert_eq!(style.name, "subtitle_style");
    }

    #[test]
    fn test_caption_default_is_top_left() {
        let style = TextStyle::caption_default(24);
        assert_eq!(style.alignment, 7);
        assert_eq!(style.font_size, 24);
        assert_eq!(style.margin_l, 15);
    }

    #[test]
    fn test_ass_style_line_layout() {
        let style = TextStyle::subtitle_default();
        let line = style.ass_style_line();
        assert!(line.starts_with("Style: subtitle_style,Arial,20,&H00FFFFFF,"));
        assert!(line.ends_with(",2,0,0,10,1"));
        // 23 fields total per the V4+ format line
        assert_eq!(line.trim_start_matches("Style: ").split(',').count(), 23);
    }
}
