//! Subclip Clip Generation Engine
//!
//! Turns subtitle cues from a source video into short shareable clips
//! (GIF/WebP/MP4) with the subtitles burned in: trim the source, build an
//! ASS markup script, run an ordered filter pass, and optionally stitch a
//! run of consecutive cues into one seamless sequence clip.
//!
//! The engine shells out to ffmpeg/ffprobe; binaries are configured through
//! [`FfmpegTool`]. Logging uses `tracing`; the library installs no
//! subscriber.

pub mod caption;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod filters;
pub mod pipeline;
pub mod script;
pub mod sequence;
pub mod settings;
pub mod style;
pub mod subtitles;

pub use error::{ClipError, ClipResult};
pub use ffmpeg::FfmpegTool;
pub use sequence::{SequenceSegment, SequenceSettings};
pub use settings::{ClipSettings, VideoFormat};
pub use style::TextStyle;
pub use subtitles::Subtitle;
