//! Filter graph compiler.
//!
//! Turns an ordered clip list plus output geometry into a typed list of
//! filter stages. Text for FFmpeg's `-filter_complex` is only produced by
//! [`FilterGraph::to_filter_complex`], at the invocation boundary.
//!
//! For two clips at 1920x1080@30 the serialized graph is:
//!
//! ```text
//! [0:v]trim=start=0:end=5,setpts=PTS-STARTPTS[v0];
//! [0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS[a0];
//! [0:v]trim=start=10:end=12,setpts=PTS-STARTPTS[v1];
//! [0:a]atrim=start=10:end=12,asetpts=PTS-STARTPTS[a1];
//! [v0][v1]concat=n=2:v=1:a=0[vout];
//! [a0][a1]concat=n=2:v=0:a=1[aout];
//! [vout]scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,fps=30[vfinal]
//! ```
//! (joined without newlines). Bounds are written exactly as given, in the
//! shortest decimal form that reads back to the same `f64`.

use std::fmt;

use vcut_models::{ClipSpec, OutputGeometry};

use crate::error::{MediaError, MediaResult};

/// Label of the final video terminal.
pub const VIDEO_OUTPUT: &str = "vfinal";

/// Label of the final audio terminal (concat output, no further filtering).
pub const AUDIO_OUTPUT: &str = "aout";

/// Label of the concatenated video before scaling.
const CONCAT_VIDEO: &str = "vout";

/// One stage of the filter program.
#[derive(Debug, Clone, PartialEq)]
enum FilterStage {
    /// Video and audio trim of clip `index`, each reset to a zero timestamp origin.
    TrimPair { index: usize, start: f64, end: f64 },
    /// Join all trimmed segments in order. Video and audio are concatenated
    /// by two separate filters since their stream-count signatures differ.
    Concat { segments: usize },
    /// Fit inside the target box, pad to exact size centered, normalize fps.
    ScalePad { width: u32, height: u32, fps: u32 },
}

impl FilterStage {
    fn write_to(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FilterStage::TrimPair { index, start, end } => write!(
                f,
                "[0:v]trim=start={start}:end={end},setpts=PTS-STARTPTS[v{index}];\
                 [0:a]atrim=start={start}:end={end},asetpts=PTS-STARTPTS[a{index}]"
            ),
            FilterStage::Concat { segments } => {
                for i in 0..segments {
                    write!(f, "[v{}]", i)?;
                }
                write!(f, "concat=n={}:v=1:a=0[{}];", segments, CONCAT_VIDEO)?;
                for i in 0..segments {
                    write!(f, "[a{}]", i)?;
                }
                write!(f, "concat=n={}:v=0:a=1[{}]", segments, AUDIO_OUTPUT)
            }
            FilterStage::ScalePad { width, height, fps } => write!(
                f,
                "[{CONCAT_VIDEO}]scale={width}:{height}:force_original_aspect_ratio=decrease,\
                 pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,fps={fps}[{VIDEO_OUTPUT}]"
            ),
        }
    }
}

/// A compiled, linear filter program.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    stages: Vec<FilterStage>,
}

impl FilterGraph {
    /// Number of trim pairs (one per clip).
    pub fn trim_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| matches!(s, FilterStage::TrimPair { .. }))
            .count()
    }

    /// `-map` target for the video terminal.
    pub fn video_output(&self) -> String {
        format!("[{}]", VIDEO_OUTPUT)
    }

    /// `-map` target for the audio terminal.
    pub fn audio_output(&self) -> String {
        format!("[{}]", AUDIO_OUTPUT)
    }

    /// Serialize to FFmpeg's `-filter_complex` syntax.
    pub fn to_filter_complex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            stage.write_to(f)?;
        }
        Ok(())
    }
}

/// Compile clips and geometry into a filter program.
///
/// Every clip is validated before any stage is built, so an invalid clip
/// anywhere in the list yields an error and no graph.
pub fn compile(clips: &[ClipSpec], geometry: &OutputGeometry) -> MediaResult<FilterGraph> {
    if clips.is_empty() {
        return Err(MediaError::NoClips);
    }
    for (index, clip) in clips.iter().enumerate() {
        clip.validate(index)?;
    }

    let mut stages = Vec::with_capacity(clips.len() + 2);
    stages.extend(
        clips
            .iter()
            .enumerate()
            .map(|(index, clip)| FilterStage::TrimPair {
                index,
                start: clip.start,
                end: clip.end,
            }),
    );
    stages.push(FilterStage::Concat {
        segments: clips.len(),
    });
    stages.push(FilterStage::ScalePad {
        width: geometry.width,
        height: geometry.height,
        fps: geometry.fps,
    });

    Ok(FilterGraph { stages })
}
