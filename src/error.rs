use std::fmt;
use thiserror::Error;

/// Pipeline stage that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compose,
    Clip,
    Scale,
    Triangulate,
    Overlay,
    Surface,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Compose => "compose",
            Stage::Clip => "clip",
            Stage::Scale => "scale",
            Stage::Triangulate => "triangulate",
            Stage::Overlay => "overlay",
            Stage::Surface => "surface",
        };
        f.write_str(name)
    }
}

/// Errors raised by the terrain-to-solid pipeline.
///
/// Every error is fatal to the current run; no stage returns partial output.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: no elevation tiles supplied")]
    NoTiles { stage: Stage },

    #[error("{stage}: grid mismatch in {input}: {reason}")]
    GridMismatch {
        stage: Stage,
        input: String,
        reason: String,
    },

    #[error("compose: {missing} of {total} output cells are not covered by any tile")]
    Coverage { missing: usize, total: usize },

    #[error("clip: boundary contains no cell holding data among {cells} cells")]
    EmptyIntersection { cells: usize },

    #[error("scale: {parameter} must be positive, got {value}")]
    DegenerateScale { parameter: &'static str, value: f64 },

    #[error("{stage}: no valid cells left to triangulate")]
    EmptyGrid { stage: Stage },

    #[error("malformed boundary (polygon {polygon}, ring {ring}): {reason}")]
    MalformedBoundary {
        polygon: usize,
        ring: usize,
        reason: String,
    },
}

impl PipelineError {
    /// The stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::NoTiles { stage }
            | PipelineError::GridMismatch { stage, .. }
            | PipelineError::EmptyGrid { stage } => *stage,
            PipelineError::Coverage { .. } => Stage::Compose,
            PipelineError::EmptyIntersection { .. } | PipelineError::MalformedBoundary { .. } => {
                Stage::Clip
            }
            PipelineError::DegenerateScale { .. } => Stage::Scale,
        }
    }

    pub(crate) fn mismatch(stage: Stage, input: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::GridMismatch {
            stage,
            input: input.into(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
