//! Phase-fatal failures of a pipeline run.
//!
//! Per-item download/upload failures never show up here; they are recorded in a
//! [`crate::batch::BatchOutcome`] and only turn into [`PipelineError::TooManyFailures`]
//! when a failure policy threshold is configured and crossed.

use std::path::PathBuf;

use crate::contract::SynthesisError;
use crate::pipeline::Phase;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not prepare scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no source files survived the download phase")]
    NothingToSynthesize,

    #[error("font synthesis failed: {0}")]
    SynthesisFailed(#[from] SynthesisError),

    #[error("generated stylesheet yielded no icon map entries")]
    EmptyIconMap,

    #[error("could not write icon map {path}: {source}")]
    MapWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} of {total} items failed during {phase:?}, above the allowed ratio {allowed}")]
    TooManyFailures {
        phase: Phase,
        failed: usize,
        total: usize,
        allowed: f64,
    },

    #[error("could not reclaim scratch entry {path}: {source}")]
    ReclaimFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Phase in which the run entered `Failed`.
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Scratch { .. } => Phase::Download,
            PipelineError::NothingToSynthesize | PipelineError::SynthesisFailed(_) => {
                Phase::Synthesize
            }
            PipelineError::EmptyIconMap | PipelineError::MapWriteFailed { .. } => {
                Phase::ExtractMap
            }
            PipelineError::TooManyFailures { phase, .. } => *phase,
            PipelineError::ReclaimFailed { .. } => Phase::Reclaim,
        }
    }
}
