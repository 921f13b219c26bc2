// Copyright @yucwang 2026

pub mod bake;
pub mod cubemap;
pub mod raytrace;
pub mod resolve;
pub mod stage;

/// Fatal pipeline failures. Construction-time ones prevent the session from
/// starting; `DispatchFailure` during the frame loop ends it — per-iteration
/// failures are never retried.
#[derive(Debug)]
pub enum PipelineError {
    BadDispatchSize(String),
    ResourceExhaustion(String),
    DispatchFailure(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::BadDispatchSize(msg) => write!(f, "bad dispatch size: {}", msg),
            PipelineError::ResourceExhaustion(msg) => write!(f, "resource exhaustion: {}", msg),
            PipelineError::DispatchFailure(msg) => write!(f, "dispatch failure: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
