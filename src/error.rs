//! Error taxonomy for model loading and inference.
//!
//! Load-time failures are fatal for the affected model and bubble up to
//! whoever assembles the pipeline. Per-request failures are plain values
//! returned to the immediate caller so a pipeline can drop a cycle and
//! keep running.

use thiserror::Error;

/// Fatal model-load failures. The affected model cannot run; there is no
/// retry path.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The network file could not be read or parsed.
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    /// A tensor name the model family requires is absent from the
    /// compiled topology.
    #[error("model '{model}' is missing required tensor '{tensor}'")]
    MissingTensor {
        model: &'static str,
        tensor: String,
    },

    /// The network's structure cannot be adapted to the requested layout
    /// (batch size, input arity, output shape).
    #[error("model '{model}' has an unsupported topology: {reason}")]
    UnsupportedTopology {
        model: &'static str,
        reason: String,
    },
}

impl LoadError {
    pub(crate) fn model_load(path: impl Into<String>, reason: impl ToString) -> Self {
        LoadError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn topology(model: &'static str, reason: impl Into<String>) -> Self {
        LoadError::UnsupportedTopology {
            model,
            reason: reason.into(),
        }
    }
}

/// Failure reported by an execution backend while accessing buffers or
/// running a request.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ExecutionError {
    reason: String,
}

impl ExecutionError {
    pub fn new(reason: impl ToString) -> Self {
        ExecutionError {
            reason: reason.to_string(),
        }
    }
}

/// Per-request failures. All variants are recoverable at the pipeline
/// level; none of them poison the engine.
#[derive(Debug, Error)]
pub enum InferError {
    /// The enqueue buffer already holds `capacity` frames. The caller must
    /// drain via submit+fetch before enqueueing more.
    #[error("inference queue is full ({capacity} frames)")]
    QueueFull { capacity: usize },

    /// No execution backend has been bound to this engine.
    #[error("no execution backend is bound")]
    NoBackend,

    /// The backend failed to execute the request. The batch's frames are
    /// dropped; they cannot be safely re-enqueued after buffer reuse.
    #[error("backend execution failed: {0}")]
    Execution(#[from] ExecutionError),
}
