//! Vehicle and face analytics inference library
//!
//! Sits between an OpenVINO execution backend and per-model result
//! consumers: frames go in, are packed into the network's batched tensor
//! layout, executed, and come back out as typed results pushed to
//! observers.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod results;

pub use config::Config;
pub use engine::{InferenceCore, OpenvinoBackend};
pub use error::{ExecutionError, InferError, LoadError};
pub use models::{ModelDescriptor, ModelKind};
pub use output::{LatestObserver, LogObserver, ResultObserver};
pub use results::{InferenceResult, Rect, ResultPayload};
