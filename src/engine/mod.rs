//! Inference engine module
//!
//! Provides the OpenVINO-backed inference lifecycle:
//! - Batched enqueue → submit → fetch request cycle
//! - Frame to tensor layout conversion
//! - Execution backend abstraction with shared ownership

pub mod backend;
pub mod core;
pub mod frame;
pub mod openvino;

pub use backend::{ExecutionBackend, SharedBackend};
pub use core::{InferenceCore, Phase};
pub use frame::ChannelOrder;
pub use openvino::{load_model, OpenvinoBackend};
