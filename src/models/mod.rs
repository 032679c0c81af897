//! Model descriptions and per-family output decoders.
//!
//! A `ModelDescriptor` is built once, from a snapshot of the loaded
//! network's topology, by the structural rules of its model family; it is
//! immutable afterwards. Output decoding is a closed set of family
//! decoders dispatched by `ModelKind` rather than an open subclass
//! hierarchy.

pub mod face;
pub mod plate;
pub mod vehicle;

use crate::engine::backend::{ExecutionBackend, NetworkTopology, TensorDesc, TensorInfo};
use crate::engine::frame::ChannelOrder;
use crate::error::{InferError, LoadError};
use crate::results::{InferenceResult, Rect};

/// The supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    FaceDetection,
    LicensePlate,
    VehicleAttributes,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::FaceDetection => "face_detection",
            ModelKind::LicensePlate => "license_plate",
            ModelKind::VehicleAttributes => "vehicle_attributes",
        }
    }

    /// Channel order the family's networks were trained on. All three are
    /// OpenVINO model zoo networks trained on BGR frames.
    pub fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Bgr
    }
}

/// Immutable description of a loaded network: tensor names, buffer
/// layouts, batch capacity and family-specific structural constraints.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    kind: ModelKind,
    input_name: String,
    input_desc: TensorDesc,
    seq_input: Option<(String, TensorDesc)>,
    output_names: Vec<String>,
    max_batch_size: usize,
    max_sequence_size: Option<usize>,
    confidence_threshold: f32,
    scale_factor: f32,
}

impl ModelDescriptor {
    /// Apply `kind`'s structural rules to a network topology, adapting the
    /// declared input layouts to `batch_size`.
    ///
    /// Fails when the topology cannot support the family's layout; the
    /// model is then unusable and the error must reach the caller.
    pub fn describe(
        kind: ModelKind,
        topology: &NetworkTopology,
        batch_size: usize,
    ) -> Result<Self, LoadError> {
        assert!(batch_size > 0, "batch size must be at least 1");
        match kind {
            ModelKind::FaceDetection => face::describe(topology, batch_size),
            ModelKind::LicensePlate => plate::describe(topology, batch_size),
            ModelKind::VehicleAttributes => vehicle::describe(topology, batch_size),
        }
    }

    pub(crate) fn assemble(
        kind: ModelKind,
        input_name: String,
        input_desc: TensorDesc,
        seq_input: Option<(String, TensorDesc)>,
        output_names: Vec<String>,
        max_sequence_size: Option<usize>,
    ) -> Self {
        let max_batch_size = input_desc.batch();
        ModelDescriptor {
            kind,
            input_name,
            input_desc,
            seq_input,
            output_names,
            max_batch_size,
            max_sequence_size,
            confidence_threshold: 0.5,
            scale_factor: 1.0,
        }
    }

    /// Copy of this descriptor with another detection confidence
    /// threshold (used by the face detector; ignored elsewhere).
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Copy of this descriptor with another pixel scale factor.
    pub fn with_scale_factor(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn input_desc(&self) -> &TensorDesc {
        &self.input_desc
    }

    /// Auxiliary sequence-indicator input, when the family requires one.
    pub fn seq_input(&self) -> Option<(&str, &TensorDesc)> {
        self.seq_input.as_ref().map(|(n, d)| (n.as_str(), d))
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Declared maximum length of the decoded output sequence, when the
    /// family bounds it (proposal count for detectors, character count
    /// for sequence decoders).
    pub fn max_sequence_size(&self) -> Option<usize> {
        self.max_sequence_size
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }
}

/// Adapt a declared 4-D image input to the requested batch size,
/// validating that the layout is one the frame loader can populate.
pub(crate) fn image_input_desc(
    model: &'static str,
    input: &TensorInfo,
    batch_size: usize,
) -> Result<TensorDesc, LoadError> {
    if input.dims.len() != 4 {
        return Err(LoadError::topology(
            model,
            format!("image input '{}' must be 4-D NCHW, got {:?}", input.name, input.dims),
        ));
    }
    let channels = input.dims[1];
    if channels != 1 && channels != 3 {
        return Err(LoadError::topology(
            model,
            format!("image input '{}' must have 1 or 3 channels, got {channels}", input.name),
        ));
    }
    let (height, width) = (input.dims[2], input.dims[3]);
    if height <= 0 || width <= 0 {
        return Err(LoadError::topology(
            model,
            format!("image input '{}' has dynamic spatial dimensions", input.name),
        ));
    }
    Ok(TensorDesc::new(
        vec![batch_size, channels as usize, height as usize, width as usize],
        input.element,
    ))
}

/// Decode the current output tensors into results, one decoder per model
/// family. `locations` are the placement rectangles recorded at enqueue,
/// indexed by batch slot.
pub(crate) fn decode(
    descriptor: &ModelDescriptor,
    backend: &mut dyn ExecutionBackend,
    locations: &[Rect],
) -> Result<Vec<InferenceResult>, InferError> {
    match descriptor.kind() {
        ModelKind::FaceDetection => face::decode(descriptor, backend, locations),
        ModelKind::LicensePlate => plate::decode(descriptor, backend, locations),
        ModelKind::VehicleAttributes => vehicle::decode(descriptor, backend, locations),
    }
}
