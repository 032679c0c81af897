//! OpenVINO execution backend.
//!
//! Owns one compiled network and one inference request. Input tensors are
//! allocated once, at the batch shapes the model description asked for,
//! and bound to the request on every execute.

use std::collections::HashMap;
use std::time::Instant;

use openvino::{CompiledModel, Core, ElementType, InferRequest, Model, Shape, Tensor};
use tracing::info;

use crate::engine::backend::{
    ElementKind, ExecutionBackend, InputSlot, NetworkTopology, OutputTensor, SharedBackend,
    TensorDesc, TensorInfo,
};
use crate::error::{ExecutionError, LoadError};
use crate::models::{ModelDescriptor, ModelKind};

/// Ports probed per direction when snapshotting a topology. Far above
/// anything the supported model families declare.
const MAX_PORTS: usize = 16;

/// Read a network file, validate it against `kind`'s structural rules at
/// `batch_size`, compile it for `device` and return the description
/// together with a bound backend.
pub fn load_model(
    path: &str,
    device: &str,
    kind: ModelKind,
    batch_size: usize,
) -> Result<(ModelDescriptor, OpenvinoBackend), LoadError> {
    let start = Instant::now();

    let mut core = Core::new().map_err(|e| LoadError::model_load(path, e))?;
    let model = core
        .read_model_from_file(path, "")
        .map_err(|e| LoadError::model_load(path, e))?;

    let topology = snapshot_topology(&model, kind.as_str(), path)?;
    let descriptor = ModelDescriptor::describe(kind, &topology, batch_size)?;

    let mut compiled = core
        .compile_model(&model, device.into())
        .map_err(|e| LoadError::model_load(path, e))?;
    let request = compiled
        .create_infer_request()
        .map_err(|e| LoadError::model_load(path, e))?;

    let backend = OpenvinoBackend::bind(core, compiled, request, &descriptor)
        .map_err(|e| LoadError::model_load(path, e))?;

    info!(
        model = kind.as_str(),
        path,
        device,
        batch_size,
        elapsed = ?start.elapsed(),
        "model loaded"
    );
    Ok((descriptor, backend))
}

fn snapshot_topology(
    model: &Model,
    kind_name: &'static str,
    path: &str,
) -> Result<NetworkTopology, LoadError> {
    let mut topology = NetworkTopology::default();
    for index in 0..MAX_PORTS {
        match model.get_input_by_index(index) {
            Ok(port) => topology.inputs.push(tensor_info(&port, kind_name, path)?),
            Err(_) => break,
        }
    }
    for index in 0..MAX_PORTS {
        match model.get_output_by_index(index) {
            Ok(port) => topology.outputs.push(tensor_info(&port, kind_name, path)?),
            Err(_) => break,
        }
    }
    Ok(topology)
}

fn tensor_info(
    port: &openvino::Node,
    kind_name: &'static str,
    path: &str,
) -> Result<TensorInfo, LoadError> {
    let name = port
        .get_name()
        .map_err(|e| LoadError::model_load(path, e))?
        .to_string();
    let dims = port
        .get_shape()
        .map_err(|e| LoadError::model_load(path, e))?
        .get_dimensions()
        .to_vec();
    let element_type = port
        .get_element_type()
        .map_err(|e| LoadError::model_load(path, e))?;
    let element = element_kind(element_type).ok_or_else(|| {
        LoadError::topology(
            kind_name,
            format!("tensor '{name}' has unsupported element type {element_type:?}"),
        )
    })?;
    Ok(TensorInfo {
        name,
        dims,
        element,
    })
}

fn element_kind(element_type: ElementType) -> Option<ElementKind> {
    match element_type {
        ElementType::U8 => Some(ElementKind::U8),
        ElementType::I16 => Some(ElementKind::I16),
        ElementType::F32 => Some(ElementKind::F32),
        _ => None,
    }
}

fn element_type(kind: ElementKind) -> ElementType {
    match kind {
        ElementKind::U8 => ElementType::U8,
        ElementKind::I16 => ElementType::I16,
        ElementKind::F32 => ElementType::F32,
    }
}

pub struct OpenvinoBackend {
    // The core and compiled network are kept alive for as long as the
    // request that came out of them.
    _core: Core,
    _compiled: CompiledModel,
    request: InferRequest,
    inputs: HashMap<String, (TensorDesc, Tensor)>,
}

// OpenVINO objects are thread-safe in the underlying C++ runtime; the
// Rust bindings just do not mark them Send. Access is serialized by the
// mutex in `SharedBackend`.
unsafe impl Send for OpenvinoBackend {}

impl OpenvinoBackend {
    fn bind(
        core: Core,
        compiled: CompiledModel,
        request: InferRequest,
        descriptor: &ModelDescriptor,
    ) -> Result<Self, ExecutionError> {
        let mut inputs = HashMap::new();
        let mut declare = |name: &str, desc: &TensorDesc| -> Result<(), ExecutionError> {
            let dims: Vec<i64> = desc.dims.iter().map(|&d| d as i64).collect();
            let shape = Shape::new(&dims).map_err(ExecutionError::new)?;
            let tensor =
                Tensor::new(element_type(desc.element), &shape).map_err(ExecutionError::new)?;
            inputs.insert(name.to_string(), (desc.clone(), tensor));
            Ok(())
        };

        declare(descriptor.input_name(), descriptor.input_desc())?;
        if let Some((seq_name, seq_desc)) = descriptor.seq_input() {
            declare(seq_name, seq_desc)?;
        }

        Ok(OpenvinoBackend {
            _core: core,
            _compiled: compiled,
            request,
            inputs,
        })
    }

    /// Wrap this backend in the reference-counted handle the engine
    /// expects, so it can be shared across inference units.
    pub fn into_shared(self) -> SharedBackend {
        std::sync::Arc::new(parking_lot::Mutex::new(self))
    }
}

impl ExecutionBackend for OpenvinoBackend {
    fn input_buffer(&mut self, name: &str) -> Result<InputSlot<'_>, ExecutionError> {
        let (desc, tensor) = self
            .inputs
            .get_mut(name)
            .ok_or_else(|| ExecutionError::new(format!("no input tensor '{name}'")))?;
        let data = tensor.get_raw_data_mut().map_err(ExecutionError::new)?;
        Ok(InputSlot {
            desc: desc.clone(),
            data,
        })
    }

    fn execute(&mut self) -> Result<(), ExecutionError> {
        for (name, (_, tensor)) in &self.inputs {
            self.request
                .set_tensor(name, tensor)
                .map_err(ExecutionError::new)?;
        }
        self.request.infer().map_err(ExecutionError::new)
    }

    fn output(&mut self, name: &str) -> Result<OutputTensor, ExecutionError> {
        let tensor = self.request.get_tensor(name).map_err(ExecutionError::new)?;
        let dims = tensor
            .get_shape()
            .map_err(ExecutionError::new)?
            .get_dimensions()
            .iter()
            .map(|&d| d.max(0) as usize)
            .collect();
        let raw_type = tensor.get_element_type().map_err(ExecutionError::new)?;
        let element = element_kind(raw_type).ok_or_else(|| {
            ExecutionError::new(format!(
                "output '{name}' has unsupported element type {raw_type:?}"
            ))
        })?;
        let data = tensor.get_raw_data().map_err(ExecutionError::new)?.to_vec();
        Ok(OutputTensor {
            dims,
            element,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_mapping_round_trips() {
        for kind in [ElementKind::U8, ElementKind::I16, ElementKind::F32] {
            assert_eq!(element_kind(element_type(kind)), Some(kind));
        }
        assert_eq!(element_kind(ElementType::F64), None);
    }
}
