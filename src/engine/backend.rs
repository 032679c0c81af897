//! Execution backend abstraction.
//!
//! A backend owns one compiled network and one execution request with
//! named tensor buffers. The engine writes input buffers during enqueue,
//! runs the blocking execute once per batch, and reads output tensors
//! afterwards. The trait keeps the engine independent of the concrete
//! device runtime and lets tests run against in-memory buffers.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ExecutionError;

/// Element type of a tensor buffer.
///
/// The copy routines branch on this tag instead of being generic over the
/// element type, so one code path serves 8-bit, 16-bit and float networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    U8,
    I16,
    F32,
}

impl ElementKind {
    pub fn byte_width(self) -> usize {
        match self {
            ElementKind::U8 => 1,
            ElementKind::I16 => 2,
            ElementKind::F32 => 4,
        }
    }
}

/// Declared layout of a named tensor buffer.
///
/// Image inputs are 4-D NCHW; auxiliary inputs (e.g. a sequence
/// indicator) may have fewer dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDesc {
    pub dims: Vec<usize>,
    pub element: ElementKind,
}

impl TensorDesc {
    pub fn new(dims: Vec<usize>, element: ElementKind) -> Self {
        TensorDesc { dims, element }
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.element.byte_width()
    }

    // NCHW accessors, valid for 4-D image buffers only.

    pub fn batch(&self) -> usize {
        self.dims[0]
    }

    pub fn channels(&self) -> usize {
        self.dims[1]
    }

    pub fn height(&self) -> usize {
        self.dims[2]
    }

    pub fn width(&self) -> usize {
        self.dims[3]
    }

    /// Element count of one batch slot (C*H*W for image buffers).
    pub fn slot_len(&self) -> usize {
        self.dims[1..].iter().product()
    }
}

/// Mutable view of a named input tensor buffer.
pub struct InputSlot<'a> {
    pub desc: TensorDesc,
    pub data: &'a mut [u8],
}

/// Owned snapshot of an output tensor taken after execution.
#[derive(Debug, Clone)]
pub struct OutputTensor {
    pub dims: Vec<usize>,
    pub element: ElementKind,
    pub data: Vec<u8>,
}

impl OutputTensor {
    pub fn from_f32(dims: Vec<usize>, values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        OutputTensor {
            dims,
            element: ElementKind::F32,
            data,
        }
    }

    /// Decode the buffer as f32 values.
    pub fn to_f32(&self) -> Result<Vec<f32>, ExecutionError> {
        if self.element != ElementKind::F32 {
            return Err(ExecutionError::new(format!(
                "expected f32 output tensor, got {:?}",
                self.element
            )));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect())
    }
}

/// Shape and name of one tensor port as declared by a loaded network.
#[derive(Debug, Clone)]
pub struct TensorInfo {
    pub name: String,
    pub dims: Vec<i64>,
    pub element: ElementKind,
}

/// Snapshot of a network's input/output ports, taken once at load time and
/// used to validate a model description against the actual topology.
#[derive(Debug, Clone, Default)]
pub struct NetworkTopology {
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
}

impl NetworkTopology {
    pub fn output(&self, name: &str) -> Option<&TensorInfo> {
        self.outputs.iter().find(|t| t.name == name)
    }
}

/// A hardware execution backend bound to one compiled network.
///
/// Execution is a single blocking suspension point: `execute` returns only
/// once the request has completed or failed. The engine guarantees that no
/// input buffer is written between `execute` and the last `output` read of
/// a cycle.
pub trait ExecutionBackend: Send {
    /// Mutable view of a named input tensor buffer.
    fn input_buffer(&mut self, name: &str) -> Result<InputSlot<'_>, ExecutionError>;

    /// Run the network over every populated batch slot, blocking until the
    /// request completes.
    fn execute(&mut self) -> Result<(), ExecutionError>;

    /// Snapshot of a named output tensor. Valid after a successful
    /// `execute`.
    fn output(&mut self, name: &str) -> Result<OutputTensor, ExecutionError>;
}

/// Reference-counted backend handle.
///
/// One compiled network may serve several logically independent inference
/// units; shared ownership keeps the backend alive as long as any of them
/// holds it.
pub type SharedBackend = Arc<Mutex<dyn ExecutionBackend>>;

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory backend for engine and decoder tests.

    use std::collections::HashMap;

    use super::*;

    pub(crate) struct MockBackend {
        inputs: HashMap<String, (TensorDesc, Vec<u8>)>,
        outputs: HashMap<String, OutputTensor>,
        pub executed: usize,
        pub fail_execute: bool,
    }

    impl MockBackend {
        pub fn new() -> Self {
            MockBackend {
                inputs: HashMap::new(),
                outputs: HashMap::new(),
                executed: 0,
                fail_execute: false,
            }
        }

        pub fn with_input(mut self, name: &str, desc: TensorDesc) -> Self {
            let bytes = vec![0u8; desc.byte_len()];
            self.inputs.insert(name.to_string(), (desc, bytes));
            self
        }

        pub fn with_output(mut self, name: &str, dims: Vec<usize>, values: &[f32]) -> Self {
            self.outputs
                .insert(name.to_string(), OutputTensor::from_f32(dims, values));
            self
        }

        pub fn input_bytes(&self, name: &str) -> &[u8] {
            &self.inputs[name].1
        }
    }

    impl ExecutionBackend for MockBackend {
        fn input_buffer(&mut self, name: &str) -> Result<InputSlot<'_>, ExecutionError> {
            let (desc, data) = self
                .inputs
                .get_mut(name)
                .ok_or_else(|| ExecutionError::new(format!("no input tensor '{name}'")))?;
            Ok(InputSlot {
                desc: desc.clone(),
                data: data.as_mut_slice(),
            })
        }

        fn execute(&mut self) -> Result<(), ExecutionError> {
            if self.fail_execute {
                return Err(ExecutionError::new("device rejected the request"));
            }
            self.executed += 1;
            Ok(())
        }

        fn output(&mut self, name: &str) -> Result<OutputTensor, ExecutionError> {
            self.outputs
                .get(name)
                .cloned()
                .ok_or_else(|| ExecutionError::new(format!("no output tensor '{name}'")))
        }
    }
}
