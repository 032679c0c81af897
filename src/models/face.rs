//! SSD-style face detection.
//!
//! One image input, one `[1, 1, N, 7]` output where each row is
//! `[image_id, label, confidence, xmin, ymin, xmax, ymax]` with
//! coordinates normalized to the enqueued frame. A negative `image_id`
//! terminates the proposal list.

use ndarray::ArrayView2;
use tracing::debug;

use crate::engine::backend::{ExecutionBackend, NetworkTopology};
use crate::error::{ExecutionError, InferError, LoadError};
use crate::models::{ModelDescriptor, ModelKind};
use crate::results::{InferenceResult, Rect, ResultPayload};

const MODEL: &str = "face_detection";

/// Values per detection row.
const OBJECT_SIZE: usize = 7;

pub(super) fn describe(
    topology: &NetworkTopology,
    batch_size: usize,
) -> Result<ModelDescriptor, LoadError> {
    if topology.inputs.len() != 1 {
        return Err(LoadError::topology(
            MODEL,
            format!("expected 1 input, found {}", topology.inputs.len()),
        ));
    }
    if topology.outputs.len() != 1 {
        return Err(LoadError::topology(
            MODEL,
            format!("expected 1 output, found {}", topology.outputs.len()),
        ));
    }

    let input = &topology.inputs[0];
    let input_desc = super::image_input_desc(MODEL, input, batch_size)?;

    let output = &topology.outputs[0];
    if output.dims.len() != 4 {
        return Err(LoadError::topology(
            MODEL,
            format!("output must be 4-D, got {:?}", output.dims),
        ));
    }
    if output.dims[3] != OBJECT_SIZE as i64 {
        return Err(LoadError::topology(
            MODEL,
            format!(
                "output rows must hold {OBJECT_SIZE} values, got {}",
                output.dims[3]
            ),
        ));
    }
    let max_proposals = output.dims[2].max(0) as usize;

    Ok(ModelDescriptor::assemble(
        ModelKind::FaceDetection,
        input.name.clone(),
        input_desc,
        None,
        vec![output.name.clone()],
        Some(max_proposals),
    ))
}

pub(super) fn decode(
    descriptor: &ModelDescriptor,
    backend: &mut dyn ExecutionBackend,
    locations: &[Rect],
) -> Result<Vec<InferenceResult>, InferError> {
    let output = backend.output(&descriptor.output_names()[0])?;
    let values = output.to_f32()?;

    let max_proposals = descriptor
        .max_sequence_size()
        .expect("face descriptor always records a proposal count");
    let rows = (values.len() / OBJECT_SIZE).min(max_proposals);
    let view = ArrayView2::from_shape((rows, OBJECT_SIZE), &values[..rows * OBJECT_SIZE])
        .map_err(|e| InferError::Execution(ExecutionError::new(e)))?;

    let mut results = Vec::new();
    for row in view.rows() {
        let image_id = row[0];
        // Negative id terminates the list; an id past the enqueued count
        // belongs to a stale batch slot.
        if image_id < 0.0 || image_id as usize >= locations.len() {
            break;
        }
        let confidence = row[2];
        if confidence < descriptor.confidence_threshold() {
            continue;
        }

        let frame = locations[image_id as usize];
        let xmin = row[3].clamp(0.0, 1.0);
        let ymin = row[4].clamp(0.0, 1.0);
        let xmax = row[5].clamp(0.0, 1.0);
        let ymax = row[6].clamp(0.0, 1.0);

        let location = Rect::new(
            frame.x + (xmin * frame.width as f32) as i32,
            frame.y + (ymin * frame.height as f32) as i32,
            ((xmax - xmin).max(0.0) * frame.width as f32) as u32,
            ((ymax - ymin).max(0.0) * frame.height as f32) as u32,
        );
        results.push(InferenceResult::new(
            location,
            ResultPayload::Face { confidence },
        ));
    }

    debug!(results = results.len(), "decoded face detections");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::mock::MockBackend;
    use crate::engine::backend::{ElementKind, TensorInfo};

    fn topology(inputs: usize, last_dim: i64) -> NetworkTopology {
        NetworkTopology {
            inputs: (0..inputs)
                .map(|i| TensorInfo {
                    name: format!("data{i}"),
                    dims: vec![1, 3, 300, 300],
                    element: ElementKind::U8,
                })
                .collect(),
            outputs: vec![TensorInfo {
                name: "detection_out".to_string(),
                dims: vec![1, 1, 200, last_dim],
                element: ElementKind::F32,
            }],
        }
    }

    #[test]
    fn test_describe_records_layout() {
        let desc = describe(&topology(1, 7), 4).unwrap();
        assert_eq!(desc.input_name(), "data0");
        assert_eq!(desc.max_batch_size(), 4);
        assert_eq!(desc.max_sequence_size(), Some(200));
        assert_eq!(desc.output_names(), ["detection_out".to_string()]);
        assert_eq!(desc.input_desc().dims, vec![4, 3, 300, 300]);
    }

    #[test]
    fn test_describe_rejects_extra_inputs() {
        let err = describe(&topology(2, 7), 1).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedTopology { .. }));
    }

    #[test]
    fn test_describe_rejects_bad_object_size() {
        let err = describe(&topology(1, 5), 1).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedTopology { .. }));
    }

    #[test]
    fn test_decode_threshold_and_sentinel() {
        let descriptor = describe(&topology(1, 7), 1).unwrap();
        #[rustfmt::skip]
        let rows = [
            0.0, 1.0, 0.9, 0.25, 0.25, 0.75, 0.75,   // kept
            0.0, 1.0, 0.3, 0.1, 0.1, 0.2, 0.2,       // below threshold
            -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,      // sentinel
            0.0, 1.0, 0.99, 0.0, 0.0, 1.0, 1.0,      // past sentinel, ignored
        ];
        let mut backend =
            MockBackend::new().with_output("detection_out", vec![1, 1, 4, 7], &rows);

        let locations = [Rect::new(100, 50, 200, 100)];
        let results = decode(&descriptor, &mut backend, &locations).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location(), Rect::new(150, 75, 100, 50));
        assert_eq!(
            results[0].payload(),
            &ResultPayload::Face { confidence: 0.9 }
        );
    }

    #[test]
    fn test_decode_ignores_unenqueued_slots() {
        let descriptor = describe(&topology(1, 7), 2).unwrap();
        // image_id 1 but only one frame enqueued
        let rows = [1.0, 1.0, 0.9, 0.25, 0.25, 0.75, 0.75];
        let mut backend =
            MockBackend::new().with_output("detection_out", vec![1, 1, 1, 7], &rows);
        let results = decode(&descriptor, &mut backend, &[Rect::new(0, 0, 10, 10)]).unwrap();
        assert!(results.is_empty());
    }
}
