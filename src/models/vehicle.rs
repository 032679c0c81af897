//! Vehicle attribute classification.
//!
//! One image input and two classification heads named `color` and `type`.
//! Decoding is a per-slot argmax over each head; the result keeps the
//! placement rectangle of the enqueued crop.

use tracing::debug;

use crate::engine::backend::{ExecutionBackend, NetworkTopology, OutputTensor};
use crate::error::{ExecutionError, InferError, LoadError};
use crate::models::{ModelDescriptor, ModelKind};
use crate::results::{InferenceResult, Rect, ResultPayload};

const MODEL: &str = "vehicle_attributes";

const COLORS: [&str; 7] = ["white", "gray", "yellow", "red", "green", "blue", "black"];
const TYPES: [&str; 4] = ["car", "bus", "truck", "van"];

const COLOR_OUTPUT: &str = "color";
const TYPE_OUTPUT: &str = "type";

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
    for required in [COLOR_OUTPUT, TYPE_OUTPUT] {
        if topology.output(required).is_none() {
            return Err(LoadError::MissingTensor {
                model: MODEL,
                tensor: required.to_string(),
            });
        }
    }

    let input = &topology.inputs[0];
    let input_desc = super::image_input_desc(MODEL, input, batch_size)?;

    Ok(ModelDescriptor::assemble(
        ModelKind::VehicleAttributes,
        input.name.clone(),
        input_desc,
        None,
        vec![COLOR_OUTPUT.to_string(), TYPE_OUTPUT.to_string()],
        None,
    ))
}

pub(super) fn decode(
    descriptor: &ModelDescriptor,
    backend: &mut dyn ExecutionBackend,
    locations: &[Rect],
) -> Result<Vec<InferenceResult>, InferError> {
    let colors = backend.output(&descriptor.output_names()[0])?;
    let types = backend.output(&descriptor.output_names()[1])?;
    let color_values = per_slot_values(&colors, COLORS.len(), locations.len())?;
    let type_values = per_slot_values(&types, TYPES.len(), locations.len())?;

    let mut results = Vec::with_capacity(locations.len());
    for (i, location) in locations.iter().enumerate() {
        let (color_idx, color_confidence) = argmax(&color_values[i * COLORS.len()..][..COLORS.len()]);
        let (type_idx, type_confidence) = argmax(&type_values[i * TYPES.len()..][..TYPES.len()]);
        results.push(InferenceResult::new(
            *location,
            ResultPayload::VehicleAttributes {
                color: COLORS[color_idx],
                color_confidence,
                vehicle_type: TYPES[type_idx],
                type_confidence,
            },
        ));
    }

    debug!(results = results.len(), "decoded vehicle attributes");
    Ok(results)
}

fn per_slot_values(
    output: &OutputTensor,
    classes: usize,
    slots: usize,
) -> Result<Vec<f32>, InferError> {
    let values = output.to_f32()?;
    if values.len() < classes * slots {
        return Err(InferError::Execution(ExecutionError::new(format!(
            "output holds {} values, need {} for {} slots",
            values.len(),
            classes * slots,
            slots
        ))));
    }
    Ok(values)
}

fn argmax(values: &[f32]) -> (usize, f32) {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    (best, values[best])
}
