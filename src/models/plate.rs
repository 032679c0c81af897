//! License plate recognition.
//!
//! Two inputs: a 4-D image input and a 2-D sequence-indicator input of
//! shape `[88, batch]` that is filled with ones for every enqueued crop.
//! The single output holds up to 88 character-class indexes per batch
//! slot, terminated by a negative sentinel; indexes map into a fixed
//! table of digits, region tags and letters.

use tracing::{debug, warn};

use crate::engine::backend::{ElementKind, ExecutionBackend, NetworkTopology, TensorDesc};
use crate::error::{InferError, LoadError};
use crate::models::{ModelDescriptor, ModelKind};
use crate::results::{InferenceResult, Rect, ResultPayload};

const MODEL: &str = "license_plate";

/// Up to 88 items per plate, ended with a negative value.
const MAX_SEQUENCE_SIZE: usize = 88;

#[rustfmt::skip]
const ITEMS: [&str; 70] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    "<Anhui>", "<Beijing>", "<Chongqing>", "<Fujian>", "<Gansu>",
    "<Guangdong>", "<Guangxi>", "<Guizhou>", "<Hainan>", "<Hebei>",
    "<Heilongjiang>", "<Henan>", "<HongKong>", "<Hubei>", "<Hunan>",
    "<InnerMongolia>", "<Jiangsu>", "<Jiangxi>", "<Jilin>", "<Liaoning>",
    "<Macau>", "<Ningxia>", "<Qinghai>", "<Shaanxi>", "<Shandong>",
    "<Shanghai>", "<Shanxi>", "<Sichuan>", "<Tianjin>", "<Tibet>",
    "<Xinjiang>", "<Yunnan>", "<Zhejiang>", "<police>",
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M",
    "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
];

pub(super) fn describe(
    topology: &NetworkTopology,
    batch_size: usize,
) -> Result<ModelDescriptor, LoadError> {
    if topology.inputs.len() != 2 {
        return Err(LoadError::topology(
            MODEL,
            format!("expected 2 inputs, found {}", topology.inputs.len()),
        ));
    }
    if topology.outputs.len() != 1 {
        return Err(LoadError::topology(
            MODEL,
            format!("expected 1 output, found {}", topology.outputs.len()),
        ));
    }

    // Identify the image input (4-D) and the sequence indicator (2-D) by
    // rank, the way the network declares them.
    let image = topology.inputs.iter().find(|i| i.dims.len() == 4);
    let seq = topology.inputs.iter().find(|i| i.dims.len() == 2);
    let (image, seq) = match (image, seq) {
        (Some(image), Some(seq)) => (image, seq),
        _ => {
            return Err(LoadError::topology(
                MODEL,
                "could not identify a 4-D image input and a 2-D sequence input",
            ));
        }
    };
    if seq.dims[0] > 0 && seq.dims[0] != MAX_SEQUENCE_SIZE as i64 {
        return Err(LoadError::topology(
            MODEL,
            format!(
                "sequence input must hold {MAX_SEQUENCE_SIZE} steps, got {}",
                seq.dims[0]
            ),
        ));
    }

    let input_desc = super::image_input_desc(MODEL, image, batch_size)?;
    let seq_desc = TensorDesc::new(vec![MAX_SEQUENCE_SIZE, batch_size], ElementKind::F32);

    Ok(ModelDescriptor::assemble(
        ModelKind::LicensePlate,
        image.name.clone(),
        input_desc,
        Some((seq.name.clone(), seq_desc)),
        vec![topology.outputs[0].name.clone()],
        Some(MAX_SEQUENCE_SIZE),
    ))
}

pub(super) fn decode(
    descriptor: &ModelDescriptor,
    backend: &mut dyn ExecutionBackend,
    locations: &[Rect],
) -> Result<Vec<InferenceResult>, InferError> {
    let output = backend.output(&descriptor.output_names()[0])?;
    let values = output.to_f32()?;

    let max_size = descriptor
        .max_sequence_size()
        .expect("plate descriptor always records a sequence bound");
    if values.len() < locations.len() * max_size {
        return Err(InferError::Execution(crate::error::ExecutionError::new(
            format!(
                "output holds {} values, need {} for {} plates",
                values.len(),
                locations.len() * max_size,
                locations.len()
            ),
        )));
    }

    let mut results = Vec::with_capacity(locations.len());
    for (i, location) in locations.iter().enumerate() {
        let sequence = &values[i * max_size..(i + 1) * max_size];
        let mut text = String::new();
        for &value in sequence {
            if value < 0.0 {
                break;
            }
            match ITEMS.get(value as usize) {
                Some(item) => text.push_str(item),
                None => {
                    warn!(class = value, "plate decoder produced an unknown class");
                    break;
                }
            }
        }
        results.push(InferenceResult::new(
            *location,
            ResultPayload::LicensePlate { text },
        ));
    }

    debug!(results = results.len(), "decoded license plates");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::mock::MockBackend;
    use crate::engine::backend::TensorInfo;

    fn topology() -> NetworkTopology {
        NetworkTopology {
            inputs: vec![
                TensorInfo {
                    name: "data".to_string(),
                    dims: vec![1, 3, 24, 94],
                    element: ElementKind::U8,
                },
                TensorInfo {
                    name: "seq_ind".to_string(),
                    dims: vec![88, 1],
                    element: ElementKind::F32,
                },
            ],
            outputs: vec![TensorInfo {
                name: "decode".to_string(),
                dims: vec![88, 1, 1, 1],
                element: ElementKind::F32,
            }],
        }
    }

    fn sequence(prefix: &[f32]) -> Vec<f32> {
        let mut values = vec![-1.0; MAX_SEQUENCE_SIZE];
        values[..prefix.len()].copy_from_slice(prefix);
        values
    }

    #[test]
    fn test_describe_identifies_inputs_by_rank() {
        let desc = describe(&topology(), 2).unwrap();
        assert_eq!(desc.input_name(), "data");
        let (seq_name, seq_desc) = desc.seq_input().unwrap();
        assert_eq!(seq_name, "seq_ind");
        assert_eq!(seq_desc.dims, vec![88, 2]);
        assert_eq!(desc.max_sequence_size(), Some(88));
        assert_eq!(desc.input_desc().dims, vec![2, 3, 24, 94]);
    }

    #[test]
    fn test_describe_rejects_missing_seq_input() {
        let mut t = topology();
        t.inputs[1].dims = vec![1, 3, 24, 94];
        let err = describe(&t, 1).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedTopology { .. }));
    }

    #[test]
    fn test_describe_rejects_wrong_seq_length() {
        let mut t = topology();
        t.inputs[1].dims = vec![32, 1];
        assert!(describe(&t, 1).is_err());
    }

    #[test]
    fn test_decode_truncates_at_sentinel() {
        let descriptor = describe(&topology(), 1).unwrap();
        // "<Beijing>A123", then the sentinel, then padding that must be
        // ignored even though it holds valid classes.
        let mut values = sequence(&[11.0, 44.0, 1.0, 2.0, 3.0]);
        values[6] = 5.0;
        let mut backend = MockBackend::new().with_output("decode", vec![88, 1, 1, 1], &values);

        let locations = [Rect::new(10, 20, 90, 30)];
        let results = decode(&descriptor, &mut backend, &locations).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location(), locations[0]);
        assert_eq!(
            results[0].payload(),
            &ResultPayload::LicensePlate {
                text: "<Beijing>A123".to_string()
            }
        );
    }

    #[test]
    fn test_decode_one_sequence_per_slot() {
        let descriptor = describe(&topology(), 2).unwrap();
        let mut values = sequence(&[1.0, 2.0]);
        values.extend(sequence(&[7.0, 8.0, 9.0]));
        let mut backend = MockBackend::new().with_output("decode", vec![88, 2, 1, 1], &values);

        let locations = [Rect::new(0, 0, 10, 10), Rect::new(5, 5, 10, 10)];
        let results = decode(&descriptor, &mut backend, &locations).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].payload(),
            &ResultPayload::LicensePlate {
                text: "12".to_string()
            }
        );
        assert_eq!(
            results[1].payload(),
            &ResultPayload::LicensePlate {
                text: "789".to_string()
            }
        );
    }

    #[test]
    fn test_decode_stops_at_unknown_class() {
        let descriptor = describe(&topology(), 1).unwrap();
        let values = sequence(&[4.0, 900.0, 5.0]);
        let mut backend = MockBackend::new().with_output("decode", vec![88, 1, 1, 1], &values);
        let results = decode(&descriptor, &mut backend, &[Rect::default()]).unwrap();
        assert_eq!(
            results[0].payload(),
            &ResultPayload::LicensePlate {
                text: "4".to_string()
            }
        );
    }
}
