//! Frame to tensor layout conversion.
//!
//! Writes a decoded image into a backend input buffer in planar
//! channel-major order, one batch slot at a time. The transform is
//! stateless; resizing uses bilinear (`FilterType::Triangle`) resampling,
//! which is deterministic across runs. Resizing is destructive and does
//! not preserve aspect ratio.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use super::backend::{ElementKind, InputSlot};

/// Channel order expected by the network.
///
/// The OpenVINO model zoo networks handled here are trained on BGR frames,
/// so BGR is the common case; RGB is kept for networks trained on
/// unswapped input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Write one frame into `slot` at `batch_index`.
///
/// The destination offset for channel `c`, row `h`, column `w` is
/// `batch_index * C*H*W + c * H*W + h * W + w`; the stored value is the
/// source pixel's channel value times `scale_factor`, converted to the
/// buffer's element type. The frame is resized first when its dimensions
/// differ from the buffer's declared width/height.
///
/// Malformed buffer layouts and out-of-range batch indexes are programming
/// errors and panic.
pub fn load_frame(
    frame: &DynamicImage,
    slot: &mut InputSlot<'_>,
    order: ChannelOrder,
    scale_factor: f32,
    batch_index: usize,
) {
    let desc = &slot.desc;
    assert_eq!(
        desc.dims.len(),
        4,
        "image input buffer must be 4-D NCHW, got {:?}",
        desc.dims
    );
    assert!(
        batch_index < desc.batch(),
        "batch index {} out of range (capacity {})",
        batch_index,
        desc.batch()
    );
    assert_eq!(
        slot.data.len(),
        desc.byte_len(),
        "input buffer length does not match its declared dimensions"
    );

    let (width, height, channels) = (desc.width(), desc.height(), desc.channels());

    let (src_w, src_h) = frame.dimensions();
    let resized;
    let frame = if src_w as usize != width || src_h as usize != height {
        resized = frame.resize_exact(width as u32, height as u32, FilterType::Triangle);
        &resized
    } else {
        frame
    };

    let plane = width * height;
    let base = batch_index * desc.slot_len();

    match channels {
        1 => {
            let gray = frame.to_luma8();
            for h in 0..height {
                for w in 0..width {
                    let value = gray.get_pixel(w as u32, h as u32)[0] as f32 * scale_factor;
                    write_element(slot.data, desc.element, base + h * width + w, value);
                }
            }
        }
        3 => {
            let rgb = frame.to_rgb8();
            // Plane order within the pixel: identity for RGB, swapped for BGR.
            let map = match order {
                ChannelOrder::Rgb => [0usize, 1, 2],
                ChannelOrder::Bgr => [2usize, 1, 0],
            };
            for c in 0..3 {
                for h in 0..height {
                    for w in 0..width {
                        let pixel = rgb.get_pixel(w as u32, h as u32);
                        let value = pixel[map[c]] as f32 * scale_factor;
                        write_element(
                            slot.data,
                            desc.element,
                            base + c * plane + h * width + w,
                            value,
                        );
                    }
                }
            }
        }
        other => panic!("unsupported channel count {other} for image input"),
    }
}

/// Fill an entire input buffer with one constant value.
///
/// Used for auxiliary non-image inputs, e.g. the sequence indicator some
/// recognition networks require to be all ones.
pub fn fill(slot: &mut InputSlot<'_>, value: f32) {
    for i in 0..slot.desc.len() {
        write_element(slot.data, slot.desc.element, i, value);
    }
}

fn write_element(data: &mut [u8], element: ElementKind, index: usize, value: f32) {
    match element {
        ElementKind::U8 => data[index] = value as u8,
        ElementKind::I16 => {
            data[index * 2..index * 2 + 2].copy_from_slice(&(value as i16).to_ne_bytes());
        }
        ElementKind::F32 => {
            data[index * 4..index * 4 + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }
}
