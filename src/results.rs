//! Typed inference results.
//!
//! Every result carries the rectangle it refers to in the coordinate space
//! of the original full frame, plus a payload for the model family that
//! produced it. Results are immutable; `fetch_results` replaces the whole
//! set on every cycle.

/// An axis-aligned rectangle in full-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

/// Decoded payload, one variant per supported model family.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// A detected face and its detection confidence.
    Face { confidence: f32 },
    /// A recognized license plate string.
    LicensePlate { text: String },
    /// Vehicle color and type with per-head confidences.
    VehicleAttributes {
        color: &'static str,
        color_confidence: f32,
        vehicle_type: &'static str,
        type_confidence: f32,
    },
}

/// One inference outcome: a location plus its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    location: Rect,
    payload: ResultPayload,
}

impl InferenceResult {
    pub fn new(location: Rect, payload: ResultPayload) -> Self {
        InferenceResult { location, payload }
    }

    /// The rectangle this result refers to, in original full-frame
    /// coordinates.
    pub fn location(&self) -> Rect {
        self.location
    }

    pub fn payload(&self) -> &ResultPayload {
        &self.payload
    }
}
