//! Inference request lifecycle.
//!
//! An `InferenceCore` owns the enqueue → submit → fetch cycle for one
//! logical inference unit. Frames are buffered into the backend's batch
//! slots, executed together, and decoded into typed results that are
//! pushed to observers. The lifecycle is an explicit state machine; a
//! wrong-phase call is a programming error and panics instead of
//! producing stale reads.

use image::DynamicImage;
use tracing::{debug, warn};

use crate::engine::backend::SharedBackend;
use crate::engine::frame;
use crate::error::InferError;
use crate::models::{self, ModelDescriptor};
use crate::output::ResultObserver;
use crate::results::{InferenceResult, Rect};

/// Lifecycle phase of an inference unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No frames buffered, no request in flight.
    Idle,
    /// 1..=max_batch_size frames buffered, request not yet submitted.
    Enqueuing,
    /// The backend has executed the request; results not yet decoded.
    Submitted,
    /// Results decoded and readable until the next enqueue cycle.
    Fetched,
}

/// One logical inference unit bound to a shared execution backend.
///
/// Operations take `&mut self`; an instance is driven by a single thread
/// of control. Independent instances may run on independent threads, each
/// with its own (or an explicitly shared) backend handle.
pub struct InferenceCore {
    name: String,
    descriptor: ModelDescriptor,
    backend: Option<SharedBackend>,
    phase: Phase,
    /// Placement rectangles of the buffered frames; the vector index is
    /// the batch index.
    slots: Vec<Rect>,
    results: Vec<InferenceResult>,
}

impl InferenceCore {
    pub fn new(name: impl Into<String>, descriptor: ModelDescriptor) -> Self {
        InferenceCore {
            name: name.into(),
            descriptor,
            backend: None,
            phase: Phase::Idle,
            slots: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of frames currently buffered.
    pub fn enqueued_len(&self) -> usize {
        self.slots.len()
    }

    /// Attach the execution backend this unit runs on. Allowed once per
    /// instance, before the first enqueue cycle; rebinding would orphan an
    /// in-flight batch and is a programming error.
    pub fn load_backend(&mut self, backend: SharedBackend) {
        assert!(
            self.backend.is_none(),
            "a backend is already bound to inference unit '{}'",
            self.name
        );
        self.backend = Some(backend);
    }

    /// Buffer one frame into the next batch slot.
    ///
    /// `location` is the frame's placement rectangle relative to the
    /// originating full frame; it is carried through to the results of
    /// this slot. Returns `QueueFull` once `max_batch_size` frames are
    /// outstanding — the caller must drain via submit+fetch first.
    pub fn enqueue(&mut self, frame: &DynamicImage, location: Rect) -> Result<(), InferError> {
        match self.phase {
            Phase::Submitted => panic!(
                "enqueue called on '{}' while a request is in flight",
                self.name
            ),
            // A fetch ended the previous cycle; this enqueue starts a new one.
            Phase::Idle | Phase::Fetched => self.slots.clear(),
            Phase::Enqueuing => {}
        }

        let backend = self.backend.clone().ok_or(InferError::NoBackend)?;
        let capacity = self.descriptor.max_batch_size();
        if self.slots.len() == capacity {
            warn!(
                unit = %self.name,
                capacity,
                "enqueue rejected: batch buffer is full"
            );
            return Err(InferError::QueueFull { capacity });
        }

        let batch_index = self.slots.len();
        {
            let mut backend = backend.lock();
            let mut slot = backend.input_buffer(self.descriptor.input_name())?;
            frame::load_frame(
                frame,
                &mut slot,
                self.descriptor.kind().channel_order(),
                self.descriptor.scale_factor(),
                batch_index,
            );
            if let Some((seq_name, _)) = self.descriptor.seq_input() {
                let mut seq = backend.input_buffer(seq_name)?;
                frame::fill(&mut seq, 1.0);
            }
        }

        self.slots.push(location);
        self.phase = Phase::Enqueuing;
        Ok(())
    }

    /// Execute the buffered batch, blocking until the backend finishes.
    ///
    /// On backend failure the buffered frames cannot be re-enqueued (their
    /// buffer slots are reused); they are dropped, the unit returns to
    /// `Idle`, and the error is reported for the pipeline to skip this
    /// cycle.
    pub fn submit(&mut self) -> Result<(), InferError> {
        self.assert_phase(Phase::Enqueuing, "submit");
        let backend = self.backend.clone().ok_or(InferError::NoBackend)?;

        if let Err(err) = backend.lock().execute() {
            self.drop_batch("execution failed", &err);
            return Err(InferError::Execution(err));
        }

        self.phase = Phase::Submitted;
        Ok(())
    }

    /// Decode the completed request into results and end the cycle.
    ///
    /// Clears the frame buffer, resets the enqueued count and makes the
    /// results readable until the next enqueue cycle. Returns the number
    /// of decoded results.
    pub fn fetch_results(&mut self) -> Result<usize, InferError> {
        self.assert_phase(Phase::Submitted, "fetch_results");
        let backend = self
            .backend
            .clone()
            .expect("a request was submitted without a backend");

        let decoded = {
            let mut backend = backend.lock();
            models::decode(&self.descriptor, &mut *backend, &self.slots)
        };
        let results = match decoded {
            Ok(results) => results,
            Err(InferError::Execution(err)) => {
                self.drop_batch("output decoding failed", &err);
                return Err(InferError::Execution(err));
            }
            Err(other) => return Err(other),
        };

        debug!(unit = %self.name, results = results.len(), "fetched results");
        self.results = results;
        self.slots.clear();
        self.phase = Phase::Fetched;
        Ok(self.results.len())
    }

    /// Submit and fetch atomically — the synchronous variant for callers
    /// that need strict frame ordering with no pipelining.
    pub fn submit_and_fetch(&mut self) -> Result<usize, InferError> {
        self.submit()?;
        self.fetch_results()
    }

    /// The decoded results of the last fetch.
    pub fn results(&self) -> &[InferenceResult] {
        self.assert_phase(Phase::Fetched, "results");
        &self.results
    }

    pub fn results_len(&self) -> usize {
        self.assert_phase(Phase::Fetched, "results_len");
        self.results.len()
    }

    /// Location of one result, in original full-frame coordinates.
    pub fn result_location(&self, index: usize) -> Rect {
        self.assert_phase(Phase::Fetched, "result_location");
        self.results[index].location()
    }

    /// Push the fetched result set to an observer. May be called any
    /// number of times against the same set; the notification is
    /// synchronous and completes before the next enqueue cycle.
    pub fn observe_output(&self, observer: &mut dyn ResultObserver) {
        self.assert_phase(Phase::Fetched, "observe_output");
        observer.observe(&self.results, &self.name);
    }

    fn drop_batch(&mut self, what: &str, err: &crate::error::ExecutionError) {
        warn!(
            unit = %self.name,
            dropped_frames = self.slots.len(),
            error = %err,
            "{what}, dropping batch"
        );
        self.slots.clear();
        self.phase = Phase::Idle;
    }

    fn assert_phase(&self, expected: Phase, op: &str) {
        assert!(
            self.phase == expected,
            "{op} called on '{}' in {:?} phase (expected {:?})",
            self.name,
            self.phase,
            expected
        );
    }
}
