//! Buffered histogram accumulation.
//!
//! [`HistogramAccumulator`] owns a dense [`ArrayD`] of weights and a pending
//! buffer of samples. Samples are appended with [`add_sample`] and folded in
//! one pass by [`maybe_flush`] once the buffer holds more than the flush
//! threshold. [`finalize`] forces a last flush and freezes the accumulator.
//!
//! Folding adds each sample's weight directly into its cell, in arrival
//! order, so the final histogram does not depend on where the flushes fell.
//!
//! [`add_sample`]: HistogramAccumulator::add_sample
//! [`maybe_flush`]: HistogramAccumulator::maybe_flush
//! [`finalize`]: HistogramAccumulator::finalize

use ndarray::{ArrayD, IxDyn};
use tracing::debug;

use crate::bins::{BinSpec, MAX_AXES};
use crate::error::HistogramError;

/// Whether the accumulator still accepts samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Finalized,
}

/// Dense weighted histogram fed through a bounded pending buffer.
#[derive(Debug, Clone)]
pub struct HistogramAccumulator {
    /// Bin edges.
    spec: BinSpec,
    /// Accumulated weights, shaped like `spec.shape()`.
    hist: ArrayD<f64>,
    /// Pending coordinates, `spec.ndim()` values per sample.
    pending_coords: Vec<f64>,
    /// Pending weights, one per sample.
    pending_weights: Vec<f64>,
    /// Flush once more than this many samples are pending.
    threshold: usize,
    /// Samples that fell outside every bin.
    dropped: u64,
    phase: Phase,
}

impl HistogramAccumulator {
    /// Create an accumulator.
    ///
    /// `threshold` defaults to the histogram's cell count.
    pub fn new(spec: BinSpec, threshold: Option<usize>) -> Self {
        let threshold = threshold.unwrap_or_else(|| spec.cell_count());
        let hist = ArrayD::zeros(IxDyn(&spec.shape()));
        Self {
            spec,
            hist,
            pending_coords: Vec::new(),
            pending_weights: Vec::new(),
            threshold,
            dropped: 0,
            phase: Phase::Collecting,
        }
    }

    /// Append one sample to the pending buffer.
    ///
    /// # Errors
    ///
    /// Returns [`HistogramError::Finalized`] after [`finalize`], or
    /// [`HistogramError::DimensionMismatch`] if `coords` has the wrong length.
    ///
    /// [`finalize`]: HistogramAccumulator::finalize
    pub fn add_sample(&mut self, coords: &[f64], weight: f64) -> Result<(), HistogramError> {
        if self.phase == Phase::Finalized {
            return Err(HistogramError::Finalized);
        }
        if coords.len() != self.spec.ndim() {
            return Err(HistogramError::DimensionMismatch {
                expected: self.spec.ndim(),
                actual: coords.len(),
            });
        }
        self.pending_coords.extend_from_slice(coords);
        self.pending_weights.push(weight);
        Ok(())
    }

    /// Append one sample to a one-axis histogram.
    ///
    /// # Errors
    ///
    /// See [`HistogramAccumulator::add_sample`].
    pub fn add_scalar(&mut self, value: f64, weight: f64) -> Result<(), HistogramError> {
        self.add_sample(&[value], weight)
    }

    /// Fold pending samples if more than the threshold are buffered.
    ///
    /// Returns whether a flush happened.
    pub fn maybe_flush(&mut self) -> bool {
        if self.pending_weights.len() > self.threshold {
            self.flush();
            true
        } else {
            false
        }
    }

    /// Fold every pending sample into the histogram and clear the buffer.
    pub fn flush(&mut self) {
        if self.pending_weights.is_empty() {
            return;
        }
        let ndim = self.spec.ndim();
        let mut index = [0usize; MAX_AXES];
        let mut dropped: u64 = 0;

        let Some(index) = index.get_mut(..ndim) else {
            return;
        };
        for (coords, &weight) in self
            .pending_coords
            .chunks_exact(ndim)
            .zip(&self.pending_weights)
        {
            let cell = if self.spec.locate_into(coords, index) {
                self.hist.get_mut(&*index)
            } else {
                None
            };
            match cell {
                Some(cell) => *cell += weight,
                None => dropped = dropped.saturating_add(1),
            }
        }

        debug!(
            samples = self.pending_weights.len(),
            dropped, "histogram flush"
        );
        self.dropped = self.dropped.saturating_add(dropped);
        self.pending_coords.clear();
        self.pending_weights.clear();
    }

    /// Flush and freeze, returning the histogram and its edges.
    ///
    /// Calling this again returns the same state.
    pub fn finalize(&mut self) -> (&ArrayD<f64>, &BinSpec) {
        self.flush();
        self.phase = Phase::Finalized;
        (&self.hist, &self.spec)
    }

    /// Whether [`finalize`](HistogramAccumulator::finalize) has been called.
    pub fn is_finalized(&self) -> bool {
        self.phase == Phase::Finalized
    }

    /// The folded histogram, excluding pending samples.
    pub const fn histogram(&self) -> &ArrayD<f64> {
        &self.hist
    }

    /// The bin specification.
    pub const fn spec(&self) -> &BinSpec {
        &self.spec
    }

    /// Number of samples waiting to be folded.
    pub fn pending(&self) -> usize {
        self.pending_weights.len()
    }

    /// Flush threshold in samples.
    pub const fn threshold(&self) -> usize {
        self.threshold
    }

    /// Samples dropped so far for falling outside every bin.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Sum of folded weights.
    pub fn total(&self) -> f64 {
        self.hist.sum()
    }
}
