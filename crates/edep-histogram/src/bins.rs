//! Bin edges and sample location.
//!
//! An [`Axis`] owns a validated, strictly increasing list of edges. A
//! [`BinSpec`] is an ordered list of one to [`MAX_AXES`] axes; its shape is
//! the number of bins along each axis, and its total cell count is bounded
//! by [`MAX_CELLS`].

use serde::Serialize;

use crate::error::HistogramError;

/// Upper bound on the number of axes a histogram may have.
pub const MAX_AXES: usize = 3;

/// Upper bound on the number of cells (the product of the bin counts).
pub const MAX_CELLS: usize = 1 << 26;

/// One histogram axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    edges: Vec<f64>,
}

impl Axis {
    /// Validate edges for axis number `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`HistogramError::TooFewEdges`], [`HistogramError::NonFiniteEdge`]
    /// or [`HistogramError::NonIncreasingEdges`].
    pub fn new(axis: usize, edges: Vec<f64>) -> Result<Self, HistogramError> {
        if edges.len() < 2 {
            return Err(HistogramError::TooFewEdges {
                axis,
                count: edges.len(),
            });
        }
        if let Some(index) = edges.iter().position(|e| !e.is_finite()) {
            return Err(HistogramError::NonFiniteEdge { axis, index });
        }
        if let Some(offset) = edges.windows(2).position(|w| match w {
            [lo, hi] => lo >= hi,
            _ => false,
        }) {
            return Err(HistogramError::NonIncreasingEdges {
                axis,
                index: offset.saturating_add(1),
            });
        }
        Ok(Self { edges })
    }

    /// The edges, in increasing order.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins (edges minus one).
    pub fn bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Bin containing `x`, or `None` if `x` is outside the axis or NaN.
    pub fn locate(&self, x: f64) -> Option<usize> {
        let first = *self.edges.first()?;
        let last = *self.edges.last()?;
        if x.is_nan() || x < first || x > last {
            return None;
        }
        if x >= last {
            return Some(self.bins().saturating_sub(1));
        }
        // First edge strictly greater than x closes the bin.
        let upper = self.edges.partition_point(|&e| e <= x);
        upper.checked_sub(1)
    }
}

/// Ordered set of axes defining a histogram's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSpec {
    axes: Vec<Axis>,
}

impl BinSpec {
    /// Build a spec with an axis count in `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`HistogramError::AxisCount`], any axis validation error, or
    /// [`HistogramError::TooManyCells`] if the dense array would be larger
    /// than [`MAX_CELLS`].
    pub fn with_axis_range(
        edges: Vec<Vec<f64>>,
        min: usize,
        max: usize,
    ) -> Result<Self, HistogramError> {
        let max = max.min(MAX_AXES);
        if edges.len() < min || edges.len() > max {
            return Err(HistogramError::AxisCount {
                min,
                max,
                actual: edges.len(),
            });
        }
        let axes = edges
            .into_iter()
            .enumerate()
            .map(|(axis, e)| Axis::new(axis, e))
            .collect::<Result<Vec<_>, _>>()?;
        let cells = axes.iter().map(Axis::bins).fold(1, usize::saturating_mul);
        if cells > MAX_CELLS {
            return Err(HistogramError::TooManyCells {
                cells,
                limit: MAX_CELLS,
            });
        }
        Ok(Self { axes })
    }

    /// A spatial spec: one to three axes.
    ///
    /// # Errors
    ///
    /// See [`BinSpec::with_axis_range`].
    pub fn spatial(edges: Vec<Vec<f64>>) -> Result<Self, HistogramError> {
        Self::with_axis_range(edges, 1, MAX_AXES)
    }

    /// A spectral spec: exactly one axis.
    ///
    /// # Errors
    ///
    /// See [`BinSpec::with_axis_range`].
    pub fn spectral(edges: Vec<f64>) -> Result<Self, HistogramError> {
        Self::with_axis_range(vec![edges], 1, 1)
    }

    /// The axes, in order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Bins per axis.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::bins).collect()
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.axes
            .iter()
            .map(Axis::bins)
            .fold(1, usize::saturating_mul)
    }

    /// Locate a sample, writing per-axis bin indices into `index`.
    ///
    /// Returns `false` if the sample falls outside any axis. `coords` and
    /// `index` must both have [`BinSpec::ndim`] entries.
    pub fn locate_into(&self, coords: &[f64], index: &mut [usize]) -> bool {
        if coords.len() != self.axes.len() || index.len() != self.axes.len() {
            return false;
        }
        for ((axis, &x), slot) in self.axes.iter().zip(coords).zip(index.iter_mut()) {
            match axis.locate(x) {
                Some(bin) => *slot = bin,
                None => return false,
            }
        }
        true
    }
}
