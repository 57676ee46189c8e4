//! Error types for the `edep-histogram` crate.

/// Errors that can occur when building bin specifications or adding samples.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistogramError {
    /// An axis needs at least two edges to form one bin.
    #[error("axis {axis} has {count} edge(s), at least 2 are required")]
    TooFewEdges {
        /// The offending axis.
        axis: usize,
        /// Number of edges supplied.
        count: usize,
    },

    /// Edges must be strictly increasing.
    #[error("axis {axis} edges are not strictly increasing at index {index}")]
    NonIncreasingEdges {
        /// The offending axis.
        axis: usize,
        /// Index of the first edge that is not greater than its predecessor.
        index: usize,
    },

    /// Edges must be finite numbers.
    #[error("axis {axis} edge {index} is not finite")]
    NonFiniteEdge {
        /// The offending axis.
        axis: usize,
        /// Index of the offending edge.
        index: usize,
    },

    /// The number of axes is outside the range the caller allows.
    #[error("expected {min}..={max} axes, got {actual}")]
    AxisCount {
        /// Minimum axis count.
        min: usize,
        /// Maximum axis count.
        max: usize,
        /// Number of axes supplied.
        actual: usize,
    },

    /// The product of the axis bin counts is larger than [`crate::MAX_CELLS`].
    #[error("binning has {cells} cells, the limit is {limit}")]
    TooManyCells {
        /// Total cells requested, saturating at `usize::MAX`.
        cells: usize,
        /// The cell limit.
        limit: usize,
    },

    /// A sample has a different number of coordinates than the histogram.
    #[error("sample has {actual} coordinate(s), histogram has {expected} axes")]
    DimensionMismatch {
        /// Number of histogram axes.
        expected: usize,
        /// Number of coordinates supplied.
        actual: usize,
    },

    /// Samples may not be added after the histogram was finalized.
    #[error("histogram is finalized")]
    Finalized,
}
