//! Buffered N-dimensional weighted histogram accumulation.
//!
//! Deposition sinks may see millions of samples per run. Binning them one at
//! a time against multi-dimensional edges is wasteful, so samples are first
//! appended to a pending buffer and folded into the dense histogram in one
//! pass once the buffer grows past a flush threshold. The buffer bound caps
//! working memory; by default it equals the histogram's own cell count.
//!
//! # Modules
//!
//! - [`bins`] -- [`Axis`] and [`BinSpec`]: validated, strictly increasing
//!   bin edges and sample location.
//! - [`accumulator`] -- [`HistogramAccumulator`]: pending buffer, flush
//!   policy and the dense [`ndarray::ArrayD`] of weights.
//! - [`error`] -- [`HistogramError`].
//!
//! # Binning convention
//!
//! Bin `i` of an axis covers `[e_i, e_{i+1})`; the last bin also includes
//! its upper edge. Samples outside every bin are dropped without error and
//! only counted for diagnostics.
//!
//! # Usage
//!
//! ```
//! use edep_histogram::{BinSpec, HistogramAccumulator};
//!
//! let spec = BinSpec::spectral(vec![0.0, 1.0, 2.0, 3.0]).ok();
//! let mut acc = spec.map(|s| HistogramAccumulator::new(s, None));
//! if let Some(acc) = acc.as_mut() {
//!     acc.add_scalar(0.5, 1.0).ok();
//!     acc.add_scalar(2.5, 2.0).ok();
//!     acc.add_scalar(-1.0, 4.0).ok(); // dropped
//!     let (hist, _edges) = acc.finalize();
//!     assert_eq!(hist.iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 2.0]);
//!     assert_eq!(acc.dropped(), 1);
//! }
//! ```

pub mod accumulator;
pub mod bins;
pub mod error;

// Re-export primary types at crate root.
pub use accumulator::HistogramAccumulator;
pub use bins::{Axis, BinSpec, MAX_AXES, MAX_CELLS};
pub use error::HistogramError;
