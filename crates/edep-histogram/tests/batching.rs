//! Flush batching must not change the accumulated histogram.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use approx::assert_abs_diff_eq;
use edep_histogram::{BinSpec, HistogramAccumulator};
use proptest::prelude::*;

fn spec() -> BinSpec {
    BinSpec::spatial(vec![
        vec![-5.0, -1.0, 0.0, 2.5, 5.0],
        vec![0.0, 1.0, 3.0, 10.0],
    ])
    .unwrap()
}

fn samples() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    proptest::collection::vec((-6.0f64..6.0, -1.0f64..11.0, -2.0f64..2.0), 0..300)
}

proptest! {
    #[test]
    fn any_threshold_gives_same_histogram(data in samples(), threshold in 0usize..50) {
        let mut once = HistogramAccumulator::new(spec(), Some(usize::MAX));
        let mut batched = HistogramAccumulator::new(spec(), Some(threshold));

        for &(x, y, w) in &data {
            once.add_sample(&[x, y], w).unwrap();
            batched.add_sample(&[x, y], w).unwrap();
            batched.maybe_flush();
        }

        let a = once.finalize().0.clone();
        let b = batched.finalize().0.clone();
        prop_assert_eq!(a.shape(), b.shape());
        for (&x, &y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
        prop_assert_eq!(once.dropped(), batched.dropped());
    }

    #[test]
    fn total_is_sum_of_in_range_weights(data in samples()) {
        let mut acc = HistogramAccumulator::new(spec(), None);
        let mut expected = 0.0;
        for &(x, y, w) in &data {
            acc.add_sample(&[x, y], w).unwrap();
            acc.maybe_flush();
            if (-5.0..=5.0).contains(&x) && (0.0..=10.0).contains(&y) {
                expected += w;
            }
        }
        acc.finalize();
        assert_abs_diff_eq!(acc.total(), expected, epsilon = 1e-9);
    }
}
