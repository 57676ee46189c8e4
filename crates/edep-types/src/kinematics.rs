//! Compton-edge helpers.
//!
//! Spectral detectors are usually calibrated against the Compton edge of a
//! known photon line. These two functions convert between a photon energy
//! and the maximum energy it can transfer to a free electron.

use crate::units::ELECTRON_MASS_C2;

/// Compton edge for a photon of energy `gamma`: `2γ² / (2γ + mₑc²)`.
pub fn compton_edge(gamma: f64) -> f64 {
    2.0 * gamma * gamma / 2.0f64.mul_add(gamma, ELECTRON_MASS_C2)
}

/// Photon energy whose Compton edge is `edge`.
pub fn gamma_from_edge(edge: f64) -> f64 {
    0.5 * (edge + edge.mul_add(edge, 2.0 * edge * ELECTRON_MASS_C2).sqrt())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn cesium_line_edge() {
        // 661.657 keV line has its edge near 477.3 keV.
        assert_relative_eq!(compton_edge(0.661_657), 0.477_334, max_relative = 1e-4);
    }

    #[test]
    fn edge_inverts() {
        for gamma in [0.1, 0.511, 1.332, 10.0] {
            assert_relative_eq!(
                gamma_from_edge(compton_edge(gamma)),
                gamma,
                max_relative = 1e-12
            );
        }
    }
}
