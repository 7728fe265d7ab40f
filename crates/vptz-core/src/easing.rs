//! Easing curves used by eased camera paths.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A normalized easing curve mapping `t ∈ [0, 1]` to progress `∈ [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    #[default]
    Linear,
    InCubic,
    OutCubic,
    InOutCubic,
    InOutSine,
}

impl Ease {
    /// Evaluate the curve. Input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Self::InOutSine => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Ease; 5] = [
        Ease::Linear,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::InOutSine,
    ];

    #[test]
    fn test_endpoints_are_fixed() {
        for ease in ALL {
            assert!(ease.apply(0.0).abs() < 1e-12, "{ease:?} at 0");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-12, "{ease:?} at 1");
        }
    }

    #[test]
    fn test_curves_are_monotonic() {
        for ease in ALL {
            let mut last = ease.apply(0.0);
            for i in 1..=100 {
                let v = ease.apply(i as f64 / 100.0);
                assert!(v >= last - 1e-12, "{ease:?} decreased at step {i}");
                last = v;
            }
        }
    }

    #[test]
    fn test_in_out_midpoint() {
        assert!((Ease::InOutCubic.apply(0.5) - 0.5).abs() < 1e-12);
        assert!((Ease::InOutSine.apply(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(Ease::InCubic.apply(0.5), 0.125);
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Ease::OutCubic.apply(1.5), 1.0);
        assert_eq!(Ease::InCubic.apply(-0.2), 0.0);
    }
}
