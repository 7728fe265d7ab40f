//! Framing geometry and the canvas-containment invariant.
//!
//! A framing is described by a pan offset `(x, y)` and a `zoom` factor.
//! Offsets are expressed in "containment units": at zoom `z` the crop
//! window stays inside the camera picture as long as
//! `max(|x|, |y|) + 1 <= z`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VptzError};
use crate::GEOMETRY_EPSILON;

/// Pan/zoom state of a single virtual framing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Xyz {
    /// Neutral framing: centered, no magnification.
    pub const NEUTRAL: Self = Self::new(0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f64, y: f64, zoom: f64) -> Self {
        Self { x, y, zoom }
    }

    /// Smallest zoom that keeps this pan offset inside the canvas.
    #[inline]
    pub fn min_contained_zoom(&self) -> f64 {
        self.x.abs().max(self.y.abs()) + 1.0
    }

    /// Whether the crop window lies inside the canvas (within tolerance).
    #[inline]
    pub fn is_contained(&self) -> bool {
        self.min_contained_zoom() <= self.zoom + GEOMETRY_EPSILON
    }

    /// Raise zoom (never lower it) until the containment invariant holds.
    pub fn contained(self) -> Self {
        Self {
            zoom: self.zoom.max(self.min_contained_zoom()),
            ..self
        }
    }

    /// Whether all three components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.zoom.is_finite()
    }

    /// Validate a geometry that is about to be applied as-is.
    pub fn validate(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(VptzError::InvalidGeometry(format!("non-finite value in {self}")));
        }
        if !self.is_contained() {
            return Err(VptzError::InvalidGeometry(format!(
                "{self} leaves the canvas (zoom must be at least {:.3})",
                self.min_contained_zoom()
            )));
        }
        Ok(())
    }

    /// Component-wise linear interpolation.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            zoom: self.zoom + (other.zoom - self.zoom) * t,
        }
    }

    /// Approximate equality within the geometry tolerance.
    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() <= GEOMETRY_EPSILON
            && (self.y - other.y).abs() <= GEOMETRY_EPSILON
            && (self.zoom - other.zoom).abs() <= GEOMETRY_EPSILON
    }
}

impl Default for Xyz {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl fmt::Display for Xyz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x={:.3}, y={:.3}, zoom={:.3})", self.x, self.y, self.zoom)
    }
}

/// Reduce a pan delta along one axis so the moved offset stays inside the
/// canvas at the given zoom.
///
/// Moving toward the center is always allowed. Moving outward is cut to
/// the remaining legal distance, and becomes zero when the offset already
/// sits on (or beyond) the boundary.
pub fn clamp_pan_delta(offset: f64, delta: f64, zoom: f64) -> f64 {
    let limit = (zoom - 1.0).max(0.0);
    let moved = offset + delta;
    if moved.abs() <= limit || moved.abs() <= offset.abs() {
        return delta;
    }
    let bound = limit.copysign(delta);
    let legal = bound - offset;
    if legal.signum() == delta.signum() {
        legal
    } else {
        0.0
    }
}

/// Apply a zoom delta within `[min_zoom, max_zoom]`, pulling the pan offset
/// back toward the center when the reduced zoom would otherwise leave the
/// canvas.
pub fn apply_zoom_delta(xyz: Xyz, delta: f64, min_zoom: f64, max_zoom: f64) -> Xyz {
    let zoom = (xyz.zoom + delta).clamp(min_zoom, max_zoom);
    pull_into_canvas(Xyz { zoom, ..xyz })
}

/// Pull the pan offset toward the center until it fits the current zoom.
pub fn pull_into_canvas(xyz: Xyz) -> Xyz {
    let limit = (xyz.zoom - 1.0).max(0.0);
    Xyz {
        x: xyz.x.clamp(-limit, limit),
        y: xyz.y.clamp(-limit, limit),
        zoom: xyz.zoom,
    }
}

/// Conversion between stored pan offsets and the mixer's pan units.
///
/// Stored geometry always uses containment units. The mixer's `panX`/`panY`
/// are `offset * factor`. Every mixer read divides and every write
/// multiplies; zoom is passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanScale(pub f64);

impl PanScale {
    pub const DEFAULT: Self = Self(2.0);

    /// Stored offset to mixer pan value.
    #[inline]
    pub fn to_wire(self, offset: f64) -> f64 {
        offset * self.0
    }

    /// Mixer pan value to stored offset.
    #[inline]
    pub fn from_wire(self, pan: f64) -> f64 {
        if self.0 == 0.0 {
            pan
        } else {
            pan / self.0
        }
    }
}

impl Default for PanScale {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_containment_boundary() {
        assert!(Xyz::new(2.0, -1.2, 3.0).is_contained());
        assert!(Xyz::NEUTRAL.is_contained());
        assert!(!Xyz::new(0.5, 0.0, 1.0).is_contained());
    }

    #[test]
    fn test_contained_only_raises_zoom() {
        let raised = Xyz::new(1.5, 0.2, 1.0).contained();
        assert!((raised.zoom - 2.5).abs() < 1e-9);
        let kept = Xyz::new(0.1, 0.0, 4.0).contained();
        assert_eq!(kept.zoom, 4.0);
    }

    #[test]
    fn test_validate_rejects_nan_and_escape() {
        assert!(Xyz::new(f64::NAN, 0.0, 1.0).validate().is_err());
        assert!(Xyz::new(0.0, 2.0, 2.0).validate().is_err());
        assert!(Xyz::new(0.0, 1.0, 2.0).validate().is_ok());
    }

    #[test]
    fn test_clamp_pan_delta_cuts_outward_motion() {
        // zoom 2 allows |x| <= 1
        assert!((clamp_pan_delta(0.95, 0.1, 2.0) - 0.05).abs() < 1e-9);
        assert_eq!(clamp_pan_delta(1.0, 0.1, 2.0), 0.0);
        // inward motion untouched
        assert_eq!(clamp_pan_delta(1.0, -0.1, 2.0), -0.1);
        // at zoom 1 nothing may move outward
        assert_eq!(clamp_pan_delta(0.0, 0.02, 1.0), 0.0);
    }

    #[test]
    fn test_clamp_pan_delta_beyond_boundary_never_reverses() {
        // offset already outside (e.g. after an absolute set at a higher zoom)
        assert_eq!(clamp_pan_delta(1.5, 0.1, 2.0), 0.0);
        assert_eq!(clamp_pan_delta(1.5, -0.1, 2.0), -0.1);
    }

    #[test]
    fn test_zoom_decrease_pulls_pan_back() {
        let xyz = apply_zoom_delta(Xyz::new(1.0, -1.0, 2.0), -0.5, 1.0, 5.0);
        assert!((xyz.zoom - 1.5).abs() < 1e-9);
        assert!((xyz.x - 0.5).abs() < 1e-9);
        assert!((xyz.y + 0.5).abs() < 1e-9);
        assert!(xyz.is_contained());
    }

    #[test]
    fn test_zoom_range_clamped() {
        assert_eq!(apply_zoom_delta(Xyz::NEUTRAL, -0.3, 1.0, 5.0).zoom, 1.0);
        assert_eq!(apply_zoom_delta(Xyz::new(0.0, 0.0, 4.9), 0.3, 1.0, 5.0).zoom, 5.0);
    }

    #[test]
    fn test_pan_scale_is_symmetric() {
        let scale = PanScale::DEFAULT;
        assert_eq!(scale.to_wire(0.5), 1.0);
        assert_eq!(scale.from_wire(1.0), 0.5);
        assert_eq!(PanScale(1.0).from_wire(0.3), 0.3);
    }

    proptest! {
        #[test]
        fn prop_pan_nudge_keeps_containment(
            x in -3.0f64..3.0,
            y in -3.0f64..3.0,
            extra in 0.0f64..3.0,
            dx in -0.5f64..0.5,
            dy in -0.5f64..0.5,
        ) {
            let start = Xyz::new(x, y, x.abs().max(y.abs()) + 1.0 + extra);
            let dx = clamp_pan_delta(start.x, dx, start.zoom);
            let dy = clamp_pan_delta(start.y, dy, start.zoom);
            let moved = Xyz::new(start.x + dx, start.y + dy, start.zoom);
            prop_assert!(moved.is_contained());
        }

        #[test]
        fn prop_zoom_nudge_keeps_containment(
            x in -3.0f64..3.0,
            y in -3.0f64..3.0,
            dz in -1.0f64..1.0,
        ) {
            let start = Xyz::new(x, y, x.abs().max(y.abs()) + 1.0);
            let moved = apply_zoom_delta(start, dz, 1.0, 5.0);
            prop_assert!(moved.is_contained());
            prop_assert!(moved.zoom >= 1.0 && moved.zoom <= 5.0);
        }
    }
}
