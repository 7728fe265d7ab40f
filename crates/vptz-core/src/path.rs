//! Eased camera paths between two framings.
//!
//! A path runs from `src` to an intermediate waypoint halfway between the
//! two framings and from there to `dst`. The waypoint is zoomed out a little
//! (as far as the reference canvas allows) so a move between two tight shots
//! briefly widens instead of sliding across the picture. Position eases in
//! cubically toward the waypoint and eases out cubically toward `dst`; zoom
//! uses an in-out cubic on both legs.
//!
//! Every sample is clamped to the containment invariant by raising its zoom.

use serde::{Deserialize, Serialize};

use crate::easing::Ease;
use crate::geometry::Xyz;

/// Tunables for [`compute_path_with`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    /// Reference canvas width in pixels.
    pub canvas_width: f64,
    /// Reference canvas height in pixels.
    pub canvas_height: f64,
    /// First zoom factor tried for the waypoint.
    pub min_factor: f64,
    /// Increment applied to the factor while the waypoint does not fit.
    pub factor_step: f64,
    /// Upper bound on factor search iterations.
    pub max_iterations: usize,
    pub position_in: Ease,
    pub position_out: Ease,
    pub zoom_ease: Ease,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            canvas_width: 3840.0,
            canvas_height: 2160.0,
            min_factor: 0.75,
            factor_step: 0.001,
            max_iterations: 250,
            position_in: Ease::InCubic,
            position_out: Ease::OutCubic,
            zoom_ease: Ease::InOutCubic,
        }
    }
}

impl PathOptions {
    /// Whether a framing's crop window projected onto the reference canvas
    /// lies entirely within it.
    pub fn inside_canvas(&self, xyz: &Xyz) -> bool {
        if xyz.zoom <= 0.0 || !xyz.is_finite() {
            return false;
        }
        let (w, h) = (self.canvas_width, self.canvas_height);
        let crop_w = w / xyz.zoom;
        let crop_h = h / xyz.zoom;
        let left = w / 2.0 - crop_w * xyz.x / 2.0 - crop_w / 2.0;
        let top = h / 2.0 + crop_h * xyz.y / 2.0 - crop_h / 2.0;
        // tolerance keeps exact boundary framings inside
        let tol = 1e-6 * w.max(h);
        left >= -tol && left + crop_w <= w + tol && top >= -tol && top + crop_h <= h + tol
    }

    /// Find the smallest factor in `[min_factor, 1.0]` (stepping by
    /// `factor_step`) that keeps the zoomed-out waypoint on the canvas.
    fn waypoint_factor(&self, mid: &Xyz) -> f64 {
        let mut factor = self.min_factor.min(1.0);
        for _ in 0..self.max_iterations {
            if factor >= 1.0 {
                break;
            }
            let candidate = Xyz { zoom: mid.zoom * factor, ..*mid };
            if self.inside_canvas(&candidate) {
                return factor;
            }
            factor += self.factor_step;
        }
        factor.min(1.0)
    }
}

/// Number of samples for a path of `duration_ms` at `fps`.
pub fn step_count(fps: f64, duration_ms: f64) -> usize {
    if fps.is_nan() || fps <= 0.0 || !duration_ms.is_finite() || duration_ms <= 0.0 {
        return 0;
    }
    (duration_ms / (1000.0 / fps)).round() as usize
}

/// Compute an eased path with default options.
pub fn compute_path(src: Xyz, dst: Xyz, fps: f64, duration_ms: f64) -> Vec<Xyz> {
    compute_path_with(src, dst, fps, duration_ms, &PathOptions::default())
}

/// Compute an eased path from `src` to `dst`.
///
/// Returns `round(duration_ms / (1000 / fps))` samples; the last one equals
/// `dst` (up to the containment clamp). Returns an empty path when that
/// count is zero; callers treat that as a failure.
pub fn compute_path_with(
    src: Xyz,
    dst: Xyz,
    fps: f64,
    duration_ms: f64,
    opts: &PathOptions,
) -> Vec<Xyz> {
    let steps = step_count(fps, duration_ms);
    if steps == 0 {
        return Vec::new();
    }
    if src == dst {
        return vec![src.contained(); steps];
    }

    let mut mid = src.lerp(&dst, 0.5);
    mid.zoom *= opts.waypoint_factor(&mid);

    // at least one ease-out sample so the path always lands on dst
    let k = (((steps as f64) / 2.0).round() as usize).min(steps - 1);
    let out_len = steps - k;
    let mut path = Vec::with_capacity(steps);

    for i in 0..steps {
        let sample = if i < k {
            let t = i as f64 / k as f64;
            let p = opts.position_in.apply(t);
            let z = opts.zoom_ease.apply(t);
            Xyz {
                x: src.x + (mid.x - src.x) * p,
                y: src.y + (mid.y - src.y) * p,
                zoom: src.zoom + (mid.zoom - src.zoom) * z,
            }
        } else {
            let t = (i - k + 1) as f64 / out_len as f64;
            let p = opts.position_out.apply(t);
            let z = opts.zoom_ease.apply(t);
            Xyz {
                x: mid.x + (dst.x - mid.x) * p,
                y: mid.y + (dst.y - mid.y) * p,
                zoom: mid.zoom + (dst.zoom - mid.zoom) * z,
            }
        };
        path.push(sample.contained());
    }
    path
}

// ── Tests ───────────────────────────────────────────────────────
