//! Operation vocabulary shared by physical and virtual camera adjustments.

use std::str::FromStr;

use vptz_core::geometry::{apply_zoom_delta, clamp_pan_delta};
use vptz_core::{Result, VptzError, Xyz};

/// One of the eight pan directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    UpLeft,
    Up,
    UpRight,
    Left,
    Right,
    DownLeft,
    Down,
    DownRight,
}

impl Direction {
    /// Unit step in stored offsets: up is y−, down y+, left x+, right x−.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Self::UpLeft => (1.0, -1.0),
            Self::Up => (0.0, -1.0),
            Self::UpRight => (-1.0, -1.0),
            Self::Left => (1.0, 0.0),
            Self::Right => (-1.0, 0.0),
            Self::DownLeft => (1.0, 1.0),
            Self::Down => (0.0, 1.0),
            Self::DownRight => (-1.0, 1.0),
        }
    }

    /// Mixer function moving a physical camera this way.
    pub fn ptz_move(self) -> &'static str {
        match self {
            Self::UpLeft => "PTZMoveUpLeft",
            Self::Up => "PTZMoveUp",
            Self::UpRight => "PTZMoveUpRight",
            Self::Left => "PTZMoveLeft",
            Self::Right => "PTZMoveRight",
            Self::DownLeft => "PTZMoveDownLeft",
            Self::Down => "PTZMoveDown",
            Self::DownRight => "PTZMoveDownRight",
        }
    }
}

impl FromStr for Direction {
    type Err = VptzError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "up-left" => Self::UpLeft,
            "up" => Self::Up,
            "up-right" => Self::UpRight,
            "left" => Self::Left,
            "right" => Self::Right,
            "down-left" => Self::DownLeft,
            "down" => Self::Down,
            "down-right" => Self::DownRight,
            other => return Err(VptzError::InvalidArgument(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanMove {
    Reset,
    Toward(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomMove {
    Reset,
    Decrease,
    Increase,
}

/// A parsed `(op, arg)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Pan(PanMove),
    Zoom(ZoomMove),
}

/// Geometry components a nudge tick writes to the mixer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Touched {
    pub x: bool,
    pub y: bool,
    pub zoom: bool,
}

impl Adjustment {
    /// Parse an operation (`pan`, `zoom`) and its argument.
    pub fn parse(op: &str, arg: &str) -> Result<Self> {
        match op {
            "pan" => match arg {
                "reset" => Ok(Self::Pan(PanMove::Reset)),
                dir => Ok(Self::Pan(PanMove::Toward(dir.parse()?))),
            },
            "zoom" => match arg {
                "reset" => Ok(Self::Zoom(ZoomMove::Reset)),
                "decrease" => Ok(Self::Zoom(ZoomMove::Decrease)),
                "increase" => Ok(Self::Zoom(ZoomMove::Increase)),
                other => Err(VptzError::InvalidArgument(other.to_string())),
            },
            other => Err(VptzError::InvalidOperation(other.to_string())),
        }
    }

    /// Components this adjustment always writes, even when clamped to zero.
    pub fn touches(self) -> Touched {
        match self {
            Self::Pan(PanMove::Reset) => Touched {
                x: true,
                y: true,
                zoom: false,
            },
            Self::Pan(PanMove::Toward(dir)) => {
                let (ux, uy) = dir.unit();
                Touched {
                    x: ux != 0.0,
                    y: uy != 0.0,
                    zoom: false,
                }
            }
            Self::Zoom(_) => Touched {
                x: false,
                y: false,
                zoom: true,
            },
        }
    }

    /// Apply one nudge tick. Pan steps are clamped against the canvas,
    /// zoom stays within `[min_zoom, max_zoom]` and drags the pan offset
    /// inward when it shrinks.
    pub fn step(self, xyz: Xyz, pan_delta: f64, zoom_delta: f64, min_zoom: f64, max_zoom: f64) -> Xyz {
        match self {
            Self::Pan(PanMove::Reset) => Xyz { x: 0.0, y: 0.0, ..xyz },
            Self::Pan(PanMove::Toward(dir)) => {
                let (ux, uy) = dir.unit();
                Xyz {
                    x: xyz.x + clamp_pan_delta(xyz.x, ux * pan_delta, xyz.zoom),
                    y: xyz.y + clamp_pan_delta(xyz.y, uy * pan_delta, xyz.zoom),
                    zoom: xyz.zoom,
                }
            }
            Self::Zoom(ZoomMove::Reset) => {
                apply_zoom_delta(Xyz { zoom: 1.0, ..xyz }, 0.0, min_zoom, max_zoom)
            }
            Self::Zoom(ZoomMove::Decrease) => apply_zoom_delta(xyz, -zoom_delta, min_zoom, max_zoom),
            Self::Zoom(ZoomMove::Increase) => apply_zoom_delta(xyz, zoom_delta, min_zoom, max_zoom),
        }
    }
}
