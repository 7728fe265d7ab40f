//! Identifiers for cameras, physical presets and virtual framings.
//!
//! Identifiers are plain strings drawn from small fixed sets configured in
//! [`VptzConfig`](crate::VptzConfig). Values of these types are only handed
//! out by the configuration after validation, so holding one means the id
//! is known.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VptzError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier without validating it against a configuration.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// A camera, e.g. `"1"`.
    CameraId
);
string_id!(
    /// A physical pan/tilt/zoom preset recallable on a camera, e.g. `"A"`.
    PresetId
);
string_id!(
    /// A virtual framing (crop/zoom window) within a preset, e.g. `"C-L"`.
    FramingId
);

/// Speed selector shared by nudges, physical moves and drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Fast,
    Med,
    Slow,
}

impl Speed {
    /// Pick one of three values by speed.
    pub fn select<T>(self, fast: T, med: T, slow: T) -> T {
        match self {
            Self::Fast => fast,
            Self::Med => med,
            Self::Slow => slow,
        }
    }
}

impl FromStr for Speed {
    type Err = VptzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "med" | "mid" => Ok(Self::Med),
            "slow" => Ok(Self::Slow),
            other => Err(VptzError::InvalidSpeed(other.to_string())),
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Med => "med",
            Self::Slow => "slow",
        })
    }
}
