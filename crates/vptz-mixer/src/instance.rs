//! Mixer instances and the "secondary overrides primary" resolution rule.

use std::fmt;

/// One of the (at most two) mixer instances the session talks to.
///
/// The secondary instance, when configured, sits downstream of the primary
/// and drives preview and cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Instance {
    Primary,
    Secondary,
}

impl Instance {
    pub const ALL: [Instance; 2] = [Instance::Primary, Instance::Secondary];

    /// Short tag used to prefix roster keys and tally entries.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Primary => "A",
            Self::Secondary => "B",
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A value held once per instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerInstance<T> {
    pub primary: T,
    pub secondary: T,
}

impl<T> PerInstance<T> {
    pub fn get(&self, instance: Instance) -> &T {
        match instance {
            Instance::Primary => &self.primary,
            Instance::Secondary => &self.secondary,
        }
    }

    pub fn get_mut(&mut self, instance: Instance) -> &mut T {
        match instance {
            Instance::Primary => &mut self.primary,
            Instance::Secondary => &mut self.secondary,
        }
    }
}

impl PerInstance<String> {
    /// The system-wide value: the secondary's when non-empty, else the primary's.
    pub fn effective(&self) -> &str {
        if self.secondary.is_empty() {
            &self.primary
        } else {
            &self.secondary
        }
    }
}
