//! Outbound mixer commands.

use smallvec::{smallvec, SmallVec};
use std::fmt;

use vptz_core::{PanScale, Xyz};

/// A single command addressed to a mixer instance.
#[derive(Debug, Clone, PartialEq)]
pub enum MixerCommand {
    /// `FUNCTION <name>` with optional `Input` and `Value` parameters.
    Function {
        function: String,
        input: Option<String>,
        value: Option<String>,
    },
    /// A bare protocol verb such as `XML` or `SUBSCRIBE TALLY`.
    Verb(String),
}

impl MixerCommand {
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function {
            function: name.into(),
            input: None,
            value: None,
        }
    }

    /// Request a roster snapshot.
    pub fn xml() -> Self {
        Self::Verb("XML".into())
    }

    /// Subscribe to tally change pushes.
    pub fn subscribe_tally() -> Self {
        Self::Verb("SUBSCRIBE TALLY".into())
    }

    /// Set the `Input` parameter. No effect on bare verbs.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        if let Self::Function { input, .. } = &mut self {
            *input = Some(name.into());
        }
        self
    }

    /// Set the `Value` parameter. No effect on bare verbs.
    pub fn value(mut self, v: impl ToString) -> Self {
        if let Self::Function { value, .. } = &mut self {
            *value = Some(v.to_string());
        }
        self
    }

    /// Function name, or the verb itself.
    pub fn name(&self) -> &str {
        match self {
            Self::Function { function, .. } => function,
            Self::Verb(verb) => verb,
        }
    }

    pub fn input_name(&self) -> Option<&str> {
        match self {
            Self::Function { input, .. } => input.as_deref(),
            Self::Verb(_) => None,
        }
    }

    pub fn value_str(&self) -> Option<&str> {
        match self {
            Self::Function { value, .. } => value.as_deref(),
            Self::Verb(_) => None,
        }
    }

    /// Render the command as one protocol line including the terminator.
    pub fn encode(&self) -> String {
        format!("{self}\r\n")
    }
}

impl fmt::Display for MixerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verb(verb) => f.write_str(verb),
            Self::Function {
                function,
                input,
                value,
            } => {
                write!(f, "FUNCTION {function}")?;
                let mut sep = ' ';
                if let Some(input) = input {
                    write!(f, "{sep}Input={}", percent_encode(input))?;
                    sep = '&';
                }
                if let Some(value) = value {
                    write!(f, "{sep}Value={}", percent_encode(value))?;
                }
                Ok(())
            }
        }
    }
}

/// An ordered group of commands transmitted together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch(Vec<MixerCommand>);

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: MixerCommand) {
        self.0.push(cmd);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MixerCommand> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<MixerCommand> {
        self.0
    }

    /// All commands rendered back to back.
    pub fn encode(&self) -> String {
        self.0.iter().map(MixerCommand::encode).collect()
    }
}

impl From<MixerCommand> for CommandBatch {
    fn from(cmd: MixerCommand) -> Self {
        Self(vec![cmd])
    }
}

impl From<Vec<MixerCommand>> for CommandBatch {
    fn from(cmds: Vec<MixerCommand>) -> Self {
        Self(cmds)
    }
}

impl From<GeometryCommands> for CommandBatch {
    fn from(cmds: GeometryCommands) -> Self {
        Self(cmds.into_vec())
    }
}

impl FromIterator<MixerCommand> for CommandBatch {
    fn from_iter<I: IntoIterator<Item = MixerCommand>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<MixerCommand> for CommandBatch {
    fn extend<I: IntoIterator<Item = MixerCommand>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for CommandBatch {
    type Item = MixerCommand;
    type IntoIter = std::vec::IntoIter<MixerCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Commands placing `xyz` onto a virtual framing input.
pub type GeometryCommands = SmallVec<[MixerCommand; 3]>;

/// `SetPanX`, `SetPanY` and `SetZoom` for one input, in that order.
pub fn geometry_commands(input: &str, xyz: Xyz, scale: PanScale) -> GeometryCommands {
    smallvec![
        MixerCommand::function("SetPanX")
            .input(input)
            .value(scale.to_wire(xyz.x)),
        MixerCommand::function("SetPanY")
            .input(input)
            .value(scale.to_wire(xyz.y)),
        MixerCommand::function("SetZoom").input(input).value(xyz.zoom),
    ]
}

/// Percent-encode a query component, keeping RFC 3986 unreserved characters.
pub fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
