//! Tally payload parsing.

use crate::error::{MixerError, MixerResult};
use crate::instance::Instance;

/// Program/preview membership reported by one instance, as input numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub program: Vec<u32>,
    pub preview: Vec<u32>,
}

impl Tally {
    /// Parse a `TALLY OK` digit string: digit `i` describes input `i + 1`
    /// with `0` off, `1` program and `2` preview.
    pub fn parse(payload: &str) -> MixerResult<Self> {
        let payload = payload.trim();
        let mut tally = Self::default();
        for (i, c) in payload.chars().enumerate() {
            let number = i as u32 + 1;
            match c {
                '0' => {}
                '1' => tally.program.push(number),
                '2' => tally.preview.push(number),
                _ => return Err(MixerError::MalformedTally(payload.to_string())),
            }
        }
        Ok(tally)
    }

    /// Program entries tagged with the instance, e.g. `A:3`.
    pub fn program_tagged(&self, instance: Instance) -> Vec<String> {
        tag(instance, &self.program)
    }

    /// Preview entries tagged with the instance.
    pub fn preview_tagged(&self, instance: Instance) -> Vec<String> {
        tag(instance, &self.preview)
    }
}

fn tag(instance: Instance, numbers: &[u32]) -> Vec<String> {
    numbers.iter().map(|n| format!("{instance}:{n}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tally_digits() {
        let t = Tally::parse("0120010").unwrap();
        assert_eq!(t.program, vec![2, 6]);
        assert_eq!(t.preview, vec![3]);
        assert_eq!(t.program_tagged(Instance::Secondary), vec!["B:2", "B:6"]);
        assert_eq!(t.preview_tagged(Instance::Primary), vec!["A:3"]);
    }

    #[test]
    fn test_empty_tally_is_valid() {
        assert_eq!(Tally::parse("").unwrap(), Tally::default());
    }

    #[test]
    fn test_malformed_tally_rejected() {
        assert!(matches!(Tally::parse("01x"), Err(MixerError::MalformedTally(_))));
    }
}
