//! Mixer-derived state: roster, tallies, active inputs and link states.
//!
//! Everything here is rebuilt from mixer events; nothing is persisted.

use std::collections::BTreeMap;

use vptz_core::Xyz;

use crate::instance::{Instance, PerInstance};
use crate::tally::Tally;
use crate::xml::{RosterInput, RosterSnapshot};

/// Connection state of one mixer instance as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Roster and active-input caches for all instances.
#[derive(Debug, Default)]
pub struct MixerState {
    roster: BTreeMap<(Instance, u32), RosterInput>,
    tally: PerInstance<Tally>,
    program: PerInstance<String>,
    preview: PerInstance<String>,
    links: PerInstance<LinkState>,
}

impl MixerState {
    /// Replace every roster entry of `instance` with the snapshot's inputs
    /// and re-derive that instance's active inputs.
    pub fn replace_roster(&mut self, instance: Instance, snapshot: &RosterSnapshot) {
        self.roster.retain(|(owner, _), _| *owner != instance);
        for input in &snapshot.inputs {
            self.roster.insert((instance, input.number), input.clone());
        }
        *self.program.get_mut(instance) = snapshot.title_of(snapshot.active).to_string();
        *self.preview.get_mut(instance) = snapshot.title_of(snapshot.preview).to_string();
    }

    pub fn set_tally(&mut self, instance: Instance, tally: Tally) {
        *self.tally.get_mut(instance) = tally;
    }

    pub fn set_link(&mut self, instance: Instance, state: LinkState) {
        *self.links.get_mut(instance) = state;
    }

    pub fn link(&self, instance: Instance) -> LinkState {
        *self.links.get(instance)
    }

    /// Roster entries reported by one instance, ordered by input number.
    pub fn roster(&self, instance: Instance) -> Vec<RosterInput> {
        self.roster
            .iter()
            .filter(|((owner, _), _)| *owner == instance)
            .map(|(_, input)| input.clone())
            .collect()
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    /// Reported geometry of the virtual-set input with the given title.
    /// The primary instance wins when both report it.
    pub fn geometry_of(&self, title: &str) -> Option<Xyz> {
        self.roster
            .values()
            .find(|input| input.is_virtual_set() && input.title == title)
            .map(|input| input.xyz)
    }

    pub fn tally(&self, instance: Instance) -> &Tally {
        self.tally.get(instance)
    }

    /// Instance-tagged program tally entries of all instances.
    pub fn program_tally(&self) -> Vec<String> {
        Instance::ALL
            .iter()
            .flat_map(|i| self.tally.get(*i).program_tagged(*i))
            .collect()
    }

    /// Instance-tagged preview tally entries of all instances.
    pub fn preview_tally(&self) -> Vec<String> {
        Instance::ALL
            .iter()
            .flat_map(|i| self.tally.get(*i).preview_tagged(*i))
            .collect()
    }

    /// Title of the input on program system-wide.
    pub fn effective_program(&self) -> &str {
        self.program.effective()
    }

    /// Title of the input on preview system-wide.
    pub fn effective_preview(&self) -> &str {
        self.preview.effective()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(number: u32, title: &str) -> RosterInput {
        RosterInput {
            number,
            title: title.into(),
            kind: crate::xml::VIRTUAL_SET.into(),
            xyz: Xyz::NEUTRAL,
        }
    }

    fn snapshot(inputs: Vec<RosterInput>, active: u32, preview: u32) -> RosterSnapshot {
        RosterSnapshot {
            inputs,
            active: Some(active),
            preview: Some(preview),
        }
    }

    #[test]
    fn test_replace_not_merge() {
        let mut state = MixerState::default();
        state.replace_roster(
            Instance::Primary,
            &snapshot(vec![input(1, "a1"), input(2, "a2")], 1, 2),
        );
        state.replace_roster(Instance::Secondary, &snapshot(vec![input(1, "b1")], 1, 1));
        state.replace_roster(Instance::Primary, &snapshot(vec![input(3, "a3")], 3, 3));

        let primary = state.roster(Instance::Primary);
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].title, "a3");
        assert_eq!(state.roster(Instance::Secondary)[0].title, "b1");
        assert_eq!(state.roster_len(), 2);
    }

    #[test]
    fn test_effective_active_inputs() {
        let mut state = MixerState::default();
        state.replace_roster(
            Instance::Primary,
            &snapshot(vec![input(1, "a1"), input(2, "a2")], 1, 2),
        );
        assert_eq!(state.effective_program(), "a1");
        assert_eq!(state.effective_preview(), "a2");

        state.replace_roster(
            Instance::Secondary,
            &snapshot(vec![input(4, "b4"), input(5, "b5")], 4, 5),
        );
        assert_eq!(state.effective_program(), "b4");
        assert_eq!(state.effective_preview(), "b5");

        // unknown active number clears the secondary's pointer
        state.replace_roster(Instance::Secondary, &snapshot(vec![], 9, 9));
        assert_eq!(state.effective_program(), "a1");
    }

    #[test]
    fn test_tagged_tallies() {
        let mut state = MixerState::default();
        state.set_tally(Instance::Primary, Tally::parse("12").unwrap());
        state.set_tally(Instance::Secondary, Tally::parse("01").unwrap());
        assert_eq!(state.program_tally(), vec!["A:1", "B:2"]);
        assert_eq!(state.preview_tally(), vec!["A:2"]);
    }
}
