//! Command selection from decoded classifier positions.
//!
//! Position 3 is reserved: the classifier may never emit command 3 directly.
//! Command 3 is produced only by the head rotation override, which wins over
//! whatever the classifier decoded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of canonical commands.
pub const COMMAND_COUNT: usize = 9;

/// Classifier position that is always remapped to neutral.
pub const RESERVED_POSITION: usize = 3;

/// A canonical command in `0..=8`. Command 0 is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CommandIndex(u8);

impl CommandIndex {
    pub const NEUTRAL: CommandIndex = CommandIndex(0);
    /// Emitted only by the head rotation override.
    pub const OVERRIDE: CommandIndex = CommandIndex(3);

    /// `None` unless `value` is in `0..=8`.
    pub fn new(value: u8) -> Option<Self> {
        ((value as usize) < COMMAND_COUNT).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Every command, in order.
    pub fn all() -> impl Iterator<Item = CommandIndex> {
        (0..COMMAND_COUNT as u8).map(CommandIndex)
    }
}

impl TryFrom<u8> for CommandIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("command {value} is out of range (expected 0..=8)"))
    }
}

impl From<CommandIndex> for u8 {
    fn from(command: CommandIndex) -> Self {
        command.0
    }
}

impl fmt::Display for CommandIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do when a classifier response has more than one active position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Dispatch one command per active position, in decode order
    #[default]
    AllActive,
    /// Dispatch only the first active position
    FirstActive,
}

/// Map one decoded position to a command.
///
/// Returns `None` for positions outside `0..=8`.
pub fn select_command(position: usize, orientation: f32, threshold: f32) -> Option<CommandIndex> {
    if position >= COMMAND_COUNT {
        return None;
    }
    if orientation > threshold {
        return Some(CommandIndex::OVERRIDE);
    }
    if position == RESERVED_POSITION {
        return Some(CommandIndex::NEUTRAL);
    }
    CommandIndex::new(position as u8)
}

/// Applies the remap and override rules with the operator's settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSelector {
    pub head_rotation_threshold: f32,
    pub policy: DispatchPolicy,
}

impl CommandSelector {
    pub fn new(head_rotation_threshold: f32, policy: DispatchPolicy) -> Self {
        Self {
            head_rotation_threshold,
            policy,
        }
    }

    /// Command for one active position.
    pub fn select(&self, position: usize, orientation: f32) -> Option<CommandIndex> {
        select_command(position, orientation, self.head_rotation_threshold)
    }

    /// Commands to dispatch for the active positions of one response, in order.
    pub fn select_all(&self, positions: &[usize], orientation: f32) -> Vec<CommandIndex> {
        let selected = positions
            .iter()
            .filter_map(|&p| self.select(p, orientation));
        match self.policy {
            DispatchPolicy::AllActive => selected.collect(),
            DispatchPolicy::FirstActive => selected.take(1).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f32 = 0.3;

    fn cmd(value: u8) -> CommandIndex {
        CommandIndex::new(value).unwrap()
    }

    #[test]
    fn test_positions_pass_through() {
        for p in [0usize, 1, 2, 4, 5, 6, 7, 8] {
            assert_eq!(select_command(p, 0.0, THRESHOLD), Some(cmd(p as u8)));
        }
    }

    #[test]
    fn test_reserved_position_becomes_neutral() {
        assert_eq!(select_command(3, 0.1, THRESHOLD), Some(CommandIndex::NEUTRAL));
    }

    #[test]
    fn test_override_beats_classifier() {
        assert_eq!(select_command(7, 0.45, THRESHOLD), Some(CommandIndex::OVERRIDE));
        assert_eq!(select_command(3, 0.45, THRESHOLD), Some(CommandIndex::OVERRIDE));
        assert_eq!(select_command(0, 0.45, THRESHOLD), Some(CommandIndex::OVERRIDE));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert_eq!(select_command(5, THRESHOLD, THRESHOLD), Some(cmd(5)));
    }

    #[test]
    fn test_command_three_only_via_override() {
        for p in 0..COMMAND_COUNT {
            assert_ne!(select_command(p, -1.0, THRESHOLD), Some(cmd(3)));
        }
    }

    #[test]
    fn test_out_of_range_position() {
        assert_eq!(select_command(9, 0.0, THRESHOLD), None);
        assert!(CommandIndex::new(9).is_none());
        assert!(CommandIndex::try_from(12u8).is_err());
    }

    #[test]
    fn test_dispatch_policy() {
        let all = CommandSelector::new(THRESHOLD, DispatchPolicy::AllActive);
        assert_eq!(all.select_all(&[1, 3, 6], 0.0), vec![cmd(1), cmd(0), cmd(6)]);

        let first = CommandSelector::new(THRESHOLD, DispatchPolicy::FirstActive);
        assert_eq!(first.select_all(&[1, 3, 6], 0.0), vec![cmd(1)]);
        assert!(first.select_all(&[], 0.0).is_empty());
    }
}
