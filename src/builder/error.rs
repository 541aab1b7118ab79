//! Build errors for machines, regions and transitions.

use crate::engine::MachineError;
use thiserror::Error;

/// Errors that can occur when building transitions and machines.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Transition source state not specified. Call .from(state)")]
    MissingSourceState,

    #[error("Transition event not specified. Call .on::<Event>() or .on_pattern(pattern)")]
    MissingEvent,

    #[error("Transition target not specified. Call .to(state) or .internal()")]
    MissingTargetState,

    #[error("No transition tables defined. Add at least one with .transition_table(table)")]
    NoTransitionTables,

    #[error("Invalid configuration: {}", describe(.0))]
    InvalidConfiguration(Vec<ConfError>),

    #[error("Machine failed to start: {0}")]
    Start(#[from] MachineError),
}

impl BuildError {
    /// Configuration problems, when the build failed validation.
    pub fn conf_errors(&self) -> &[ConfError] {
        match self {
            Self::InvalidConfiguration(errors) => errors,
            _ => &[],
        }
    }
}

fn describe(errors: &[ConfError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A configuration problem found while validating a transition table.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfError {
    #[error("Region {region} has an empty transition table")]
    EmptyTransitionTable { region: String },

    #[error("Region {region} has no initial state: the first row's source matches no state")]
    NoInitialState { region: String },

    #[error("Region {region} has two distinct states named '{name}'")]
    DuplicateStateName { region: String, name: String },

    #[error("State '{state}' in region {region} has both shared regions and a submachine")]
    AmbiguousComposite { region: String, state: String },
}

impl ConfError {
    pub fn region(&self) -> &str {
        match self {
            Self::EmptyTransitionTable { region }
            | Self::NoInitialState { region }
            | Self::DuplicateStateName { region, .. }
            | Self::AmbiguousComposite { region, .. } => region,
        }
    }
}
