//! State transition history tracking.
//!
//! When `MachineOptions::record_history` is set, every external transition
//! taken by any region is appended to a [`StateHistory`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use stratum::core::StateTransition;
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     region: "root[0]".to_string(),
///     from: "off".to_string(),
///     to: "on".to_string(),
///     event: "PowerPress".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to, "on");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Path of the region that transitioned
    pub region: String,
    /// Name of the state being left
    pub from: String,
    /// Name of the state being entered
    pub to: String,
    /// Type name of the event that triggered the transition
    pub event: String,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of state transitions.
///
/// # Example
///
/// ```rust
/// use stratum::core::{StateHistory, StateTransition};
/// use chrono::Utc;
///
/// let step = |from: &str, to: &str| StateTransition {
///     region: "root[0]".to_string(),
///     from: from.to_string(),
///     to: to.to_string(),
///     event: "Next".to_string(),
///     timestamp: Utc::now(),
/// };
///
/// let history = StateHistory::new()
///     .record(step("start", "middle"))
///     .record(step("middle", "end"));
///
/// assert_eq!(history.get_path(), vec!["start", "middle", "end"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<StateTransition>,
}

impl StateHistory {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, transition: StateTransition) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Append a transition in place.
    pub fn push(&mut self, transition: StateTransition) {
        self.transitions.push(transition);
    }

    /// Names of the states traversed: the first source, then every target.
    ///
    /// Meaningful for the history of a single region; use
    /// [`StateHistory::for_region`] to narrow a machine-wide history first.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_str());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_str());
        }
        path
    }

    /// Transitions of one region, in order.
    pub fn for_region(&self, region: &str) -> StateHistory {
        StateHistory {
            transitions: self
                .transitions
                .iter()
                .filter(|t| t.region == region)
                .cloned()
                .collect(),
        }
    }

    /// Time elapsed between the first and the last transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
