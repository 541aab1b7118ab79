//! Static analysis of a transition table.

use super::transition::TransitionTable;
use crate::core::StateRef;

/// What a region needs to know about its table before it can run.
///
/// States are collected in order of first appearance: each row adds its
/// concrete source, then its concrete target. Pattern sources add nothing;
/// they only ever match states some other row names.
pub(crate) struct TransitionDigest<C> {
    pub states: Vec<StateRef<C>>,
    /// Index of the initial state in `states`.
    pub initial: Option<usize>,
    pub has_source_state_patterns: bool,
    pub has_null_events: bool,
}

impl<C> TransitionDigest<C> {
    pub fn new(table: &TransitionTable<C>) -> Self {
        let mut states: Vec<StateRef<C>> = Vec::new();
        let mut has_source_state_patterns = false;
        let mut has_null_events = false;

        let mut add = |state: &StateRef<C>| {
            if !states.contains(state) {
                states.push(state.clone());
            }
        };

        for row in table.rows() {
            match row.source.as_state() {
                Some(source) => add(source),
                None => has_source_state_patterns = true,
            }
            if let Some(target) = row.target.as_state() {
                add(target);
            }
            has_null_events |= row.event.is_null();
        }

        let initial = table.rows().first().and_then(|first| match first.source.as_state() {
            Some(source) => states.iter().position(|state| state == source),
            None => states.iter().position(|state| first.source.matches(state)),
        });

        Self {
            states,
            initial,
            has_source_state_patterns,
            has_null_events,
        }
    }
}
