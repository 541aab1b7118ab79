//! Transition tables resolved against their region's states.

use super::transition::TransitionTable;
use crate::core::{ErasedAction, EventPattern, Guard, StateRef};

/// A row with a concrete target index. Its source is the state whose
/// candidate list holds it.
pub(crate) struct ResolvedTransition<C> {
    pub event: EventPattern,
    /// `None` for internal transitions.
    pub target: Option<usize>,
    pub action: Option<ErasedAction<C>>,
    pub guard: Option<Guard<C>>,
}

/// Every row of a table, pattern rows expanded, indexed by source state.
///
/// Within one source, rows keep table order, so scanning
/// [`candidates`](ResolvedTable::candidates) front to back gives
/// first-match semantics.
pub(crate) struct ResolvedTable<C> {
    rows: Vec<ResolvedTransition<C>>,
    by_source: Vec<Vec<usize>>,
}

impl<C> ResolvedTable<C> {
    /// Resolve `table` against `states`, the digest of the same table.
    pub fn resolve(table: &TransitionTable<C>, states: &[StateRef<C>]) -> Self {
        let index_of = |state: &StateRef<C>| states.iter().position(|s| s == state);

        let mut rows = Vec::new();
        let mut by_source = vec![Vec::new(); states.len()];

        for transition in table.rows() {
            let target = transition.target.as_state().and_then(index_of);
            let sources: Vec<usize> = match transition.source.as_state() {
                Some(source) => index_of(source).into_iter().collect(),
                None => states
                    .iter()
                    .enumerate()
                    .filter(|(_, state)| transition.source.matches(state))
                    .map(|(index, _)| index)
                    .collect(),
            };

            for source in sources {
                by_source[source].push(rows.len());
                rows.push(ResolvedTransition {
                    event: transition.event.clone(),
                    target,
                    action: transition.action.clone(),
                    guard: transition.guard.clone(),
                });
            }
        }

        Self { rows, by_source }
    }

    /// Row indices whose source is `source`, in table order.
    pub fn candidates(&self, source: usize) -> &[usize] {
        self.by_source.get(source).map_or(&[][..], Vec::as_slice)
    }

    pub fn row(&self, index: usize) -> &ResolvedTransition<C> {
        &self.rows[index]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
