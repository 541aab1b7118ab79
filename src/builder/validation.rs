//! Build-time validation of transition tables.
//!
//! Every check runs and every problem is reported, so a broken configuration
//! can be fixed in one pass instead of one error at a time.

use super::digest::TransitionDigest;
use super::error::ConfError;
use super::transition::TransitionTable;
use crate::core::StateRef;
use crate::engine::RegionPath;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::warn;

pub(crate) type TableValidation = Validation<(), NonEmptyVec<ConfError>>;

/// Validate one region's table against its digest.
///
/// An empty table is reported once and nothing else is checked.
pub(crate) fn validate_table<C>(
    path: &RegionPath,
    table: &TransitionTable<C>,
    digest: &TransitionDigest<C>,
) -> TableValidation {
    let region = path.to_string();

    if table.is_empty() {
        return Validation::fail(ConfError::EmptyTransitionTable { region });
    }

    let mut checks: Vec<TableValidation> = vec![check_initial_state(&region, digest)];
    checks.extend(check_state_names(&region, &digest.states));
    checks.extend(digest.states.iter().map(|state| check_composite(&region, state)));

    warn_unmatched_patterns(&region, table, digest);

    Validation::all_vec(checks).map(|_| ())
}

/// Flatten a validation into the error list regions accumulate.
pub(crate) fn into_errors(validation: TableValidation) -> Vec<ConfError> {
    match validation {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}

fn check_initial_state<C>(region: &str, digest: &TransitionDigest<C>) -> TableValidation {
    if digest.initial.is_some() {
        Validation::success(())
    } else {
        Validation::fail(ConfError::NoInitialState {
            region: region.to_string(),
        })
    }
}

/// Two distinct states sharing a name would make paths and snapshots ambiguous.
fn check_state_names<C>(region: &str, states: &[StateRef<C>]) -> Vec<TableValidation> {
    states
        .iter()
        .enumerate()
        .filter(|(index, state)| {
            states[..*index]
                .iter()
                .any(|earlier| earlier.name() == state.name())
        })
        .map(|(_, state)| {
            Validation::fail(ConfError::DuplicateStateName {
                region: region.to_string(),
                name: state.name().to_string(),
            })
        })
        .collect()
}

fn check_composite<C>(region: &str, state: &StateRef<C>) -> TableValidation {
    let def = state.def();
    if !def.regions.is_empty() && def.submachine.is_some() {
        Validation::fail(ConfError::AmbiguousComposite {
            region: region.to_string(),
            state: state.name().to_string(),
        })
    } else {
        Validation::success(())
    }
}

/// A pattern row matching no state never fires. Legal, but most likely a
/// mistake.
fn warn_unmatched_patterns<C>(
    region: &str,
    table: &TransitionTable<C>,
    digest: &TransitionDigest<C>,
) {
    if !digest.has_source_state_patterns {
        return;
    }
    for (row, transition) in table.rows().iter().enumerate() {
        if transition.source.is_pattern()
            && !digest.states.iter().any(|state| transition.source.matches(state))
        {
            warn!(region, row, pattern = ?transition.source, "source pattern matches no state");
        }
    }
}
