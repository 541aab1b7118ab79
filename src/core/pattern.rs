//! Source-state patterns and transition targets.

use super::state::StateRef;
use std::fmt;
use std::sync::Arc;

/// Predicate over states, used by [`StatePattern::AnyIf`] and
/// [`StatePattern::AnyIfNot`].
pub type StatePredicate<C> = Arc<dyn Fn(&StateRef<C>) -> bool + Send + Sync>;

/// Source-state specifier of a transition row.
///
/// A pattern other than [`StatePattern::State`] stands for a set of states.
/// Such rows are expanded into one concrete row per matching state when the
/// region is built, in the order the states first appear in the table.
///
/// # Example
///
/// ```rust
/// use stratum::core::{StateConf, StatePattern};
///
/// let idle = StateConf::<()>::new("idle").build();
/// let busy = StateConf::<()>::new("busy").build();
/// let failed = StateConf::<()>::new("failed").build();
///
/// let recoverable = StatePattern::any_but([&failed]);
/// assert!(recoverable.matches(&idle));
/// assert!(recoverable.matches(&busy));
/// assert!(!recoverable.matches(&failed));
/// ```
pub enum StatePattern<C> {
    State(StateRef<C>),
    Any,
    AnyOf(Vec<StateRef<C>>),
    AnyBut(Vec<StateRef<C>>),
    AnyIf(StatePredicate<C>),
    AnyIfNot(StatePredicate<C>),
}

impl<C> StatePattern<C> {
    pub fn any_of<'a>(states: impl IntoIterator<Item = &'a StateRef<C>>) -> Self
    where
        C: 'a,
    {
        Self::AnyOf(states.into_iter().cloned().collect())
    }

    pub fn any_but<'a>(states: impl IntoIterator<Item = &'a StateRef<C>>) -> Self
    where
        C: 'a,
    {
        Self::AnyBut(states.into_iter().cloned().collect())
    }

    pub fn any_if<F>(predicate: F) -> Self
    where
        F: Fn(&StateRef<C>) -> bool + Send + Sync + 'static,
    {
        Self::AnyIf(Arc::new(predicate))
    }

    pub fn any_if_not<F>(predicate: F) -> Self
    where
        F: Fn(&StateRef<C>) -> bool + Send + Sync + 'static,
    {
        Self::AnyIfNot(Arc::new(predicate))
    }

    pub fn matches(&self, state: &StateRef<C>) -> bool {
        match self {
            Self::State(s) => s == state,
            Self::Any => true,
            Self::AnyOf(states) => states.contains(state),
            Self::AnyBut(states) => !states.contains(state),
            Self::AnyIf(predicate) => predicate(state),
            Self::AnyIfNot(predicate) => !predicate(state),
        }
    }

    /// Whether this pattern denotes a set of states rather than one state.
    pub fn is_pattern(&self) -> bool {
        !matches!(self, Self::State(_))
    }

    pub fn as_state(&self) -> Option<&StateRef<C>> {
        match self {
            Self::State(state) => Some(state),
            _ => None,
        }
    }
}

impl<C> Clone for StatePattern<C> {
    fn clone(&self) -> Self {
        match self {
            Self::State(s) => Self::State(s.clone()),
            Self::Any => Self::Any,
            Self::AnyOf(states) => Self::AnyOf(states.clone()),
            Self::AnyBut(states) => Self::AnyBut(states.clone()),
            Self::AnyIf(predicate) => Self::AnyIf(Arc::clone(predicate)),
            Self::AnyIfNot(predicate) => Self::AnyIfNot(Arc::clone(predicate)),
        }
    }
}

impl<C> fmt::Debug for StatePattern<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<C>(states: &[StateRef<C>]) -> Vec<&str> {
            states.iter().map(StateRef::name).collect()
        }
        match self {
            Self::State(s) => write!(f, "{}", s.name()),
            Self::Any => f.write_str("any"),
            Self::AnyOf(states) => write!(f, "any_of({:?})", names(states)),
            Self::AnyBut(states) => write!(f, "any_but({:?})", names(states)),
            Self::AnyIf(_) => f.write_str("any_if(..)"),
            Self::AnyIfNot(_) => f.write_str("any_if_not(..)"),
        }
    }
}

impl<C> From<StateRef<C>> for StatePattern<C> {
    fn from(state: StateRef<C>) -> Self {
        Self::State(state)
    }
}

impl<C> From<&StateRef<C>> for StatePattern<C> {
    fn from(state: &StateRef<C>) -> Self {
        Self::State(state.clone())
    }
}

/// Target of a transition row.
///
/// `Null` makes the row an internal transition: the action runs, the active
/// state is neither exited nor re-entered.
pub enum Target<C> {
    State(StateRef<C>),
    Null,
}

impl<C> Target<C> {
    pub fn as_state(&self) -> Option<&StateRef<C>> {
        match self {
            Self::State(state) => Some(state),
            Self::Null => None,
        }
    }
}

impl<C> Clone for Target<C> {
    fn clone(&self) -> Self {
        match self {
            Self::State(s) => Self::State(s.clone()),
            Self::Null => Self::Null,
        }
    }
}

impl<C> fmt::Debug for Target<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(s) => write!(f, "{}", s.name()),
            Self::Null => f.write_str("null"),
        }
    }
}

impl<C> From<StateRef<C>> for Target<C> {
    fn from(state: StateRef<C>) -> Self {
        Self::State(state)
    }
}

impl<C> From<&StateRef<C>> for Target<C> {
    fn from(state: &StateRef<C>) -> Self {
        Self::State(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateConf;

    fn states() -> (StateRef<()>, StateRef<()>, StateRef<()>) {
        (
            StateConf::new("red").build(),
            StateConf::new("green").build(),
            StateConf::new("blue").build(),
        )
    }

    #[test]
    fn concrete_pattern_matches_only_its_state() {
        let (red, green, _) = states();
        let pattern = StatePattern::from(&red);

        assert!(pattern.matches(&red));
        assert!(!pattern.matches(&green));
        assert!(!pattern.is_pattern());
    }

    #[test]
    fn set_patterns_match_members() {
        let (red, green, blue) = states();

        let any_of = StatePattern::any_of([&red, &green]);
        assert!(any_of.matches(&green));
        assert!(!any_of.matches(&blue));

        let any_but = StatePattern::any_but([&red]);
        assert!(!any_but.matches(&red));
        assert!(any_but.matches(&blue));
        assert!(any_but.is_pattern());
    }

    #[test]
    fn predicate_patterns_use_state_handle() {
        let (red, green, _) = states();

        let warm = StatePattern::any_if(|s: &StateRef<()>| s.name() == "red");
        assert!(warm.matches(&red));
        assert!(!warm.matches(&green));

        let cold = StatePattern::any_if_not(|s: &StateRef<()>| s.name() == "red");
        assert!(!cold.matches(&red));
        assert!(cold.matches(&green));
    }

    #[test]
    fn wildcard_matches_everything() {
        let (red, green, blue) = states();
        let any = StatePattern::<()>::Any;

        assert!([&red, &green, &blue].iter().all(|s| any.matches(s)));
    }

    #[test]
    fn null_target_has_no_state() {
        let (red, _, _) = states();

        assert!(Target::<()>::Null.as_state().is_none());
        assert_eq!(Target::from(&red).as_state(), Some(&red));
    }

    #[test]
    fn debug_lists_state_names() {
        let (red, green, _) = states();

        assert_eq!(
            format!("{:?}", StatePattern::any_of([&red, &green])),
            r#"any_of(["red", "green"])"#
        );
        assert_eq!(format!("{:?}", StatePattern::any_but([&red])), r#"any_but(["red"])"#);
        assert_eq!(format!("{:?}", StatePattern::from(red)), "red");
    }
}
