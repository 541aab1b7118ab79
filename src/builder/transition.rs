//! Transition rows, their builder and transition tables.

use crate::builder::error::BuildError;
use crate::core::{
    event, Action, ErasedAction, EventPattern, Guard, GuardFn, StatePattern, Target,
};
use std::any::Any;
use std::fmt;

/// One row of a transition table.
///
/// When the region's active state matches `source` and the event matches
/// `event`, the guard is evaluated; if it holds the active state is exited,
/// the action runs and `target` is entered. A `Target::Null` row only runs
/// the action.
pub struct Transition<C> {
    pub source: StatePattern<C>,
    pub event: EventPattern,
    pub target: Target<C>,
    pub(crate) action: Option<ErasedAction<C>>,
    pub(crate) guard: Option<Guard<C>>,
}

impl<C: 'static> Transition<C> {
    /// A row without action or guard.
    pub fn new(
        source: impl Into<StatePattern<C>>,
        event: EventPattern,
        target: impl Into<Target<C>>,
    ) -> Self {
        Self {
            source: source.into(),
            event,
            target: target.into(),
            action: None,
            guard: None,
        }
    }

    pub fn with_action<M>(mut self, action: impl Action<C, M>) -> Self {
        self.action = Some(action.into_erased());
        self
    }

    pub fn with_guard<M>(mut self, guard: impl GuardFn<C, M>) -> Self {
        self.guard = Some(Guard::new(guard));
        self
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }
}

impl<C> Clone for Transition<C> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            event: self.event.clone(),
            target: self.target.clone(),
            action: self.action.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<C> fmt::Debug for Transition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("event", &format_args!("{}", self.event))
            .field("target", &self.target)
            .field("action", &self.action.is_some())
            .field("guard", &self.guard.is_some())
            .finish()
    }
}

/// Builder for constructing transitions with a fluent API.
///
/// # Example
///
/// ```rust
/// use stratum::builder::TransitionBuilder;
/// use stratum::core::StateConf;
///
/// #[derive(Default)]
/// struct Player {
///     volume: u8,
/// }
///
/// struct VolumeUp;
///
/// let playing = StateConf::<Player>::new("playing").build();
///
/// let louder = TransitionBuilder::new()
///     .from(&playing)
///     .on::<VolumeUp>()
///     .internal()
///     .when(|p: &mut Player| p.volume < 10)
///     .action(|p: &mut Player| p.volume += 1)
///     .build()
///     .unwrap();
///
/// assert!(louder.has_guard());
/// ```
pub struct TransitionBuilder<C> {
    source: Option<StatePattern<C>>,
    event: Option<EventPattern>,
    target: Option<Target<C>>,
    action: Option<ErasedAction<C>>,
    guard: Option<Guard<C>>,
}

impl<C: 'static> TransitionBuilder<C> {
    pub fn new() -> Self {
        Self {
            source: None,
            event: None,
            target: None,
            action: None,
            guard: None,
        }
    }

    /// Set the source state or source pattern (required).
    pub fn from(mut self, source: impl Into<StatePattern<C>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Trigger on events of type `E` (required, or use `on_pattern`).
    pub fn on<E: Any>(mut self) -> Self {
        self.event = Some(event::<E>());
        self
    }

    pub fn on_pattern(mut self, pattern: EventPattern) -> Self {
        self.event = Some(pattern);
        self
    }

    /// Set the target state (required, or use `internal`).
    pub fn to(mut self, target: impl Into<Target<C>>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Make this an internal transition: no exit, no entry.
    pub fn internal(mut self) -> Self {
        self.target = Some(Target::Null);
        self
    }

    pub fn action<M>(mut self, action: impl Action<C, M>) -> Self {
        self.action = Some(action.into_erased());
        self
    }

    /// Add a guard predicate (optional).
    pub fn guard(mut self, guard: Guard<C>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<M>(mut self, predicate: impl GuardFn<C, M>) -> Self {
        self.guard = Some(Guard::new(predicate));
        self
    }

    pub fn build(self) -> Result<Transition<C>, BuildError> {
        let source = self.source.ok_or(BuildError::MissingSourceState)?;
        let event = self.event.ok_or(BuildError::MissingEvent)?;
        let target = self.target.ok_or(BuildError::MissingTargetState)?;

        Ok(Transition {
            source,
            event,
            target,
            action: self.action,
            guard: self.guard,
        })
    }
}

impl<C: 'static> Default for TransitionBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered list of transitions. Order is significant: first match wins.
///
/// The first row's source is the region's initial state.
///
/// # Example
///
/// ```rust
/// use stratum::builder::TransitionTable;
/// use stratum::core::{event, StateConf};
///
/// struct Press;
///
/// let off = StateConf::<()>::new("off").build();
/// let on = StateConf::<()>::new("on").build();
///
/// let table = TransitionTable::new()
///     .add(&off, event::<Press>(), &on)
///     .add(&on, event::<Press>(), &off);
///
/// assert_eq!(table.len(), 2);
/// ```
pub struct TransitionTable<C> {
    rows: Vec<Transition<C>>,
}

impl<C: 'static> TransitionTable<C> {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append a row without action or guard.
    pub fn add(
        self,
        source: impl Into<StatePattern<C>>,
        event: EventPattern,
        target: impl Into<Target<C>>,
    ) -> Self {
        self.add_transition(Transition::new(source, event, target))
    }

    /// Append a pre-built transition.
    pub fn add_transition(mut self, transition: Transition<C>) -> Self {
        self.rows.push(transition);
        self
    }

    /// Append a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(self, builder: TransitionBuilder<C>) -> Result<Self, BuildError> {
        let transition = builder.build()?;
        Ok(self.add_transition(transition))
    }

    /// Append multiple transitions at once.
    pub fn transitions(mut self, transitions: impl IntoIterator<Item = Transition<C>>) -> Self {
        self.rows.extend(transitions);
        self
    }
}

impl<C> TransitionTable<C> {
    pub fn rows(&self) -> &[Transition<C>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<C: 'static> Default for TransitionTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for TransitionTable<C> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<C> fmt::Debug for TransitionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows.iter()).finish()
    }
}
