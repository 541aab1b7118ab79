//! Event identity and event patterns.
//!
//! Events are plain `'static` values. The engine never needs to know their
//! concrete type: it carries them as an [`AnyEvent`] and matches transition
//! rows against them with an [`EventPattern`].

use crate::events::Null;
use std::any::{Any, TypeId};
use std::fmt;

/// Runtime identity of an event type.
#[derive(Clone, Copy, Debug)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Identity of the event type `E`.
    pub fn of<E: Any>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Fully qualified type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `event` is a value of this type.
    pub fn matches(&self, event: &dyn Any) -> bool {
        event.type_id() == self.id
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl std::hash::Hash for EventType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Borrowed, type-erased view of an event being processed.
///
/// Keeps the static type name next to the value so that logs and history
/// can name the event without knowing its type.
#[derive(Clone, Copy)]
pub struct AnyEvent<'a> {
    value: &'a dyn Any,
    type_name: &'static str,
}

impl<'a> AnyEvent<'a> {
    /// Erase a typed event.
    pub fn of<E: Any>(event: &'a E) -> Self {
        Self {
            value: event,
            type_name: std::any::type_name::<E>(),
        }
    }

    pub(crate) fn from_parts(value: &'a dyn Any, type_name: &'static str) -> Self {
        Self { value, type_name }
    }

    pub fn value(&self) -> &'a dyn Any {
        self.value
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<E: Any>(&self) -> bool {
        self.value.is::<E>()
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&'a E> {
        self.value.downcast_ref::<E>()
    }
}

impl fmt::Debug for AnyEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyEvent").field(&self.type_name).finish()
    }
}

/// Event specifier of a transition row or of an event hook.
///
/// `Any` and `AnyBut` never match the [`Null`] event, so that a wildcard row
/// cannot be picked up by the anonymous transition scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPattern {
    /// Exactly one event type.
    Exactly(EventType),
    /// Every event except the null event.
    Any,
    /// Any of the listed event types.
    AnyOf(Vec<EventType>),
    /// Every event except the listed ones and the null event.
    AnyBut(Vec<EventType>),
    /// The null event: the row is an anonymous transition.
    Null,
}

impl EventPattern {
    pub fn of<E: Any>() -> Self {
        if TypeId::of::<E>() == TypeId::of::<Null>() {
            Self::Null
        } else {
            Self::Exactly(EventType::of::<E>())
        }
    }

    pub fn any_of(types: impl IntoIterator<Item = EventType>) -> Self {
        Self::AnyOf(types.into_iter().collect())
    }

    pub fn any_but(types: impl IntoIterator<Item = EventType>) -> Self {
        Self::AnyBut(types.into_iter().collect())
    }

    pub fn matches(&self, event: &dyn Any) -> bool {
        let is_null = event.is::<Null>();
        match self {
            Self::Exactly(ty) => ty.matches(event),
            Self::Any => !is_null,
            Self::AnyOf(types) => types.iter().any(|ty| ty.matches(event)),
            Self::AnyBut(types) => !is_null && !types.iter().any(|ty| ty.matches(event)),
            Self::Null => is_null,
        }
    }

    /// Whether the pattern accepts the null event, which makes its row an
    /// anonymous transition.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Exactly(ty) => *ty == EventType::of::<Null>(),
            Self::AnyOf(types) => types.contains(&EventType::of::<Null>()),
            Self::Any | Self::AnyBut(_) => false,
        }
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[EventType]| {
            types
                .iter()
                .map(EventType::name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Self::Exactly(ty) => f.write_str(ty.name()),
            Self::Any => f.write_str("any"),
            Self::AnyOf(types) => write!(f, "any_of({})", join(types)),
            Self::AnyBut(types) => write!(f, "any_but({})", join(types)),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Pattern matching exactly the event type `E`.
pub fn event<E: Any>() -> EventPattern {
    EventPattern::of::<E>()
}
