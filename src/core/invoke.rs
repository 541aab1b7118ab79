//! Signature polymorphism for user callables.
//!
//! Actions, hooks and guards can be written with the arguments they need and
//! nothing else. The accepted shapes, from most to least specific, are:
//!
//! - `Fn(&mut Scheduler, &mut C, &E)`
//! - `Fn(&mut C, &E)`
//! - `Fn(&mut C)`
//! - `Fn(&E)`
//! - `Fn()`
//!
//! The shape is detected once, when the callable is registered, through the
//! marker type parameter of [`Action`] and [`GuardFn`]. The result is a
//! single erased thunk. A callable typed on an event `E` is *not applicable*
//! to other events: its thunk returns `None` for them.
//!
//! Actions return `()` or `Result<(), E>`; guards return `bool` or
//! `Result<bool, E>`, with any `E: Into<anyhow::Error>`.

use crate::core::event::AnyEvent;
use crate::engine::Scheduler;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Erased action or hook. `None` means the callable does not apply to the event.
pub(crate) type ErasedAction<C> = Arc<
    dyn Fn(&mut Scheduler, &mut C, AnyEvent<'_>) -> Option<anyhow::Result<()>> + Send + Sync,
>;

/// Erased guard. `None` means the guard does not apply to the event.
pub(crate) type ErasedGuard<C> = Arc<
    dyn Fn(&mut Scheduler, &mut C, AnyEvent<'_>) -> Option<anyhow::Result<bool>> + Send + Sync,
>;

pub(crate) fn erase_action<C, F>(f: F) -> ErasedAction<C>
where
    F: Fn(&mut Scheduler, &mut C, AnyEvent<'_>) -> Option<anyhow::Result<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub(crate) fn erase_guard<C, F>(f: F) -> ErasedGuard<C>
where
    F: Fn(&mut Scheduler, &mut C, AnyEvent<'_>) -> Option<anyhow::Result<bool>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Result of an action or hook.
pub trait ActionOutcome {
    fn into_result(self) -> anyhow::Result<()>;
}

impl ActionOutcome for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> ActionOutcome for Result<(), E> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// Result of a guard.
pub trait GuardOutcome {
    fn into_result(self) -> anyhow::Result<bool>;
}

impl GuardOutcome for bool {
    fn into_result(self) -> anyhow::Result<bool> {
        Ok(self)
    }
}

impl<E: Into<anyhow::Error>> GuardOutcome for Result<bool, E> {
    fn into_result(self) -> anyhow::Result<bool> {
        self.map_err(Into::into)
    }
}

/// Marker: `Fn(&mut Scheduler, &mut C, &E)`.
pub struct WithScheduler<E>(PhantomData<fn(&E)>);
/// Marker: `Fn(&mut C, &E)`.
pub struct WithContextAndEvent<E>(PhantomData<fn(&E)>);
/// Marker: `Fn(&mut C)`.
pub struct WithContext;
/// Marker: `Fn(&E)`.
pub struct WithEvent<E>(PhantomData<fn(&E)>);
/// Marker: `Fn()`.
pub struct NoArgs;
/// Marker: an already built [`Guard`](crate::core::Guard).
pub struct Prebuilt;

/// A callable usable as an action or a hook.
///
/// Implemented for every closure shape listed in the [module docs](self);
/// `M` is inferred and never needs to be named.
///
/// # Example
///
/// ```rust
/// use stratum::core::StateConf;
///
/// #[derive(Default)]
/// struct Lamp {
///     log: String,
/// }
///
/// struct Press;
///
/// let on = StateConf::<Lamp>::new("on")
///     .on_entry(|lamp: &mut Lamp| lamp.log.push_str("on;"))
///     .on_event(|lamp: &mut Lamp, _: &Press| lamp.log.push_str("pressed;"))
///     .on_exit(|| {})
///     .build();
/// assert_eq!(on.name(), "on");
/// ```
pub trait Action<C, M>: Sized {
    fn into_erased(self) -> ErasedAction<C>;
}

/// A callable usable as a transition guard.
pub trait GuardFn<C, M>: Sized {
    fn into_erased(self) -> ErasedGuard<C>;
}

impl<C, E, F, R> Action<C, WithScheduler<E>> for F
where
    C: 'static,
    E: Any,
    F: Fn(&mut Scheduler, &mut C, &E) -> R + Send + Sync + 'static,
    R: ActionOutcome,
{
    fn into_erased(self) -> ErasedAction<C> {
        erase_action(move |sched, ctx, event| {
            event
                .downcast_ref::<E>()
                .map(|event| (self)(sched, ctx, event).into_result())
        })
    }
}

impl<C, E, F, R> Action<C, WithContextAndEvent<E>> for F
where
    C: 'static,
    E: Any,
    F: Fn(&mut C, &E) -> R + Send + Sync + 'static,
    R: ActionOutcome,
{
    fn into_erased(self) -> ErasedAction<C> {
        erase_action(move |_sched, ctx, event| {
            event
                .downcast_ref::<E>()
                .map(|event| (self)(ctx, event).into_result())
        })
    }
}

impl<C, F, R> Action<C, WithContext> for F
where
    C: 'static,
    F: Fn(&mut C) -> R + Send + Sync + 'static,
    R: ActionOutcome,
{
    fn into_erased(self) -> ErasedAction<C> {
        erase_action(move |_sched, ctx, _event| Some((self)(ctx).into_result()))
    }
}

impl<C, E, F, R> Action<C, WithEvent<E>> for F
where
    C: 'static,
    E: Any,
    F: Fn(&E) -> R + Send + Sync + 'static,
    R: ActionOutcome,
{
    fn into_erased(self) -> ErasedAction<C> {
        erase_action(move |_sched, _ctx, event| {
            event
                .downcast_ref::<E>()
                .map(|event| (self)(event).into_result())
        })
    }
}

impl<C, F, R> Action<C, NoArgs> for F
where
    C: 'static,
    F: Fn() -> R + Send + Sync + 'static,
    R: ActionOutcome,
{
    fn into_erased(self) -> ErasedAction<C> {
        erase_action(move |_sched, _ctx, _event| Some((self)().into_result()))
    }
}

impl<C, E, F, R> GuardFn<C, WithScheduler<E>> for F
where
    C: 'static,
    E: Any,
    F: Fn(&mut Scheduler, &mut C, &E) -> R + Send + Sync + 'static,
    R: GuardOutcome,
{
    fn into_erased(self) -> ErasedGuard<C> {
        erase_guard(move |sched, ctx, event| {
            event
                .downcast_ref::<E>()
                .map(|event| (self)(sched, ctx, event).into_result())
        })
    }
}

impl<C, E, F, R> GuardFn<C, WithContextAndEvent<E>> for F
where
    C: 'static,
    E: Any,
    F: Fn(&mut C, &E) -> R + Send + Sync + 'static,
    R: GuardOutcome,
{
    fn into_erased(self) -> ErasedGuard<C> {
        erase_guard(move |_sched, ctx, event| {
            event
                .downcast_ref::<E>()
                .map(|event| (self)(ctx, event).into_result())
        })
    }
}

impl<C, F, R> GuardFn<C, WithContext> for F
where
    C: 'static,
    F: Fn(&mut C) -> R + Send + Sync + 'static,
    R: GuardOutcome,
{
    fn into_erased(self) -> ErasedGuard<C> {
        erase_guard(move |_sched, ctx, _event| Some((self)(ctx).into_result()))
    }
}

impl<C, E, F, R> GuardFn<C, WithEvent<E>> for F
where
    C: 'static,
    E: Any,
    F: Fn(&E) -> R + Send + Sync + 'static,
    R: GuardOutcome,
{
    fn into_erased(self) -> ErasedGuard<C> {
        erase_guard(move |_sched, _ctx, event| {
            event
                .downcast_ref::<E>()
                .map(|event| (self)(event).into_result())
        })
    }
}

impl<C, F, R> GuardFn<C, NoArgs> for F
where
    C: 'static,
    F: Fn() -> R + Send + Sync + 'static,
    R: GuardOutcome,
{
    fn into_erased(self) -> ErasedGuard<C> {
        erase_guard(move |_sched, _ctx, _event| Some((self)().into_result()))
    }
}
