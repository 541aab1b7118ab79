//! Guard predicates for controlling state transitions.
//!
//! Guards decide whether a matching transition row can fire. They accept the
//! same argument shapes as actions (see [`invoke`](super::invoke)) and can be
//! combined with boolean operators.

use super::event::AnyEvent;
use super::invoke::{erase_guard, ErasedGuard, GuardFn, Prebuilt};
use crate::engine::Scheduler;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Predicate that determines if a transition can execute.
///
/// A guard typed on an event evaluates to `false` for any other event.
/// A guard returning `Err` fails the transition attempt and the error goes
/// through the machine's exception policy.
///
/// # Example
///
/// ```rust
/// use stratum::core::Guard;
///
/// struct Thermostat {
///     celsius: i32,
/// }
///
/// struct Tick;
///
/// let too_hot = Guard::new(|t: &mut Thermostat| t.celsius > 30);
/// let too_cold = Guard::new(|t: &mut Thermostat| t.celsius < 15);
/// let out_of_range = too_hot.or(too_cold);
///
/// assert!(out_of_range.check(&mut Thermostat { celsius: 35 }, &Tick));
/// assert!(!out_of_range.check(&mut Thermostat { celsius: 20 }, &Tick));
/// ```
pub struct Guard<C> {
    predicate: ErasedGuard<C>,
}

impl<C: 'static> Guard<C> {
    /// Create a guard from a predicate of any supported shape.
    pub fn new<M>(predicate: impl GuardFn<C, M>) -> Self {
        Guard {
            predicate: predicate.into_erased(),
        }
    }

    /// Evaluate the guard outside of a running machine.
    ///
    /// The guard runs against a throwaway [`Scheduler`]: operations it
    /// requests are dropped. An error counts as `false`; use
    /// [`try_check`](Guard::try_check) to see it.
    pub fn check<E: Any>(&self, context: &mut C, event: &E) -> bool {
        matches!(self.try_check(context, event), Ok(true))
    }

    /// Like [`check`](Guard::check), but returns the guard's error.
    pub fn try_check<E: Any>(&self, context: &mut C, event: &E) -> anyhow::Result<bool> {
        let mut sched = Scheduler::default();
        self.evaluate(&mut sched, context, AnyEvent::of(event))
    }

    /// Both guards hold. `other` is not evaluated when `self` is false.
    pub fn and(self, other: Guard<C>) -> Guard<C> {
        let (left, right) = (self.predicate, other.predicate);
        Guard {
            predicate: erase_guard(move |sched, ctx, event| {
                match left(sched, ctx, event)? {
                    Ok(true) => right(sched, ctx, event),
                    outcome => Some(outcome),
                }
            }),
        }
    }

    /// Either guard holds. `other` is not evaluated when `self` is true.
    ///
    /// A side that does not apply to the event counts as false.
    pub fn or(self, other: Guard<C>) -> Guard<C> {
        let (left, right) = (self.predicate, other.predicate);
        Guard {
            predicate: erase_guard(move |sched, ctx, event| {
                match left(sched, ctx, event) {
                    Some(Ok(false)) | None => right(sched, ctx, event),
                    outcome => outcome,
                }
            }),
        }
    }

    /// Exactly one of the guards holds. Applies only when both do.
    pub fn xor(self, other: Guard<C>) -> Guard<C> {
        let (left, right) = (self.predicate, other.predicate);
        Guard {
            predicate: erase_guard(move |sched, ctx, event| {
                let l = left(sched, ctx, event)?;
                let r = right(sched, ctx, event)?;
                Some(l.and_then(|l| r.map(|r| l ^ r)))
            }),
        }
    }

    /// Negation. A guard that does not apply to the event still does not
    /// apply once negated, so the row stays closed.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Guard<C> {
        let inner = self.predicate;
        Guard {
            predicate: erase_guard(move |sched, ctx, event| {
                inner(sched, ctx, event).map(|outcome| outcome.map(|holds| !holds))
            }),
        }
    }
}

impl<C> Guard<C> {
    pub(crate) fn evaluate(
        &self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        evaluate(&self.predicate, sched, ctx, event)
    }
}

fn evaluate<C>(
    predicate: &ErasedGuard<C>,
    sched: &mut Scheduler,
    ctx: &mut C,
    event: AnyEvent<'_>,
) -> anyhow::Result<bool> {
    predicate(sched, ctx, event).unwrap_or(Ok(false))
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        Guard {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C> fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

impl<C: 'static> GuardFn<C, Prebuilt> for Guard<C> {
    fn into_erased(self) -> ErasedGuard<C> {
        self.predicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Meter {
        level: u32,
        evaluated: u32,
    }

    struct Sample(u32);
    struct Reset;

    fn counting(threshold: u32) -> Guard<Meter> {
        Guard::new(move |m: &mut Meter| {
            m.evaluated += 1;
            m.level > threshold
        })
    }

    #[test]
    fn guard_reads_context() {
        let guard = Guard::new(|m: &mut Meter| m.level > 3);

        assert!(guard.check(&mut Meter { level: 5, ..Default::default() }, &Reset));
        assert!(!guard.check(&mut Meter::default(), &Reset));
    }

    #[test]
    fn typed_guard_is_false_for_other_events() {
        let guard = Guard::<Meter>::new(|s: &Sample| s.0 > 10);

        assert!(guard.check(&mut Meter::default(), &Sample(11)));
        assert!(!guard.check(&mut Meter::default(), &Sample(2)));
        assert!(!guard.check(&mut Meter::default(), &Reset));
    }

    #[test]
    fn and_short_circuits() {
        let guard = counting(10).and(counting(0));
        let mut meter = Meter { level: 5, ..Default::default() };

        assert!(!guard.check(&mut meter, &Reset));
        assert_eq!(meter.evaluated, 1);
    }

    #[test]
    fn or_short_circuits() {
        let guard = counting(0).or(counting(10));
        let mut meter = Meter { level: 5, ..Default::default() };

        assert!(guard.check(&mut meter, &Reset));
        assert_eq!(meter.evaluated, 1);
    }

    #[test]
    fn xor_requires_exactly_one() {
        let mut meter = Meter { level: 5, ..Default::default() };

        assert!(counting(0).xor(counting(10)).check(&mut meter, &Reset));
        assert!(!counting(0).xor(counting(1)).check(&mut meter, &Reset));
        assert_eq!(meter.evaluated, 4);
    }

    #[test]
    fn not_negates() {
        let guard = Guard::<Meter>::new(|| false).not();

        assert!(guard.check(&mut Meter::default(), &Reset));
    }

    #[test]
    fn negated_typed_guard_stays_closed_for_other_events() {
        let guard = Guard::<Meter>::new(|s: &Sample| s.0 > 10).not();

        assert!(guard.check(&mut Meter::default(), &Sample(2)));
        assert!(!guard.check(&mut Meter::default(), &Sample(11)));
        assert!(!guard.check(&mut Meter::default(), &Reset));
    }

    #[test]
    fn or_falls_back_when_one_side_does_not_apply() {
        let guard = Guard::<Meter>::new(|s: &Sample| s.0 > 10).or(counting(0));
        let mut meter = Meter { level: 5, ..Default::default() };

        assert!(guard.check(&mut meter, &Reset));
        assert_eq!(meter.evaluated, 1);
        assert!(!Guard::<Meter>::new(|s: &Sample| s.0 > 10)
            .xor(counting(0))
            .check(&mut meter, &Reset));
    }

    #[test]
    fn failing_guard_is_not_satisfied() {
        let guard = Guard::new(|_: &mut Meter| -> anyhow::Result<bool> {
            anyhow::bail!("probe disconnected")
        });
        let mut sched = Scheduler::default();

        assert!(!guard.check(&mut Meter::default(), &Reset));
        assert!(guard.try_check(&mut Meter::default(), &Reset).is_err());
        assert!(guard
            .evaluate(&mut sched, &mut Meter::default(), AnyEvent::of(&Reset))
            .is_err());
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::new(|m: &mut Meter, s: &Sample| s.0 >= m.level);
        let mut meter = Meter { level: 4, ..Default::default() };

        let first = guard.check(&mut meter, &Sample(4));
        let second = guard.check(&mut meter, &Sample(4));
        assert_eq!(first, second);
    }
}
