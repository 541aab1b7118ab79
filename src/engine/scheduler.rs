//! The machine handle given to user code.

use super::error::MachineError;
use super::queue::FunctionQueue;
use crate::builder::MachineOptions;
use crate::core::{AnyEvent, StateHistory, StateTransition};
use crate::events::{Start, Stop};
use std::any::Any;
use std::fmt;

/// Operations a [`Scheduler`] can defer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operation {
    Start,
    Stop,
    ProcessEvent,
}

/// Something able to run a deferred operation. Implemented by the machine.
pub(crate) trait OperationTarget {
    fn execute_one_operation(
        &mut self,
        operation: Operation,
        event: AnyEvent<'_>,
    ) -> Result<(), MachineError>;
}

pub(crate) type OperationResult = Result<(), MachineError>;

pub(crate) type OperationThunk =
    fn(&mut (dyn OperationTarget + 'static), AnyEvent<'_>) -> OperationResult;

pub(crate) type OperationQueue = FunctionQueue<dyn OperationTarget + 'static, OperationResult>;

fn start_thunk(target: &mut (dyn OperationTarget + 'static), event: AnyEvent<'_>) -> OperationResult {
    target.execute_one_operation(Operation::Start, event)
}

fn stop_thunk(target: &mut (dyn OperationTarget + 'static), event: AnyEvent<'_>) -> OperationResult {
    target.execute_one_operation(Operation::Stop, event)
}

fn process_event_thunk(
    target: &mut (dyn OperationTarget + 'static),
    event: AnyEvent<'_>,
) -> OperationResult {
    target.execute_one_operation(Operation::ProcessEvent, event)
}

impl Operation {
    pub(crate) fn thunk(self) -> OperationThunk {
        match self {
            Operation::Start => start_thunk,
            Operation::Stop => stop_thunk,
            Operation::ProcessEvent => process_event_thunk,
        }
    }
}

/// Handle through which actions, guards and hooks talk to their machine.
///
/// Nothing requested here runs right away: every operation is queued and
/// executed once the operation in progress has completed, in request order.
/// This is what gives the machine its run-to-completion guarantee.
///
/// # Example
///
/// ```rust
/// use stratum::core::{event, StateConf};
/// use stratum::engine::Scheduler;
/// use stratum::builder::{MachineBuilder, TransitionTable};
///
/// struct Ping;
/// struct Pong;
///
/// #[derive(Default)]
/// struct Rally {
///     log: Vec<&'static str>,
/// }
///
/// let left = StateConf::<Rally>::new("left")
///     .on_exit(|r: &mut Rally| r.log.push("left"))
///     .build();
/// let right = StateConf::<Rally>::new("right")
///     .on_entry(|sched: &mut Scheduler, r: &mut Rally, _: &Ping| {
///         r.log.push("right");
///         sched.process_event(Pong);
///     })
///     .build();
///
/// let table = TransitionTable::new()
///     .add(&left, event::<Ping>(), &right)
///     .add(&right, event::<Pong>(), &left);
///
/// let mut machine = MachineBuilder::new()
///     .transition_table(table)
///     .build(Rally::default())
///     .unwrap();
///
/// machine.process_event(Ping).unwrap();
/// assert!(machine.is_active_state(&left));
/// assert_eq!(machine.context().log, vec!["left", "right"]);
/// ```
#[derive(Default)]
pub struct Scheduler {
    pub(crate) queue: OperationQueue,
    raised: Vec<anyhow::Error>,
    history: Option<StateHistory>,
}

impl Scheduler {
    pub(crate) fn new(options: &MachineOptions) -> Self {
        Self {
            queue: OperationQueue::with_small_event_size(options.small_event_size),
            raised: Vec::new(),
            history: options.record_history.then(StateHistory::new),
        }
    }

    /// Process `event` once the current operation has completed.
    pub fn process_event<E: Any>(&mut self, event: E) {
        self.enqueue(Operation::ProcessEvent, event);
    }

    /// Start the machine once the current operation has completed.
    pub fn start(&mut self) {
        self.start_with(Start);
    }

    pub fn start_with<E: Any>(&mut self, event: E) {
        self.enqueue(Operation::Start, event);
    }

    /// Stop the machine once the current operation has completed.
    pub fn stop(&mut self) {
        self.stop_with(Stop);
    }

    pub fn stop_with<E: Any>(&mut self, event: E) {
        self.enqueue(Operation::Stop, event);
    }

    /// Number of operations waiting to run.
    pub fn pending_operations(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn enqueue<E: Any>(&mut self, operation: Operation, event: E) {
        tracing::trace!(
            ?operation,
            event = std::any::type_name::<E>(),
            pending = self.queue.len(),
            "deferring operation"
        );
        self.queue.push(event, operation.thunk());
    }

    /// Hand an error caught below the machine to the exception policy.
    pub(crate) fn raise(&mut self, error: anyhow::Error) {
        self.raised.push(error);
    }

    pub(crate) fn take_raised(&mut self) -> Vec<anyhow::Error> {
        std::mem::take(&mut self.raised)
    }

    pub(crate) fn record(&mut self, transition: impl FnOnce() -> StateTransition) {
        if let Some(history) = &mut self.history {
            history.push(transition());
        }
    }

    pub(crate) fn history(&self) -> Option<&StateHistory> {
        self.history.as_ref()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.queue.len())
            .field("raised", &self.raised.len())
            .field("history", &self.history.as_ref().map(StateHistory::len))
            .finish()
    }
}
