//! Type-erased FIFO of deferred calls.
//!
//! Each entry owns a copy of an event value and a function pointer that
//! knows the event's concrete type. Events no larger than the inline buffer
//! (see [`SmallEventSize`]) are stored in place; bigger ones are boxed.

use crate::core::AnyEvent;
use serde::{Deserialize, Serialize};
use smallbox::space::{S1, S16, S2, S4, S8};
use smallbox::{smallbox, SmallBox};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::mem::size_of;

/// Capacity of the inline event buffer, in machine words.
///
/// Events that fit, and are no more aligned than a `usize`, are stored in the
/// queue entry itself. Every entry is as large as the buffer, so a bigger
/// buffer trades memory for fewer allocations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallEventSize {
    Words1,
    #[default]
    Words2,
    Words4,
    Words8,
    Words16,
}

impl SmallEventSize {
    /// Smallest buffer holding `bytes`, `None` when no buffer is that large.
    pub fn at_least(bytes: usize) -> Option<Self> {
        [
            Self::Words1,
            Self::Words2,
            Self::Words4,
            Self::Words8,
            Self::Words16,
        ]
        .into_iter()
        .find(|size| size.bytes() >= bytes)
    }

    pub fn words(self) -> usize {
        match self {
            Self::Words1 => 1,
            Self::Words2 => 2,
            Self::Words4 => 4,
            Self::Words8 => 8,
            Self::Words16 => 16,
        }
    }

    pub fn bytes(self) -> usize {
        self.words() * size_of::<usize>()
    }
}

enum Payload {
    Words1(SmallBox<dyn Any, S1>),
    Words2(SmallBox<dyn Any, S2>),
    Words4(SmallBox<dyn Any, S4>),
    Words8(SmallBox<dyn Any, S8>),
    Words16(SmallBox<dyn Any, S16>),
}

impl Payload {
    fn new<E: Any>(event: E, size: SmallEventSize) -> Self {
        match size {
            SmallEventSize::Words1 => {
                let event: SmallBox<dyn Any, S1> = smallbox!(event);
                Payload::Words1(event)
            }
            SmallEventSize::Words2 => {
                let event: SmallBox<dyn Any, S2> = smallbox!(event);
                Payload::Words2(event)
            }
            SmallEventSize::Words4 => {
                let event: SmallBox<dyn Any, S4> = smallbox!(event);
                Payload::Words4(event)
            }
            SmallEventSize::Words8 => {
                let event: SmallBox<dyn Any, S8> = smallbox!(event);
                Payload::Words8(event)
            }
            SmallEventSize::Words16 => {
                let event: SmallBox<dyn Any, S16> = smallbox!(event);
                Payload::Words16(event)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            Payload::Words1(event) => &**event,
            Payload::Words2(event) => &**event,
            Payload::Words4(event) => &**event,
            Payload::Words8(event) => &**event,
            Payload::Words16(event) => &**event,
        }
    }

    fn is_inline(&self) -> bool {
        !match self {
            Payload::Words1(event) => event.is_heap(),
            Payload::Words2(event) => event.is_heap(),
            Payload::Words4(event) => event.is_heap(),
            Payload::Words8(event) => event.is_heap(),
            Payload::Words16(event) => event.is_heap(),
        }
    }
}

/// A deferred call: an owned event plus the function to run it with.
pub struct QueuedCall<T: ?Sized, R> {
    payload: Payload,
    type_name: &'static str,
    call: fn(&mut T, AnyEvent<'_>) -> R,
}

impl<T: ?Sized, R> QueuedCall<T, R> {
    /// Run the call against `target`, consuming the stored event.
    pub fn invoke(self, target: &mut T) -> R {
        let event = AnyEvent::from_parts(self.payload.as_any(), self.type_name);
        (self.call)(target, event)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_inline(&self) -> bool {
        self.payload.is_inline()
    }
}

impl<T: ?Sized, R> fmt::Debug for QueuedCall<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedCall")
            .field("event", &self.type_name)
            .field("inline", &self.is_inline())
            .finish()
    }
}

/// FIFO of [`QueuedCall`]s.
///
/// Events fitting the queue's [`SmallEventSize`] are not heap allocated.
///
/// # Example
///
/// ```rust
/// use stratum::engine::queue::FunctionQueue;
/// use stratum::core::AnyEvent;
///
/// fn add(total: &mut u32, event: AnyEvent<'_>) -> bool {
///     match event.downcast_ref::<u32>() {
///         Some(n) => {
///             *total += n;
///             true
///         }
///         None => false,
///     }
/// }
///
/// let mut queue: FunctionQueue<u32, bool> = FunctionQueue::new();
/// queue.push(2u32, add);
/// queue.push(40u32, add);
///
/// let mut total = 0;
/// while let Some(call) = queue.pop() {
///     call.invoke(&mut total);
/// }
/// assert_eq!(total, 42);
/// ```
pub struct FunctionQueue<T: ?Sized, R> {
    calls: VecDeque<QueuedCall<T, R>>,
    small_event_size: SmallEventSize,
}

impl<T: ?Sized, R> FunctionQueue<T, R> {
    pub fn new() -> Self {
        Self::with_small_event_size(SmallEventSize::default())
    }

    pub fn with_small_event_size(small_event_size: SmallEventSize) -> Self {
        Self {
            calls: VecDeque::new(),
            small_event_size,
        }
    }

    pub fn small_event_size(&self) -> SmallEventSize {
        self.small_event_size
    }

    /// Append a call with its own copy of `event`.
    pub fn push<E: Any>(&mut self, event: E, call: fn(&mut T, AnyEvent<'_>) -> R) {
        self.calls.push_back(QueuedCall {
            payload: Payload::new(event, self.small_event_size),
            type_name: std::any::type_name::<E>(),
            call,
        });
    }

    /// Remove the oldest call.
    pub fn pop(&mut self) -> Option<QueuedCall<T, R>> {
        self.calls.pop_front()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drop every pending call without running it.
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl<T: ?Sized, R> Default for FunctionQueue<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized, R> fmt::Debug for FunctionQueue<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.calls.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn record(log: &mut Vec<String>, event: AnyEvent<'_>) {
        if let Some(n) = event.downcast_ref::<u8>() {
            log.push(format!("u8:{n}"));
        } else if let Some(s) = event.downcast_ref::<String>() {
            log.push(format!("string:{s}"));
        } else if let Some(big) = event.downcast_ref::<[u64; 8]>() {
            log.push(format!("big:{}", big.iter().sum::<u64>()));
        }
    }

    #[test]
    fn calls_run_in_fifo_order() {
        let mut queue: FunctionQueue<Vec<String>, ()> = FunctionQueue::new();
        queue.push(1u8, record);
        queue.push("two".to_string(), record);
        queue.push([1u64; 8], record);

        let mut log = Vec::new();
        while let Some(call) = queue.pop() {
            call.invoke(&mut log);
        }

        assert_eq!(log, vec!["u8:1", "string:two", "big:8"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn small_events_are_stored_inline() {
        let mut queue: FunctionQueue<Vec<String>, ()> = FunctionQueue::new();
        queue.push(7u8, record);
        queue.push([0u64; 8], record);

        let small = queue.pop().unwrap();
        let large = queue.pop().unwrap();
        assert!(small.is_inline());
        assert!(!large.is_inline());
    }

    #[test]
    fn buffer_size_is_configurable() {
        let mut queue: FunctionQueue<Vec<String>, ()> =
            FunctionQueue::with_small_event_size(SmallEventSize::Words16);
        queue.push([3u64; 8], record);

        let call = queue.pop().unwrap();
        assert!(call.is_inline());

        let mut log = Vec::new();
        call.invoke(&mut log);
        assert_eq!(log, vec!["big:24"]);
    }

    #[test]
    fn smallest_buffer_boxes_two_word_events() {
        let mut queue: FunctionQueue<Vec<String>, ()> =
            FunctionQueue::with_small_event_size(SmallEventSize::Words1);
        queue.push(1usize, record);
        queue.push([1usize; 2], record);

        assert!(queue.pop().unwrap().is_inline());
        assert!(!queue.pop().unwrap().is_inline());
    }

    #[test]
    fn size_is_picked_from_byte_count() {
        let word = size_of::<usize>();

        assert_eq!(SmallEventSize::at_least(1), Some(SmallEventSize::Words1));
        assert_eq!(SmallEventSize::at_least(word + 1), Some(SmallEventSize::Words2));
        assert_eq!(SmallEventSize::at_least(16 * word), Some(SmallEventSize::Words16));
        assert_eq!(SmallEventSize::at_least(16 * word + 1), None);
    }

    #[test]
    fn pending_events_are_dropped_exactly_once() {
        let token = Rc::new(());
        {
            let mut queue: FunctionQueue<Vec<String>, ()> = FunctionQueue::new();
            queue.push(Rc::clone(&token), record);
            queue.push(Rc::clone(&token), record);
            assert_eq!(Rc::strong_count(&token), 3);

            let call = queue.pop().unwrap();
            call.invoke(&mut Vec::new());
            assert_eq!(Rc::strong_count(&token), 2);
        }
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn invoke_returns_call_result() {
        fn is_u8(_: &mut (), event: AnyEvent<'_>) -> bool {
            event.is::<u8>()
        }

        let mut queue: FunctionQueue<(), bool> = FunctionQueue::new();
        queue.push(1u8, is_u8);
        queue.push(1u16, is_u8);

        assert!(queue.pop().unwrap().invoke(&mut ()));
        assert!(!queue.pop().unwrap().invoke(&mut ()));
    }
}
