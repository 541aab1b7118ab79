//! Built-in events.
//!
//! The engine raises these itself: [`Start`] and [`Stop`] are the default
//! payloads of `Machine::start` and `Machine::stop`, [`Null`] drives
//! anonymous transitions and [`Exception`] carries a user-code failure back
//! into the transition table when no exception hook is configured.

use std::fmt;

/// Default event passed to entry hooks when a machine starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Start;

/// Default event passed to exit hooks when a machine stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stop;

/// The anonymous event.
///
/// A transition row whose event is `Null` fires as soon as its source state
/// becomes active, without any external event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Null;

/// An error returned by user code, reinjected as a regular event.
///
/// # Example
///
/// ```rust
/// use stratum::events::Exception;
///
/// let exception = Exception::new(anyhow::anyhow!("sensor offline"));
/// assert_eq!(exception.to_string(), "sensor offline");
/// ```
#[derive(Debug)]
pub struct Exception {
    error: anyhow::Error,
}

impl Exception {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error }
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Downcast the carried error to a concrete error type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("overheated at {0} degrees")]
    struct Overheated(u32);

    #[test]
    fn exception_keeps_concrete_error() {
        let exception = Exception::new(Overheated(90).into());

        assert_eq!(exception.to_string(), "overheated at 90 degrees");
        assert_eq!(exception.downcast_ref::<Overheated>().map(|e| e.0), Some(90));
    }

    #[test]
    fn exception_releases_error() {
        let exception = Exception::new(anyhow::anyhow!("boom"));
        let error = exception.into_error();

        assert_eq!(error.to_string(), "boom");
    }
}
