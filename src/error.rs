//! Error types for weft operations.
//!
//! The recoverable taxonomy is small and closed:
//!
//! - **Channels**: operations on closed channels, exclusivity violations
//! - **Termination**: the distinguished failure a terminated strand
//!   reports, so waits can tell cancellation apart from computation
//!   failures
//! - **Aggregation**: several substrand failures keyed by original index
//! - **Listeners**: a completion observer failed while being notified
//! - **Kernel**: the scheduler ran out of work before a strand settled
//!
//! Contract violations — starting a frame twice, resuming a frame that
//! is not suspended, installing a second terminator — are programming
//! errors, not recoverable conditions. They panic with an explicit
//! message instead of appearing here.

use core::fmt;

use thiserror::Error as ThisError;

use crate::types::StrandId;

/// Aggregate failure raised when a wait's success threshold becomes
/// unreachable.
///
/// Entries are kept in arrival order; each carries the original
/// construction index of the substrand that produced it, so callers can
/// correlate failures with the strands they supplied.
#[derive(Debug, Clone, Default)]
pub struct CompositeError {
    entries: Vec<(usize, Error)>,
}

impl CompositeError {
    /// Creates an empty aggregate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Records a failure for the substrand at `index`.
    pub fn push(&mut self, index: usize, error: Error) {
        self.entries.push((index, error));
    }

    /// The recorded failures, in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[(usize, Error)] {
        &self.entries
    }

    /// Looks up the failure recorded for the substrand at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Error> {
        self.entries
            .iter()
            .find_map(|(i, error)| (*i == index).then_some(error))
    }

    /// The number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no failure has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failures occurred", self.entries.len())?;
        let mut sep = ": ";
        for (index, error) in &self.entries {
            write!(f, "{sep}[{index}] {error}")?;
            sep = "; ";
        }
        Ok(())
    }
}

/// The error type for kernel operations.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// An operation was attempted on, or unblocked by, a closed channel.
    #[error("channel is closed")]
    ChannelClosed,

    /// An exclusive channel operation was attempted while another of the
    /// same kind is pending.
    #[error("channel is locked: a {operation} is already pending")]
    ChannelLocked {
        /// The operation that was refused.
        operation: &'static str,
    },

    /// A strand was cooperatively terminated.
    #[error("strand {strand} was terminated")]
    Terminated {
        /// The terminated strand.
        strand: StrandId,
    },

    /// Several substrand failures, keyed by original index.
    #[error("{0}")]
    Composite(CompositeError),

    /// A completion observer failed while being notified.
    #[error("unhandled failure in listener for strand {strand}: {source}")]
    Listener {
        /// The strand whose observer failed.
        strand: StrandId,
        /// The observer's own failure.
        #[source]
        source: Box<Error>,
    },

    /// The kernel ran out of work before the strand reached a terminal
    /// state: it is parked on a request nothing will ever answer.
    #[error("strand {strand} did not complete")]
    Stalled {
        /// The strand left pending.
        strand: StrandId,
    },

    /// An application-level failure raised by a computation.
    #[error("{0}")]
    Failure(String),
}

impl Error {
    /// Creates an application-level failure.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Creates the locked-channel error for `operation`.
    #[must_use]
    pub const fn channel_locked(operation: &'static str) -> Self {
        Self::ChannelLocked { operation }
    }

    /// Creates the distinguished termination failure for `strand`.
    #[must_use]
    pub const fn terminated(strand: StrandId) -> Self {
        Self::Terminated { strand }
    }

    /// Wraps an observer failure raised while notifying `strand`'s
    /// listeners.
    #[must_use]
    pub fn listener(strand: StrandId, source: Error) -> Self {
        Self::Listener {
            strand,
            source: Box::new(source),
        }
    }

    /// Returns true for the closed-channel error.
    #[must_use]
    pub const fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }

    /// Returns true for the distinguished termination failure.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }

    /// Borrows the aggregate, if this is a composite failure.
    #[must_use]
    pub const fn as_composite(&self) -> Option<&CompositeError> {
        match self {
            Self::Composite(composite) => Some(composite),
            _ => None,
        }
    }
}

impl From<CompositeError> for Error {
    fn from(composite: CompositeError) -> Self {
        Self::Composite(composite)
    }
}

/// A specialized Result type for weft operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_forms() {
        assert_eq!(Error::ChannelClosed.to_string(), "channel is closed");
        assert_eq!(
            Error::channel_locked("read").to_string(),
            "channel is locked: a read is already pending"
        );
        assert_eq!(
            Error::terminated(StrandId::new_for_test(3)).to_string(),
            "strand S3 was terminated"
        );
    }

    #[test]
    fn composite_keeps_arrival_order_and_original_indices() {
        let mut composite = CompositeError::new();
        composite.push(1, Error::failure("b failed"));
        composite.push(0, Error::failure("a failed"));

        let indices: Vec<usize> = composite.entries().iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 0]);
        assert_eq!(composite.get(0).unwrap().to_string(), "a failed");
        assert_eq!(composite.get(1).unwrap().to_string(), "b failed");
        assert!(composite.get(2).is_none());
        assert_eq!(
            composite.to_string(),
            "2 failures occurred: [1] b failed; [0] a failed"
        );
    }

    #[test]
    fn listener_error_exposes_source() {
        let err = Error::listener(StrandId::new_for_test(123), Error::failure("boom"));
        assert_eq!(
            err.to_string(),
            "unhandled failure in listener for strand S123: boom"
        );
        assert_eq!(err.source().unwrap().to_string(), "boom");
    }

    #[test]
    fn predicates_match_variant() {
        assert!(Error::ChannelClosed.is_channel_closed());
        assert!(!Error::ChannelClosed.is_terminated());
        assert!(Error::terminated(StrandId::new_for_test(1)).is_terminated());

        let composite: Error = CompositeError::new().into();
        assert!(composite.as_composite().is_some());
        assert!(Error::ChannelClosed.as_composite().is_none());
    }
}
