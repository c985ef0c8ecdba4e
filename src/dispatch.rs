//! The dispatcher boundary: the request vocabulary and the dispatch
//! contract.
//!
//! A ticking frame never interprets what its computation asked for; it
//! hands the yielded descriptor to a [`Dispatcher`] and waits for the
//! answer. The descriptors themselves are a closed union owned by this
//! boundary — the frame passes them through untouched, so bindings can
//! switch exhaustively instead of inspecting dynamic types.

use core::fmt;
use std::rc::Rc;

use crate::coroutine::{Coroutine, Frame};
use crate::strand::Strand;

/// Identifies the origin of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchSource {
    /// The request was yielded by a ticking coroutine frame.
    Coroutine,
    /// The request was synthesized by the scheduler binding itself.
    Binding,
}

/// An opaque key attached to a yielded request.
///
/// The frame passes it through to the dispatcher unchanged; the kernel
/// binding ignores it, but custom dispatchers may use it to correlate
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey(pub u64);

/// Callback handed the suspended strand by a [`Request::Suspend`].
pub type SuspendFn<T> = Box<dyn FnOnce(Rc<dyn Strand<T>>)>;

/// A request descriptor yielded by a computation.
///
/// Only the dispatcher interprets these. Every variant except
/// [`Request::Terminate`] obliges the dispatcher to produce exactly one
/// eventual `resume` or `fail` on the requesting frame.
pub enum Request<T: 'static> {
    /// Park the strand and hand its handle to the callback, which
    /// arranges the eventual resume or failure.
    Suspend(SuspendFn<T>),
    /// Run a nested computation with the requesting frame as its caller.
    Delegate(Box<dyn Coroutine<T>>),
    /// Wait for the first success among the strands; fail with a
    /// composite once all of them have failed.
    WaitAny(Vec<Rc<dyn Strand<T>>>),
    /// Wait for the given number of successes; fail with a composite
    /// once the threshold is unreachable.
    WaitSome(usize, Vec<Rc<dyn Strand<T>>>),
    /// Wait for every strand to succeed; the first failure wins.
    WaitAll(Vec<Rc<dyn Strand<T>>>),
    /// Wait for the first strand to reach any terminal state.
    WaitFirst(Vec<Rc<dyn Strand<T>>>),
    /// Resume with [`Value::Unit`](crate::types::Value::Unit) on the
    /// next kernel tick.
    Yield,
    /// Terminate the requesting strand. The one request that never
    /// answers its frame.
    Terminate,
}

impl<T: 'static> Request<T> {
    /// Builds a suspend request from a parking callback.
    pub fn suspend(park: impl FnOnce(Rc<dyn Strand<T>>) + 'static) -> Self {
        Self::Suspend(Box::new(park))
    }

    /// Builds a delegation request from a nested computation.
    pub fn delegate(computation: impl Coroutine<T> + 'static) -> Self {
        Self::Delegate(Box::new(computation))
    }

    /// The variant name, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Suspend(_) => "suspend",
            Self::Delegate(_) => "delegate",
            Self::WaitAny(_) => "wait-any",
            Self::WaitSome(..) => "wait-some",
            Self::WaitAll(_) => "wait-all",
            Self::WaitFirst(_) => "wait-first",
            Self::Yield => "yield",
            Self::Terminate => "terminate",
        }
    }
}

impl<T: 'static> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// The contract through which a frame's yielded requests are
/// interpreted.
///
/// For every dispatched request except [`Request::Terminate`], the
/// implementation must arrange exactly one eventual
/// [`resume`](crate::strand::Suspendable::resume) or
/// [`fail`](crate::strand::Suspendable::fail) on the requesting frame —
/// synchronously during the dispatch or later, never both.
pub trait Dispatcher<T: 'static> {
    /// Interprets one yielded request.
    fn dispatch(
        &self,
        source: DispatchSource,
        frame: &Rc<Frame<T>>,
        request: Request<T>,
        key: Option<RequestKey>,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_kind_names() {
        assert_eq!(Request::<i32>::Yield.kind(), "yield");
        assert_eq!(Request::<i32>::Terminate.kind(), "terminate");
        assert_eq!(Request::<i32>::WaitAny(Vec::new()).kind(), "wait-any");
        let suspend = Request::<i32>::suspend(|_| {});
        assert_eq!(format!("{suspend:?}"), "suspend");
    }
}
