//! Suspendable computations and the frame that drives them.
//!
//! A computation is an explicit state machine: each [`Coroutine::step`]
//! consumes the signal injected by the scheduler — the start of
//! execution, a resume value, or a failure — and either yields a request
//! descriptor, finishes with a value, or raises by returning `Err`.
//! [`Frame`] drives one computation on behalf of one caller,
//! trampolining synchronously-answered requests into bounded iteration
//! so that arbitrarily long chains of immediately-satisfied requests
//! never grow the call stack.

mod frame;

pub use frame::Frame;

use crate::dispatch::{Request, RequestKey};
use crate::error::{Error, Result};
use crate::types::Value;

/// The signal injected into a computation on each step.
#[derive(Debug)]
pub enum Signal<T: 'static> {
    /// First step; nothing is pending.
    Start,
    /// The pending request resolved with a value.
    Resume(Value<T>),
    /// The pending request resolved with a failure.
    ///
    /// The computation may recover — turn the failure into further
    /// steps — or re-raise by returning `Err`.
    Fail(Error),
}

/// The observable result of one step.
pub enum Step<T: 'static> {
    /// Suspend on a request, with an optional passthrough key.
    Yield(Request<T>, Option<RequestKey>),
    /// The computation finished.
    Done(Value<T>),
}

impl<T: 'static> Step<T> {
    /// Yields a request with no key.
    #[must_use]
    pub fn yields(request: Request<T>) -> Self {
        Self::Yield(request, None)
    }
}

/// A suspendable computation advanced step-by-step by a [`Frame`].
pub trait Coroutine<T: 'static> {
    /// Advances the computation with the injected signal.
    fn step(&mut self, signal: Signal<T>) -> Result<Step<T>>;
}

/// Adapts a closure into a [`Coroutine`].
///
/// Handy for small scripted computations:
///
/// ```
/// use weft::{Request, Signal, Step, StepFn, Value};
///
/// let mut remaining = 3;
/// let ticks = StepFn::new(move |signal: Signal<u32>| match signal {
///     Signal::Start | Signal::Resume(_) if remaining > 0 => {
///         remaining -= 1;
///         Ok(Step::yields(Request::Yield))
///     }
///     Signal::Start | Signal::Resume(_) => Ok(Step::Done(Value::Item(0))),
///     Signal::Fail(error) => Err(error),
/// });
/// # let _ = ticks;
/// ```
pub struct StepFn<F>(F);

impl<F> StepFn<F> {
    /// Wraps the step closure.
    pub const fn new(step: F) -> Self {
        Self(step)
    }
}

impl<T: 'static, F> Coroutine<T> for StepFn<F>
where
    F: FnMut(Signal<T>) -> Result<Step<T>>,
{
    fn step(&mut self, signal: Signal<T>) -> Result<Step<T>> {
        (self.0)(signal)
    }
}

/// A computation that finishes immediately with the given value.
pub fn done<T: 'static>(value: Value<T>) -> impl Coroutine<T> {
    let mut slot = Some(value);
    StepFn::new(move |_signal: Signal<T>| -> Result<Step<T>> {
        Ok(Step::Done(
            slot.take().expect("completed computation stepped twice"),
        ))
    })
}

/// A computation that raises immediately with the given error.
pub fn raise<T: 'static>(error: Error) -> impl Coroutine<T> {
    let mut slot = Some(error);
    StepFn::new(move |_signal: Signal<T>| -> Result<Step<T>> {
        Err(slot.take().expect("raised computation stepped twice"))
    })
}
