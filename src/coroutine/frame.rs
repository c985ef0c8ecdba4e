//! The execution frame: one computation, one caller, one trampoline.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dispatch::{DispatchSource, Dispatcher};
use crate::error::Error;
use crate::strand::Suspendable;
use crate::tracing_compat::trace;
use crate::types::Value;

use super::{Coroutine, Signal, Step};

/// The answer recorded for a frame's outstanding request, consumed by
/// the next trampoline turn.
enum Pending<T: 'static> {
    Resume(Value<T>),
    Fail(Error),
}

struct FrameState<T: 'static> {
    computation: Option<Box<dyn Coroutine<T>>>,
    caller: Option<Rc<dyn Suspendable<T>>>,
    dispatcher: Option<Rc<dyn Dispatcher<T>>>,
    started: bool,
    /// True while `tick` is executing on this frame.
    active: bool,
    /// True while a yielded request awaits its answer.
    awaiting: bool,
    pending: Option<Pending<T>>,
}

/// Drives one suspendable computation on behalf of one caller.
///
/// The frame repeatedly steps the computation until it yields a request,
/// finishes, or raises. Yielded requests go to the dispatcher; when the
/// dispatcher answers synchronously — while the frame is still inside
/// its own tick — the answer is recorded in a pending slot and consumed
/// after the current step unwinds. That trampoline turns any chain of
/// immediately-satisfied requests into bounded iteration instead of
/// recursion.
///
/// On completion the caller is notified exactly once and the computation
/// and dispatcher references are released; no further activity is
/// possible.
///
/// # Contract
///
/// [`begin`](Frame::begin) must be called exactly once.
/// [`resume`](Frame::resume) / [`fail`](Frame::fail) may only be called
/// while a yielded request is outstanding, and only once per request.
/// Violations panic.
pub struct Frame<T: 'static> {
    this: Weak<Frame<T>>,
    state: RefCell<FrameState<T>>,
}

impl<T: 'static> Frame<T> {
    /// Wraps a computation, ready to be started with [`Frame::begin`].
    #[must_use]
    pub fn new(computation: Box<dyn Coroutine<T>>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(FrameState {
                computation: Some(computation),
                caller: None,
                dispatcher: None,
                started: false,
                active: false,
                awaiting: false,
                pending: None,
            }),
        })
    }

    /// Starts the computation and drives it to its first suspension or
    /// to completion.
    ///
    /// # Panics
    ///
    /// Panics if the frame was already started.
    pub fn begin(&self, caller: Rc<dyn Suspendable<T>>, dispatcher: Rc<dyn Dispatcher<T>>) {
        {
            let mut state = self.state.borrow_mut();
            assert!(!state.started, "frame already started");
            state.started = true;
            state.caller = Some(caller);
            state.dispatcher = Some(dispatcher);
        }
        self.tick(Some(Signal::Start));
    }

    /// Answers the outstanding request with a value.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not suspended on a request, or if the
    /// request was already answered.
    pub fn resume(&self, value: Value<T>) {
        if self.record(Pending::Resume(value)) {
            self.tick(None);
        }
    }

    /// Answers the outstanding request with a failure.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not suspended on a request, or if the
    /// request was already answered.
    pub fn fail(&self, error: Error) {
        if self.record(Pending::Fail(error)) {
            self.tick(None);
        }
    }

    /// True while a yielded request awaits its answer.
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        let state = self.state.borrow();
        state.awaiting && state.pending.is_none()
    }

    /// True once the computation has finished or raised and the caller
    /// has been notified.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let state = self.state.borrow();
        state.started && state.caller.is_none()
    }

    /// Records the answer to the outstanding request. Returns true when
    /// the caller must run the tick loop itself — an answer arriving
    /// while the frame is mid-tick is consumed by the loop already on
    /// the stack.
    fn record(&self, answer: Pending<T>) -> bool {
        let mut state = self.state.borrow_mut();
        assert!(state.started, "frame not started");
        assert!(state.caller.is_some(), "frame already finished");
        assert!(state.pending.is_none(), "request already answered");
        assert!(state.awaiting, "frame is not suspended");
        state.awaiting = false;
        state.pending = Some(answer);
        !state.active
    }

    fn tick(&self, first: Option<Signal<T>>) {
        let mut signal = first;
        loop {
            let (mut computation, injected) = {
                let mut state = self.state.borrow_mut();
                assert!(!state.active, "frame is already ticking");
                let injected = match signal.take() {
                    Some(signal) => signal,
                    None => match state.pending.take().expect("tick without an answer") {
                        Pending::Resume(value) => Signal::Resume(value),
                        Pending::Fail(error) => Signal::Fail(error),
                    },
                };
                state.active = true;
                let computation = state.computation.take().expect("frame already finished");
                (computation, injected)
            };

            // Step outside the borrow: the computation may build requests
            // that capture channel or strand handles.
            let step = computation.step(injected);

            match step {
                Ok(Step::Yield(request, key)) => {
                    let dispatcher = {
                        let mut state = self.state.borrow_mut();
                        state.computation = Some(computation);
                        state.awaiting = true;
                        state
                            .dispatcher
                            .clone()
                            .expect("frame dispatcher released")
                    };
                    trace!(request = request.kind(), "frame yielded");
                    let this = self.this.upgrade().expect("frame dropped while ticking");
                    dispatcher.dispatch(DispatchSource::Coroutine, &this, request, key);

                    let mut state = self.state.borrow_mut();
                    state.active = false;
                    if state.pending.is_some() {
                        // Answered synchronously: take another trampoline
                        // turn instead of recursing through resume().
                        drop(state);
                        continue;
                    }
                    return;
                }
                Ok(Step::Done(value)) => {
                    trace!("frame finished");
                    self.finish().resume(value);
                    return;
                }
                Err(error) => {
                    trace!(%error, "frame raised");
                    self.finish().fail(error);
                    return;
                }
            }
        }
    }

    /// Releases the computation and dispatcher, returning the caller for
    /// the exactly-once completion notification.
    fn finish(&self) -> Rc<dyn Suspendable<T>> {
        let mut state = self.state.borrow_mut();
        state.active = false;
        state.awaiting = false;
        state.computation = None;
        state.dispatcher = None;
        state.caller.take().expect("frame already finished")
    }
}

impl<T: 'static> Suspendable<T> for Frame<T> {
    fn resume(&self, value: Value<T>) {
        Frame::resume(self, value);
    }

    fn fail(&self, error: Error) {
        Frame::fail(self, error);
    }
}
