//! The deterministic tick-queue scheduler binding.
//!
//! The kernel turns "the next tick" into a real scheduling step: a FIFO
//! queue of deferred closures drained by [`Kernel::run`]. Everything is
//! single-threaded and cooperative — a strand runs until its next
//! suspend point, and "concurrency" is the interleaving of suspend
//! points, never simultaneity.
//!
//! [`Kernel::execute`] defers the strand's first tick so the caller can
//! inspect the handle before execution begins. Escalated listener
//! failures abort [`Kernel::run`] and are returned from it; the rest of
//! the queue is left intact so a diagnostic caller can continue the
//! drain.

mod api;
mod strand;

pub use api::StrandApi;
pub use strand::KernelStrand;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::coroutine::Coroutine;
use crate::error::{Error, Result};
use crate::strand::{Strand, StrandObserver};
use crate::tracing_compat::debug;
use crate::types::Value;

/// One deferred scheduling step.
type Tick = Box<dyn FnOnce()>;

pub(crate) struct KernelInner {
    ticks: RefCell<VecDeque<Tick>>,
    escalated: RefCell<VecDeque<Error>>,
}

impl KernelInner {
    pub(crate) fn enqueue(&self, tick: Tick) {
        self.ticks.borrow_mut().push_back(tick);
    }

    fn dequeue(&self) -> Option<Tick> {
        self.ticks.borrow_mut().pop_front()
    }

    pub(crate) fn escalate(&self, error: Error) {
        self.escalated.borrow_mut().push_back(error);
    }

    fn take_escalated(&self) -> Option<Error> {
        self.escalated.borrow_mut().pop_front()
    }
}

/// A deterministic single-threaded strand scheduler.
///
/// Strands of different value types may share one kernel; each
/// [`execute`](Kernel::execute) call is independently typed.
pub struct Kernel {
    inner: Rc<KernelInner>,
}

impl Kernel {
    /// Creates an empty kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(KernelInner {
                ticks: RefCell::new(VecDeque::new()),
                escalated: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// Schedules a computation on a new strand.
    ///
    /// The strand starts on the next tick, so the returned handle can be
    /// observed — or terminated — before execution begins.
    pub fn execute<T: Clone + 'static>(
        &self,
        computation: impl Coroutine<T> + 'static,
    ) -> Rc<KernelStrand<T>> {
        let strand = KernelStrand::new(Rc::downgrade(&self.inner));
        debug!(strand = %strand.id(), "strand scheduled");
        let starter = {
            let strand = strand.clone();
            let computation: Box<dyn Coroutine<T>> = Box::new(computation);
            Box::new(move || strand.start(computation))
        };
        self.inner.enqueue(starter);
        strand
    }

    /// Drains the tick queue until it is empty.
    ///
    /// Returns the first escalated listener failure, leaving the rest of
    /// the queue intact.
    pub fn run(&self) -> Result<()> {
        if let Some(error) = self.inner.take_escalated() {
            return Err(error);
        }
        while let Some(tick) = self.inner.dequeue() {
            tick();
            if let Some(error) = self.inner.take_escalated() {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Executes a computation and runs the kernel until it settles,
    /// returning the strand's outcome.
    ///
    /// A strand still pending when the queue drains is reported as
    /// [`Error::Stalled`] — the deadlock surface of a strand parked on a
    /// request nothing will ever answer.
    pub fn start<T: Clone + 'static>(
        &self,
        computation: impl Coroutine<T> + 'static,
    ) -> Result<Value<T>> {
        let strand = self.execute(computation);
        let probe = OutcomeProbe::new();
        strand.attach_observer(probe.clone());
        self.run()?;
        probe.take().ok_or(Error::Stalled { strand: strand.id() })?
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Captures the first completion notification of one strand.
struct OutcomeProbe<T: 'static> {
    outcome: RefCell<Option<Result<Value<T>>>>,
}

impl<T: 'static> OutcomeProbe<T> {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            outcome: RefCell::new(None),
        })
    }

    fn take(&self) -> Option<Result<Value<T>>> {
        self.outcome.borrow_mut().take()
    }
}

impl<T: Clone + 'static> StrandObserver<T> for OutcomeProbe<T> {
    fn success(&self, _strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()> {
        *self.outcome.borrow_mut() = Some(Ok(value.clone()));
        Ok(())
    }

    fn failure(&self, _strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()> {
        *self.outcome.borrow_mut() = Some(Err(error.clone()));
        Ok(())
    }

    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()> {
        *self.outcome.borrow_mut() = Some(Err(Error::terminated(strand.id())));
        Ok(())
    }
}
