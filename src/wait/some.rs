//! Threshold wait: resume once enough substrands have succeeded.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem;
use std::rc::{Rc, Weak};

use crate::dispatch::Dispatcher;
use crate::error::{CompositeError, Error, Result};
use crate::strand::{Strand, StrandObserver, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;

use super::{Roster, cancel_pending};

struct SomeState<T: 'static> {
    waiting: Option<Rc<dyn Strand<T>>>,
    roster: Roster<T>,
    /// Successes still required before the wait resolves.
    remaining: usize,
    values: BTreeMap<usize, Value<T>>,
    failures: CompositeError,
}

/// Waits for a threshold number of substrands to succeed.
///
/// Successes are recorded at their original construction index; once the
/// threshold is met, every still-pending substrand is cancelled and the
/// waiting strand resumes with a sparse
/// [`Value::Many`] holding the indices that actually succeeded. Failures
/// are recorded the same way; the moment they make the threshold
/// mathematically unreachable, the rest is cancelled and the waiting
/// strand fails with an [`Error::Composite`] carrying every recorded
/// failure.
pub struct WaitSome<T: 'static> {
    this: Weak<WaitSome<T>>,
    state: RefCell<SomeState<T>>,
}

impl<T: Clone + 'static> WaitSome<T> {
    /// Builds a threshold wait over the given substrands.
    ///
    /// `count` is clamped to the roster size: asking for more successes
    /// than there are substrands waits for all of them.
    ///
    /// # Panics
    ///
    /// Panics when `count` is zero or `substrands` is empty.
    #[must_use]
    pub fn new(count: usize, substrands: Vec<Rc<dyn Strand<T>>>) -> Rc<Self> {
        assert!(count >= 1, "wait threshold must be at least 1");
        let roster = Roster::new(substrands);
        let remaining = count.min(roster.len());
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(SomeState {
                waiting: None,
                roster,
                remaining,
                values: BTreeMap::new(),
                failures: CompositeError::new(),
            }),
        })
    }

    /// Successes still required before the wait resolves.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.borrow().remaining
    }

    /// Starts observing: installs this wait as the waiting strand's
    /// terminator and attaches to every substrand. A substrand that is
    /// already terminal is processed on the spot.
    pub fn begin(&self, waiting: Rc<dyn Strand<T>>, _api: &Rc<dyn Dispatcher<T>>) {
        {
            let mut state = self.state.borrow_mut();
            assert!(state.waiting.is_none(), "wait already started");
            state.waiting = Some(waiting.clone());
        }
        let this = self.this.clone();
        waiting.set_terminator(Some(Box::new(move || {
            if let Some(this) = this.upgrade() {
                this.cancel();
            }
        })));

        let observer = self.observer();
        let len = self.state.borrow().roster.len();
        for index in 0..len {
            if self.state.borrow().waiting.is_none() {
                break;
            }
            let Some(strand) = self.state.borrow().roster.slot(index) else {
                continue;
            };
            strand.attach_observer(observer.clone());
        }
    }

    /// Detaches from and terminates every still-pending substrand.
    ///
    /// This is the hook the waiting strand's terminator delivers;
    /// already-resolved substrands are left untouched.
    pub fn cancel(&self) {
        let pending = self.state.borrow_mut().roster.drain_pending();
        cancel_pending(pending, &self.observer());
    }

    fn observer(&self) -> Rc<dyn StrandObserver<T>> {
        self.this.upgrade().expect("wait dropped")
    }
}

impl<T: Clone + 'static> StrandObserver<T> for WaitSome<T> {
    fn success(&self, strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.roster.resolve(strand) else {
                return Ok(());
            };
            state.values.insert(index, value.clone());
            state.remaining -= 1;
            if state.remaining > 0 {
                return Ok(());
            }
            trace!(strand = %strand.id(), "wait threshold met");
            let pending = state.roster.drain_pending();
            let values = mem::take(&mut state.values);
            let waiting = state.waiting.take().expect("wait not started");
            (pending, values, waiting)
        };
        let (pending, values, waiting) = resolved;
        cancel_pending(pending, &self.observer());
        waiting.resume(Value::Many(values));
        Ok(())
    }

    fn failure(&self, strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.roster.resolve(strand) else {
                return Ok(());
            };
            state.failures.push(index, error.clone());
            if state.remaining <= state.roster.pending() {
                return Ok(());
            }
            trace!(strand = %strand.id(), "wait threshold unreachable");
            let pending = state.roster.drain_pending();
            let failures = mem::take(&mut state.failures);
            let waiting = state.waiting.take().expect("wait not started");
            (pending, failures, waiting)
        };
        let (pending, failures, waiting) = resolved;
        cancel_pending(pending, &self.observer());
        waiting.fail(Error::Composite(failures));
        Ok(())
    }

    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()> {
        let error = Error::terminated(strand.id());
        self.failure(strand, &error)
    }
}
