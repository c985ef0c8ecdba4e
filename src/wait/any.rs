//! First-success wait: resume with the first substrand value.

use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use crate::dispatch::Dispatcher;
use crate::error::{CompositeError, Error, Result};
use crate::strand::{Strand, StrandObserver, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;

use super::{Roster, cancel_pending};

struct AnyState<T: 'static> {
    waiting: Option<Rc<dyn Strand<T>>>,
    roster: Roster<T>,
    failures: CompositeError,
}

/// Waits for the first substrand to succeed.
///
/// The winning value is delivered directly — no result map — and every
/// other substrand is cancelled. The wait only fails once *every*
/// substrand has failed, with an [`Error::Composite`] carrying each
/// failure at its original index, entries in arrival order.
pub struct WaitAny<T: 'static> {
    this: Weak<WaitAny<T>>,
    state: RefCell<AnyState<T>>,
}

impl<T: Clone + 'static> WaitAny<T> {
    /// Builds a first-success wait over the given substrands.
    ///
    /// # Panics
    ///
    /// Panics when `substrands` is empty.
    #[must_use]
    pub fn new(substrands: Vec<Rc<dyn Strand<T>>>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(AnyState {
                waiting: None,
                roster: Roster::new(substrands),
                failures: CompositeError::new(),
            }),
        })
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
    pub fn cancel(&self) {
        let pending = self.state.borrow_mut().roster.drain_pending();
        cancel_pending(pending, &self.observer());
    }

    fn observer(&self) -> Rc<dyn StrandObserver<T>> {
        self.this.upgrade().expect("wait dropped")
    }
}

impl<T: Clone + 'static> StrandObserver<T> for WaitAny<T> {
    fn success(&self, strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            if state.roster.resolve(strand).is_none() {
                return Ok(());
            }
            trace!(strand = %strand.id(), "first success");
            let pending = state.roster.drain_pending();
            let waiting = state.waiting.take().expect("wait not started");
            (pending, waiting)
        };
        let (pending, waiting) = resolved;
        cancel_pending(pending, &self.observer());
        waiting.resume(value.clone());
        Ok(())
    }

    fn failure(&self, strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.roster.resolve(strand) else {
                return Ok(());
            };
            state.failures.push(index, error.clone());
            if state.roster.pending() > 0 {
                return Ok(());
            }
            let failures = mem::take(&mut state.failures);
            let waiting = state.waiting.take().expect("wait not started");
            (failures, waiting)
        };
        let (failures, waiting) = resolved;
        waiting.fail(Error::Composite(failures));
        Ok(())
    }

    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()> {
        let error = Error::terminated(strand.id());
        self.failure(strand, &error)
    }
}
