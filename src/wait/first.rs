//! First-exit wait: the first terminal substrand decides the outcome.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::strand::{Strand, StrandObserver, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;

use super::{Roster, cancel_pending};

struct FirstState<T: 'static> {
    waiting: Option<Rc<dyn Strand<T>>>,
    roster: Roster<T>,
}

/// Waits for the first substrand to reach any terminal state.
///
/// Whatever exits first decides the outcome: a success resumes the
/// waiting strand with its value, a failure — including termination —
/// fails it with that error directly. Everything else is cancelled.
pub struct WaitFirst<T: 'static> {
    this: Weak<WaitFirst<T>>,
    state: RefCell<FirstState<T>>,
}

impl<T: Clone + 'static> WaitFirst<T> {
    /// Builds a first-exit wait over the given substrands.
    ///
    /// # Panics
    ///
    /// Panics when `substrands` is empty.
    #[must_use]
    pub fn new(substrands: Vec<Rc<dyn Strand<T>>>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(FirstState {
                waiting: None,
                roster: Roster::new(substrands),
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

    /// Resolves the wait with the first exit, cancelling the rest.
    fn settle(
        &self,
        strand: &Rc<dyn Strand<T>>,
        deliver: impl FnOnce(Rc<dyn Strand<T>>),
    ) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            if state.roster.resolve(strand).is_none() {
                return Ok(());
            }
            trace!(strand = %strand.id(), "first exit");
            let pending = state.roster.drain_pending();
            let waiting = state.waiting.take().expect("wait not started");
            (pending, waiting)
        };
        let (pending, waiting) = resolved;
        cancel_pending(pending, &self.observer());
        deliver(waiting);
        Ok(())
    }
}

impl<T: Clone + 'static> StrandObserver<T> for WaitFirst<T> {
    fn success(&self, strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()> {
        let value = value.clone();
        self.settle(strand, move |waiting| waiting.resume(value))
    }

    fn failure(&self, strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()> {
        let error = error.clone();
        self.settle(strand, move |waiting| waiting.fail(error))
    }

    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()> {
        let error = Error::terminated(strand.id());
        self.settle(strand, move |waiting| waiting.fail(error))
    }
}
