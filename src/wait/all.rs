//! All-success wait: resume once every substrand has succeeded.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem;
use std::rc::{Rc, Weak};

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::strand::{Strand, StrandObserver, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;

use super::{Roster, cancel_pending};

struct AllState<T: 'static> {
    waiting: Option<Rc<dyn Strand<T>>>,
    roster: Roster<T>,
    values: BTreeMap<usize, Value<T>>,
}

/// Waits for every substrand to succeed.
///
/// Successes are collected at their original indices and delivered as a
/// complete [`Value::Many`] once the last one arrives. The first failure
/// or termination wins: the rest is cancelled and the waiting strand
/// fails with that error directly — no aggregate, since one explanation
/// suffices.
pub struct WaitAll<T: 'static> {
    this: Weak<WaitAll<T>>,
    state: RefCell<AllState<T>>,
}

impl<T: Clone + 'static> WaitAll<T> {
    /// Builds an all-success wait over the given substrands.
    ///
    /// # Panics
    ///
    /// Panics when `substrands` is empty.
    #[must_use]
    pub fn new(substrands: Vec<Rc<dyn Strand<T>>>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(AllState {
                waiting: None,
                roster: Roster::new(substrands),
                values: BTreeMap::new(),
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

impl<T: Clone + 'static> StrandObserver<T> for WaitAll<T> {
    fn success(&self, strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.roster.resolve(strand) else {
                return Ok(());
            };
            state.values.insert(index, value.clone());
            if state.roster.pending() > 0 {
                return Ok(());
            }
            trace!("all substrands succeeded");
            let values = mem::take(&mut state.values);
            let waiting = state.waiting.take().expect("wait not started");
            (values, waiting)
        };
        let (values, waiting) = resolved;
        waiting.resume(Value::Many(values));
        Ok(())
    }

    fn failure(&self, strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()> {
        let resolved = {
            let mut state = self.state.borrow_mut();
            if state.roster.resolve(strand).is_none() {
                return Ok(());
            }
            let pending = state.roster.drain_pending();
            let waiting = state.waiting.take().expect("wait not started");
            (pending, waiting)
        };
        let (pending, waiting) = resolved;
        cancel_pending(pending, &self.observer());
        waiting.fail(error.clone());
        Ok(())
    }

    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()> {
        let error = Error::terminated(strand.id());
        self.failure(strand, &error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockStrand, ScriptedDispatcher};

    fn api() -> Rc<dyn Dispatcher<&'static str>> {
        ScriptedDispatcher::park_all()
    }

    #[test]
    fn resumes_with_every_value_once_all_succeed() {
        let a = MockStrand::with_id(1);
        let b = MockStrand::with_id(2);
        let waiting = MockStrand::new();

        let wait = WaitAll::new(vec![a.handle(), b.handle()]);
        wait.begin(waiting.handle(), &api());

        b.settle_success(Value::Item("b"));
        assert!(waiting.resumed().is_empty());
        a.settle_success(Value::Item("a"));

        let mut expected = BTreeMap::new();
        expected.insert(0, Value::Item("a"));
        expected.insert(1, Value::Item("b"));
        assert_eq!(waiting.resumed(), vec![Value::Many(expected)]);
    }

    #[test]
    fn first_failure_wins_and_cancels_the_rest() {
        let a = MockStrand::with_id(1);
        let b = MockStrand::with_id(2);
        let waiting = MockStrand::new();

        let wait = WaitAll::new(vec![a.handle(), b.handle()]);
        wait.begin(waiting.handle(), &api());

        a.settle_failure(Error::failure("a failed"));

        assert_eq!(b.terminations(), 1);
        let failed = waiting.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].to_string(), "a failed");
    }

    #[test]
    fn substrand_termination_fails_the_wait_directly() {
        let a = MockStrand::with_id(1);
        let b = MockStrand::with_id(2);
        let waiting = MockStrand::new();

        let wait = WaitAll::new(vec![a.handle(), b.handle()]);
        wait.begin(waiting.handle(), &api());

        a.settle_terminated();

        let failed = waiting.failed();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_terminated());
        assert_eq!(b.terminations(), 1);
    }
}
