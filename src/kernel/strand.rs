//! The kernel's concrete strand.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::coroutine::{Coroutine, Frame};
use crate::error::Error;
use crate::strand::{Strand, StrandObserver, Suspendable, Terminator, same_observer};
use crate::tracing_compat::{debug, error};
use crate::types::{StrandId, StrandState, Value};

use super::KernelInner;
use super::api::StrandApi;

enum Settled<T: 'static> {
    Success(Value<T>),
    Failure(Error),
    Terminated,
}

/// A strand scheduled on a [`Kernel`](super::Kernel).
///
/// The strand owns exactly one terminal outcome, an ordered observer
/// list notified exactly once, and the terminator slot of whatever
/// currently holds its pending suspend. `resume` and `fail` route to the
/// innermost suspended frame; the routing is maintained by the
/// dispatcher on every suspend, so nested delegation stays transparent.
pub struct KernelStrand<T: 'static> {
    id: StrandId,
    this: Weak<KernelStrand<T>>,
    kernel: Weak<KernelInner>,
    state: Cell<StrandState>,
    frame: RefCell<Option<Rc<Frame<T>>>>,
    observers: RefCell<SmallVec<[Rc<dyn StrandObserver<T>>; 2]>>,
    terminator: RefCell<Option<Terminator>>,
    outcome: RefCell<Option<Settled<T>>>,
}

impl<T: 'static> KernelStrand<T> {
    pub(crate) fn new(kernel: Weak<KernelInner>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id: StrandId::next(),
            this: this.clone(),
            kernel,
            state: Cell::new(StrandState::New),
            frame: RefCell::new(None),
            observers: RefCell::new(SmallVec::new()),
            terminator: RefCell::new(None),
            outcome: RefCell::new(None),
        })
    }

    /// The strand's unique identifier.
    #[must_use]
    pub fn id(&self) -> StrandId {
        self.id
    }

    /// The strand's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StrandState {
        self.state.get()
    }

    /// This strand as a trait handle.
    #[must_use]
    pub fn handle(&self) -> Rc<dyn Strand<T>> {
        self.this.upgrade().expect("strand dropped")
    }

    /// Re-points `resume`/`fail` at the frame that is about to suspend.
    pub(crate) fn note_suspended(&self, frame: &Rc<Frame<T>>) {
        *self.frame.borrow_mut() = Some(frame.clone());
        self.state.set(StrandState::Suspended);
    }

    fn settle(&self, outcome: Settled<T>) {
        assert!(
            !self.state.get().is_terminal(),
            "strand already settled"
        );
        let state = match &outcome {
            Settled::Success(_) => StrandState::Completed,
            Settled::Failure(_) => StrandState::Failed,
            Settled::Terminated => StrandState::Terminated,
        };
        debug!(strand = %self.id, ?state, "strand settled");
        self.state.set(state);
        *self.outcome.borrow_mut() = Some(outcome);
        *self.terminator.borrow_mut() = None;
        *self.frame.borrow_mut() = None;
        let observers = mem::take(&mut *self.observers.borrow_mut());
        for observer in observers {
            self.notify(&observer);
        }
    }

    /// Delivers this strand's outcome to one observer, escalating a
    /// listener failure instead of swallowing it.
    fn notify(&self, observer: &Rc<dyn StrandObserver<T>>) {
        let handle = self.handle();
        let result = {
            let outcome = self.outcome.borrow();
            match outcome.as_ref().expect("strand notified before settling") {
                Settled::Success(value) => observer.success(&handle, value),
                Settled::Failure(failure) => observer.failure(&handle, failure),
                Settled::Terminated => observer.terminated(&handle),
            }
        };
        if let Err(source) = result {
            let escalated = Error::listener(self.id, source);
            error!(%escalated, "listener failure escalated");
            match self.kernel.upgrade() {
                Some(kernel) => kernel.escalate(escalated),
                None => panic!("listener failure with no kernel to escalate to: {escalated}"),
            }
        }
    }
}

impl<T: Clone + 'static> KernelStrand<T> {
    /// First tick: builds the root frame and drives it to its first
    /// suspension or completion. Skipped if the strand was terminated
    /// before it ever ran.
    pub(crate) fn start(&self, computation: Box<dyn Coroutine<T>>) {
        if self.state.get().is_terminal() {
            return;
        }
        debug_assert_eq!(self.state.get(), StrandState::New);
        debug!(strand = %self.id, "strand started");
        self.state.set(StrandState::Running);
        let frame = Frame::new(computation);
        *self.frame.borrow_mut() = Some(frame.clone());
        let api = StrandApi::new(self.kernel.clone(), self.this.clone());
        let sink: Rc<dyn Suspendable<T>> = Rc::new(CompletionSink {
            strand: self.this.clone(),
        });
        frame.begin(sink, api);
    }
}

impl<T: 'static> Suspendable<T> for KernelStrand<T> {
    fn resume(&self, value: Value<T>) {
        assert!(!self.state.get().is_terminal(), "strand already settled");
        *self.terminator.borrow_mut() = None;
        self.state.set(StrandState::Running);
        let frame = self
            .frame
            .borrow()
            .clone()
            .expect("strand is not suspended");
        frame.resume(value);
    }

    fn fail(&self, failure: Error) {
        assert!(!self.state.get().is_terminal(), "strand already settled");
        *self.terminator.borrow_mut() = None;
        self.state.set(StrandState::Running);
        let frame = self
            .frame
            .borrow()
            .clone()
            .expect("strand is not suspended");
        frame.fail(failure);
    }
}

impl<T: 'static> Strand<T> for KernelStrand<T> {
    fn id(&self) -> StrandId {
        self.id
    }

    fn state(&self) -> StrandState {
        self.state.get()
    }

    fn terminate(&self) {
        if self.state.get().is_terminal() {
            return;
        }
        debug!(strand = %self.id, "strand terminated");
        let hook = self.terminator.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
        self.settle(Settled::Terminated);
    }

    fn attach_observer(&self, observer: Rc<dyn StrandObserver<T>>) {
        if self.state.get().is_terminal() {
            self.notify(&observer);
            return;
        }
        self.observers.borrow_mut().push(observer);
    }

    fn detach_observer(&self, observer: &Rc<dyn StrandObserver<T>>) {
        self.observers
            .borrow_mut()
            .retain(|attached| !same_observer(attached, observer));
    }

    fn set_terminator(&self, hook: Option<Terminator>) {
        let mut slot = self.terminator.borrow_mut();
        if hook.is_some() {
            assert!(
                slot.is_none(),
                "strand already has a terminator installed"
            );
        }
        *slot = hook;
    }
}

/// The root frame's caller: the frame completing is the strand settling.
///
/// A completion arriving after the strand was terminated mid-tick is
/// discarded — the terminal outcome was already decided.
struct CompletionSink<T: 'static> {
    strand: Weak<KernelStrand<T>>,
}

impl<T: 'static> Suspendable<T> for CompletionSink<T> {
    fn resume(&self, value: Value<T>) {
        let Some(strand) = self.strand.upgrade() else {
            return;
        };
        if strand.state().is_terminal() {
            return;
        }
        strand.settle(Settled::Success(value));
    }

    fn fail(&self, failure: Error) {
        let Some(strand) = self.strand.upgrade() else {
            return;
        };
        if strand.state().is_terminal() {
            return;
        }
        strand.settle(Settled::Failure(failure));
    }
}
