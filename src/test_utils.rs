//! Test doubles for strand-facing components.
//!
//! These helpers exist for unit and integration tests: recording
//! callers, scripted dispatchers, and mock strands with replayable
//! outcomes. They are compiled for the crate's own tests and, behind
//! the `test-internals` feature, for downstream integration suites.
//! Not for production use.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::coroutine::Frame;
use crate::dispatch::{DispatchSource, Dispatcher, Request, RequestKey};
use crate::error::Error;
use crate::strand::{Strand, StrandObserver, Suspendable, Terminator};
use crate::types::{StrandId, StrandState, Value};

/// Initializes test logging output once per process.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// A caller that records every completion notification it receives.
pub struct CallerLog<T: 'static> {
    resumed: RefCell<Vec<Value<T>>>,
    failed: RefCell<Vec<Error>>,
}

impl<T: 'static> CallerLog<T> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            resumed: RefCell::new(Vec::new()),
            failed: RefCell::new(Vec::new()),
        })
    }

    /// The recorded success notifications.
    #[must_use]
    pub fn resumed(&self) -> Vec<Value<T>>
    where
        T: Clone,
    {
        self.resumed.borrow().clone()
    }

    /// The recorded failure notifications.
    #[must_use]
    pub fn failed(&self) -> Vec<Error> {
        self.failed.borrow().clone()
    }
}

impl<T: 'static> Suspendable<T> for CallerLog<T> {
    fn resume(&self, value: Value<T>) {
        self.resumed.borrow_mut().push(value);
    }

    fn fail(&self, error: Error) {
        self.failed.borrow_mut().push(error);
    }
}

/// How a [`ScriptedDispatcher`] answers one dispatched request.
pub enum Answer<T: 'static> {
    /// Resume the frame synchronously with the value.
    Resume(Value<T>),
    /// Fail the frame synchronously with the error.
    Fail(Error),
    /// Park the frame for a later [`ScriptedDispatcher::answer_parked`].
    Park,
}

/// One recorded dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRecord {
    /// The request-source tag the frame passed.
    pub source: DispatchSource,
    /// The passthrough key, if any.
    pub key: Option<RequestKey>,
    /// The request's variant name.
    pub request: &'static str,
}

enum Mode<T: 'static> {
    ParkAll,
    AlwaysUnit,
    Script(RefCell<VecDeque<Answer<T>>>),
}

/// A dispatcher for frame tests: records every dispatch and answers it
/// according to a script.
pub struct ScriptedDispatcher<T: 'static> {
    mode: Mode<T>,
    log: RefCell<Vec<DispatchRecord>>,
    parked: RefCell<Vec<(Rc<Frame<T>>, Request<T>)>>,
}

impl<T: 'static> ScriptedDispatcher<T> {
    fn with_mode(mode: Mode<T>) -> Rc<Self> {
        Rc::new(Self {
            mode,
            log: RefCell::new(Vec::new()),
            parked: RefCell::new(Vec::new()),
        })
    }

    /// Parks every dispatched request.
    #[must_use]
    pub fn park_all() -> Rc<Self> {
        Self::with_mode(Mode::ParkAll)
    }

    /// Synchronously resumes every request with [`Value::Unit`].
    #[must_use]
    pub fn always_unit() -> Rc<Self> {
        Self::with_mode(Mode::AlwaysUnit)
    }

    /// Answers requests in order from `script`; parks once it runs dry.
    #[must_use]
    pub fn with_script(script: Vec<Answer<T>>) -> Rc<Self> {
        Self::with_mode(Mode::Script(RefCell::new(script.into())))
    }

    /// The recorded dispatches, in order.
    #[must_use]
    pub fn log(&self) -> Vec<DispatchRecord> {
        self.log.borrow().clone()
    }

    /// The frame parked by the `index`-th parked dispatch.
    #[must_use]
    pub fn parked_frame(&self, index: usize) -> Rc<Frame<T>> {
        self.parked.borrow()[index].0.clone()
    }

    /// Resumes the `index`-th parked frame with `value`.
    pub fn answer_parked(&self, index: usize, value: Value<T>) {
        self.parked_frame(index).resume(value);
    }

    /// Fails the `index`-th parked frame with `error`.
    pub fn fail_parked(&self, index: usize, error: Error) {
        self.parked_frame(index).fail(error);
    }
}

impl<T: 'static> Dispatcher<T> for ScriptedDispatcher<T> {
    fn dispatch(
        &self,
        source: DispatchSource,
        frame: &Rc<Frame<T>>,
        request: Request<T>,
        key: Option<RequestKey>,
    ) {
        self.log.borrow_mut().push(DispatchRecord {
            source,
            key,
            request: request.kind(),
        });
        let answer = match &self.mode {
            Mode::AlwaysUnit => Answer::Resume(Value::Unit),
            Mode::ParkAll => Answer::Park,
            Mode::Script(script) => script.borrow_mut().pop_front().unwrap_or(Answer::Park),
        };
        match answer {
            Answer::Resume(value) => frame.resume(value),
            Answer::Fail(error) => frame.fail(error),
            Answer::Park => self.parked.borrow_mut().push((frame.clone(), request)),
        }
    }
}

enum MockOutcome<T: 'static> {
    Success(Value<T>),
    Failure(Error),
    Terminated,
}

/// A recording [`Strand`] with replayable outcomes, in the spirit of the
/// handle mocks the combinator suites are written against.
pub struct MockStrand<T: 'static> {
    id: StrandId,
    this: Weak<MockStrand<T>>,
    state: Cell<StrandState>,
    resumed: RefCell<Vec<Value<T>>>,
    failed: RefCell<Vec<Error>>,
    terminations: Cell<usize>,
    detachments: Cell<usize>,
    observers: RefCell<Vec<Rc<dyn StrandObserver<T>>>>,
    terminator: RefCell<Option<Terminator>>,
    outcome: RefCell<Option<MockOutcome<T>>>,
}

impl<T: 'static> MockStrand<T> {
    /// Creates a mock with a fresh id.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::build(StrandId::next())
    }

    /// Creates a mock with a fixed id.
    #[must_use]
    pub fn with_id(id: u64) -> Rc<Self> {
        Self::build(StrandId::new_for_test(id))
    }

    fn build(id: StrandId) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id,
            this: this.clone(),
            state: Cell::new(StrandState::Suspended),
            resumed: RefCell::new(Vec::new()),
            failed: RefCell::new(Vec::new()),
            terminations: Cell::new(0),
            detachments: Cell::new(0),
            observers: RefCell::new(Vec::new()),
            terminator: RefCell::new(None),
            outcome: RefCell::new(None),
        })
    }

    /// This mock as a strand handle.
    #[must_use]
    pub fn handle(&self) -> Rc<dyn Strand<T>> {
        self.this.upgrade().expect("mock strand dropped")
    }

    /// Settles the mock as successful and notifies attached observers.
    pub fn settle_success(&self, value: Value<T>) {
        self.settle(MockOutcome::Success(value), StrandState::Completed);
    }

    /// Settles the mock as failed and notifies attached observers.
    pub fn settle_failure(&self, error: Error) {
        self.settle(MockOutcome::Failure(error), StrandState::Failed);
    }

    /// Settles the mock as terminated and notifies attached observers.
    pub fn settle_terminated(&self) {
        self.settle(MockOutcome::Terminated, StrandState::Terminated);
    }

    fn settle(&self, outcome: MockOutcome<T>, state: StrandState) {
        assert!(!self.state.get().is_terminal(), "mock already settled");
        self.state.set(state);
        *self.outcome.borrow_mut() = Some(outcome);
        let observers = std::mem::take(&mut *self.observers.borrow_mut());
        for observer in observers {
            self.notify(&observer);
        }
    }

    fn notify(&self, observer: &Rc<dyn StrandObserver<T>>) {
        let handle = self.handle();
        let outcome = self.outcome.borrow();
        let result = match outcome.as_ref().expect("mock notified before settling") {
            MockOutcome::Success(value) => observer.success(&handle, value),
            MockOutcome::Failure(error) => observer.failure(&handle, error),
            MockOutcome::Terminated => observer.terminated(&handle),
        };
        result.expect("listener failed during mock notification");
    }

    /// The recorded resume payloads.
    #[must_use]
    pub fn resumed(&self) -> Vec<Value<T>>
    where
        T: Clone,
    {
        self.resumed.borrow().clone()
    }

    /// The recorded failures.
    #[must_use]
    pub fn failed(&self) -> Vec<Error> {
        self.failed.borrow().clone()
    }

    /// How many times `terminate` was called.
    #[must_use]
    pub fn terminations(&self) -> usize {
        self.terminations.get()
    }

    /// How many observers were detached.
    #[must_use]
    pub fn detachments(&self) -> usize {
        self.detachments.get()
    }

    /// The number of currently attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// True while a terminator is installed.
    #[must_use]
    pub fn has_terminator(&self) -> bool {
        self.terminator.borrow().is_some()
    }

    /// Takes and invokes the installed terminator, simulating delivery
    /// of a termination request without settling the mock.
    pub fn run_terminator(&self) {
        let hook = self
            .terminator
            .borrow_mut()
            .take()
            .expect("no terminator installed");
        hook();
    }
}

impl<T: 'static> Suspendable<T> for MockStrand<T> {
    fn resume(&self, value: Value<T>) {
        *self.terminator.borrow_mut() = None;
        self.resumed.borrow_mut().push(value);
    }

    fn fail(&self, error: Error) {
        *self.terminator.borrow_mut() = None;
        self.failed.borrow_mut().push(error);
    }
}

impl<T: 'static> Strand<T> for MockStrand<T> {
    fn id(&self) -> StrandId {
        self.id
    }

    fn state(&self) -> StrandState {
        self.state.get()
    }

    fn terminate(&self) {
        self.terminations.set(self.terminations.get() + 1);
        if self.state.get().is_terminal() {
            return;
        }
        let hook = self.terminator.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
        self.settle(MockOutcome::Terminated, StrandState::Terminated);
    }

    fn attach_observer(&self, observer: Rc<dyn StrandObserver<T>>) {
        if self.state.get().is_terminal() {
            self.notify(&observer);
            return;
        }
        self.observers.borrow_mut().push(observer);
    }

    fn detach_observer(&self, observer: &Rc<dyn StrandObserver<T>>) {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|attached| !crate::strand::same_observer(attached, observer));
        self.detachments
            .set(self.detachments.get() + before - observers.len());
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

