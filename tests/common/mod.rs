//! Shared helpers for the integration suites.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use weft::{
    Coroutine, Error, Request, Result, Signal, Step, StepFn, Strand, StrandId, StrandObserver,
    Value,
};

/// A computation that yields one request and settles with its answer.
pub fn await_request<T: 'static>(request: Request<T>) -> impl Coroutine<T> {
    let mut slot = Some(request);
    StepFn::new(move |signal: Signal<T>| match signal {
        Signal::Start => Ok(Step::yields(slot.take().expect("request already yielded"))),
        Signal::Resume(value) => Ok(Step::Done(value)),
        Signal::Fail(error) => Err(error),
    })
}

/// A computation that finishes immediately.
pub fn immediate<T: 'static>(value: Value<T>) -> impl Coroutine<T> {
    let mut slot = Some(value);
    StepFn::new(move |_signal: Signal<T>| -> Result<Step<T>> {
        Ok(Step::Done(slot.take().expect("already completed")))
    })
}

/// Records completion notifications across strands, in arrival order.
pub struct Recorder<T: 'static> {
    events: RefCell<Vec<Outcome<T>>>,
    fail_next: RefCell<Option<Error>>,
}

#[derive(Debug, Clone)]
pub enum Outcome<T: 'static> {
    Success(StrandId, Value<T>),
    Failure(StrandId, Error),
    Terminated(StrandId),
}

impl<T: 'static> Recorder<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            events: RefCell::new(Vec::new()),
            fail_next: RefCell::new(None),
        })
    }

    /// Makes the next notification return `error`.
    pub fn fail_next(&self, error: Error) {
        *self.fail_next.borrow_mut() = Some(error);
    }

    pub fn events(&self) -> Vec<Outcome<T>>
    where
        T: Clone,
    {
        self.events.borrow().clone()
    }

    /// The success payloads, in notification order.
    pub fn success_values(&self) -> Vec<Value<T>>
    where
        T: Clone,
    {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Outcome::Success(_, value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// The strands that succeeded, in notification order.
    pub fn success_order(&self) -> Vec<StrandId> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Outcome::Success(id, _) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// The failures, in notification order.
    pub fn failures(&self) -> Vec<(StrandId, Error)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Outcome::Failure(id, error) => Some((*id, error.clone())),
                _ => None,
            })
            .collect()
    }

    /// The strands reported terminated, in notification order.
    pub fn terminated_ids(&self) -> Vec<StrandId> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Outcome::Terminated(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.borrow().len()
    }

    fn record(&self, event: Outcome<T>) -> Result<()> {
        self.events.borrow_mut().push(event);
        match self.fail_next.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<T: Clone + 'static> StrandObserver<T> for Recorder<T> {
    fn success(&self, strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()> {
        self.record(Outcome::Success(strand.id(), value.clone()))
    }

    fn failure(&self, strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()> {
        self.record(Outcome::Failure(strand.id(), error.clone()))
    }

    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()> {
        self.record(Outcome::Terminated(strand.id()))
    }
}
