//! The kernel's dispatcher: one per strand, interpreting the request
//! vocabulary.

use std::rc::{Rc, Weak};

use crate::coroutine::Frame;
use crate::dispatch::{DispatchSource, Dispatcher, Request, RequestKey};
use crate::strand::{Strand, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;
use crate::wait::{WaitAll, WaitAny, WaitFirst, WaitSome};

use super::KernelInner;
use super::strand::KernelStrand;

/// Interprets the requests yielded on behalf of one strand.
///
/// Every frame the strand runs — the root frame and any nested
/// delegation — dispatches through the same instance, which is how the
/// strand's `resume`/`fail` routing always points at the innermost
/// suspended frame.
///
/// Requests arriving after the strand has already reached a terminal
/// state (terminated by a cascade while its frame was mid-tick) are
/// discarded: the frame never gets an answer and is dropped with its
/// strand.
pub struct StrandApi<T: 'static> {
    this: Weak<StrandApi<T>>,
    kernel: Weak<KernelInner>,
    strand: Weak<KernelStrand<T>>,
}

impl<T: Clone + 'static> StrandApi<T> {
    pub(crate) fn new(kernel: Weak<KernelInner>, strand: Weak<KernelStrand<T>>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            kernel,
            strand,
        })
    }

    fn as_dispatcher(&self) -> Rc<dyn Dispatcher<T>> {
        self.this.upgrade().expect("dispatcher dropped")
    }
}

impl<T: Clone + 'static> Dispatcher<T> for StrandApi<T> {
    fn dispatch(
        &self,
        _source: DispatchSource,
        frame: &Rc<Frame<T>>,
        request: Request<T>,
        _key: Option<RequestKey>,
    ) {
        let Some(strand) = self.strand.upgrade() else {
            return;
        };
        if strand.state().is_terminal() {
            trace!(strand = %strand.id(), request = request.kind(), "request from a dead strand discarded");
            return;
        }
        trace!(strand = %strand.id(), request = request.kind(), "dispatch");
        match request {
            Request::Suspend(park) => {
                strand.note_suspended(frame);
                park(strand.handle());
            }
            Request::Delegate(computation) => {
                strand.note_suspended(frame);
                let nested = Frame::new(computation);
                let caller: Rc<dyn Suspendable<T>> = frame.clone();
                nested.begin(caller, self.as_dispatcher());
            }
            Request::WaitAny(substrands) => {
                strand.note_suspended(frame);
                WaitAny::new(substrands).begin(strand.handle(), &self.as_dispatcher());
            }
            Request::WaitSome(count, substrands) => {
                strand.note_suspended(frame);
                WaitSome::new(count, substrands).begin(strand.handle(), &self.as_dispatcher());
            }
            Request::WaitAll(substrands) => {
                strand.note_suspended(frame);
                WaitAll::new(substrands).begin(strand.handle(), &self.as_dispatcher());
            }
            Request::WaitFirst(substrands) => {
                strand.note_suspended(frame);
                WaitFirst::new(substrands).begin(strand.handle(), &self.as_dispatcher());
            }
            Request::Yield => {
                strand.note_suspended(frame);
                let Some(kernel) = self.kernel.upgrade() else {
                    return;
                };
                let strand = Rc::downgrade(&strand);
                kernel.enqueue(Box::new(move || {
                    let Some(strand) = strand.upgrade() else {
                        return;
                    };
                    if strand.state().is_terminal() {
                        return;
                    }
                    strand.resume(Value::Unit);
                }));
            }
            Request::Terminate => {
                strand.handle().terminate();
            }
        }
    }
}
