//! Externally-fed readable channel for event-loop bindings.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::coroutine::{Coroutine, Signal, Step};
use crate::dispatch::Request;
use crate::error::{Error, Result};
use crate::strand::{Strand, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;

struct StreamState<T: 'static> {
    buffer: VecDeque<T>,
    reader: Option<Rc<dyn Strand<T>>>,
    closed: bool,
}

/// A readable channel fed from outside the strand world.
///
/// An event-loop binding pushes items in with
/// [`offer`](StreamChannel::offer) as they arrive from the underlying
/// source, and uses [`wants_more`](StreamChannel::wants_more) as its
/// pause/resume signal once buffered items reach the high-water mark.
///
/// Reads are exclusive: a second `read` while one is parked fails with
/// the locked-channel error. `is_closed` reports true once close has
/// been observed.
pub struct StreamChannel<T: 'static> {
    this: std::rc::Weak<StreamChannel<T>>,
    state: RefCell<StreamState<T>>,
    high_water: usize,
}

impl<T: 'static> StreamChannel<T> {
    /// Creates a stream channel that asks for one item at a time.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::with_high_water(1)
    }

    /// Creates a stream channel that keeps asking for input until
    /// `high_water` items are buffered.
    ///
    /// # Panics
    ///
    /// Panics when `high_water` is zero.
    #[must_use]
    pub fn with_high_water(high_water: usize) -> Rc<Self> {
        assert!(high_water >= 1, "high-water mark must be at least 1");
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(StreamState {
                buffer: VecDeque::new(),
                reader: None,
                closed: false,
            }),
            high_water,
        })
    }

    /// Hands one item in from the binding side.
    ///
    /// A parked reader is resumed with the item directly; otherwise it
    /// is buffered. Items offered after close are dropped.
    pub fn offer(&self, item: T) {
        let reader = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            match state.reader.take() {
                Some(reader) => reader,
                None => {
                    state.buffer.push_back(item);
                    return;
                }
            }
        };
        reader.resume(Value::Item(item));
    }

    /// The binding's pause/resume signal: true while the channel can put
    /// more input to use — a reader is parked, or the buffer is below
    /// the high-water mark.
    #[must_use]
    pub fn wants_more(&self) -> bool {
        let state = self.state.borrow();
        !state.closed && (state.reader.is_some() || state.buffer.len() < self.high_water)
    }

    /// True once [`close`](StreamChannel::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Closes the channel: the parked read, if any, fails with
    /// [`Error::ChannelClosed`]. Buffered items remain readable until
    /// drained. Idempotent.
    pub fn close(&self) {
        let reader = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.closed = true;
            state.reader.take()
        };
        trace!("stream channel closed");
        if let Some(reader) = reader {
            reader.fail(Error::ChannelClosed);
        }
    }

    /// A suspendable, exclusive read.
    #[must_use]
    pub fn read(&self) -> StreamRead<T> {
        StreamRead {
            channel: self.this.upgrade().expect("channel dropped"),
        }
    }

    fn start_read(&self) -> Result<Step<T>> {
        {
            let mut state = self.state.borrow_mut();
            if state.reader.is_some() {
                return Err(Error::channel_locked("read"));
            }
            if let Some(item) = state.buffer.pop_front() {
                return Ok(Step::Done(Value::Item(item)));
            }
            if state.closed {
                return Err(Error::ChannelClosed);
            }
        }
        let channel = self.this.upgrade().expect("channel dropped");
        Ok(Step::yields(Request::suspend(move |strand| {
            channel.park(strand);
        })))
    }

    fn park(&self, strand: Rc<dyn Strand<T>>) {
        self.state.borrow_mut().reader = Some(strand.clone());
        let channel = self.this.clone();
        strand.set_terminator(Some(Box::new(move || {
            if let Some(channel) = channel.upgrade() {
                channel.state.borrow_mut().reader = None;
            }
        })));
    }
}

/// A pending `read` on a [`StreamChannel`].
pub struct StreamRead<T: 'static> {
    channel: Rc<StreamChannel<T>>,
}

impl<T: 'static> Coroutine<T> for StreamRead<T> {
    fn step(&mut self, signal: Signal<T>) -> Result<Step<T>> {
        match signal {
            Signal::Start => self.channel.start_read(),
            Signal::Resume(value) => Ok(Step::Done(value)),
            Signal::Fail(error) => Err(error),
        }
    }
}
