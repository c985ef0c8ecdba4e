//! In-memory bounded FIFO channel.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::coroutine::{Coroutine, Signal, Step};
use crate::dispatch::Request;
use crate::error::{Error, Result};
use crate::strand::{Strand, Suspendable};
use crate::tracing_compat::trace;
use crate::types::Value;

/// One queued continuation. The queue only ever holds one polarity at a
/// time: readers while `pending` is negative, providers (buffered slots
/// and blocked writers) while it is positive.
enum Entry<T: 'static> {
    /// A parked reader waiting for a value.
    Reader {
        ticket: u64,
        strand: Rc<dyn Strand<T>>,
    },
    /// A buffered value; draining it restores one capacity unit.
    Buffered { value: T },
    /// A blocked writer; draining it hands the value to the reader and
    /// unblocks the writer with `Unit`.
    Writer {
        ticket: u64,
        strand: Rc<dyn Strand<T>>,
        value: T,
    },
}

impl<T: 'static> Entry<T> {
    fn ticket(&self) -> Option<u64> {
        match self {
            Self::Reader { ticket, .. } | Self::Writer { ticket, .. } => Some(*ticket),
            Self::Buffered { .. } => None,
        }
    }
}

struct ChannelState<T: 'static> {
    /// Unused buffer slots; counts down while values sit in the queue.
    spare_capacity: usize,
    /// Queue polarity: negative magnitude = parked readers, positive =
    /// queued providers.
    pending: isize,
    /// `None` once the channel is closed.
    queue: Option<VecDeque<Entry<T>>>,
    /// Ticket source for parked entries, so terminators can find them.
    next_ticket: u64,
}

impl<T: 'static> ChannelState<T> {
    /// The polarity counter must mirror the queue exactly: its magnitude
    /// is the queue length and its sign matches what the entries are.
    #[cfg(debug_assertions)]
    fn check(&self) {
        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        debug_assert_eq!(queue.len(), self.pending.unsigned_abs());
        if self.pending < 0 {
            debug_assert!(queue.iter().all(|e| matches!(e, Entry::Reader { .. })));
        } else {
            debug_assert!(queue.iter().all(|e| !matches!(e, Entry::Reader { .. })));
        }
    }

    #[cfg(not(debug_assertions))]
    fn check(&self) {}

    fn take_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }
}

/// A bounded, blocking, FIFO channel between strands.
///
/// Up to `buffer_size` written values are held without blocking the
/// writer; beyond that, writers park until a reader drains the queue.
/// A `buffer_size` of zero makes every write a synchronous handoff.
/// Both directions are strict FIFO: the oldest pending counterpart is
/// always served first, and a buffered value enqueued before a blocked
/// writer is drained before that writer's value.
///
/// Closing is irreversible and drains the queue: every parked read and
/// write fails with [`Error::ChannelClosed`]; buffered values — already
/// handed off by their writers — are dropped without re-entering anyone.
pub struct MemoryChannel<T: 'static> {
    this: std::rc::Weak<MemoryChannel<T>>,
    state: RefCell<ChannelState<T>>,
}

impl<T: 'static> MemoryChannel<T> {
    /// Creates a channel that buffers `buffer_size` values before calls
    /// to `write` will block (0 = fully synchronous handoff).
    #[must_use]
    pub fn new(buffer_size: usize) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RefCell::new(ChannelState {
                spare_capacity: buffer_size,
                pending: 0,
                queue: Some(VecDeque::new()),
                next_ticket: 0,
            }),
        })
    }

    fn shared(&self) -> Rc<Self> {
        self.this.upgrade().expect("channel dropped")
    }

    /// True once [`close`](MemoryChannel::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().queue.is_none()
    }

    /// Closes the channel. Idempotent.
    pub fn close(&self) {
        let drained = {
            let mut state = self.state.borrow_mut();
            let Some(queue) = state.queue.take() else {
                return;
            };
            state.pending = 0;
            queue
        };
        trace!(parked = drained.len(), "channel closed");
        for entry in drained {
            match entry {
                Entry::Reader { strand, .. } | Entry::Writer { strand, .. } => {
                    strand.fail(Error::ChannelClosed);
                }
                Entry::Buffered { .. } => {}
            }
        }
    }

    /// A suspendable read: delegated like any nested computation, it
    /// finishes with the oldest available value or parks the strand
    /// until a writer provides one.
    #[must_use]
    pub fn read(&self) -> ChannelRead<T> {
        ChannelRead {
            channel: self.shared(),
        }
    }

    /// A suspendable write: finishes immediately when a reader is parked
    /// or buffer capacity remains, otherwise parks the strand until a
    /// reader drains the value.
    #[must_use]
    pub fn write(&self, value: T) -> ChannelWrite<T> {
        ChannelWrite {
            channel: self.shared(),
            value: Some(value),
        }
    }

    fn start_read(&self) -> Result<Step<T>> {
        enum Handoff<T: 'static> {
            Immediate(T),
            Unblock(Rc<dyn Strand<T>>, T),
        }

        let handoff = {
            let mut state = self.state.borrow_mut();
            if state.queue.is_none() {
                return Err(Error::ChannelClosed);
            }
            if state.pending > 0 {
                state.pending -= 1;
                let entry = state
                    .queue
                    .as_mut()
                    .expect("checked open")
                    .pop_front()
                    .expect("positive pending with an empty queue");
                let handoff = match entry {
                    Entry::Buffered { value } => {
                        state.spare_capacity += 1;
                        Handoff::Immediate(value)
                    }
                    Entry::Writer { strand, value, .. } => Handoff::Unblock(strand, value),
                    Entry::Reader { .. } => unreachable!("positive pending with parked readers"),
                };
                state.check();
                handoff
            } else {
                drop(state);
                let channel = self.shared();
                return Ok(Step::yields(Request::suspend(move |strand| {
                    channel.park_reader(strand);
                })));
            }
        };

        match handoff {
            Handoff::Immediate(value) => Ok(Step::Done(Value::Item(value))),
            Handoff::Unblock(writer, value) => {
                writer.resume(Value::Unit);
                Ok(Step::Done(Value::Item(value)))
            }
        }
    }

    fn start_write(&self, value: T) -> Result<Step<T>> {
        let reader = {
            let mut state = self.state.borrow_mut();
            if state.queue.is_none() {
                return Err(Error::ChannelClosed);
            }
            if state.pending < 0 {
                state.pending += 1;
                let entry = state
                    .queue
                    .as_mut()
                    .expect("checked open")
                    .pop_front()
                    .expect("negative pending with an empty queue");
                let Entry::Reader { strand, .. } = entry else {
                    unreachable!("negative pending without parked readers");
                };
                state.check();
                strand
            } else if state.spare_capacity > 0 {
                state.spare_capacity -= 1;
                state.pending += 1;
                state
                    .queue
                    .as_mut()
                    .expect("checked open")
                    .push_back(Entry::Buffered { value });
                state.check();
                return Ok(Step::Done(Value::Unit));
            } else {
                drop(state);
                let channel = self.shared();
                return Ok(Step::yields(Request::suspend(move |strand| {
                    channel.park_writer(strand, value);
                })));
            }
        };

        reader.resume(Value::Item(value));
        Ok(Step::Done(Value::Unit))
    }

    /// Parks a reader. Runs synchronously while the strand suspends, so
    /// the counter and queue are updated before anything can interleave.
    fn park_reader(&self, strand: Rc<dyn Strand<T>>) {
        let ticket = {
            let mut state = self.state.borrow_mut();
            let ticket = state.take_ticket();
            state.pending -= 1;
            state
                .queue
                .as_mut()
                .expect("parked a reader on a closed channel")
                .push_back(Entry::Reader {
                    ticket,
                    strand: strand.clone(),
                });
            state.check();
            ticket
        };
        trace!(ticket, strand = %strand.id(), "reader parked");
        self.install_eviction(&strand, ticket);
    }

    fn park_writer(&self, strand: Rc<dyn Strand<T>>, value: T) {
        let ticket = {
            let mut state = self.state.borrow_mut();
            let ticket = state.take_ticket();
            state.pending += 1;
            state
                .queue
                .as_mut()
                .expect("parked a writer on a closed channel")
                .push_back(Entry::Writer {
                    ticket,
                    strand: strand.clone(),
                    value,
                });
            state.check();
            ticket
        };
        trace!(ticket, strand = %strand.id(), "writer parked");
        self.install_eviction(&strand, ticket);
    }

    /// The channel wait owns the strand's pending suspend: terminating
    /// the strand removes its queue entry instead of leaving a dangling
    /// continuation.
    fn install_eviction(&self, strand: &Rc<dyn Strand<T>>, ticket: u64) {
        let channel = self.this.clone();
        strand.set_terminator(Some(Box::new(move || {
            if let Some(channel) = channel.upgrade() {
                channel.evict(ticket);
            }
        })));
    }

    fn evict(&self, ticket: u64) {
        let mut state = self.state.borrow_mut();
        let Some(queue) = state.queue.as_mut() else {
            return;
        };
        let Some(position) = queue.iter().position(|e| e.ticket() == Some(ticket)) else {
            return;
        };
        let entry = queue.remove(position).expect("position in bounds");
        match entry {
            Entry::Reader { .. } => state.pending += 1,
            Entry::Writer { .. } => state.pending -= 1,
            Entry::Buffered { .. } => unreachable!("buffered slots hold no strand"),
        }
        state.check();
        trace!(ticket, "parked entry evicted");
    }
}

/// A pending `read` on a [`MemoryChannel`].
pub struct ChannelRead<T: 'static> {
    channel: Rc<MemoryChannel<T>>,
}

impl<T: 'static> Coroutine<T> for ChannelRead<T> {
    fn step(&mut self, signal: Signal<T>) -> Result<Step<T>> {
        match signal {
            Signal::Start => self.channel.start_read(),
            Signal::Resume(value) => Ok(Step::Done(value)),
            Signal::Fail(error) => Err(error),
        }
    }
}

/// A pending `write` on a [`MemoryChannel`].
pub struct ChannelWrite<T: 'static> {
    channel: Rc<MemoryChannel<T>>,
    value: Option<T>,
}

impl<T: 'static> Coroutine<T> for ChannelWrite<T> {
    fn step(&mut self, signal: Signal<T>) -> Result<Step<T>> {
        match signal {
            Signal::Start => {
                let value = self.value.take().expect("write stepped twice from start");
                self.channel.start_write(value)
            }
            Signal::Resume(_) => Ok(Step::Done(Value::Unit)),
            Signal::Fail(error) => Err(error),
        }
    }
}
