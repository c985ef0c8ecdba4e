//! Synchronization channels between strands.
//!
//! - [`MemoryChannel`]: bounded, blocking, FIFO in-memory handoff
//!   between producer and consumer strands.
//! - [`StreamChannel`]: an externally-fed readable channel for
//!   event-loop bindings, with an exclusive reader.
//!
//! Channel operations are ordinary suspendable computations: `read` and
//! `write` return [`Coroutine`](crate::coroutine::Coroutine)s that a
//! computation delegates to, so channels consume the same
//! suspend/resume contract as everything else — they get no special
//! scheduler access.

mod memory;
mod stream;

pub use memory::{ChannelRead, ChannelWrite, MemoryChannel};
pub use stream::{StreamChannel, StreamRead};
