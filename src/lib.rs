//! Weft: a cooperative strand kernel for Rust.
//!
//! # Overview
//!
//! Weft coordinates many suspendable computations on a single
//! scheduler. The schedulable unit is the *strand*: it runs its
//! computation until the next suspend point, owns exactly one terminal
//! outcome, and reports that outcome to its observers exactly once.
//! Cancellation is cooperative — a termination request is delivered
//! through whatever hook currently owns the strand's pending suspend —
//! and strands communicate through blocking, backpressured, FIFO
//! channels with close-propagation.
//!
//! # Core Guarantees
//!
//! - **Exactly-once completion**: observer notification fires once per
//!   observer, in registration order, only after the terminal state
//! - **Bounded re-entrancy**: chains of synchronously-answered requests
//!   run as iteration, never recursion, no matter how long
//! - **Original-index ordering**: wait results and aggregate failures
//!   are keyed by the position the caller supplied, not completion order
//! - **FIFO channels**: the oldest pending counterpart is always served
//!   first; close fails every parked operation instead of dropping it
//! - **Loud contract violations**: double starts, stray resumes, and
//!   competing terminators panic instead of corrupting state
//!
//! # Module Structure
//!
//! - [`types`]: identifiers, lifecycle states, the resume currency
//! - [`error`](mod@error): the closed error taxonomy
//! - [`strand`](mod@strand): the boundary traits strands expose
//! - [`coroutine`]: suspendable computations and the frame engine
//! - [`dispatch`]: the request vocabulary and the dispatcher contract
//! - [`wait`]: threshold combinators over strands
//! - [`channel`]: in-memory and externally-fed channels
//! - [`kernel`]: the deterministic tick-queue scheduler binding
//! - [`tracing_compat`]: optional tracing integration
//!
//! # Example
//!
//! ```
//! use weft::{Kernel, Request, Signal, Step, StepFn, Value};
//!
//! let kernel = Kernel::new();
//! let result: Value<i32> = kernel
//!     .start(StepFn::new(|signal: Signal<i32>| match signal {
//!         Signal::Start => Ok(Step::yields(Request::Yield)),
//!         Signal::Resume(_) => Ok(Step::Done(Value::Item(42))),
//!         Signal::Fail(error) => Err(error),
//!     }))
//!     .unwrap();
//! assert_eq!(result, Value::Item(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

pub mod channel;
pub mod coroutine;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod strand;
pub mod tracing_compat;
pub mod types;
pub mod wait;

// Test-only helpers, exposed behind `test-internals` for downstream
// integration suites.
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use channel::{ChannelRead, ChannelWrite, MemoryChannel, StreamChannel, StreamRead};
pub use coroutine::{Coroutine, Frame, Signal, Step, StepFn};
pub use dispatch::{DispatchSource, Dispatcher, Request, RequestKey, SuspendFn};
pub use error::{CompositeError, Error, Result};
pub use kernel::{Kernel, KernelStrand, StrandApi};
pub use strand::{Strand, StrandObserver, Suspendable, Terminator};
pub use types::{StrandId, StrandState, Value};
pub use wait::{WaitAll, WaitAny, WaitFirst, WaitSome};
