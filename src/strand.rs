//! Boundary traits for strands and their observers.
//!
//! A strand is the schedulable unit: it owns exactly one terminal
//! outcome, a set of completion observers, and an optional cancellation
//! hook. Frames, wait-combinators, and channels all program against
//! these traits rather than a concrete scheduler, which keeps them
//! testable with recording doubles and portable across bindings.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::types::{StrandId, StrandState, Value};

/// A party that can be woken with a value or a failure.
///
/// Implemented by execution frames and strands; consumed by channels,
/// combinators, and dispatcher bindings. For any pending suspend,
/// exactly one of [`resume`](Suspendable::resume) /
/// [`fail`](Suspendable::fail) is invoked, exactly once.
pub trait Suspendable<T: 'static> {
    /// Delivers the answer to the pending suspend.
    fn resume(&self, value: Value<T>);

    /// Delivers a failure to the pending suspend.
    fn fail(&self, error: Error);
}

/// A cancellation hook owned by whatever currently holds a strand's
/// pending suspend.
pub type Terminator = Box<dyn FnOnce()>;

/// The scheduler-facing surface of a strand.
pub trait Strand<T: 'static>: Suspendable<T> {
    /// The strand's unique identifier.
    fn id(&self) -> StrandId;

    /// The strand's current lifecycle state.
    fn state(&self) -> StrandState;

    /// Requests cooperative termination.
    ///
    /// Runs the installed terminator, then settles the strand as
    /// terminated. A no-op once the strand is terminal.
    fn terminate(&self);

    /// Registers a completion listener.
    ///
    /// Observers are notified exactly once, in registration order, when
    /// the strand settles. Attaching to an already-terminal strand
    /// notifies the observer immediately.
    fn attach_observer(&self, observer: Rc<dyn StrandObserver<T>>);

    /// Removes a previously attached listener. Unknown observers are
    /// ignored; already-notified observers are detached automatically.
    fn detach_observer(&self, observer: &Rc<dyn StrandObserver<T>>);

    /// Installs (`Some`) or clears (`None`) the termination hook.
    ///
    /// The hook is owned by whichever component holds the strand's
    /// pending suspend; implementations clear it when the suspend
    /// resolves.
    ///
    /// # Panics
    ///
    /// Installing over an existing hook panics: only one component may
    /// own a pending suspend at a time.
    fn set_terminator(&self, hook: Option<Terminator>);
}

/// A listener notified exactly once when a strand reaches a terminal
/// state.
///
/// A returned error is escalated by the notifier as
/// [`Error::Listener`]; it is never silently dropped.
pub trait StrandObserver<T: 'static> {
    /// The strand completed with a value.
    fn success(&self, strand: &Rc<dyn Strand<T>>, value: &Value<T>) -> Result<()>;

    /// The strand failed with an error.
    fn failure(&self, strand: &Rc<dyn Strand<T>>, error: &Error) -> Result<()>;

    /// The strand was cooperatively terminated.
    fn terminated(&self, strand: &Rc<dyn Strand<T>>) -> Result<()>;
}

/// Identity comparison for attached observers.
///
/// Compares the underlying allocation and ignores vtables, so the same
/// observer registered through different unsized coercions still
/// matches.
#[must_use]
pub fn same_observer<T: 'static>(
    a: &Rc<dyn StrandObserver<T>>,
    b: &Rc<dyn StrandObserver<T>>,
) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
