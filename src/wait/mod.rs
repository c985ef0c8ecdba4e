//! Wait-combinators over strands.
//!
//! Each combinator observes a fixed roster of substrands, counts
//! successes and failures, cancels whatever is still pending once its
//! condition resolves or becomes unreachable, and wakes the waiting
//! strand with an aggregate result or an aggregate failure.
//!
//! Two rules hold across every variant:
//!
//! - **Ordering is by construction position.** Results and recorded
//!   failures are keyed by the index at which the caller supplied the
//!   substrand, never by completion order.
//! - **The combinator owns the waiting strand's suspend.** It installs
//!   itself as the strand's terminator, so terminating the waiter
//!   detaches from and terminates every still-pending substrand.
//!
//! Substrands that are already terminal at registration flow through the
//! same observer paths as live ones; termination of a substrand arrives
//! as the distinguished [`Error::Terminated`](crate::Error::Terminated)
//! failure.

mod all;
mod any;
mod first;
mod some;

pub use all::WaitAll;
pub use any::WaitAny;
pub use first::WaitFirst;
pub use some::WaitSome;

use smallvec::SmallVec;
use std::rc::Rc;

use crate::strand::{Strand, StrandObserver};

/// The fixed substrand roster of a combinator.
///
/// Slots keep original construction positions; resolving a substrand
/// clears its slot so results and failures stay keyed by the index the
/// caller supplied.
struct Roster<T: 'static> {
    slots: SmallVec<[Option<Rc<dyn Strand<T>>>; 4]>,
    pending: usize,
}

impl<T: 'static> Roster<T> {
    fn new(substrands: Vec<Rc<dyn Strand<T>>>) -> Self {
        assert!(!substrands.is_empty(), "a wait needs at least one substrand");
        let pending = substrands.len();
        Self {
            slots: substrands.into_iter().map(Some).collect(),
            pending,
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn pending(&self) -> usize {
        self.pending
    }

    fn slot(&self, index: usize) -> Option<Rc<dyn Strand<T>>> {
        self.slots[index].clone()
    }

    /// Clears the slot holding `strand`, returning its original index,
    /// or `None` if the substrand was already resolved.
    fn resolve(&mut self, strand: &Rc<dyn Strand<T>>) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.id() == strand.id()))?;
        self.slots[index] = None;
        self.pending -= 1;
        Some(index)
    }

    /// Removes and returns every still-pending substrand.
    fn drain_pending(&mut self) -> SmallVec<[Rc<dyn Strand<T>>; 4]> {
        self.pending = 0;
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

/// Detaches `observer` from and terminates each drained substrand.
fn cancel_pending<T: 'static>(
    pending: SmallVec<[Rc<dyn Strand<T>>; 4]>,
    observer: &Rc<dyn StrandObserver<T>>,
) {
    for strand in pending {
        strand.detach_observer(observer);
        strand.terminate();
    }
}
