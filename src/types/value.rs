//! The resume currency carried through the suspend/resume contract.

use std::collections::BTreeMap;

/// A value travelling through the suspend/resume contract.
///
/// Strand outcomes, channel payloads, and combinator results all move
/// through this closed union:
///
/// - [`Value::Unit`] carries no payload (an unblocked writer).
/// - [`Value::Item`] carries a single payload.
/// - [`Value::Many`] carries combinator results keyed by the original
///   substrand index. The map is sparse: only indices that actually
///   succeeded are present.
///
/// The nesting is deliberate — a strand whose computation is itself a
/// wait settles with the `Many` it was resumed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<T> {
    /// No payload.
    Unit,
    /// A single payload.
    Item(T),
    /// Several results keyed by original substrand index.
    Many(BTreeMap<usize, Value<T>>),
}

impl<T> Value<T> {
    /// Returns true if this value carries no payload.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    /// Returns true if this value is a single payload.
    #[must_use]
    pub const fn is_item(&self) -> bool {
        matches!(self, Self::Item(_))
    }

    /// Returns the single payload, if this value is one.
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Unit | Self::Many(_) => None,
        }
    }

    /// Borrows the single payload, if this value is one.
    #[must_use]
    pub const fn as_item(&self) -> Option<&T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Unit | Self::Many(_) => None,
        }
    }

    /// Returns the result map, if this value is one.
    pub fn into_many(self) -> Option<BTreeMap<usize, Self>> {
        match self {
            Self::Many(map) => Some(map),
            Self::Unit | Self::Item(_) => None,
        }
    }

    /// Returns the single payload.
    ///
    /// # Panics
    ///
    /// Panics with `msg` if the value is not [`Value::Item`].
    #[track_caller]
    pub fn expect_item(self, msg: &str) -> T {
        match self {
            Self::Item(item) => item,
            Self::Unit => panic!("{msg}: value is Unit"),
            Self::Many(_) => panic!("{msg}: value is Many"),
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(item: T) -> Self {
        Self::Item(item)
    }
}
