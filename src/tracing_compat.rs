//! Tracing compatibility layer for structured logging.
//!
//! This module provides a unified interface for tracing that works
//! whether or not the `tracing-integration` feature is enabled:
//!
//! - **With the feature**: re-exports from the `tracing` crate.
//! - **Without**: no-op macros that compile to nothing for zero runtime
//!   overhead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! debug!(strand = %id, "strand scheduled");
//! ```

#[cfg(any(feature = "tracing-integration", feature = "test-internals"))]
pub use tracing::{debug, error, trace};

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
mod noop {
    //! No-op implementations when tracing is disabled.
    //!
    //! These macros expand to nothing, ensuring zero compile-time and
    //! runtime cost.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }
}

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
pub use crate::{debug, error, trace};
