//! Utility macros and functions shared across the crate.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
///
/// # Example
///
/// ```ignore
/// ensure!(!name.is_empty(), BuildError::invalid_header("empty header name"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// The guarded values in this crate are plain data that stay consistent
/// between statements, so a poisoned lock carries no broken invariant.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
