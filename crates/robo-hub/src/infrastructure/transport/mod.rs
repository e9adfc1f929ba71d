//! Transport implementations.
//!
//! - **`recording`** – Records every call and answers queries from canned
//!   data.  Used by tests to drive the hub without any Bluetooth stack.
//! - **`simulated`** – An in-memory Sphero that answers commands the way a
//!   real robot does.  Used by the binary for hardware-free runs and by the
//!   end-to-end tests.

pub mod recording;
pub mod simulated;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
