//! Synchronization utilities for robust mutex handling
//!
//! Lock poisoning is turned into a domain error instead of a panic, so a
//! panic on one task cannot cascade through every later lock of the same
//! registry or broker state.

use std::sync::LockResult;

/// Convert a poisoned lock result into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use brokerlink::broker::BrokerError;
/// use brokerlink::core::sync::handle_mutex_poison;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| BrokerError::Receive { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A panic occurred while holding a lock: {}",
            poison_err
        ))
    })
}
