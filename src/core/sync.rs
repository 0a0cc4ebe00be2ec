//! Mutex poisoning helpers
//!
//! A poisoned lock means some thread panicked while holding it. The data is
//! still reachable, but callers surface the condition as a module error
//! rather than propagating the panic.

use std::sync::LockResult;

/// Convert a poisoned lock result into a module error built by `error_constructor`
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use arcai_scan::core::sync::handle_mutex_poison;
/// use arcai_scan::scanner::api::ScanError;
///
/// let processes = Mutex::new(Vec::<u32>::new());
/// let guard = handle_mutex_poison(
///     processes.lock(),
///     |message| ScanError::Configuration { message },
/// ).unwrap();
/// assert!(guard.is_empty());
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poisoned| {
        error_constructor(format!(
            "Internal synchronisation error: lock poisoned by a panicking thread ({})",
            poisoned
        ))
    })
}
