//! Error reporting helpers shared by the binary and library modules

/// Errors that know whether the user can fix them
///
/// When `is_user_actionable()` is true, `user_message()` returns the text to
/// show verbatim (e.g. "set tool-path in the configuration file"). System
/// failures such as IO errors or crashing helper processes return `false`
/// and `None`; they are reported with the operation context instead.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error at the right level of detail
///
/// User-actionable errors print their own message, everything else prints
/// `operation_context`. The full error is always available at debug level.
///
/// ```rust,no_run
/// # use arcai_scan::core::error_handling::log_error_with_context;
/// # use arcai_scan::scanner::api::ScanError;
/// let error = ScanError::Busy;
/// log_error_with_context(&error, "Scanning");
/// // Logs: "FATAL: A scan is already in progress"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    let headline = fatal_headline(error, operation_context);
    log::error!("FATAL: {}", headline);
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Text of the primary fatal line
pub fn fatal_headline<'a, E: ContextualError>(error: &'a E, operation_context: &'a str) -> &'a str {
    if error.is_user_actionable() {
        error.user_message().unwrap_or(operation_context)
    } else {
        operation_context
    }
}
