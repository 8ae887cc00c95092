//! Generic error handling utilities
//!
//! Errors that reach the process edge are logged through
//! [`log_error_with_context`], which prefers a short actionable message for
//! caller mistakes and falls back to the operation context for system
//! failures. Full details always go to the debug level.

/// Errors that can tell user-actionable failures apart from system failures
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// True if the error carries a specific message the operator can act on
    /// (bad configuration, unknown topic, duplicate consumer)
    fn is_user_actionable(&self) -> bool;

    /// The actionable message, when there is one
    fn user_message(&self) -> Option<&str>;
}

/// Log an error with the detail level its kind deserves
///
/// # Examples
/// ```rust,no_run
/// use brokerlink::core::error_handling::log_error_with_context;
/// use brokerlink::queue::QueueError;
///
/// let err = QueueError::Config { message: "broker url must be set".to_string() };
/// log_error_with_context(&err, "Loading configuration");
/// // Logs: "FATAL: broker url must be set"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => {
            log::error!("FATAL: {}", user_msg);
        }
        _ => {
            log::error!("FATAL: {}: {}", operation_context, error);
        }
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
