//! Shared error classification.
//!
//! Every module-level error enum implements [`ErrorCode`] so callers can log
//! a stable machine-readable code next to the human-readable message.

pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
