//! Unified logging macros.
//!
//! This module provides a unified logging interface that automatically
//! selects between `defmt::` and `log::` based on the active feature
//! flags, and compiles to nothing when neither backend is enabled.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::tag_log;
//!
//! tag_log!(info, "Session established");
//! tag_log!(debug, "Received {} bytes", n);
//! tag_log!(warn, "Timeout occurred");
//! tag_log!(error, "Failed to connect");
//! tag_log!(trace, "Entering retry loop");
//! ```
//!
//! # Feature Flags
//!
//! - `defmt` - Uses `defmt::` (efficient binary logging for embedded targets)
//! - `log` - Uses the `log::` crate (host-side debugging)
//! - Neither - All log statements compile away

/// Unified logging macro - selects defmt:: or log:: based on features.
///
/// This macro provides a consistent logging API across the entire crate,
/// regardless of which logging backend is configured at compile time.
///
/// # Examples
///
/// ```rust,ignore
/// use crate::tag_log;
///
/// // Simple message
/// tag_log!(info, "Transport ready");
///
/// // With formatting
/// tag_log!(debug, "Value: {}", 42);
/// tag_log!(warn, "Retry attempt {}/{}", current, max);
/// ```
#[macro_export]
#[cfg(feature = "defmt")]
macro_rules! tag_log {
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}

#[macro_export]
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! tag_log {
    (info, $($arg:tt)*) => { log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { log::trace!($($arg)*) };
}

// No backend: discard the arguments but keep them type-checked so that
// variables used only in log statements stay warning-free.
#[macro_export]
#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! tag_log {
    ($level:ident, $($arg:expr),+ $(,)?) => {{
        $(let _ = &$arg;)+
    }};
}
