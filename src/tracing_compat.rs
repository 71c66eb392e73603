//! Tracing compatibility layer for structured logging.
//!
//! With the `tracing-integration` feature the logging macros are the
//! `tracing` crate's. Without it they are no-ops that still type-check
//! their field values, so bindings that only feed a log line stay used.
//!
//! ```rust,ignore
//! use trifuture::tracing_compat::{debug, trace};
//!
//! trace!(index, "Future.parallel starting child");
//! debug!(live = 2, "Future.both failing fast");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// Walks `tracing`-style fields and the message, referencing each value
    /// inside a branch that never runs.
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __trifuture_log_fields {
        () => {};
        ($message:literal $(, $arg:expr)*) => {
            if false {
                $(let _ = &$arg;)*
            }
        };
        ($name:ident = % $value:expr $(, $($rest:tt)*)?) => {
            if false {
                let _ = &$value;
            }
            $($crate::__trifuture_log_fields!($($rest)*);)?
        };
        ($name:ident = ? $value:expr $(, $($rest:tt)*)?) => {
            if false {
                let _ = &$value;
            }
            $($crate::__trifuture_log_fields!($($rest)*);)?
        };
        ($name:ident = $value:expr $(, $($rest:tt)*)?) => {
            if false {
                let _ = &$value;
            }
            $($crate::__trifuture_log_fields!($($rest)*);)?
        };
        ($name:ident $(, $($rest:tt)*)?) => {
            if false {
                let _ = &$name;
            }
            $($crate::__trifuture_log_fields!($($rest)*);)?
        };
    }

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {{
            $crate::__trifuture_log_fields!($($arg)*);
        }};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {{
            $crate::__trifuture_log_fields!($($arg)*);
        }};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {{
            $crate::__trifuture_log_fields!($($arg)*);
        }};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {{
            $crate::__trifuture_log_fields!($($arg)*);
        }};
    }

    pub use crate::{debug, error, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
