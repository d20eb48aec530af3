//! Internal emission macros.

/// Emit a predefined diagnostic by code.
macro_rules! mo_emit {
    ($code:ident) => {
        $crate::diagnostics::emit::emit(&$crate::diagnostics::kind::$code)
    };
}

/// Trace an internal event through `log::debug!` when the `log` feature is
/// enabled. Arguments are still type-checked without it.
macro_rules! mo_debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        {
            log::debug!(target: "gpumem", $($arg)+);
        }
        #[cfg(not(feature = "log"))]
        {
            let _ = format_args!($($arg)+);
        }
    }};
}
