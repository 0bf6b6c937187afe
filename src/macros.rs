/// Emits an internal diagnostic through the `log` facade.
///
/// All messages share the `sentry_hub` target so they can be filtered
/// independently from application logs.
#[macro_export]
#[doc(hidden)]
macro_rules! sentry_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "sentry_hub", $($arg)*)
    };
}
