//! Utility macros used inside the crate.

/// Returns early with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
///
/// # Example
///
/// ```ignore
/// ensure!(version == "HTTP/1.1", HttpError::VersionNotSupported);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
