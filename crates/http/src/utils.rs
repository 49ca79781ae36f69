//! Helper macros used across the crate.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but returns the error instead of panicking:
///
/// ```ignore
/// ensure!(bytes.is_ascii(), ParseError::InvalidEncoding { encoding: "ascii" });
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
