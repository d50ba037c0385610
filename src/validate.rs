//! Shared argument validators
//!
//! Small checks used by the hook constructors and the config layer.

use std::env;
use std::path::PathBuf;

use crate::error::{HookError, Result};

/// Validate a count-like value that may arrive as a float (e.g. from a
/// deserialized config). Rejects NaN/infinite, negative, and fractional
/// values; otherwise returns the value as a `usize`.
pub fn whole_non_negative(name: &str, value: f64) -> Result<usize> {
    if !value.is_finite() {
        return Err(HookError::NonFinite { name: name.to_string(), value });
    }
    if value < 0.0 {
        return Err(HookError::Negative { name: name.to_string(), value });
    }
    if value.fract() != 0.0 {
        return Err(HookError::NotWhole { name: name.to_string(), value });
    }
    // any f64 >= 2^52 has a zero fract(); without this bound the cast
    // below would silently saturate
    if value >= usize::MAX as f64 {
        return Err(HookError::OutOfRange { name: name.to_string(), value });
    }
    Ok(value as usize)
}

/// Resolve an optional output directory.
///
/// An explicitly given path must already exist as a directory; `None`
/// falls back to the process working directory.
pub fn existing_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => {
            if p.is_dir() {
                Ok(p)
            } else {
                Err(HookError::MissingDirectory(p))
            }
        }
        None => Ok(env::current_dir()?),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whole non-negative floats round-trip to their integer value
        #[test]
        fn whole_values_round_trip(n in 0usize..1_000_000) {
            prop_assert_eq!(whole_non_negative("n", n as f64).unwrap(), n);
        }

        /// Values with a fractional part are always rejected
        #[test]
        fn fractional_values_rejected(
            n in 0u32..1000,
            frac in 0.001f64..0.999,
        ) {
            let value = f64::from(n) + frac;
            prop_assert!(whole_non_negative("n", value).is_err());
        }
    }
}
