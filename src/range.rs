#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Narrowing a batch to an alphabetic slice of the class.

use crate::{error::NoMatchError, join::Keyed};

/// Appended to the upper bound so names that extend it still sort below.
const UPPER_BOUND_SUFFIX: &str = "zzz";

/// Keeps rows whose uppercased key lies in `from ..= to`.
///
/// The upper bound is compared as `TO + "zzz"`, so `to = "Sm"` keeps
/// `"Smith, Jo"`. Row order is preserved. Fails if `from` sorts after `to`.
pub fn select<R: Keyed>(rows: Vec<R>, from: &str, to: &str) -> Result<Vec<R>, NoMatchError> {
    let lower = from.to_uppercase();
    let upper = to.to_uppercase();
    if lower > upper {
        return Err(NoMatchError::InvertedRange {
            from: from.to_string(),
            to:   to.to_string(),
        });
    }
    let upper = format!("{upper}{UPPER_BOUND_SUFFIX}");

    Ok(rows
        .into_iter()
        .filter(|row| {
            let key = row.key().to_uppercase();
            lower <= key && key <= upper
        })
        .collect())
}
