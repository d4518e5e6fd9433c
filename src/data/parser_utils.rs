//! Shared winnow-based parsing utilities.

use std::ops::Range;

use winnow::error::ContextError;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// `start..start + len`, or `None` if the end overflows.
pub fn region(start: usize, len: usize) -> Option<Range<usize>> {
    Some(start..start.checked_add(len)?)
}
