//! Storage and wrap-around arithmetic shared by every ring buffer operation.
//!
//! Nothing in this module is synchronized; callers serialize access to [`Cursors`] and only
//! touch [`UnsafeStorage`] ranges that the cursors grant them.

mod cursors;
mod storage;

pub(crate) use cursors::{spans, Cursors, Reservation};
pub(crate) use storage::UnsafeStorage;
