#![cfg_attr(docsrs, feature(doc_cfg))]
//! Ringbyte provides a fixed-capacity circular byte buffer that one writer and one reader can
//! use concurrently.
//!
//! Every multi-byte transfer runs in three phases: the region it will touch is reserved under a
//! short lock, the bytes are copied with the lock released, and the result is published under
//! the lock again.  The copy never contends with the opposite direction.
//!
//! ```
//! use ringbyte::{ConcurrentRingBuffer, Error};
//!
//! let ring = ConcurrentRingBuffer::new(8, None, false)?;
//! ring.put(&[1, 2, 3, 4, 5])?;
//! assert_eq!(ring.take_vec(2)?, [1, 2]);
//! assert!(matches!(
//!     ring.put(&[0; 6]),
//!     Err(Error::InsufficientCapacity { .. })
//! ));
//! # Ok::<(), Error>(())
//! ```

mod buffer;
mod concurrent;
mod reservation;

pub mod async_io;
pub mod error;
pub mod io;

pub use concurrent::{Builder, ConcurrentRingBuffer};
pub use error::{Direction, Error, Result};
pub use tokio_util::sync::CancellationToken;
