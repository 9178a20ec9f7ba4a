//! Transfers between a ring buffer and [`std::io`] streams.
//!
//! The stream is read or written with the metadata lock released, in chunks that never cross
//! the physical end of the buffer.

use crate::{
    error::{Error, Result},
    reservation::{PutReservation, TakeReservation},
    ConcurrentRingBuffer,
};
use std::io::{ErrorKind, Read, Write};

impl ConcurrentRingBuffer {
    /// Reads up to `count` bytes from `source` into the buffer.
    ///
    /// Stops early if `source` reports the end of input, and returns the number of bytes
    /// stored.  If `source` fails, the bytes read so far remain in the buffer.
    pub fn put_from<R>(&self, source: &mut R, count: usize) -> Result<usize>
    where
        R: Read + ?Sized,
    {
        let mut reservation = PutReservation::allocate(self, count)?;
        while reservation.remaining() > 0 {
            match source.read(reservation.chunk_mut()) {
                Ok(0) => break,
                Ok(read) => reservation.advance(read),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(
                        transferred = reservation.transferred(),
                        error = %e,
                        "put interrupted by source error"
                    );
                    return Err(e.into());
                }
            }
        }
        Ok(reservation.publish())
    }

    /// Reads exactly `count` bytes from `source` into the buffer.
    ///
    /// Fails with [`Error::UnexpectedEndOfInput`] if `source` ends first; the bytes that were
    /// read are kept.
    pub fn put_exactly_from<R>(&self, source: &mut R, count: usize) -> Result<()>
    where
        R: Read + ?Sized,
    {
        let transferred = self.put_from(source, count)?;
        if transferred < count {
            tracing::warn!(
                expected = count,
                transferred,
                "source ended before exact put completed"
            );
            return Err(Error::UnexpectedEndOfInput {
                expected: count,
                transferred,
            });
        }
        Ok(())
    }

    /// Removes the oldest `count` bytes and writes them to `destination`.
    ///
    /// If `destination` fails, the bytes it accepted are still removed.
    pub fn take_to<W>(&self, destination: &mut W, count: usize) -> Result<()>
    where
        W: Write + ?Sized,
    {
        let mut reservation = TakeReservation::allocate(self, count)?;
        while reservation.remaining() > 0 {
            match destination.write(reservation.chunk()) {
                Ok(0) => {
                    tracing::warn!(
                        transferred = reservation.transferred(),
                        "destination stopped accepting data"
                    );
                    return Err(std::io::Error::from(ErrorKind::WriteZero).into());
                }
                Ok(written) => reservation.advance(written),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(
                        transferred = reservation.transferred(),
                        error = %e,
                        "take interrupted by destination error"
                    );
                    return Err(e.into());
                }
            }
        }
        reservation.publish();
        Ok(())
    }
}
