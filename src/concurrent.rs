//! A circular byte buffer supporting one concurrent writer and one concurrent reader.
//!
//! Multi-byte operations never hold the metadata lock while copying.  Each one reserves the
//! region it will touch, computing the state the buffer will have once it completes, then
//! copies with the lock released, then publishes the result.  Because only one reservation per
//! direction can exist, the reserved region cannot be claimed by any other operation until it
//! is published.

use crate::{
    buffer::{Cursors, UnsafeStorage},
    error::{Error, Result},
    reservation::{PutReservation, TakeReservation},
};

/// A fixed-capacity circular byte buffer shared by one writer and one reader.
///
/// All operations take `&self`.  Any number of threads may hold a reference, but at most one
/// put and one take can be in progress at any time; a second operation in the same direction
/// fails with [`Error::OperationInProgress`] rather than waiting.
pub struct ConcurrentRingBuffer {
    pub(crate) storage: UnsafeStorage,
    state: spin::Mutex<Cursors>,
}

impl core::fmt::Debug for ConcurrentRingBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConcurrentRingBuffer")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

/// Configures and creates a [`ConcurrentRingBuffer`].
///
/// Created by [`ConcurrentRingBuffer::builder`].
#[derive(Clone, Debug)]
pub struct Builder<'a> {
    capacity: usize,
    allow_overwrite: bool,
    contents: Option<&'a [u8]>,
}

impl<'a> Builder<'a> {
    /// Permit puts to discard the oldest unread bytes when the buffer is full.
    ///
    /// Defaults to `false`.
    pub fn allow_overwrite(mut self, allow_overwrite: bool) -> Self {
        self.allow_overwrite = allow_overwrite;
        self
    }

    /// Preload the buffer with `contents`.
    pub fn contents(mut self, contents: &'a [u8]) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Create the buffer.
    ///
    /// Fails with [`Error::InvalidArgument`] if the capacity is zero, or with
    /// [`Error::CapacityExceeded`] if the initial contents do not fit and overwriting is not
    /// allowed.  With overwriting, only the trailing `capacity` bytes of the contents are kept.
    pub fn build(self) -> Result<ConcurrentRingBuffer> {
        if self.capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be greater than 0"));
        }
        let ring = ConcurrentRingBuffer {
            storage: UnsafeStorage::new(self.capacity),
            state: spin::Mutex::new(Cursors::new(self.capacity, self.allow_overwrite)),
        };
        if let Some(contents) = self.contents {
            ring.put(contents)?;
        }
        tracing::debug!(
            capacity = self.capacity,
            allow_overwrite = self.allow_overwrite,
            preloaded = ring.current_length(),
            "created ring buffer"
        );
        Ok(ring)
    }
}

impl ConcurrentRingBuffer {
    /// Creates a buffer holding up to `capacity` bytes, optionally preloaded.
    ///
    /// See [`Builder::build`] for the failure conditions.
    pub fn new(
        capacity: usize,
        initial_contents: Option<&[u8]>,
        allow_overwrite: bool,
    ) -> Result<Self> {
        let builder = Self::builder(capacity).allow_overwrite(allow_overwrite);
        match initial_contents {
            Some(contents) => builder.contents(contents).build(),
            None => builder.build(),
        }
    }

    /// Returns a [`Builder`] for a buffer holding up to `capacity` bytes.
    pub fn builder<'a>(capacity: usize) -> Builder<'a> {
        Builder {
            capacity,
            allow_overwrite: false,
            contents: None,
        }
    }

    pub(crate) fn lock(&self) -> spin::MutexGuard<'_, Cursors> {
        self.state.lock()
    }

    /// Total number of bytes the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if puts may discard the oldest unread bytes.
    pub fn allows_overwrite(&self) -> bool {
        self.lock().allow_overwrite()
    }

    /// Number of published, unread bytes.
    pub fn current_length(&self) -> usize {
        self.lock().len()
    }

    /// Number of bytes that can be put without discarding content.
    pub fn spare_length(&self) -> usize {
        self.lock().spare()
    }

    /// Returns `true` if no published bytes are available.
    pub fn is_empty(&self) -> bool {
        self.current_length() == 0
    }

    /// Returns `true` if there is no spare capacity.
    pub fn is_full(&self) -> bool {
        self.spare_length() == 0
    }

    /// Appends a single byte.
    ///
    /// A full buffer fails with [`Error::CapacityExceeded`], unless overwriting is allowed, in
    /// which case the oldest byte is discarded.
    pub fn put_byte(&self, byte: u8) -> Result<()> {
        // Safety: the storage belongs to these cursors
        unsafe { self.lock().raw_put(&self.storage, byte) }
    }

    /// Removes and returns the oldest byte.
    pub fn take_byte(&self) -> Result<u8> {
        // Safety: the storage belongs to these cursors
        unsafe { self.lock().raw_take(&self.storage) }
    }

    /// Appends all of `data`.
    ///
    /// If overwriting is allowed and `data` is longer than the capacity, only its trailing
    /// `capacity` bytes are stored, as if each byte had been put in turn.
    pub fn put(&self, data: &[u8]) -> Result<()> {
        let data = if data.len() > self.capacity() && self.allows_overwrite() {
            &data[data.len() - self.capacity()..]
        } else {
            data
        };

        let mut reservation = PutReservation::allocate(self, data.len())?;
        let mut data = data;
        while reservation.remaining() > 0 {
            let chunk = reservation.chunk_mut();
            let len = chunk.len();
            chunk.copy_from_slice(&data[..len]);
            data = &data[len..];
            reservation.advance(len);
        }
        reservation.publish();
        Ok(())
    }

    /// Removes the oldest `count` bytes into the start of `destination`.
    pub fn take(&self, destination: &mut [u8], count: usize) -> Result<()> {
        if destination.len() < count {
            return Err(Error::InvalidArgument(
                "destination too small for requested output",
            ));
        }

        let mut reservation = TakeReservation::allocate(self, count)?;
        let mut destination = &mut destination[..count];
        while reservation.remaining() > 0 {
            let chunk = reservation.chunk();
            let len = chunk.len();
            let (head, rest) = core::mem::take(&mut destination).split_at_mut(len);
            head.copy_from_slice(chunk);
            destination = rest;
            reservation.advance(len);
        }
        reservation.publish();
        Ok(())
    }

    /// Removes the oldest `count` bytes into a new vector.
    pub fn take_vec(&self, count: usize) -> Result<Vec<u8>> {
        let mut output = vec![0; count];
        self.take(&mut output, count)?;
        Ok(output)
    }

    /// Discards the oldest `count` bytes.
    ///
    /// Fails with [`Error::OperationInProgress`] if a take is in progress.
    pub fn skip(&self, count: usize) -> Result<()> {
        self.lock().skip(count)
    }

    /// Discards all content and zeroes the storage.
    ///
    /// Fails with [`Error::OperationInProgress`] if any transfer is in progress.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        state.reset()?;
        // Safety: no reservations exist and the lock is held
        unsafe { self.storage.clear() };
        tracing::debug!("reset ring buffer");
        Ok(())
    }

    /// Removes all content into a new vector and resets the buffer.
    ///
    /// Unlike other multi-byte operations, this holds the lock for the whole copy.
    pub fn to_array(&self) -> Result<Vec<u8>> {
        let mut state = self.lock();
        let len = state.len();
        let head = state.head();
        state.reset()?;

        let mut output = Vec::with_capacity(len);
        for span in crate::buffer::spans(head, len, self.capacity()) {
            // Safety: no reservations exist and the lock is held
            output.extend_from_slice(unsafe { self.storage.range(span.offset, span.len) });
        }
        // Safety: no reservations exist and the lock is held
        unsafe { self.storage.clear() };
        tracing::debug!(len, "drained ring buffer");
        Ok(output)
    }
}
