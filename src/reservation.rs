//! Scoped reservations implementing the allocate and publish phases.
//!
//! A reservation is made while the metadata lock is held, after which the reserved region of
//! storage is accessed without the lock.  Dropping a reservation publishes the bytes that were
//! actually transferred and frees the direction, on every exit path.

use crate::{
    buffer::{spans, Reservation},
    error::Result,
    ConcurrentRingBuffer,
};

/// An exclusive claim on the free region at the tail of the buffer.
pub(crate) struct PutReservation<'a> {
    ring: &'a ConcurrentRingBuffer,
    reservation: Reservation,
    transferred: usize,
}

impl<'a> PutReservation<'a> {
    pub fn allocate(ring: &'a ConcurrentRingBuffer, count: usize) -> Result<Self> {
        let reservation = ring.lock().allocate_put(count)?;
        tracing::trace!(
            offset = reservation.offset,
            count,
            "allocated put reservation"
        );
        Ok(Self {
            ring,
            reservation,
            transferred: 0,
        })
    }

    /// Number of reserved bytes not yet written.
    pub fn remaining(&self) -> usize {
        self.reservation.count - self.transferred
    }

    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// The unwritten part of the reservation, up to the physical end of storage.
    pub fn chunk_mut(&mut self) -> &mut [u8] {
        let capacity = self.ring.storage.len();
        let offset = (self.reservation.offset + self.transferred) % capacity;
        let [span, _] = spans(offset, self.remaining(), capacity);
        // Safety: the reservation grants exclusive access to this region until published
        unsafe { self.ring.storage.range_mut(span.offset, span.len) }
    }

    /// Marks `count` bytes at the start of [`chunk_mut`](Self::chunk_mut) as written.
    pub fn advance(&mut self, count: usize) {
        assert!(
            count <= self.remaining(),
            "attempted to advance past end of reservation"
        );
        self.transferred += count;
    }

    /// Publishes the written bytes, returning how many there were.
    pub fn publish(self) -> usize {
        self.transferred
    }
}

impl Drop for PutReservation<'_> {
    fn drop(&mut self) {
        self.ring.lock().publish_put(self.transferred);
        tracing::trace!(
            reserved = self.reservation.count,
            transferred = self.transferred,
            "published put reservation"
        );
    }
}

/// An exclusive claim on the oldest readable bytes of the buffer.
pub(crate) struct TakeReservation<'a> {
    ring: &'a ConcurrentRingBuffer,
    reservation: Reservation,
    transferred: usize,
}

impl<'a> TakeReservation<'a> {
    pub fn allocate(ring: &'a ConcurrentRingBuffer, count: usize) -> Result<Self> {
        let reservation = ring.lock().allocate_take(count)?;
        tracing::trace!(
            offset = reservation.offset,
            count,
            "allocated take reservation"
        );
        Ok(Self {
            ring,
            reservation,
            transferred: 0,
        })
    }

    /// Number of reserved bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.reservation.count - self.transferred
    }

    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// The unread part of the reservation, up to the physical end of storage.
    pub fn chunk(&self) -> &[u8] {
        let capacity = self.ring.storage.len();
        let offset = (self.reservation.offset + self.transferred) % capacity;
        let [span, _] = spans(offset, self.remaining(), capacity);
        // Safety: the reservation grants exclusive access to this region until published
        unsafe { self.ring.storage.range(span.offset, span.len) }
    }

    /// Marks `count` bytes at the start of [`chunk`](Self::chunk) as read.
    pub fn advance(&mut self, count: usize) {
        assert!(
            count <= self.remaining(),
            "attempted to advance past end of reservation"
        );
        self.transferred += count;
    }

    /// Publishes the read bytes, returning how many there were.
    pub fn publish(self) -> usize {
        self.transferred
    }
}

impl Drop for TakeReservation<'_> {
    fn drop(&mut self) {
        self.ring.lock().publish_take(self.transferred);
        tracing::trace!(
            reserved = self.reservation.count,
            transferred = self.transferred,
            "published take reservation"
        );
    }
}
