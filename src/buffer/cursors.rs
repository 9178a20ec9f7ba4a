use super::storage::UnsafeStorage;
use crate::error::{Direction, Error, Result};

fn circular_add(a: usize, b: usize, len: usize) -> usize {
    (a + b) % len
}

/// A physical run of storage, `offset..offset + len`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Span {
    pub offset: usize,
    pub len: usize,
}

/// Splits the logical range starting at `offset` into at most two physical spans.
///
/// The second span is empty unless the range wraps past the end of storage.
pub(crate) fn spans(offset: usize, len: usize, capacity: usize) -> [Span; 2] {
    debug_assert!(offset < capacity);
    debug_assert!(len <= capacity);
    let first = len.min(capacity - offset);
    [
        Span { offset, len: first },
        Span {
            offset: 0,
            len: len - first,
        },
    ]
}

/// The region handed to a single in-flight transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Reservation {
    pub offset: usize,
    pub count: usize,
}

/// Reservation state of one direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Idle,
    Reserved(Reservation),
}

impl Slot {
    fn is_idle(&self) -> bool {
        matches!(self, Slot::Idle)
    }
}

/// Shared ring buffer metadata.
///
/// The cursors describe the published state: `len` bytes of readable data start at `head`, and
/// `tail` is just past the newest byte.  A reserved put owns `count` bytes starting at `tail`,
/// and a reserved take owns `count` bytes starting at `head`.  Neither cursor moves while its
/// direction is reserved, so the reserved regions stay valid until they are published.
#[derive(Debug)]
pub(crate) struct Cursors {
    capacity: usize,
    head: usize,
    tail: usize,
    len: usize,
    allow_overwrite: bool,
    put: Slot,
    take: Slot,
}

impl Cursors {
    pub fn new(capacity: usize, allow_overwrite: bool) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            head: 0,
            tail: 0,
            len: 0,
            allow_overwrite,
            put: Slot::Idle,
            take: Slot::Idle,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn spare(&self) -> usize {
        self.capacity - self.len
    }

    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }

    pub fn head(&self) -> usize {
        self.head
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.put.is_idle() && self.take.is_idle()
    }

    /// Discards the oldest `count` bytes.
    fn discard(&mut self, count: usize) {
        debug_assert!(count <= self.len);
        self.head = circular_add(self.head, count, self.capacity);
        self.len -= count;
    }

    /// Reserves room for `count` bytes at the tail.
    ///
    /// If the buffer permits overwriting and no take is reserved, the oldest bytes are discarded
    /// immediately to make room, so a take reserved later cannot observe the region being
    /// written.
    pub fn allocate_put(&mut self, count: usize) -> Result<Reservation> {
        if !self.put.is_idle() {
            return Err(Error::OperationInProgress(Direction::Put));
        }
        if count > self.capacity {
            return Err(Error::CapacityExceeded {
                requested: count,
                capacity: self.capacity,
            });
        }
        if self.len + count > self.capacity {
            if self.allow_overwrite && self.take.is_idle() {
                let deficit = self.len + count - self.capacity;
                tracing::debug!(deficit, "discarding oldest bytes to make room");
                self.discard(deficit);
            } else {
                return Err(Error::InsufficientCapacity {
                    requested: count,
                    spare: self.spare(),
                });
            }
        }
        let reservation = Reservation {
            offset: self.tail,
            count,
        };
        self.put = Slot::Reserved(reservation);
        Ok(reservation)
    }

    /// Makes `transferred` bytes of the current put reservation readable and releases it.
    pub fn publish_put(&mut self, transferred: usize) {
        let Slot::Reserved(reservation) = self.put else {
            unreachable!("published a put that was never reserved");
        };
        debug_assert!(transferred <= reservation.count);
        self.tail = circular_add(reservation.offset, transferred, self.capacity);
        self.len += transferred;
        self.put = Slot::Idle;
    }

    /// Reserves the oldest `count` bytes.
    pub fn allocate_take(&mut self, count: usize) -> Result<Reservation> {
        if !self.take.is_idle() {
            return Err(Error::OperationInProgress(Direction::Take));
        }
        if count > self.len {
            return Err(Error::InsufficientContent {
                requested: count,
                available: self.len,
            });
        }
        let reservation = Reservation {
            offset: self.head,
            count,
        };
        self.take = Slot::Reserved(reservation);
        Ok(reservation)
    }

    /// Frees `transferred` bytes of the current take reservation and releases it.
    pub fn publish_take(&mut self, transferred: usize) {
        let Slot::Reserved(reservation) = self.take else {
            unreachable!("published a take that was never reserved");
        };
        debug_assert!(transferred <= reservation.count);
        debug_assert_eq!(reservation.offset, self.head);
        self.head = circular_add(reservation.offset, transferred, self.capacity);
        self.len -= transferred;
        self.take = Slot::Idle;
    }

    /// Discards the oldest `count` bytes without reading them.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        if !self.take.is_idle() {
            return Err(Error::OperationInProgress(Direction::Take));
        }
        if count > self.len {
            return Err(Error::InsufficientContent {
                requested: count,
                available: self.len,
            });
        }
        self.discard(count);
        Ok(())
    }

    /// Zeroes all cursors.
    pub fn reset(&mut self) -> Result<()> {
        if !self.put.is_idle() {
            return Err(Error::OperationInProgress(Direction::Put));
        }
        if !self.take.is_idle() {
            return Err(Error::OperationInProgress(Direction::Take));
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
        Ok(())
    }

    /// Appends a single byte.
    ///
    /// # Safety
    /// `storage` must be the storage these cursors describe.
    pub unsafe fn raw_put(&mut self, storage: &UnsafeStorage, byte: u8) -> Result<()> {
        if !self.put.is_idle() {
            return Err(Error::OperationInProgress(Direction::Put));
        }
        if self.len == self.capacity {
            if !self.allow_overwrite {
                return Err(Error::CapacityExceeded {
                    requested: 1,
                    capacity: self.capacity,
                });
            }
            if !self.take.is_idle() {
                return Err(Error::InsufficientCapacity {
                    requested: 1,
                    spare: 0,
                });
            }
            self.discard(1);
        }
        storage.range_mut(self.tail, 1)[0] = byte;
        self.tail = circular_add(self.tail, 1, self.capacity);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the oldest byte.
    ///
    /// # Safety
    /// `storage` must be the storage these cursors describe.
    pub unsafe fn raw_take(&mut self, storage: &UnsafeStorage) -> Result<u8> {
        if !self.take.is_idle() {
            return Err(Error::OperationInProgress(Direction::Take));
        }
        if self.len == 0 {
            return Err(Error::InsufficientContent {
                requested: 1,
                available: 0,
            });
        }
        let byte = storage.range(self.head, 1)[0];
        self.discard(1);
        Ok(byte)
    }
}
