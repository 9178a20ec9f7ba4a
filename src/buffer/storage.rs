use core::cell::UnsafeCell;

/// Fixed-length byte storage that permits disjoint ranges to be borrowed through a shared
/// reference.
///
/// Which ranges are disjoint is decided by the cursors, never by the storage itself.
pub(crate) struct UnsafeStorage {
    cells: Box<[UnsafeCell<u8>]>,
}

// Access is coordinated by the reservation protocol: every range handed out is either
// exclusively reserved or touched only while the metadata lock is held.
unsafe impl Send for UnsafeStorage {}
unsafe impl Sync for UnsafeStorage {}

impl UnsafeStorage {
    pub fn new(size: usize) -> Self {
        Self {
            cells: (0..size).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    fn ptr(&self) -> *mut u8 {
        // `UnsafeCell<u8>` has the same layout as `u8`
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    // Only safe if you can guarantee no mutable references to this range
    pub unsafe fn range(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.len());
        std::slice::from_raw_parts(self.ptr().add(offset), len)
    }

    // Only safe if you can guarantee no other references to the same range
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn range_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.len());
        std::slice::from_raw_parts_mut(self.ptr().add(offset), len)
    }

    // Only safe if you can guarantee no other references to any range
    pub unsafe fn clear(&self) {
        self.range_mut(0, self.len()).fill(0);
    }
}
