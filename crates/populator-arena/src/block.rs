//! Owned memory blocks handed out by the arena.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::arena::ArenaShared;

/// An owned, fixed-capacity byte region obtained from an [`Arena`](crate::Arena).
///
/// A block has a capacity (the size of the region the backend handed
/// out) and a logical length (the bytes that are meaningful). Blocks
/// from [`allocate`](crate::Arena::allocate) start with
/// `len == capacity`; blocks from [`duplicate`](crate::Arena::duplicate)
/// carry the copied bytes plus one spare terminator byte of capacity.
///
/// Dropping a block returns its region to the owning arena.
pub struct Block {
    data: Box<[u8]>,
    len: usize,
    owner: Arc<ArenaShared>,
}

impl Block {
    pub(crate) fn new(data: Box<[u8]>, len: usize, owner: Arc<ArenaShared>) -> Self {
        debug_assert!(len <= data.len());
        Self { data, len, owner }
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the logical length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the underlying region in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The meaningful bytes of this block.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Mutable view of the meaningful bytes of this block.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Change the logical length.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`capacity`](Self::capacity).
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.data.len(),
            "block length {len} exceeds capacity {}",
            self.data.len()
        );
        self.len = len;
    }

    /// Lossy UTF-8 rendering of the meaningful bytes.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl Deref for Block {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Block {}

impl PartialEq<[u8]> for Block {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .field("bytes", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.owner.release(self.data.len());
    }
}
