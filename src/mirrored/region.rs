//! Owning handle over a mirrored virtual-memory region.
//!
//! A `MirroredRegion` of `size` bytes reserves `2 * size` bytes of address space and maps one shared
//! object of `size` bytes into both halves. Byte `k` and byte `k + size` are the same physical byte,
//! so any run of up to `size` bytes starting in the first half can be read or written as one linear
//! copy, even when it logically wraps around.
//!
//! Only the byte layout is managed here. Element types, indices and wrap-around policy belong to the
//! ring buffer built on top.

use super::{Mapping, MAX_REGION_SIZE, page_size, utils::check_region_size};
use crate::error::Result;
use anyhow::Context;
use core::{fmt, ptr::NonNull, slice};
use tracing::debug;

/// A region of `size` bytes whose bytes repeat once, back to back, in the address space.
///
/// # Invariants
///
/// - `mapping` is `Some` iff the region is allocated; then `ptr` is its base and `size` is non-zero.
/// - When unallocated, `ptr` is dangling and `size` is zero, so every accessor yields an empty slice.
/// - Bytes `[ptr, ptr + size)` are mirrored at `[ptr + size, ptr + 2 * size)`.
pub struct MirroredRegion {
    ptr: NonNull<u8>,
    size: usize,
    mapping: Option<Mapping>,
}

impl MirroredRegion {
    /// Creates an unallocated region.
    #[must_use]
    pub const fn new() -> Self { Self { ptr: NonNull::dangling(), size: 0, mapping: None } }

    /// Creates a region of `size` bytes per half.
    ///
    /// # Errors
    ///
    /// [`Error::Unaligned`](crate::Error::Unaligned) if `size` is zero or not a multiple of [`page_size`],
    /// [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if it exceeds [`MAX_REGION_SIZE`], and
    /// [`Error::Allocation`](crate::Error::Allocation) if the OS refuses any mapping step.
    pub fn with_size(size: usize) -> Result<Self> {
        let mut region = Self::new();
        region.allocate(size)?;
        Ok(region)
    }

    /// Maps a fresh region of `size` bytes per half, freeing the current one first.
    ///
    /// A size that fails validation leaves the current allocation untouched. An OS failure leaves the
    /// region unallocated with nothing leaked.
    pub fn allocate(&mut self, size: usize) -> Result<()> {
        check_region_size(size)?;
        debug_assert!(size <= MAX_REGION_SIZE);
        self.free();
        let mapping = Mapping::map(size)?;
        self.ptr = mapping.base().context("mirrored mapping has no base address")?;
        self.size = size;
        self.mapping = Some(mapping);
        debug!(size, page_size = page_size(), base = ?self.ptr, "allocated mirrored region");
        Ok(())
    }

    /// Unmaps both views and releases the backing object and reservation.
    ///
    /// Does nothing on an unallocated region.
    pub fn free(&mut self) {
        if let Some(mut mapping) = self.mapping.take() {
            mapping.release();
            debug!(size = self.size, "freed mirrored region");
        }
        self.ptr = NonNull::dangling();
        self.size = 0;
    }

    /// Returns `true` while the region has a live mapping.
    #[inline]
    pub fn is_allocated(&self) -> bool { self.mapping.is_some() }

    /// Bytes per half; zero when unallocated.
    #[inline]
    pub fn size(&self) -> usize { self.size }

    /// Bytes of address space covered by both halves.
    #[inline]
    pub fn virtual_size(&self) -> usize { self.size * 2 }

    /// Base of the first half. Offsets `[0, 2 * size)` are valid; offset `k >= size` aliases `k - size`.
    #[inline(always)]
    pub fn as_ptr(&self) -> *const u8 { self.ptr.as_ptr() }

    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut u8 { self.ptr.as_ptr() }

    /// The `size` physical bytes, seen through the first half.
    #[inline]
    pub fn as_slice(&self) -> &[u8] { unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size) } }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] { unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) } }

    /// Returns `len` bytes starting at `start`, where both are relative to the whole doubled range.
    ///
    /// # Panics
    ///
    /// Panics if `[start, start + len)` is not within `[0, 2 * size)`.
    #[inline]
    pub fn virtual_slice_at(&self, start: usize, len: usize) -> &[u8] {
        assert!(start.checked_add(len) <= Some(self.virtual_size()), "slice bounds out of virtual capacity");
        unsafe { self.virtual_slice_at_unchecked(start, len) }
    }

    /// Mutable counterpart of [`virtual_slice_at`](Self::virtual_slice_at).
    ///
    /// # Panics
    ///
    /// Panics if `[start, start + len)` is not within `[0, 2 * size)`.
    #[inline]
    pub fn virtual_slice_mut_at(&mut self, start: usize, len: usize) -> &mut [u8] {
        assert!(start.checked_add(len) <= Some(self.virtual_size()), "slice bounds out of virtual capacity");
        unsafe { self.virtual_slice_mut_at_unchecked(start, len) }
    }

    /// # Safety
    ///
    /// `start + len` must not exceed [`virtual_size`](Self::virtual_size).
    #[inline(always)]
    pub unsafe fn virtual_slice_at_unchecked(&self, start: usize, len: usize) -> &[u8] {
        debug_assert!(start.checked_add(len) <= Some(self.virtual_size()), "slice bounds out of virtual capacity");
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(start), len) }
    }

    /// # Safety
    ///
    /// `start + len` must not exceed [`virtual_size`](Self::virtual_size).
    #[inline(always)]
    pub unsafe fn virtual_slice_mut_at_unchecked(&mut self, start: usize, len: usize) -> &mut [u8] {
        debug_assert!(start.checked_add(len) <= Some(self.virtual_size()), "slice bounds out of virtual capacity");
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().add(start), len) }
    }

    /// Maps a new region of the same size holding a copy of this one's bytes.
    ///
    /// Cloning an unallocated region yields another unallocated region.
    pub fn try_clone(&self) -> Result<Self> {
        if !self.is_allocated() {
            return Ok(Self::new());
        }
        let mut copy = Self::with_size(self.size)?;
        copy.as_mut_slice().copy_from_slice(self.as_slice());
        Ok(copy)
    }
}

impl Clone for MirroredRegion {
    /// # Panics
    ///
    /// Panics if the OS refuses to map the copy; use [`try_clone`](MirroredRegion::try_clone) to handle that.
    fn clone(&self) -> Self { self.try_clone().unwrap_or_else(|err| panic!("failed to clone mirrored region: {err}")) }
}

impl Default for MirroredRegion {
    fn default() -> Self { Self::new() }
}

impl Drop for MirroredRegion {
    fn drop(&mut self) { self.free(); }
}

impl fmt::Debug for MirroredRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirroredRegion")
            .field("allocated", &self.is_allocated())
            .field("size", &self.size)
            .field("ptr", &self.ptr)
            .finish()
    }
}

// The mapping is owned exclusively and only reached through `&self` / `&mut self`.
unsafe impl Send for MirroredRegion {}
unsafe impl Sync for MirroredRegion {}
