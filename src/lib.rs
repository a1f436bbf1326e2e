//! A fixed-capacity ring buffer backed by a mirrored virtual-memory region.
//!
//! The backing pages are mapped twice, back to back, so the slots past the logical end alias the
//! start. Any run of live (or free) slots is therefore one contiguous slice and bulk transfers need no
//! wrap-around split.
//!
//! ```
//! use mirrored_ring::{RingBuffer, page_size};
//!
//! let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
//! ring.extend_from_slice(b"hello");
//! assert_eq!(ring.read_slice(), b"hello");
//! assert_eq!(ring.read(), b'h');
//! ```

mod error;
mod mirrored;

#[cfg(feature = "bytes")]
mod bytes;
#[cfg(feature = "io")]
mod io;
#[cfg(feature = "serde")]
mod serde;
#[cfg(feature = "tokio-io")]
mod tokio;

pub use bytemuck::Zeroable;
pub use error::{Error, Result};
pub use mirrored::{MAX_REGION_SIZE, MirroredRegion, page_size};

use core::{fmt, mem::size_of, slice};
use mirrored::{ring_capacity_for, ring_region_size};
use tracing::{debug, trace};

/// A circular buffer of `capacity` slots, of which at most `capacity - 1` are live at once.
///
/// One slot always stays free so that `read == write` means empty and `write + 1 == read` means full
/// without a separate length counter. Writing into a full ring evicts the oldest element; reading an
/// empty ring returns the zero value of `T`.
///
/// `T` is a flat value: it is moved by byte copy and lives directly in OS-mapped pages, which start
/// zero-filled.
///
/// The ring provides no synchronization of its own. Every mutation takes `&mut self`.
pub struct RingBuffer<T> {
    region: MirroredRegion,
    capacity: usize,
    read: usize,
    write: usize,
    _marker: core::marker::PhantomData<T>,
}

impl<T: Copy + Zeroable> RingBuffer<T> {
    /// Creates a ring of exactly `capacity` slots.
    ///
    /// # Errors
    ///
    /// Configuration errors when `capacity` is zero, when `capacity * size_of::<T>()` is not a positive
    /// multiple of [`page_size`] or overflows, or when `T` is aligned beyond a page. A resource error when
    /// the OS refuses the mapping.
    pub fn new(capacity: usize) -> Result<Self> {
        let size = ring_region_size::<T>(capacity)?;
        let region = MirroredRegion::with_size(size)?;
        debug!(capacity, elem_size = size_of::<T>(), "created ring buffer");
        Ok(Self { region, capacity, read: 0, write: 0, _marker: core::marker::PhantomData })
    }

    /// Creates the smallest ring that can hold at least `len` live elements.
    ///
    /// The capacity is rounded up so the backing region fills whole pages.
    pub fn with_usable_capacity(len: usize) -> Result<Self> { Self::new(ring_capacity_for::<T>(len)?) }

    /// Number of slots, including the one that always stays free.
    #[inline(always)]
    pub fn capacity(&self) -> usize { self.capacity }

    /// Most elements that can be live at once.
    #[inline(always)]
    pub fn usable_capacity(&self) -> usize { self.capacity - 1 }

    #[inline(always)]
    pub fn has_data(&self) -> bool { self.read != self.write }

    #[inline(always)]
    pub fn is_full(&self) -> bool { self.inc(self.write) == self.read }

    /// Number of live elements: the forward distance from the read head to the write head.
    #[inline(always)]
    pub fn available_for_read(&self) -> usize {
        if self.write >= self.read { self.write - self.read } else { self.capacity - self.read + self.write }
    }

    /// Number of elements that can be written before the oldest one is evicted.
    #[inline(always)]
    pub fn available_for_write(&self) -> usize { self.usable_capacity() - self.available_for_read() }

    /// Takes the oldest element.
    ///
    /// Returns the zero value of `T` without touching the ring when it is empty. Use
    /// [`try_read`](Self::try_read) or [`has_data`](Self::has_data) when a genuine zero must be told apart
    /// from "nothing to read".
    #[inline]
    pub fn read(&mut self) -> T { self.try_read().unwrap_or_else(T::zeroed) }

    /// Takes the oldest element, or `None` when the ring is empty.
    #[inline]
    pub fn try_read(&mut self) -> Option<T> {
        if !self.has_data() {
            return None;
        }
        let value = unsafe { self.slot_ptr(self.read).read() };
        self.read = self.inc(self.read);
        Some(value)
    }

    /// Appends `value`, evicting the oldest element if the ring is full.
    #[inline]
    pub fn write(&mut self, value: T) {
        unsafe { self.slot_ptr(self.write).write(value) };
        self.write = self.inc(self.write);
        if self.write == self.read {
            self.read = self.inc(self.read);
        }
    }

    /// Drops every element. The backing bytes are left as they are.
    #[inline]
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// The live elements in read order, as one slice even when they wrap around.
    #[inline]
    pub fn read_slice(&self) -> &[T] { unsafe { self.read_slice_unchecked(self.available_for_read()) } }

    /// The free slots in write order, as one slice even when they wrap around.
    ///
    /// Commit what was written with [`advance_write_head`](Self::advance_write_head).
    #[inline]
    pub fn write_slice(&mut self) -> &mut [T] {
        let len = self.available_for_write();
        unsafe { self.write_slice_unchecked(len) }
    }

    /// `len` slots starting at the read head, regardless of how many are live.
    ///
    /// # Safety
    ///
    /// `len` must not exceed [`capacity`](Self::capacity). Slots past the live ones hold stale or zeroed
    /// values.
    #[inline(always)]
    pub unsafe fn read_slice_unchecked(&self, len: usize) -> &[T] {
        debug_assert!(len <= self.capacity, "run of {} exceeds capacity {}", len, self.capacity);
        unsafe { slice::from_raw_parts(self.read_buffer(), len) }
    }

    /// `len` slots starting at the write head, regardless of how many are free.
    ///
    /// Writing more than [`available_for_write`](Self::available_for_write) slots overwrites the oldest
    /// live elements; [`advance_write_head`](Self::advance_write_head) then evicts them.
    ///
    /// # Safety
    ///
    /// `len` must not exceed [`capacity`](Self::capacity).
    #[inline(always)]
    pub unsafe fn write_slice_unchecked(&mut self, len: usize) -> &mut [T] {
        debug_assert!(len <= self.capacity, "run of {} exceeds capacity {}", len, self.capacity);
        unsafe { slice::from_raw_parts_mut(self.write_buffer(), len) }
    }

    /// Appends every element of `src`, with the same outcome as calling [`write`](Self::write) for each.
    ///
    /// Only the last [`usable_capacity`](Self::usable_capacity) elements can survive, so at most that many
    /// are copied, in a single linear copy.
    pub fn extend_from_slice(&mut self, src: &[T]) {
        let skip = src.len().saturating_sub(self.usable_capacity());
        if skip > 0 {
            self.advance_write_head(skip);
        }
        let tail = &src[skip..];
        unsafe { self.write_slice_unchecked(tail.len()) }.copy_from_slice(tail);
        self.advance_write_head(tail.len());
    }

    /// Moves up to `dst.len()` of the oldest elements into `dst` and returns how many were moved.
    pub fn read_into(&mut self, dst: &mut [T]) -> usize {
        let len = dst.len().min(self.available_for_read());
        dst[..len].copy_from_slice(&self.read_slice()[..len]);
        self.advance_read_head(len);
        len
    }

    /// Marks `offset` elements as consumed after reading them through [`read_buffer`](Self::read_buffer)
    /// or [`read_slice`](Self::read_slice).
    ///
    /// `offset` must not exceed [`available_for_read`](Self::available_for_read); the heads are left
    /// inconsistent otherwise.
    #[inline]
    pub fn advance_read_head(&mut self, offset: usize) {
        debug_assert!(
            offset <= self.available_for_read(),
            "advanced read head by {} with only {} live",
            offset,
            self.available_for_read()
        );
        self.read = (self.read + offset % self.capacity) % self.capacity;
    }

    /// Marks `offset` elements as written after filling them through [`write_buffer`](Self::write_buffer)
    /// or [`write_slice`](Self::write_slice).
    ///
    /// If `offset` exceeds [`available_for_write`](Self::available_for_write), the oldest elements are
    /// evicted so the ring ends up full, as if each element had been passed to [`write`](Self::write).
    #[inline]
    pub fn advance_write_head(&mut self, offset: usize) {
        let free = self.available_for_write();
        self.write = (self.write + offset % self.capacity) % self.capacity;
        if offset > free {
            trace!(evicted = offset - free, "batch write overran the read head");
            self.read = self.inc(self.write);
        }
    }

    /// Base of the slot array. Slots `[0, 2 * capacity)` may be addressed; slot `i + capacity` aliases `i`.
    #[inline(always)]
    pub fn raw_buffer(&mut self) -> *mut T { self.region.as_mut_ptr().cast() }

    /// Slot at the read head. Up to [`available_for_read`](Self::available_for_read) elements may be read
    /// from here contiguously.
    #[inline(always)]
    pub fn read_buffer(&self) -> *const T { unsafe { self.region.as_ptr().cast::<T>().add(self.read) } }

    /// Slot at the write head. Up to [`capacity`](Self::capacity) elements may be written from here
    /// contiguously.
    #[inline(always)]
    pub fn write_buffer(&mut self) -> *mut T { unsafe { self.raw_buffer().add(self.write) } }

    #[inline(always)]
    fn inc(&self, idx: usize) -> usize { (idx + 1) % self.capacity }

    #[inline(always)]
    fn slot_ptr(&self, idx: usize) -> *mut T {
        debug_assert!(idx < self.capacity);
        unsafe { self.region.as_ptr().cast::<T>().cast_mut().add(idx) }
    }

    /// Maps a new ring holding a copy of this one's slots and heads.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            region: self.region.try_clone()?,
            capacity: self.capacity,
            read: self.read,
            write: self.write,
            _marker: core::marker::PhantomData,
        })
    }
}

impl<T: Copy + Zeroable> Clone for RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if the OS refuses to map the copy; use [`try_clone`](RingBuffer::try_clone) to handle that.
    fn clone(&self) -> Self { self.try_clone().unwrap_or_else(|err| panic!("failed to clone ring buffer: {err}")) }
}

impl<T: Copy + Zeroable> TryFrom<&[T]> for RingBuffer<T> {
    type Error = crate::Error;

    fn try_from(slice: &[T]) -> Result<Self> {
        let mut ring = Self::with_usable_capacity(slice.len())?;
        ring.extend_from_slice(slice);
        Ok(ring)
    }
}

impl<T: Copy + Zeroable + fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("live", &self.read_slice())
            .finish()
    }
}

unsafe impl<T> Send for RingBuffer<T> where T: Send {}
unsafe impl<T> Sync for RingBuffer<T> where T: Sync {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// Runs a generic test on a four-slot ring whose elements are a quarter page wide.
    macro_rules! with_four_slots {
        ($test:ident) => {
            match page_size() / 4 {
                1024 => $test::<1024>(),
                4096 => $test::<4096>(),
                16384 => $test::<16384>(),
                other => panic!("no four-slot element type for a quarter page of {other} bytes"),
            }
        };
    }

    fn read_head<T: Copy + Zeroable>(ring: &mut RingBuffer<T>) -> usize {
        let base = ring.raw_buffer().cast_const();
        unsafe { ring.read_buffer().offset_from(base) as usize }
    }

    fn four_slots<const B: usize>() -> RingBuffer<[u8; B]> {
        let ring = RingBuffer::new(4).unwrap();
        assert_eq!(ring.capacity(), 4);
        ring
    }

    #[test]
    fn test_new() {
        let ring = RingBuffer::<u8>::new(page_size()).unwrap();
        assert_eq!(ring.capacity(), page_size());
        assert_eq!(ring.usable_capacity(), page_size() - 1);
        assert!(!ring.has_data());
        assert!(!ring.is_full());
        assert_eq!(ring.available_for_read(), 0);
        assert_eq!(ring.available_for_write(), page_size() - 1);
    }

    #[test]
    fn test_new_rejects_bad_capacity() {
        assert!(matches!(RingBuffer::<u8>::new(0), Err(Error::ZeroCapacity)));
        assert!(matches!(RingBuffer::<u8>::new(4), Err(Error::Unaligned { size: 4, .. })));
        assert!(matches!(RingBuffer::<u32>::new(page_size() + 1), Err(Error::Unaligned { .. })));
        assert!(matches!(RingBuffer::<u64>::new(usize::MAX), Err(Error::CapacityOverflow)));
        assert!(matches!(RingBuffer::<()>::new(16), Err(Error::Unaligned { size: 0, .. })));
        assert!(RingBuffer::<u8>::new(3).unwrap_err().is_configuration());
    }

    #[test]
    fn test_with_usable_capacity() {
        let ring = RingBuffer::<u32>::with_usable_capacity(10).unwrap();
        assert!(ring.usable_capacity() >= 10);
        assert_eq!(ring.capacity() * size_of::<u32>() % page_size(), 0);

        let ring = RingBuffer::<u8>::with_usable_capacity(page_size()).unwrap();
        assert_eq!(ring.capacity(), page_size() * 2);
    }

    #[test]
    fn test_reports_data_state() {
        fn run<const B: usize>() {
            let v = |c: u8| [c; B];
            let mut ring = four_slots::<B>();
            assert!(!ring.has_data());
            assert!(!ring.is_full());

            ring.write(v(b'a'));
            assert!(ring.has_data());
            assert!(!ring.is_full());
            ring.write(v(b'b'));
            assert!(!ring.is_full());
            ring.write(v(b'c'));
            assert!(ring.is_full());
            ring.write(v(b'd'));
            assert!(ring.has_data());
            assert!(ring.is_full());

            ring.read();
            assert!(ring.has_data());
            assert!(!ring.is_full());
            ring.read();
            ring.read();
            assert!(!ring.has_data());
            assert!(!ring.is_full());
            ring.read();
            assert!(!ring.has_data());
            assert!(!ring.is_full());

            ring.write(v(b'e'));
            assert!(ring.has_data());
            assert!(!ring.is_full());
        }
        with_four_slots!(run);
    }

    #[test]
    fn test_fill_then_empty() {
        fn run<const B: usize>() {
            let v = |c: u8| [c; B];
            let mut ring = four_slots::<B>();
            for c in *b"abc" {
                ring.write(v(c));
            }
            assert_eq!(ring.read(), v(b'a'));
            assert_eq!(ring.read(), v(b'b'));
            assert_eq!(ring.read(), v(b'c'));
        }
        with_four_slots!(run);
    }

    #[test]
    fn test_lockstep_wraps_around() {
        fn run<const B: usize>() {
            let v = |c: u8| [c; B];
            let mut ring = four_slots::<B>();
            for c in *b"abcdefghij" {
                ring.write(v(c));
                assert_eq!(ring.available_for_read(), 1);
                assert_eq!(ring.read(), v(c));
                assert!(!ring.has_data());
            }
        }
        with_four_slots!(run);
    }

    #[test]
    fn test_overflow_keeps_newest() {
        fn run<const B: usize>() {
            let v = |c: u8| [c; B];
            let mut ring = four_slots::<B>();
            for c in *b"abcde" {
                ring.write(v(c));
            }
            assert_eq!(ring.read(), v(b'c'));
            assert_eq!(ring.read(), v(b'd'));
            assert_eq!(ring.read(), v(b'e'));
        }
        with_four_slots!(run);
    }

    #[test]
    fn test_complex_read_write() {
        fn run<const B: usize>() {
            let v = |c: u8| [c; B];
            let mut ring = four_slots::<B>();
            ring.write(v(b'a'));
            ring.write(v(b'b'));
            ring.write(v(b'c'));
            assert!(ring.has_data());
            assert!(ring.is_full());

            assert_eq!(ring.read(), v(b'a'));
            assert!(!ring.is_full());

            ring.write(v(b'd'));
            assert!(ring.is_full());
            ring.write(v(b'e'));
            assert!(ring.is_full());

            assert_eq!(ring.read(), v(b'c'));
            assert!(!ring.is_full());
            assert_eq!(ring.read(), v(b'd'));
            assert_eq!(ring.read(), v(b'e'));
            assert!(!ring.has_data());

            assert_eq!(ring.read(), [0; B]);
            assert!(!ring.has_data());
            assert!(!ring.is_full());
        }
        with_four_slots!(run);
    }

    #[test]
    fn test_batch_write_matches_single_writes() {
        fn run<const B: usize>() {
            let v = |c: u8| [c; B];
            let mut single = four_slots::<B>();
            for c in *b"abcde" {
                single.write(v(c));
            }

            let mut batch = four_slots::<B>();
            let base = batch.write_buffer();
            for (i, c) in b"abcde".iter().enumerate() {
                // slot 4 lives in the mirror and lands on slot 0
                unsafe { base.add(i).write(v(*c)) };
            }
            batch.advance_write_head(5);

            assert_eq!(batch.available_for_read(), 3);
            assert_eq!(batch.read_slice(), single.read_slice());
            for c in *b"cde" {
                assert_eq!(batch.read(), v(c));
            }
            assert!(!batch.has_data());
        }
        with_four_slots!(run);
    }

    #[test]
    fn test_read_slice_spans_the_mirror() {
        let mut ring = RingBuffer::<u32>::new(page_size()).unwrap();
        let cap = ring.capacity();
        for i in 0..cap - 1 {
            ring.write(i as u32);
        }
        for _ in 0..cap / 2 {
            ring.read();
        }
        for i in 0..cap / 4 {
            ring.write(1_000_000 + i as u32);
        }
        let live = ring.read_slice();
        assert_eq!(live.len(), ring.available_for_read());
        assert!(live.windows(2).take_while(|w| w[1] < 1_000_000).all(|w| w[1] == w[0] + 1));
        assert_eq!(live.last(), Some(&(1_000_000 + (cap / 4 - 1) as u32)));
    }

    #[test]
    fn test_write_slice_then_commit() {
        let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
        ring.extend_from_slice(&vec![7; page_size() - 10]);
        ring.advance_read_head(page_size() - 20);

        let free = ring.write_slice();
        assert_eq!(free.len(), page_size() - 11);
        free[..30].copy_from_slice(&[9; 30]);
        ring.advance_write_head(30);

        assert_eq!(ring.available_for_read(), 40);
        assert_eq!(&ring.read_slice()[..10], &[7; 10]);
        assert_eq!(&ring.read_slice()[10..], &[9; 30]);
    }

    #[test]
    fn test_extend_from_slice_evicts_like_single_writes() {
        let ps = page_size();
        let data: Vec<u8> = (0..ps * 3 + 17).map(|i| (i % 251) as u8).collect();

        let mut batch = RingBuffer::<u8>::new(ps).unwrap();
        batch.write(1);
        batch.extend_from_slice(&data);

        let mut single = RingBuffer::<u8>::new(ps).unwrap();
        single.write(1);
        for &b in &data {
            single.write(b);
        }

        assert!(batch.is_full());
        assert_eq!(batch.read_slice(), &data[data.len() - (ps - 1)..]);
        assert_eq!(batch.read_slice(), single.read_slice());
        assert_eq!(read_head(&mut batch), read_head(&mut single));
    }

    #[test]
    fn test_read_into() {
        let mut ring = RingBuffer::<u16>::new(page_size()).unwrap();
        ring.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut dst = [0u16; 3];
        assert_eq!(ring.read_into(&mut dst), 3);
        assert_eq!(dst, [1, 2, 3]);
        assert_eq!(ring.read_into(&mut dst), 2);
        assert_eq!(&dst[..2], &[4, 5]);
        assert_eq!(ring.read_into(&mut dst), 0);
    }

    #[test]
    fn test_try_read() {
        let mut ring = RingBuffer::<i64>::new(page_size()).unwrap();
        assert_eq!(ring.try_read(), None);
        ring.write(0);
        assert_eq!(ring.try_read(), Some(0));
        assert_eq!(ring.try_read(), None);
        assert_eq!(ring.read(), 0);
    }

    #[test]
    fn test_reset_keeps_bytes() {
        let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
        ring.extend_from_slice(b"xyz");
        ring.read();
        ring.reset();
        assert!(!ring.has_data());
        assert!(!ring.is_full());
        assert_eq!(ring.read_buffer(), ring.raw_buffer() as *const u8);
        assert_eq!(unsafe { ring.read_slice_unchecked(3) }, b"xyz");

        ring.write(b'q');
        assert_eq!(ring.read(), b'q');
        assert!(!ring.has_data());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut ring = RingBuffer::<u32>::new(page_size()).unwrap();
        ring.extend_from_slice(&[10, 20, 30]);
        let mut copy = ring.clone();
        assert_eq!(copy.read_slice(), &[10, 20, 30]);

        copy.write(40);
        assert_eq!(ring.read(), 10);
        assert_eq!(copy.read_slice(), &[10, 20, 30, 40]);
        assert_eq!(ring.read_slice(), &[20, 30]);
    }

    #[test]
    fn test_try_from_slice() {
        let ring = RingBuffer::try_from([1u64, 1, 4, 5, 1, 4].as_slice()).unwrap();
        assert_eq!(ring.read_slice(), &[1, 1, 4, 5, 1, 4]);
    }

    #[test]
    fn test_debug_lists_live_elements() {
        let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
        ring.extend_from_slice(&[1, 2]);
        let dbg = format!("{ring:?}");
        assert!(dbg.contains("live: [1, 2]"), "{dbg}");
    }

    #[test]
    fn test_single_slot_ring_never_holds_data() {
        fn run<const P: usize>() {
            let mut ring = RingBuffer::<[u8; P]>::new(1).unwrap();
            assert_eq!(ring.usable_capacity(), 0);
            assert!(ring.is_full());
            ring.write([1; P]);
            assert!(!ring.has_data());
            assert_eq!(ring.read(), [0; P]);
        }
        match page_size() {
            4096 => run::<4096>(),
            16384 => run::<16384>(),
            65536 => run::<65536>(),
            other => panic!("no page-sized element type for {other} bytes"),
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
    #[repr(C)]
    struct Sample {
        id: u64,
        delta: i32,
        tag: [u8; 4],
    }

    #[derive(Debug, Clone)]
    enum Op {
        Write(u32),
        Read,
        Reset,
        Extend(Vec<u32>),
        ReadInto(usize),
        Commit { len: usize, fill: u32 },
    }

    fn op() -> impl Strategy<Value = Op> {
        let cap = page_size() / size_of::<u32>();
        prop_oneof![
            4 => any::<u32>().prop_map(Op::Write),
            3 => Just(Op::Read),
            1 => Just(Op::Reset),
            2 => proptest::collection::vec(any::<u32>(), 0..cap * 2).prop_map(Op::Extend),
            2 => (0..cap * 2).prop_map(Op::ReadInto),
            2 => (0..cap, any::<u32>()).prop_map(|(len, fill)| Op::Commit { len, fill }),
        ]
    }

    /// Evict-oldest queue that every ring must agree with.
    fn model_write(model: &mut VecDeque<u32>, usable: usize, value: u32) {
        if model.len() == usable {
            model.pop_front();
        }
        model.push_back(value);
    }

    proptest! {
        #[test]
        fn prop_matches_evicting_queue(ops in proptest::collection::vec(op(), 1..48)) {
            let mut ring = RingBuffer::<u32>::new(page_size() / size_of::<u32>()).unwrap();
            let usable = ring.usable_capacity();
            let mut model = VecDeque::new();
            for op in ops {
                match op {
                    Op::Write(v) => {
                        ring.write(v);
                        model_write(&mut model, usable, v);
                    }
                    Op::Read => prop_assert_eq!(ring.read(), model.pop_front().unwrap_or(0)),
                    Op::Reset => {
                        ring.reset();
                        model.clear();
                    }
                    Op::Extend(values) => {
                        ring.extend_from_slice(&values);
                        for v in values {
                            model_write(&mut model, usable, v);
                        }
                    }
                    Op::ReadInto(len) => {
                        let mut dst = vec![0; len];
                        let n = ring.read_into(&mut dst);
                        let expected: Vec<u32> = model.drain(..len.min(model.len())).collect();
                        prop_assert_eq!(&dst[..n], expected.as_slice());
                    }
                    Op::Commit { len, fill } => {
                        // may run past the free slots and evict
                        unsafe { ring.write_slice_unchecked(len) }.fill(fill);
                        ring.advance_write_head(len);
                        for _ in 0..len {
                            model_write(&mut model, usable, fill);
                        }
                    }
                }
                prop_assert_eq!(ring.available_for_read(), model.len());
                prop_assert_eq!(ring.available_for_write(), usable - model.len());
                prop_assert_eq!(ring.has_data(), !model.is_empty());
                prop_assert_eq!(ring.is_full(), model.len() == usable);
                prop_assert!(ring.read_slice().iter().eq(model.iter()));
            }
        }

        #[test]
        fn prop_counts_follow_writes(k in 0usize..2048) {
            let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
            let usable = ring.usable_capacity();
            let k = k.min(usable);
            for i in 0..k {
                ring.write(i as u8);
            }
            prop_assert_eq!(ring.has_data(), k > 0);
            prop_assert_eq!(ring.is_full(), k == usable);
            prop_assert_eq!(ring.available_for_read(), k);
            prop_assert_eq!(ring.available_for_write(), usable - k);
        }

        #[test]
        fn prop_round_trip(id in any::<u64>(), delta in any::<i32>(), tag in any::<[u8; 4]>()) {
            let v = Sample { id, delta, tag };
            let mut ring = RingBuffer::<Sample>::new(page_size()).unwrap();
            ring.write(v);
            prop_assert_eq!(ring.read(), v);
        }

        #[test]
        fn prop_overflow_is_read_then_write(prefill in 0usize..64, v in any::<u16>()) {
            let mut full = RingBuffer::<u16>::new(page_size() / 2).unwrap();
            for i in 0..full.usable_capacity() + prefill {
                full.write(i as u16);
            }
            prop_assert!(full.is_full());

            let mut overwritten = full.try_clone().unwrap();
            overwritten.write(v);
            let mut explicit = full.try_clone().unwrap();
            explicit.read();
            explicit.write(v);

            prop_assert_eq!(overwritten.read_slice(), explicit.read_slice());
            prop_assert_eq!(read_head(&mut overwritten), read_head(&mut explicit));
        }

        #[test]
        fn prop_reset_behaves_like_fresh(pre in proptest::collection::vec(any::<u8>(), 0..8192), v in any::<u8>()) {
            let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
            ring.extend_from_slice(&pre);
            ring.reset();
            prop_assert!(!ring.has_data());
            prop_assert!(!ring.is_full());
            ring.write(v);
            prop_assert_eq!(ring.available_for_read(), 1);
            prop_assert_eq!(ring.read(), v);
            prop_assert!(!ring.has_data());
        }
    }
}
