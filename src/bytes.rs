use super::RingBuffer;
use bytes::{Buf, BufMut, buf::UninitSlice};

impl Buf for RingBuffer<u8> {
    #[inline]
    fn remaining(&self) -> usize { self.available_for_read() }

    #[inline]
    fn chunk(&self) -> &[u8] { self.read_slice() }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.available_for_read(), "cannot advance past the end of the buffer");
        self.advance_read_head(cnt);
    }
}

// `BufMut` never evicts: `remaining_mut` is only the free space.
unsafe impl BufMut for RingBuffer<u8> {
    #[inline]
    fn remaining_mut(&self) -> usize { self.available_for_write() }

    #[inline]
    unsafe fn advance_mut(&mut self, cnt: usize) {
        assert!(cnt <= self.available_for_write(), "cannot advance past the buffer's free space");
        self.advance_write_head(cnt);
    }

    #[inline]
    fn chunk_mut(&mut self) -> &mut UninitSlice { UninitSlice::new(self.write_slice()) }
}
