use super::RingBuffer;
use std::io::{self, Read, Write};

/// Drains the oldest bytes into `buf`; an empty ring reads as `Ok(0)`.
impl Read for RingBuffer<u8> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { Ok(self.read_into(buf)) }
}

/// Accepts the whole input, evicting the oldest bytes when it does not fit.
impl Write for RingBuffer<u8> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}
