use super::RingBuffer;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

// Neither side ever waits: reads return what is live, writes evict what does not fit.

impl AsyncRead for RingBuffer<u8> {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let available_data = self.read_slice();
        let len_to_copy = available_data.len().min(buf.remaining());
        buf.put_slice(&available_data[..len_to_copy]);
        self.advance_read_head(len_to_copy);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for RingBuffer<u8> {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        self.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> { Poll::Ready(Ok(())) }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> { Poll::Ready(Ok(())) }
}
