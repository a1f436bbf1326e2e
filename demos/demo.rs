use mirrored_ring::{RingBuffer, page_size};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mirrored_ring=trace")))
        .init();

    let mut rb = RingBuffer::<u32>::with_usable_capacity(8)?;
    println!("page size {} bytes, {} slots, {} usable", page_size(), rb.capacity(), rb.usable_capacity());

    for idx in 0..100_000 {
        rb.write(idx);
    }
    let live = rb.read_slice();
    println!("kept the newest {} of 100000, from {:?} to {:?}", live.len(), live.first(), live.last());

    let line = b"I love Rust, and the mirror keeps every run contiguous. ";
    let mut log = RingBuffer::<u8>::new(page_size())?;
    for _ in 0..200 {
        log.extend_from_slice(line);
    }
    let tail = log.read_slice();
    println!("{} bytes live, ending with {:?}", tail.len(), String::from_utf8_lossy(&tail[tail.len() - line.len()..]));

    let mut chunk = [0u8; 16];
    let n = log.read_into(&mut chunk);
    println!("drained {n} bytes: {:?}", String::from_utf8_lossy(&chunk[..n]));
    Ok(())
}
