#![no_main]
use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use mirrored_ring::{RingBuffer, page_size};
use std::collections::VecDeque;

#[derive(Debug, Arbitrary)]
enum Op {
    Write(u8),
    Read,
    TryRead,
    Reset,
    Extend(Vec<u8>),
    ReadInto(u16),
    AdvanceRead(u16),
    Commit { len: u16, fill: u8 },
}

fn model_write(model: &mut VecDeque<u8>, usable: usize, value: u8) {
    if model.len() == usable {
        model.pop_front();
    }
    model.push_back(value);
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let ops: Vec<Op> = match Vec::<Op>::arbitrary(&mut unstructured) {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut ring = RingBuffer::<u8>::new(page_size()).unwrap();
    let usable = ring.usable_capacity();
    let mut model = VecDeque::<u8>::new();

    for op in ops {
        match op {
            Op::Write(val) => {
                ring.write(val);
                model_write(&mut model, usable, val);
            }
            Op::Read => {
                assert_eq!(ring.read(), model.pop_front().unwrap_or(0));
            }
            Op::TryRead => {
                assert_eq!(ring.try_read(), model.pop_front());
            }
            Op::Reset => {
                ring.reset();
                model.clear();
            }
            Op::Extend(values) => {
                ring.extend_from_slice(&values);
                for val in values {
                    model_write(&mut model, usable, val);
                }
            }
            Op::ReadInto(len) => {
                let mut dst = vec![0; len as usize];
                let n = ring.read_into(&mut dst);
                let expected: Vec<u8> = model.drain(..n).collect();
                assert_eq!(n, (len as usize).min(n + model.len()));
                assert_eq!(&dst[..n], expected.as_slice());
            }
            Op::AdvanceRead(len) => {
                let len = len as usize % (model.len() + 1);
                ring.advance_read_head(len);
                model.drain(..len);
            }
            Op::Commit { len, fill } => {
                // may run past the free slots and evict
                let len = len as usize % ring.capacity();
                unsafe { ring.write_slice_unchecked(len) }.fill(fill);
                ring.advance_write_head(len);
                for _ in 0..len {
                    model_write(&mut model, usable, fill);
                }
            }
        }

        assert_eq!(ring.available_for_read(), model.len());
        assert_eq!(ring.available_for_write(), usable - model.len());
        assert_eq!(ring.has_data(), !model.is_empty());
        assert_eq!(ring.is_full(), model.len() == usable);
        assert_eq!(ring.read_slice(), model.make_contiguous());
    }
});
