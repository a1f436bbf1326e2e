use crate::{RingBuffer, Zeroable};
use serde::{
    Deserialize, Serialize,
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
};
use std::{fmt, marker::PhantomData};

/// Serializes the live elements, oldest first.
impl<T: Copy + Zeroable + Serialize> Serialize for RingBuffer<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let live = self.read_slice();
        let mut seq = serializer.serialize_seq(Some(live.len()))?;
        for element in live {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

struct RingBufferVisitor<T>(PhantomData<T>);

impl<'de, T: Copy + Zeroable + Deserialize<'de>> Visitor<'de> for RingBufferVisitor<T> {
    type Value = RingBuffer<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result { formatter.write_str("a sequence") }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut elements = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(elem) = seq.next_element()? {
            elements.push(elem);
        }
        RingBuffer::try_from(elements.as_slice()).map_err(de::Error::custom)
    }
}

/// Deserializes into the smallest page-aligned ring that holds every element.
impl<'de, T: Copy + Zeroable + Deserialize<'de>> Deserialize<'de> for RingBuffer<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(RingBufferVisitor(PhantomData))
    }
}
