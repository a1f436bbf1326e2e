//! Errors surfaced when a mirrored region or a ring buffer is constructed.
//!
//! Nothing after construction can fail: reading an empty ring yields the zero value
//! and writing into a full ring evicts the oldest element.

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A ring buffer was requested with zero slots.
    #[error("ring buffer capacity must be non-zero")]
    ZeroCapacity,

    /// The byte size of the region is zero or not a whole number of pages.
    #[error("region size of {size} bytes is not a positive multiple of the page size ({page_size} bytes)")]
    Unaligned { size: usize, page_size: usize },

    /// The byte size of the region (or of its doubled reservation) does not fit the address space.
    #[error("requested region size overflows the address space")]
    CapacityOverflow,

    /// Elements cannot be placed on page boundaries.
    #[error("element alignment of {align} bytes exceeds the page size ({page_size} bytes)")]
    ElementAlignment { align: usize, page_size: usize },

    /// The OS refused one of the reserve, split, back or map steps.
    #[error("failed to map mirrored region: {0:#}")]
    Allocation(anyhow::Error),
}

impl Error {
    /// Returns `true` for errors the caller can fix by asking for a different size.
    pub fn is_configuration(&self) -> bool { !self.is_resource() }

    /// Returns `true` when the OS declined to provide the memory.
    pub fn is_resource(&self) -> bool { matches!(self, Self::Allocation(_)) }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self { Self::Allocation(err) }
}
