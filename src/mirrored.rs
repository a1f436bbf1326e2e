//! Mirrored virtual-memory region.
mod region;
mod utils;

pub use region::MirroredRegion;
pub use utils::{MAX_REGION_SIZE, page_size};
pub(crate) use utils::{ring_capacity_for, ring_region_size};

#[cfg(all(target_family = "unix", not(target_vendor = "apple")))]
mod unix;

#[cfg(all(target_family = "unix", not(target_vendor = "apple")))]
pub(crate) use unix::*;

#[cfg(target_vendor = "apple")]
mod darwin;

#[cfg(target_vendor = "apple")]
pub(crate) use darwin::*;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub(crate) use windows::*;
