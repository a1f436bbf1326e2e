use super::allocation_granularity;
use crate::error::{Error, Result};
use core::mem::{align_of, size_of};
use num::Integer;
use std::sync::OnceLock;

/// Largest half size a region may have; the doubled reservation must still fit in `isize`.
pub const MAX_REGION_SIZE: usize = isize::MAX as usize / 2;

/// The granularity every region size must be a multiple of.
///
/// Queried once from the OS and cached. On Windows this is the allocation granularity, which is what
/// placeholder views are aligned to.
#[inline]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(allocation_granularity)
}

/// Checks that `size` can be used as the half size of a mirrored region.
pub(crate) fn check_region_size(size: usize) -> Result<()> {
    let page_size = page_size();
    if size == 0 || !size.is_multiple_of(page_size) {
        return Err(Error::Unaligned { size, page_size });
    }
    if size > MAX_REGION_SIZE {
        return Err(Error::CapacityOverflow);
    }
    Ok(())
}

/// Byte size of the region backing `capacity` slots of `T`.
pub(crate) fn ring_region_size<T>(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        return Err(Error::ZeroCapacity);
    }
    let page_size = page_size();
    if align_of::<T>() > page_size {
        return Err(Error::ElementAlignment { align: align_of::<T>(), page_size });
    }
    let size = size_of::<T>().checked_mul(capacity).ok_or(Error::CapacityOverflow)?;
    check_region_size(size)?;
    Ok(size)
}

/// Smallest slot count that keeps at least `usable` elements live and fills whole pages.
pub(crate) fn ring_capacity_for<T>(usable: usize) -> Result<usize> {
    let elem_size = size_of::<T>();
    if elem_size == 0 {
        return Err(Error::Unaligned { size: 0, page_size: page_size() });
    }
    // capacity * elem_size is a page multiple iff capacity is a multiple of this unit
    let unit = page_size().lcm(&elem_size) / elem_size;
    let slots = usable.checked_add(1).ok_or(Error::CapacityOverflow)?;
    let capacity = slots.div_ceil(unit).checked_mul(unit).ok_or(Error::CapacityOverflow)?;
    ring_region_size::<T>(capacity)?;
    Ok(capacity)
}
