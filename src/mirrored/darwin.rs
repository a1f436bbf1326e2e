//! Mirrored mappings for macOS and iOS using mach2.
//!
//! The low half of a `2 * size` allocation is the backing memory object; the high half is replaced by a
//! shared remap of it.

use super::page_size;
use anyhow::{Context, Result as AnyResult, bail};
use mach2::{
    kern_return::KERN_SUCCESS,
    traps::mach_task_self,
    vm::{mach_vm_allocate, mach_vm_deallocate, mach_vm_remap},
    vm_inherit::VM_INHERIT_NONE,
    vm_page_size::vm_page_size,
    vm_prot::{VM_PROT_READ, VM_PROT_WRITE},
    vm_statistics::{VM_FLAGS_ANYWHERE, VM_FLAGS_FIXED, VM_FLAGS_OVERWRITE},
    vm_types::{mach_vm_address_t, mach_vm_size_t},
};
use std::ptr::NonNull;
use tracing::{trace, warn};

/// Retrieves the system's memory allocation granularity (page size).
///
/// ## System APIs Used
/// - `vm_page_size`
#[inline]
pub(crate) fn allocation_granularity() -> usize { unsafe { vm_page_size as usize } }

/// The Mach allocations behind one mirrored region, recorded as each step succeeds.
pub(crate) struct Mapping {
    size: mach_vm_size_t,
    reservation: Option<mach_vm_address_t>,
    mirrored: bool,
}

impl Mapping {
    /// Allocates `2 * size` bytes and remaps the low half over the high half.
    ///
    /// On error every step that already succeeded has been undone.
    ///
    /// ## System APIs Used
    /// - [`mach_vm_allocate`](https://developer.apple.com/documentation/kernel/1402376-mach_vm_allocate)
    /// - [`mach_vm_remap`](https://developer.apple.com/documentation/kernel/1402218-mach_vm_remap)
    pub(crate) fn map(size: usize) -> AnyResult<Self> {
        debug_assert!(size > 0 && size.is_multiple_of(page_size()));
        let physical_size = mach_vm_size_t::try_from(size).context("region size does not fit mach_vm_size_t")?;
        let mut mapping = Self { size: physical_size, reservation: None, mirrored: false };
        let this_task = unsafe { mach_task_self() };

        let mut low_half_addr: mach_vm_address_t = 0;
        let result = unsafe { mach_vm_allocate(this_task, &mut low_half_addr, physical_size * 2, VM_FLAGS_ANYWHERE) };
        if result != KERN_SUCCESS {
            bail!("failed to reserve address space: mach_vm_allocate returned {}", result);
        }
        mapping.reservation = Some(low_half_addr);
        trace!(size, base = low_half_addr, "reserved mirrored address range");

        let mut high_half_addr = low_half_addr + physical_size;
        let mut cur_prot = VM_PROT_READ | VM_PROT_WRITE;
        let mut max_prot = VM_PROT_READ | VM_PROT_WRITE;
        let result = unsafe {
            mach_vm_remap(
                this_task,
                &mut high_half_addr,
                physical_size,
                0,
                VM_FLAGS_FIXED | VM_FLAGS_OVERWRITE,
                this_task,
                low_half_addr,
                0,
                &mut cur_prot,
                &mut max_prot,
                VM_INHERIT_NONE,
            )
        };
        if result != KERN_SUCCESS {
            bail!("failed to map high half: mach_vm_remap returned {}", result);
        }
        debug_assert_eq!(high_half_addr, low_half_addr + physical_size);
        mapping.mirrored = true;
        trace!(size, "mapped both views");
        Ok(mapping)
    }

    #[inline]
    pub(crate) fn base(&self) -> Option<NonNull<u8>> {
        if !self.mirrored {
            return None;
        }
        self.reservation.and_then(|addr| NonNull::new(addr as *mut u8))
    }

    /// Undoes every recorded step. Safe to call any number of times.
    ///
    /// ## System APIs Used
    /// - [`mach_vm_deallocate`](https://developer.apple.com/documentation/kernel/1402285-mach_vm_deallocate)
    pub(crate) fn release(&mut self) {
        self.mirrored = false;
        if let Some(addr) = self.reservation.take() {
            let result = unsafe { mach_vm_deallocate(mach_task_self(), addr, self.size * 2) };
            if result != KERN_SUCCESS {
                warn!(size = self.size, result, "mach_vm_deallocate of mirrored region failed");
            }
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) { self.release(); }
}
