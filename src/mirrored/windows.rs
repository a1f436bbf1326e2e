//! Mirrored mappings on top of Windows placeholder virtual memory.
//!
//! Requires **Windows 10 (version 1803) or newer** for `VirtualAlloc2` and `MapViewOfFile3`.

use super::page_size;
use anyhow::{Context, Result as AnyResult, bail};
use std::{
    ffi::c_void,
    mem::MaybeUninit,
    ptr::NonNull,
};
use tracing::{trace, warn};
use windows::{
    Win32::{
        Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE},
        System::{
            Memory::{
                CreateFileMappingW, MEM_PRESERVE_PLACEHOLDER, MEM_RELEASE, MEM_REPLACE_PLACEHOLDER, MEM_RESERVE,
                MEM_RESERVE_PLACEHOLDER, MEM_UNMAP_NONE, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile3, PAGE_NOACCESS,
                PAGE_READWRITE, SEC_COMMIT, UnmapViewOfFile2, VIRTUAL_FREE_TYPE, VirtualAlloc2, VirtualFree,
            },
            SystemInformation::{GetSystemInfo, SYSTEM_INFO},
            Threading::GetCurrentProcess,
        },
    },
    core::PCWSTR,
};

/// Allocation granularity from `GetSystemInfo`. Callers go through the cached [`page_size`].
///
/// Placeholders can only be split and replaced on allocation-granularity boundaries, which is
/// coarser than the page size.
pub(crate) fn allocation_granularity() -> usize {
    let mut system_info = MaybeUninit::<SYSTEM_INFO>::uninit();
    unsafe {
        GetSystemInfo(system_info.as_mut_ptr());
        system_info.assume_init().dwAllocationGranularity as usize
    }
}

/// The placeholder, section and views behind one mirrored region, recorded as each step succeeds.
///
/// After the split each half is either a bare placeholder or a mapped view, never both.
pub(crate) struct Mapping {
    size: usize,
    reservation: Option<NonNull<c_void>>,
    split: bool,
    section: Option<HANDLE>,
    views: [Option<MEMORY_MAPPED_VIEW_ADDRESS>; 2],
}

impl Mapping {
    /// Reserves `2 * size` bytes as a placeholder, splits it in two and maps one page-file backed
    /// section into both halves.
    ///
    /// On error every step that already succeeded has been undone.
    pub(crate) fn map(size: usize) -> AnyResult<Self> {
        debug_assert!(size > 0 && size.is_multiple_of(page_size()));
        let mut mapping = Self { size, reservation: None, split: false, section: None, views: [None, None] };
        unsafe {
            let current_process = GetCurrentProcess();

            let placeholder = VirtualAlloc2(
                Some(current_process),
                None, // let the system choose an address
                size * 2,
                MEM_RESERVE | MEM_RESERVE_PLACEHOLDER,
                PAGE_NOACCESS.0,
                None,
            );
            let Some(placeholder) = NonNull::new(placeholder) else {
                bail!("failed to reserve address space: VirtualAlloc2 returned null");
            };
            mapping.reservation = Some(placeholder);
            trace!(size, base = ?placeholder, "reserved mirrored address range");

            // releasing the low half with MEM_PRESERVE_PLACEHOLDER leaves two placeholders behind
            VirtualFree(placeholder.as_ptr(), size, VIRTUAL_FREE_TYPE(MEM_RELEASE.0 | MEM_PRESERVE_PLACEHOLDER.0))
                .context("failed to split placeholder")?;
            mapping.split = true;

            let section = CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                None,
                PAGE_READWRITE | SEC_COMMIT,
                (size as u64 >> 32) as u32,
                size as u32,
                PCWSTR::null(),
            )
            .context("failed to create page-file backed section")?;
            mapping.section = Some(section);

            for (half, view) in mapping.views.iter_mut().enumerate() {
                let target = placeholder.as_ptr().byte_add(half * size);
                let mapped = MapViewOfFile3(
                    section,
                    Some(current_process),
                    Some(target.cast_const()),
                    0,
                    size,
                    MEM_REPLACE_PLACEHOLDER,
                    PAGE_READWRITE.0,
                    None,
                );
                if mapped.Value.is_null() {
                    bail!("failed to map {} half: MapViewOfFile3 returned null", if half == 0 { "low" } else { "high" });
                }
                *view = Some(mapped);
            }
        }
        trace!(size, "mapped both views");
        Ok(mapping)
    }

    #[inline]
    pub(crate) fn base(&self) -> Option<NonNull<u8>> {
        self.views[0].and_then(|view| NonNull::new(view.Value.cast::<u8>()))
    }

    /// Undoes every recorded step. Safe to call any number of times.
    pub(crate) fn release(&mut self) {
        unsafe {
            let current_process = GetCurrentProcess();
            if let Some(reservation) = self.reservation.take() {
                for (half, view) in self.views.iter_mut().enumerate() {
                    if let Some(view) = view.take() {
                        // without MEM_PRESERVE_PLACEHOLDER the range goes back to the system with the view
                        if let Err(err) = UnmapViewOfFile2(current_process, view, MEM_UNMAP_NONE) {
                            warn!(half, %err, "UnmapViewOfFile2 of mirrored view failed");
                        }
                    } else if self.split {
                        let placeholder = reservation.as_ptr().byte_add(half * self.size);
                        if let Err(err) = VirtualFree(placeholder, 0, MEM_RELEASE) {
                            warn!(half, %err, "VirtualFree of placeholder half failed");
                        }
                    }
                }
                if !self.split {
                    if let Err(err) = VirtualFree(reservation.as_ptr(), 0, MEM_RELEASE) {
                        warn!(%err, "VirtualFree of placeholder failed");
                    }
                }
            }
            self.split = false;
            if let Some(section) = self.section.take() {
                if let Err(err) = CloseHandle(section) {
                    warn!(%err, "CloseHandle of section failed");
                }
            }
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) { self.release(); }
}
