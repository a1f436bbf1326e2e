//! Mirrored mappings for Linux, Android and the BSDs.
//!
//! One memfd (or unlinked POSIX shm object) of `size` bytes is mapped twice with `MAP_FIXED` over a
//! `PROT_NONE` reservation of `2 * size` bytes.
//!
// | step              | Linux / Android      | other unix           |
// |-------------------|----------------------|----------------------|
// | back              | memfd_create         | shm_open + unlink    |
// | reserve           | mmap(PROT_NONE)      | mmap(PROT_NONE)      |
// | map view          | mmap(MAP_FIXED)      | mmap(MAP_FIXED)      |
// | release           | munmap               | munmap               |

use super::page_size;
use anyhow::{Context, Result as AnyResult};
use nix::{
    libc::off_t,
    sys::mman::{MapFlags, ProtFlags, mmap, mmap_anonymous, munmap},
    unistd::{SysconfVar, ftruncate, sysconf},
};
use std::{
    ffi::c_void,
    num::NonZeroUsize,
    os::fd::{AsFd, OwnedFd},
    ptr::NonNull,
};
use tracing::{trace, warn};

/// Page size as reported by `sysconf`. Callers go through the cached [`page_size`].
pub(crate) fn allocation_granularity() -> usize {
    sysconf(SysconfVar::PAGE_SIZE).ok().flatten().expect("failed to obtain page size") as usize
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn create_mem_fd() -> AnyResult<OwnedFd> {
    use nix::sys::memfd::{MFdFlags, memfd_create};
    let fd = memfd_create("mirrored_region", MFdFlags::MFD_CLOEXEC).context("memfd_create failed")?;
    Ok(fd)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn get_random_str(n: usize) -> Box<str> {
    std::iter::once('/').chain(std::iter::repeat_with(fastrand::alphanumeric).take(n)).collect()
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn create_mem_fd() -> AnyResult<OwnedFd> {
    use nix::{
        fcntl::OFlag,
        sys::{
            mman::{shm_open, shm_unlink},
            stat::Mode,
        },
    };
    let name = get_random_str(12);
    let fd = shm_open(name.as_ref(), OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL, Mode::from_bits_truncate(0o600))
        .context("shm_open failed")?;
    // the object stays alive through `fd`; only the name goes away
    shm_unlink(name.as_ref()).context("shm_unlink failed")?;
    Ok(fd)
}

/// The OS resources behind one mirrored region, recorded as each step succeeds.
///
/// Both views live inside the reservation, so unmapping the reservation releases them too.
pub(crate) struct Mapping {
    size: usize,
    reservation: Option<NonNull<c_void>>,
    memfd: Option<OwnedFd>,
    views: [Option<NonNull<c_void>>; 2],
}

impl Mapping {
    /// Maps a `size`-byte shared object twice, back to back.
    ///
    /// `size` must be a non-zero multiple of [`page_size`] no larger than `isize::MAX / 2`.
    /// On error every step that already succeeded has been undone.
    pub(crate) fn map(size: usize) -> AnyResult<Self> {
        debug_assert!(size > 0 && size.is_multiple_of(page_size()));
        let mut mapping = Self { size, reservation: None, memfd: None, views: [None, None] };
        let virtual_size = NonZeroUsize::new(size * 2).context("mirrored region must not be empty")?;
        let physical_size = NonZeroUsize::new(size).context("mirrored region must not be empty")?;

        let reservation = unsafe {
            mmap_anonymous(None, virtual_size, ProtFlags::PROT_NONE, {
                #[cfg(any(target_os = "linux", target_os = "android"))]
                {
                    MapFlags::MAP_PRIVATE | MapFlags::MAP_NORESERVE
                }
                #[cfg(not(any(target_os = "linux", target_os = "android")))]
                {
                    MapFlags::MAP_PRIVATE
                }
            })
        }
        .context("failed to reserve address space")?;
        mapping.reservation = Some(reservation);
        trace!(size, base = ?reservation, "reserved mirrored address range");

        let fd = create_mem_fd().context("failed to create backing object")?;
        let len = off_t::try_from(size).context("region size does not fit off_t")?;
        ftruncate(fd.as_fd(), len).context("failed to size backing object")?;
        let fd = mapping.memfd.insert(fd);

        for (half, view) in mapping.views.iter_mut().enumerate() {
            let target = reservation.as_ptr() as usize + half * size;
            // `target` sits inside a live reservation, so it is never zero
            let addr = NonZeroUsize::new(target).context("reservation address is null")?;
            let mapped = unsafe {
                mmap(
                    Some(addr),
                    physical_size,
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                    MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
                    fd.as_fd(),
                    0,
                )
            }
            .with_context(|| format!("failed to map {} half at {:#x}", if half == 0 { "low" } else { "high" }, target))?;
            debug_assert_eq!(mapped.as_ptr() as usize, target);
            *view = Some(mapped);
        }
        trace!(size, "mapped both views");
        Ok(mapping)
    }

    #[inline]
    pub(crate) fn base(&self) -> Option<NonNull<u8>> { self.views[0].map(NonNull::cast) }

    /// Undoes every recorded step. Safe to call any number of times.
    pub(crate) fn release(&mut self) {
        self.views = [None, None];
        if let Some(reservation) = self.reservation.take() {
            if let Err(errno) = unsafe { munmap(reservation, self.size * 2) } {
                warn!(size = self.size, %errno, "munmap of mirrored region failed");
            }
        }
        // closing the fd drops the last reference to the backing object
        self.memfd = None;
    }
}

impl Drop for Mapping {
    fn drop(&mut self) { self.release(); }
}
