//! Platform glue: cycle counter, CPU affinity, memory locking, padding.

use std::ops::{Deref, DerefMut};

use cfg_if::cfg_if;

pub const CACHE_LINE: usize = 64;
pub const PAGE_SIZE: usize = 4096;

cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// Reads the cycle counter. Only differences are meaningful.
        #[inline]
        pub fn tsc() -> u64 {
            unsafe { core::arch::x86_64::_rdtsc() }
        }
    } else if #[cfg(target_arch = "aarch64")] {
        /// Reads the virtual counter. Only differences are meaningful.
        #[inline]
        pub fn tsc() -> u64 {
            let cnt: u64;
            unsafe { core::arch::asm!("mrs {}, cntvct_el0", out(reg) cnt) };
            cnt
        }
    } else {
        /// Monotonic nanoseconds for targets without a user-readable cycle
        /// counter. Only differences are meaningful.
        #[inline]
        pub fn tsc() -> u64 {
            use std::sync::OnceLock;
            use std::time::Instant;
            static START: OnceLock<Instant> = OnceLock::new();
            START.get_or_init(Instant::now).elapsed().as_nanos() as u64
        }
    }
}

cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Pins the calling thread to one CPU of the process's allowed set.
        ///
        /// `core` indexes the allowed set modulo its size, so restricted
        /// cpusets and oversubscribed runs still pin every worker.
        pub fn pin_to_core(core: usize) -> nix::Result<()> {
            use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
            use nix::unistd::Pid;

            let allowed = sched_getaffinity(Pid::from_raw(0))?;
            let cpus: Vec<usize> = (0..CpuSet::count())
                .filter(|&c| allowed.is_set(c).unwrap_or(false))
                .collect();
            if cpus.is_empty() {
                return Err(nix::errno::Errno::EINVAL);
            }
            let mut set = CpuSet::new();
            set.set(cpus[core % cpus.len()])?;
            sched_setaffinity(Pid::from_raw(0), &set)
        }
    } else {
        pub fn pin_to_core(_core: usize) -> nix::Result<()> {
            Ok(())
        }
    }
}

/// Pins `len` bytes starting at `ptr` into physical memory.
pub fn lock_memory(ptr: *const u8, len: usize) -> nix::Result<()> {
    let addr = std::ptr::NonNull::new(ptr as *mut std::ffi::c_void)
        .ok_or(nix::errno::Errno::EINVAL)?;
    unsafe { nix::sys::mman::mlock(addr, len) }
}

/// Pads and aligns a value to its own page.
///
/// Page-granular counterpart of `crossbeam_utils::CachePadded`, for
/// per-thread slots that remote threads poll in their measured loops.
#[derive(Debug, Default)]
#[repr(align(4096))]
pub struct PagePadded<T> {
    value: T,
}

impl<T> PagePadded<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for PagePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for PagePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsc_advances() {
        let a = tsc();
        for _ in 0..1000 {
            std::hint::spin_loop();
        }
        let b = tsc();
        assert!(b >= a);
    }

    #[test]
    fn page_padded_layout() {
        assert_eq!(std::mem::align_of::<PagePadded<u8>>(), PAGE_SIZE);
        assert_eq!(std::mem::size_of::<PagePadded<[u8; 8192]>>() % PAGE_SIZE, 0);
        let slot = PagePadded::new(7u64);
        assert_eq!(*slot, 7);
    }

    #[test]
    fn lock_memory_rejects_null() {
        assert!(lock_memory(std::ptr::null(), 8).is_err());
    }

    #[test]
    fn lock_memory_rejects_oversized_range() {
        let buf = [0u8; 16];
        assert!(lock_memory(buf.as_ptr(), usize::MAX / 2).is_err());
    }

    #[test]
    fn pin_wraps_modulo_allowed_cpus() {
        std::thread::spawn(|| {
            pin_to_core(0).unwrap();
            pin_to_core(usize::MAX).unwrap();
        })
        .join()
        .unwrap();
    }
}
