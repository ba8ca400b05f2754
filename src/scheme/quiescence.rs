//! Time-based quiescence: per-thread activity stamps plus per-thread pools
//! of deferred-free blocks.

use std::collections::VecDeque;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicU64, Ordering};

use crate::plat::{self, PagePadded};

const QUIESCENT: u64 = u64::MAX;

/// One activity stamp per registered thread: the cycle count at section
/// entry while the thread is inside a protected section, `QUIESCENT`
/// otherwise.
pub struct QuiescenceDomain {
    slots: Box<[PagePadded<AtomicU64>]>,
}

impl QuiescenceDomain {
    pub fn new(threads: usize) -> Self {
        Self {
            slots: (0..threads)
                .map(|_| PagePadded::new(AtomicU64::new(QUIESCENT)))
                .collect(),
        }
    }

    #[inline]
    pub fn enter(&self, tid: usize) {
        self.slots[tid].store(plat::tsc(), Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }

    #[inline]
    pub fn exit(&self, tid: usize) {
        self.slots[tid].store(QUIESCENT, Ordering::Release);
    }

    /// Any stamp below the returned boundary is older than every section
    /// currently in progress.
    pub fn grace_boundary(&self) -> u64 {
        let mut boundary = QUIESCENT;
        for slot in self.slots.iter() {
            boundary = boundary.min(slot.load(Ordering::Acquire));
        }
        boundary
    }
}

struct Retired<T> {
    ptr: NonNull<T>,
    stamp: u64,
}

/// Per-thread allocation cache fed by deferred frees.
///
/// Retired blocks sit in limbo until their stamp ages past the domain's
/// grace boundary, then recycle through the free list; allocation falls
/// back to the global allocator when nothing has aged out.
pub struct LocalCache<T> {
    free: Vec<NonNull<T>>,
    limbo: VecDeque<Retired<T>>,
}

impl<T> LocalCache<T> {
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            limbo: VecDeque::new(),
        }
    }

    /// Seeds the free list so steady-state allocation stays off the global
    /// allocator.
    pub fn prefill(&mut self, count: usize, mut make: impl FnMut() -> T) {
        self.free.reserve(count);
        for _ in 0..count {
            let ptr = Box::into_raw(Box::new(make()));
            // Box never hands out null.
            self.free.push(unsafe { NonNull::new_unchecked(ptr) });
        }
    }

    /// Hands out a block holding `init`: a recycled one when a retired block
    /// has aged past the grace boundary, a fresh one otherwise.
    pub fn alloc(&mut self, domain: &QuiescenceDomain, init: T) -> NonNull<T> {
        self.scavenge(domain);
        match self.free.pop() {
            Some(ptr) => {
                drop(unsafe { std::ptr::replace(ptr.as_ptr(), init) });
                ptr
            }
            None => unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(init))) },
        }
    }

    /// Defers `ptr` until every section active at `stamp` has exited.
    ///
    /// # Safety
    ///
    /// `ptr` must originate from this cache (or a `Box<T>`), and once its
    /// stamp ages past the grace boundary no thread may touch it again.
    pub unsafe fn retire(&mut self, ptr: NonNull<T>, stamp: u64) {
        self.limbo.push_back(Retired { ptr, stamp });
    }

    fn scavenge(&mut self, domain: &QuiescenceDomain) {
        let boundary = domain.grace_boundary();
        while self.limbo.front().map_or(false, |r| r.stamp < boundary) {
            if let Some(r) = self.limbo.pop_front() {
                self.free.push(r.ptr);
            }
        }
    }
}

impl<T> Default for LocalCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LocalCache<T> {
    fn drop(&mut self) {
        // At teardown no section can still hold a retired block.
        for ptr in self
            .free
            .drain(..)
            .chain(self.limbo.drain(..).map(|r| r.ptr))
        {
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_open_with_no_sections() {
        let domain = QuiescenceDomain::new(2);
        assert_eq!(domain.grace_boundary(), QUIESCENT);
    }

    #[test]
    fn boundary_tracks_oldest_active_section() {
        let domain = QuiescenceDomain::new(2);
        domain.enter(0);
        let boundary = domain.grace_boundary();
        assert!(boundary < QUIESCENT);
        domain.enter(1);
        // Thread 0 entered first, so it still bounds the grace period.
        assert_eq!(domain.grace_boundary(), boundary);
        domain.exit(0);
        assert!(domain.grace_boundary() >= boundary);
        domain.exit(1);
        assert_eq!(domain.grace_boundary(), QUIESCENT);
    }

    #[test]
    fn blocks_recycle_only_after_grace() {
        let domain = QuiescenceDomain::new(1);
        let mut cache = LocalCache::new();

        let first = cache.alloc(&domain, 7u64);
        domain.enter(0);
        let stamp = plat::tsc();
        unsafe { cache.retire(first, stamp) };

        // An active section from before the retirement holds the block in
        // limbo, so this allocation must grow instead of recycling.
        let second = cache.alloc(&domain, 8u64);
        assert_ne!(first, second);

        domain.exit(0);
        let third = cache.alloc(&domain, 9u64);
        assert_eq!(first, third);

        unsafe {
            cache.retire(second, plat::tsc());
            cache.retire(third, plat::tsc());
        }
    }

    #[test]
    fn prefill_feeds_allocation() {
        let domain = QuiescenceDomain::new(1);
        let mut cache = LocalCache::new();
        cache.prefill(4, || 0u64);
        let a = cache.alloc(&domain, 1);
        let b = cache.alloc(&domain, 2);
        assert_ne!(a, b);
        unsafe {
            cache.retire(a, plat::tsc());
            cache.retire(b, plat::tsc());
        }
    }
}
