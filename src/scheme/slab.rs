//! Quiescent-state slab: updates cycle fixed-size blocks through the grace
//! period.

use std::ptr::NonNull;

use super::quiescence::{LocalCache, QuiescenceDomain};
use super::Scheme;
use crate::plat;

/// Blocks the initial pool is seeded with, per thread.
const BLOCK_PREFILL: usize = 512;

/// A cache-line-sized allocation unit.
#[repr(align(64))]
pub struct Block([u8; 64]);

impl Default for Block {
    fn default() -> Self {
        Self([0; 64])
    }
}

/// Readers mark quiescence sections. Each update retires the thread's held
/// block and allocates a replacement; the allocation runs the grace check,
/// so a free/alloc pair is what forces the reclamation pass.
pub struct Slab {
    domain: QuiescenceDomain,
}

pub struct SlabHandle {
    tid: usize,
    cache: LocalCache<Block>,
    held: NonNull<Block>,
}

impl Drop for SlabHandle {
    fn drop(&mut self) {
        // The held block is thread-private scratch, never published.
        drop(unsafe { Box::from_raw(self.held.as_ptr()) });
    }
}

impl Scheme for Slab {
    type Handle = SlabHandle;

    fn global_init(threads: usize) -> Self {
        Self {
            domain: QuiescenceDomain::new(threads),
        }
    }

    fn thread_init(&self, tid: usize) -> Self::Handle {
        let mut cache = LocalCache::new();
        cache.prefill(BLOCK_PREFILL, Block::default);
        let held = cache.alloc(&self.domain, Block::default());
        SlabHandle { tid, cache, held }
    }

    #[inline]
    fn enter_read(&self, handle: &mut Self::Handle) {
        self.domain.enter(handle.tid);
    }

    #[inline]
    fn exit_read(&self, handle: &mut Self::Handle) {
        self.domain.exit(handle.tid);
    }

    #[inline]
    fn enter_update(&self, handle: &mut Self::Handle) {
        let stamp = plat::tsc();
        unsafe { handle.cache.retire(handle.held, stamp) };
        handle.held = handle.cache.alloc(&self.domain, Block::default());
    }

    #[inline]
    fn exit_update(&self, _handle: &mut Self::Handle) {}
}

#[cfg(test)]
mod tests {
    use super::super::tests;
    use super::super::Scheme;
    use super::Slab;

    #[test]
    fn mixed_brackets_complete() {
        tests::bracket_smoke::<Slab>(4, 2_000);
    }

    #[test]
    fn quiet_update_recycles_its_own_block() {
        let scheme = Slab::global_init(1);
        let mut handle = scheme.thread_init(0);
        let first = handle.held;
        scheme.enter_update(&mut handle);
        scheme.exit_update(&mut handle);
        assert_eq!(handle.held, first);
    }

    #[test]
    fn active_reader_blocks_recycling() {
        let scheme = Slab::global_init(2);
        let mut reader = scheme.thread_init(0);
        let mut updater = scheme.thread_init(1);

        scheme.enter_read(&mut reader);
        let blocked = updater.held;
        scheme.enter_update(&mut updater);
        scheme.exit_update(&mut updater);
        // The reader entered before the block was retired, so the block may
        // not come back yet.
        assert_ne!(updater.held, blocked);
        scheme.exit_read(&mut reader);

        let second = updater.held;
        scheme.enter_update(&mut updater);
        scheme.exit_update(&mut updater);
        assert_eq!(updater.held, second);
    }
}
