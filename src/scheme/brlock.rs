//! Big-reader lock: one flag slot per registered reader, writers scan all.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

use super::Scheme;
use crate::plat::PagePadded;

/// Reader-biased lock. Each registered reader owns a page-padded slot it
/// flips on entry, so uncontended reads touch no shared line; a writer takes
/// the writer word and then waits for every reader slot to clear.
pub struct Brlock {
    writer: CachePadded<AtomicU32>,
    readers: Box<[PagePadded<AtomicU32>]>,
}

impl Brlock {
    fn read_lock(&self, tid: usize) {
        let slot = &*self.readers[tid];
        loop {
            while self.writer.load(Ordering::Relaxed) != 0 {
                std::hint::spin_loop();
            }
            slot.store(1, Ordering::SeqCst);
            if self.writer.load(Ordering::SeqCst) == 0 {
                return;
            }
            // A writer won the race; retract the claim while it runs.
            slot.store(0, Ordering::Release);
        }
    }

    fn read_unlock(&self, tid: usize) {
        self.readers[tid].store(0, Ordering::Release);
    }

    fn write_lock(&self) {
        while self
            .writer
            .compare_exchange_weak(0, 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        for slot in self.readers.iter() {
            while slot.load(Ordering::SeqCst) != 0 {
                std::hint::spin_loop();
            }
        }
    }

    fn write_unlock(&self) {
        self.writer.store(0, Ordering::Release);
    }
}

impl Scheme for Brlock {
    type Handle = usize;

    fn global_init(threads: usize) -> Self {
        Self {
            writer: CachePadded::new(AtomicU32::new(0)),
            readers: (0..threads)
                .map(|_| PagePadded::new(AtomicU32::new(0)))
                .collect(),
        }
    }

    fn thread_init(&self, tid: usize) -> Self::Handle {
        tid
    }

    #[inline]
    fn enter_read(&self, handle: &mut Self::Handle) {
        self.read_lock(*handle);
    }

    #[inline]
    fn exit_read(&self, handle: &mut Self::Handle) {
        self.read_unlock(*handle);
    }

    #[inline]
    fn enter_update(&self, _handle: &mut Self::Handle) {
        self.write_lock();
    }

    #[inline]
    fn exit_update(&self, _handle: &mut Self::Handle) {
        self.write_unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests;
    use super::super::Scheme;
    use super::Brlock;

    #[test]
    fn writers_are_mutually_exclusive() {
        tests::exclusion_smoke::<Brlock>(4, 10_000);
    }

    #[test]
    fn readers_never_observe_writers() {
        tests::rw_consistency_smoke::<Brlock>(4, 20_000);
    }

    #[test]
    fn reader_slots_are_independent() {
        let scheme = Brlock::global_init(2);
        let mut first = scheme.thread_init(0);
        let mut second = scheme.thread_init(1);
        scheme.enter_read(&mut first);
        scheme.enter_read(&mut second);
        scheme.exit_read(&mut second);
        scheme.exit_read(&mut first);
    }
}
