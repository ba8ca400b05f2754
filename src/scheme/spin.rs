//! Test-and-set spinlock, taken exclusively for reads and updates alike.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::CachePadded;

use super::Scheme;

pub struct Spin {
    locked: CachePadded<AtomicBool>,
}

impl Spin {
    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Wait on a plain load, retry the exchange once the word reads
            // free.
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

impl Scheme for Spin {
    type Handle = ();

    fn global_init(_threads: usize) -> Self {
        Self {
            locked: CachePadded::new(AtomicBool::new(false)),
        }
    }

    fn thread_init(&self, _tid: usize) -> Self::Handle {}

    #[inline]
    fn enter_read(&self, _handle: &mut Self::Handle) {
        self.lock();
    }

    #[inline]
    fn exit_read(&self, _handle: &mut Self::Handle) {
        self.unlock();
    }

    #[inline]
    fn enter_update(&self, _handle: &mut Self::Handle) {
        self.lock();
    }

    #[inline]
    fn exit_update(&self, _handle: &mut Self::Handle) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests;
    use super::Spin;

    #[test]
    fn updates_are_mutually_exclusive() {
        tests::exclusion_smoke::<Spin>(4, 10_000);
    }

    #[test]
    fn mixed_brackets_complete() {
        tests::bracket_smoke::<Spin>(4, 10_000);
    }
}
