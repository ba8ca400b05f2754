//! Reader-writer spinlock: a writer flag plus a shared reader count.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

use super::Scheme;

/// Writer-preference reader-writer spinlock. Readers announce themselves on
/// one shared counter and back out if a writer slipped in between the check
/// and the increment; a writer sets its flag and drains the reader count.
pub struct Rwlock {
    writer: CachePadded<AtomicU32>,
    n_readers: CachePadded<AtomicU32>,
}

impl Rwlock {
    fn read_lock(&self) {
        loop {
            while self.writer.load(Ordering::Relaxed) != 0 {
                std::hint::spin_loop();
            }
            self.n_readers.fetch_add(1, Ordering::SeqCst);
            if self.writer.load(Ordering::SeqCst) == 0 {
                return;
            }
            // Lost the race against a writer; retract and wait it out.
            self.n_readers.fetch_sub(1, Ordering::Release);
        }
    }

    fn read_unlock(&self) {
        self.n_readers.fetch_sub(1, Ordering::Release);
    }

    fn write_lock(&self) {
        while self
            .writer
            .compare_exchange_weak(0, 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        while self.n_readers.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
        }
    }

    fn write_unlock(&self) {
        self.writer.store(0, Ordering::Release);
    }
}

impl Scheme for Rwlock {
    type Handle = ();

    fn global_init(_threads: usize) -> Self {
        Self {
            writer: CachePadded::new(AtomicU32::new(0)),
            n_readers: CachePadded::new(AtomicU32::new(0)),
        }
    }

    fn thread_init(&self, _tid: usize) -> Self::Handle {}

    #[inline]
    fn enter_read(&self, _handle: &mut Self::Handle) {
        self.read_lock();
    }

    #[inline]
    fn exit_read(&self, _handle: &mut Self::Handle) {
        self.read_unlock();
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
    use super::Rwlock;

    #[test]
    fn writers_are_mutually_exclusive() {
        tests::exclusion_smoke::<Rwlock>(4, 10_000);
    }

    #[test]
    fn readers_never_observe_writers() {
        tests::rw_consistency_smoke::<Rwlock>(4, 20_000);
    }

    #[test]
    fn read_side_is_shared() {
        // A second acquisition from the same thread would deadlock if the
        // read side were exclusive.
        let scheme = Rwlock::global_init(1);
        let mut handle = scheme.thread_init(0);
        scheme.enter_read(&mut handle);
        scheme.enter_read(&mut handle);
        scheme.exit_read(&mut handle);
        scheme.exit_read(&mut handle);
    }
}
