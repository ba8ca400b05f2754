//! Grace-period reclamation in the userspace-RCU style.

use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Mutex;

use crossbeam_utils::CachePadded;

use super::Scheme;
use crate::plat::PagePadded;

/// Global grace-period counter plus one page-padded snapshot slot per
/// reader.
///
/// The counter stays even. An active reader parks `snapshot + 1` (odd) in
/// its slot, so a writer that bumped the counter to `target` can tell
/// pre-bump readers (slot below `target`) from readers that entered after
/// the bump.
pub struct Rcu {
    gp: CachePadded<AtomicU64>,
    slots: Box<[PagePadded<AtomicU64>]>,
    sync: Mutex<()>,
}

impl Rcu {
    fn read_lock(&self, tid: usize) {
        let snap = self.gp.load(Ordering::Relaxed);
        self.slots[tid].store(snap + 1, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    fn read_unlock(&self, tid: usize) {
        self.slots[tid].store(0, Ordering::Release);
    }

    /// Blocks until every reader that was inside a critical section when the
    /// call began has left it. Writers serialize on an internal mutex.
    fn synchronize(&self) {
        let _writers = self.sync.lock().unwrap();
        let target = self.gp.fetch_add(2, Ordering::SeqCst) + 2;
        for slot in self.slots.iter() {
            loop {
                let seen = slot.load(Ordering::Acquire);
                if seen == 0 || seen >= target {
                    break;
                }
                std::hint::spin_loop();
            }
        }
    }
}

impl Scheme for Rcu {
    type Handle = usize;

    fn global_init(threads: usize) -> Self {
        Self {
            gp: CachePadded::new(AtomicU64::new(0)),
            slots: (0..threads)
                .map(|_| PagePadded::new(AtomicU64::new(0)))
                .collect(),
            sync: Mutex::new(()),
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
        self.synchronize();
    }

    #[inline]
    fn exit_update(&self, _handle: &mut Self::Handle) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    use crossbeam_utils::thread;

    use super::super::tests;
    use super::super::Scheme;
    use super::Rcu;

    #[test]
    fn mixed_brackets_complete() {
        tests::bracket_smoke::<Rcu>(4, 2_000);
    }

    #[test]
    fn synchronize_waits_for_active_reader() {
        let scheme = Rcu::global_init(2);
        let entered = AtomicBool::new(false);
        let written = AtomicU64::new(0);
        thread::scope(|s| {
            s.spawn(|_| {
                let mut handle = scheme.thread_init(0);
                scheme.enter_read(&mut handle);
                entered.store(true, Ordering::Release);
                std::thread::sleep(Duration::from_millis(50));
                written.store(1, Ordering::Release);
                scheme.exit_read(&mut handle);
            });
            s.spawn(|_| {
                let mut handle = scheme.thread_init(1);
                while !entered.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                scheme.enter_update(&mut handle);
                scheme.exit_update(&mut handle);
                assert_eq!(written.load(Ordering::Acquire), 1);
            });
        })
        .unwrap();
    }

    #[test]
    fn synchronize_with_no_readers_returns() {
        let scheme = Rcu::global_init(1);
        let mut handle = scheme.thread_init(0);
        scheme.enter_update(&mut handle);
        scheme.exit_update(&mut handle);
        scheme.enter_read(&mut handle);
        scheme.exit_read(&mut handle);
    }
}
