//! Epoch-based reclamation on the crossbeam collector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_epoch::{Collector, Guard, LocalHandle};

use super::Scheme;

/// Each run owns a private collector rather than the process-global one, so
/// epoch advancement is driven only by the threads under measurement.
pub struct Epoch {
    collector: Collector,
}

pub struct EpochHandle {
    guard: Option<Guard>,
    local: LocalHandle,
    synced: Arc<AtomicBool>,
}

impl Scheme for Epoch {
    type Handle = EpochHandle;

    fn global_init(_threads: usize) -> Self {
        Self {
            collector: Collector::new(),
        }
    }

    fn thread_init(&self, _tid: usize) -> Self::Handle {
        EpochHandle {
            guard: None,
            local: self.collector.register(),
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    fn enter_read(&self, handle: &mut Self::Handle) {
        handle.guard = Some(handle.local.pin());
    }

    #[inline]
    fn exit_read(&self, handle: &mut Self::Handle) {
        handle.guard = None;
    }

    /// Synchronize-and-reclaim: defers a marker behind the current epoch,
    /// then repeatedly repins and flushes to help the collector advance
    /// until the marker has executed. Once it has, every reader that was
    /// pinned when the call began has unpinned.
    fn enter_update(&self, handle: &mut Self::Handle) {
        handle.synced.store(false, Ordering::Relaxed);
        let synced = Arc::clone(&handle.synced);
        let guard = handle.local.pin();
        guard.defer(move || synced.store(true, Ordering::Release));
        guard.flush();
        drop(guard);
        while !handle.synced.load(Ordering::Acquire) {
            handle.local.pin().flush();
            std::hint::spin_loop();
        }
    }

    #[inline]
    fn exit_update(&self, _handle: &mut Self::Handle) {}
}
