//! MCS queue lock: contended acquirers spin on their own queue node.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use super::Scheme;
use crate::plat::PagePadded;

/// Per-acquirer queue node. A node serves at most one acquisition at a time
/// and must stay in place until the matching `unlock` returns.
#[derive(Debug)]
pub struct McsNode {
    locked: AtomicBool,
    next: AtomicPtr<McsNode>,
}

impl McsNode {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl Default for McsNode {
    fn default() -> Self {
        Self::new()
    }
}

/// The lock word is the queue tail; null means free.
#[derive(Debug)]
pub struct McsLock {
    tail: CachePadded<AtomicPtr<McsNode>>,
}

impl McsLock {
    pub const fn new() -> Self {
        Self {
            tail: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// # Safety
    ///
    /// `node` must stay valid and serve no other acquisition until the
    /// matching [`unlock`](Self::unlock).
    pub unsafe fn lock(&self, node: *mut McsNode) {
        (*node).next.store(ptr::null_mut(), Ordering::Relaxed);
        let prev = self.tail.swap(node, Ordering::AcqRel);
        if prev.is_null() {
            return;
        }
        // Arm the wait flag before publishing the link; the predecessor
        // clears it when it unlocks.
        (*node).locked.store(true, Ordering::Relaxed);
        (*prev).next.store(node, Ordering::Release);
        while (*node).locked.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }
    }

    /// Acquires only if the queue is empty.
    ///
    /// # Safety
    ///
    /// Same contract as [`lock`](Self::lock).
    pub unsafe fn try_lock(&self, node: *mut McsNode) -> bool {
        (*node).next.store(ptr::null_mut(), Ordering::Relaxed);
        self.tail
            .compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// # Safety
    ///
    /// `node` must be the node that acquired the lock being released.
    pub unsafe fn unlock(&self, node: *mut McsNode) {
        let mut next = (*node).next.load(Ordering::Acquire);
        if next.is_null() {
            if self
                .tail
                .compare_exchange(node, ptr::null_mut(), Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            // A successor already swapped itself onto the tail but has not
            // linked itself yet.
            loop {
                next = (*node).next.load(Ordering::Acquire);
                if !next.is_null() {
                    break;
                }
                std::hint::spin_loop();
            }
        }
        (*next).locked.store(false, Ordering::Release);
    }
}

impl Default for McsLock {
    fn default() -> Self {
        Self::new()
    }
}

/// One process-wide MCS lock taken exclusively for reads and updates, with a
/// page-padded queue node per thread.
pub struct Mcs {
    lock: McsLock,
    nodes: Box<[PagePadded<McsNode>]>,
}

impl Scheme for Mcs {
    type Handle = *mut McsNode;

    fn global_init(threads: usize) -> Self {
        let nodes = (0..threads)
            .map(|_| PagePadded::new(McsNode::new()))
            .collect();
        Self {
            lock: McsLock::new(),
            nodes,
        }
    }

    fn thread_init(&self, tid: usize) -> Self::Handle {
        &*self.nodes[tid] as *const McsNode as *mut McsNode
    }

    #[inline]
    fn enter_read(&self, handle: &mut Self::Handle) {
        unsafe { self.lock.lock(*handle) };
    }

    #[inline]
    fn exit_read(&self, handle: &mut Self::Handle) {
        unsafe { self.lock.unlock(*handle) };
    }

    #[inline]
    fn enter_update(&self, handle: &mut Self::Handle) {
        unsafe { self.lock.lock(*handle) };
    }

    #[inline]
    fn exit_update(&self, handle: &mut Self::Handle) {
        unsafe { self.lock.unlock(*handle) };
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests;
    use super::{Mcs, McsLock, McsNode};

    #[test]
    fn updates_are_mutually_exclusive() {
        tests::exclusion_smoke::<Mcs>(4, 10_000);
    }

    #[test]
    fn mixed_brackets_complete() {
        tests::bracket_smoke::<Mcs>(4, 10_000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = McsLock::new();
        let mut a = McsNode::new();
        let mut b = McsNode::new();
        unsafe {
            assert!(lock.try_lock(&mut a));
            assert!(!lock.try_lock(&mut b));
            lock.unlock(&mut a);
            assert!(lock.try_lock(&mut b));
            lock.unlock(&mut b);
        }
    }
}
