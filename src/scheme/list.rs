//! Hand-over-hand locked list with quiescence-based node reclamation.
//!
//! The list is split into fixed per-thread partitions: thread `t` owns the
//! two adjacent nodes at positions `2t` and `2t + 1`. Reads traverse the
//! whole list inside a quiescence section. An update locks the first owned
//! node, unlinks the second, splices in a freshly allocated replacement and
//! retires the old node, so the list length never changes.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use super::mcs::{McsLock, McsNode};
use super::quiescence::{LocalCache, QuiescenceDomain};
use super::Scheme;
use crate::plat;

pub const LIST_LEN: usize = 100;
pub const NODES_PER_THREAD: usize = 2;

// Spaced four lines apart to keep the prefetcher off neighbouring locks.
#[repr(align(256))]
struct ListNode {
    lock: McsLock,
    owner: usize,
    next: AtomicPtr<ListNode>,
}

impl ListNode {
    fn new(owner: usize) -> Self {
        Self {
            lock: McsLock::new(),
            owner,
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

pub struct LockedList {
    head: AtomicPtr<ListNode>,
    domain: QuiescenceDomain,
}

pub struct ListHandle {
    tid: usize,
    cache: LocalCache<ListNode>,
    anchor_ctx: CachePadded<McsNode>,
    victim_ctx: CachePadded<McsNode>,
}

impl LockedList {
    /// Walks the list inside an open section and checks nothing went
    /// missing mid-splice.
    fn traverse(&self) {
        let mut count = 0;
        let mut cur = self.head.load(Ordering::Acquire);
        // Unlinked nodes stay live until every section open at unlink time
        // has closed, so every pointer read here dereferences safely.
        while !cur.is_null() {
            count += 1;
            cur = unsafe { (*cur).next.load(Ordering::Acquire) };
        }
        assert_eq!(count, LIST_LEN);
    }

    fn replace_second_owned(&self, handle: &mut ListHandle) {
        let tid = handle.tid;
        let fresh = handle.cache.alloc(&self.domain, ListNode::new(tid));

        let mut cur = self.head.load(Ordering::Acquire);
        for _ in 0..NODES_PER_THREAD * tid {
            cur = unsafe { (*cur).next.load(Ordering::Acquire) };
        }
        let anchor = unsafe { &*cur };

        let anchor_ctx = &mut *handle.anchor_ctx as *mut McsNode;
        let victim_ctx = &mut *handle.victim_ctx as *mut McsNode;

        // Only the owner ever locks these two nodes, so the trylocks cannot
        // fail. There is no retry or rollback path if that partitioning is
        // ever broken.
        assert!(unsafe { anchor.lock.try_lock(anchor_ctx) });

        let removed = anchor.next.load(Ordering::Acquire);
        let victim = unsafe { &*removed };
        assert_eq!(victim.owner, tid);
        assert!(unsafe { victim.lock.try_lock(victim_ctx) });

        unsafe { fresh.as_ref() }
            .next
            .store(victim.next.load(Ordering::Acquire), Ordering::Relaxed);
        anchor.next.store(fresh.as_ptr(), Ordering::Release);

        let stamp = plat::tsc();
        // Unlinked above; concurrent traversals no longer reach it.
        unsafe { handle.cache.retire(NonNull::new_unchecked(removed), stamp) };

        unsafe {
            victim.lock.unlock(victim_ctx);
            anchor.lock.unlock(anchor_ctx);
        }
    }
}

impl Drop for LockedList {
    fn drop(&mut self) {
        let mut cur = self.head.load(Ordering::Relaxed);
        while !cur.is_null() {
            let next = unsafe { (*cur).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(cur) });
            cur = next;
        }
    }
}

impl Scheme for LockedList {
    type Handle = ListHandle;

    fn global_init(threads: usize) -> Self {
        assert!(
            threads * NODES_PER_THREAD <= LIST_LEN,
            "at most {} threads fit the list partition",
            LIST_LEN / NODES_PER_THREAD
        );
        let mut head = ptr::null_mut::<ListNode>();
        for idx in (0..LIST_LEN).rev() {
            let node = Box::into_raw(Box::new(ListNode::new(idx / NODES_PER_THREAD)));
            unsafe { (*node).next.store(head, Ordering::Relaxed) };
            head = node;
        }
        Self {
            head: AtomicPtr::new(head),
            domain: QuiescenceDomain::new(threads),
        }
    }

    fn thread_init(&self, tid: usize) -> Self::Handle {
        let mut cache = LocalCache::new();
        cache.prefill(NODES_PER_THREAD, || ListNode::new(tid));
        ListHandle {
            tid,
            cache,
            anchor_ctx: CachePadded::new(McsNode::new()),
            victim_ctx: CachePadded::new(McsNode::new()),
        }
    }

    fn enter_read(&self, handle: &mut Self::Handle) {
        self.domain.enter(handle.tid);
        self.traverse();
    }

    #[inline]
    fn exit_read(&self, handle: &mut Self::Handle) {
        self.domain.exit(handle.tid);
    }

    fn enter_update(&self, handle: &mut Self::Handle) {
        self.domain.enter(handle.tid);
        self.replace_second_owned(handle);
    }

    #[inline]
    fn exit_update(&self, handle: &mut Self::Handle) {
        self.domain.exit(handle.tid);
    }
}
