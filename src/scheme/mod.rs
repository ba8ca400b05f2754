//! The concurrency schemes under test.
//!
//! A scheme brackets read and update critical sections behind four
//! operations; the driver times the brackets and is agnostic to what they
//! do. Exactly one scheme is active per run, dispatched statically.

pub mod brlock;
pub mod epoch;
pub mod list;
pub mod mcs;
pub mod nop;
pub mod quiescence;
pub mod rcu;
pub mod rwlock;
pub mod slab;
pub mod spin;

pub use brlock::Brlock;
pub use epoch::Epoch;
pub use list::LockedList;
pub use mcs::Mcs;
pub use nop::Nop;
pub use rcu::Rcu;
pub use rwlock::Rwlock;
pub use slab::Slab;
pub use spin::Spin;

/// One synchronization discipline under test.
///
/// `global_init` runs once before workers start; `thread_init` runs once per
/// worker, which only ever uses its own `tid` slot. The bracket pairs are
/// issued back to back by the driver, so any per-op work a scheme wants
/// measured happens inside them.
pub trait Scheme: Sized + Sync {
    type Handle;

    fn global_init(threads: usize) -> Self;

    fn thread_init(&self, tid: usize) -> Self::Handle;

    fn enter_read(&self, handle: &mut Self::Handle);

    fn exit_read(&self, handle: &mut Self::Handle);

    fn enter_update(&self, handle: &mut Self::Handle);

    fn exit_update(&self, handle: &mut Self::Handle);
}
