//! The per-thread measurement loop.

use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Barrier;

use crossbeam_utils::CachePadded;

use crate::latency::LatencyLog;
use crate::plat;
use crate::scheme::Scheme;
use crate::trace::{OpKind, Trace};

/// Per-thread mean costs, written once after the closing barrier and read
/// by the coordinator once the workers are joined.
#[derive(Default)]
pub struct ResultSlot {
    pub mean_read: AtomicU64,
    pub mean_update: AtomicU64,
}

/// Everything the workers of one run share.
pub struct BenchContext<'a, S: Scheme> {
    pub scheme: &'a S,
    pub trace: &'a Trace,
    pub threads: usize,
    pub barrier: Barrier,
    pub results: Box<[CachePadded<ResultSlot>]>,
}

impl<'a, S: Scheme> BenchContext<'a, S> {
    pub fn new(scheme: &'a S, trace: &'a Trace, threads: usize) -> Self {
        Self {
            scheme,
            trace,
            threads,
            barrier: Barrier::new(threads),
            results: (0..threads)
                .map(|_| CachePadded::new(ResultSlot::default()))
                .collect(),
        }
    }
}

/// Replays this thread's share of the trace, timing every op in cycles.
///
/// The timed loop sits strictly between the two barriers, so no thread
/// measures a peer's setup or teardown. Thread 0 passes its latency log;
/// the log capacity must cover the whole share.
pub fn worker<S: Scheme>(ctx: &BenchContext<'_, S>, tid: usize, mut log: Option<&mut LatencyLog>) {
    if let Err(err) = plat::pin_to_core(tid) {
        eprintln!("cannot pin thread {} to a core: {}", tid, err);
        process::exit(1);
    }
    let mut handle = ctx.scheme.thread_init(tid);

    let mut read_cycles = 0u64;
    let mut update_cycles = 0u64;
    let mut n_read = 0u64;
    let mut n_update = 0u64;
    let mut max = 0u64;

    ctx.barrier.wait();
    let wall_start = plat::tsc();
    for op in ctx.trace.assigned(tid, ctx.threads) {
        let begin = plat::tsc();
        match op {
            OpKind::Read => {
                ctx.scheme.enter_read(&mut handle);
                ctx.scheme.exit_read(&mut handle);
            }
            OpKind::Update => {
                ctx.scheme.enter_update(&mut handle);
                ctx.scheme.exit_update(&mut handle);
            }
        }
        let cost = plat::tsc() - begin;
        match op {
            OpKind::Read => {
                read_cycles += cost;
                n_read += 1;
                if let Some(log) = log.as_deref_mut() {
                    log.record_read(cost);
                }
            }
            OpKind::Update => {
                update_cycles += cost;
                n_update += 1;
                if let Some(log) = log.as_deref_mut() {
                    log.record_update(cost);
                }
            }
        }
        if cost > max {
            max = cost;
        }
    }
    let wall = plat::tsc() - wall_start;
    ctx.barrier.wait();

    let total = n_read + n_update;
    let overall = if total == 0 { 0 } else { wall / total };
    let mean_read = if n_read == 0 { 0 } else { read_cycles / n_read };
    let mean_update = if n_update == 0 { 0 } else { update_cycles / n_update };
    println!(
        "Thd {}: tot {} ops (r {}, u {}) done, {} (r {}, w {}) cycles per op, max {}",
        tid, total, n_read, n_update, overall, mean_read, mean_update, max
    );
    ctx.results[tid].mean_read.store(mean_read, Ordering::Relaxed);
    ctx.results[tid].mean_update.store(mean_update, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::scheme::Nop;

    #[test]
    fn worker_accounts_every_assigned_op() {
        let scheme = Nop::global_init(1);
        let mut rng = StdRng::seed_from_u64(3);
        let trace = Trace::generate_with(&mut rng, 512, 25);
        let ctx = BenchContext::new(&scheme, &trace, 1);
        let mut log = LatencyLog::new(trace.len());
        worker(&ctx, 0, Some(&mut log));
        assert_eq!(log.n_read(), trace.n_read());
        assert_eq!(log.n_update(), trace.n_update());
    }

    #[test]
    fn every_worker_fills_its_result_slot() {
        let scheme = Nop::global_init(2);
        let mut rng = StdRng::seed_from_u64(9);
        let trace = Trace::generate_with(&mut rng, 400, 50);
        let ctx = BenchContext::new(&scheme, &trace, 2);
        for slot in ctx.results.iter() {
            slot.mean_read.store(u64::MAX, Ordering::Relaxed);
            slot.mean_update.store(u64::MAX, Ordering::Relaxed);
        }
        crossbeam_utils::thread::scope(|s| {
            let ctx = &ctx;
            for tid in 0..2 {
                s.spawn(move |_| worker(ctx, tid, None));
            }
        })
        .unwrap();
        for slot in ctx.results.iter() {
            assert_ne!(slot.mean_read.load(Ordering::Relaxed), u64::MAX);
            assert_ne!(slot.mean_update.load(Ordering::Relaxed), u64::MAX);
        }
    }

    #[test]
    fn result_slots_occupy_whole_cache_lines() {
        assert!(std::mem::size_of::<CachePadded<ResultSlot>>() >= plat::CACHE_LINE);
        assert!(std::mem::align_of::<CachePadded<ResultSlot>>() >= plat::CACHE_LINE);
    }
}
