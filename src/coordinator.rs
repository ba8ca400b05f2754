//! Whole-run orchestration: one scheme instance, one trace, `P` pinned
//! workers, then the reduction.

use std::sync::atomic::Ordering;

use crossbeam_utils::thread;

use crate::config::Config;
use crate::latency::LatencyLog;
use crate::runner::{self, BenchContext};
use crate::scheme::Scheme;
use crate::trace::Trace;

/// Reduced figures for one complete run.
///
/// Means average the per-thread means; percentiles come from thread 0's
/// log, whose sampled share is `n_read` + `n_update`.
pub struct Summary {
    pub mean_read: u64,
    pub mean_update: u64,
    pub p99_read: u64,
    pub p99_update: u64,
    pub n_read: usize,
    pub n_update: usize,
}

pub fn run<S: Scheme>(config: &Config) -> Summary {
    let scheme = S::global_init(config.threads);
    let trace = Trace::load_or_generate(&config.trace_path, config.n_ops, config.update_percent);
    let mut log = LatencyLog::new(trace.len().div_ceil(config.threads));

    let ctx = BenchContext::new(&scheme, &trace, config.threads);
    thread::scope(|s| {
        let ctx = &ctx;
        for tid in 1..config.threads {
            s.spawn(move |_| runner::worker(ctx, tid, None));
        }
        let log = &mut log;
        s.spawn(move |_| runner::worker(ctx, 0, Some(log)));
    })
    .unwrap();

    // The joins above order every slot store before these loads.
    let mut read_sum = 0;
    let mut update_sum = 0;
    for slot in ctx.results.iter() {
        read_sum += slot.mean_read.load(Ordering::Relaxed);
        update_sum += slot.mean_update.load(Ordering::Relaxed);
    }
    let mean_read = read_sum / config.threads as u64;
    let mean_update = update_sum / config.threads as u64;
    let p99_read = log.read_p99();
    let p99_update = log.update_p99();

    println!("99p: read {} write {}", p99_read, p99_update);
    println!(
        "Summary: {}, (r {}, w {}) cycles per op",
        config.trace_path.display(),
        mean_read,
        mean_update
    );

    Summary {
        mean_read,
        mean_update,
        p99_read,
        p99_update,
        n_read: log.n_read(),
        n_update: log.n_update(),
    }
}
