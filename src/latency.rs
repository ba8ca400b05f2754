//! Thread-0 latency log and its order statistics.

/// Per-op cycle samples for one thread's share of the trace.
///
/// Reads fill from the front, updates from the back, so after the run the
/// two regions sort independently without a partition pass. Capacity is the
/// thread's exact op share; overflow means the trace partitioning is broken
/// and aborts.
pub struct LatencyLog {
    samples: Box<[u64]>,
    n_read: usize,
    n_update: usize,
}

impl LatencyLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity].into_boxed_slice(),
            n_read: 0,
            n_update: 0,
        }
    }

    #[inline]
    pub fn record_read(&mut self, cost: u64) {
        assert!(
            self.n_read + self.n_update < self.samples.len(),
            "latency log overflow"
        );
        self.samples[self.n_read] = cost;
        self.n_read += 1;
    }

    #[inline]
    pub fn record_update(&mut self, cost: u64) {
        assert!(
            self.n_read + self.n_update < self.samples.len(),
            "latency log overflow"
        );
        self.n_update += 1;
        let at = self.samples.len() - self.n_update;
        self.samples[at] = cost;
    }

    /// 99th-percentile read cost, 0 if no reads were sampled. Sorts the
    /// read region in place.
    pub fn read_p99(&mut self) -> u64 {
        if self.n_read == 0 {
            return 0;
        }
        let region = &mut self.samples[..self.n_read];
        region.sort_unstable();
        region[(self.n_read - self.n_read / 100).min(self.n_read - 1)]
    }

    /// 99th-percentile update cost, 0 if no updates were sampled. Sorts the
    /// update region in place.
    pub fn update_p99(&mut self) -> u64 {
        if self.n_update == 0 {
            return 0;
        }
        let start = self.samples.len() - self.n_update;
        let region = &mut self.samples[start..];
        region.sort_unstable();
        region[self.n_update - 1 - self.n_update / 100]
    }

    pub fn n_read(&self) -> usize {
        self.n_read
    }

    pub fn n_update(&self) -> usize {
        self.n_update
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn empty_regions_report_zero() {
        let mut log = LatencyLog::new(16);
        assert_eq!(log.read_p99(), 0);
        assert_eq!(log.update_p99(), 0);
    }

    #[test]
    fn read_rank_is_count_minus_hundredth() {
        let mut log = LatencyLog::new(1000);
        // A permutation of 0..1000, so ranks map to values directly.
        for i in 0..1000u64 {
            log.record_read((i * 379) % 1000);
        }
        assert_eq!(log.read_p99(), 990);
    }

    #[test]
    fn update_rank_counts_from_the_back() {
        let mut log = LatencyLog::new(1000);
        for i in 0..1000u64 {
            log.record_update((i * 379) % 1000);
        }
        assert_eq!(log.update_p99(), 989);
    }

    #[test]
    fn small_read_sample_reports_max() {
        let mut log = LatencyLog::new(64);
        for i in 0..50u64 {
            log.record_read(i);
        }
        assert_eq!(log.read_p99(), 49);
    }

    #[test]
    fn regions_fill_toward_each_other() {
        let mut log = LatencyLog::new(10);
        for v in [3, 1, 6, 2, 5, 4] {
            log.record_read(v);
        }
        for v in [104, 101, 103, 102] {
            log.record_update(v);
        }
        assert_eq!(log.n_read(), 6);
        assert_eq!(log.n_update(), 4);
        assert_eq!(log.read_p99(), 6);
        assert_eq!(log.update_p99(), 104);
    }

    #[test]
    fn p99_bounded_by_extremes() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut log = LatencyLog::new(4096);
        let mut lo = u64::MAX;
        let mut hi = 0;
        for _ in 0..3000 {
            let v = rng.gen_range(10..10_000);
            lo = lo.min(v);
            hi = hi.max(v);
            log.record_read(v);
        }
        let p99 = log.read_p99();
        assert!(lo <= p99 && p99 <= hi);
    }

    #[test]
    #[should_panic(expected = "latency log overflow")]
    fn overflow_aborts() {
        let mut log = LatencyLog::new(2);
        log.record_read(1);
        log.record_update(2);
        log.record_read(3);
    }
}
