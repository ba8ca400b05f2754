//! Replayable read/update workload traces.

use std::fs;
use std::io;
use std::mem::ManuallyDrop;
use std::path::Path;
use std::process;

use rand::Rng;

use crate::plat;

/// One operation of the replayed workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpKind {
    Read = 0,
    Update = 1,
}

/// A fixed operation sequence, shared read-only by all workers.
///
/// Thread `t` of `P` consumes the interleaved slice `t, t+P, t+2P, ...`
/// rather than a contiguous chunk, so every thread sees the same
/// read/update mix.
pub struct Trace {
    ops: Vec<OpKind>,
    n_read: usize,
    n_update: usize,
}

impl Trace {
    /// Generates a fresh trace where each op is an update with probability
    /// `update_percent / 100`.
    pub fn generate(count: usize, update_percent: u32) -> Self {
        Self::generate_with(&mut rand::thread_rng(), count, update_percent)
    }

    pub fn generate_with<R: Rng>(rng: &mut R, count: usize, update_percent: u32) -> Self {
        let mut n_update = 0;
        let ops = (0..count)
            .map(|_| {
                if rng.gen_range(0..100u32) < update_percent {
                    n_update += 1;
                    OpKind::Update
                } else {
                    OpKind::Read
                }
            })
            .collect();
        Self {
            ops,
            n_read: count - n_update,
            n_update,
        }
    }

    /// Writes the trace as one symbolic byte per op (`R` / `U`).
    pub fn persist(&self, path: &Path) -> io::Result<()> {
        let bytes: Vec<u8> = self
            .ops
            .iter()
            .map(|op| match op {
                OpKind::Read => b'R',
                OpKind::Update => b'U',
            })
            .collect();
        fs::write(path, bytes)
    }

    /// Loads the persisted trace at `path`, generating and persisting one
    /// first if the file does not exist.
    ///
    /// The backing buffer is locked into physical memory so the timed loop
    /// never takes a page fault on it. Any setup failure (unreadable or
    /// short file, failed lock) is fatal.
    pub fn load_or_generate(path: &Path, count: usize, update_percent: u32) -> Self {
        if !path.exists() {
            let fresh = Self::generate(count, update_percent);
            if let Err(err) = fresh.persist(path) {
                eprintln!("cannot persist trace {}: {}", path.display(), err);
                process::exit(1);
            }
        }
        let mut bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("cannot read trace {}: {}", path.display(), err);
                process::exit(1);
            }
        };
        if bytes.len() < count {
            eprintln!(
                "trace {} holds {} ops, {} requested",
                path.display(),
                bytes.len(),
                count
            );
            process::exit(1);
        }
        bytes.truncate(count);
        if let Err(err) = plat::lock_memory(bytes.as_ptr(), bytes.len()) {
            eprintln!("cannot lock trace memory: {}", err);
            process::exit(1);
        }
        let trace = Self::decode(bytes);
        println!(
            "Trace: read {}, update {}, total {}",
            trace.n_read,
            trace.n_update,
            trace.len()
        );
        trace
    }

    /// Rewrites the symbolic bytes into `OpKind` discriminants in place and
    /// reuses the (locked) buffer as the op vector.
    fn decode(mut bytes: Vec<u8>) -> Self {
        let mut n_update = 0;
        for b in bytes.iter_mut() {
            match *b {
                b'R' => *b = OpKind::Read as u8,
                b'U' => {
                    *b = OpKind::Update as u8;
                    n_update += 1;
                }
                other => panic!("corrupt trace symbol {:#04x}", other),
            }
        }
        let n_read = bytes.len() - n_update;
        // Every byte now holds a valid `OpKind` discriminant, and `OpKind`
        // is `repr(u8)`, so the buffer can be retyped without copying.
        let ops = unsafe {
            let mut bytes = ManuallyDrop::new(bytes);
            Vec::from_raw_parts(bytes.as_mut_ptr().cast::<OpKind>(), bytes.len(), bytes.capacity())
        };
        Self {
            ops,
            n_read,
            n_update,
        }
    }

    /// The ops assigned to `tid` under interleaved partitioning.
    pub fn assigned(&self, tid: usize, threads: usize) -> impl Iterator<Item = OpKind> + '_ {
        self.ops.iter().skip(tid).step_by(threads).copied()
    }

    pub fn ops(&self) -> &[OpKind] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn n_read(&self) -> usize {
        self.n_read
    }

    pub fn n_update(&self) -> usize {
        self.n_update
    }
}
