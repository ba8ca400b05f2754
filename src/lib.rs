#[cfg(target_os = "linux")]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod config;
pub mod coordinator;
pub mod latency;
pub mod plat;
pub mod runner;
pub mod scheme;
pub mod trace;
