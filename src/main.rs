use sync_latency_bench::config::{self, SchemeKind};
use sync_latency_bench::coordinator;
use sync_latency_bench::scheme::{Brlock, Epoch, LockedList, Mcs, Nop, Rcu, Rwlock, Slab, Spin};

fn main() {
    let (config, writer) = config::setup();
    println!("{}", config);
    let summary = match config.scheme {
        SchemeKind::Nop => coordinator::run::<Nop>(&config),
        SchemeKind::Spin => coordinator::run::<Spin>(&config),
        SchemeKind::Mcs => coordinator::run::<Mcs>(&config),
        SchemeKind::Rwlock => coordinator::run::<Rwlock>(&config),
        SchemeKind::Brlock => coordinator::run::<Brlock>(&config),
        SchemeKind::Rcu => coordinator::run::<Rcu>(&config),
        SchemeKind::Epoch => coordinator::run::<Epoch>(&config),
        SchemeKind::Slab => coordinator::run::<Slab>(&config),
        SchemeKind::List => coordinator::run::<LockedList>(&config),
    };
    writer.write_record(&config, &summary);
}
