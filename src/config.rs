use clap::{value_parser, Arg, ArgAction, Command, ValueEnum};
use csv::Writer;
use std::fmt;
use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;

use crate::coordinator::Summary;

#[derive(PartialEq, Debug, ValueEnum, Clone, Copy)]
pub enum SchemeKind {
    Nop,
    Spin,
    Mcs,
    Rwlock,
    Brlock,
    Rcu,
    Epoch,
    Slab,
    List,
}

pub struct Config {
    pub scheme: SchemeKind,
    pub threads: usize,
    pub n_ops: usize,
    pub update_percent: u32,
    pub trace_path: PathBuf,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} threads, {} ops, u{}",
            self.scheme.to_possible_value().unwrap().get_name(),
            self.threads,
            self.n_ops,
            self.update_percent,
        )
    }
}

pub struct BenchWriter {
    output: Option<Writer<File>>,
}

impl BenchWriter {
    pub fn write_record(self, config: &Config, summary: &Summary) {
        if let Some(mut output) = self.output {
            output
                .write_record(&[
                    config
                        .scheme
                        .to_possible_value()
                        .unwrap()
                        .get_name()
                        .to_string(),
                    config.threads.to_string(),
                    config.n_ops.to_string(),
                    config.update_percent.to_string(),
                    summary.mean_read.to_string(),
                    summary.mean_update.to_string(),
                    summary.p99_read.to_string(),
                    summary.p99_update.to_string(),
                ])
                .unwrap();
            output.flush().unwrap();
        }
    }
}

pub fn setup() -> (Config, BenchWriter) {
    let m = Command::new("sync-latency-bench")
        .arg(
            Arg::new("scheme")
                .short('s')
                .value_parser(value_parser!(SchemeKind))
                .required(true)
                .ignore_case(true)
                .help("Synchronization scheme to measure"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .value_parser(value_parser!(usize))
                .help("Number of threads to run. Defaults to all available cores."),
        )
        .arg(
            Arg::new("total ops")
                .short('n')
                .value_parser(value_parser!(usize))
                .help("Total number of operations replayed across all threads.")
                .default_value("10000000"),
        )
        .arg(
            Arg::new("update rate")
                .short('u')
                .value_parser(value_parser!(u32).range(0..=100))
                .help("Percentage of update operations in the trace.")
                .default_value("90"),
        )
        .arg(
            Arg::new("trace file")
                .short('f')
                .value_parser(value_parser!(PathBuf))
                .help(
                    "Trace file path. Generated with the requested mix if \
                     missing, replayed as-is otherwise.",
                )
                .default_value("/tmp/latency_trace"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .help("Output CSV filename. Appends the data if the file already exists."),
        )
        .arg(
            Arg::new("dry run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Check whether the arguments are parsable, without running a benchmark"),
        )
        .get_matches();

    let scheme = m.get_one::<SchemeKind>("scheme").copied().unwrap();
    let threads = m
        .get_one::<usize>("threads")
        .copied()
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
    let n_ops = m.get_one::<usize>("total ops").copied().unwrap();
    let update_percent = m.get_one::<u32>("update rate").copied().unwrap();
    let trace_path = m.get_one::<PathBuf>("trace file").cloned().unwrap();

    if threads == 0 {
        eprintln!("at least one thread is required");
        process::exit(1);
    }
    if n_ops % threads != 0 {
        eprintln!("{} ops do not split evenly over {} threads", n_ops, threads);
        process::exit(1);
    }

    let output = m.get_one::<String>("output").map(|output_name| {
        let output_path = Path::new(output_name);
        if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir).unwrap();
        }
        match OpenOptions::new().read(true).append(true).open(output_path) {
            Ok(f) => csv::Writer::from_writer(f),
            Err(_) => {
                let f = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(output_path)
                    .unwrap();
                let mut output = csv::Writer::from_writer(f);
                output
                    .write_record([
                        "scheme",
                        "threads",
                        "n_ops",
                        "update_percent",
                        "mean_read",
                        "mean_update",
                        "p99_read",
                        "p99_update",
                    ])
                    .unwrap();
                output.flush().unwrap();
                output
            }
        }
    });

    let config = Config {
        scheme,
        threads,
        n_ops,
        update_percent,
        trace_path,
    };

    if m.get_flag("dry run") {
        process::exit(0);
    }

    (config, BenchWriter { output })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_line_is_compact() {
        let config = Config {
            scheme: SchemeKind::Epoch,
            threads: 8,
            n_ops: 1_000_000,
            update_percent: 90,
            trace_path: "/tmp/trace".into(),
        };
        assert_eq!(config.to_string(), "epoch: 8 threads, 1000000 ops, u90");
    }
}
