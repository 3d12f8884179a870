//! ringbench driver - runs a randomized benchmark suite and prints CSV.
//!
//! Usage: ringbench-driver [OPTIONS] <throughput|latency> [SUBCOMMAND OPTIONS]
//! Logs go to stderr (`RUST_LOG`, default `info`), stdout carries only CSV.

use std::io::{ self, Write };

use anyhow::{ bail, Context };
use clap::{ Parser, Subcommand, ValueEnum };
use tracing_subscriber::EnvFilter;

use ringbench::{ CsvReport, FanOut, TrialScheduler };

mod suite;

/// Throughput and round-trip latency of bounded queues.
#[derive(Parser, Debug)]
#[command(name = "ringbench-driver", version, about, long_about = None)]
struct Cli {
    /// Trials per variant (at least 100)
    #[arg(short = 'i', long, default_value_t = 100, global = true)]
    iterations: usize,

    /// Messages per trial
    #[arg(short = 'n', long, default_value_t = 1_000_000, global = true)]
    messages: usize,

    /// Ring sizes to measure, powers of two
    #[arg(short = 'r', long = "ring-sizes", value_delimiter = ',', default_values_t = [1024usize, 65536], global = true)]
    ring_sizes: Vec<usize>,

    /// Payload type
    #[arg(short = 't', long = "msg-type", value_enum, default_value_t = MsgType::U32, global = true)]
    msg_type: MsgType,

    /// Queue vendors to compare
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [Vendor::BatchedSpsc, Vendor::SpinSpsc, Vendor::Crossbeam],
        global = true
    )]
    vendors: Vec<Vendor>,

    /// Seed for reproducible variant ordering
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Omit the CSV header row
    #[arg(long, default_value_t = false, global = true)]
    no_header: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Messages per second from P producers to C consumers
    Throughput {
        #[arg(short = 'p', long, default_value_t = 1)]
        producers: usize,

        #[arg(short = 'c', long, default_value_t = 1)]
        consumers: usize,

        #[arg(long = "fan-out", value_enum, default_value_t = FanOutArg::Anycast)]
        fan_out: FanOutArg,

        /// Cores for producer workers, assigned round-robin
        #[arg(long = "producer-cores", value_delimiter = ',')]
        producer_cores: Vec<usize>,

        /// Cores for consumer workers, assigned round-robin
        #[arg(long = "consumer-cores", value_delimiter = ',')]
        consumer_cores: Vec<usize>,
    },
    /// Nanoseconds per round trip between two groups of threads
    Latency {
        /// Threads on each side
        #[arg(long, default_value_t = 1)]
        threads: usize,

        #[arg(long = "a-cores", value_delimiter = ',')]
        a_cores: Vec<usize>,

        #[arg(long = "b-cores", value_delimiter = ',')]
        b_cores: Vec<usize>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum MsgType {
    U32,
    U64,
    OrderBook,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Vendor {
    BatchedSpsc,
    SpinSpsc,
    Crossbeam,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum FanOutArg {
    Anycast,
    Multicast,
}

impl From<FanOutArg> for FanOut {
    fn from(arg: FanOutArg) -> Self {
        match arg {
            FanOutArg::Anycast => FanOut::Anycast,
            FanOutArg::Multicast => FanOut::Multicast,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut scheduler = TrialScheduler::new(cli.iterations).context("invalid --iterations")?;
    if let Some(seed) = cli.seed {
        scheduler = scheduler.with_seed(seed);
    }

    let plan = suite::Plan {
        ring_sizes: &cli.ring_sizes,
        vendors: &cli.vendors,
        msg_type: cli.msg_type,
    };
    match &cli.command {
        Command::Throughput { producers, consumers, fan_out, producer_cores, consumer_cores } => {
            let shape = suite::ThroughputShape {
                producers: *producers,
                consumers: *consumers,
                fan_out: (*fan_out).into(),
                producer_cores: producer_cores.clone(),
                consumer_cores: consumer_cores.clone(),
            };
            suite::register_throughput(&mut scheduler, &plan, &shape)?;
        }
        Command::Latency { threads, a_cores, b_cores } => {
            let shape = suite::LatencyShape {
                threads: *threads,
                a_cores: a_cores.clone(),
                b_cores: b_cores.clone(),
            };
            suite::register_latency(&mut scheduler, &plan, &shape)?;
        }
    }

    if scheduler.is_empty() {
        bail!("none of the requested vendors supports this producer/consumer layout");
    }

    let summaries = scheduler.run(cli.messages).context("benchmark suite aborted")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if !cli.no_header {
        CsvReport::write_header(&mut out)?;
    }
    CsvReport::write_all(&mut out, &summaries)?;
    out.flush()?;
    Ok(())
}
