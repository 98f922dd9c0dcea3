//! rendezvous-bench - benchmark driver for the rendezvous transports
//!
//!   - run:   latency / throughput / capacity for each backend
//!   - echo:  peer side of `run --process`, attaches to an existing region
//!   - cache: sequential vs. random memory access timings

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rendezvous_ipc::cache::{self, CacheConfig};
use rendezvous_ipc::config::{
    BenchConfig, PollStrategy, CAPACITY_MEGABYTES, CAPACITY_ROUNDS, DEFAULT_EXPERIMENTS,
    DEFAULT_LATENCY_MULTIPLIER, DEFAULT_PACKET_SIZE, THROUGHPUT_MEGABYTES,
};
use rendezvous_ipc::{echo, BenchReport, Endpoint, FileMedium, Harness, Medium, ShmMedium};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REQUESTER_ID: i32 = 1;
const ECHOER_ID: i32 = 2;

#[derive(Parser)]
#[command(name = "rendezvous-bench")]
#[command(about = "Benchmarks file and shared-memory rendezvous transports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure latency, throughput and capacity
    Run {
        /// Transport(s) to benchmark
        #[arg(short, long, value_enum, default_value = "all")]
        backend: BackendArg,

        /// Region file for the file backend
        #[arg(long)]
        path: Option<PathBuf>,

        /// Repetitions of each experiment
        #[arg(short, long, default_value_t = DEFAULT_EXPERIMENTS)]
        experiments: usize,

        /// Latency round trips per experiment
        #[arg(long, default_value_t = DEFAULT_LATENCY_MULTIPLIER)]
        latency_trials: usize,

        /// Packet size in bytes for throughput and capacity
        #[arg(long, default_value_t = DEFAULT_PACKET_SIZE)]
        packet_size: usize,

        /// MB streamed per throughput trial
        #[arg(long, default_value_t = THROUGHPUT_MEGABYTES)]
        throughput_mb: usize,

        /// MB streamed per capacity sub-trial
        #[arg(long, default_value_t = CAPACITY_MEGABYTES)]
        capacity_mb: usize,

        /// Capacity sub-trials per experiment
        #[arg(long, default_value_t = CAPACITY_ROUNDS)]
        capacity_rounds: usize,

        /// Between polls: spin, yield or sleep-us:<n>
        #[arg(long, default_value = "spin")]
        poll: PollStrategy,

        /// Run the echoer as a child process instead of a thread
        #[arg(long)]
        process: bool,
    },

    /// Echo messages on an existing region until the peer closes it
    Echo {
        #[arg(short, long, value_enum)]
        backend: MediumArg,

        /// Region file path or shared memory name
        #[arg(short, long)]
        region: String,

        #[arg(long, default_value_t = ECHOER_ID)]
        sender_id: i32,

        #[arg(long, default_value = "spin")]
        poll: PollStrategy,
    },

    /// Compare sequential and pointer-chased memory access
    Cache {
        /// Runs averaged per array size
        #[arg(short, long, default_value_t = cache::DEFAULT_EXPERIMENTS)]
        experiments: usize,

        /// Array sizes in bytes (repeatable)
        #[arg(short, long = "size")]
        sizes: Vec<usize>,

        /// Seed for the shuffle, random if omitted
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum BackendArg {
    File,
    Shm,
    All,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum MediumArg {
    File,
    Shm,
}

impl MediumArg {
    fn as_arg(self) -> &'static str {
        match self {
            MediumArg::File => "file",
            MediumArg::Shm => "shm",
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            backend,
            path,
            experiments,
            latency_trials,
            packet_size,
            throughput_mb,
            capacity_mb,
            capacity_rounds,
            poll,
            process,
        } => {
            let config = BenchConfig {
                packet_size,
                experiments,
                latency_multiplier: latency_trials,
                throughput_megabytes: throughput_mb,
                capacity_megabytes: capacity_mb,
                capacity_rounds,
                poll,
                ..BenchConfig::default()
            };
            let harness = Harness::new(config).context("invalid benchmark configuration")?;
            let path = path.unwrap_or_else(|| {
                std::env::temp_dir().join(format!("rendezvous-{}.region", std::process::id()))
            });

            if matches!(backend, BackendArg::File | BackendArg::All) {
                let report = bench_file(&harness, &path, process)?;
                println!("{}\n", report);
            }
            if matches!(backend, BackendArg::Shm | BackendArg::All) {
                let report = bench_shm(&harness, process)?;
                println!("{}\n", report);
            }
        }

        Commands::Echo {
            backend,
            region,
            sender_id,
            poll,
        } => {
            let echoed = match backend {
                MediumArg::File => echo_on(FileMedium::attach(&region)?, sender_id, poll)?,
                MediumArg::Shm => echo_on(ShmMedium::attach(&region)?, sender_id, poll)?,
            };
            info!(region = %region, echoed, "echo peer done");
        }

        Commands::Cache {
            experiments,
            sizes,
            seed,
        } => {
            let config = CacheConfig {
                sizes: if sizes.is_empty() {
                    cache::DEFAULT_SIZES.to_vec()
                } else {
                    sizes
                },
                experiments,
            };
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            for report in cache::run(&config, &mut rng) {
                println!("{}", report);
            }
        }
    }

    Ok(())
}

fn bench_file(harness: &Harness, path: &Path, process: bool) -> anyhow::Result<BenchReport> {
    println!("Starting benchmark for method: file");
    let medium = FileMedium::create(path, harness.config().max_payload())?;
    let requester = Endpoint::create(medium, REQUESTER_ID)?;

    let result = if process {
        bench_with_child(harness, "file", requester, MediumArg::File, &path.to_string_lossy())
    } else {
        let echoer = Endpoint::attach(FileMedium::attach(path)?, ECHOER_ID)?;
        harness.run("file", requester, echoer).map_err(Into::into)
    };

    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove region file");
    }
    result
}

fn bench_shm(harness: &Harness, process: bool) -> anyhow::Result<BenchReport> {
    println!("Starting benchmark for method: shared memory");
    let medium = ShmMedium::create(harness.config().max_payload())?;
    let name = medium.name().to_string();
    let requester = Endpoint::create(medium, REQUESTER_ID)?;

    if process {
        bench_with_child(harness, "shared memory", requester, MediumArg::Shm, &name)
    } else {
        let echoer = Endpoint::attach(ShmMedium::attach(&name)?, ECHOER_ID)?;
        Ok(harness.run("shared memory", requester, echoer)?)
    }
}

/// Drive `requester` against this executable re-launched as `echo`
fn bench_with_child<M: Medium>(
    harness: &Harness,
    name: &str,
    mut requester: Endpoint<M>,
    backend: MediumArg,
    region: &str,
) -> anyhow::Result<BenchReport> {
    let mut child = spawn_echoer(backend, region, harness.config().poll)?;
    info!(pid = child.id(), backend = backend.as_arg(), "spawned echo peer");

    let report = harness.measure(name, &mut requester);
    let status = child.wait().context("failed to wait for echo peer")?;

    let report = report?;
    if !status.success() {
        bail!("echo peer exited with {}", status);
    }
    Ok(report)
}

fn spawn_echoer(backend: MediumArg, region: &str, poll: PollStrategy) -> anyhow::Result<Child> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    Command::new(exe)
        .arg("echo")
        .args(["--backend", backend.as_arg()])
        .args(["--region", region])
        .args(["--sender-id", &ECHOER_ID.to_string()])
        .args(["--poll", &poll.to_string()])
        .spawn()
        .context("failed to spawn echo peer")
}

fn echo_on<M: Medium>(medium: M, sender_id: i32, poll: PollStrategy) -> anyhow::Result<u64> {
    let mut endpoint = Endpoint::attach(medium, sender_id)?.with_poll(poll);
    Ok(echo(&mut endpoint)?)
}
