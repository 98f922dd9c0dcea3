//! Benchmark harness
//!
//! The requester endpoint drives every measurement while an echoer endpoint
//! sends each message straight back. Each measured message is checked byte
//! for byte; a mismatch aborts the run.

use crate::config::BenchConfig;
use crate::error::{RendezvousError, Result};
use crate::medium::Medium;
use crate::transport::Endpoint;
use std::fmt;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Results of one benchmark run
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub name: String,
    /// Mean one-way latency in seconds
    pub latency_secs: f64,
    /// Mean sustained throughput in MB/s
    pub throughput_mbps: f64,
    /// Mean of per-experiment peak throughput in MB/s
    pub capacity_mbps: f64,
    /// Messages the echoer sent back, when it ran in this process
    pub messages_echoed: Option<u64>,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results for method: {}", self.name)?;
        writeln!(f, "+------------+------------------+-------+")?;
        writeln!(f, "| Metric     |            Value | Unit  |")?;
        writeln!(f, "+------------+------------------+-------+")?;
        writeln!(f, "| Latency    | {:>16.9} | s     |", self.latency_secs)?;
        writeln!(f, "| Throughput | {:>16.3} | MB/s  |", self.throughput_mbps)?;
        writeln!(f, "| Capacity   | {:>16.3} | MB/s  |", self.capacity_mbps)?;
        write!(f, "+------------+------------------+-------+")
    }
}

/// Echo every message back until the channel closes
///
/// Returns the number of messages echoed. Any failure other than the close
/// sentinel closes the endpoint so the requester does not wait forever.
pub fn echo<M: Medium>(endpoint: &mut Endpoint<M>) -> Result<u64> {
    let mut buf = vec![0u8; endpoint.max_payload()];
    let mut echoed = 0u64;

    let error = loop {
        let len = match endpoint.read_bytes(&mut buf) {
            Ok(len) => len,
            Err(e) => break e,
        };
        if let Err(e) = endpoint.write_bytes(&buf[..len]) {
            break e;
        }
        echoed += 1;
    };

    if error.is_closed() {
        debug!(sender_id = endpoint.sender_id(), echoed, "echoer finished");
        return Ok(echoed);
    }
    if let Err(e) = endpoint.close() {
        warn!(
            sender_id = endpoint.sender_id(),
            error = %e,
            "failed to close channel after echo failure"
        );
    }
    Err(error)
}

/// Drives latency, throughput and capacity measurements
pub struct Harness {
    config: BenchConfig,
}

impl Harness {
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run all measurements with the echoer on its own thread
    ///
    /// The requester is closed when measuring ends, whatever the outcome, so
    /// the echoer always terminates and is joined before returning.
    pub fn run<M, E>(
        &self,
        name: &str,
        mut requester: Endpoint<M>,
        echoer: Endpoint<E>,
    ) -> Result<BenchReport>
    where
        M: Medium,
        E: Medium + Send,
    {
        let mut echoer = echoer.with_poll(self.config.poll);

        thread::scope(|scope| {
            let peer = scope.spawn(move || echo(&mut echoer));
            let report = self.measure(name, &mut requester);

            let echoed = match peer.join() {
                Ok(result) => result,
                Err(_) => Err(RendezvousError::PeerFailed("echo thread panicked".into())),
            };

            let mut report = report?;
            report.messages_echoed = Some(echoed?);
            Ok(report)
        })
    }

    /// Run all measurements against a peer driven elsewhere, then close
    pub fn measure<M: Medium>(&self, name: &str, requester: &mut Endpoint<M>) -> Result<BenchReport> {
        info!(name, "starting benchmark");
        requester.set_poll(self.config.poll);
        let outcome = self.measure_all(name, requester);

        let closed = requester.close();
        match outcome {
            Ok(report) => {
                closed?;
                info!(
                    name,
                    latency_secs = report.latency_secs,
                    throughput_mbps = report.throughput_mbps,
                    capacity_mbps = report.capacity_mbps,
                    "benchmark finished"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(name, error = %e, "benchmark aborted");
                Err(e)
            }
        }
    }

    fn measure_all<M: Medium>(&self, name: &str, requester: &mut Endpoint<M>) -> Result<BenchReport> {
        Ok(BenchReport {
            name: name.to_string(),
            latency_secs: self.measure_latency(requester)?,
            throughput_mbps: self.measure_throughput(requester)?,
            capacity_mbps: self.measure_capacity(requester)?,
            messages_echoed: None,
        })
    }

    /// Mean one-way latency of a fixed-size message, in seconds
    pub fn measure_latency<M: Medium>(&self, requester: &mut Endpoint<M>) -> Result<f64> {
        let trials = self.config.latency_trials();
        let mut data = vec![0u8; self.config.latency_message_size];
        let mut response = vec![0u8; self.config.latency_message_size];
        let mut total = 0.0;

        for _ in 0..trials {
            let start = Instant::now();
            fill_pattern(&mut data);
            round_trip(requester, &data, &mut response)?;
            total += start.elapsed().as_secs_f64() / 2.0;
        }

        let latency = total / trials as f64;
        info!(latency_secs = latency, trials, "latency measured");
        Ok(latency)
    }

    /// Mean throughput over `experiments` full-size streams, in MB/s
    pub fn measure_throughput<M: Medium>(&self, requester: &mut Endpoint<M>) -> Result<f64> {
        let experiments = self.config.experiments;
        let mut total = 0.0;

        for _ in 0..experiments {
            total += self.stream(requester, self.config.throughput_megabytes)?;
        }

        let throughput = total / experiments as f64;
        info!(throughput_mbps = throughput, experiments, "throughput measured");
        Ok(throughput)
    }

    /// Mean of the best throughput seen in each experiment, in MB/s
    pub fn measure_capacity<M: Medium>(&self, requester: &mut Endpoint<M>) -> Result<f64> {
        let experiments = self.config.experiments;
        let mut total = 0.0;

        for _ in 0..experiments {
            let mut best = 0.0f64;
            for _ in 0..self.config.capacity_rounds {
                best = best.max(self.stream(requester, self.config.capacity_megabytes)?);
            }
            total += best;
        }

        let capacity = total / experiments as f64;
        info!(capacity_mbps = capacity, experiments, "capacity measured");
        Ok(capacity)
    }

    /// Stream `megabytes` of packets through the echoer; returns MB/s
    fn stream<M: Medium>(&self, requester: &mut Endpoint<M>, megabytes: usize) -> Result<f64> {
        let mut data = vec![0u8; self.config.packet_size];
        let mut response = vec![0u8; self.config.packet_size];

        let start = Instant::now();
        fill_pattern(&mut data);
        for _ in 0..self.config.packets_for(megabytes) {
            round_trip(requester, &data, &mut response)?;
        }
        let secs = start.elapsed().as_secs_f64().max(f64::MIN_POSITIVE);

        Ok(megabytes as f64 / secs * 2.0)
    }
}

/// Send `data`, wait for the echo in `response`, and compare
fn round_trip<M: Medium>(
    requester: &mut Endpoint<M>,
    data: &[u8],
    response: &mut [u8],
) -> Result<()> {
    requester.write_bytes(data)?;
    let received = requester.read_bytes(response)?;
    verify(data, &response[..received])
}

fn verify(sent: &[u8], received: &[u8]) -> Result<()> {
    if sent.len() != received.len() {
        return Err(RendezvousError::LengthMismatch {
            sent: sent.len(),
            received: received.len(),
        });
    }
    match sent.iter().zip(received).position(|(a, b)| a != b) {
        Some(offset) => Err(RendezvousError::IntegrityViolation {
            offset,
            expected: sent[offset],
            got: received[offset],
        }),
        None => Ok(()),
    }
}

/// Byte `i` holds `i mod 256`
fn fill_pattern(buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = i as u8;
    }
}
