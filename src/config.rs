//! Transport and benchmark configuration

use crate::error::{RendezvousError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default packet size for throughput runs (4KB)
pub const DEFAULT_PACKET_SIZE: usize = 4 * 1024;

/// Default number of experiment repetitions
pub const DEFAULT_EXPERIMENTS: usize = 3;

/// Latency trials run per experiment
pub const DEFAULT_LATENCY_MULTIPLIER: usize = 10_000;

/// Size of the latency probe message
pub const LATENCY_MESSAGE_SIZE: usize = 128;

/// Total payload streamed by one throughput trial
pub const THROUGHPUT_MEGABYTES: usize = 128;

/// Payload streamed by one capacity sub-trial
pub const CAPACITY_MEGABYTES: usize = 16;

/// Capacity sub-trials per experiment
pub const CAPACITY_ROUNDS: usize = 16;

const MEGABYTE: usize = 1024 * 1024;

/// What an endpoint does between two unsuccessful polls of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollStrategy {
    /// Busy-wait with a CPU spin hint
    #[default]
    Spin,
    /// Yield the time slice to the scheduler
    Yield,
    /// Sleep for a fixed interval
    Sleep(Duration),
}

impl PollStrategy {
    /// Wait once, according to the strategy
    #[inline]
    pub fn pause(&self) {
        match self {
            PollStrategy::Spin => core::hint::spin_loop(),
            PollStrategy::Yield => std::thread::yield_now(),
            PollStrategy::Sleep(interval) => std::thread::sleep(*interval),
        }
    }
}

impl fmt::Display for PollStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStrategy::Spin => f.write_str("spin"),
            PollStrategy::Yield => f.write_str("yield"),
            PollStrategy::Sleep(interval) => write!(f, "sleep-us:{}", interval.as_micros()),
        }
    }
}

impl FromStr for PollStrategy {
    type Err = RendezvousError;

    /// Accepts `spin`, `yield` or `sleep-us:<micros>`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spin" => Ok(PollStrategy::Spin),
            "yield" => Ok(PollStrategy::Yield),
            other => other
                .strip_prefix("sleep-us:")
                .and_then(|micros| micros.parse::<u64>().ok())
                .map(|micros| PollStrategy::Sleep(Duration::from_micros(micros)))
                .ok_or_else(|| {
                    RendezvousError::InvalidConfig(format!(
                        "unknown poll strategy '{}', expected spin, yield or sleep-us:<n>",
                        other
                    ))
                }),
        }
    }
}

/// Endpoint configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Payload capacity of the shared region in bytes
    pub max_payload: usize,
    /// Behavior between header polls
    pub poll: PollStrategy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_PACKET_SIZE,
            poll: PollStrategy::default(),
        }
    }
}

/// Benchmark harness configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Packet size for throughput and capacity runs
    pub packet_size: usize,
    /// Number of repetitions of each experiment
    pub experiments: usize,
    /// Latency trials = experiments * latency_multiplier
    pub latency_multiplier: usize,
    /// Size of the latency probe message
    pub latency_message_size: usize,
    /// Payload streamed by one throughput trial, in MB
    pub throughput_megabytes: usize,
    /// Payload streamed by one capacity sub-trial, in MB
    pub capacity_megabytes: usize,
    /// Capacity sub-trials per experiment
    pub capacity_rounds: usize,
    /// Behavior between header polls, for both endpoints
    pub poll: PollStrategy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            packet_size: DEFAULT_PACKET_SIZE,
            experiments: DEFAULT_EXPERIMENTS,
            latency_multiplier: DEFAULT_LATENCY_MULTIPLIER,
            latency_message_size: LATENCY_MESSAGE_SIZE,
            throughput_megabytes: THROUGHPUT_MEGABYTES,
            capacity_megabytes: CAPACITY_MEGABYTES,
            capacity_rounds: CAPACITY_ROUNDS,
            poll: PollStrategy::default(),
        }
    }
}

impl BenchConfig {
    /// Payload capacity the shared region needs for this configuration
    pub fn max_payload(&self) -> usize {
        self.packet_size.max(self.latency_message_size)
    }

    /// Endpoint configuration matching this benchmark
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            max_payload: self.max_payload(),
            poll: self.poll,
        }
    }

    /// Number of latency round trips
    pub fn latency_trials(&self) -> usize {
        self.experiments.saturating_mul(self.latency_multiplier)
    }

    /// Packets streamed for `megabytes` of payload
    pub fn packets_for(&self, megabytes: usize) -> usize {
        megabytes.saturating_mul(MEGABYTE) / self.packet_size.max(1)
    }

    fn checked_bytes(megabytes: usize) -> Option<usize> {
        megabytes.checked_mul(MEGABYTE)
    }

    /// Reject configurations the harness cannot run
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(RendezvousError::InvalidConfig(msg.to_string()));

        if self.packet_size == 0 {
            return invalid("packet size must be positive");
        }
        if self.packet_size > i32::MAX as usize {
            return invalid("packet size must fit the 32-bit size field");
        }
        if self.latency_message_size == 0 {
            return invalid("latency message size must be positive");
        }
        if self.experiments == 0 {
            return invalid("at least one experiment is required");
        }
        if self.capacity_rounds == 0 {
            return invalid("at least one capacity round is required");
        }
        if self.experiments.checked_mul(self.latency_multiplier).is_none() {
            return invalid("latency trial count overflows");
        }
        if Self::checked_bytes(self.throughput_megabytes).is_none()
            || Self::checked_bytes(self.capacity_megabytes).is_none()
        {
            return invalid("payload size in bytes overflows");
        }
        if self.packets_for(self.throughput_megabytes) == 0
            || self.packets_for(self.capacity_megabytes) == 0
        {
            return invalid("payload must hold at least one packet");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.latency_trials(), 30_000);
        assert_eq!(config.packets_for(128), 32_768);
        assert_eq!(config.max_payload(), DEFAULT_PACKET_SIZE);
    }

    #[test]
    fn test_max_payload_covers_latency_probe() {
        let config = BenchConfig {
            packet_size: 64,
            ..BenchConfig::default()
        };
        assert_eq!(config.max_payload(), LATENCY_MESSAGE_SIZE);
        assert_eq!(config.transport().max_payload, LATENCY_MESSAGE_SIZE);
    }

    #[test]
    fn test_validate_rejects() {
        let zero_packet = BenchConfig {
            packet_size: 0,
            ..BenchConfig::default()
        };
        assert!(matches!(
            zero_packet.validate(),
            Err(RendezvousError::InvalidConfig(_))
        ));

        let no_experiments = BenchConfig {
            experiments: 0,
            ..BenchConfig::default()
        };
        assert!(no_experiments.validate().is_err());

        let tiny_payload = BenchConfig {
            packet_size: 4 * 1024 * 1024,
            capacity_megabytes: 1,
            ..BenchConfig::default()
        };
        assert!(tiny_payload.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflow() {
        let huge_payload = BenchConfig {
            throughput_megabytes: usize::MAX / 2,
            ..BenchConfig::default()
        };
        assert!(matches!(
            huge_payload.validate(),
            Err(RendezvousError::InvalidConfig(_))
        ));

        let huge_trials = BenchConfig {
            latency_multiplier: usize::MAX,
            ..BenchConfig::default()
        };
        assert!(matches!(
            huge_trials.validate(),
            Err(RendezvousError::InvalidConfig(_))
        ));
        assert_eq!(huge_trials.latency_trials(), usize::MAX);
    }

    #[test]
    fn test_poll_strategy_parse() {
        assert_eq!("spin".parse::<PollStrategy>().unwrap(), PollStrategy::Spin);
        assert_eq!("yield".parse::<PollStrategy>().unwrap(), PollStrategy::Yield);
        assert_eq!(
            "sleep-us:50".parse::<PollStrategy>().unwrap(),
            PollStrategy::Sleep(Duration::from_micros(50))
        );
        assert!("sleep-us:x".parse::<PollStrategy>().is_err());
        assert!("nap".parse::<PollStrategy>().is_err());

        let sleep = PollStrategy::Sleep(Duration::from_micros(7));
        assert_eq!(sleep.to_string().parse::<PollStrategy>().unwrap(), sleep);
    }
}
