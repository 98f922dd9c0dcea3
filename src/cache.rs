//! Sequential vs. pointer-chased memory access
//!
//! Increments every byte of an array twice: once through pointers that walk
//! a contiguous buffer in order, once through pointers to separately
//! allocated bytes visited in shuffled order. The gap between the two times
//! shows cache and TLB effects.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::hint::black_box;
use std::time::Instant;
use tracing::{debug, info};

/// Array sizes measured by default
pub const DEFAULT_SIZES: [usize; 3] = [256 * 1024, 1024 * 1024, 64 * 1024 * 1024];

/// Runs averaged per size by default
pub const DEFAULT_EXPERIMENTS: usize = 10;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub sizes: Vec<usize>,
    pub experiments: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZES.to_vec(),
            experiments: DEFAULT_EXPERIMENTS,
        }
    }
}

/// Timings of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessTimings {
    pub sequential_secs: f64,
    pub random_secs: f64,
}

/// Averaged timings for one array size
#[derive(Debug, Clone, PartialEq)]
pub struct AccessReport {
    pub size: usize,
    pub experiments: usize,
    pub sequential_secs: f64,
    pub random_secs: f64,
}

impl fmt::Display for AccessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of experiments: {}", self.experiments)?;
        writeln!(f, "+---------------+--------------+--------------+")?;
        writeln!(f, "|     Mode      |   Time (s)   |  Array Size  |")?;
        writeln!(f, "+---------------+--------------+--------------+")?;
        writeln!(
            f,
            "|  Sequential   | {:>12.6} | {:>12} |",
            self.sequential_secs, self.size
        )?;
        writeln!(f, "+---------------+--------------+--------------+")?;
        writeln!(f, "|    Random     | {:>12.6} | {:>12} |", self.random_secs, self.size)?;
        write!(f, "+---------------+--------------+--------------+")
    }
}

/// Time one sequential and one random pass over `size` bytes
pub fn run_access_benchmark<R: Rng + ?Sized>(size: usize, rng: &mut R) -> AccessTimings {
    let mut array: Vec<u8> = (0..size).map(|i| (i % 255) as u8).collect();
    let mut sequential: Vec<&mut u8> = array.iter_mut().collect();

    let mut scattered: Vec<Box<u8>> = (0..size).map(|i| Box::new((i % 255) as u8)).collect();
    scattered.shuffle(rng);

    let start = Instant::now();
    for byte in sequential.iter_mut() {
        **byte = byte.wrapping_add(1);
    }
    black_box(&sequential);
    let sequential_secs = start.elapsed().as_secs_f64();

    let start = Instant::now();
    for byte in scattered.iter_mut() {
        **byte = byte.wrapping_add(1);
    }
    black_box(&scattered);
    let random_secs = start.elapsed().as_secs_f64();

    AccessTimings {
        sequential_secs,
        random_secs,
    }
}

/// Average `experiments` runs for every configured size
pub fn run<R: Rng + ?Sized>(config: &CacheConfig, rng: &mut R) -> Vec<AccessReport> {
    let runs = config.experiments.max(1);

    config
        .sizes
        .iter()
        .map(|&size| {
            let mut sequential = 0.0;
            let mut random = 0.0;
            for experiment in 1..=runs {
                let timings = run_access_benchmark(size, &mut *rng);
                debug!(size, experiment, ?timings, "access run");
                sequential += timings.sequential_secs;
                random += timings.random_secs;
            }

            let report = AccessReport {
                size,
                experiments: runs,
                sequential_secs: sequential / runs as f64,
                random_secs: random / runs as f64,
            };
            info!(
                size,
                sequential_secs = report.sequential_secs,
                random_secs = report.random_secs,
                "access pattern measured"
            );
            report
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_single_run() {
        let mut rng = StdRng::seed_from_u64(1);
        let timings = run_access_benchmark(4096, &mut rng);
        assert!(timings.sequential_secs >= 0.0 && timings.sequential_secs.is_finite());
        assert!(timings.random_secs >= 0.0 && timings.random_secs.is_finite());
    }

    #[test]
    fn test_reports_per_size() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = CacheConfig {
            sizes: vec![1024, 2048],
            experiments: 2,
        };
        let reports = run(&config, &mut rng);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].size, 1024);
        assert_eq!(reports[1].size, 2048);
        assert!(reports.iter().all(|r| r.experiments == 2));
    }

    #[test]
    fn test_empty_array() {
        let mut rng = StdRng::seed_from_u64(3);
        let timings = run_access_benchmark(0, &mut rng);
        assert!(timings.random_secs.is_finite());
    }

    #[test]
    fn test_default_sizes() {
        let config = CacheConfig::default();
        assert_eq!(config.sizes, [256 * 1024, 1024 * 1024, 64 * 1024 * 1024]);
        assert_eq!(config.experiments, 10);
    }

    #[test]
    fn test_table() {
        let report = AccessReport {
            size: 262144,
            experiments: 10,
            sequential_secs: 0.0005,
            random_secs: 0.002,
        };
        let text = report.to_string();
        assert!(text.starts_with("Number of experiments: 10\n"));
        assert!(text.contains("|  Sequential   |     0.000500 |       262144 |"));
        assert!(text.contains("|    Random     |     0.002000 |       262144 |"));
    }
}
