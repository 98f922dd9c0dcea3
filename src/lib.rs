//! Rendezvous IPC - two-party byte transports over shared storage
//!
//! Two processes (or threads) exchange length-prefixed messages through a
//! single-slot channel kept entirely inside a shared medium. There are no
//! locks, semaphores or condition variables: each side polls a turn field and
//! a size field stored in the region itself.
//!
//! # Architecture
//!
//! - **Medium**: a fixed-size header + payload region, either a regular file
//!   ([`FileMedium`]) or a shared memory segment ([`ShmMedium`])
//! - **Endpoint**: the rendezvous protocol, written once over any [`Medium`]
//! - **Harness**: latency, throughput and capacity measurements against an
//!   echoing peer
//!
//! # Example
//!
//! ```no_run
//! use rendezvous_ipc::{Endpoint, ShmMedium};
//!
//! let medium = ShmMedium::create(128)?;
//! let peer = ShmMedium::attach(medium.name())?;
//!
//! let mut a = Endpoint::create(medium, 1)?;
//! let mut b = Endpoint::attach(peer, 2)?;
//!
//! a.write_bytes(b"ping")?;
//! let mut buf = [0u8; 128];
//! let len = b.read_bytes(&mut buf)?;
//! assert_eq!(&buf[..len], b"ping");
//! # Ok::<(), rendezvous_ipc::RendezvousError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod harness;
pub mod layout;
pub mod medium;
pub mod transport;

pub use config::{BenchConfig, PollStrategy, TransportConfig};
pub use error::{RendezvousError, Result};
pub use harness::{echo, BenchReport, Harness};
pub use medium::{FileMedium, Medium, ShmMedium};
pub use transport::Endpoint;
