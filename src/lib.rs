//! `tapedelay` — a fixed-delay byte-stream relay. Bytes arriving on stdin
//! are emitted on stdout after a configurable wall-clock delay, preserving
//! order and approximate inter-arrival timing. A tape delay for a byte pipe.
//!
//! The two load-bearing pieces are [`ring::Ring`], the timestamped chunk
//! ring that holds bytes for exactly the delay window, and
//! [`scheduler::Scheduler`], the single-threaded event loop that drives it.
//! Everything else in this crate (`config`, `error`, `clock`, `io_fd`,
//! `logging`) is the ambient machinery a runnable binary needs around them.

pub mod chunk;
pub mod clock;
pub mod config;
pub mod error;
pub mod io_fd;
pub mod logging;
pub mod ring;
pub mod scheduler;

pub use config::Config;
pub use error::{Error, Result};

use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use io_fd::NonBlocking;
use ring::Ring;
use scheduler::Scheduler;

/// Runs the relay to completion over the given input/output descriptors.
///
/// This is the entry point `main` and the integration tests both call: it
/// allocates the `Ring`, puts both descriptors in non-blocking mode, and
/// drives the `Scheduler` until output closes or input closes with the
/// ring drained empty.
pub fn run<I, O>(config: Config, input: I, output: O) -> Result<()>
where
    I: Read + AsRawFd,
    O: Write + AsRawFd,
{
    let ring = Ring::init(config.capacity_bytes)?;
    let input = NonBlocking::new(input)?;
    let output = NonBlocking::new(output)?;
    let mut scheduler = Scheduler::new(ring, config.delay_ms, input, output)?;
    scheduler.run()
}
