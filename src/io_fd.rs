//! Byte-source and byte-sink descriptors: a generic non-blocking wrapper
//! over anything file-descriptor-shaped, used for `stdin`/`stdout` in the
//! binary and for real OS pipes in the integration tests.
//!
//! Grounded on `anp-perf_events::fd::PerfFile`, which wraps a `File` the
//! same way — a small `Read`/`AsRawFd` newtype plus the `fcntl` dance needed
//! before the fd can be registered with a readiness primitive.

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use mio::event::Source;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use nix::fcntl::{fcntl, FcntlArg, OFlag};

use crate::error::Result;

fn set_nonblocking(fd: RawFd) -> Result<()> {
    let current = fcntl(fd, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(current) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(io_err)?;
    Ok(())
}

fn io_err(e: nix::Error) -> crate::error::Error {
    crate::error::Error::Poll {
        inner: io::Error::from(e),
    }
}

/// Wraps any file-descriptor-backed `Read`/`Write` type, putting the fd in
/// non-blocking mode at construction and exposing it to `mio` for readiness
/// polling.
pub struct NonBlocking<T: AsRawFd> {
    inner: T,
}

impl<T: AsRawFd> NonBlocking<T> {
    pub fn new(inner: T) -> Result<Self> {
        set_nonblocking(inner.as_raw_fd())?;
        Ok(NonBlocking { inner })
    }

    pub fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        SourceFd(&self.inner.as_raw_fd()).register(registry, token, interest)
    }

    pub fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        SourceFd(&self.inner.as_raw_fd()).reregister(registry, token, interest)
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        SourceFd(&self.inner.as_raw_fd()).deregister(registry)
    }
}

impl<T: Read + AsRawFd> Read for NonBlocking<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Write + AsRawFd> Write for NonBlocking<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The input side of the relay: anything readable and fd-backed, registered
/// for readability.
pub type Input<T> = NonBlocking<T>;

/// The output side of the relay: anything writable and fd-backed, registered
/// for writability.
pub type Output<T> = NonBlocking<T>;

pub const READABLE: Interest = Interest::READABLE;
pub const WRITABLE: Interest = Interest::WRITABLE;
