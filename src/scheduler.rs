//! The delay loop: a single-threaded event loop that owns one `Ring`, the
//! two descriptors, and the configured delay `D`.
//!
//! Grounded on the `mio` registration pattern in `anp-perf_events::fd`
//! (`Evented`/`Source` over a raw fd, fcntl'd non-blocking first), adapted
//! from mio 0.6's `Evented` trait to mio 0.8's `Source`/`Registry`.

use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use mio::{Events, Poll, Token};

use crate::clock::{sleep_ms, Clock, TimeMs};
use crate::error::{Error, Result};
use crate::io_fd::{NonBlocking, READABLE, WRITABLE};
use crate::ring::Ring;

const INPUT: Token = Token(0);
const OUTPUT: Token = Token(1);

/// The scheduler's three-state lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Draining,
    Stopped,
}

/// Outcome of a single `ingest`/`drain` attempt, keeping a spurious
/// `WouldBlock` wakeup (level-triggered readiness racing a concurrent
/// consumer of the same fd) distinct from an honest closure.
enum Outcome {
    Progress(usize),
    WouldBlock,
    Closed,
}

fn classify(res: io::Result<usize>) -> Outcome {
    match res {
        Ok(0) => Outcome::Closed,
        Ok(n) => Outcome::Progress(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Outcome::WouldBlock,
        Err(_) => Outcome::Closed,
    }
}

/// Owns the `Ring`, the two descriptors, and the cached scheduling state:
/// `input_closed`, `output_closed`, `has_next`, and the cached `next_ts` of
/// the oldest buffered chunk. Generic over the descriptor types so tests can
/// drive it over real OS pipes instead of only `stdin`/`stdout`.
pub struct Scheduler<I: Read + AsRawFd, O: Write + AsRawFd> {
    ring: Ring,
    delay_ms: i64,
    clock: Clock,
    input: NonBlocking<I>,
    output: NonBlocking<O>,
    poll: Poll,
    events: Events,
    input_closed: bool,
    output_closed: bool,
    has_next: bool,
    next_ts: TimeMs,
    input_registered: bool,
    output_registered: bool,
}

impl<I: Read + AsRawFd, O: Write + AsRawFd> Scheduler<I, O> {
    pub fn new(ring: Ring, delay_ms: i64, input: NonBlocking<I>, output: NonBlocking<O>) -> Result<Self> {
        let poll = Poll::new().map_err(|inner| Error::Poll { inner })?;
        Ok(Scheduler {
            ring,
            delay_ms,
            clock: Clock::new(),
            input,
            output,
            poll,
            events: Events::with_capacity(2),
            input_closed: false,
            output_closed: false,
            has_next: false,
            next_ts: 0,
            input_registered: false,
            output_registered: false,
        })
    }

    pub fn state(&self) -> State {
        if self.should_terminate() {
            State::Stopped
        } else if self.input_closed {
            State::Draining
        } else {
            State::Running
        }
    }

    /// Terminates on output closure, or once input is closed with nothing
    /// left to drain. `input_closed && output_closed` is already covered by
    /// the first disjunct; the assertion below makes that explicit instead
    /// of relying on it being an unstated consequence.
    fn should_terminate(&self) -> bool {
        let terminate = self.output_closed || (self.input_closed && !self.has_next);
        debug_assert!(!(self.input_closed && self.output_closed) || terminate);
        terminate
    }

    /// Runs the delay loop to completion. Returns once the output closes,
    /// or input closes and the ring drains empty.
    pub fn run(&mut self) -> Result<()> {
        self.refresh_cache();
        loop {
            if self.should_terminate() {
                break;
            }
            self.tick()?;
            self.refresh_cache();
        }
        Ok(())
    }

    fn refresh_cache(&mut self) {
        self.has_next = !self.ring.is_empty();
        if self.has_next {
            self.next_ts = self.ring.peek_next_timestamp();
        }
    }

    fn tick(&mut self) -> Result<()> {
        let now = self.clock.now_ms();
        let due = self.next_ts + self.delay_ms;

        let want_input = !self.input_closed && !self.ring.is_full();
        let want_output_now = !self.output_closed && self.has_next && due <= now;
        let infinite_timeout = !self.has_next || self.output_closed || due <= now;

        self.sync_registrations(want_input, want_output_now)
            .map_err(|inner| Error::Poll { inner })?;

        if !want_input && !want_output_now {
            if infinite_timeout {
                // Nothing is watched and nothing is scheduled. This is only
                // transient: `should_terminate` always holds whenever both
                // `want_input` and `want_output_now` are false and the
                // timeout is infinite (an empty ring is never full, so
                // `want_input` false with `!has_next` implies
                // `input_closed`; `want_output_now` false with `has_next`
                // and a due timestamp implies `output_closed`).
                return Ok(());
            }
            let timeout_ms = (due - now).max(0);
            sleep_ms(timeout_ms)?;
            return self.on_timeout();
        }

        let timeout = if infinite_timeout {
            None
        } else {
            Some(Duration::from_millis((due - now).max(0) as u64))
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(inner) => return Err(Error::Poll { inner }),
        }

        if self.events.is_empty() {
            return self.on_timeout();
        }

        let mut output_ready = false;
        let mut input_ready = false;
        for ev in self.events.iter() {
            match ev.token() {
                OUTPUT => output_ready = true,
                INPUT => input_ready = true,
                _ => {}
            }
        }

        // Output before input, so a freed ring slot can be used for input
        // on the very next iteration.
        if output_ready && want_output_now {
            self.on_output_ready()?;
        }
        if input_ready && want_input {
            self.on_input_ready()?;
        }
        Ok(())
    }

    fn on_timeout(&mut self) -> Result<()> {
        self.drain_once()
    }

    fn on_output_ready(&mut self) -> Result<()> {
        self.drain_once()
    }

    /// Drains every chunk that is already due, stopping at the first one
    /// that isn't, at closure, or at `WouldBlock`.
    ///
    /// `mio`'s epoll backend registers interest edge-triggered, so a single
    /// writable event is the only notification we're guaranteed to see for
    /// as long as the descriptor stays ready — looping here until the
    /// output genuinely can't take more is what keeps a burst of already-due
    /// chunks (or a closed sink, which can take more than one write to
    /// surface) from stalling for a notification that never comes. This
    /// never drains a chunk before its deadline: the due check runs fresh
    /// before each attempt.
    fn drain_once(&mut self) -> Result<()> {
        loop {
            if self.output_closed || self.ring.is_empty() {
                return Ok(());
            }
            let now = self.clock.now_ms();
            if self.ring.peek_next_timestamp() + self.delay_ms > now {
                return Ok(());
            }
            match classify(self.ring.drain_to(&mut self.output)) {
                Outcome::Closed => {
                    self.output_closed = true;
                    return Ok(());
                }
                Outcome::WouldBlock => return Ok(()),
                Outcome::Progress(_) => continue,
            }
        }
    }

    /// Ingests until the ring is full, input closes, or the descriptor
    /// would block. Same edge-triggered reasoning as [`Self::drain_once`]:
    /// a closed input is only guaranteed to be observed once as a readable
    /// event, and that read may well return real bytes before the
    /// follow-up read reports EOF, so a single `ingest_from` call per event
    /// can miss the closure entirely and hang waiting for a notification
    /// that will never arrive.
    fn on_input_ready(&mut self) -> Result<()> {
        loop {
            if self.input_closed || self.ring.is_full() {
                return Ok(());
            }
            let now = self.clock.now_ms();
            match classify(self.ring.ingest_from(&mut self.input, now)) {
                Outcome::Closed => {
                    self.input_closed = true;
                    return Ok(());
                }
                Outcome::WouldBlock => return Ok(()),
                Outcome::Progress(_) => continue,
            }
        }
    }

    fn sync_registrations(&mut self, want_input: bool, want_output: bool) -> io::Result<()> {
        if want_input && !self.input_registered {
            self.input.register(self.poll.registry(), INPUT, READABLE)?;
            self.input_registered = true;
        } else if !want_input && self.input_registered {
            self.input.deregister(self.poll.registry())?;
            self.input_registered = false;
        }

        if want_output && !self.output_registered {
            self.output.register(self.poll.registry(), OUTPUT, WRITABLE)?;
            self.output_registered = true;
        } else if !want_output && self.output_registered {
            self.output.deregister(self.poll.registry())?;
            self.output_registered = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CHUNK_MAX;
    use crate::io_fd::NonBlocking;
    use std::fs::File;
    use std::io::Write as _;
    use std::os::unix::io::FromRawFd;

    fn should_terminate(input_closed: bool, output_closed: bool, has_next: bool) -> bool {
        output_closed || (input_closed && !has_next)
    }

    #[test]
    fn terminal_state_transitions() {
        assert!(!should_terminate(false, false, true));
        assert!(should_terminate(false, true, true));
        assert!(!should_terminate(true, false, true));
        assert!(should_terminate(true, false, false));
    }

    fn pipe_pair() -> (File, File) {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0, "pipe(2) failed");
        unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
    }

    #[test]
    fn echoes_a_short_message_after_the_delay() {
        let (read_end, mut write_end) = pipe_pair();
        let (out_read, out_write) = pipe_pair();

        write_end.write_all(b"hello").unwrap();
        drop(write_end); // close stdin-equivalent so the loop can drain and stop

        let ring = Ring::init(CHUNK_MAX * 2).unwrap();
        let input = NonBlocking::new(read_end).unwrap();
        let output = NonBlocking::new(out_write).unwrap();
        let mut sched = Scheduler::new(ring, 10, input, output).unwrap();
        sched.run().unwrap();

        drop(sched);
        let mut received = Vec::new();
        let mut out_read = out_read;
        out_read.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"hello");
    }
}
