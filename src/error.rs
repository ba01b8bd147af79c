use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

/// Top-level error type for the delay relay.
///
/// Only failures that are fatal to the process are represented here — see
/// `scheduler` for how non-fatal I/O conditions (EOF, closed pipes) are
/// folded into the scheduler's state machine instead of surfacing as errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to allocate the ring buffer arena: {inner}")]
    RingInit { inner: String },

    #[error("readiness poll failed: {inner}")]
    Poll { inner: ::std::io::Error },

    #[error("sleep failed: {inner}")]
    Sleep { inner: ::std::io::Error },

    #[error("invalid command line: {inner}")]
    CliSyntax { inner: String },

    #[error("could not parse a numeric argument: {inner}")]
    NumericParse { inner: String },
}

impl Error {
    /// The stable process exit code for this error, per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::RingInit { .. } => 1,
            Error::Sleep { .. } => 2,
            Error::Poll { .. } => 3,
            Error::CliSyntax { .. } => 9,
            Error::NumericParse { .. } => 10,
        }
    }
}
