use std::fs::File;
use std::os::unix::io::FromRawFd;
use std::process::ExitCode;

use log::error;

use tapedelay::{run, Config};

fn main() -> ExitCode {
    tapedelay::logging::init();

    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    // `std::io::Stdin`/`Stdout` carry their own internal buffering (an 8KB
    // `BufReader` on stdin, a line-buffered writer on stdout) that would sit
    // between mio's fd readiness and what the ring actually sees, breaking
    // the delay guarantee. Open the raw descriptors directly instead, the
    // same way the relay is driven in tests.
    let stdin = unsafe { File::from_raw_fd(0) };
    let stdout = unsafe { File::from_raw_fd(1) };

    match run(config, stdin, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
