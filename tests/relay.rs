//! End-to-end scenarios driving the relay over real OS pipes, the way a
//! shell pipeline would invoke the binary.

use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::FromRawFd;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tapedelay::{run, Config};

fn pipe_pair() -> (File, File) {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "pipe(2) failed");
    unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

/// S1: a short message written once and the input closed comes back intact
/// after the configured delay.
#[test]
fn echo_with_delay() {
    let (in_read, mut in_write) = pipe_pair();
    let (mut out_read, out_write) = pipe_pair();

    in_write.write_all(b"hello").unwrap();
    drop(in_write);

    let config = Config {
        delay_ms: 50,
        capacity_bytes: 1024 * 1024,
    };
    run(config, in_read, out_write).unwrap();

    let mut received = Vec::new();
    out_read.read_to_end(&mut received).unwrap();
    assert_eq!(received, b"hello");
}

/// S2: two writes separated in time arrive in the same order they were
/// made, each delayed by roughly the same fixed amount.
#[test]
fn two_burst_ordering_preserves_sequence() {
    let (in_read, mut in_write) = pipe_pair();
    let (mut out_read, out_write) = pipe_pair();

    let writer = thread::spawn(move || {
        in_write.write_all(b"ABC").unwrap();
        thread::sleep(Duration::from_millis(100));
        in_write.write_all(b"DEF").unwrap();
        thread::sleep(Duration::from_millis(100));
        // in_write dropped here, closing input
    });

    let config = Config {
        delay_ms: 150,
        capacity_bytes: 1024 * 1024,
    };
    let relay = thread::spawn(move || run(config, in_read, out_write).unwrap());

    writer.join().unwrap();
    relay.join().unwrap();

    let mut received = Vec::new();
    out_read.read_to_end(&mut received).unwrap();
    assert_eq!(received, b"ABCDEF");
}

/// S3: a stream much larger than the ring's capacity forces multiple wraps
/// but every byte still arrives, in order.
#[test]
fn wrap_stress_round_trips_all_bytes() {
    use tapedelay::chunk::{CHUNK_MAX, PAYLOAD_MAX};

    let (in_read, mut in_write) = pipe_pair();
    let (mut out_read, out_write) = pipe_pair();

    let payload: Vec<u8> = (0..10 * PAYLOAD_MAX).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let writer = thread::spawn(move || {
        in_write.write_all(&payload).unwrap();
    });

    let config = Config {
        delay_ms: 10,
        capacity_bytes: CHUNK_MAX * 3,
    };
    let relay = thread::spawn(move || run(config, in_read, out_write).unwrap());

    writer.join().unwrap();
    relay.join().unwrap();

    let mut received = Vec::new();
    out_read.read_to_end(&mut received).unwrap();
    assert_eq!(received, expected);
}

/// S4: a sink that only drains a byte at a time never loses or reorders
/// bytes, it just takes longer to finish.
#[test]
fn slow_sink_delivers_all_bytes_in_order() {
    let (in_read, mut in_write) = pipe_pair();
    let (mut out_read, out_write) = pipe_pair();

    in_write.write_all(b"1234567890").unwrap();
    drop(in_write);

    let reader = thread::spawn(move || {
        let mut received = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            thread::sleep(Duration::from_millis(5));
            match out_read.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => received.push(byte[0]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => panic!("unexpected read error: {e}"),
            }
        }
        received
    });

    let config = Config {
        delay_ms: 0,
        capacity_bytes: 1024 * 1024,
    };
    run(config, in_read, out_write).unwrap();

    let received = reader.join().unwrap();
    assert_eq!(received, b"1234567890");
}

/// S5: if the sink stops accepting bytes partway through a stream, the
/// relay notices the closure and exits cleanly instead of hanging.
#[test]
fn sink_closing_mid_stream_terminates_cleanly() {
    let (in_read, mut in_write) = pipe_pair();
    let (out_read, out_write) = pipe_pair();

    let writer = thread::spawn(move || {
        let chunk = vec![7u8; 4096];
        for _ in 0..32 {
            if in_write.write_all(&chunk).is_err() {
                break;
            }
        }
        // in_write dropped here, closing input regardless of how far the
        // reader on the other side got.
    });

    let reader = thread::spawn(move || {
        let mut out_read = out_read;
        let mut buf = [0u8; 1];
        for _ in 0..5 {
            if out_read.read_exact(&mut buf).is_err() {
                break;
            }
        }
        // dropping out_read here closes the sink mid-stream
    });

    let config = Config {
        delay_ms: 100,
        capacity_bytes: 1024 * 1024,
    };
    run(config, in_read, out_write).unwrap();

    writer.join().unwrap();
    reader.join().unwrap();
}

/// S6: closing input immediately, before anything is written, produces no
/// output and exits cleanly.
#[test]
fn empty_input_produces_no_output() {
    let (in_read, in_write) = pipe_pair();
    let (mut out_read, out_write) = pipe_pair();

    drop(in_write);

    let config = Config {
        delay_ms: 100,
        capacity_bytes: 1024 * 1024,
    };
    run(config, in_read, out_write).unwrap();

    let mut received = Vec::new();
    out_read.read_to_end(&mut received).unwrap();
    assert!(received.is_empty());
}
