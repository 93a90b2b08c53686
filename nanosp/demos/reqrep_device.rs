//! REQ clients reach a REP service through a device.
//!
//! ```text
//! REQ --tcp--> raw REP ==device== raw REQ --inproc--> REP
//! ```
//!
//! Run this demo:
//! ```bash
//! RUST_LOG=nanosp_proto=debug cargo run --example reqrep_device
//! ```

use std::thread;

use nanosp::prelude::*;
use tracing::info;

const FRONT: &str = "tcp://127.0.0.1:5560";
const BACK: &str = "inproc://reqrep-device-back";

fn main() -> Result<(), SpError> {
    nanosp::dev_tracing::init_tracing();

    let front = Socket::open(Domain::SpRaw, Protocol::Rep)?;
    front.bind(FRONT)?;
    let back = Socket::open(Domain::SpRaw, Protocol::Req)?;
    back.bind(BACK)?;

    let service = Socket::open(Domain::Sp, Protocol::Rep)?;
    service.connect(BACK)?;
    let client = Socket::open(Domain::Sp, Protocol::Req)?;
    client.connect(FRONT)?;

    thread::scope(|s| -> Result<(), SpError> {
        let forwarder = s.spawn(|| nanosp::device(&front, Some(&back)));
        s.spawn(|| {
            while let Ok(request) = service.recv(0) {
                let n: u64 = String::from_utf8_lossy(&request).parse().unwrap_or(0);
                if service.send((n * n).to_string(), 0).is_err() {
                    break;
                }
            }
        });

        for n in 1..=5u64 {
            client.send(n.to_string(), 0)?;
            let reply = client.recv(0)?;
            info!("[CLIENT] {n}^2 = {}", String::from_utf8_lossy(&reply));
        }

        front.close()?;
        service.close()?;
        forwarder.join().expect("device thread panicked")
    })
}
