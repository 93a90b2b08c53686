//! Publisher with two filtered subscribers over inproc.
//!
//! Run this demo:
//! ```bash
//! RUST_LOG=debug cargo run --example pubsub_ticker
//! ```

use std::thread;
use std::time::Duration;

use nanosp::prelude::*;
use nanosp::symbols::{POLLIN, RCVTIMEO, SOL_SOCKET, SUB, SUB_SUBSCRIBE};
use nanosp::PollSet;
use tracing::info;

fn subscriber(prefix: &str) -> Result<Socket, SpError> {
    let sub = Socket::open(Domain::Sp, Protocol::Sub)?;
    sub.set_option(SUB, SUB_SUBSCRIBE, prefix)?;
    sub.set_option(SOL_SOCKET, RCVTIMEO, 500)?;
    sub.connect("inproc://ticker")?;
    Ok(sub)
}

fn main() -> Result<(), SpError> {
    nanosp::dev_tracing::init_tracing();

    let publisher = Socket::open(Domain::Sp, Protocol::Pub)?;
    publisher.bind("inproc://ticker")?;
    let eur = subscriber("EUR")?;
    let usd = subscriber("USD")?;

    let quotes = ["EUR 1.08", "USD 0.92", "GBP 1.17", "EUR 1.09"];
    let feed = thread::spawn(move || {
        for quote in quotes {
            publisher.send(quote, 0).expect("publish failed");
            thread::sleep(Duration::from_millis(20));
        }
        publisher
    });

    let mut set = PollSet::new();
    set.add(&eur, POLLIN);
    set.add(&usd, POLLIN);
    while nanosp::poll(&mut set, Some(Duration::from_millis(300)))? > 0 {
        for (index, name, socket) in [(0, "EUR", &eur), (1, "USD", &usd)] {
            if set.revents(index) & POLLIN != 0 {
                let quote = socket.recv(0)?;
                info!("[{name}] {}", String::from_utf8_lossy(&quote));
            }
        }
    }

    let publisher = feed.join().expect("publisher thread panicked");
    info!(
        "published {} quotes",
        publisher.get_statistic(Statistic::MessagesSent)
    );
    Ok(())
}
