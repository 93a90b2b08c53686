//! Device: forward messages between two raw sockets.
//!
//! Messages keep their SP header while they cross the device, so
//! request/reply and survey chains route replies back through it.
//!
//! ```text
//! clients -> raw REP (a) -> device -> raw REQ (b) -> services
//!            replies    <-         <-           <-
//! ```
//!
//! With a single socket the device loops it back onto itself, which makes
//! a raw BUS socket a message hub.

use tracing::{debug, trace};

use nanosp_core::error::{Result, SpError};
use nanosp_core::symbols::{DONTWAIT, POLLIN};

use crate::poll::{poll, PollSet};
use crate::socket::Socket;

/// Run until either socket is closed.
///
/// Both sockets must be raw. Returns `Ok` once a socket closes; any other
/// failure is returned as is.
pub fn device(a: &Socket, b: Option<&Socket>) -> Result<()> {
    let b = b.unwrap_or(a);
    for socket in [a, b] {
        if !socket.domain().is_raw() {
            return Err(SpError::invalid_argument("device requires raw sockets"));
        }
    }
    debug!("[DEVICE] forwarding {} <-> {}", a.protocol(), b.protocol());

    let mut set = PollSet::new();
    let mut routes = Vec::with_capacity(2);
    if a.protocol().can_recv() {
        routes.push((set.add(a, POLLIN), a, b));
    }
    if !std::ptr::eq(a, b) && b.protocol().can_recv() {
        routes.push((set.add(b, POLLIN), b, a));
    }
    if routes.is_empty() {
        return Err(SpError::invalid_argument("device has nothing to receive from"));
    }

    loop {
        match poll(&mut set, None) {
            Ok(_) => {}
            Err(e) if ends_device(&e) => return Ok(()),
            Err(e) => return Err(e),
        }
        for (index, from, to) in &routes {
            if set.revents(*index) & POLLIN == 0 {
                continue;
            }
            match forward(from, to) {
                Ok(()) => {}
                Err(e) if ends_device(&e) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

fn forward(from: &Socket, to: &Socket) -> Result<()> {
    let msg = match from.recv_msg(DONTWAIT) {
        Ok(msg) => msg,
        Err(SpError::TryAgain) => return Ok(()),
        Err(e) => return Err(e),
    };
    trace!("[DEVICE] {} -> {}: {} bytes", from.protocol(), to.protocol(), msg.len());
    to.send_msg(msg, 0).map(|_| ())
}

fn ends_device(err: &SpError) -> bool {
    matches!(
        err,
        SpError::Closed | SpError::Interrupted | SpError::InvalidState(_)
    )
}
