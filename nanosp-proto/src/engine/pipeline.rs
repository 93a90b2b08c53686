//! PUSH/PULL: load-balanced fan-out, fair fan-in.

use nanosp_core::message::Message;

use super::{Ctx, SendOutcome};

#[derive(Debug)]
pub(crate) struct Push;

impl Push {
    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, msg: Message) -> SendOutcome {
        match ctx.pipes.load_balance(msg) {
            Ok(_) => SendOutcome::Sent,
            Err(msg) => SendOutcome::Blocked(msg),
        }
    }
}

/// Messages are received in arrival order; nothing to track.
#[derive(Debug)]
pub(crate) struct Pull;
