//! PAIR: one peer, bidirectional.
//!
//! The socket core refuses a second pipe, so sending always targets the
//! only attached pipe. Raw PAIR behaves identically.

use nanosp_core::message::Message;

use super::{Ctx, SendOutcome};

#[derive(Debug)]
pub(crate) struct Pair;

impl Pair {
    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, msg: Message) -> SendOutcome {
        let Some(pipe) = ctx.pipes.first() else {
            return SendOutcome::Blocked(msg);
        };
        match pipe.try_send(msg) {
            Ok(()) => SendOutcome::Sent,
            Err(msg) => SendOutcome::Blocked(msg),
        }
    }
}
