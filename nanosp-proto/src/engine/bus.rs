//! BUS: every message goes to every directly connected peer.
//!
//! Raw BUS exposes the arrival pipe as an SP header. Sending a message that
//! carries such a header skips that pipe, so a raw loopback device does not
//! echo messages back to their origin.

use nanosp_core::message::Message;
use nanosp_core::transport::PipeId;

use super::{Ctx, SendOutcome};
use crate::header;

#[derive(Debug)]
pub(crate) struct Bus {
    raw: bool,
}

impl Bus {
    pub(crate) fn new(raw: bool) -> Self {
        Self { raw }
    }

    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, mut msg: Message) -> SendOutcome {
        let origin = msg.take_sp_header();
        let skip = if self.raw {
            origin
                .as_deref()
                .and_then(|h| header::decode(h).ok())
                .and_then(|words| words.first().copied())
                .map(header::pipe_of)
        } else {
            None
        };
        ctx.pipes.broadcast(&msg, skip);
        SendOutcome::Sent
    }

    pub(crate) fn on_inbound(&mut self, pipe: PipeId, mut msg: Message) -> Message {
        msg.take_sp_header();
        if self.raw {
            msg.set_sp_header(header::encode(&[header::hop(pipe)]));
        }
        msg
    }
}
