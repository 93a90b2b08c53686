//! PUB/SUB: one-to-many distribution with prefix filtering.

use tracing::trace;

use nanosp_core::error::{Result, SpError};
use nanosp_core::message::Message;
use nanosp_core::subscription::SubscriptionTrie;

use super::{Ctx, SendOutcome};

/// Broadcasts to every pipe; pipes whose queue is full miss the message.
#[derive(Debug)]
pub(crate) struct Publisher;

impl Publisher {
    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, msg: Message) -> SendOutcome {
        let delivered = ctx.pipes.broadcast(&msg, None);
        trace!("[PUB] {} bytes to {delivered}/{} pipes", msg.len(), ctx.pipes.len());
        SendOutcome::Sent
    }
}

/// Filters inbound messages by subscribed prefix. Raw subscribers keep
/// every message.
#[derive(Debug)]
pub(crate) struct Subscriber {
    raw: bool,
    subscriptions: SubscriptionTrie,
}

impl Subscriber {
    pub(crate) fn new(raw: bool) -> Self {
        Self {
            raw,
            subscriptions: SubscriptionTrie::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, prefix: &[u8]) {
        self.subscriptions.subscribe(prefix);
    }

    pub(crate) fn unsubscribe(&mut self, prefix: &[u8]) -> Result<()> {
        if self.subscriptions.unsubscribe(prefix) {
            Ok(())
        } else {
            Err(SpError::invalid_argument("not subscribed to this prefix"))
        }
    }

    pub(crate) fn on_inbound(&mut self, msg: Message) -> Option<Message> {
        if self.raw || self.subscriptions.matches(msg.body()) {
            Some(msg)
        } else {
            trace!("[SUB] filtered {} byte message", msg.len());
            None
        }
    }
}
