//! Protocol engines.
//!
//! One variant per SP protocol. The socket core owns the engine and calls
//! into it with its lock held; engines never block.
//!
//! Hooks, in the order a message meets them:
//! - [`Engine::send`] picks outbound pipes
//! - [`Engine::on_inbound`] filters or rewrites a message when it arrives
//! - [`Engine::on_recv`] checks a queued message again when the user takes it

mod bus;
mod pair;
mod pipeline;
mod pubsub;
mod reqrep;
mod survey;

use std::time::Instant;

use bytes::Bytes;

use nanosp_core::error::{Result, SpError};
use nanosp_core::message::Message;
use nanosp_core::options::{OptionKey, SocketOptions};
use nanosp_core::protocol::{Domain, Protocol};
use nanosp_core::transport::PipeId;

use crate::pipes::PipeTable;

use self::bus::Bus;
use self::pair::Pair;
use self::pipeline::{Pull, Push};
use self::pubsub::{Publisher, Subscriber};
use self::reqrep::{Rep, Req};
use self::survey::Surveyor;

/// Result of offering a message to the engine.
#[derive(Debug)]
pub(crate) enum SendOutcome {
    Sent,
    /// No pipe can take the message right now
    Blocked(Message),
}

/// Everything an engine may touch while the socket lock is held.
pub(crate) struct Ctx<'a> {
    pub pipes: &'a mut PipeTable,
    pub options: &'a SocketOptions,
    pub now: Instant,
}

#[derive(Debug)]
pub(crate) enum Engine {
    Pair(Pair),
    Pub(Publisher),
    Sub(Subscriber),
    Push(Push),
    Pull(Pull),
    Req(Req),
    Rep(Rep),
    Surveyor(Surveyor),
    /// Respondent is reply routing keyed by survey ids
    Respondent(Rep),
    Bus(Bus),
}

impl Engine {
    pub(crate) fn new(domain: Domain, protocol: Protocol) -> Self {
        let raw = domain.is_raw();
        match protocol {
            Protocol::Pair => Self::Pair(Pair),
            Protocol::Pub => Self::Pub(Publisher),
            Protocol::Sub => Self::Sub(Subscriber::new(raw)),
            Protocol::Push => Self::Push(Push),
            Protocol::Pull => Self::Pull(Pull),
            Protocol::Req => Self::Req(Req::new(raw)),
            Protocol::Rep => Self::Rep(Rep::new(raw)),
            Protocol::Surveyor => Self::Surveyor(Surveyor::new(raw)),
            Protocol::Respondent => Self::Respondent(Rep::new(raw)),
            Protocol::Bus => Self::Bus(Bus::new(raw)),
        }
    }

    /// Whether another pipe may be attached.
    pub(crate) fn accepts_pipe(&self, pipes: &PipeTable) -> bool {
        match self {
            Self::Pair(_) => pipes.is_empty(),
            _ => true,
        }
    }

    pub(crate) fn on_attach(&mut self, ctx: &mut Ctx<'_>, pipe: PipeId) {
        if let Self::Req(req) = self {
            req.on_attach(ctx, pipe);
        }
    }

    pub(crate) fn on_detach(&mut self, ctx: &mut Ctx<'_>, pipe: PipeId) {
        if let Self::Req(req) = self {
            req.on_detach(ctx, pipe);
        }
    }

    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, msg: Message) -> Result<SendOutcome> {
        match self {
            Self::Pair(pair) => Ok(pair.send(ctx, msg)),
            Self::Pub(publisher) => Ok(publisher.send(ctx, msg)),
            Self::Push(push) => Ok(push.send(ctx, msg)),
            Self::Req(req) => req.send(ctx, msg),
            Self::Rep(rep) | Self::Respondent(rep) => rep.send(ctx, msg),
            Self::Surveyor(surveyor) => Ok(surveyor.send(ctx, msg)),
            Self::Bus(bus) => Ok(bus.send(ctx, msg)),
            Self::Sub(_) | Self::Pull(_) => Err(SpError::NotSupported("protocol cannot send")),
        }
    }

    /// Precondition for `recv`.
    pub(crate) fn check_recv(&mut self, now: Instant) -> Result<()> {
        match self {
            Self::Pub(_) | Self::Push(_) => Err(SpError::NotSupported("protocol cannot receive")),
            Self::Req(req) => req.check_recv(),
            Self::Surveyor(surveyor) => surveyor.check_recv(now),
            _ => Ok(()),
        }
    }

    /// Filter or rewrite a message as it arrives from `pipe`.
    pub(crate) fn on_inbound(
        &mut self,
        pipe: PipeId,
        msg: Message,
        options: &SocketOptions,
    ) -> Option<Message> {
        match self {
            Self::Sub(sub) => sub.on_inbound(msg),
            Self::Req(req) => req.on_inbound(msg),
            Self::Rep(rep) | Self::Respondent(rep) => rep.on_inbound(pipe, msg, options.max_ttl),
            Self::Surveyor(surveyor) => surveyor.on_inbound(msg),
            Self::Bus(bus) => Some(bus.on_inbound(pipe, msg)),
            Self::Pair(_) | Self::Pull(_) => Some(msg),
            Self::Pub(_) | Self::Push(_) => None,
        }
    }

    /// Final check when the user takes a queued message.
    pub(crate) fn on_recv(&mut self, msg: Message) -> Option<Message> {
        match self {
            Self::Req(req) => req.on_recv(msg),
            Self::Rep(rep) | Self::Respondent(rep) => Some(rep.on_recv(msg)),
            Self::Surveyor(surveyor) => surveyor.on_recv(msg),
            _ => Some(msg),
        }
    }

    /// Next instant at which [`Engine::on_timer`] wants to run.
    pub(crate) fn next_timer(&self) -> Option<Instant> {
        match self {
            Self::Req(req) => req.next_timer(),
            Self::Surveyor(surveyor) => surveyor.deadline(),
            _ => None,
        }
    }

    /// A receive would fail right away instead of blocking.
    pub(crate) fn recv_expired(&self, now: Instant) -> bool {
        match self {
            Self::Surveyor(surveyor) => surveyor.expired(now),
            _ => false,
        }
    }

    pub(crate) fn on_timer(&mut self, ctx: &mut Ctx<'_>) {
        if let Self::Req(req) = self {
            req.on_timer(ctx);
        }
    }

    /// Whether a `send` would currently make progress.
    pub(crate) fn can_send(&self, pipes: &PipeTable) -> bool {
        match self {
            Self::Pub(_) | Self::Bus(_) | Self::Surveyor(_) => true,
            Self::Req(req) => req.can_send(pipes),
            Self::Rep(rep) | Self::Respondent(rep) => rep.can_send(),
            Self::Pair(_) | Self::Push(_) => pipes.any_writable(),
            Self::Sub(_) | Self::Pull(_) => false,
        }
    }

    /// Apply a protocol option that lives in the engine.
    pub(crate) fn set_option(&mut self, key: OptionKey, value: Bytes) -> Result<()> {
        match (self, key) {
            (Self::Sub(sub), OptionKey::Subscribe) => {
                sub.subscribe(&value);
                Ok(())
            }
            (Self::Sub(sub), OptionKey::Unsubscribe) => sub.unsubscribe(&value),
            _ => Err(SpError::not_found(format!("{key:?} on this protocol"))),
        }
    }
}
