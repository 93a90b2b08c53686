//! REQ/REP: request/reply with automatic retries.
//!
//! REQ tags each request with a fresh id in the SP header and accepts only
//! the reply carrying that id. REP pushes the arrival pipe onto the
//! header's backtrace and pops it again to route the reply.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, trace};

use nanosp_core::error::{Result, SpError};
use nanosp_core::message::Message;
use nanosp_core::transport::PipeId;

use super::{Ctx, SendOutcome};
use crate::header;
use crate::pipes::PipeTable;

#[derive(Debug)]
struct Pending {
    /// Request id, top bit set
    id: u32,
    request: Message,
    /// Pipe the request was last queued on
    pipe: Option<PipeId>,
    resend_at: Instant,
}

#[derive(Debug)]
pub(crate) struct Req {
    raw: bool,
    next_id: u32,
    pending: Option<Pending>,
}

impl Req {
    pub(crate) fn new(raw: bool) -> Self {
        Self {
            raw,
            next_id: rand::random(),
            pending: None,
        }
    }

    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, mut msg: Message) -> Result<SendOutcome> {
        if self.raw {
            return Ok(match ctx.pipes.load_balance(msg) {
                Ok(_) => SendOutcome::Sent,
                Err(msg) => SendOutcome::Blocked(msg),
            });
        }
        if self.pending.is_some() {
            return Err(SpError::InvalidState("request already in flight"));
        }

        let id = self.next_id | header::ID_FLAG;
        self.next_id = self.next_id.wrapping_add(1);
        msg.take_sp_header();
        msg.set_sp_header(header::id_only(id));

        let pipe = ctx.pipes.load_balance(msg.clone()).ok();
        if pipe.is_none() {
            debug!("[REQ] no peer available, request {id:#x} held for resend");
        }
        self.pending = Some(Pending {
            id,
            request: msg,
            pipe,
            resend_at: ctx.now + ctx.options.req_resend_ivl,
        });
        Ok(SendOutcome::Sent)
    }

    pub(crate) fn check_recv(&self) -> Result<()> {
        if self.raw || self.pending.is_some() {
            Ok(())
        } else {
            Err(SpError::InvalidState("no request in flight"))
        }
    }

    fn is_reply(&self, msg: &Message) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        msg.sp_header().and_then(|h| header::parse_id_only(h)) == Some(pending.id)
    }

    pub(crate) fn on_inbound(&mut self, msg: Message) -> Option<Message> {
        if self.raw || self.is_reply(&msg) {
            Some(msg)
        } else {
            trace!("[REQ] dropping stale reply");
            None
        }
    }

    pub(crate) fn on_recv(&mut self, mut msg: Message) -> Option<Message> {
        if self.raw {
            return Some(msg);
        }
        if !self.is_reply(&msg) {
            trace!("[REQ] dropping stale reply");
            return None;
        }
        self.pending = None;
        msg.take_sp_header();
        Some(msg)
    }

    fn resend(pending: &mut Pending, ctx: &mut Ctx<'_>) {
        pending.pipe = ctx.pipes.load_balance(pending.request.clone()).ok();
        pending.resend_at = ctx.now + ctx.options.req_resend_ivl;
        trace!("[REQ] resent request {:#x} on {:?}", pending.id, pending.pipe);
    }

    pub(crate) fn on_attach(&mut self, ctx: &mut Ctx<'_>, _pipe: PipeId) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.pipe.is_none() {
                Self::resend(pending, ctx);
            }
        }
    }

    pub(crate) fn on_detach(&mut self, ctx: &mut Ctx<'_>, pipe: PipeId) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.pipe == Some(pipe) {
                Self::resend(pending, ctx);
            }
        }
    }

    pub(crate) fn next_timer(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.resend_at)
    }

    pub(crate) fn on_timer(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(pending) = self.pending.as_mut() {
            if ctx.now >= pending.resend_at {
                Self::resend(pending, ctx);
            }
        }
    }

    /// Raw sockets forward straight to a pipe; cooked ones hold one request.
    pub(crate) fn can_send(&self, pipes: &PipeTable) -> bool {
        if self.raw {
            pipes.any_writable()
        } else {
            self.pending.is_none()
        }
    }
}

/// Reply side, shared by REP and RESPONDENT.
#[derive(Debug)]
pub(crate) struct Rep {
    raw: bool,
    /// Backtrace of the request being answered
    backtrace: Option<Bytes>,
}

impl Rep {
    pub(crate) fn new(raw: bool) -> Self {
        Self {
            raw,
            backtrace: None,
        }
    }

    pub(crate) fn on_inbound(
        &mut self,
        pipe: PipeId,
        mut msg: Message,
        max_ttl: u8,
    ) -> Option<Message> {
        let incoming = msg.take_sp_header();
        match header::push_hop(incoming.as_ref(), pipe, max_ttl) {
            Ok(backtrace) => {
                msg.set_sp_header(backtrace);
                Some(msg)
            }
            Err(e) => {
                trace!("[REP] dropping request from pipe {pipe}: {e}");
                None
            }
        }
    }

    pub(crate) fn on_recv(&mut self, mut msg: Message) -> Message {
        if !self.raw {
            self.backtrace = msg.take_sp_header();
        }
        msg
    }

    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, mut msg: Message) -> Result<SendOutcome> {
        let backtrace = if self.raw {
            msg.take_sp_header()
        } else {
            msg.take_sp_header();
            Some(
                self.backtrace
                    .take()
                    .ok_or(SpError::InvalidState("no request to reply to"))?,
            )
        };

        let Some((pipe, rest)) = backtrace.as_deref().and_then(header::pop_hop) else {
            trace!("[REP] dropping reply without a route");
            return Ok(SendOutcome::Sent);
        };
        msg.set_sp_header(rest);
        if ctx.pipes.send_to(pipe, msg).is_err() {
            trace!("[REP] dropping reply: pipe {pipe} gone or full");
        }
        Ok(SendOutcome::Sent)
    }

    pub(crate) fn can_send(&self) -> bool {
        self.raw || self.backtrace.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanosp_core::options::SocketOptions;
    use nanosp_core::protocol::Protocol;
    use nanosp_core::transport::Pipe;
    use std::time::Duration;

    fn ctx<'a>(pipes: &'a mut PipeTable, options: &'a SocketOptions, now: Instant) -> Ctx<'a> {
        Ctx { pipes, options, now }
    }

    #[test]
    fn test_request_is_tagged() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let (pipe, rx) = Pipe::unbound(Protocol::Rep, &options);
        pipes.insert(pipe);

        let mut req = Req::new(false);
        req.send(&mut ctx(&mut pipes, &options, Instant::now()), Message::new("q"))
            .unwrap();
        let sent = rx.try_recv().unwrap();
        let id = header::parse_id_only(sent.sp_header().unwrap()).unwrap();
        assert!(id & header::ID_FLAG != 0);
        assert_eq!(sent.body(), "q");
    }

    #[test]
    fn test_second_send_is_invalid() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let mut req = Req::new(false);
        let now = Instant::now();
        req.send(&mut ctx(&mut pipes, &options, now), Message::new("a"))
            .unwrap();
        let err = req
            .send(&mut ctx(&mut pipes, &options, now), Message::new("b"))
            .unwrap_err();
        assert!(matches!(err, SpError::InvalidState(_)));
    }

    #[test]
    fn test_recv_while_idle_is_invalid() {
        let req = Req::new(false);
        assert!(matches!(req.check_recv(), Err(SpError::InvalidState(_))));
        assert!(Req::new(true).check_recv().is_ok());
    }

    #[test]
    fn test_stale_reply_dropped() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let (pipe, rx) = Pipe::unbound(Protocol::Rep, &options);
        pipes.insert(pipe);

        let mut req = Req::new(false);
        req.send(&mut ctx(&mut pipes, &options, Instant::now()), Message::new("q"))
            .unwrap();
        let request = rx.try_recv().unwrap();

        let stale = Message::new("old").with_ancillary(nanosp_core::message::Ancillary::sp_header(
            header::id_only(0x1234),
        ));
        assert!(req.on_inbound(stale).is_none());

        let mut reply = Message::new("answer");
        reply.set_sp_header(request.sp_header().unwrap().clone());
        let got = req.on_recv(reply).unwrap();
        assert_eq!(got.body(), "answer");
        assert!(got.sp_header().is_none());
        assert!(req.can_send(&pipes));
    }

    #[test]
    fn test_raw_req_writable_only_with_a_pipe() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let req = Req::new(true);
        assert!(!req.can_send(&pipes));

        let (pipe, _rx) = Pipe::unbound(Protocol::Rep, &options);
        pipes.insert(pipe);
        assert!(req.can_send(&pipes));
    }

    #[test]
    fn test_held_request_goes_out_when_peer_attaches() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let mut req = Req::new(false);
        req.send(&mut ctx(&mut pipes, &options, Instant::now()), Message::new("q"))
            .unwrap();

        let (pipe, rx) = Pipe::unbound(Protocol::Rep, &options);
        let id = pipe.id();
        pipes.insert(pipe);
        req.on_attach(&mut ctx(&mut pipes, &options, Instant::now()), id);
        assert_eq!(rx.try_recv().unwrap().body(), "q");
    }

    #[test]
    fn test_resend_timer() {
        let options = SocketOptions::default().with_req_resend_ivl(Duration::from_millis(10));
        let mut pipes = PipeTable::default();
        let (pipe, rx) = Pipe::unbound(Protocol::Rep, &options);
        pipes.insert(pipe);

        let start = Instant::now();
        let mut req = Req::new(false);
        req.send(&mut ctx(&mut pipes, &options, start), Message::new("q"))
            .unwrap();
        assert_eq!(req.next_timer(), Some(start + Duration::from_millis(10)));

        req.on_timer(&mut ctx(&mut pipes, &options, start + Duration::from_millis(5)));
        assert_eq!(rx.len(), 1);
        req.on_timer(&mut ctx(&mut pipes, &options, start + Duration::from_millis(11)));
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_rep_routes_reply_to_origin() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let (a, rx_a) = Pipe::unbound(Protocol::Req, &options);
        let (b, rx_b) = Pipe::unbound(Protocol::Req, &options);
        let id_b = b.id();
        pipes.insert(a);
        pipes.insert(b);

        let mut rep = Rep::new(false);
        let mut request = Message::new("q");
        request.set_sp_header(header::id_only(9));
        let queued = rep.on_inbound(id_b, request, 8).unwrap();
        let got = rep.on_recv(queued);
        assert!(got.sp_header().is_none());
        assert!(rep.can_send());

        rep.send(&mut ctx(&mut pipes, &options, Instant::now()), Message::new("r"))
            .unwrap();
        assert!(rx_a.is_empty());
        let reply = rx_b.try_recv().unwrap();
        assert_eq!(reply.sp_header(), Some(&header::id_only(9)));
        assert!(!rep.can_send());
    }

    #[test]
    fn test_rep_send_while_idle() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let mut rep = Rep::new(false);
        let err = rep
            .send(&mut ctx(&mut pipes, &options, Instant::now()), Message::new("r"))
            .unwrap_err();
        assert!(matches!(err, SpError::InvalidState(_)));
    }

    #[test]
    fn test_reply_to_vanished_pipe_is_dropped() {
        let options = SocketOptions::default();
        let mut pipes = PipeTable::default();
        let mut rep = Rep::new(false);
        let mut request = Message::new("q");
        request.set_sp_header(header::id_only(1));
        let queued = rep.on_inbound(4242, request, 8).unwrap();
        rep.on_recv(queued);

        let outcome = rep
            .send(&mut ctx(&mut pipes, &options, Instant::now()), Message::new("r"))
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Sent));
    }
}
