//! SURVEYOR: broadcast a question, collect answers until a deadline.
//!
//! RESPONDENT is handled by the REP engine; the survey id in the SP header
//! plays the role of the request id.

use std::time::Instant;

use tracing::trace;

use nanosp_core::error::{Result, SpError};
use nanosp_core::message::Message;

use super::{Ctx, SendOutcome};
use crate::header;

#[derive(Debug, Clone, Copy)]
struct Survey {
    id: u32,
    deadline: Instant,
}

#[derive(Debug)]
pub(crate) struct Surveyor {
    raw: bool,
    next_id: u32,
    current: Option<Survey>,
}

impl Surveyor {
    pub(crate) fn new(raw: bool) -> Self {
        Self {
            raw,
            next_id: rand::random(),
            current: None,
        }
    }

    /// Starting a survey cancels the previous one.
    pub(crate) fn send(&mut self, ctx: &mut Ctx<'_>, mut msg: Message) -> SendOutcome {
        if !self.raw {
            let id = self.next_id | header::ID_FLAG;
            self.next_id = self.next_id.wrapping_add(1);
            msg.take_sp_header();
            msg.set_sp_header(header::id_only(id));
            self.current = Some(Survey {
                id,
                deadline: ctx.now + ctx.options.surveyor_deadline,
            });
        }
        let reached = ctx.pipes.broadcast(&msg, None);
        trace!("[SURVEYOR] survey sent to {reached} respondents");
        SendOutcome::Sent
    }

    /// Fails `Timeout` once the deadline has passed, ending the survey.
    pub(crate) fn check_recv(&mut self, now: Instant) -> Result<()> {
        if self.raw {
            return Ok(());
        }
        match self.current {
            None => Err(SpError::InvalidState("no survey in progress")),
            Some(survey) if now >= survey.deadline => {
                self.current = None;
                Err(SpError::Timeout)
            }
            Some(_) => Ok(()),
        }
    }

    fn is_response(&self, msg: &Message) -> bool {
        let Some(survey) = self.current else {
            return false;
        };
        msg.sp_header().and_then(|h| header::parse_id_only(h)) == Some(survey.id)
    }

    pub(crate) fn on_inbound(&mut self, msg: Message) -> Option<Message> {
        if self.raw || self.is_response(&msg) {
            Some(msg)
        } else {
            trace!("[SURVEYOR] dropping response to an old survey");
            None
        }
    }

    pub(crate) fn on_recv(&mut self, mut msg: Message) -> Option<Message> {
        if self.raw {
            return Some(msg);
        }
        if !self.is_response(&msg) {
            return None;
        }
        msg.take_sp_header();
        Some(msg)
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.current.map(|s| s.deadline)
    }

    pub(crate) fn expired(&self, now: Instant) -> bool {
        self.current.is_some_and(|s| now >= s.deadline)
    }
}
