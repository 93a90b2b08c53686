//! Socket core: the state shared between user calls and transport threads.
//!
//! All mutable state sits behind one `parking_lot::Mutex`. Three condition
//! variables wake blocked callers:
//!
//! - `readable`: a message was queued inbound, or the socket closed
//! - `writable`: a pipe attached or an outbound queue shrank
//! - `space`: the inbound queue shrank, letting blocked deliveries proceed
//!
//! Transport calls ([`Endpoint::shutdown`], registry lookups) never happen
//! while the lock is held.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use nanosp_core::address::Address;
use nanosp_core::config::TransportConfig;
use nanosp_core::error::{Result, SpError};
use nanosp_core::message::Message;
use nanosp_core::options::{self, Applied, OptionKey, OptionValue, SocketOptions};
use nanosp_core::protocol::{Domain, Protocol};
use nanosp_core::stats::{Statistic, Stats};
use nanosp_core::transport::{self, Endpoint, EndpointRole, Pipe, PipeHost, PipeId};

use crate::endpoint::{EndpointId, EndpointInfo, EndpointTable};
use crate::engine::{Ctx, Engine, SendOutcome};
use crate::pipes::PipeTable;
use crate::poll::PollSignal;

/// Readiness of one socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

struct State {
    closed: bool,
    pipes: PipeTable,
    inbound: VecDeque<Message>,
    inbound_bytes: usize,
    engine: Engine,
    options: SocketOptions,
    endpoints: EndpointTable,
    observers: Vec<Weak<PollSignal>>,
}

impl State {
    fn ctx(&mut self, now: Instant) -> (&mut Engine, Ctx<'_>) {
        (
            &mut self.engine,
            Ctx {
                pipes: &mut self.pipes,
                options: &self.options,
                now,
            },
        )
    }

    fn pop_inbound(&mut self) -> Option<Message> {
        let msg = self.inbound.pop_front()?;
        self.inbound_bytes = self.inbound_bytes.saturating_sub(msg.len());
        Some(msg)
    }

    fn has_room(&self) -> bool {
        self.inbound.is_empty() || self.inbound_bytes < self.options.recv_buffer
    }

    /// Run engine timers that are due.
    fn run_timers(&mut self, now: Instant) {
        if self.engine.next_timer().is_some_and(|t| t <= now) {
            let (engine, mut ctx) = self.ctx(now);
            engine.on_timer(&mut ctx);
        }
    }

    fn readiness(&self, now: Instant) -> Readiness {
        Readiness {
            readable: !self.inbound.is_empty() || self.engine.recv_expired(now),
            writable: self.engine.can_send(&self.pipes),
        }
    }

    fn notify_observers(&mut self) {
        self.observers.retain(|weak| match weak.upgrade() {
            Some(signal) => {
                signal.notify();
                true
            }
            None => false,
        });
    }
}

/// Shared part of a socket. Transports see it as a [`PipeHost`].
pub(crate) struct SocketCore {
    domain: Domain,
    protocol: Protocol,
    stats: Stats,
    state: Mutex<State>,
    readable: Condvar,
    writable: Condvar,
    space: Condvar,
}

impl SocketCore {
    pub(crate) fn new(domain: Domain, protocol: Protocol, options: SocketOptions) -> Self {
        let stats = Stats::new();
        stats.set(
            Statistic::CurrentSendPriority,
            i64::from(options.send_priority),
        );
        Self {
            domain,
            protocol,
            stats,
            state: Mutex::new(State {
                closed: false,
                pipes: PipeTable::default(),
                inbound: VecDeque::new(),
                inbound_bytes: 0,
                engine: Engine::new(domain, protocol),
                options,
                endpoints: EndpointTable::default(),
                observers: Vec::new(),
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            space: Condvar::new(),
        }
    }

    #[inline]
    pub(crate) fn domain(&self) -> Domain {
        self.domain
    }

    #[inline]
    pub(crate) fn protocol_kind(&self) -> Protocol {
        self.protocol
    }

    pub(crate) fn statistic(&self, stat: Statistic) -> u64 {
        self.stats.get(stat)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.state.lock();
        if state.closed {
            return Err(SpError::InvalidState("socket is closed"));
        }
        Ok(state)
    }

    pub(crate) fn send_msg(&self, msg: Message, dontwait: bool) -> Result<usize> {
        let len = msg.len();
        let mut state = self.lock_open()?;
        let deadline = state.options.send_timeout.map(|t| Instant::now() + t);

        let mut msg = msg;
        loop {
            let now = Instant::now();
            state.run_timers(now);
            let (engine, mut ctx) = state.ctx(now);
            match engine.send(&mut ctx, msg)? {
                SendOutcome::Sent => break,
                SendOutcome::Blocked(back) => msg = back,
            }
            if dontwait {
                return Err(SpError::TryAgain);
            }
            match deadline {
                Some(d) if now >= d => return Err(SpError::Timeout),
                Some(d) => {
                    self.writable.wait_until(&mut state, d);
                }
                None => self.writable.wait(&mut state),
            }
            if state.closed {
                return Err(SpError::Closed);
            }
        }
        drop(state);

        self.stats.incr(Statistic::MessagesSent);
        self.stats.add(Statistic::BytesSent, len as u64);
        Ok(len)
    }

    pub(crate) fn recv_msg(&self, dontwait: bool) -> Result<Message> {
        let mut state = self.lock_open()?;
        let deadline = state.options.recv_timeout.map(|t| Instant::now() + t);

        loop {
            let now = Instant::now();
            state.run_timers(now);
            state.engine.check_recv(now)?;
            while let Some(msg) = state.pop_inbound() {
                self.space.notify_all();
                if let Some(msg) = state.engine.on_recv(msg) {
                    drop(state);
                    self.stats.incr(Statistic::MessagesReceived);
                    self.stats.add(Statistic::BytesReceived, msg.len() as u64);
                    return Ok(msg);
                }
            }

            if dontwait {
                return Err(SpError::TryAgain);
            }
            if deadline.is_some_and(|d| now >= d) {
                return Err(SpError::Timeout);
            }
            match deadline.into_iter().chain(state.engine.next_timer()).min() {
                Some(wake) => {
                    self.readable.wait_until(&mut state, wake);
                }
                None => self.readable.wait(&mut state),
            }
            if state.closed {
                return Err(SpError::Closed);
            }
        }
    }

    /// Current readiness; runs due engine timers first. Also reports the
    /// next instant a timer wants the caller back.
    pub(crate) fn readiness(&self) -> Result<(Readiness, Option<Instant>)> {
        let mut state = self.lock_open()?;
        let now = Instant::now();
        state.run_timers(now);
        let timer = state.engine.next_timer().filter(|t| *t > now);
        Ok((state.readiness(now), timer))
    }

    /// Register a poll signal to be woken on readiness changes.
    pub(crate) fn observe(&self, signal: &Arc<PollSignal>) -> Result<()> {
        let mut state = self.lock_open()?;
        state.observers.retain(|w| w.strong_count() > 0);
        if !state
            .observers
            .iter()
            .any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(signal)))
        {
            state.observers.push(Arc::downgrade(signal));
        }
        Ok(())
    }

    pub(crate) fn forget(&self, signal: &Arc<PollSignal>) {
        self.state
            .lock()
            .observers
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), Arc::as_ptr(signal)));
    }

    pub(crate) fn get_option(&self, level: i32, name: i32) -> Result<OptionValue> {
        let spec = options::lookup(self.protocol, level, name)?;
        let state = self.lock_open()?;
        state.options.read(spec, self.domain, self.protocol)
    }

    pub(crate) fn set_option(&self, level: i32, name: i32, value: OptionValue) -> Result<()> {
        let spec = options::lookup(self.protocol, level, name)?;
        let mut state = self.lock_open()?;
        match state.options.apply(spec, value)? {
            Applied::Stored(OptionKey::SendPriority) => {
                let prio = state.options.send_priority;
                self.stats
                    .set(Statistic::CurrentSendPriority, i64::from(prio));
            }
            Applied::Stored(key) => trace!("[{}] option {key:?} set", self.label_of(&state)),
            Applied::Protocol(key, bytes) => state.engine.set_option(key, bytes)?,
        }
        Ok(())
    }

    fn label_of(&self, state: &State) -> String {
        label(self.protocol, &state.options.socket_name)
    }

    /// Register a new endpoint.
    ///
    /// The transport is started without the lock held: an inproc bind may
    /// attach pipes to this very socket.
    pub(crate) fn add_endpoint(
        self: &Arc<Self>,
        address: &str,
        role: EndpointRole,
    ) -> Result<EndpointId> {
        let address = Address::parse(address)?;
        {
            let state = self.lock_open()?;
            if role == EndpointRole::Connect
                && self.protocol == Protocol::Pair
                && (state.endpoints.has_connect() || !state.pipes.is_empty())
            {
                return Err(SpError::ResourceExhausted("PAIR socket already has a peer"));
            }
        }

        let host: Arc<dyn PipeHost> = Arc::clone(self) as Arc<dyn PipeHost>;
        let config = TransportConfig::default();
        let endpoint = match role {
            EndpointRole::Bind => transport::bind(&host, &address, config)?,
            EndpointRole::Connect => transport::connect(&host, &address, config)?,
        };

        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            endpoint.shutdown();
            return Err(SpError::Closed);
        }
        let id = state.endpoints.insert(endpoint);
        debug!(
            "[{}] {role:?} {address} as {id} ({} endpoints)",
            self.label_of(&state),
            state.endpoints.len()
        );
        Ok(id)
    }

    pub(crate) fn shutdown_endpoint(&self, id: EndpointId) -> Result<()> {
        let endpoint = self.lock_open()?.endpoints.remove(id)?;
        endpoint.shutdown();
        Ok(())
    }

    pub(crate) fn endpoints(&self) -> Result<Vec<EndpointInfo>> {
        Ok(self.lock_open()?.endpoints.list())
    }

    /// Close the socket: wake every waiter, linger for queued output, then
    /// tear down pipes and endpoints.
    pub(crate) fn close(&self) -> Result<()> {
        let mut state = self.lock_open()?;
        state.closed = true;
        self.readable.notify_all();
        self.writable.notify_all();
        self.space.notify_all();
        for signal in state.observers.drain(..).filter_map(|w| w.upgrade()) {
            signal.interrupt();
        }

        let linger = state.options.linger;
        let deadline = linger.map(|l| Instant::now() + l);
        while state.pipes.queued_bytes() > 0 {
            match deadline {
                Some(d) if Instant::now() >= d => break,
                Some(d) => {
                    self.writable.wait_until(&mut state, d);
                }
                None => self.writable.wait(&mut state),
            }
        }

        let pipes = state.pipes.drain();
        let endpoints = state.endpoints.drain();
        state.inbound.clear();
        state.inbound_bytes = 0;
        debug!(
            "[{}] closed ({} pipes, {} endpoints)",
            self.label_of(&state),
            pipes.len(),
            endpoints.len()
        );
        drop(state);

        for _ in &pipes {
            self.stats.decr(Statistic::CurrentConnections);
        }
        drop(pipes);
        for endpoint in endpoints {
            endpoint.shutdown();
        }
        Ok(())
    }
}

fn label(protocol: Protocol, name: &Bytes) -> String {
    if name.is_empty() {
        protocol.as_str().to_string()
    } else {
        String::from_utf8_lossy(name).into_owned()
    }
}

impl PipeHost for SocketCore {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn options(&self) -> SocketOptions {
        self.state.lock().options.clone()
    }

    fn label(&self) -> String {
        self.label_of(&self.state.lock())
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }

    fn attach(&self, pipe: Pipe) -> bool {
        let mut state = self.state.lock();
        if state.closed || !state.engine.accepts_pipe(&state.pipes) {
            return false;
        }
        let id = pipe.id();
        state.pipes.insert(pipe);
        self.stats.incr(Statistic::CurrentConnections);

        let (engine, mut ctx) = state.ctx(Instant::now());
        engine.on_attach(&mut ctx, id);
        self.writable.notify_all();
        state.notify_observers();
        true
    }

    fn deliver(&self, pipe: PipeId, msg: Message) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.closed || !state.pipes.contains(pipe) {
                return false;
            }
            if state.has_room() {
                break;
            }
            self.space.wait(&mut state);
        }

        let st = &mut *state;
        if let Some(msg) = st.engine.on_inbound(pipe, msg, &st.options) {
            st.inbound_bytes += msg.len();
            st.inbound.push_back(msg);
            self.readable.notify_one();
            st.notify_observers();
        }
        true
    }

    fn detach(&self, id: PipeId) {
        let removed = {
            let mut state = self.state.lock();
            let Some(pipe) = state.pipes.remove(id) else {
                return;
            };
            self.stats.decr(Statistic::CurrentConnections);
            let (engine, mut ctx) = state.ctx(Instant::now());
            engine.on_detach(&mut ctx, id);
            self.writable.notify_all();
            self.space.notify_all();
            state.notify_observers();
            trace!("[{}] pipe {id} detached", self.label_of(&state));
            pipe
        };
        drop(removed);
    }

    fn on_writable(&self) {
        let mut state = self.state.lock();
        self.writable.notify_all();
        state.notify_observers();
    }
}
