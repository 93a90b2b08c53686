//! Readiness multiplexing across sockets.
//!
//! A poll registers one [`PollSignal`] with every socket it watches. Socket
//! cores bump the signal's generation whenever readiness may have changed,
//! so the poller only has to re-check after a wakeup. Closing a watched
//! socket, or a [`PollInterrupter`], aborts the wait.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use nanosp_core::error::{Result, SpError};
use nanosp_core::symbols::{POLLIN, POLLOUT};

use crate::core::SocketCore;
use crate::socket::Socket;

#[derive(Debug, Default)]
struct SignalState {
    generation: u64,
    interrupted: bool,
}

/// Wakeup channel between socket cores and one poller.
#[derive(Debug, Default)]
pub(crate) struct PollSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl PollSignal {
    pub(crate) fn notify(&self) {
        self.state.lock().generation += 1;
        self.cond.notify_all();
    }

    pub(crate) fn interrupt(&self) {
        self.state.lock().interrupted = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        self.state.lock().interrupted = false;
    }

    fn generation(&self) -> Result<u64> {
        let state = self.state.lock();
        if state.interrupted {
            return Err(SpError::Interrupted);
        }
        Ok(state.generation)
    }

    /// Block until the generation moves past `seen`, or `until` passes.
    fn wait(&self, seen: u64, until: Option<Instant>) -> Result<()> {
        let mut state = self.state.lock();
        while state.generation == seen && !state.interrupted {
            match until {
                Some(t) => {
                    if self.cond.wait_until(&mut state, t).timed_out() {
                        break;
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
        if state.interrupted {
            Err(SpError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Handle that aborts a running (or the next) poll on its set.
#[derive(Debug, Clone)]
pub struct PollInterrupter {
    signal: Weak<PollSignal>,
}

impl PollInterrupter {
    pub fn interrupt(&self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.interrupt();
        }
    }
}

#[derive(Debug)]
struct PollEntry {
    core: Weak<SocketCore>,
    events: i16,
    revents: i16,
}

/// Ordered set of `(socket, event mask)` pairs with result flags.
#[derive(Debug)]
pub struct PollSet {
    entries: Vec<PollEntry>,
    signal: Arc<PollSignal>,
}

impl Default for PollSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PollSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            signal: Arc::new(PollSignal::default()),
        }
    }

    /// Watch `socket` for `events` (`POLLIN | POLLOUT`). Returns the entry
    /// index.
    pub fn add(&mut self, socket: &Socket, events: i16) -> usize {
        self.entries.push(PollEntry {
            core: Arc::downgrade(socket.core()),
            events,
            revents: 0,
        });
        self.entries.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Result flags of entry `index` from the last poll.
    #[must_use]
    pub fn revents(&self, index: usize) -> i16 {
        self.entries.get(index).map_or(0, |e| e.revents)
    }

    pub fn interrupter(&self) -> PollInterrupter {
        PollInterrupter {
            signal: Arc::downgrade(&self.signal),
        }
    }

    fn cores(&self) -> Result<Vec<Arc<SocketCore>>> {
        self.entries
            .iter()
            .map(|e| {
                e.core
                    .upgrade()
                    .ok_or(SpError::InvalidState("polled socket is closed"))
            })
            .collect()
    }

    /// Fill in result flags; returns the ready count and the earliest
    /// engine timer.
    fn scan(&mut self, cores: &[Arc<SocketCore>]) -> Result<(usize, Option<Instant>)> {
        let mut ready = 0;
        let mut timer: Option<Instant> = None;
        for (entry, core) in self.entries.iter_mut().zip(cores) {
            let (readiness, next) = core.readiness()?;
            let mut revents = 0;
            if entry.events & POLLIN != 0 && readiness.readable {
                revents |= POLLIN;
            }
            if entry.events & POLLOUT != 0 && readiness.writable {
                revents |= POLLOUT;
            }
            entry.revents = revents;
            if revents != 0 {
                ready += 1;
            }
            timer = match (timer, next) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        Ok((ready, timer))
    }
}

/// Wait for readiness on `set`.
///
/// `timeout`: `None` blocks, `Some(ZERO)` checks once, anything else is a
/// bounded wait. Returns the number of ready entries; `0` means the
/// timeout expired.
pub fn poll(set: &mut PollSet, timeout: Option<Duration>) -> Result<usize> {
    let cores = set.cores()?;
    let signal = Arc::clone(&set.signal);
    for core in &cores {
        core.observe(&signal)?;
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    let result = wait_ready(set, &cores, &signal, deadline);

    for core in &cores {
        core.forget(&signal);
    }
    signal.reset();
    trace!("poll over {} sockets: {:?}", cores.len(), result);
    result.map_err(|e| match e {
        SpError::InvalidState(_) if cores.iter().any(|c| c.is_closed()) => SpError::Interrupted,
        other => other,
    })
}

fn wait_ready(
    set: &mut PollSet,
    cores: &[Arc<SocketCore>],
    signal: &PollSignal,
    deadline: Option<Instant>,
) -> Result<usize> {
    loop {
        let seen = signal.generation()?;
        let (ready, timer) = set.scan(cores)?;
        if ready > 0 {
            return Ok(ready);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(0);
        }
        let until = deadline.into_iter().chain(timer).min();
        signal.wait(seen, until)?;
    }
}
