//! In-process transport.
//!
//! A process-wide registry maps names to the bound socket. A connect to a
//! name nobody has bound yet is parked and completes as soon as a bind
//! appears. Each link is a pair of pipes; one pump thread per direction
//! moves messages from a pipe queue straight into the peer socket.
//!
//! Lock order: registry, then socket state. Pipe hosts are never called
//! into while they hold their own lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::address::{Address, TransportKind};
use crate::codec::wire_len;
use crate::error::{Result, SpError};
use crate::message::Message;
use crate::stats::Statistic;

use super::{next_pipe_id, weak, Endpoint, EndpointRole, Liveness, Pipe, PipeHost, PipeId};

type EndpointKey = u64;
type LinkId = u64;

struct BinderEntry {
    key: EndpointKey,
    host: Weak<dyn PipeHost>,
    liveness: Arc<Liveness>,
}

struct ConnectorEntry {
    name: String,
    host: Weak<dyn PipeHost>,
    liveness: Arc<Liveness>,
}

struct Link {
    binder: EndpointKey,
    connector: EndpointKey,
    liveness: [Arc<Liveness>; 2],
    binder_side: (Weak<dyn PipeHost>, PipeId),
    connector_side: (Weak<dyn PipeHost>, PipeId),
}

#[derive(Default)]
struct Registry {
    binders: HashMap<String, BinderEntry>,
    connectors: HashMap<EndpointKey, ConnectorEntry>,
    /// Connectors waiting for a bind, per name
    pending: HashMap<String, Vec<EndpointKey>>,
    links: HashMap<LinkId, Link>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

enum Outcome {
    Linked,
    /// Peer refused or is incompatible; stay parked
    Retry,
    /// Connector socket is gone
    Gone,
}

/// Bind `name` for `host`.
pub(super) fn bind(host: &Arc<dyn PipeHost>, name: &str, address: Address) -> Result<Endpoint> {
    let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
    let mut reg = REGISTRY.lock();

    if reg
        .binders
        .get(name)
        .is_some_and(|b| b.host.strong_count() > 0)
    {
        host.stats().incr(Statistic::BindErrors);
        return Err(SpError::AddressInUse(address.to_string()));
    }
    let endpoint = Endpoint::new(address, EndpointRole::Bind);
    let liveness = Arc::clone(&endpoint.liveness);
    reg.binders.insert(
        name.to_string(),
        BinderEntry {
            key,
            host: weak(host),
            liveness: Arc::clone(&liveness),
        },
    );
    debug!("[{}] bound inproc://{name}", host.label());

    let parked = reg.pending.remove(name).unwrap_or_default();
    let mut still_parked = Vec::new();
    for connector in parked {
        match establish(&mut reg, key, host, &liveness, connector) {
            Outcome::Linked | Outcome::Gone => {}
            Outcome::Retry => still_parked.push(connector),
        }
    }
    if !still_parked.is_empty() {
        reg.pending.insert(name.to_string(), still_parked);
    }
    drop(reg);

    let mut endpoint = endpoint;
    let owned = name.to_string();
    endpoint.on_shutdown = Some(Box::new(move || unbind(&owned, key)));
    Ok(endpoint)
}

/// Connect `host` to `name`, now or whenever it gets bound.
pub(super) fn connect(host: &Arc<dyn PipeHost>, name: &str, address: Address) -> Endpoint {
    let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
    let mut endpoint = Endpoint::new(address, EndpointRole::Connect);
    let mut reg = REGISTRY.lock();
    reg.connectors.insert(
        key,
        ConnectorEntry {
            name: name.to_string(),
            host: weak(host),
            liveness: Arc::clone(&endpoint.liveness),
        },
    );

    let binder = reg.binders.get(name).and_then(|b| {
        b.host
            .upgrade()
            .map(|h| (b.key, h, Arc::clone(&b.liveness)))
    });
    let linked = match binder {
        Some((binder_key, binder_host, binder_live)) => matches!(
            establish(&mut reg, binder_key, &binder_host, &binder_live, key),
            Outcome::Linked
        ),
        None => false,
    };
    if !linked {
        trace!("[{}] inproc://{name} parked", host.label());
        reg.pending.entry(name.to_string()).or_default().push(key);
    }
    drop(reg);

    endpoint.on_shutdown = Some(Box::new(move || disconnect(key)));
    endpoint
}

/// Whether a live socket is bound to `name`.
pub fn is_bound(name: &str) -> bool {
    REGISTRY
        .lock()
        .binders
        .get(name)
        .is_some_and(|b| b.host.strong_count() > 0)
}

fn establish(
    reg: &mut Registry,
    binder_key: EndpointKey,
    binder: &Arc<dyn PipeHost>,
    binder_live: &Arc<Liveness>,
    connector_key: EndpointKey,
) -> Outcome {
    let Some((connector, connector_live)) = reg
        .connectors
        .get(&connector_key)
        .and_then(|c| c.host.upgrade().map(|h| (h, Arc::clone(&c.liveness))))
    else {
        return Outcome::Gone;
    };

    let (local, remote) = (connector.protocol(), binder.protocol());
    if !local.is_compatible(remote) {
        warn!(
            "[{}] inproc peer {} is incompatible with {}",
            connector.label(),
            remote,
            local
        );
        return Outcome::Retry;
    }

    let connector_pipe = next_pipe_id();
    let binder_pipe = next_pipe_id();
    let (to_binder_tx, to_binder_rx) = flume::unbounded::<Message>();
    let (to_connector_tx, to_connector_rx) = flume::unbounded::<Message>();
    let connector_queued = Arc::new(AtomicUsize::new(0));
    let binder_queued = Arc::new(AtomicUsize::new(0));

    let pipe = Pipe::new(
        connector_pipe,
        remote,
        TransportKind::Inproc,
        &connector.options(),
        to_binder_tx,
        Arc::clone(&connector_queued),
        None,
    );
    if !connector.attach(pipe) {
        return Outcome::Retry;
    }
    let pipe = Pipe::new(
        binder_pipe,
        local,
        TransportKind::Inproc,
        &binder.options(),
        to_connector_tx,
        Arc::clone(&binder_queued),
        None,
    );
    if !binder.attach(pipe) {
        connector.detach(connector_pipe);
        return Outcome::Retry;
    }

    connector.stats().incr(Statistic::EstablishedConnections);
    binder.stats().incr(Statistic::AcceptedConnections);
    connector_live.up();
    binder_live.up();

    let link = next_pipe_id();
    reg.links.insert(
        link,
        Link {
            binder: binder_key,
            connector: connector_key,
            liveness: [connector_live, Arc::clone(binder_live)],
            binder_side: (weak(binder), binder_pipe),
            connector_side: (weak(&connector), connector_pipe),
        },
    );

    let spawn = |name: String, pump: Pump| {
        thread::Builder::new()
            .name(name)
            .spawn(move || pump.run())
            .map(|_| ())
    };
    let forward = Pump {
        rx: to_binder_rx,
        target: weak(binder),
        target_pipe: binder_pipe,
        source: weak(&connector),
        queued: connector_queued,
        link,
    };
    let backward = Pump {
        rx: to_connector_rx,
        target: weak(&connector),
        target_pipe: connector_pipe,
        source: weak(binder),
        queued: binder_queued,
        link,
    };
    let spawned = spawn(format!("sp-inproc-{connector_pipe}"), forward)
        .and_then(|()| spawn(format!("sp-inproc-{binder_pipe}"), backward));
    if let Err(e) = spawned {
        warn!("failed to spawn inproc pump: {e}");
        if let Some(link) = reg.links.remove(&link) {
            link.liveness.iter().for_each(|l| l.down());
        }
        connector.detach(connector_pipe);
        binder.detach(binder_pipe);
        return Outcome::Retry;
    }

    debug!(
        "[{}] inproc link {connector_pipe} <-> {binder_pipe} established",
        connector.label()
    );
    Outcome::Linked
}

/// Moves one direction of an inproc link.
struct Pump {
    rx: flume::Receiver<Message>,
    target: Weak<dyn PipeHost>,
    target_pipe: PipeId,
    source: Weak<dyn PipeHost>,
    queued: Arc<AtomicUsize>,
    link: LinkId,
}

impl Pump {
    fn run(self) {
        while let Ok(msg) = self.rx.recv() {
            let cost = wire_len(&msg);
            let delivered = self
                .target
                .upgrade()
                .is_some_and(|target| target.deliver(self.target_pipe, msg));

            self.queued.fetch_sub(cost, Ordering::AcqRel);
            if let Some(source) = self.source.upgrade() {
                source.on_writable();
            }
            if !delivered {
                break;
            }
        }
        let link = REGISTRY.lock().links.remove(&self.link);
        if let Some(link) = link {
            sever(vec![link]);
        }
    }
}

/// Detach both pipes of each link, then park connectors that are still
/// active so they reattach on the next bind.
fn sever(links: Vec<Link>) {
    for link in &links {
        link.liveness.iter().for_each(|l| l.down());
        for (host, pipe) in [&link.connector_side, &link.binder_side] {
            if let Some(host) = host.upgrade() {
                host.detach(*pipe);
                host.stats().incr(Statistic::BrokenConnections);
            }
        }
    }

    let mut reg = REGISTRY.lock();
    for link in links {
        let Some(name) = reg.connectors.get(&link.connector).map(|c| c.name.clone()) else {
            continue;
        };
        let parked = reg.pending.entry(name).or_default();
        if !parked.contains(&link.connector) {
            parked.push(link.connector);
        }
    }
}

fn take_links(reg: &mut Registry, mut pred: impl FnMut(&Link) -> bool) -> Vec<Link> {
    let ids: Vec<LinkId> = reg
        .links
        .iter()
        .filter(|(_, link)| pred(link))
        .map(|(id, _)| *id)
        .collect();
    ids.into_iter().filter_map(|id| reg.links.remove(&id)).collect()
}

fn unbind(name: &str, key: EndpointKey) {
    let links = {
        let mut reg = REGISTRY.lock();
        if reg.binders.get(name).is_some_and(|b| b.key == key) {
            reg.binders.remove(name);
        }
        take_links(&mut reg, |link| link.binder == key)
    };
    trace!("inproc://{name} unbound, severing {} links", links.len());
    sever(links);
}

fn disconnect(key: EndpointKey) {
    let links = {
        let mut reg = REGISTRY.lock();
        if let Some(entry) = reg.connectors.remove(&key) {
            if let Some(parked) = reg.pending.get_mut(&entry.name) {
                parked.retain(|k| *k != key);
            }
        }
        take_links(&mut reg, |link| link.connector == key)
    };
    sever(links);
}
