//! Attached pipes of one socket and the outbound routing primitives the
//! protocol engines build on.

use hashbrown::HashMap;
use smallvec::SmallVec;

use nanosp_core::message::Message;
use nanosp_core::transport::{Pipe, PipeId};

/// Pipes in attach order.
#[derive(Debug, Default)]
pub(crate) struct PipeTable {
    pipes: HashMap<PipeId, Pipe>,
    order: Vec<PipeId>,
    /// Round-robin position in `order`
    cursor: usize,
}

impl PipeTable {
    pub(crate) fn insert(&mut self, pipe: Pipe) {
        let id = pipe.id();
        if self.pipes.insert(id, pipe).is_none() {
            self.order.push(id);
        }
    }

    pub(crate) fn remove(&mut self, id: PipeId) -> Option<Pipe> {
        let pipe = self.pipes.remove(&id)?;
        if let Some(pos) = self.order.iter().position(|p| *p == id) {
            self.order.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
        Some(pipe)
    }

    pub(crate) fn drain(&mut self) -> Vec<Pipe> {
        self.order.clear();
        self.cursor = 0;
        self.pipes.drain().map(|(_, p)| p).collect()
    }

    #[inline]
    pub(crate) fn contains(&self, id: PipeId) -> bool {
        self.pipes.contains_key(&id)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn first(&self) -> Option<&Pipe> {
        self.order.first().and_then(|id| self.pipes.get(id))
    }

    /// Bytes still queued across all pipes.
    pub(crate) fn queued_bytes(&self) -> usize {
        self.pipes.values().map(Pipe::queued_bytes).sum()
    }

    pub(crate) fn any_writable(&self) -> bool {
        self.pipes.values().any(Pipe::is_writable)
    }

    /// Queue on one specific pipe.
    pub(crate) fn send_to(&self, id: PipeId, msg: Message) -> Result<(), Message> {
        match self.pipes.get(&id) {
            Some(pipe) => pipe.try_send(msg),
            None => Err(msg),
        }
    }

    /// Queue a copy on every writable pipe except `skip`. Full pipes miss
    /// the message. Returns how many pipes took it.
    pub(crate) fn broadcast(&self, msg: &Message, skip: Option<PipeId>) -> usize {
        let targets: SmallVec<[&Pipe; 8]> = self
            .order
            .iter()
            .filter(|id| Some(**id) != skip)
            .filter_map(|id| self.pipes.get(id))
            .collect();
        targets
            .into_iter()
            .filter(|pipe| pipe.try_send(msg.clone()).is_ok())
            .count()
    }

    /// Queue on the next writable pipe with the best (lowest) priority,
    /// rotating among pipes of equal priority.
    pub(crate) fn load_balance(&mut self, msg: Message) -> Result<PipeId, Message> {
        let Some(best) = self
            .pipes
            .values()
            .filter(|p| p.is_writable())
            .map(Pipe::priority)
            .min()
        else {
            return Err(msg);
        };

        let n = self.order.len();
        let mut msg = msg;
        for step in 0..n {
            let idx = (self.cursor + step) % n;
            let id = self.order[idx];
            let Some(pipe) = self.pipes.get(&id) else {
                continue;
            };
            if pipe.priority() != best || !pipe.is_writable() {
                continue;
            }
            match pipe.try_send(msg) {
                Ok(()) => {
                    self.cursor = (idx + 1) % n;
                    return Ok(id);
                }
                Err(back) => msg = back,
            }
        }
        Err(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanosp_core::options::SocketOptions;
    use nanosp_core::protocol::Protocol;

    fn pipe(priority: u8, budget: usize) -> (Pipe, flume::Receiver<Message>) {
        let mut options = SocketOptions::default().with_send_buffer(budget);
        options.send_priority = priority;
        Pipe::unbound(Protocol::Pull, &options)
    }

    #[test]
    fn test_round_robin() {
        let mut table = PipeTable::default();
        let (a, rx_a) = pipe(8, 1 << 20);
        let (b, rx_b) = pipe(8, 1 << 20);
        let (id_a, id_b) = (a.id(), b.id());
        table.insert(a);
        table.insert(b);

        let chosen: Vec<PipeId> = (0..4)
            .map(|i| table.load_balance(Message::new(vec![i])).unwrap())
            .collect();
        assert_eq!(chosen, vec![id_a, id_b, id_a, id_b]);
        assert_eq!(rx_a.len(), 2);
        assert_eq!(rx_b.len(), 2);
    }

    #[test]
    fn test_priority_preferred() {
        let mut table = PipeTable::default();
        let (low, rx_low) = pipe(8, 1 << 20);
        let (high, rx_high) = pipe(1, 1 << 20);
        table.insert(low);
        table.insert(high);

        for _ in 0..3 {
            table.load_balance(Message::new("x")).unwrap();
        }
        assert_eq!(rx_high.len(), 3);
        assert!(rx_low.is_empty());
    }

    #[test]
    fn test_full_pipe_is_skipped() {
        let mut table = PipeTable::default();
        let (tiny, rx_tiny) = pipe(1, 1);
        let (roomy, rx_roomy) = pipe(8, 1 << 20);
        table.insert(tiny);
        table.insert(roomy);

        // The empty pipe always takes one message, then it is full.
        table.load_balance(Message::new("a")).unwrap();
        table.load_balance(Message::new("b")).unwrap();
        assert_eq!(rx_tiny.len(), 1);
        assert_eq!(rx_roomy.len(), 1);
        assert_eq!(table.broadcast(&Message::new("c"), None), 1);
    }

    #[test]
    fn test_broadcast_skip_and_remove() {
        let mut table = PipeTable::default();
        let (a, rx_a) = pipe(8, 1 << 20);
        let (b, rx_b) = pipe(8, 1 << 20);
        let id_a = a.id();
        table.insert(a);
        table.insert(b);

        assert_eq!(table.broadcast(&Message::new("m"), Some(id_a)), 1);
        assert!(rx_a.is_empty());
        assert_eq!(rx_b.len(), 1);

        assert!(table.remove(id_a).is_some());
        assert!(!table.contains(id_a));
        assert_eq!(table.len(), 1);
        assert!(table.load_balance(Message::new("n")).is_ok());
    }

    #[test]
    fn test_no_pipes() {
        let mut table = PipeTable::default();
        assert!(table.load_balance(Message::new("x")).is_err());
        assert_eq!(table.broadcast(&Message::new("x"), None), 0);
    }
}
