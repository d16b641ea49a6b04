use std::collections::VecDeque;
use std::net::TcpStream;

/// Client sockets owned by one worker, using slab allocation with a freelist
///
/// The slot index is what goes into the epoll token, so a readiness event
/// maps back to its stream without a hash lookup. Taking a stream out and
/// dropping it closes the descriptor, which also drops it from epoll.
pub struct ClientTable {
    slots: Vec<Option<TcpStream>>,
    freelist: VecDeque<usize>,
    live: usize,
}

impl ClientTable {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(initial_capacity),
            freelist: VecDeque::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, stream: TcpStream) -> usize {
        self.live += 1;
        if let Some(slot) = self.freelist.pop_front() {
            self.slots[slot] = Some(stream);
            return slot;
        }
        self.slots.push(Some(stream));
        self.slots.len() - 1
    }

    pub fn get(&self, slot: usize) -> Option<&TcpStream> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Remove the stream from its slot and free the slot for reuse.
    pub fn take(&mut self, slot: usize) -> Option<TcpStream> {
        let stream = self.slots.get_mut(slot).and_then(|s| s.take())?;
        self.freelist.push_back(slot);
        self.live -= 1;
        Some(stream)
    }

    /// Number of open client sockets.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn pair(listener: &TcpListener) -> TcpStream {
        TcpStream::connect(listener.local_addr().unwrap()).unwrap()
    }

    #[test]
    fn freed_slots_are_reused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut table = ClientTable::with_capacity(4);

        let a = table.insert(pair(&listener));
        let b = table.insert(pair(&listener));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);

        assert!(table.take(a).is_some());
        assert_eq!(table.len(), 1);
        assert!(table.get(a).is_none());

        let c = table.insert(pair(&listener));
        assert_eq!(c, a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn taking_twice_yields_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut table = ClientTable::with_capacity(1);

        let slot = table.insert(pair(&listener));
        assert!(table.take(slot).is_some());
        assert!(table.take(slot).is_none());
        assert!(table.take(99).is_none());
        assert!(table.is_empty());
    }
}
