use std::collections::VecDeque;

use crate::{packet_context::PacketContext, qdisc::Qdisc};

// ==========================================
// Bounded per-peer FIFO (tail drop)
// ==========================================
pub struct PeerQueue<T, K> {
    queue: VecDeque<PacketContext<T, K>>,
    capacity: usize,
    bsize: usize, // bytes currently in `queue`

    // DRR state, only touched by the scheduler
    pub(crate) deficit: u64,
    // dequeued but refused for lack of deficit; goes out before `queue`
    pub(crate) held: Option<PacketContext<T, K>>,
}

impl<T, K> PeerQueue<T, K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
            bsize: 0,
            deficit: 0,
            held: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Packets waiting in the FIFO. The held head is not counted.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.bsize
    }

    pub fn deficit(&self) -> u64 {
        self.deficit
    }

    pub fn has_held(&self) -> bool {
        self.held.is_some()
    }

    /// No eviction: a queue already above the new bound just refuses
    /// enqueues until it drains below it.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn peek_head(&self) -> Option<&PacketContext<T, K>> {
        self.queue.front()
    }

    /// Empties the FIFO and the held slot, oldest packet first.
    pub fn drain(&mut self) -> Vec<PacketContext<T, K>> {
        let mut out = Vec::with_capacity(self.queue.len() + 1);
        out.extend(self.held.take());
        out.extend(self.queue.drain(..));
        self.bsize = 0;
        self.deficit = 0;
        out
    }
}

impl<T, K> Qdisc<T, K> for PeerQueue<T, K> {
    fn enqueue(&mut self, ctx: PacketContext<T, K>) -> Result<(), PacketContext<T, K>> {
        if self.queue.len() >= self.capacity {
            return Err(ctx);
        }
        self.bsize += ctx.pkt_len;
        self.queue.push_back(ctx);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<PacketContext<T, K>> {
        let ctx = self.queue.pop_front()?;
        self.bsize -= ctx.pkt_len;
        Some(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt(len: usize) -> PacketContext<Vec<u8>, u8> {
        PacketContext::new(vec![0u8; len], 0, 0)
    }

    #[test]
    fn tracks_size_and_bytes() {
        let mut q = PeerQueue::new(4);
        q.enqueue(pkt(100)).unwrap();
        q.enqueue(pkt(40)).unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q.byte_size(), 140);

        assert_eq!(q.peek_head().map(|c| c.pkt_len), Some(100));
        assert_eq!(q.dequeue().map(|c| c.pkt_len), Some(100));
        assert_eq!(q.len(), 1);
        assert_eq!(q.byte_size(), 40);

        q.dequeue().unwrap();
        assert!(q.dequeue().is_none());
        assert_eq!(q.byte_size(), 0);
    }

    #[test]
    fn refuses_when_full_and_leaves_queue_alone() {
        let mut q = PeerQueue::new(2);
        q.enqueue(pkt(10)).unwrap();
        q.enqueue(pkt(20)).unwrap();

        let refused = q.enqueue(pkt(30)).unwrap_err();
        assert_eq!(refused.pkt_len, 30);
        assert_eq!(q.len(), 2);
        assert_eq!(q.byte_size(), 30);
    }

    #[test]
    fn shrinking_capacity_does_not_evict() {
        let mut q = PeerQueue::new(3);
        for _ in 0..3 {
            q.enqueue(pkt(1)).unwrap();
        }
        q.set_capacity(1);
        assert_eq!(q.len(), 3);
        assert!(q.enqueue(pkt(1)).is_err());

        q.dequeue();
        q.dequeue();
        assert!(q.enqueue(pkt(1)).is_err());
        q.dequeue();
        assert!(q.enqueue(pkt(1)).is_ok());
    }

    #[test]
    fn drain_puts_held_head_first() {
        let mut q = PeerQueue::new(4);
        q.enqueue(pkt(1)).unwrap();
        q.enqueue(pkt(2)).unwrap();
        q.held = q.dequeue();
        q.enqueue(pkt(3)).unwrap();
        q.deficit = 7;

        let lens: Vec<_> = q.drain().into_iter().map(|c| c.pkt_len).collect();
        assert_eq!(lens, vec![1, 2, 3]);
        assert!(!q.has_held());
        assert_eq!(q.byte_size(), 0);
        assert_eq!(q.deficit(), 0);
    }
}
