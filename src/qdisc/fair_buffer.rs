use std::fmt::{self, Debug, Display};
use std::hash::Hash;

use tracing::{debug, trace, warn};

use crate::config::FairBufferOptions;
use crate::error::{DropReason, Rejected};
use crate::packet_context::PacketContext;
use crate::peer_addr::{FrameFormat, PeerAddr};
use crate::qdisc::{EmptyNotifier, EmptySignal, FairTable, PeerQueue, Qdisc};

/// What a push does with a packet for a peer that was never admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownPeerPolicy {
    /// Refuse the packet and count it in `unknown_peer_drops`.
    #[default]
    Drop,
    /// Admit the peer on the spot, then enqueue.
    Admit,
}

/// When the cursor's peer is granted a quantum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreditPolicy {
    /// On every pull that looks at the peer, so a backlogged peer keeps
    /// earning credit for as long as it keeps sending.
    #[default]
    PerVisit,
    /// Only when rotation arrives at the peer (classic DRR rounds).
    PerRound,
}

/// When repeated unproductive pulls may report the buffer as empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SleepPolicy {
    /// As soon as the sleepiness trigger is reached, even if some peer
    /// still has packets the rotation has not got to yet.
    #[default]
    AfterTrigger,
    /// Trigger reached and nothing buffered, so a consumer that stops on
    /// "empty" never strands a backlog.
    WhenIdle,
}

/// One row of the queue listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo<K> {
    pub peer: K,
    pub capacity: usize,
    pub packets: usize,
    pub bytes: usize,
}

// ==========================================
// Fair buffer: per-peer queues drained by DRR
// ==========================================
pub struct FairBuffer<T, K> {
    table: FairTable<T, K>,
    notifier: EmptyNotifier,

    capacity: usize,
    quantum: u64,
    credit: CreditPolicy,
    sleep: SleepPolicy,
    unknown_peer: UnknownPeerPolicy,
    frame_format: FrameFormat,

    // set when the cursor lands on a peer it has not credited yet
    fresh_visit: bool,
    // packets in FIFOs plus held heads
    backlog: usize,

    drops: u64,
    bdrops: u64,
    malformed: u64,
    unknown_drops: u64,

    // flushed by release/re-admit, waiting for `collect_dropped`
    pending_dropped: Vec<PacketContext<T, K>>,
}

impl<T, K> FairBuffer<T, K>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new(options: FairBufferOptions) -> Self {
        Self {
            table: FairTable::new(),
            notifier: EmptyNotifier::new(options.sleepiness_trigger),
            capacity: options.capacity,
            quantum: options.quantum,
            credit: options.credit,
            sleep: options.sleep,
            unknown_peer: options.unknown_peer,
            frame_format: options.frame_format,
            fresh_visit: true,
            backlog: 0,
            drops: 0,
            bdrops: 0,
            malformed: 0,
            unknown_drops: 0,
            pending_dropped: Vec::new(),
        }
    }

    /// Gives `peer` a fresh queue with the default capacity.
    ///
    /// Re-admitting a known peer replaces its queue in place: whatever it
    /// still buffered (held head included) is flushed to the dropped list
    /// and its deficit starts over. The first peer of an empty table
    /// becomes the cursor and wakes the consumer.
    pub fn admit(&mut self, peer: K) {
        let was_empty = self.table.is_empty();
        let was_cursor = self.table.cursor() == Some(&peer);
        let old = self
            .table
            .insert(peer.clone(), PeerQueue::new(self.capacity));

        if let Some(mut old) = old {
            let flushed = old.drain();
            debug!(?peer, flushed = flushed.len(), "queue replaced");
            self.discard(flushed);
            // the new queue under the cursor has not been credited yet
            if was_cursor {
                self.fresh_visit = true;
            }
        } else {
            debug!(?peer, capacity = self.capacity, "queue admitted");
        }

        if was_empty {
            self.fresh_visit = true;
            self.notifier.wake();
        }
    }

    /// Flushes and forgets `peer`. Returns false if it was not admitted.
    pub fn release(&mut self, peer: &K) -> bool {
        let was_cursor = self.table.cursor() == Some(peer);
        let Some(mut queue) = self.table.remove(peer) else {
            return false;
        };

        let flushed = queue.drain();
        debug!(?peer, flushed = flushed.len(), "queue released");
        self.discard(flushed);

        if self.table.is_empty() {
            self.notifier.sleep();
        } else if was_cursor {
            self.fresh_visit = true;
        }
        true
    }

    /// Releases every peer, e.g. on shutdown.
    pub fn release_all(&mut self) {
        for (peer, mut queue) in self.table.drain() {
            let flushed = queue.drain();
            debug!(?peer, flushed = flushed.len(), "queue released");
            self.discard(flushed);
        }
        self.notifier.sleep();
    }

    pub fn push(&mut self, ctx: PacketContext<T, K>) -> Result<(), Rejected<T, K>> {
        if !self.table.contains(&ctx.key) {
            match self.unknown_peer {
                UnknownPeerPolicy::Drop => {
                    self.unknown_drops += 1;
                    debug!(peer = ?ctx.key, "no queue for peer, dropping");
                    return Err(Rejected::new(DropReason::UnknownPeer, ctx));
                }
                UnknownPeerPolicy::Admit => self.admit(ctx.key.clone()),
            }
        }

        let Some(queue) = self.table.get_mut(&ctx.key) else {
            return Err(Rejected::new(DropReason::UnknownPeer, ctx));
        };

        match queue.enqueue(ctx) {
            Ok(()) => {
                self.backlog += 1;
                self.notifier.wake();
                Ok(())
            }
            Err(ctx) => {
                if self.drops == 0 {
                    warn!(peer = ?ctx.key, len = ctx.pkt_len, "queue overflow");
                }
                self.drops += 1;
                self.bdrops += ctx.pkt_len as u64;
                Err(Rejected::new(DropReason::Overflow, ctx))
            }
        }
    }

    /// One scheduling step. `None` does not mean the buffer is empty,
    /// only that this step moved the cursor instead of emitting; watch
    /// the notifier to know when to stop pulling.
    pub fn pull(&mut self) -> Option<PacketContext<T, K>> {
        let fresh = std::mem::replace(&mut self.fresh_visit, false);

        let Some(queue) = self.table.cursor_queue_mut() else {
            self.notifier.note_unproductive(false);
            return None;
        };

        if self.credit == CreditPolicy::PerVisit || fresh {
            queue.deficit = queue.deficit.saturating_add(self.quantum);
        }

        match queue.held.take().or_else(|| queue.dequeue()) {
            None => queue.deficit = 0,
            Some(ctx) => {
                let cost = ctx.pkt_len as u64;
                if cost <= queue.deficit {
                    queue.deficit -= cost;
                    trace!(peer = ?ctx.key, cost, deficit = queue.deficit, "emit");
                    self.backlog -= 1;
                    self.notifier.reset_sleepiness();
                    return Some(ctx);
                }
                trace!(peer = ?ctx.key, cost, deficit = queue.deficit, "hold");
                queue.held = Some(ctx);
            }
        }

        self.table.advance();
        self.fresh_visit = true;
        let keep_awake = self.sleep == SleepPolicy::WhenIdle && self.backlog > 0;
        self.notifier.note_unproductive(keep_awake);
        None
    }

    fn discard(&mut self, flushed: Vec<PacketContext<T, K>>) {
        self.backlog -= flushed.len();
        self.pending_dropped.extend(flushed);
    }

    pub fn list(&self) -> Vec<QueueInfo<K>> {
        self.table
            .iter()
            .map(|(peer, q)| QueueInfo {
                peer: peer.clone(),
                capacity: q.capacity(),
                packets: q.len(),
                bytes: q.byte_size(),
            })
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity for peers admitted from now on. Admitted queues keep
    /// theirs; see `set_peer_capacity`.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn set_peer_capacity(&mut self, peer: &K, capacity: usize) -> bool {
        match self.table.get_mut(peer) {
            Some(q) => {
                q.set_capacity(capacity);
                true
            }
            None => false,
        }
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    pub fn drops(&self) -> u64 {
        self.drops
    }

    pub fn byte_drops(&self) -> u64 {
        self.bdrops
    }

    pub fn malformed_drops(&self) -> u64 {
        self.malformed
    }

    pub fn unknown_peer_drops(&self) -> u64 {
        self.unknown_drops
    }

    /// Buffered packets over all peers, held heads included.
    pub fn backlog(&self) -> usize {
        self.backlog
    }

    pub fn peers(&self) -> usize {
        self.table.len()
    }

    pub fn contains(&self, peer: &K) -> bool {
        self.table.contains(peer)
    }

    pub fn queue(&self, peer: &K) -> Option<&PeerQueue<T, K>> {
        self.table.get(peer)
    }

    pub fn deficit(&self, peer: &K) -> Option<u64> {
        self.table.get(peer).map(PeerQueue::deficit)
    }

    pub fn cursor(&self) -> Option<&K> {
        self.table.cursor()
    }

    pub fn signal(&self) -> EmptySignal {
        self.notifier.signal()
    }

    pub fn notifier(&self) -> &EmptyNotifier {
        &self.notifier
    }

    /// Whether pulling is currently worthwhile.
    pub fn is_active(&self) -> bool {
        self.notifier.active()
    }
}

impl<T, K> FairBuffer<T, K>
where
    K: Hash + Eq + Clone + Debug + Display,
{
    /// CSV listing, header row first.
    pub fn list_queues(&self) -> String {
        let mut out = String::from("Key,Capacity,Packets,Bytes\n");
        for info in self.list() {
            out.push_str(&format!(
                "{},{},{},{}\n",
                info.peer, info.capacity, info.packets, info.bytes
            ));
        }
        out
    }
}

impl<T: AsRef<[u8]>> FairBuffer<T, PeerAddr> {
    /// Pushes a raw link-layer frame, keyed by the configured frame
    /// format. Frames too short to carry the header come back as
    /// `Malformed` with a zero peer address.
    pub fn push_raw(&mut self, msg: T, queue_num: usize) -> Result<(), Rejected<T, PeerAddr>> {
        match self.frame_format.extract(msg.as_ref()) {
            Ok(peer) => self.push(PacketContext::new(msg, peer, queue_num)),
            Err(error) => {
                if self.malformed == 0 {
                    warn!(%error, "dropping malformed frame");
                }
                self.malformed += 1;
                let ctx = PacketContext::new(msg, PeerAddr::default(), queue_num);
                Err(Rejected::new(DropReason::Malformed, ctx))
            }
        }
    }
}

impl<T, K> Default for FairBuffer<T, K>
where
    K: Hash + Eq + Clone + Debug,
{
    fn default() -> Self {
        Self::new(FairBufferOptions::default())
    }
}

impl<T, K: Debug> Debug for FairBuffer<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FairBuffer")
            .field("capacity", &self.capacity)
            .field("quantum", &self.quantum)
            .field("backlog", &self.backlog)
            .field("drops", &self.drops)
            .field("byte_drops", &self.bdrops)
            .finish_non_exhaustive()
    }
}

impl<T, K> Qdisc<T, K> for FairBuffer<T, K>
where
    K: Hash + Eq + Clone + Debug,
{
    fn enqueue(&mut self, ctx: PacketContext<T, K>) -> Result<(), PacketContext<T, K>> {
        self.push(ctx).map_err(Rejected::into_packet)
    }

    fn dequeue(&mut self) -> Option<PacketContext<T, K>> {
        self.pull()
    }

    fn collect_dropped(&mut self) -> Vec<PacketContext<T, K>> {
        std::mem::take(&mut self.pending_dropped)
    }
}
