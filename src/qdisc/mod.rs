use crate::packet_context::PacketContext;

mod fair_buffer;
mod fair_table;
mod notifier;
mod peer_queue;

pub use fair_buffer::{CreditPolicy, FairBuffer, QueueInfo, SleepPolicy, UnknownPeerPolicy};
pub use fair_table::FairTable;
pub use notifier::{EmptyNotifier, EmptySignal};
pub use peer_queue::PeerQueue;

pub trait Qdisc<T, K> {
    /// Hands the packet back when it is refused.
    fn enqueue(&mut self, ctx: PacketContext<T, K>) -> Result<(), PacketContext<T, K>>;
    fn dequeue(&mut self) -> Option<PacketContext<T, K>>;
    /// Packets discarded internally since the last call.
    fn collect_dropped(&mut self) -> Vec<PacketContext<T, K>> {
        Vec::new()
    }
}
