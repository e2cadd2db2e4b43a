//! Fair per-peer packet buffer.
//!
//! Packets are pushed into one bounded queue per peer (keyed by hardware
//! address) and pulled out one scheduling step at a time by a deficit
//! round robin over the admitted peers. An empty/active signal tells the
//! consumer when pulling is worth it.

pub mod admin;
pub mod config;
pub mod error;
pub mod packet_context;
pub mod peer_addr;
pub mod qdisc;

pub use config::FairBufferOptions;
pub use error::{AdminError, DropReason, FrameError, Rejected};
pub use packet_context::PacketContext;
pub use peer_addr::{FrameFormat, PeerAddr};
pub use qdisc::{
    CreditPolicy, EmptySignal, FairBuffer, Qdisc, QueueInfo, SleepPolicy, UnknownPeerPolicy,
};
