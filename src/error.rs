use thiserror::Error;

use crate::packet_context::PacketContext;

/// The extraction collaborator could not find a peer address in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hardware address: {0:?}")]
pub struct AddrParseError(pub String);

/// Why a push was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("malformed frame")]
    Malformed,
    #[error("peer has no queue")]
    UnknownPeer,
    #[error("queue overflow")]
    Overflow,
}

/// A refused packet, handed back so the caller can dispose of it.
#[derive(Debug)]
pub struct Rejected<T, K> {
    pub reason: DropReason,
    pub ctx: PacketContext<T, K>,
}

impl<T, K> Rejected<T, K> {
    pub fn new(reason: DropReason, ctx: PacketContext<T, K>) -> Self {
        Self { reason, ctx }
    }

    pub fn into_packet(self) -> PacketContext<T, K> {
        self.ctx
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("no such handler: {0}")]
    UnknownHandler(String),
    #[error("handler {0} is read-only")]
    NotWritable(String),
    #[error("parameter must be a positive integer, got {0:?}")]
    InvalidCapacity(String),
}
