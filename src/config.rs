use crate::peer_addr::FrameFormat;
use crate::qdisc::{CreditPolicy, SleepPolicy, UnknownPeerPolicy};

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_QUANTUM: u64 = 1470;
pub const DEFAULT_SLEEPINESS_TRIGGER: u32 = 2;

#[derive(Debug, Clone)]
pub struct FairBufferOptions {
    /// Packet capacity given to newly admitted peers.
    pub(crate) capacity: usize,
    /// Bytes of credit granted per scheduling visit.
    pub(crate) quantum: u64,
    /// Consecutive unproductive pulls before signalling "empty".
    pub(crate) sleepiness_trigger: u32,
    pub(crate) unknown_peer: UnknownPeerPolicy,
    pub(crate) credit: CreditPolicy,
    pub(crate) sleep: SleepPolicy,
    pub(crate) frame_format: FrameFormat,
}

impl Default for FairBufferOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            quantum: DEFAULT_QUANTUM,
            sleepiness_trigger: DEFAULT_SLEEPINESS_TRIGGER,
            unknown_peer: UnknownPeerPolicy::default(),
            credit: CreditPolicy::default(),
            sleep: SleepPolicy::default(),
            frame_format: FrameFormat::default(),
        }
    }
}

impl FairBufferOptions {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn quantum(mut self, quantum: u64) -> Self {
        self.quantum = quantum;
        self
    }

    /// Clamped to at least 1.
    pub fn sleepiness_trigger(mut self, trigger: u32) -> Self {
        self.sleepiness_trigger = trigger.max(1);
        self
    }

    pub fn unknown_peer(mut self, policy: UnknownPeerPolicy) -> Self {
        self.unknown_peer = policy;
        self
    }

    pub fn credit(mut self, policy: CreditPolicy) -> Self {
        self.credit = policy;
        self
    }

    pub fn sleep(mut self, policy: SleepPolicy) -> Self {
        self.sleep = policy;
        self
    }

    pub fn frame_format(mut self, format: FrameFormat) -> Self {
        self.frame_format = format;
        self
    }
}
