use nfq::{Message, Verdict};

/// NFQUEUE message held by the buffer; the payload is the link-layer
/// frame the peer address is read from.
pub struct NfqMessage(Message);

impl NfqMessage {
    /// Hands the message back to the kernel side with a verdict attached.
    pub fn with_verdict(self, verdict: Verdict) -> Message {
        let mut msg = self.0;
        msg.set_verdict(verdict);
        msg
    }
}

impl AsRef<[u8]> for NfqMessage {
    fn as_ref(&self) -> &[u8] {
        self.0.get_payload()
    }
}

impl From<Message> for NfqMessage {
    fn from(value: Message) -> Self {
        Self(value)
    }
}
