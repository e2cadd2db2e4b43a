//! Text read/write handlers for poking at a running buffer.
//!
//! Reads return a newline-terminated value (or the CSV table for
//! `list_queues`); writes take the raw text the operator typed.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use crate::error::AdminError;
use crate::qdisc::FairBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Drops,
    ByteDrops,
    Capacity,
    ListQueues,
    Quantum,
    MalformedDrops,
    UnknownPeerDrops,
    Backlog,
}

impl Handler {
    pub const ALL: [Handler; 8] = [
        Handler::Drops,
        Handler::ByteDrops,
        Handler::Capacity,
        Handler::ListQueues,
        Handler::Quantum,
        Handler::MalformedDrops,
        Handler::UnknownPeerDrops,
        Handler::Backlog,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Handler::Drops => "drops",
            Handler::ByteDrops => "byte_drops",
            Handler::Capacity => "capacity",
            Handler::ListQueues => "list_queues",
            Handler::Quantum => "quantum",
            Handler::MalformedDrops => "malformed_drops",
            Handler::UnknownPeerDrops => "unknown_peer_drops",
            Handler::Backlog => "backlog",
        }
    }

    pub fn writable(self) -> bool {
        matches!(self, Handler::Capacity)
    }
}

impl FromStr for Handler {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Handler::ALL
            .into_iter()
            .find(|h| h.name() == s)
            .ok_or_else(|| AdminError::UnknownHandler(s.to_string()))
    }
}

pub fn read_handler<T, K>(fb: &FairBuffer<T, K>, name: &str) -> Result<String, AdminError>
where
    K: Hash + Eq + Clone + Debug + Display,
{
    let value = match name.parse::<Handler>()? {
        Handler::Drops => fb.drops().to_string(),
        Handler::ByteDrops => fb.byte_drops().to_string(),
        Handler::Capacity => fb.capacity().to_string(),
        Handler::ListQueues => return Ok(fb.list_queues()),
        Handler::Quantum => fb.quantum().to_string(),
        Handler::MalformedDrops => fb.malformed_drops().to_string(),
        Handler::UnknownPeerDrops => fb.unknown_peer_drops().to_string(),
        Handler::Backlog => fb.backlog().to_string(),
    };
    Ok(value + "\n")
}

/// Applies a write. On error nothing is changed.
pub fn write_handler<T, K>(fb: &mut FairBuffer<T, K>, name: &str, value: &str) -> Result<(), AdminError>
where
    K: Hash + Eq + Clone + Debug,
{
    let handler = name.parse::<Handler>()?;
    if !handler.writable() {
        return Err(AdminError::NotWritable(handler.name().to_string()));
    }

    let capacity = parse_unsigned(value)?;
    fb.set_capacity(capacity);
    Ok(())
}

// Strips `//` and `#` comments before parsing, like a config line
fn parse_unsigned(value: &str) -> Result<usize, AdminError> {
    let uncommented = value
        .split("//")
        .next()
        .and_then(|s| s.split('#').next())
        .unwrap_or_default()
        .trim();
    uncommented
        .parse::<usize>()
        .map_err(|_| AdminError::InvalidCapacity(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FairBufferOptions;
    use crate::packet_context::PacketContext;
    use crate::peer_addr::PeerAddr;

    fn buffer() -> FairBuffer<Vec<u8>, PeerAddr> {
        FairBuffer::new(FairBufferOptions::default().capacity(1).quantum(500))
    }

    #[test]
    fn reads_counters() {
        let mut fb = buffer();
        let peer = PeerAddr::new([1; 6]);
        fb.admit(peer);
        fb.push(PacketContext::new(vec![0u8; 10], peer, 0)).unwrap();
        assert!(fb.push(PacketContext::new(vec![0u8; 33], peer, 0)).is_err());

        assert_eq!(read_handler(&fb, "drops").unwrap(), "1\n");
        assert_eq!(read_handler(&fb, "byte_drops").unwrap(), "33\n");
        assert_eq!(read_handler(&fb, "capacity").unwrap(), "1\n");
        assert_eq!(read_handler(&fb, "quantum").unwrap(), "500\n");
        assert_eq!(read_handler(&fb, "backlog").unwrap(), "1\n");
        assert_eq!(
            read_handler(&fb, "list_queues").unwrap(),
            "Key,Capacity,Packets,Bytes\n01:01:01:01:01:01,1,1,10\n"
        );
    }

    #[test]
    fn unknown_handler_is_an_error() {
        let mut fb = buffer();
        assert_eq!(
            read_handler(&fb, "nope"),
            Err(AdminError::UnknownHandler("nope".into()))
        );
        assert!(write_handler(&mut fb, "nope", "1").is_err());
    }

    #[test]
    fn writes_capacity() {
        let mut fb = buffer();
        write_handler(&mut fb, "capacity", " 250 // bigger\n").unwrap();
        assert_eq!(fb.capacity(), 250);
    }

    #[test]
    fn bad_writes_change_nothing() {
        let mut fb = buffer();
        assert_eq!(
            write_handler(&mut fb, "capacity", "lots"),
            Err(AdminError::InvalidCapacity("lots".into()))
        );
        assert!(write_handler(&mut fb, "capacity", "-3").is_err());
        assert_eq!(
            write_handler(&mut fb, "drops", "0"),
            Err(AdminError::NotWritable("drops".into()))
        );
        assert_eq!(fb.capacity(), 1);
    }
}
