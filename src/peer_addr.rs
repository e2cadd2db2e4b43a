// peer_addr.rs
use std::fmt;
use std::str::FromStr;

use crate::error::{AddrParseError, FrameError};

/// Hardware address of a peer. The all-zero address stands in for
/// "no peer" on frames that could not be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAddr(pub [u8; 6]);

impl PeerAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    fn read_at(payload: &[u8], offset: usize) -> Self {
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&payload[offset..offset + 6]);
        Self(octets)
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

// Accepts both `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`
impl FromStr for PeerAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AddrParseError(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(|c| c == ':' || c == '-');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }

        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

impl From<[u8; 6]> for PeerAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

// ==========================================
// Peer extraction: which link-layer header the payload starts with
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameFormat {
    /// 802.11 data frame, keyed by the receiver address (addr1).
    #[default]
    Wifi,
    /// Ethernet II frame, keyed by the destination address.
    Ether,
}

impl FrameFormat {
    // frame control(2) + duration(2) + addr1..addr3(18) + seq ctl(2)
    const WIFI_HEADER_LEN: usize = 24;
    const WIFI_ADDR1_OFFSET: usize = 4;
    const ETHER_HEADER_LEN: usize = 14;

    pub fn min_len(self) -> usize {
        match self {
            FrameFormat::Wifi => Self::WIFI_HEADER_LEN,
            FrameFormat::Ether => Self::ETHER_HEADER_LEN,
        }
    }

    pub fn extract(self, payload: &[u8]) -> Result<PeerAddr, FrameError> {
        let need = self.min_len();
        if payload.len() < need {
            return Err(FrameError::TooShort {
                len: payload.len(),
                need,
            });
        }

        let addr = match self {
            FrameFormat::Wifi => PeerAddr::read_at(payload, Self::WIFI_ADDR1_OFFSET),
            FrameFormat::Ether => PeerAddr::read_at(payload, 0),
        };
        Ok(addr)
    }
}

impl FromStr for FrameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wifi" | "80211" => Ok(FrameFormat::Wifi),
            "ether" | "ethernet" => Ok(FrameFormat::Ether),
            other => Err(format!("unknown frame format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_addresses() {
        let addr: PeerAddr = "00:1b:44:11:3a:b7".parse().unwrap();
        assert_eq!(addr.octets(), [0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
        assert_eq!(addr.to_string(), "00:1B:44:11:3A:B7");
        assert_eq!("00-1B-44-11-3A-B7".parse::<PeerAddr>().unwrap(), addr);
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!("00:1b:44:11:3a".parse::<PeerAddr>().is_err());
        assert!("00:1b:44:11:3a:b7:01".parse::<PeerAddr>().is_err());
        assert!("00:1b:44:11:3a:zz".parse::<PeerAddr>().is_err());
        assert!("001b:44:11:3a:b7:00".parse::<PeerAddr>().is_err());
    }

    #[test]
    fn wifi_frames_are_keyed_by_addr1() {
        let mut frame = vec![0u8; 30];
        frame[4..10].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        frame[10..16].copy_from_slice(&[9, 9, 9, 9, 9, 9]);
        assert_eq!(
            FrameFormat::Wifi.extract(&frame),
            Ok(PeerAddr::new([1, 2, 3, 4, 5, 6]))
        );
    }

    #[test]
    fn ether_frames_are_keyed_by_destination() {
        let mut frame = vec![0u8; 14];
        frame[0..6].copy_from_slice(&[0xaa; 6]);
        assert_eq!(
            FrameFormat::Ether.extract(&frame),
            Ok(PeerAddr::new([0xaa; 6]))
        );
    }

    #[test]
    fn short_frames_fail_extraction() {
        assert_eq!(
            FrameFormat::Wifi.extract(&[0u8; 23]),
            Err(FrameError::TooShort { len: 23, need: 24 })
        );
        assert!(FrameFormat::Ether.extract(&[]).is_err());
    }
}
