//! Frame synchronization for the raw downlink byte stream.
//!
//! Frames on the wire look like this:
//!
//! ```text
//! | 0xEC 0xA0 | header (6) | payload (declared_length + 1) | CRC-16 (2, big-endian) |
//! ```
//!
//! The header is a CCSDS-style primary header. Frames may be separated by `0xA5`
//! filler bytes or arbitrary garbage; the [FrameSynchronizer] resynchronizes on the
//! next marker automatically.
mod bytes;
mod integrity;
mod synchronizer;

pub use integrity::*;
pub use synchronizer::*;

use serde::{Deserialize, Serialize};

pub type Apid = u16;

/// Default frame sync marker.
pub const SYNC_MARKER: u16 = 0xECA0;
/// Default filler byte inserted between frames by the transport.
pub const FILLER: u8 = 0xA5;

/// Frame primary header.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub packet_type: u8,
    pub has_secondary_header: bool,
    pub apid: Apid,
    /// Fragment grouping. Only [FrameHeader::GROUP_TERMINAL] ends a logical packet.
    pub group_flags: u8,
    pub sequence_count: u16,
    /// Number of payload bytes minus 1.
    pub declared_length: u16,
}

impl FrameHeader {
    /// Size of a ``FrameHeader``
    pub const LEN: usize = 6;
    pub const SEQ_MAX: u16 = 16383;
    /// Group flags value marking the last fragment of a logical packet.
    pub const GROUP_TERMINAL: u8 = 3;

    /// Decode from bytes. Returns `None` if there are not enough bytes to construct the
    /// header.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        let d1 = u16::from_be_bytes([buf[0], buf[1]]);
        let d2 = u16::from_be_bytes([buf[2], buf[3]]);
        let d3 = u16::from_be_bytes([buf[4], buf[5]]);

        Some(FrameHeader {
            version: (d1 >> 13 & 0x7) as u8,
            packet_type: (d1 >> 12 & 0x1) as u8,
            has_secondary_header: (d1 >> 11 & 0x1) == 1,
            apid: (d1 & 0x7ff),
            group_flags: (d2 >> 14 & 0x3) as u8,
            sequence_count: (d2 & 0x3fff),
            declared_length: d3,
        })
    }

    /// Encode to wire bytes. Fields wider than their bit allocation are masked.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::LEN] {
        let d1 = (u16::from(self.version) & 0x7) << 13
            | (u16::from(self.packet_type) & 0x1) << 12
            | u16::from(self.has_secondary_header) << 11
            | (self.apid & 0x7ff);
        let d2 = (u16::from(self.group_flags) & 0x3) << 14 | (self.sequence_count & 0x3fff);
        let [a, b] = d1.to_be_bytes();
        let [c, d] = d2.to_be_bytes();
        let [e, f] = self.declared_length.to_be_bytes();
        [a, b, c, d, e, f]
    }

    /// Number of payload bytes following the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.declared_length as usize + 1
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.group_flags == Self::GROUP_TERMINAL
    }
}

/// A single synchronized frame.
///
/// `payload` is exactly as received, i.e., still 16-bit word swapped.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
    /// CRC from the frame trailer.
    pub crc: u16,
    /// False when `crc` does not match the CRC computed over header and payload.
    pub crc_valid: bool,
    /// Byte offset of the sync marker in the source stream.
    pub offset: usize,
}

/// Calculate the number of missing sequence counts.
///
/// `cur` is the current sequence count. `last` is the sequence count seen before `cur`.
#[must_use]
pub fn missing_packets(cur: u16, last: u16) -> u16 {
    let expected = if last + 1 > FrameHeader::SEQ_MAX {
        0
    } else {
        last + 1
    };
    if cur != expected {
        if last + 1 > cur {
            return cur + FrameHeader::SEQ_MAX - last;
        }
        return cur - last - 1;
    }
    0
}
