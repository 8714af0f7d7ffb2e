//! Reassembly of logical packets from synchronized frames.
//!
//! Instrument packets larger than a single frame are split into a run of
//! continuation frames followed by one terminal frame (group flags `0b11`).
//! [collate] merges each run into a [LogicalPacket], undoing the 16-bit word swap
//! applied to frame payloads on the wire.
mod summary;
mod uid;

pub use summary::*;
pub use uid::*;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::framing::{Apid, RawFrame};

/// An application packet reassembled from one or more frames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LogicalPacket {
    pub apid: Apid,
    /// Sequence count of the first fragment.
    pub start_seq: u16,
    /// Sequence count of the terminal fragment.
    pub end_seq: u16,
    /// Concatenated, word-swapped fragment payloads.
    pub payload: Vec<u8>,
    pub single_fragment: bool,
    /// Correlation identifier, set by [resolve_unique_ids].
    pub unique_id: Option<u32>,
    /// Number of frames merged into this packet.
    pub fragments: usize,
    /// True when every fragment passed its CRC check.
    pub crc_valid: bool,
    /// True when the application id changed while fragments were accumulating.
    pub apid_drift: bool,
}

/// Swap each complete pair of bytes. A trailing odd byte is kept as is.
#[must_use]
pub fn swap_words(dat: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(dat.len());
    let chunks = dat.chunks_exact(2);
    let rem = chunks.remainder();
    for pair in chunks {
        out.push(pair[1]);
        out.push(pair[0]);
    }
    out.extend_from_slice(rem);
    out
}

/// Iterator merging frames into [LogicalPacket]s. Created by [collate].
pub struct Collator<I>
where
    I: Iterator<Item = RawFrame>,
{
    frames: I,
    buf: Vec<u8>,
    apid: Option<Apid>,
    start_seq: u16,
    fragments: usize,
    crc_valid: bool,
    apid_drift: bool,
    dropped: usize,
}

impl<I> Collator<I>
where
    I: Iterator<Item = RawFrame>,
{
    fn new(frames: I) -> Self {
        Collator {
            frames,
            buf: Vec::new(),
            apid: None,
            start_seq: 0,
            fragments: 0,
            crc_valid: true,
            apid_drift: false,
            dropped: 0,
        }
    }

    /// Number of incomplete fragment runs discarded at end of input.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn reset(&mut self) {
        self.buf = Vec::new();
        self.apid = None;
        self.fragments = 0;
        self.crc_valid = true;
        self.apid_drift = false;
    }
}

impl<I> Iterator for Collator<I>
where
    I: Iterator<Item = RawFrame>,
{
    type Item = LogicalPacket;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(frame) = self.frames.next() else {
                if self.fragments > 0 {
                    warn!(
                        apid = self.apid,
                        start_seq = self.start_seq,
                        fragments = self.fragments,
                        "input ended without a terminal fragment; dropping partial packet"
                    );
                    self.dropped += 1;
                    self.reset();
                }
                return None;
            };

            let hdr = frame.header;
            match self.apid {
                Some(apid) if apid != hdr.apid => {
                    warn!(
                        from = apid,
                        to = hdr.apid,
                        seq = hdr.sequence_count,
                        "application id changed inside a fragment run"
                    );
                    self.apid_drift = true;
                }
                Some(_) => {}
                None => self.start_seq = hdr.sequence_count,
            }
            self.apid = Some(hdr.apid);
            self.buf.extend(swap_words(&frame.payload));
            self.fragments += 1;
            self.crc_valid &= frame.crc_valid;

            trace!(
                apid = hdr.apid,
                seq = hdr.sequence_count,
                group_flags = hdr.group_flags,
                len = self.buf.len(),
                "fragment"
            );

            if !hdr.is_terminal() {
                continue;
            }

            let packet = LogicalPacket {
                apid: hdr.apid,
                start_seq: self.start_seq,
                end_seq: hdr.sequence_count,
                payload: std::mem::take(&mut self.buf),
                single_fragment: self.fragments == 1,
                unique_id: None,
                fragments: self.fragments,
                crc_valid: self.crc_valid,
                apid_drift: self.apid_drift,
            };
            self.reset();
            return Some(packet);
        }
    }
}

/// Merge an ordered sequence of frames into logical packets.
///
/// Exactly one packet is produced per terminal frame. Frames following the last
/// terminal frame are discarded with a warning.
pub fn collate<I>(frames: I) -> Collator<I::IntoIter>
where
    I: IntoIterator<Item = RawFrame>,
{
    Collator::new(frames.into_iter())
}
