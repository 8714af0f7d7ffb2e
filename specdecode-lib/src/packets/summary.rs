use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::framing::{missing_packets, Apid, FrameHeader, RawFrame};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ApidSummary {
    pub frames: usize,
    pub bytes: usize,
    pub crc_errors: usize,
    pub missing: usize,
}

/// Tracks per-application-id stats over a frame stream.
///
/// # Example
/// ```
/// use specdecode::framing::decode_frames;
/// use specdecode::packets::Summary;
///
/// let (frames, _) = decode_frames(&[][..]).unwrap();
/// let mut summary = Summary::default();
/// frames.iter().for_each(|f| summary.add(f));
/// assert_eq!(summary.frames, 0);
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub frames: usize,
    pub bytes: usize,
    pub crc_errors: usize,
    pub missing: usize,
    pub apids: HashMap<Apid, ApidSummary>,

    #[serde(skip)]
    seen_headers: HashMap<Apid, FrameHeader>,
}

impl Summary {
    pub fn add(&mut self, frame: &RawFrame) {
        self.frames += 1;
        self.bytes += frame.payload.len();

        let hdr = frame.header;
        let apid = self.apids.entry(hdr.apid).or_default();
        apid.frames += 1;
        apid.bytes += frame.payload.len();
        if !frame.crc_valid {
            apid.crc_errors += 1;
            self.crc_errors += 1;
        }

        if let Some(last_hdr) = self.seen_headers.get(&hdr.apid) {
            let missing =
                missing_packets(hdr.sequence_count, last_hdr.sequence_count) as usize;
            apid.missing += missing;
            self.missing += missing;
        }
        self.seen_headers.insert(hdr.apid, hdr);
    }
}
