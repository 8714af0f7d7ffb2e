#![allow(dead_code)]

use rand::{rngs::StdRng, Rng, SeedableRng};
use specdecode::framing::{crc16, FrameHeader, FILLER};

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// Header for a frame carrying `len` payload bytes.
pub fn header(apid: u16, seq: u16, group_flags: u8, len: usize) -> FrameHeader {
    FrameHeader {
        version: 0,
        packet_type: 0,
        has_secondary_header: false,
        apid,
        group_flags,
        sequence_count: seq,
        declared_length: (len - 1) as u16,
    }
}

/// A complete frame on the wire: marker, header, payload and a valid CRC.
pub fn frame(apid: u16, seq: u16, group_flags: u8, payload: &[u8]) -> Vec<u8> {
    let head = header(apid, seq, group_flags, payload.len()).encode();
    let mut covered = head.to_vec();
    covered.extend_from_slice(payload);

    let mut dat = vec![0xec, 0xa0];
    dat.extend_from_slice(&covered);
    dat.extend_from_slice(&crc16(&covered).to_be_bytes());
    dat
}

/// Builds a downlink stream while keeping count of what went into it.
#[derive(Default)]
pub struct StreamBuilder {
    pub bytes: Vec<u8>,
    pub frames: usize,
    pub garbage: usize,
    pub filler: usize,
}

impl StreamBuilder {
    pub fn frame(&mut self, apid: u16, seq: u16, group_flags: u8, payload: &[u8]) -> &mut Self {
        self.bytes.extend(frame(apid, seq, group_flags, payload));
        self.frames += 1;
        self
    }

    pub fn filler(&mut self, n: usize) -> &mut Self {
        self.bytes.extend(std::iter::repeat(FILLER).take(n));
        self.filler += n;
        self
    }

    /// Random bytes that can neither be mistaken for filler nor start a marker.
    pub fn garbage(&mut self, rng: &mut StdRng, n: usize) -> &mut Self {
        for _ in 0..n {
            let b = loop {
                let b: u8 = rng.gen();
                if b != FILLER && b != 0xec {
                    break b;
                }
            };
            self.bytes.push(b);
        }
        self.garbage += n;
        self
    }
}

/// A random value whose magnitude has exactly `lz` leading zeros. For `lz == 0` the
/// only representable value is `i32::MIN`.
pub fn value_with_lz(rng: &mut StdRng, lz: u32, negative: bool) -> i32 {
    match lz {
        32 => 0,
        0 => i32::MIN,
        _ => {
            let top = 1u32 << (31 - lz);
            let a = (top | rng.gen_range(0..top)) as i32;
            if negative {
                -a
            } else {
                a
            }
        }
    }
}
