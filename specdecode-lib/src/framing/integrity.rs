use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT with polynomial 0x1021, initial value 0xFFFF, MSB first and no
/// final xor (a.k.a. CCITT-FALSE).
const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Frame CRC over the given bytes.
#[must_use]
pub fn crc16(dat: &[u8]) -> u16 {
    CCITT.checksum(dat)
}

/// Frame CRC over the header followed by the payload, without concatenating them.
#[must_use]
pub fn frame_crc(header: &[u8], payload: &[u8]) -> u16 {
    let mut digest = CCITT.digest();
    digest.update(header);
    digest.update(payload);
    digest.finalize()
}
