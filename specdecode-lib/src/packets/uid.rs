//! Correlation identifiers for logical packets.
//!
//! Most instrument packets carry a 32-bit little-endian `unique_packet_id` that ties
//! together everything produced by one measurement (metadata, spectra, calibrator
//! output). Where it lives depends on the packet category, described by a
//! [CategoryTable]. Packets with no embedded identifier inherit the one from the
//! nearest earlier packet that has one.
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::LogicalPacket;
use crate::framing::Apid;
use crate::prelude::*;

/// Where a packet category keeps its identifier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdSource {
    /// u32 little-endian at `offset` bytes into the payload.
    Field { offset: usize },
    /// No embedded identifier; inherit from the nearest earlier packet.
    Inherit,
    /// Not part of correlation. The payload holds a u32 little-endian continuity
    /// counter at `offset` instead.
    Continuity { offset: usize },
}

/// A contiguous range of application ids sharing one [IdSource].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub name: String,
    pub first: Apid,
    /// Number of application ids covered, starting at `first`.
    #[serde(default = "one")]
    pub count: u16,
    pub source: IdSource,
}

fn one() -> u16 {
    1
}

impl CategoryRule {
    fn new(name: &str, first: Apid, count: u16, source: IdSource) -> Self {
        CategoryRule {
            name: name.to_string(),
            first,
            count,
            source,
        }
    }

    #[must_use]
    pub fn contains(&self, apid: Apid) -> bool {
        apid >= self.first && u32::from(apid) < u32::from(self.first) + u32::from(self.count)
    }
}

/// Application id to identifier-source mapping.
///
/// Application ids not covered by any rule are treated as [IdSource::Inherit].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    pub rules: Vec<CategoryRule>,
}

impl Default for CategoryTable {
    /// Flight application id map.
    #[rustfmt::skip]
    fn default() -> Self {
        use IdSource::{Continuity, Field, Inherit};
        CategoryTable {
            rules: vec![
                CategoryRule::new("housekeeping",         0x206, 1,  Field { offset: 2 }),
                CategoryRule::new("calibrator_detect",    0x207, 1,  Inherit),
                CategoryRule::new("bootloader",           0x208, 1,  Inherit),
                CategoryRule::new("startup_hello",        0x209, 1,  Field { offset: 20 }),
                CategoryRule::new("heartbeat",            0x20a, 1,  Continuity { offset: 0 }),
                CategoryRule::new("metadata",             0x20f, 1,  Field { offset: 2 }),
                CategoryRule::new("spectra",              0x210, 48, Field { offset: 0 }),
                CategoryRule::new("zoom_spectra",         0x270, 16, Field { offset: 0 }),
                CategoryRule::new("calibrator_data",      0x290, 1,  Field { offset: 0 }),
                CategoryRule::new("calibrator_metadata",  0x291, 1,  Field { offset: 2 }),
                CategoryRule::new("calibrator_raw_pfb",   0x292, 1,  Field { offset: 0 }),
                CategoryRule::new("calibrator_debug",     0x298, 8,  Field { offset: 0 }),
                CategoryRule::new("tr_spectra_high",      0x2a0, 16, Field { offset: 0 }),
                CategoryRule::new("tr_spectra_med",       0x2b0, 16, Field { offset: 0 }),
                CategoryRule::new("tr_spectra_low",       0x2c0, 16, Field { offset: 0 }),
                CategoryRule::new("spectra_grimm",        0x2e8, 1,  Field { offset: 0 }),
                CategoryRule::new("raw_adc",              0x2f0, 4,  Inherit),
                CategoryRule::new("waveform_metadata",    0x2f8, 1,  Field { offset: 0 }),
            ],
        }
    }
}

impl CategoryTable {
    /// Build a table from rules, rejecting empty or overlapping ranges.
    ///
    /// # Errors
    /// [Error::InvalidConfig] if any rule covers no ids, runs past the 11-bit
    /// application id space, or overlaps another rule.
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self> {
        for (i, rule) in rules.iter().enumerate() {
            if rule.count == 0 {
                return Err(Error::InvalidConfig(format!(
                    "category {} covers no application ids",
                    rule.name
                )));
            }
            if u32::from(rule.first) + u32::from(rule.count) > 0x800 {
                return Err(Error::InvalidConfig(format!(
                    "category {} exceeds the application id range",
                    rule.name
                )));
            }
            for other in &rules[..i] {
                if rule.contains(other.first) || other.contains(rule.first) {
                    return Err(Error::InvalidConfig(format!(
                        "categories {} and {} overlap",
                        other.name, rule.name
                    )));
                }
            }
        }
        Ok(CategoryTable { rules })
    }

    /// Load a table from its JSON representation.
    ///
    /// # Errors
    /// [Error::Json] if the document cannot be parsed, [Error::InvalidConfig] if the
    /// rules are inconsistent.
    pub fn from_json(dat: &str) -> Result<Self> {
        let table: CategoryTable = serde_json::from_str(dat)?;
        Self::new(table.rules)
    }

    #[must_use]
    pub fn rule(&self, apid: Apid) -> Option<&CategoryRule> {
        self.rules.iter().find(|r| r.contains(apid))
    }

    #[must_use]
    pub fn source(&self, apid: Apid) -> IdSource {
        self.rule(apid).map_or(IdSource::Inherit, |r| r.source)
    }

    /// Identifier embedded in `packet`, if its category carries one and the payload is
    /// long enough to hold it.
    #[must_use]
    pub fn extract(&self, packet: &LogicalPacket) -> Option<u32> {
        match self.source(packet.apid) {
            IdSource::Field { offset } => read_u32_le(&packet.payload, offset),
            IdSource::Inherit | IdSource::Continuity { .. } => None,
        }
    }

    /// Continuity counter of a heartbeat-style packet.
    #[must_use]
    pub fn continuity_counter(&self, packet: &LogicalPacket) -> Option<u32> {
        match self.source(packet.apid) {
            IdSource::Continuity { offset } => read_u32_le(&packet.payload, offset),
            _ => None,
        }
    }
}

fn read_u32_le(dat: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes = dat.get(offset..end)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Outcome of [resolve_unique_ids].
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Packets whose identifier was read from their own payload.
    pub extracted: usize,
    /// Packets that inherited an identifier from an earlier packet.
    pub inherited: usize,
    /// Indices of packets left without an identifier because no earlier packet had
    /// one.
    pub unresolved: Vec<usize>,
}

/// Assign [LogicalPacket::unique_id] for every packet in arrival order.
///
/// Identifiers are recomputed from scratch so repeated calls over the same input give
/// the same result. Packets in [IdSource::Continuity] categories never receive an
/// identifier and are not reported as unresolved.
pub fn resolve_unique_ids(packets: &mut [LogicalPacket], table: &CategoryTable) -> Resolution {
    let mut resolution = Resolution::default();

    for packet in packets.iter_mut() {
        packet.unique_id = table.extract(packet);
        if packet.unique_id.is_some() {
            resolution.extracted += 1;
        }
    }

    let mut last: Option<u32> = None;
    for (idx, packet) in packets.iter_mut().enumerate() {
        if packet.unique_id.is_some() {
            last = packet.unique_id;
            continue;
        }
        if matches!(table.source(packet.apid), IdSource::Continuity { .. }) {
            continue;
        }
        match last {
            Some(uid) => {
                packet.unique_id = Some(uid);
                resolution.inherited += 1;
            }
            None => resolution.unresolved.push(idx),
        }
    }

    if !resolution.unresolved.is_empty() {
        warn!(
            count = resolution.unresolved.len(),
            "packets precede any identified packet; leaving them unresolved"
        );
    }
    debug!(
        extracted = resolution.extracted,
        inherited = resolution.inherited,
        "unique ids resolved"
    );
    resolution
}

/// Packets carrying an identifier, ordered by identifier then terminal sequence count.
#[must_use]
pub fn ordered_by_unique_id(packets: &[LogicalPacket]) -> Vec<&LogicalPacket> {
    let mut out: Vec<&LogicalPacket> = packets.iter().filter(|p| p.unique_id.is_some()).collect();
    out.sort_by_key(|p| (p.unique_id, p.end_seq));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(apid: Apid, payload: &[u8]) -> LogicalPacket {
        LogicalPacket {
            apid,
            start_seq: 0,
            end_seq: 0,
            payload: payload.to_vec(),
            single_fragment: true,
            unique_id: None,
            fragments: 1,
            crc_valid: true,
            apid_drift: false,
        }
    }

    #[test]
    fn default_table_has_no_overlaps() {
        let table = CategoryTable::default();
        assert!(CategoryTable::new(table.rules).is_ok());
    }

    #[test]
    fn default_sources() {
        let table = CategoryTable::default();
        assert_eq!(table.source(0x209), IdSource::Field { offset: 20 });
        assert_eq!(table.source(0x23f), IdSource::Field { offset: 0 });
        assert_eq!(table.source(0x2f3), IdSource::Inherit);
        assert_eq!(table.source(0x20a), IdSource::Continuity { offset: 0 });
        assert_eq!(table.source(0x7ff), IdSource::Inherit);
    }

    #[test]
    fn extract_from_field_offset() {
        let table = CategoryTable::default();
        let hk = packet(0x206, &[0xff, 0xff, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(table.extract(&hk), Some(0x1234_5678));

        let short = packet(0x206, &[0xff, 0xff, 0x78]);
        assert_eq!(table.extract(&short), None);
    }

    #[test]
    fn backfill_from_nearest_earlier() {
        let table = CategoryTable::default();
        let mut packets = vec![
            packet(0x2f0, &[0; 8]),
            packet(0x210, &[1, 0, 0, 0]),
            packet(0x2f0, &[0; 8]),
            packet(0x20a, &[9, 0, 0, 0]),
            packet(0x220, &[2, 0, 0, 0]),
            packet(0x208, &[]),
        ];

        let res = resolve_unique_ids(&mut packets, &table);

        let uids: Vec<_> = packets.iter().map(|p| p.unique_id).collect();
        assert_eq!(uids, vec![None, Some(1), Some(1), None, Some(2), Some(2)]);
        assert_eq!(res.extracted, 2);
        assert_eq!(res.inherited, 2);
        assert_eq!(res.unresolved, vec![0]);
        assert_eq!(table.continuity_counter(&packets[3]), Some(9));
    }

    #[test]
    fn resolution_is_idempotent() {
        let table = CategoryTable::default();
        let mut packets = vec![
            packet(0x210, &[1, 0, 0, 0]),
            packet(0x2f0, &[0; 8]),
            packet(0x211, &[5, 0, 0, 0]),
        ];

        let first = resolve_unique_ids(&mut packets, &table);
        let uids: Vec<_> = packets.iter().map(|p| p.unique_id).collect();
        let second = resolve_unique_ids(&mut packets, &table);

        assert_eq!(first, second);
        assert_eq!(uids, packets.iter().map(|p| p.unique_id).collect::<Vec<_>>());
    }

    #[test]
    fn table_from_json() {
        let dat = r#"{"rules": [
            {"name": "spectra", "first": 528, "count": 16,
             "source": {"kind": "field", "offset": 0}},
            {"name": "waveform", "first": 752, "count": 4, "source": {"kind": "inherit"}},
            {"name": "hello", "first": 521, "source": {"kind": "field", "offset": 20}}
        ]}"#;
        let table = CategoryTable::from_json(dat).unwrap();

        assert_eq!(table.rules.len(), 3);
        assert_eq!(table.rules[2].count, 1);
        assert_eq!(table.source(0x21f), IdSource::Field { offset: 0 });
        assert_eq!(table.source(0x220), IdSource::Inherit);
    }

    #[test]
    fn table_rejects_overlap() {
        let rules = vec![
            CategoryRule::new("a", 0x210, 16, IdSource::Inherit),
            CategoryRule::new("b", 0x21f, 1, IdSource::Inherit),
        ];
        assert!(matches!(
            CategoryTable::new(rules),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn table_rejects_bad_json() {
        assert!(matches!(
            CategoryTable::from_json("{\"rules\": 3}"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn ordering_by_unique_id() {
        let mut a = packet(0x210, &[]);
        a.unique_id = Some(5);
        a.end_seq = 2;
        let mut b = packet(0x210, &[]);
        b.unique_id = Some(3);
        let c = packet(0x2f0, &[]);
        let mut d = packet(0x220, &[]);
        d.unique_id = Some(5);
        d.end_seq = 1;

        let packets = vec![a, b, c, d];
        let ordered = ordered_by_unique_id(&packets);

        let keys: Vec<_> = ordered.iter().map(|p| (p.unique_id, p.end_seq)).collect();
        assert_eq!(keys, vec![(Some(3), 0), (Some(5), 1), (Some(5), 2)]);
    }
}
