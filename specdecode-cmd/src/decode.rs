use std::{
    fs::File,
    io::{stdout, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::Serialize;
use specdecode::framing::{decode_frames, Apid, SyncStats};
use specdecode::packets::{
    collate, ordered_by_unique_id, resolve_unique_ids, CategoryTable, LogicalPacket,
};
use tracing::{info, warn};

use crate::Format;

#[derive(Debug, Serialize)]
struct Record {
    apid: Apid,
    start_seq: u16,
    end_seq: u16,
    fragments: usize,
    len: usize,
    unique_id: Option<u32>,
    crc_valid: bool,
    apid_drift: bool,
}

impl From<&LogicalPacket> for Record {
    fn from(p: &LogicalPacket) -> Self {
        Record {
            apid: p.apid,
            start_seq: p.start_seq,
            end_seq: p.end_seq,
            fragments: p.fragments,
            len: p.payload.len(),
            unique_id: p.unique_id,
            crc_valid: p.crc_valid,
            apid_drift: p.apid_drift,
        }
    }
}

fn load_table(path: Option<&Path>) -> Result<CategoryTable> {
    let Some(path) = path else {
        return Ok(CategoryTable::default());
    };
    let dat = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read category table {path:?}"))?;
    CategoryTable::from_json(&dat).with_context(|| format!("invalid category table {path:?}"))
}

fn write_text<W: Write>(mut w: W, rec: &Record) -> std::io::Result<()> {
    let uid = rec
        .unique_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    writeln!(
        w,
        "{:#05x} {:>5}-{:<5} {:>3} {:>6} {:>10} {}{}",
        rec.apid,
        rec.start_seq,
        rec.end_seq,
        rec.fragments,
        rec.len,
        uid,
        if rec.crc_valid { "ok" } else { "crc-error" },
        if rec.apid_drift { " drift" } else { "" },
    )
}

/// Synchronize, collate and resolve every logical packet in `input`.
fn read_packets(input: &Path, table: &CategoryTable) -> Result<(Vec<LogicalPacket>, SyncStats)> {
    let src = BufReader::new(File::open(input).context("opening input")?);
    let (frames, stats) = decode_frames(src).context("reading input")?;

    let mut collator = collate(frames);
    let mut packets: Vec<LogicalPacket> = collator.by_ref().collect();
    if collator.dropped() > 0 {
        warn!(dropped = collator.dropped(), "incomplete packets at end of input");
    }
    let res = resolve_unique_ids(&mut packets, table);
    info!(
        frames = stats.frames,
        crc_errors = stats.crc_errors,
        garbage_bytes = stats.garbage_bytes,
        packets = packets.len(),
        unresolved = res.unresolved.len(),
        "decoded {input:?}"
    );
    Ok((packets, stats))
}

pub fn decode(
    input: &Path,
    table: Option<&Path>,
    format: &Format,
    by_unique_id: bool,
) -> Result<()> {
    let table = load_table(table)?;
    let (packets, _) = read_packets(input, &table)?;

    let ordered: Vec<&LogicalPacket> = if by_unique_id {
        ordered_by_unique_id(&packets)
    } else {
        packets.iter().collect()
    };

    let mut out = BufWriter::new(stdout().lock());
    for packet in ordered {
        let rec = Record::from(packet);
        match format {
            Format::Json => {
                serde_json::to_writer(&mut out, &rec).context("serializing to json")?;
                writeln!(out).context("writing to stdout")?;
            }
            Format::Text => write_text(&mut out, &rec).context("writing to stdout")?,
        }
    }
    out.flush().context("writing to stdout")
}
