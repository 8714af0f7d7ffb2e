use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;
use specdecode::framing::{Apid, FrameSynchronizer, SyncOpts, SyncStats};
use specdecode::packets::{ApidSummary, Summary};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{stdout, BufReader, Write},
    path::Path,
};

use crate::Format;

#[derive(Debug, Clone, Serialize)]
struct Totals {
    frames: usize,
    bytes: usize,
    crc_errors: usize,
    missing: usize,
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    sync: SyncStats,
    summary: Totals,
    apids: BTreeMap<Apid, ApidSummary>,
}

fn summarize(fpath: &Path) -> Result<Info> {
    let reader = BufReader::new(File::open(fpath).context("opening input")?);
    let mut sync = FrameSynchronizer::new(reader, SyncOpts::default());
    let mut summary = Summary::default();
    for frame in sync.by_ref() {
        let frame = frame.context("reading input")?;
        summary.add(&frame);
    }

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        sync: sync.into_stats(),
        summary: Totals {
            frames: summary.frames,
            bytes: summary.bytes,
            crc_errors: summary.crc_errors,
            missing: summary.missing,
        },
        apids: summary.apids.into_iter().collect(),
    })
}

pub fn info(fpath: &Path, format: &Format) -> Result<()> {
    let info = summarize(fpath)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("serializing info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        format!("{v:>width$}", width = num as usize)
    });
    // object keys arrive as strings
    handlebars_helper!(hex: |v: str| v
        .parse::<u64>()
        .map_or_else(|_| v.to_string(), |n| format!("{n:#05x}")));

    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_helper("hex", Box::new(hex));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("compiling text template")?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
==========================================================
Frames:   {{ sync.frames }}
CRC:      {{ sync.crc_errors }} failed
Garbage:  {{ sync.garbage_bytes }} bytes
Filler:   {{ sync.filler_bytes }} bytes
Partial:  {{ sync.truncated }} trailing frames
Bytes:    {{ summary.bytes }}
Missing:  {{ summary.missing }}
----------------------------------------------------------
APID       Frames        Bytes    CRC errors    Missing
----------------------------------------------------------
{{ #each apids }}{{ hex @key }}  {{ lpad 9 frames }}  {{ lpad 11 bytes }}  {{ lpad 12 crc_errors }}  {{ lpad 9 missing }}
{{/each }}
";
