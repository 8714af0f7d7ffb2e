use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bytes::Bytes;
use super::{frame_crc, FrameHeader, RawFrame, FILLER, SYNC_MARKER};
use crate::prelude::*;

/// Options controlling how the synchronizer recognizes frame boundaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncOpts {
    /// 16-bit marker preceding every frame header.
    pub marker: u16,
    /// Byte silently skipped between frames, if any.
    pub filler: Option<u8>,
}

impl Default for SyncOpts {
    fn default() -> Self {
        SyncOpts {
            marker: SYNC_MARKER,
            filler: Some(FILLER),
        }
    }
}

/// Counters accumulated while synchronizing a stream.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    /// Frames produced, including those with a CRC mismatch.
    pub frames: usize,
    pub crc_errors: usize,
    /// Bytes discarded while searching for a marker, excluding filler and the marker
    /// itself.
    pub garbage_bytes: usize,
    pub filler_bytes: usize,
    /// Frames abandoned because the input ended inside them.
    pub truncated: usize,
}

#[derive(Debug)]
enum State {
    SeekingSync,
    ReadingHeader,
    ReadingBody {
        head: [u8; FrameHeader::LEN],
        header: FrameHeader,
    },
}

/// Extracts [RawFrame]s from a byte stream delimited by a 16-bit sync marker.
///
/// Iterating yields frames until the input is exhausted. Frames failing their CRC are
/// still produced with [RawFrame::crc_valid] set to false.
pub struct FrameSynchronizer<R>
where
    R: Read + Send,
{
    bytes: Bytes<R>,
    opts: SyncOpts,
    state: State,
    // Rolling window of the last two non-reset bytes
    window: u16,
    // Bytes skipped since the last frame; the first marker byte lands here too
    pending_garbage: usize,
    marker_offset: usize,
    stats: SyncStats,
    done: bool,
}

impl<R> FrameSynchronizer<R>
where
    R: Read + Send,
{
    pub fn new(reader: R, opts: SyncOpts) -> Self {
        FrameSynchronizer {
            bytes: Bytes::new(reader),
            opts,
            state: State::SeekingSync,
            window: 0,
            pending_garbage: 0,
            marker_offset: 0,
            stats: SyncStats::default(),
            done: false,
        }
    }

    #[must_use]
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Consume the synchronizer, returning its counters.
    #[must_use]
    pub fn into_stats(self) -> SyncStats {
        self.stats
    }

    /// Produce the next frame, or `Ok(None)` once the input is exhausted.
    ///
    /// # Errors
    /// [Error::Io] if the underlying reader fails for any reason other than EOF.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        loop {
            match std::mem::replace(&mut self.state, State::SeekingSync) {
                State::SeekingSync => match self.bytes.next()? {
                    Some(b) => self.seek(b),
                    None => {
                        self.flush_garbage();
                        return Ok(None);
                    }
                },
                State::ReadingHeader => {
                    let mut head = [0u8; FrameHeader::LEN];
                    if !self.bytes.fill(&mut head)? {
                        self.truncated();
                        return Ok(None);
                    }
                    let Some(header) = FrameHeader::decode(&head) else {
                        continue;
                    };
                    self.state = State::ReadingBody { head, header };
                }
                State::ReadingBody { head, header } => {
                    // payload plus trailing CRC
                    let mut body = vec![0u8; header.payload_len() + 2];
                    if !self.bytes.fill(&mut body)? {
                        self.truncated();
                        return Ok(None);
                    }
                    return Ok(Some(self.finish(&head, header, body)));
                }
            }
        }
    }

    fn seek(&mut self, b: u8) {
        self.window = (self.window << 8) | u16::from(b);
        if self.opts.filler == Some(b) {
            self.stats.filler_bytes += 1;
            self.state = State::SeekingSync;
            return;
        }
        if self.window == self.opts.marker {
            // The first marker byte was counted as garbage when it went by.
            self.pending_garbage = self.pending_garbage.saturating_sub(1);
            self.flush_garbage();
            self.window = 0;
            self.marker_offset = self.bytes.offset().saturating_sub(2);
            self.state = State::ReadingHeader;
        } else {
            self.pending_garbage += 1;
            self.state = State::SeekingSync;
        }
    }

    fn flush_garbage(&mut self) {
        if self.pending_garbage > 0 {
            warn!(
                offset = self.bytes.offset(),
                skipped = self.pending_garbage,
                "sync lost; skipped garbage bytes"
            );
            self.stats.garbage_bytes += self.pending_garbage;
            self.pending_garbage = 0;
        }
    }

    fn truncated(&mut self) {
        warn!(
            offset = self.marker_offset,
            "input ended inside a frame; dropping it"
        );
        self.stats.truncated += 1;
        self.state = State::SeekingSync;
    }

    fn finish(&mut self, head: &[u8], header: FrameHeader, mut body: Vec<u8>) -> RawFrame {
        let crc_at = body.len() - 2;
        let crc = u16::from_be_bytes([body[crc_at], body[crc_at + 1]]);
        body.truncate(crc_at);

        let computed = frame_crc(head, &body);
        let crc_valid = computed == crc;
        if !crc_valid {
            warn!(
                apid = header.apid,
                seq = header.sequence_count,
                expected = crc,
                computed,
                "frame CRC mismatch"
            );
            self.stats.crc_errors += 1;
        }
        debug!(
            apid = header.apid,
            seq = header.sequence_count,
            len = body.len(),
            offset = self.marker_offset,
            "frame"
        );
        self.stats.frames += 1;

        RawFrame {
            header,
            payload: body,
            crc,
            crc_valid,
            offset: self.marker_offset,
        }
    }
}

impl<R> Iterator for FrameSynchronizer<R>
where
    R: Read + Send,
{
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Synchronize an entire stream with the default [SyncOpts].
///
/// # Errors
/// [Error::Io] if reading fails.
pub fn decode_frames<R>(reader: R) -> Result<(Vec<RawFrame>, SyncStats)>
where
    R: Read + Send,
{
    decode_frames_with(reader, SyncOpts::default())
}

/// Synchronize an entire stream.
///
/// # Errors
/// [Error::Io] if reading fails.
pub fn decode_frames_with<R>(reader: R, opts: SyncOpts) -> Result<(Vec<RawFrame>, SyncStats)>
where
    R: Read + Send,
{
    let mut sync = FrameSynchronizer::new(reader, opts);
    let mut frames = Vec::new();
    while let Some(frame) = sync.next_frame()? {
        frames.push(frame);
    }
    Ok((frames, sync.into_stats()))
}
