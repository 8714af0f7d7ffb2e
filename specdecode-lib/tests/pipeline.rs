mod common;

use std::fs::File;
use std::io::Write;

use rand::Rng;
use specdecode::framing::{decode_frames, FrameSynchronizer, SyncOpts};
use specdecode::packets::{collate, resolve_unique_ids, swap_words, CategoryTable, Summary};

use common::{frame, rng, StreamBuilder};

#[test]
fn end_to_end_single_packet() {
    let mut dat = hex::decode("a5a5").unwrap();
    dat.extend(frame(0x100, 1, 3, &hex::decode("deadbeef").unwrap()));
    assert_eq!(hex::encode(&dat[..10]), "a5a5eca00100c0010003");

    let (frames, stats) = decode_frames(&dat[..]).unwrap();
    let packets: Vec<_> = collate(frames).collect();

    assert_eq!(stats.frames, 1);
    assert_eq!(stats.filler_bytes, 2);
    assert_eq!(packets.len(), 1);
    let p = &packets[0];
    assert_eq!(p.apid, 0x100);
    assert_eq!(p.start_seq, 1);
    assert_eq!(p.end_seq, 1);
    assert!(p.single_fragment);
    assert!(p.crc_valid);
    assert_eq!(hex::encode(&p.payload), "addeefbe");
}

#[test]
fn frames_survive_filler_and_garbage() {
    let mut rng = rng();
    let mut stream = StreamBuilder::default();
    for seq in 0..50u16 {
        let len = rng.gen_range(1..200);
        let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        stream.frame(0x210 + seq % 3, seq, 3, &payload);
        match seq % 4 {
            0 => {
                stream.filler(rng.gen_range(1..8));
            }
            1 => {
                let n = rng.gen_range(1..64);
                stream.garbage(&mut rng, n);
            }
            2 => {
                let n = rng.gen_range(1..16);
                stream.filler(3).garbage(&mut rng, n).filler(2);
            }
            _ => {}
        }
    }

    let (frames, stats) = decode_frames(&stream.bytes[..]).unwrap();

    assert_eq!(frames.len(), stream.frames);
    assert_eq!(stats.frames, stream.frames);
    assert_eq!(stats.garbage_bytes, stream.garbage);
    assert_eq!(stats.filler_bytes, stream.filler);
    assert_eq!(stats.crc_errors, 0);
    let seqs: Vec<u16> = frames.iter().map(|f| f.header.sequence_count).collect();
    assert_eq!(seqs, (0..50).collect::<Vec<_>>());
}

#[test]
fn single_bit_flip_fails_only_that_frame() {
    let mut stream = StreamBuilder::default();
    stream
        .frame(0x206, 0, 3, &[1, 2, 3, 4])
        .filler(4)
        .frame(0x206, 1, 3, &[5, 6, 7, 8, 9, 10])
        .frame(0x206, 2, 3, &[11, 12]);
    // first payload byte of the second frame
    let target = 14 + 4 + 2 + 6;
    stream.bytes[target] ^= 0x10;

    let (frames, stats) = decode_frames(&stream.bytes[..]).unwrap();

    assert_eq!(frames.len(), 3);
    assert_eq!(stats.crc_errors, 1);
    let valid: Vec<bool> = frames.iter().map(|f| f.crc_valid).collect();
    assert_eq!(valid, vec![true, false, true]);
}

#[test]
fn five_fragments_reassemble() {
    let fragments: Vec<Vec<u8>> = (0u8..5).map(|i| vec![i, i + 10, i + 20, i + 30]).collect();
    let mut stream = StreamBuilder::default();
    for (i, payload) in fragments.iter().enumerate() {
        let flags = if i == 4 { 3 } else if i == 0 { 1 } else { 0 };
        stream.frame(0x230, 100 + i as u16, flags, payload);
    }

    let (frames, _) = decode_frames(&stream.bytes[..]).unwrap();
    let packets: Vec<_> = collate(frames).collect();

    assert_eq!(packets.len(), 1);
    let p = &packets[0];
    let expected: Vec<u8> = fragments.iter().flat_map(|f| swap_words(f)).collect();
    assert_eq!(p.payload, expected);
    assert_eq!(p.start_seq, 100);
    assert_eq!(p.end_seq, 104);
    assert_eq!(p.fragments, 5);
    assert!(!p.single_fragment);
}

#[test]
fn file_backed_stream() {
    // heartbeat, spectra packet with unique id 7 split in two, raw ADC packet with no id
    let mut stream = StreamBuilder::default();
    stream
        .frame(0x20a, 0, 3, &[0x00, 0x03, 0x00, 0x00])
        .frame(0x210, 1, 1, &[0x00, 0x07, 0x00, 0x00])
        .frame(0x210, 3, 3, &[0xaa, 0xbb])
        .filler(6)
        .frame(0x2f0, 4, 3, &[0x01, 0x02]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("downlink.bin");
    File::create(&path)
        .unwrap()
        .write_all(&stream.bytes)
        .unwrap();

    let mut sync = FrameSynchronizer::new(File::open(&path).unwrap(), SyncOpts::default());
    let mut summary = Summary::default();
    let frames: Vec<_> = sync
        .by_ref()
        .map(Result::unwrap)
        .inspect(|f| summary.add(f))
        .collect();
    assert_eq!(sync.stats().frames, 4);
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.apids[&0x2f0].frames, 1);

    let mut packets: Vec<_> = collate(frames).collect();
    let table = CategoryTable::default();
    let res = resolve_unique_ids(&mut packets, &table);

    let uids: Vec<_> = packets.iter().map(|p| p.unique_id).collect();
    assert_eq!(uids, vec![None, Some(7), Some(7)]);
    assert_eq!(res.extracted, 1);
    assert_eq!(res.inherited, 1);
    assert!(res.unresolved.is_empty());
    assert_eq!(table.continuity_counter(&packets[0]), Some(3));
}
