//! Exercises the boundary between opcode decoding and LOB reassembly
//! together: real `ChangeVector`s built through `VectorSplitter`, decoded
//! with `opcodes::lob_ops`, then fed into `LobReassembler`. The unit
//! tests living in `src/lob/reassembly.rs` construct `LobIndexPage`/
//! `LobPageRun` values directly; these drive the same decoders the
//! pipeline actually calls, covering the handoff the unit tests skip.

use std::sync::Arc;

use redo_tail::lob::{LobKey, LobReassembler, LOB_PAGE_SIZE};
use redo_tail::opcodes::lob_ops::{decode_lob_index_write, decode_lob_in_row, decode_lob_page_run, LobId};
use redo_tail::redo::format::OracleVersion;
use redo_tail::redo::vector::{ChangeVector, RecordBuffer, VectorSplitter};

fn make_vector(opcode: u16, fields: Vec<Vec<u8>>) -> ChangeVector {
    let mut buf = vec![0u8; 24];
    buf.extend_from_slice(&[0u8; 24]);
    buf.extend_from_slice(&opcode.to_le_bytes());
    buf.extend_from_slice(&(fields.len() as u16).to_le_bytes());
    for f in &fields {
        buf.extend_from_slice(&(f.len() as u16).to_le_bytes());
    }
    for f in &fields {
        let start = buf.len();
        buf.extend_from_slice(f);
        while (buf.len() - start) % 4 != 0 {
            buf.push(0);
        }
    }
    let buffer: RecordBuffer = Arc::from(buf.into_boxed_slice());
    let (mut splitter, _header) = VectorSplitter::new(buffer, OracleVersion::V11_2).unwrap();
    splitter.next_vector().unwrap().unwrap()
}

fn index_key_field(lob_id: [u8; 10], page_no: u32) -> Vec<u8> {
    let mut key = lob_id.to_vec();
    key.extend_from_slice(&page_no.to_le_bytes());
    key
}

fn run_key_field(lob_id: [u8; 10], start_page: u32, page_count: u32) -> Vec<u8> {
    let mut key = lob_id.to_vec();
    key.extend_from_slice(&start_page.to_le_bytes());
    key.extend_from_slice(&page_count.to_le_bytes());
    key
}

#[test]
fn index_page_and_page_run_opcodes_combine_into_one_value() {
    let lob_id = [7u8; 10];

    let page0_vec = make_vector(
        redo_tail::opcodes::lob_ops::OP_LOB_INDEX_WRITE,
        vec![index_key_field(lob_id, 0), vec![0xAA; LOB_PAGE_SIZE]],
    );
    let page0 = decode_lob_index_write(&page0_vec).unwrap();

    let run_vec = make_vector(
        redo_tail::opcodes::lob_ops::OP_LOB_PAGE_RUN_WRITE,
        vec![run_key_field(lob_id, 1, 2), vec![0xBB; 2 * LOB_PAGE_SIZE]],
    );
    let run = decode_lob_page_run(&run_vec).unwrap();

    let mut reassembler = LobReassembler::new();
    let key = LobKey::new(&LobId(lob_id));
    reassembler.note_declared_size(key, 3 * LOB_PAGE_SIZE as u64);
    reassembler.accept_index_page(page0);
    reassembler.accept_page_run(run);

    let data = reassembler.finish(key).unwrap();
    assert_eq!(data.bytes.len(), 3 * LOB_PAGE_SIZE);
    assert!(data.bytes[..LOB_PAGE_SIZE].iter().all(|&b| b == 0xAA));
    assert!(data.bytes[LOB_PAGE_SIZE..].iter().all(|&b| b == 0xBB));
}

#[test]
fn in_row_lob_needs_no_accumulation() {
    let v = make_vector(redo_tail::opcodes::lob_ops::OP_LOB_IN_ROW_WRITE, vec![vec![1, 2, 3, 4]]);
    let in_row = decode_lob_in_row(&v).unwrap();

    let reassembler = LobReassembler::new();
    let data = reassembler.accept_in_row(in_row);
    assert_eq!(data.bytes, vec![1, 2, 3, 4]);
}

#[test]
fn page_run_referencing_data_beyond_the_vector_leaves_an_orphan() {
    let lob_id = [9u8; 10];
    // declares a 2-page run but only supplies enough payload bytes for one
    let run_vec = make_vector(
        redo_tail::opcodes::lob_ops::OP_LOB_PAGE_RUN_WRITE,
        vec![run_key_field(lob_id, 0, 2), vec![0xCC; LOB_PAGE_SIZE]],
    );
    let run = decode_lob_page_run(&run_vec).unwrap();

    let mut reassembler = LobReassembler::new();
    let key = LobKey::new(&LobId(lob_id));
    reassembler.accept_page_run(run);

    assert!(reassembler.finish(key).is_err());
}
