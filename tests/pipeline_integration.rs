//! End-to-end exercises of `Pipeline`: reader -> framer -> splitter ->
//! opcode interpreters -> transaction buffer -> emitter, driven against
//! hand-built redo files on disk rather than against any real database.
//! `src/pipeline.rs` carries no inline tests of its own, so these are the
//! only tests that walk the whole stack together instead of one module
//! at a time.

use std::path::{Path, PathBuf};

use redo_tail::checkpoint::CheckpointState;
use redo_tail::config::EngineConfig;
use redo_tail::dictionary::StaticDictionary;
use redo_tail::emit::JsonLineEmitter;
use redo_tail::metrics::EngineMetrics;
use redo_tail::pipeline::{OP_BEGIN, OP_COMMIT, OP_INSERT, OP_PARTIAL_ROLLBACK, OP_UPDATE};
use redo_tail::redo::format::{OracleVersion, BLOCK_MAGIC};
use redo_tail::xid::Xid;

const OP_UNKNOWN: u16 = 0x9999;
const BLOCK_HEADER_LEN: usize = 16;

fn ktudb_bytes(xid: Xid, last_buffer_split: bool) -> Vec<u8> {
    let mut buf = vec![0u8; 10];
    buf[0..8].copy_from_slice(&xid.raw().to_le_bytes());
    if last_buffer_split {
        buf[8..10].copy_from_slice(&0x0002u16.to_le_bytes());
    }
    buf
}

fn ktucm_bytes(xid: Xid, committed: bool) -> Vec<u8> {
    let mut buf = vec![0u8; 9];
    buf[0..8].copy_from_slice(&xid.raw().to_le_bytes());
    buf[8] = committed as u8;
    buf
}

fn ktb_bytes() -> Vec<u8> {
    vec![0u8; 20]
}

fn ktb_bytes_with_uba(dba: u32, seq: u16, rec: u8) -> Vec<u8> {
    let mut b = vec![0u8; 20];
    b[2] = 0x02; // KtbFlags::UBA_PRESENT
    b[12..16].copy_from_slice(&dba.to_le_bytes());
    b[16..18].copy_from_slice(&seq.to_le_bytes());
    b[18] = rec;
    b
}

fn uba_bytes(dba: u32, seq: u16, rec: u8) -> Vec<u8> {
    let mut b = vec![0u8; 7];
    b[0..4].copy_from_slice(&dba.to_le_bytes());
    b[4..6].copy_from_slice(&seq.to_le_bytes());
    b[6] = rec;
    b
}

fn ktub_bytes(obj: u32) -> Vec<u8> {
    let mut b = vec![0u8; 12];
    b[0..4].copy_from_slice(&obj.to_le_bytes());
    b
}

fn kdo_bytes(bdba: u32, slot: u16, col_count: u16, flags: u8) -> Vec<u8> {
    let mut b = vec![0u8; 12];
    b[0..4].copy_from_slice(&bdba.to_le_bytes());
    b[4..6].copy_from_slice(&slot.to_le_bytes());
    b[6..8].copy_from_slice(&col_count.to_le_bytes());
    b[9] = flags;
    b
}

/// Builds one framed redo record: a 24-byte (pre-12.1) record header,
/// optionally followed by the 44-byte LWN extension, then the vectors
/// themselves - each a vector header, opcode, field-length table and
/// fields, exactly as `VectorSplitter` expects to read them back.
fn build_record(vld: u8, vectors: &[(u16, Vec<Vec<u8>>)]) -> Vec<u8> {
    let mut buf = vec![0u8; 24];
    buf[4] = vld;
    if vld & 0x04 != 0 {
        buf.extend_from_slice(&[0u8; 44]);
    }
    for (opcode, fields) in vectors {
        let vh_start = buf.len();
        buf.extend_from_slice(&[0u8; 24]);
        buf.extend_from_slice(&opcode.to_le_bytes());
        buf.extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for f in fields {
            buf.extend_from_slice(&(f.len() as u16).to_le_bytes());
        }
        while (buf.len() - vh_start - 24 - 2 - 2 * fields.len()) % 4 != 0 {
            buf.push(0);
        }
        for f in fields {
            let field_start = buf.len();
            buf.extend_from_slice(f);
            while (buf.len() - field_start) % 4 != 0 {
                buf.push(0);
            }
        }
    }
    buf
}

/// Length-prefixes and 4-byte-pads a record the way the framer expects
/// to find it inside a block body.
fn frame_record(record: &[u8]) -> Vec<u8> {
    let mut out = (record.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(record);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

/// Writes two (unused, zeroed) file-header blocks followed by a single
/// data block holding every framed record back to back. `Framer` never
/// parses the file header blocks itself, only `ByteReader`'s block
/// framing, so they only need to exist.
fn write_redo_file(dir: &Path, block_size: usize, framed_records: &[u8]) -> PathBuf {
    let path = dir.join("redo01.log");
    let mut out = vec![0u8; block_size * 2];

    let mut block = vec![0u8; block_size];
    block[0..2].copy_from_slice(&BLOCK_MAGIC);
    block[4..8].copy_from_slice(&2u32.to_le_bytes()); // block_number (blocks 0-1 are the header)
    let body_cap = block_size - BLOCK_HEADER_LEN;
    assert!(framed_records.len() <= body_cap, "test fixture record too large for one block");
    block[BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + framed_records.len()].copy_from_slice(framed_records);
    out.extend(block);

    std::fs::write(&path, out).unwrap();
    path
}

struct RunOutcome {
    metrics: EngineMetrics,
    lines: Vec<serde_json::Value>,
    checkpoint_file: PathBuf,
}

fn run_records(records: Vec<Vec<u8>>) -> RunOutcome {
    let dir = tempfile::tempdir().unwrap();
    let mut framed = Vec::new();
    for r in &records {
        framed.extend(frame_record(r));
    }
    let path = write_redo_file(dir.path(), 4096, &framed);

    let metrics = EngineMetrics::new();
    let mut config = EngineConfig::default();
    config.checkpoint_file = dir.path().join("checkpoint.json");
    let dictionary = StaticDictionary::new(178);

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut emitter = JsonLineEmitter::new(&mut buf, 32);
        let mut pipeline = redo_tail::pipeline::Pipeline::new(
            &path,
            4096,
            0,
            2,
            OracleVersion::V11_2,
            &metrics,
            &config,
            &dictionary,
            &mut emitter,
        )
        .unwrap();
        pipeline.run().unwrap();
    }

    let lines = String::from_utf8(buf)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    RunOutcome {
        metrics,
        lines,
        checkpoint_file: config.checkpoint_file,
    }
}

fn ops(outcome: &RunOutcome) -> Vec<&str> {
    outcome.lines.iter().map(|v| v["op"].as_str().unwrap()).collect()
}

#[test]
fn single_row_insert_commits_and_emits_json() {
    let xid = Xid::new(1, 1, 1);
    let record = build_record(
        0,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (
                OP_INSERT,
                vec![ktb_bytes(), kdo_bytes(1234, 7, 2, 0), vec![0xC1, 0x02], vec![0xDE, 0xAD]],
            ),
            (OP_COMMIT, vec![ktucm_bytes(xid, true)]),
        ],
    );

    let outcome = run_records(vec![record]);
    assert_eq!(ops(&outcome), vec!["begin", "insert", "commit"]);
    assert_eq!(outcome.lines[2]["xid"], xid.to_string());

    let stats = outcome.metrics.snapshot();
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(stats.changes_emitted, 1);
    assert_eq!(stats.decode_errors, 0);
}

#[test]
fn update_with_supplemental_log_emits_only_the_update() {
    let xid = Xid::new(2, 2, 2);
    let mut supp_header = vec![0u8; 9];
    supp_header[1..3].copy_from_slice(&1u16.to_le_bytes()); // before_count
    supp_header[3..5].copy_from_slice(&1u16.to_le_bytes()); // after_count
    supp_header[5..9].copy_from_slice(&1234u32.to_le_bytes());

    let record = build_record(
        0,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (
                OP_UPDATE,
                vec![ktb_bytes(), kdo_bytes(1234, 3, 1, 0), vec![0x01]],
            ),
            (
                redo_tail::opcodes::row::OP_SUPPLEMENTAL_LOG,
                vec![ktb_bytes(), kdo_bytes(1234, 3, 0, 0), supp_header, vec![0x00], vec![0x01]],
            ),
            (OP_COMMIT, vec![ktucm_bytes(xid, true)]),
        ],
    );

    let outcome = run_records(vec![record]);
    // the supplemental-log descriptor carries no emission of its own
    assert_eq!(ops(&outcome), vec!["begin", "update", "commit"]);
    assert_eq!(outcome.metrics.snapshot().changes_emitted, 1);
}

#[test]
fn rolled_back_transaction_emits_no_row_changes() {
    let xid = Xid::new(3, 3, 3);
    let record = build_record(
        0,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (
                OP_INSERT,
                vec![ktb_bytes(), kdo_bytes(1, 0, 1, 0), vec![0x01]],
            ),
            (OP_COMMIT, vec![ktucm_bytes(xid, false)]),
        ],
    );

    let outcome = run_records(vec![record]);
    // a rolled-back transaction never reaches the committed branch, so the
    // bundled begin+commit line never gets emitted at all.
    assert_eq!(ops(&outcome), Vec::<&str>::new());
    let stats = outcome.metrics.snapshot();
    assert_eq!(stats.transactions_rolled_back, 1);
    assert_eq!(stats.changes_emitted, 0);
}

#[test]
fn partial_rollback_drops_only_the_matching_change() {
    let xid = Xid::new(4, 4, 4);
    let record = build_record(
        0,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (
                OP_INSERT,
                vec![ktb_bytes_with_uba(1, 1, 1), kdo_bytes(100, 0, 1, 0), vec![0xAA]],
            ),
            (
                OP_INSERT,
                vec![ktb_bytes_with_uba(2, 2, 2), kdo_bytes(200, 0, 1, 0), vec![0xBB]],
            ),
            (OP_PARTIAL_ROLLBACK, vec![ktudb_bytes(xid, false), uba_bytes(1, 1, 1)]),
            (OP_COMMIT, vec![ktucm_bytes(xid, true)]),
        ],
    );

    let outcome = run_records(vec![record]);
    assert_eq!(ops(&outcome), vec!["begin", "insert", "commit"]);
    assert_eq!(outcome.metrics.snapshot().changes_emitted, 1);
}

#[test]
fn lwn_boundary_flushes_and_persists_checkpoint() {
    let xid = Xid::new(5, 5, 5);
    let record = build_record(
        0x04,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (
                OP_INSERT,
                vec![ktb_bytes(), kdo_bytes(1, 0, 1, 0), vec![0x01]],
            ),
            (OP_COMMIT, vec![ktucm_bytes(xid, true)]),
        ],
    );

    let outcome = run_records(vec![record]);
    assert_eq!(ops(&outcome), vec!["begin", "insert", "commit", "checkpoint"]);
    assert_eq!(outcome.metrics.snapshot().checkpoints_flushed, 1);

    let persisted = CheckpointState::load(&outcome.checkpoint_file).unwrap();
    assert_eq!(persisted.sequence, 0);
}

#[test]
fn head_and_tail_undo_fragments_reassemble_without_decode_errors() {
    let xid = Xid::new(6, 6, 6);
    let record = build_record(
        0,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (
                redo_tail::opcodes::undo::OP_UNDO,
                vec![ktudb_bytes(xid, false), ktub_bytes(1234), vec![0x11, 0x22]],
            ),
            (
                redo_tail::opcodes::undo::OP_SPLIT_UNDO,
                vec![ktudb_bytes(xid, true), vec![0x33, 0x44]],
            ),
            (
                OP_INSERT,
                vec![ktb_bytes(), kdo_bytes(1, 0, 1, 0), vec![0x01]],
            ),
            (OP_COMMIT, vec![ktucm_bytes(xid, true)]),
        ],
    );

    let outcome = run_records(vec![record]);
    assert_eq!(ops(&outcome), vec!["begin", "insert", "commit"]);
    assert_eq!(outcome.metrics.snapshot().decode_errors, 0);
}

#[test]
fn unrecognized_opcode_is_skipped_when_on_error_continue_is_set() {
    let xid = Xid::new(7, 7, 7);
    let record = build_record(
        0,
        &[
            (OP_BEGIN, vec![ktudb_bytes(xid, false)]),
            (OP_UNKNOWN, vec![vec![1, 2, 3]]),
            (
                OP_INSERT,
                vec![ktb_bytes(), kdo_bytes(1, 0, 1, 0), vec![0x01]],
            ),
            (OP_COMMIT, vec![ktucm_bytes(xid, true)]),
        ],
    );

    let outcome = run_records(vec![record]);
    assert_eq!(ops(&outcome), vec!["begin", "insert", "commit"]);
    assert_eq!(outcome.metrics.snapshot().decode_errors, 1);
}
