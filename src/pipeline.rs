//! Wires the Byte Reader / Record Framer / Vector Splitter up through the
//! opcode interpreters, Transaction Buffer, LOB Reassembly Engine,
//! Checkpoint Coordinator and Emitter Facade. The reader/parser/writer
//! split described by the concurrency model collapses to a single
//! in-order walk here, since one redo file is read strictly
//! sequentially anyway - the split buys overlap between files, which
//! `main.rs`'s file loop does not yet need.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::change::Op;
use crate::checkpoint::CheckpointCoordinator;
use crate::config::EngineConfig;
use crate::dictionary::Dictionary;
use crate::emit::Emitter;
use crate::error::Result;
use crate::lob::LobReassembler;
use crate::metrics::EngineMetrics;
use crate::opcodes::{self, ddl, lob_ops, row, undo, Decoded};
use crate::redo::format::OracleVersion;
use crate::redo::{Framer, RecordHeader};
use crate::txn::buffer::RollbackKey;
use crate::txn::{rollback_key, TransactionBuffer, UndoMerger};
use crate::xid::Xid;

pub struct Pipeline<'a> {
    framer: Framer<'a>,
    version: OracleVersion,
    txns: TransactionBuffer,
    undo_merger: UndoMerger,
    lobs: LobReassembler,
    checkpoint: CheckpointCoordinator,
    metrics: &'a EngineMetrics,
    config: &'a EngineConfig,
    dictionary: &'a dyn Dictionary,
    emitter: &'a mut dyn Emitter,
    /// Transaction the most recently seen undo/begin vector named; row
    /// vectors within the same record inherit it, since `kdoOpCode` row
    /// pieces don't carry their own `Xid`.
    current_xid: Option<Xid>,
    /// Reassembled undo before-images waiting to be attached to their
    /// matching row change's `before_image` (§ 4.6), keyed by the same
    /// `RollbackKey` a partial rollback would match against. Removed
    /// (one-shot) the moment a `RowChanges` change claims it.
    undo_images: HashMap<RollbackKey, Vec<u8>>,
}

impl<'a> Pipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: &Path,
        block_size: usize,
        start_sequence: u32,
        start_block: u32,
        version: OracleVersion,
        metrics: &'a EngineMetrics,
        config: &'a EngineConfig,
        dictionary: &'a dyn Dictionary,
        emitter: &'a mut dyn Emitter,
    ) -> std::io::Result<Self> {
        let checkpoint = CheckpointCoordinator::new(config.checkpoint_file.clone())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(Self {
            framer: Framer::new(path, block_size, start_sequence, start_block, version, metrics)?,
            version,
            txns: TransactionBuffer::new(),
            undo_merger: UndoMerger::new(),
            lobs: LobReassembler::new(),
            checkpoint,
            metrics,
            config,
            dictionary,
            emitter,
            current_xid: None,
            undo_images: HashMap::new(),
        })
    }

    /// Drain every record currently available from the redo file,
    /// returning once the framer reports clean EOF (tailing an online
    /// log: call again later once LGWR has written more).
    pub fn run(&mut self) -> Result<()> {
        loop {
            let next = if self.config.flags.on_error_continue {
                match self.framer.next_record() {
                    Ok(r) => r,
                    Err(e) if !e.is_fatal() => {
                        warn!(error = %e, "recoverable framing error, skipping record");
                        EngineMetrics::inc(&self.metrics.decode_errors);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                self.framer.next_record()?
            };

            let Some((header, buffer)) = next else { return Ok(()) };
            EngineMetrics::inc(&self.metrics.records_framed);
            self.process_record(&header, buffer)?;

            if header.is_lwn_header() {
                let oldest = self.txns.oldest_active();
                self.checkpoint.advance_watermark(header.scn, oldest.map(|(_, scn)| scn));
                let min_active_xid = oldest.map(|(xid, _)| xid);
                self.checkpoint
                    .flush_at_lwn_boundary(header.sequence, self.framer.current_block_index(), min_active_xid)?;
                EngineMetrics::inc(&self.metrics.checkpoints_flushed);
                let (sequence, block_number) = {
                    let state = self.checkpoint.state();
                    (state.sequence, state.block_number)
                };
                let watermark = self.checkpoint.watermark();
                self.emitter
                    .process_checkpoint(sequence, watermark, header.timestamp, block_number as u64, true)?;
            }
        }
    }

    fn process_record(&mut self, header: &RecordHeader, buffer: crate::redo::RecordBuffer) -> Result<()> {
        let (mut splitter, _header) = crate::redo::vector::VectorSplitter::new(buffer, self.version)?;

        while let Some(vector) = splitter.next_vector()? {
            EngineMetrics::inc(&self.metrics.vectors_decoded);
            let xid_ctx = self.current_xid.unwrap_or(Xid::zero());

            let decoded = match opcodes::decode(&vector, xid_ctx) {
                Ok(d) => d,
                Err(e) if !e.is_fatal() && self.config.flags.on_error_continue => {
                    warn!(error = %e, opcode = vector.opcode, "skipping vector after decode error");
                    EngineMetrics::inc(&self.metrics.decode_errors);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.handle_decoded(header, decoded)?;
        }
        Ok(())
    }

    /// Remember a fully (or partially) reassembled undo payload's bytes
    /// under its undo-block address, so the matching row change can claim
    /// them as its before-image once it arrives.
    fn store_undo_image(&mut self, uba: Option<crate::opcodes::undo::UndoBlockAddress>, fields: Vec<Vec<u8>>) {
        if let Some(uba) = uba {
            let key = rollback_key(&uba);
            self.undo_images.insert(key, fields.concat());
        }
    }

    fn handle_decoded(&mut self, header: &RecordHeader, decoded: Decoded) -> Result<()> {
        match decoded {
            Decoded::Begin(begin) => {
                self.current_xid = Some(begin.xid);
                self.txns.begin(begin.xid, header.scn, header.thread, header.sequence, header.timestamp);
            }
            Decoded::Undo(undo_vec) => {
                self.current_xid = Some(undo_vec.xid);
                if let Some((complete, uba)) =
                    self.undo_merger
                        .push(undo_vec.xid, undo_vec.payload, Some(undo_vec.uba), undo_vec.last_buffer_split)
                {
                    self.store_undo_image(uba, complete);
                }
            }
            Decoded::PartialRollback(pr) => {
                let key = rollback_key(&pr.uba);
                if let Err(e) = self.txns.partial_rollback(pr.xid, key) {
                    warn!(error = %e, xid = %pr.xid, "partial rollback matched no buffered change");
                }
            }
            Decoded::SplitUndo(split) => {
                if let Some((complete, uba)) = self.undo_merger.push(split.xid, split.payload, None, true) {
                    self.store_undo_image(uba, complete);
                }
            }
            Decoded::RowChanges(mut changes) => {
                let xid = self.current_xid.unwrap_or(Xid::zero());
                for mut change in changes.drain(..) {
                    let key = change.undo_key;
                    if let Some(key) = key {
                        change.before_image = self.undo_images.remove(&key);
                    }
                    self.txns.push_change(xid, header.scn, key, change);
                }
            }
            Decoded::LobIndexPage(page) => {
                self.lobs.accept_index_page(page);
            }
            Decoded::LobInRow(in_row) => {
                let _ = self.lobs.accept_in_row(in_row);
            }
            Decoded::LobPageRun(run) => {
                self.lobs.accept_page_run(run);
            }
            Decoded::Ddl(boxed) => {
                let (change, statement) = *boxed;
                if self.config.flags.track_ddl {
                    self.emitter.process_ddl(change.xid, header.scn, statement.obj, &statement.text)?;
                }
            }
            Decoded::End(end) => {
                let allow_incomplete = self.config.flags.show_incomplete_transactions;
                let ended = self
                    .txns
                    .end(end.xid, header.scn, header.sequence, header.timestamp, end.committed, allow_incomplete)?;
                if end.committed {
                    EngineMetrics::inc(&self.metrics.transactions_committed);
                    self.emitter.process_begin(
                        ended.xid,
                        ended.thread,
                        ended.begin_sequence,
                        ended.begin_scn,
                        ended.begin_ts,
                        ended.commit_sequence,
                        ended.commit_scn,
                        ended.commit_ts,
                        &ended.attributes,
                    )?;
                    self.emit_changes(end.xid, header.scn, ended.changes)?;
                    self.emitter.process_commit()?;
                } else {
                    EngineMetrics::inc(&self.metrics.transactions_rolled_back);
                }
                self.current_xid = None;
            }
            Decoded::Ignored => {}
        }
        Ok(())
    }

    /// Emits every change from one committed transaction, batching
    /// consecutive `MultiInsert`/`MultiDelete` changes that share an
    /// owning object into a single `process_insert_multiple`/
    /// `process_delete_multiple` call rather than one call per row - the
    /// 11.11/11.12 opcodes describe a whole batch in one redo vector, and
    /// the Emitter ABI mirrors that.
    fn emit_changes(&mut self, xid: Xid, scn: crate::scn::Scn, changes: Vec<crate::change::Change>) -> Result<()> {
        let mut i = 0;
        while i < changes.len() {
            let change = &changes[i];
            let table = self.dictionary.table(change.obj);
            EngineMetrics::inc(&self.metrics.changes_emitted);
            match &change.op {
                Op::Insert => {
                    self.emitter.process_insert(xid, scn, change, table)?;
                    i += 1;
                }
                Op::Update | Op::Overwrite => {
                    self.emitter.process_update(xid, scn, change, table)?;
                    i += 1;
                }
                Op::Delete => {
                    self.emitter.process_delete(xid, scn, change, table)?;
                    i += 1;
                }
                Op::MultiInsert | Op::MultiDelete => {
                    let op = change.op.clone();
                    let obj = change.obj;
                    let end = i + changes[i..].iter().take_while(|c| c.op == op && c.obj == obj).count();
                    let table = self.dictionary.table(obj);
                    for _ in i + 1..end {
                        EngineMetrics::inc(&self.metrics.changes_emitted);
                    }
                    match op {
                        Op::MultiInsert => self.emitter.process_insert_multiple(xid, scn, &changes[i..end], table)?,
                        Op::MultiDelete => self.emitter.process_delete_multiple(xid, scn, &changes[i..end], table)?,
                        _ => unreachable!(),
                    }
                    i = end;
                }
                Op::SuppLog | Op::Lock | Op::Ddl => {
                    i += 1;
                }
            }
        }
        Ok(())
    }
}

// Re-exported so callers constructing a pipeline don't need to reach
// into `crate::opcodes`/`crate::redo` themselves for these marker types.
pub use row::{
    OP_CHANGE_FORWARD_ADDRESS, OP_DELETE, OP_INSERT, OP_MULTI_DELETE, OP_MULTI_INSERT, OP_OVERWRITE, OP_SUPPLEMENTAL_LOG,
    OP_UPDATE,
};
pub use undo::{OP_BEGIN, OP_COMMIT, OP_PARTIAL_ROLLBACK, OP_SPLIT_UNDO, OP_UNDO};
pub use ddl::OP_DDL;
pub use lob_ops::{OP_LOB_INDEX_WRITE, OP_LOB_IN_ROW_WRITE, OP_LOB_PAGE_RUN_WRITE};
