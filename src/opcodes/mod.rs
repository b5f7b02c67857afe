//! Opcode interpreters: decode a single `ChangeVector` according to its
//! `(cls, opc)` pair. Dispatch lives here; each opcode family's actual
//! byte-level decoding lives in its own submodule.

pub mod ddl;
pub mod helpers;
pub mod lob_ops;
pub mod row;
pub mod undo;

use crate::error::{self, EngineError, Result};
use crate::redo::vector::ChangeVector;
use crate::xid::Xid;

/// Everything an opcode interpreter can hand back to the pipeline. Most
/// variants carry exactly what their name says; `RowChanges` covers both
/// the single-row opcodes and the multi-row ones (11.11/11.12), which
/// return more than one `Change` from a single vector.
pub enum Decoded {
    Begin(undo::TxnBegin),
    End(undo::TxnEnd),
    Undo(undo::UndoVector),
    PartialRollback(undo::PartialRollback),
    SplitUndo(undo::SplitUndoContinuation),
    RowChanges(Vec<crate::change::Change>),
    LobIndexPage(lob_ops::LobIndexPage),
    LobInRow(lob_ops::LobInRow),
    LobPageRun(lob_ops::LobPageRun),
    Ddl(Box<(crate::change::Change, ddl::DdlStatement)>),
    /// Opcode recognized but carrying no payload this pipeline acts on
    /// (e.g. 5.11 tail markers with an empty continuation).
    Ignored,
}

/// Decode one vector. `xid_for_row_ops` is the transaction id the caller
/// (the Transaction Buffer) has already associated with this vector via
/// its `ktbRedo`/undo pairing - row opcodes don't carry their own `Xid`
/// field, only undo opcodes do.
pub fn decode(vector: &ChangeVector, xid_for_row_ops: Xid) -> Result<Decoded> {
    match vector.opcode {
        undo::OP_UNDO => Ok(Decoded::Undo(undo::decode_undo(vector)?)),
        undo::OP_BEGIN => Ok(Decoded::Begin(undo::decode_begin(vector)?)),
        undo::OP_COMMIT => Ok(Decoded::End(undo::decode_commit(vector)?)),
        undo::OP_PARTIAL_ROLLBACK => Ok(Decoded::PartialRollback(undo::decode_partial_rollback(vector)?)),
        undo::OP_SPLIT_UNDO => Ok(Decoded::SplitUndo(undo::decode_split_undo(vector)?)),

        row::OP_INSERT => Ok(Decoded::RowChanges(vec![row::decode_insert(vector, xid_for_row_ops)?])),
        row::OP_DELETE => Ok(Decoded::RowChanges(vec![row::decode_delete(vector, xid_for_row_ops)?])),
        row::OP_UPDATE => Ok(Decoded::RowChanges(vec![row::decode_update(vector, xid_for_row_ops)?])),
        row::OP_OVERWRITE => Ok(Decoded::RowChanges(vec![row::decode_overwrite(vector, xid_for_row_ops)?])),
        row::OP_CHANGE_FORWARD_ADDRESS => Ok(Decoded::RowChanges(vec![row::decode_change_forward_address(
            vector,
            xid_for_row_ops,
        )?])),
        row::OP_MULTI_INSERT => Ok(Decoded::RowChanges(row::decode_multi_insert(vector, xid_for_row_ops)?)),
        row::OP_MULTI_DELETE => Ok(Decoded::RowChanges(row::decode_multi_delete(vector, xid_for_row_ops)?)),
        row::OP_SUPPLEMENTAL_LOG => Ok(Decoded::RowChanges(vec![row::decode_supplemental_log(
            vector,
            xid_for_row_ops,
        )?])),

        lob_ops::OP_LOB_INDEX_WRITE => Ok(Decoded::LobIndexPage(lob_ops::decode_lob_index_write(vector)?)),
        lob_ops::OP_LOB_IN_ROW_WRITE => Ok(Decoded::LobInRow(lob_ops::decode_lob_in_row(vector)?)),
        lob_ops::OP_LOB_PAGE_RUN_WRITE => Ok(Decoded::LobPageRun(lob_ops::decode_lob_page_run(vector)?)),

        ddl::OP_DDL => Ok(Decoded::Ddl(Box::new(ddl::decode_ddl(vector, xid_for_row_ops)?))),

        other => Err(EngineError::decode(
            error::E_UNKNOWN_OPCODE,
            other as u64,
            format!("unrecognized opcode {:#06x}", other),
        )),
    }
}
