//! The decoded row event. Per `DESIGN.md`'s resolution of the "cyclic
//! references" design note, every byte slice here is owned (copied once
//! out of the record buffer at decode time) rather than borrowed from it,
//! so a `Change` can outlive the redo block it was decoded from.

use serde::{Deserialize, Serialize};

use crate::xid::Xid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Insert,
    Delete,
    Update,
    Overwrite,
    MultiInsert,
    MultiDelete,
    Lock,
    Ddl,
    SuppLog,
}

/// One column's before/after value as delivered by a row-piece vector.
/// `None` means SQL NULL (field length `0xFF`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnImage {
    pub column_index: u16,
    pub data: Option<Vec<u8>>,
}

impl ColumnImage {
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }
}

/// Secondary supplemental-log header trailing a row change when the table
/// has supplemental logging enabled for the touched columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppLog {
    pub fb: u8,
    pub before_count: u16,
    pub after_count: u16,
    pub bdba: u32,
    pub slot: u16,
    pub columns: Vec<ColumnImage>,
}

/// A reference from a row's column to a LOB value, resolved later by
/// `crate::lob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobRef {
    pub column_index: u16,
    pub lob_id: [u8; 10],
    /// `true` when the locator says the value is inline (flag `0x0400`).
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub op: Op,
    pub obj: u32,
    pub data_obj: u32,
    pub bdba: u32,
    pub slot: u16,
    pub row_flags: u8,
    pub col_count: u16,
    pub nulls_bitmap: Vec<u8>,
    pub column_images: Vec<ColumnImage>,
    pub supp_log: Option<SuppLog>,
    pub lob_refs: Vec<LobRef>,
    /// Populated by the block-compressed URP path (§ 4.4): a single
    /// opaque blob the Builder must explode, instead of discrete columns.
    pub compressed_blob: Option<Vec<u8>>,
    /// Set on opcode 11.8 (change-forward-address): the row's new block
    /// and slot after migration, alongside the old location already
    /// carried in `bdba`/`slot`.
    pub forward_addr: Option<(u32, u16)>,
    /// The undo record (`dba`, `seq`, `rec`) this change's `ktbRedo`
    /// points back to - the key a 5.6 partial rollback matches against
    /// to drop this specific change. See `crate::txn::buffer::RollbackKey`.
    pub undo_key: Option<(u32, u16, u8)>,
    pub xid: Xid,
    /// The pre-image bytes reassembled from this change's matching undo
    /// record (§ 4.6), when one was found - the full undo payload fields
    /// concatenated in arrival order. `None` until the Transaction Buffer
    /// resolves it, which never happens for changes with no `undo_key`.
    pub before_image: Option<Vec<u8>>,
}

impl Change {
    pub fn new(op: Op, xid: Xid, obj: u32, data_obj: u32, bdba: u32, slot: u16) -> Self {
        Self {
            op,
            obj,
            data_obj,
            bdba,
            slot,
            row_flags: 0,
            col_count: 0,
            nulls_bitmap: Vec::new(),
            column_images: Vec::new(),
            supp_log: None,
            lob_refs: Vec::new(),
            compressed_blob: None,
            forward_addr: None,
            undo_key: None,
            xid,
            before_image: None,
        }
    }

    pub fn is_null_column(&self, idx: usize) -> bool {
        self.nulls_bitmap
            .get(idx / 8)
            .map(|byte| byte & (1 << (idx % 8)) != 0)
            .unwrap_or(false)
    }
}
