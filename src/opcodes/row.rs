//! Row-change opcodes in class 11: 11.2 insert, 11.3 delete, 11.5 update,
//! 11.6 overwrite, 11.8 change-forward-address, 11.11 multi-row insert,
//! 11.12 multi-row delete, 11.16 supplemental log.
//!
//! Two column-extraction paths exist (§ 4.4): the common case is one
//! vector field per column (zero-length field = NULL); the compressed
//! path (`RowFlags::COMPRESSED`) instead carries a single packed `KDOM2`
//! byte array that only lists the columns actually touched.

use crate::change::{Change, ColumnImage, Op, SuppLog};
use crate::error::{self, EngineError, Result};
use crate::opcodes::helpers::{decode_kdom2_columns, KdoOpCode, KtbRedo, RowFlags};
use crate::redo::vector::ChangeVector;
use crate::xid::Xid;

pub const OP_INSERT: u16 = 0x0B02;
pub const OP_DELETE: u16 = 0x0B03;
pub const OP_UPDATE: u16 = 0x0B05;
pub const OP_OVERWRITE: u16 = 0x0B06;
pub const OP_CHANGE_FORWARD_ADDRESS: u16 = 0x0B08;
pub const OP_MULTI_INSERT: u16 = 0x0B0B;
pub const OP_MULTI_DELETE: u16 = 0x0B0C;
pub const OP_SUPPLEMENTAL_LOG: u16 = 0x0B10;

/// Index of the first column field when columns aren't compressed: field
/// 0 is `ktbRedo`, field 1 is `kdoOpCode`.
const FIRST_COLUMN_FIELD: usize = 2;

fn plain_columns(vector: &ChangeVector, kdo: &KdoOpCode) -> Result<Vec<ColumnImage>> {
    let mut columns = Vec::with_capacity(kdo.col_count as usize);
    for i in 0..kdo.col_count as usize {
        let field_idx = FIRST_COLUMN_FIELD + i;
        if field_idx >= vector.field_count() {
            return Err(EngineError::decode(
                error::E_FIELD_COUNT_MISMATCH,
                field_idx as u64,
                "row vector declares more columns than fields present",
            ));
        }
        let raw = vector.field(field_idx);
        columns.push(ColumnImage {
            column_index: i as u16,
            data: if raw.is_empty() { None } else { Some(raw.to_vec()) },
        });
    }
    Ok(columns)
}

fn compressed_columns(vector: &ChangeVector) -> Result<Vec<ColumnImage>> {
    let blob = vector.field(FIRST_COLUMN_FIELD);
    decode_kdom2_columns(blob).map(|entries| {
        entries
            .into_iter()
            .map(|(idx, data)| ColumnImage { column_index: idx, data })
            .collect()
    })
}

fn base_change(op: Op, xid: Xid, ktb: &KtbRedo, kdo: &KdoOpCode) -> Change {
    let mut change = Change::new(op, xid, 0, 0, kdo.bdba, kdo.slot);
    change.row_flags = kdo.flags.bits();
    change.col_count = kdo.col_count;
    if ktb.flags.contains(crate::opcodes::helpers::KtbFlags::UBA_PRESENT) {
        change.undo_key = Some((ktb.uba_dba, ktb.uba_seq, ktb.uba_rec));
    }
    change
}

fn decode_prologs(vector: &ChangeVector) -> Result<(KtbRedo, KdoOpCode)> {
    let ktb = KtbRedo::parse(vector.field(0))?;
    let kdo = KdoOpCode::parse(vector.field(1))?;
    Ok((ktb, kdo))
}

pub fn decode_insert(vector: &ChangeVector, xid: Xid) -> Result<Change> {
    let (ktb, kdo) = decode_prologs(vector)?;
    let mut change = base_change(Op::Insert, xid, &ktb, &kdo);
    change.column_images = if kdo.flags.contains(RowFlags::COMPRESSED) {
        change.compressed_blob = Some(vector.field(FIRST_COLUMN_FIELD).to_vec());
        Vec::new()
    } else {
        plain_columns(vector, &kdo)?
    };
    Ok(change)
}

pub fn decode_delete(vector: &ChangeVector, xid: Xid) -> Result<Change> {
    let (ktb, kdo) = decode_prologs(vector)?;
    Ok(base_change(Op::Delete, xid, &ktb, &kdo))
}

pub fn decode_update(vector: &ChangeVector, xid: Xid) -> Result<Change> {
    let (ktb, kdo) = decode_prologs(vector)?;
    let mut change = base_change(Op::Update, xid, &ktb, &kdo);
    change.column_images = if kdo.flags.contains(RowFlags::COMPRESSED) {
        compressed_columns(vector)?
    } else {
        plain_columns(vector, &kdo)?
    };
    Ok(change)
}

pub fn decode_overwrite(vector: &ChangeVector, xid: Xid) -> Result<Change> {
    let (ktb, kdo) = decode_prologs(vector)?;
    let mut change = base_change(Op::Overwrite, xid, &ktb, &kdo);
    change.column_images = if kdo.flags.contains(RowFlags::COMPRESSED) {
        compressed_columns(vector)?
    } else {
        plain_columns(vector, &kdo)?
    };
    Ok(change)
}

/// 11.8: the row moved to a new block/slot (e.g. a migrated row created
/// by a later update). `bdba`/`slot` on the returned `Change` are the old
/// location; `forward_addr` carries the new one.
pub fn decode_change_forward_address(vector: &ChangeVector, xid: Xid) -> Result<Change> {
    let (ktb, kdo) = decode_prologs(vector)?;
    let mut change = base_change(Op::Overwrite, xid, &ktb, &kdo);
    let new_loc = vector.field(2);
    if new_loc.len() < 6 {
        return Err(EngineError::decode(
            error::E_FIELD_TOO_SHORT,
            0,
            "change-forward-address vector missing new location field",
        ));
    }
    let new_bdba = u32::from_le_bytes([new_loc[0], new_loc[1], new_loc[2], new_loc[3]]);
    let new_slot = u16::from_le_bytes([new_loc[4], new_loc[5]]);
    change.forward_addr = Some((new_bdba, new_slot));
    Ok(change)
}

/// 11.11: one vector carrying several inserted rows, each with its own
/// `kdoOpCode` header and column set back to back starting at field 2.
pub fn decode_multi_insert(vector: &ChangeVector, xid: Xid) -> Result<Vec<Change>> {
    decode_multi_row(vector, xid, Op::MultiInsert, true)
}

/// 11.12: one vector carrying several deleted rows' slot addresses (no
/// column payload).
pub fn decode_multi_delete(vector: &ChangeVector, xid: Xid) -> Result<Vec<Change>> {
    decode_multi_row(vector, xid, Op::MultiDelete, false)
}

fn decode_multi_row(vector: &ChangeVector, xid: Xid, op: Op, has_columns: bool) -> Result<Vec<Change>> {
    let ktb = KtbRedo::parse(vector.field(0))?;
    let mut changes = Vec::new();
    let mut idx = 1;
    while idx < vector.field_count() {
        let kdo = KdoOpCode::parse(vector.field(idx))?;
        idx += 1;
        let mut change = base_change(op.clone(), xid, &ktb, &kdo);
        if has_columns {
            if kdo.flags.contains(RowFlags::COMPRESSED) {
                change.compressed_blob = Some(vector.field(idx).to_vec());
                idx += 1;
            } else {
                let mut columns = Vec::with_capacity(kdo.col_count as usize);
                for i in 0..kdo.col_count as usize {
                    if idx >= vector.field_count() {
                        return Err(EngineError::decode(
                            error::E_FIELD_COUNT_MISMATCH,
                            idx as u64,
                            "multi-row vector truncated before declared column count",
                        ));
                    }
                    let raw = vector.field(idx);
                    columns.push(ColumnImage {
                        column_index: i as u16,
                        data: if raw.is_empty() { None } else { Some(raw.to_vec()) },
                    });
                    idx += 1;
                }
                change.column_images = columns;
            }
        }
        changes.push(change);
    }
    Ok(changes)
}

/// 11.16: supplemental-logging header trailing a row change, carrying a
/// second copy of the before/after images for columns the table's
/// supplemental-log group names explicitly.
pub fn decode_supplemental_log(vector: &ChangeVector, xid: Xid) -> Result<Change> {
    let (ktb, kdo) = decode_prologs(vector)?;
    let mut change = base_change(Op::SuppLog, xid, &ktb, &kdo);

    let header = vector.field(2);
    if header.len() < 9 {
        return Err(EngineError::decode(
            error::E_FIELD_TOO_SHORT,
            0,
            "supplemental log header field too short",
        ));
    }
    let fb = header[0];
    let before_count = u16::from_le_bytes([header[1], header[2]]);
    let after_count = u16::from_le_bytes([header[3], header[4]]);
    let bdba = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);

    let mut columns = Vec::new();
    let total = before_count as usize + after_count as usize;
    for i in 0..total {
        let field_idx = 3 + i;
        if field_idx >= vector.field_count() {
            break;
        }
        let raw = vector.field(field_idx);
        columns.push(ColumnImage {
            column_index: i as u16,
            data: if raw.is_empty() { None } else { Some(raw.to_vec()) },
        });
    }

    change.supp_log = Some(SuppLog {
        fb,
        before_count,
        after_count,
        bdba,
        slot: kdo.slot,
        columns,
    });
    Ok(change)
}
