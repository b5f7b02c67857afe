//! Shared sub-prolog decoders. Every row and undo opcode's first one or
//! two fields carry one of these before the opcode-specific payload
//! starts; factoring them out once keeps `undo.rs`/`row.rs` focused on
//! what each opcode actually does with the columns.

use crate::error::{self, EngineError, Result};
use crate::xid::Xid;

fn read_u16(buf: &[u8], off: usize) -> Option<u16> {
    buf.get(off..off + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(buf: &[u8], off: usize) -> Option<u32> {
    buf.get(off..off + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(buf: &[u8], off: usize) -> Option<u64> {
    buf.get(off..off + 8).map(|b| {
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        u64::from_le_bytes(a)
    })
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KtbFlags: u8 {
        /// The transaction's `Xid` is present in this prolog (set on the
        /// first change an ITL entry makes; later changes reuse it).
        const XID_PRESENT = 0x01;
        /// An undo-block-address back-pointer is present.
        const UBA_PRESENT = 0x02;
    }
}

/// `ktbRedo`: the transaction-block redo sub-prolog. Identifies which ITL
/// slot owns the change and, when present, the transaction's `Xid` and its
/// undo-block back-pointer (used by the rollback-marker five-tuple match).
#[derive(Debug, Clone, Copy)]
pub struct KtbRedo {
    pub itl_slot: u16,
    pub flags: KtbFlags,
    pub xid: Option<Xid>,
    pub uba_dba: u32,
    pub uba_seq: u16,
    pub uba_rec: u8,
}

impl KtbRedo {
    /// Layout: `u16 itl_slot, u8 flags, u8 pad, u64 xid, u32 uba_dba, u16 uba_seq, u8 uba_rec, u8 pad`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 20 {
            return Err(EngineError::decode(error::E_FIELD_TOO_SHORT, 0, "ktbRedo field too short"));
        }
        let itl_slot = read_u16(buf, 0).unwrap();
        let flags = KtbFlags::from_bits_truncate(buf[2]);
        let xid_raw = read_u64(buf, 4).unwrap();
        let xid = if flags.contains(KtbFlags::XID_PRESENT) && xid_raw != 0 {
            Some(Xid::from_raw(xid_raw))
        } else {
            None
        };
        let uba_dba = read_u32(buf, 12).unwrap();
        let uba_seq = read_u16(buf, 16).unwrap();
        let uba_rec = buf[18];
        Ok(KtbRedo {
            itl_slot,
            flags,
            xid,
            uba_dba,
            uba_seq,
            uba_rec,
        })
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RowFlags: u8 {
        /// Column data for this vector is a single opaque compressed blob
        /// (`KDOM2` array) rather than one vector field per column.
        const COMPRESSED = 0x01;
        /// Row piece carries a cluster key prefix before the row data.
        const CLUSTERED  = 0x02;
    }
}

/// `kdoOpCode`: the table-row operation sub-header. Carries the block
/// address and slot the row lives in, the touched column count, and the
/// ITL entry the row operation is covered by.
#[derive(Debug, Clone, Copy)]
pub struct KdoOpCode {
    pub bdba: u32,
    pub slot: u16,
    pub col_count: u16,
    pub itli: u8,
    pub flags: RowFlags,
}

impl KdoOpCode {
    /// Layout: `u32 bdba, u16 slot, u16 cc, u8 itli, u8 flags, u16 pad`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 12 {
            return Err(EngineError::decode(error::E_FIELD_TOO_SHORT, 0, "kdoOpCode field too short"));
        }
        Ok(KdoOpCode {
            bdba: read_u32(buf, 0).unwrap(),
            slot: read_u16(buf, 4).unwrap(),
            col_count: read_u16(buf, 6).unwrap(),
            itli: buf[8],
            flags: RowFlags::from_bits_truncate(buf[9]),
        })
    }
}

/// `ktub`: the undo sub-prolog trailing the first field of every undo
/// vector (opcode 5.1). Names the table/object the undo applies to and
/// the opcode it is undo *for*.
#[derive(Debug, Clone, Copy)]
pub struct Ktub {
    pub obj: u32,
    pub data_obj: u32,
    pub undo_opcode: u16,
    pub flags: u16,
}

impl Ktub {
    /// Layout: `u32 obj, u32 data_obj, u16 undo_opcode, u16 flags`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 12 {
            return Err(EngineError::decode(error::E_FIELD_TOO_SHORT, 0, "ktub field too short"));
        }
        Ok(Ktub {
            obj: read_u32(buf, 0).unwrap(),
            data_obj: read_u32(buf, 4).unwrap(),
            undo_opcode: read_u16(buf, 8).unwrap(),
            flags: read_u16(buf, 10).unwrap(),
        })
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KtudbFlags: u16 {
        const PARTIAL_ROLLBACK = 0x0001;
        const LAST_BUFFER_SPLIT = 0x0002;
    }
}

/// `ktudb`: transaction descriptor attached to 5.1 undo vectors, carrying
/// the owning `Xid`, the multi-block-undo split flags, and (mirroring
/// `ktbRedo`'s own back-pointer) the undo-block address this undo record
/// itself lives at.
#[derive(Debug, Clone, Copy)]
pub struct Ktudb {
    pub xid: Xid,
    pub flags: KtudbFlags,
    pub uba_dba: u32,
    pub uba_seq: u16,
    pub uba_rec: u8,
}

impl Ktudb {
    /// Layout: `u64 xid, u16 flags, u16 pad, u32 uba_dba, u16 uba_seq, u8 uba_rec, u8 pad`.
    /// The `uba_*` fields trail the begin/commit vectors' shorter prologs,
    /// so they're read defensively and default to 0 rather than erroring -
    /// only 5.1 undo vectors actually carry them.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(EngineError::decode(error::E_FIELD_TOO_SHORT, 0, "ktudb field too short"));
        }
        Ok(Ktudb {
            xid: Xid::from_raw(read_u64(buf, 0).unwrap()),
            flags: KtudbFlags::from_bits_truncate(read_u16(buf, 8).unwrap_or(0)),
            uba_dba: read_u32(buf, 12).unwrap_or(0),
            uba_seq: read_u16(buf, 16).unwrap_or(0),
            uba_rec: buf.get(18).copied().unwrap_or(0),
        })
    }
}

/// `ktucm`/`ktucf`: commit/rollback descriptor attached to 5.4 vectors.
#[derive(Debug, Clone, Copy)]
pub struct Ktucm {
    pub xid: Xid,
    /// `true` for a commit, `false` for a rollback.
    pub committed: bool,
}

impl Ktucm {
    /// Layout: `u64 xid, u8 committed, u8... pad`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 9 {
            return Err(EngineError::decode(error::E_FIELD_TOO_SHORT, 0, "ktucm field too short"));
        }
        Ok(Ktucm {
            xid: Xid::from_raw(read_u64(buf, 0).unwrap()),
            committed: buf[8] != 0,
        })
    }
}

/// Decode a `KDOM2` packed column array: repeating `(col_idx: u8, len_prefix, data)`
/// tuples, where `len_prefix == 0xFF` marks NULL and `0xFE` signals that the
/// real length follows as a little-endian `u16` (for columns wider than 253
/// bytes). Used for the compressed/update column-map path (§ row op URP).
pub fn decode_kdom2_columns(buf: &[u8]) -> Result<Vec<(u16, Option<Vec<u8>>)>> {
    let mut out = Vec::new();
    let mut p = 0usize;
    while p < buf.len() {
        if p + 2 > buf.len() {
            return Err(EngineError::decode(
                error::E_FIELD_TOO_SHORT,
                p as u64,
                "truncated KDOM2 column entry",
            ));
        }
        let col_idx = buf[p] as u16;
        let marker = buf[p + 1];
        p += 2;

        match marker {
            0xFF => {
                out.push((col_idx, None));
            }
            0xFE => {
                let len = read_u16(buf, p).ok_or_else(|| {
                    EngineError::decode(error::E_FIELD_TOO_SHORT, p as u64, "truncated KDOM2 extended length")
                })? as usize;
                p += 2;
                if p + len > buf.len() {
                    return Err(EngineError::decode(
                        error::E_FIELD_TOO_SHORT,
                        p as u64,
                        "KDOM2 extended column exceeds field length",
                    ));
                }
                out.push((col_idx, Some(buf[p..p + len].to_vec())));
                p += len;
            }
            len => {
                let len = len as usize;
                if p + len > buf.len() {
                    return Err(EngineError::decode(
                        error::E_FIELD_TOO_SHORT,
                        p as u64,
                        "KDOM2 column exceeds field length",
                    ));
                }
                out.push((col_idx, Some(buf[p..p + len].to_vec())));
                p += len;
            }
        }
    }
    Ok(out)
}
