//! Opcode 24.1: DDL. The payload is the DDL statement's text plus the
//! object it targets; there is no before/after row pair to reconstruct.

use crate::change::{Change, Op};
use crate::error::{self, EngineError, Result};
use crate::redo::vector::ChangeVector;
use crate::xid::Xid;

pub const OP_DDL: u16 = 0x1801;

#[derive(Debug, Clone)]
pub struct DdlStatement {
    pub obj: u32,
    pub data_obj: u32,
    pub ddl_type: u16,
    pub text: String,
}

pub fn decode_ddl(vector: &ChangeVector, xid: Xid) -> Result<(Change, DdlStatement)> {
    let header = vector.field(0);
    if header.len() < 10 {
        return Err(EngineError::decode(
            error::E_FIELD_TOO_SHORT,
            0,
            "DDL header field too short",
        ));
    }
    let obj = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let data_obj = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let ddl_type = u16::from_le_bytes([header[8], header[9]]);

    let text_bytes = vector.field(1);
    let text = String::from_utf8_lossy(text_bytes).into_owned();

    let mut change = Change::new(Op::Ddl, xid, obj, data_obj, 0, 0);
    change.compressed_blob = None;

    Ok((
        change,
        DdlStatement {
            obj,
            data_obj,
            ddl_type,
            text,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn decodes_ddl_text() {
        let mut header = vec![0u8; 10];
        header[0..4].copy_from_slice(&42u32.to_le_bytes());

        let mut buf = vec![0u8; 24];
        buf.extend_from_slice(&[0u8; 24]);
        buf.extend_from_slice(&OP_DDL.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        let text = b"ALTER TABLE FOO ADD COLUMN BAR NUMBER".to_vec();
        buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
        let start1 = buf.len();
        buf.extend_from_slice(&header);
        while (buf.len() - start1) % 4 != 0 {
            buf.push(0);
        }
        let start2 = buf.len();
        buf.extend_from_slice(&text);
        while (buf.len() - start2) % 4 != 0 {
            buf.push(0);
        }

        let buffer: Arc<[u8]> = Arc::from(buf.into_boxed_slice());
        let (mut splitter, _header) =
            crate::redo::vector::VectorSplitter::new(buffer, crate::redo::format::OracleVersion::V11_2).unwrap();
        let v = splitter.next_vector().unwrap().unwrap();

        let (change, ddl) = decode_ddl(&v, Xid::new(1, 1, 1)).unwrap();
        assert_eq!(change.op, Op::Ddl);
        assert_eq!(ddl.obj, 42);
        assert!(ddl.text.starts_with("ALTER TABLE"));
    }
}
