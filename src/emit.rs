//! Emitter Facade: the ABI downstream consumers implement
//! (`process_begin/insert/update/delete/ddl/insert_multiple/delete_multiple/commit/checkpoint`),
//! plus the one implementation this crate ships - a JSON-lines writer
//! used by the `redo-tail` binary and the integration tests.
//!
//! This is also where raw `Change.column_images` bytes become typed
//! values: the core decode path stays at the byte level (§ 3 data
//! model), and interpreting those bytes against `Dictionary` metadata -
//! including Oracle's internal `NUMBER` encoding - belongs to the
//! consumer-facing layer, not the opcode interpreters.

use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::change::{Change, ColumnImage, Op};
use crate::dictionary::{Dictionary, TableMeta};
use crate::error::Result;
use crate::oracle_number;
use crate::scn::Scn;
use crate::xid::Xid;

#[allow(clippy::too_many_arguments)]
pub trait Emitter: Send {
    /// Describes one whole transaction's begin and commit metadata in a
    /// single call (§ 6) - by the time a transaction is known complete
    /// enough to emit, both ends of its lifetime are already in hand.
    fn process_begin(
        &mut self,
        xid: Xid,
        thread: u16,
        begin_seq: u32,
        begin_scn: Scn,
        begin_ts: u32,
        commit_seq: u32,
        commit_scn: Scn,
        commit_ts: u32,
        attributes: &HashMap<String, String>,
    ) -> Result<()>;
    fn process_insert(&mut self, xid: Xid, scn: Scn, change: &Change, table: Option<&TableMeta>) -> Result<()>;
    fn process_update(&mut self, xid: Xid, scn: Scn, change: &Change, table: Option<&TableMeta>) -> Result<()>;
    fn process_delete(&mut self, xid: Xid, scn: Scn, change: &Change, table: Option<&TableMeta>) -> Result<()>;
    fn process_ddl(&mut self, xid: Xid, scn: Scn, obj: u32, text: &str) -> Result<()>;
    fn process_insert_multiple(&mut self, xid: Xid, scn: Scn, changes: &[Change], table: Option<&TableMeta>) -> Result<()>;
    fn process_delete_multiple(&mut self, xid: Xid, scn: Scn, changes: &[Change], table: Option<&TableMeta>) -> Result<()>;
    fn process_commit(&mut self) -> Result<()>;
    fn process_checkpoint(&mut self, sequence: u32, scn: Scn, ts: u32, file_offset: u64, is_redo: bool) -> Result<()>;
}

/// Decode one column's raw bytes into a JSON value, using the table's
/// declared type when known (falls back to a hex string for anything the
/// dictionary doesn't describe - never guessed as UTF-8 text, which would
/// silently corrupt binary columns).
fn decode_column(image: &ColumnImage, table: Option<&TableMeta>) -> serde_json::Value {
    if image.is_null() {
        return serde_json::Value::Null;
    }
    let data = image.data.as_ref().unwrap();
    let data_type = table
        .and_then(|t| t.columns.get(image.column_index as usize))
        .map(|c| c.data_type.as_str());

    match data_type {
        Some("NUMBER") => match oracle_number::decode_to_string(data) {
            Some(s) => json!(s),
            None => json!(hex::encode(data)),
        },
        Some("VARCHAR2") | Some("CHAR") => json!(String::from_utf8_lossy(data).into_owned()),
        _ => json!(hex::encode(data)),
    }
}

fn columns_to_json(images: &[ColumnImage], table: Option<&TableMeta>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for image in images {
        let name = table
            .and_then(|t| t.columns.get(image.column_index as usize))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("col_{}", image.column_index));
        map.insert(name, decode_column(image, table));
    }
    serde_json::Value::Object(map)
}

#[derive(Serialize)]
struct LogicalOp<'a> {
    op: &'a str,
    xid: String,
    scn: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ddl_text: Option<&'a str>,
}

/// Writes one JSON object per line, per § 6 "Emitter ABI". Tracks
/// cumulative bytes written within the current still-open transaction so
/// it can warn (not fail) when a single transaction's emission would
/// exceed `max_message_mb` - the caller decides whether that warning
/// becomes a forced flush boundary. `process_commit` takes no arguments
/// per the ABI, so the xid/scn it still reports are remembered from the
/// preceding `process_begin` call.
pub struct JsonLineEmitter<W: Write> {
    sink: W,
    max_message_bytes: usize,
    current_txn_bytes: usize,
    current_xid: Xid,
    current_commit_scn: Scn,
}

impl<W: Write> JsonLineEmitter<W> {
    pub fn new(sink: W, max_message_mb: usize) -> Self {
        Self {
            sink,
            max_message_bytes: max_message_mb * 1024 * 1024,
            current_txn_bytes: 0,
            current_xid: Xid::zero(),
            current_commit_scn: Scn::none(),
        }
    }

    fn write_line(&mut self, value: &impl Serialize) -> Result<()> {
        let line = serde_json::to_vec(value)?;
        self.current_txn_bytes += line.len();
        if self.current_txn_bytes > self.max_message_bytes {
            warn!(
                bytes = self.current_txn_bytes,
                limit = self.max_message_bytes,
                "transaction emission exceeds max_message_mb; consider an intra-transaction flush boundary"
            );
        }
        self.sink.write_all(&line)?;
        self.sink.write_all(b"\n")?;
        Ok(())
    }
}

fn table_name(table: Option<&TableMeta>) -> Option<&str> {
    table.map(|t| t.name.as_str())
}

impl<W: Write + Send> Emitter for JsonLineEmitter<W> {
    fn process_begin(
        &mut self,
        xid: Xid,
        thread: u16,
        begin_seq: u32,
        begin_scn: Scn,
        begin_ts: u32,
        commit_seq: u32,
        commit_scn: Scn,
        commit_ts: u32,
        attributes: &HashMap<String, String>,
    ) -> Result<()> {
        self.current_txn_bytes = 0;
        self.current_xid = xid;
        self.current_commit_scn = commit_scn;
        let value = json!({
            "op": "begin",
            "xid": xid.to_string(),
            "thread": thread,
            "begin_seq": begin_seq,
            "begin_scn": begin_scn.value(),
            "begin_ts": begin_ts,
            "commit_seq": commit_seq,
            "commit_scn": commit_scn.value(),
            "commit_ts": commit_ts,
            "attributes": attributes,
        });
        self.write_line(&value)
    }

    fn process_insert(&mut self, xid: Xid, scn: Scn, change: &Change, table: Option<&TableMeta>) -> Result<()> {
        self.write_line(&LogicalOp {
            op: "insert",
            xid: xid.to_string(),
            scn: scn.value(),
            table: table_name(table),
            columns: Some(columns_to_json(&change.column_images, table)),
            ddl_text: None,
        })
    }

    fn process_update(&mut self, xid: Xid, scn: Scn, change: &Change, table: Option<&TableMeta>) -> Result<()> {
        self.write_line(&LogicalOp {
            op: "update",
            xid: xid.to_string(),
            scn: scn.value(),
            table: table_name(table),
            columns: Some(columns_to_json(&change.column_images, table)),
            ddl_text: None,
        })
    }

    fn process_delete(&mut self, xid: Xid, scn: Scn, change: &Change, table: Option<&TableMeta>) -> Result<()> {
        self.write_line(&LogicalOp {
            op: "delete",
            xid: xid.to_string(),
            scn: scn.value(),
            table: table_name(table),
            columns: Some(columns_to_json(&change.column_images, table)),
            ddl_text: None,
        })
    }

    fn process_ddl(&mut self, xid: Xid, scn: Scn, obj: u32, text: &str) -> Result<()> {
        let value = json!({
            "op": "ddl",
            "xid": xid.to_string(),
            "scn": scn.value(),
            "obj": obj,
            "ddl_text": text,
        });
        self.write_line(&value)
    }

    fn process_insert_multiple(&mut self, xid: Xid, scn: Scn, changes: &[Change], table: Option<&TableMeta>) -> Result<()> {
        for change in changes {
            self.process_insert(xid, scn, change, table)?;
        }
        Ok(())
    }

    fn process_delete_multiple(&mut self, xid: Xid, scn: Scn, changes: &[Change], table: Option<&TableMeta>) -> Result<()> {
        for change in changes {
            self.process_delete(xid, scn, change, table)?;
        }
        Ok(())
    }

    fn process_commit(&mut self) -> Result<()> {
        self.current_txn_bytes = 0;
        self.write_line(&LogicalOp {
            op: "commit",
            xid: self.current_xid.to_string(),
            scn: self.current_commit_scn.value(),
            table: None,
            columns: None,
            ddl_text: None,
        })
    }

    fn process_checkpoint(&mut self, sequence: u32, scn: Scn, ts: u32, file_offset: u64, is_redo: bool) -> Result<()> {
        let value = json!({
            "op": "checkpoint",
            "sequence": sequence,
            "scn": scn.value(),
            "ts": ts,
            "file_offset": file_offset,
            "is_redo": is_redo,
        });
        self.write_line(&value)
    }
}

pub fn op_name(op: &Op) -> &'static str {
    match op {
        Op::Insert => "insert",
        Op::Delete => "delete",
        Op::Update => "update",
        Op::Overwrite => "overwrite",
        Op::MultiInsert => "insert_multiple",
        Op::MultiDelete => "delete_multiple",
        Op::Lock => "lock",
        Op::Ddl => "ddl",
        Op::SuppLog => "supplemental_log",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::ColumnMeta;

    fn table() -> TableMeta {
        TableMeta {
            obj: 1234,
            schema: "APP".into(),
            name: "ACCOUNTS".into(),
            columns: vec![ColumnMeta {
                name: "ID".into(),
                data_type: "NUMBER".into(),
            }],
            supplemental_log_columns: vec![],
        }
    }

    #[test]
    fn decodes_number_column_using_dictionary_type() {
        let table = table();
        let image = ColumnImage {
            column_index: 0,
            data: Some(vec![0xC1, 0x02]),
        };
        let value = decode_column(&image, Some(&table));
        assert_eq!(value, json!("1"));
    }

    #[test]
    fn null_column_becomes_json_null() {
        let image = ColumnImage {
            column_index: 0,
            data: None,
        };
        assert_eq!(decode_column(&image, None), serde_json::Value::Null);
    }

    #[test]
    fn emitter_writes_one_json_line_per_call() {
        let mut buf = Vec::new();
        let mut emitter = JsonLineEmitter::new(&mut buf, 32);
        let xid = Xid::new(1, 1, 1);
        let attrs = HashMap::new();
        emitter
            .process_begin(xid, 1, 10, Scn::new(90), 1000, 11, Scn::new(100), 1001, &attrs)
            .unwrap();
        emitter.process_commit().unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().contains("\"begin\""));
        assert!(text.lines().nth(1).unwrap().contains(&xid.to_string()));
    }
}
