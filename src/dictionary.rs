//! Dictionary: resolves an object id to the table/LOB metadata the
//! Emitter needs to turn raw `Change` column bytes into named, typed
//! columns. Production deployments load this from the source database's
//! catalog; `StaticDictionary` here is a fixed in-memory registry for
//! tests and the `redo-tail` demo binary, not a loader.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone)]
pub struct TableMeta {
    pub obj: u32,
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnMeta>,
    /// Column indexes (0-based) that the supplemental-log group covers.
    pub supplemental_log_columns: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterSet {
    pub id: u16,
}

pub trait Dictionary: Send + Sync {
    fn table(&self, obj: u32) -> Option<&TableMeta>;
    fn lob_by_index(&self, obj: u32, column_index: u16) -> Option<&ColumnMeta>;
    fn character_set(&self) -> CharacterSet;
}

#[derive(Default)]
pub struct StaticDictionary {
    tables: HashMap<u32, TableMeta>,
    charset: CharacterSet,
}

impl StaticDictionary {
    pub fn new(charset_id: u16) -> Self {
        Self {
            tables: HashMap::new(),
            charset: CharacterSet { id: charset_id },
        }
    }

    pub fn with_table(mut self, table: TableMeta) -> Self {
        self.tables.insert(table.obj, table);
        self
    }
}

impl Dictionary for StaticDictionary {
    fn table(&self, obj: u32) -> Option<&TableMeta> {
        self.tables.get(&obj)
    }

    fn lob_by_index(&self, obj: u32, column_index: u16) -> Option<&ColumnMeta> {
        self.tables
            .get(&obj)
            .and_then(|t| t.columns.iter().find(|c| c.data_type == "LOB" && column_index < t.columns.len() as u16))
    }

    fn character_set(&self) -> CharacterSet {
        self.charset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_dictionary_resolves_registered_table() {
        let dict = StaticDictionary::new(178).with_table(TableMeta {
            obj: 1234,
            schema: "APP".into(),
            name: "ACCOUNTS".into(),
            columns: vec![ColumnMeta {
                name: "ID".into(),
                data_type: "NUMBER".into(),
            }],
            supplemental_log_columns: vec![0],
        });

        assert_eq!(dict.table(1234).unwrap().name, "ACCOUNTS");
        assert!(dict.table(9999).is_none());
        assert_eq!(dict.character_set().id, 178);
    }
}
