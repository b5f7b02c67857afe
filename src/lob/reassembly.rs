//! LOB Reassembly Engine. Oracle writes a LOB's pages out of order and
//! interleaved with other transactions' redo; this module accumulates
//! pages per `LobKey` until every page a value needs has arrived, then
//! hands back one contiguous byte buffer.
//!
//! Three storage layouts feed it (§ 4.5): index-organized (one redo
//! vector per page, keyed by `LobId` + page number), in-row (the whole
//! value inline in the row, no reassembly needed), and the 12c+ in-value
//! page-run format (one vector covers a contiguous range of pages).

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::error::{self, EngineError, Result};
use crate::opcodes::lob_ops::{LobId, LobIndexPage, LobInRow, LobPageRun};

pub const LOB_PAGE_SIZE: usize = 8192;

/// LOB locators are globally unique identifiers on their own (`DBMS_LOB`
/// guarantees it), so no owning object id is needed to disambiguate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LobKey {
    pub lob_id: [u8; 10],
}

impl LobKey {
    pub fn new(lob_id: &LobId) -> Self {
        Self { lob_id: lob_id.0 }
    }
}

#[derive(Debug, Clone)]
pub struct LobData {
    pub bytes: Vec<u8>,
}

/// Value still being assembled: pages received so far, and any page
/// numbers whose data hasn't arrived yet but was already referenced by a
/// later page run (an "orphaned fragment" per § 4.5 until it's filled).
#[derive(Debug, Default)]
struct PendingLob {
    pages: BTreeMap<u32, Vec<u8>>,
    orphaned: Vec<u32>,
    declared_size: Option<u64>,
}

#[derive(Default)]
pub struct LobReassembler {
    pending: HashMap<LobKey, PendingLob>,
}

impl LobReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_declared_size(&mut self, key: LobKey, size: u64) {
        self.pending.entry(key).or_default().declared_size = Some(size);
    }

    pub fn accept_index_page(&mut self, page: LobIndexPage) {
        let key = LobKey::new(&page.lob_id);
        let entry = self.pending.entry(key).or_default();
        entry.pages.insert(page.page_no, page.data);
    }

    pub fn accept_page_run(&mut self, run: LobPageRun) {
        let key = LobKey::new(&run.lob_id);
        let entry = self.pending.entry(key).or_default();
        for i in 0..run.page_count as usize {
            let start = i * LOB_PAGE_SIZE;
            let end = ((i + 1) * LOB_PAGE_SIZE).min(run.data.len());
            if start >= run.data.len() {
                // Referenced by the run's page count but not actually
                // present in this vector's payload yet.
                entry.orphaned.push(run.start_page + i as u32);
                continue;
            }
            entry.pages.insert(run.start_page + i as u32, run.data[start..end].to_vec());
        }
    }

    /// In-row LOBs carry their whole value in a single vector; no
    /// accumulation needed, return it immediately.
    pub fn accept_in_row(&self, in_row: LobInRow) -> LobData {
        LobData { bytes: in_row.data }
    }

    /// Consume every page accumulated for `key` in page-number order.
    /// Errors (rather than silently truncating) on a gap in the page
    /// sequence or an orphaned fragment never filled in, and on a size
    /// mismatch against a previously declared total.
    pub fn finish(&mut self, key: LobKey) -> Result<LobData> {
        let pending = self
            .pending
            .remove(&key)
            .ok_or_else(|| EngineError::lob(error::E_LOB_INCOMPLETE, "finish called with no pages accumulated"))?;

        if !pending.orphaned.is_empty() {
            return Err(EngineError::lob(
                error::E_LOB_INCOMPLETE,
                format!("{} orphaned LOB page(s) never received data", pending.orphaned.len()),
            ));
        }

        let mut bytes = Vec::new();
        let mut expected_next = None;
        for (page_no, data) in pending.pages {
            if let Some(expected) = expected_next {
                if page_no != expected {
                    return Err(EngineError::lob(
                        error::E_LOB_INCOMPLETE,
                        format!("missing LOB page {} before page {}", expected, page_no),
                    ));
                }
            }
            bytes.extend_from_slice(&data);
            expected_next = Some(page_no + 1);
        }

        if let Some(declared) = pending.declared_size {
            if bytes.len() as u64 != declared {
                return Err(EngineError::lob(
                    error::E_LOB_SIZE_MISMATCH,
                    format!("assembled {} bytes, declared size was {}", bytes.len(), declared),
                ));
            }
        }

        Ok(LobData { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(lob_id: [u8; 10], page_no: u32, data: Vec<u8>) -> LobIndexPage {
        LobIndexPage {
            lob_id: LobId(lob_id),
            page_no,
            data,
        }
    }

    #[test]
    fn assembles_pages_in_order_regardless_of_arrival_order() {
        let mut r = LobReassembler::new();
        let lob_id = [1u8; 10];
        r.accept_index_page(page(lob_id, 1, vec![2, 2]));
        r.accept_index_page(page(lob_id, 0, vec![1, 1]));
        let key = LobKey::new(&LobId(lob_id));
        let data = r.finish(key).unwrap();
        assert_eq!(data.bytes, vec![1, 1, 2, 2]);
    }

    #[test]
    fn missing_page_is_an_error() {
        let mut r = LobReassembler::new();
        let lob_id = [2u8; 10];
        r.accept_index_page(page(lob_id, 0, vec![1]));
        r.accept_index_page(page(lob_id, 2, vec![3]));
        let key = LobKey::new(&LobId(lob_id));
        assert!(r.finish(key).is_err());
    }

    #[test]
    fn size_mismatch_against_declared_size_is_an_error() {
        let mut r = LobReassembler::new();
        let lob_id = [3u8; 10];
        let key = LobKey::new(&LobId(lob_id));
        r.note_declared_size(key, 10);
        r.accept_index_page(page(lob_id, 0, vec![1, 2, 3]));
        assert!(r.finish(key).is_err());
    }

    #[test]
    fn exactly_one_full_page_assembles_cleanly() {
        let mut r = LobReassembler::new();
        let lob_id = [4u8; 10];
        let run = LobPageRun {
            lob_id: LobId(lob_id),
            start_page: 0,
            page_count: 1,
            data: vec![9u8; LOB_PAGE_SIZE],
        };
        r.accept_page_run(run);
        let key = LobKey::new(&LobId(lob_id));
        let data = r.finish(key).unwrap();
        assert_eq!(data.bytes.len(), LOB_PAGE_SIZE);
    }
}
