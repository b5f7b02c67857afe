//! Transaction Buffer: reassembles undo split across several 5.11
//! continuation vectors, then pairs complete undo with its row-level
//! redo to build and release whole transactions.

pub mod buffer;

use std::collections::HashMap;

use crate::opcodes::undo::UndoBlockAddress;
use crate::xid::Xid;

pub use buffer::{rollback_key, RollbackKey, Transaction, TransactionBuffer, TxnState};

#[derive(Default)]
struct PendingUndo {
    fields: Vec<Vec<u8>>,
    uba: Option<UndoBlockAddress>,
}

/// Reassembles a multi-block undo record split as HEAD, zero or more
/// MID continuations, and a TAIL (the vector whose `ktudb` carries
/// `LAST_BUFFER_SPLIT`). Keyed by `Xid` since a transaction only ever has
/// one undo record in flight at a time. The HEAD fragment is the only one
/// that carries a real undo-block address - continuations don't restate
/// it - so the merger remembers whichever `uba` a push supplies and hands
/// it back alongside the reassembled fields.
#[derive(Default)]
pub struct UndoMerger {
    pending: HashMap<Xid, PendingUndo>,
}

impl UndoMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one undo vector's payload fields. Returns `Some((complete,
    /// uba))` once `last_buffer_split` closes out the chain, concatenating
    /// every fragment's fields in arrival order; otherwise buffers and
    /// returns `None`.
    pub fn push(
        &mut self,
        xid: Xid,
        mut payload: Vec<Vec<u8>>,
        uba: Option<UndoBlockAddress>,
        last_buffer_split: bool,
    ) -> Option<(Vec<Vec<u8>>, Option<UndoBlockAddress>)> {
        let entry = self.pending.entry(xid).or_default();
        entry.fields.append(&mut payload);
        if uba.is_some() {
            entry.uba = uba;
        }
        if last_buffer_split {
            let done = self.pending.remove(&xid).unwrap();
            Some((done.fields, done.uba))
        } else {
            None
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uba(dba: u32) -> UndoBlockAddress {
        UndoBlockAddress { dba, seq: 1, rec: 1 }
    }

    #[test]
    fn single_fragment_with_last_flag_completes_immediately() {
        let mut merger = UndoMerger::new();
        let xid = Xid::new(1, 1, 1);
        let (fields, got_uba) = merger.push(xid, vec![vec![1, 2]], Some(uba(9)), true).unwrap();
        assert_eq!(fields, vec![vec![1, 2]]);
        assert_eq!(got_uba, Some(uba(9)));
    }

    #[test]
    fn head_and_mid_buffer_until_tail_arrives() {
        let mut merger = UndoMerger::new();
        let xid = Xid::new(2, 2, 2);
        assert!(merger.push(xid, vec![vec![1]], Some(uba(9)), false).is_none());
        assert!(merger.push(xid, vec![vec![2]], None, false).is_none());
        let (fields, got_uba) = merger.push(xid, vec![vec![3]], None, true).unwrap();
        assert_eq!(fields, vec![vec![1], vec![2], vec![3]]);
        assert_eq!(got_uba, Some(uba(9)));
        assert_eq!(merger.pending_count(), 0);
    }
}
