//! Transaction Buffer: groups changes by `Xid` between a 5.2 begin and
//! its matching 5.4 commit/rollback, and reverses individual changes when
//! a 5.6 partial rollback names the undo record that produced them.

use std::collections::HashMap;

use tracing::warn;

use crate::change::Change;
use crate::error::{self, EngineError, Result};
use crate::opcodes::undo::UndoBlockAddress;
use crate::scn::Scn;
use crate::xid::Xid;

/// The undo back-pointer a row change's `ktbRedo` names: which undo
/// record (block address, sequence, record index) backs this change.
/// A 5.6 partial rollback names the same triple for the record it is
/// unwinding, letting the buffer drop exactly the matching change rather
/// than the whole transaction.
pub type RollbackKey = (u32, u16, u8);

pub fn rollback_key(uba: &UndoBlockAddress) -> RollbackKey {
    (uba.dba, uba.seq, uba.rec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    RolledBack,
}

pub struct Transaction {
    pub xid: Xid,
    pub first_scn: Scn,
    pub commit_scn: Scn,
    pub thread: u16,
    pub begin_sequence: u32,
    pub begin_ts: u32,
    pub attributes: HashMap<String, String>,
    pub state: TxnState,
    pub seen_begin: bool,
    changes: Vec<(Option<RollbackKey>, Change)>,
}

impl Transaction {
    fn new(xid: Xid, first_scn: Scn, thread: u16, begin_sequence: u32, begin_ts: u32) -> Self {
        Self {
            xid,
            first_scn,
            commit_scn: Scn::none(),
            thread,
            begin_sequence,
            begin_ts,
            attributes: HashMap::new(),
            state: TxnState::Active,
            seen_begin: false,
            changes: Vec::new(),
        }
    }

    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The full record of one transaction's lifetime, bundled together at
/// commit/rollback time so the Emitter facade can describe a transaction's
/// begin and end in a single call (§ 6's `process_begin` carries both the
/// begin- and commit-side metadata at once).
pub struct EndedTransaction {
    pub xid: Xid,
    pub thread: u16,
    pub begin_sequence: u32,
    pub begin_scn: Scn,
    pub begin_ts: u32,
    pub commit_sequence: u32,
    pub commit_scn: Scn,
    pub commit_ts: u32,
    pub attributes: HashMap<String, String>,
    pub changes: Vec<Change>,
}

impl EndedTransaction {
    /// The zeroed placeholder returned for a rollback, or for a
    /// commit/rollback whose transaction was never buffered at all -
    /// neither case has any changes to emit or metadata worth reporting.
    pub fn empty(xid: Xid) -> Self {
        Self {
            xid,
            thread: 0,
            begin_sequence: 0,
            begin_scn: Scn::none(),
            begin_ts: 0,
            commit_sequence: 0,
            commit_scn: Scn::none(),
            commit_ts: 0,
            attributes: HashMap::new(),
            changes: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct TransactionBuffer {
    active: HashMap<Xid, Transaction>,
}

impl TransactionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_insert(&mut self, xid: Xid, scn: Scn) -> &mut Transaction {
        self.active
            .entry(xid)
            .or_insert_with(|| Transaction::new(xid, scn, 0, 0, 0))
    }

    pub fn begin(&mut self, xid: Xid, scn: Scn, thread: u16, sequence: u32, timestamp: u32) {
        let txn = self
            .active
            .entry(xid)
            .or_insert_with(|| Transaction::new(xid, scn, thread, sequence, timestamp));
        txn.seen_begin = true;
        txn.thread = thread;
        txn.begin_sequence = sequence;
        txn.begin_ts = timestamp;
    }

    /// Record a row change, keyed by the undo record that backs it (when
    /// known) so a later partial rollback can find and drop it.
    pub fn push_change(&mut self, xid: Xid, scn: Scn, key: Option<RollbackKey>, change: Change) {
        let txn = self.get_or_insert(xid, scn);
        txn.changes.push((key, change));
    }

    /// Drop the change whose undo back-pointer matches `key`. Per § 4.6,
    /// a rollback marker with no matching entry is a recoverable pairing
    /// warning, not fatal - the transaction keeps going.
    pub fn partial_rollback(&mut self, xid: Xid, key: RollbackKey) -> Result<()> {
        let txn = self
            .active
            .get_mut(&xid)
            .ok_or_else(|| EngineError::pairing(error::E_ROLLBACK_NO_MATCH, format!("no active transaction {}", xid)))?;

        let before = txn.changes.len();
        txn.changes.retain(|(k, _)| *k != Some(key));
        if txn.changes.len() == before {
            return Err(EngineError::pairing(
                error::E_ROLLBACK_NO_MATCH,
                format!("rollback marker {:?} matched no buffered change for {}", key, xid),
            ));
        }
        Ok(())
    }

    /// Finalize a transaction on commit or full rollback, returning the
    /// bundled begin/commit metadata and changes (empty on rollback -
    /// nothing is emitted). A commit for a transaction whose begin was
    /// never observed is allowed only when `allow_incomplete` is set
    /// (tailing mid-stream); otherwise it's a dropped-with-warning
    /// condition rather than fatal.
    pub fn end(
        &mut self,
        xid: Xid,
        commit_scn: Scn,
        commit_sequence: u32,
        commit_ts: u32,
        committed: bool,
        allow_incomplete: bool,
    ) -> Result<EndedTransaction> {
        let txn = match self.active.remove(&xid) {
            Some(t) => t,
            None => {
                if allow_incomplete {
                    return Ok(EndedTransaction::empty(xid));
                }
                warn!(%xid, "commit/rollback for transaction never seen beginning");
                return Ok(EndedTransaction::empty(xid));
            }
        };

        if !committed {
            return Ok(EndedTransaction::empty(xid));
        }

        if !txn.seen_begin && !allow_incomplete {
            warn!(%xid, "dropping transaction committed without an observed begin");
            return Ok(EndedTransaction::empty(xid));
        }

        Ok(EndedTransaction {
            xid,
            thread: txn.thread,
            begin_sequence: txn.begin_sequence,
            begin_scn: txn.first_scn,
            begin_ts: txn.begin_ts,
            commit_sequence,
            commit_scn,
            commit_ts,
            attributes: txn.attributes,
            changes: txn.changes.into_iter().map(|(_, c)| c).collect(),
        })
    }

    pub fn get(&self, xid: Xid) -> Option<&Transaction> {
        self.active.get(&xid)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// The still-open transaction with the lowest first-seen SCN, if any -
    /// what the Checkpoint Coordinator watermarks `min_active_xid` against.
    pub fn oldest_active(&self) -> Option<(Xid, Scn)> {
        self.active.values().map(|t| (t.xid, t.first_scn)).min_by_key(|(_, scn)| *scn)
    }

    /// Every still-open transaction's first-seen SCN, lowest first - what
    /// the Checkpoint Coordinator watermarks against.
    pub fn oldest_active_scn(&self) -> Option<Scn> {
        self.oldest_active().map(|(_, scn)| scn)
    }
}
