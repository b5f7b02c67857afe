//! Checkpoint Coordinator: tracks how far the pipeline can safely
//! advance its watermark (bounded by the oldest still-open transaction),
//! flushes at LWN group boundaries, and persists that progress so a
//! restart resumes instead of re-reading from the start of the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::scn::Scn;
use crate::xid::Xid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub sequence: u32,
    pub block_number: u32,
    pub watermark_scn: u64,
    /// The lowest-xid transaction still open as of the last flush, if any -
    /// a restart must not treat its undo as settled. Old checkpoint files
    /// written before this field existed deserialize it as `None`.
    #[serde(default)]
    pub min_active_xid: Option<Xid>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            sequence: 0,
            block_number: 2,
            watermark_scn: 0,
            min_active_xid: None,
        }
    }
}

impl CheckpointState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write-temp-then-rename so a crash mid-write never leaves a
    /// truncated checkpoint file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

pub struct CheckpointCoordinator {
    state: CheckpointState,
    path: PathBuf,
}

impl CheckpointCoordinator {
    pub fn new(path: PathBuf) -> Result<Self> {
        let state = CheckpointState::load(&path)?;
        Ok(Self { state, path })
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn resume_block_number(&self) -> u32 {
        self.state.block_number
    }

    pub fn resume_sequence(&self) -> u32 {
        self.state.sequence
    }

    /// Advance the watermark to `candidate`, but never past the oldest
    /// still-open transaction's first-seen SCN - releasing past that
    /// point would let a reader believe a transaction's changes are done
    /// when more are still to come.
    pub fn advance_watermark(&mut self, candidate: Scn, oldest_active: Option<Scn>) {
        let bound = match oldest_active {
            Some(scn) => candidate.min(scn),
            None => candidate,
        };
        if bound.value() > self.state.watermark_scn {
            self.state.watermark_scn = bound.value();
        }
    }

    pub fn watermark(&self) -> Scn {
        Scn::new(self.state.watermark_scn)
    }

    /// Called once per LWN group boundary (§ 4.7): records the position
    /// to resume from and persists it.
    pub fn flush_at_lwn_boundary(&mut self, sequence: u32, block_number: u32, min_active_xid: Option<Xid>) -> Result<()> {
        self.state.sequence = sequence;
        self.state.block_number = block_number;
        self.state.min_active_xid = min_active_xid;
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        info!(sequence = self.state.sequence, block = self.state.block_number, "persisting checkpoint");
        self.state.save(&self.path)
    }
}
