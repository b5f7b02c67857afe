//! Engine configuration. Mirrors the teacher's `Config`/`DatabaseConfig`
//! struct-with-`Default` pattern (`src/lib.rs`, `src/main.rs`): one plain
//! struct, one `Default` impl, loaded from a TOML file when present and
//! falling back to defaults otherwise.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpRedoLog {
    Off,
    Summary,
    Full,
}

impl DumpRedoLog {
    pub fn level(self) -> u8 {
        match self {
            DumpRedoLog::Off => 0,
            DumpRedoLog::Summary => 1,
            DumpRedoLog::Full => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineFlags {
    /// Swallow non-fatal decode errors and keep parsing the next vector.
    pub on_error_continue: bool,
    /// Emit rows even when the owning table is unknown to the dictionary.
    pub schemaless: bool,
    /// Include opcode 24.1 (DDL) changes in the emitted stream.
    pub track_ddl: bool,
    /// Emit transactions that were never observed to begin (no 5.2 seen,
    /// e.g. because the tail started mid-transaction).
    pub show_incomplete_transactions: bool,
}

impl Default for EngineFlags {
    fn default() -> Self {
        Self {
            on_error_continue: true,
            schemaless: false,
            track_ddl: true,
            show_incomplete_transactions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory to scan for redo log files.
    pub redo_dir: PathBuf,
    /// Path to the persisted checkpoint-state document.
    pub checkpoint_file: PathBuf,
    /// Minimum transaction-chunk pool size, in megabytes.
    pub memory_min_mb: usize,
    /// Maximum transaction-chunk pool size, in megabytes. Exhaustion is a
    /// fatal `ResourceExhausted` error.
    pub memory_max_mb: usize,
    /// Maximum chunks retained in the write buffer before a forced flush.
    pub memory_chunks_write_buffer_max: usize,
    /// Bytes threshold before a forced flush of pending output.
    pub flush_buffer: usize,
    /// Split a long transaction's emission at this cumulative size.
    pub max_message_mb: usize,
    pub flags: EngineFlags,
    pub dump_redo_log: DumpRedoLog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redo_dir: PathBuf::from("./redo"),
            checkpoint_file: PathBuf::from("./checkpoint.json"),
            memory_min_mb: 32,
            memory_max_mb: 512,
            memory_chunks_write_buffer_max: 4096,
            flush_buffer: 4 * 1024 * 1024,
            max_message_mb: 32,
            flags: EngineFlags::default(),
            dump_redo_log: DumpRedoLog::Off,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, falling back to `Default::default()` when the
    /// file does not exist. Matches `main.rs`'s `rustydb.toml` convention,
    /// but actually parses it rather than only naming the path.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))
    }
}
