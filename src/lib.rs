// redo-tail - Oracle redo log change-data-capture engine
// Core library module

pub mod change;
pub mod checkpoint;
pub mod config;
pub mod dictionary;
pub mod emit;
pub mod error;
pub mod lob;
pub mod metrics;
pub mod opcodes;
pub mod oracle_number;
pub mod pipeline;
pub mod redo;
pub mod scn;
pub mod txn;
pub mod xid;

pub use error::{EngineError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
