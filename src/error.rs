//! Error taxonomy for the redo decoder and transaction reassembly pipeline.
//!
//! Every variant carries an [`ErrorCode`] drawn from the numeric space the
//! upstream tooling uses (50000-70099) so log lines, metrics, and downstream
//! alerting can group incidents by code regardless of which component raised
//! them.

use std::fmt;

use thiserror::Error;

/// Numeric error code in the 50000-70099 space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u32);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Framing errors: bad magic, bad block number, checksum mismatch beyond
/// retry cap, record too big. Fatal per redo file - the reader advances to
/// the next file.
pub const E_BAD_MAGIC: ErrorCode = ErrorCode(50001);
pub const E_BAD_BLOCK_NUMBER: ErrorCode = ErrorCode(50002);
pub const E_CHECKSUM_MISMATCH: ErrorCode = ErrorCode(50003);
pub const E_WRONG_SEQUENCE: ErrorCode = ErrorCode(50004);
pub const E_RECORD_TOO_BIG: ErrorCode = ErrorCode(50010);

/// Decode errors: short/inconsistent fields. Recoverable when
/// `flags.on-error-continue` is set.
pub const E_FIELD_TOO_SHORT: ErrorCode = ErrorCode(50061);
pub const E_FIELD_COUNT_MISMATCH: ErrorCode = ErrorCode(50062);
pub const E_VECTOR_LENGTH_EXCEEDS_RECORD: ErrorCode = ErrorCode(50063);
pub const E_UNKNOWN_OPCODE: ErrorCode = ErrorCode(50070);

/// Pairing errors: rollback marker with no matching entry, undo/redo bdba
/// mismatch.
pub const E_ROLLBACK_NO_MATCH: ErrorCode = ErrorCode(60001);
pub const E_PAIRING_BDBA_MISMATCH: ErrorCode = ErrorCode(60002);

/// LOB errors: missing page at emit time, size mismatch.
pub const E_LOB_INCOMPLETE: ErrorCode = ErrorCode(60005);
pub const E_LOB_SIZE_MISMATCH: ErrorCode = ErrorCode(60007);

/// Schema errors: unknown object id.
pub const E_SCHEMA_MISSING: ErrorCode = ErrorCode(60010);

/// Resource exhaustion / invariant violations: fatal, forces shutdown.
pub const E_MEMORY_EXHAUSTED: ErrorCode = ErrorCode(70001);
pub const E_INVARIANT_VIOLATION: ErrorCode = ErrorCode(70099);

/// Intra-transaction flush boundary warning (message size exceeds
/// `max_message_mb`).
pub const E_TXN_SPLIT: ErrorCode = ErrorCode(60015);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("[{code}] framing error: {message}")]
    Framing { code: ErrorCode, message: String },

    #[error("[{code}] decode error at offset {offset}: {message}")]
    Decode {
        code: ErrorCode,
        offset: u64,
        message: String,
    },

    #[error("[{code}] pairing warning: {message}")]
    Pairing { code: ErrorCode, message: String },

    #[error("[{code}] lob warning: {message}")]
    Lob { code: ErrorCode, message: String },

    #[error("[{code}] schema missing for object {obj}")]
    SchemaMissing { code: ErrorCode, obj: u32 },

    #[error("[{code}] resource exhausted: {message}")]
    ResourceExhausted { code: ErrorCode, message: String },

    #[error("[{code}] invariant violation: {message}")]
    InvariantViolation { code: ErrorCode, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl EngineError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            EngineError::Framing { code, .. }
            | EngineError::Decode { code, .. }
            | EngineError::Pairing { code, .. }
            | EngineError::Lob { code, .. }
            | EngineError::SchemaMissing { code, .. }
            | EngineError::ResourceExhausted { code, .. }
            | EngineError::InvariantViolation { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// FramingError and ResourceExhausted are fatal: they short-circuit to
    /// the top of the parser loop. Everything else is recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Framing { .. }
                | EngineError::ResourceExhausted { .. }
                | EngineError::InvariantViolation { .. }
        )
    }

    pub fn decode(code: ErrorCode, offset: u64, message: impl Into<String>) -> Self {
        EngineError::Decode {
            code,
            offset,
            message: message.into(),
        }
    }

    pub fn framing(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError::Framing {
            code,
            message: message.into(),
        }
    }

    pub fn pairing(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError::Pairing {
            code,
            message: message.into(),
        }
    }

    pub fn lob(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError::Lob {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
