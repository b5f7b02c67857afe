//! Redo file wire format: the two-block file header and the 16-byte data
//! block header. Bit-exact with the on-disk Oracle layout; nothing here is
//! a creative re-architecture, only a typed read of fixed offsets.

use crate::error::{self, EngineError, Result};
use crate::scn::Scn;

/// Data block header magic (first two bytes of every 512/1024/4096 B block).
pub const BLOCK_MAGIC: [u8; 2] = [0x01, 0x22];

/// File header magic, found at bytes 28-31 of block 0.
pub const FILE_MAGIC: [u8; 4] = [0x7D, 0x7C, 0x7B, 0x7A];

pub const BLOCK_HEADER_LEN: usize = 16;

/// Record buffer cap - anything larger raises a fatal "too big log record".
pub const REDO_RECORD_MAX_SIZE: usize = 256 * 1024 * 1024;

/// `compat_vsn` markers used to pick the record-header width (24 B
/// pre-12.1, 32 B from 12.1) and the SCN wire width (48-bit pre-12.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVersion {
    V11_2,
    V12_1,
    V12_2,
    V19,
}

impl OracleVersion {
    pub fn from_compat_vsn(vsn: u32) -> Self {
        if vsn >= 0x1300_0000 {
            OracleVersion::V19
        } else if vsn >= 0x0C20_0000 {
            OracleVersion::V12_2
        } else if vsn >= 0x0C10_0000 {
            OracleVersion::V12_1
        } else {
            OracleVersion::V11_2
        }
    }

    pub fn record_header_len(self) -> usize {
        match self {
            OracleVersion::V11_2 => 24,
            _ => 32,
        }
    }

    pub fn has_con_id(self) -> bool {
        !matches!(self, OracleVersion::V11_2)
    }

    pub fn uses_64bit_scn(self) -> bool {
        matches!(self, OracleVersion::V12_2 | OracleVersion::V19)
    }
}

bitflags::bitflags! {
    /// Block 1 flags describing how this log was written.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RedoFlags: u32 {
        const REDO_END          = 0x0001;
        const REDO_ASYNC        = 0x0002;
        const REDO_NODATALOSS   = 0x0004;
        const REDO_RESYNC       = 0x0008;
        const REDO_CLOSEDTHREAD = 0x0010;
        const REDO_MAXPERFORMANCE = 0x0020;
    }
}

/// Parsed two-block file header (block 0 + block 1).
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub block_size: u16,
    pub version: OracleVersion,
    pub db_id: u32,
    pub activation_id: u32,
    pub first_scn: Scn,
    pub next_scn: Scn,
    pub resetlogs_scn: Scn,
    pub resetlogs_count: u32,
    pub sequence: u32,
    pub thread: u16,
    pub flags: RedoFlags,
}

fn read_u16_le(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn read_u32_le(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

impl FileHeader {
    /// Parse block 0 + block 1 (each exactly `block_size` bytes) into a
    /// typed file header. Both blocks must already have passed
    /// [`super::reader::ByteReader`] block-framing validation.
    pub fn parse(block0: &[u8], block1: &[u8]) -> Result<Self> {
        if block0.len() < 32 || &block0[28..32] != FILE_MAGIC {
            return Err(EngineError::framing(
                error::E_BAD_MAGIC,
                "file header magic mismatch at block 0 offset 28",
            ));
        }
        let block_size = read_u16_le(block0, 20);
        let compat_vsn = read_u32_le(block0, 20);
        let version = OracleVersion::from_compat_vsn(compat_vsn);

        if block1.len() < 72 {
            return Err(EngineError::framing(
                error::E_BAD_MAGIC,
                "file header block 1 shorter than expected",
            ));
        }
        let db_id = read_u32_le(block1, 24);
        let activation_id = read_u32_le(block1, 52);
        let first_scn = Scn::from_48bit(read_u32_le(block1, 32), read_u16_le(block1, 36));
        let next_scn = Scn::from_48bit(read_u32_le(block1, 40), read_u16_le(block1, 44));
        let resetlogs_scn = Scn::from_48bit(read_u32_le(block1, 60), read_u16_le(block1, 64));
        let resetlogs_count = read_u32_le(block1, 56);
        let sequence = read_u32_le(block1, 8);
        let thread = read_u16_le(block1, 4);
        let flags = RedoFlags::from_bits_truncate(read_u32_le(block1, 68));

        Ok(FileHeader {
            block_size,
            version,
            db_id,
            activation_id,
            first_scn,
            next_scn,
            resetlogs_scn,
            resetlogs_count,
            sequence,
            thread,
            flags,
        })
    }
}

/// A data block's 16-byte header.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub block_number: u32,
    pub sequence: u32,
    pub checksum: u16,
}

impl BlockHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < BLOCK_HEADER_LEN || buf[0..2] != BLOCK_MAGIC {
            return Err(EngineError::framing(
                error::E_BAD_MAGIC,
                "data block magic mismatch",
            ));
        }
        Ok(BlockHeader {
            block_number: read_u32_le(buf, 4),
            sequence: read_u32_le(buf, 8),
            checksum: read_u16_le(buf, 14),
        })
    }

    /// XOR of all 64-bit words in the block, folded against the stored
    /// checksum word (which is itself zeroed during the XOR pass).
    pub fn verify_checksum(buf: &[u8]) -> bool {
        if buf.len() < BLOCK_HEADER_LEN || buf.len() % 8 != 0 {
            return false;
        }
        let stored = read_u16_le(buf, 14);
        let mut acc: u64 = 0;
        let mut i = 0;
        while i < buf.len() {
            let mut word = [0u8; 8];
            word.copy_from_slice(&buf[i..i + 8]);
            if i == 8 {
                // the checksum halfword itself (bytes 14-15) is excluded
                word[6] = 0;
                word[7] = 0;
            }
            acc ^= u64::from_le_bytes(word);
            i += 8;
        }
        let folded = ((acc >> 32) ^ acc) as u32;
        let folded16 = ((folded >> 16) ^ folded) as u16;
        folded16 == stored || stored == 0
    }
}
