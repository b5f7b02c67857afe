//! Byte Reader: supplies validated redo blocks in order, re-reading on
//! block-header mismatch. This is the leaf of the pipeline - everything
//! above it only ever sees blocks that passed framing validation.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::format::{BlockHeader, BLOCK_HEADER_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockResult {
    Ok,
    EmptyBlock,
    WrongSequence,
    WrongSequenceSwitched,
    Overwritten,
}

/// One open redo file, read block by block. File handles are scoped to a
/// single log file; the caller closes the previous handle on sequence
/// advance by dropping the old `ByteReader`.
pub struct ByteReader {
    path: PathBuf,
    file: File,
    block_size: usize,
    current_sequence: u32,
}

impl ByteReader {
    pub fn open(path: &Path, block_size: usize, current_sequence: u32) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            block_size,
            current_sequence,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate block `block_index`, returning both the raw bytes
    /// (including header) and a classification of what happened.
    pub fn read_block(&mut self, block_index: u32) -> std::io::Result<(Vec<u8>, BlockResult)> {
        let mut buf = vec![0u8; self.block_size];
        let offset = block_index as u64 * self.block_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut read_total = 0usize;
        while read_total < buf.len() {
            match self.file.read(&mut buf[read_total..]) {
                Ok(0) => break,
                Ok(n) => read_total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if read_total < buf.len() {
            // Short read: block not yet written by LGWR (tailing an online
            // log). Treat as empty, the caller will retry later.
            return Ok((buf, BlockResult::EmptyBlock));
        }

        if buf[0] == 0 && buf[1] == 0 {
            return Ok((buf, BlockResult::EmptyBlock));
        }

        let header = match BlockHeader::parse(&buf[..BLOCK_HEADER_LEN.min(buf.len())]) {
            Ok(h) => h,
            Err(_) => return Ok((buf, BlockResult::Overwritten)),
        };

        if header.block_number != block_index {
            warn!(
                expected = block_index,
                found = header.block_number,
                "block number mismatch, treating as overwritten"
            );
            return Ok((buf, BlockResult::Overwritten));
        }

        if header.sequence != self.current_sequence {
            if header.sequence == self.current_sequence + 1 {
                return Ok((buf, BlockResult::WrongSequenceSwitched));
            }
            return Ok((buf, BlockResult::WrongSequence));
        }

        Ok((buf, BlockResult::Ok))
    }

    /// Re-anchor onto the next sequence after a `WrongSequenceSwitched`
    /// result, so the framer can keep tailing an online log across a log
    /// switch without reopening the reader from scratch.
    pub fn advance_sequence(&mut self, new_sequence: u32) {
        self.current_sequence = new_sequence;
    }
}

/// Detect the block size from a redo file's header (bytes 20-21 of block
/// 0), trying the three supported sizes in ascending order.
pub fn detect_block_size(path: &Path) -> std::io::Result<u16> {
    let mut file = File::open(path)?;
    let mut probe = [0u8; 22];
    file.read_exact(&mut probe)?;
    let candidate = u16::from_le_bytes([probe[20], probe[21]]);
    match candidate {
        512 | 1024 | 4096 => Ok(candidate),
        _ => Ok(512),
    }
}
