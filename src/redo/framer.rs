//! Record Framer: walks blocks in order, reassembles records that span
//! block boundaries, and groups them into LWN (Log Write Number) units.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{self, EngineError, Result};
use crate::metrics::EngineMetrics;
use crate::redo::format::{OracleVersion, BLOCK_HEADER_LEN, REDO_RECORD_MAX_SIZE};
use crate::redo::reader::{BlockResult, ByteReader};
use crate::redo::vector::{RecordBuffer, RecordHeader, VectorSplitter};
use crate::scn::Scn;

fn round4(len: usize) -> usize {
    (len + 3) & !3
}

fn read_u32_le(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Marks the boundary of an LWN group: the SCN and timestamp LGWR stamped
/// on the group, plus how many records it contains.
#[derive(Debug, Clone, Copy)]
pub struct LwnInfo {
    pub scn: Scn,
    pub timestamp: u32,
    pub num_max: u32,
}

pub struct Framer<'a> {
    reader: ByteReader,
    version: OracleVersion,
    /// Index of the next block to read from disk.
    next_block_index: u32,
    /// Body (header stripped) of the block currently being walked.
    block_body: Vec<u8>,
    /// Position within `block_body` not yet consumed.
    cursor: usize,
    /// Bytes of the record currently being assembled, not yet complete.
    partial: Vec<u8>,
    record_left_to_copy: usize,
    current_lwn: Option<LwnInfo>,
    metrics: &'a EngineMetrics,
}

impl<'a> Framer<'a> {
    pub fn new(
        path: &Path,
        block_size: usize,
        start_sequence: u32,
        start_block: u32,
        version: OracleVersion,
        metrics: &'a EngineMetrics,
    ) -> std::io::Result<Self> {
        Ok(Self {
            reader: ByteReader::open(path, block_size, start_sequence)?,
            version,
            // Blocks 0-1 are always the file header; a checkpoint resuming
            // mid-file never names anything below block 2.
            next_block_index: start_block.max(2),
            block_body: Vec::new(),
            cursor: 0,
            partial: Vec::new(),
            record_left_to_copy: 0,
            current_lwn: None,
            metrics,
        })
    }

    pub fn current_lwn(&self) -> Option<LwnInfo> {
        self.current_lwn
    }

    /// Index of the next block this framer will read - what a checkpoint
    /// flush should persist so a restart can resume from here.
    pub fn current_block_index(&self) -> u32 {
        self.next_block_index
    }

    /// Pull the next complete record out of the file, advancing through as
    /// many blocks as needed. Returns `None` when no more data is
    /// currently available (clean EOF, or tailing an online log that
    /// hasn't been written past this point yet).
    pub fn next_record(&mut self) -> Result<Option<(RecordHeader, RecordBuffer)>> {
        loop {
            if self.cursor >= self.block_body.len() {
                let (block, result) = self.reader.read_block(self.next_block_index)?;
                match result {
                    BlockResult::Ok => {
                        EngineMetrics::inc(&self.metrics.blocks_read);
                    }
                    BlockResult::EmptyBlock => return Ok(None),
                    BlockResult::WrongSequence | BlockResult::WrongSequenceSwitched | BlockResult::Overwritten => {
                        return Err(EngineError::framing(
                            error::E_BAD_BLOCK_NUMBER,
                            format!(
                                "block {} failed framing validation: {:?}",
                                self.next_block_index, result
                            ),
                        ));
                    }
                }
                self.next_block_index += 1;
                self.block_body = block[BLOCK_HEADER_LEN..].to_vec();
                self.cursor = 0;
                continue;
            }

            if self.record_left_to_copy > 0 {
                let available = self.block_body.len() - self.cursor;
                let take = self.record_left_to_copy.min(available);
                self.partial
                    .extend_from_slice(&self.block_body[self.cursor..self.cursor + take]);
                self.cursor += take;
                self.record_left_to_copy -= take;

                if self.record_left_to_copy == 0 {
                    return self.finish_record().map(Some);
                }
                continue;
            }

            self.cursor = round4(self.cursor);
            if self.cursor + 4 > self.block_body.len() {
                self.cursor = self.block_body.len();
                continue;
            }

            let declared_len = read_u32_le(&self.block_body, self.cursor) as usize;
            if declared_len == 0 {
                // Padding to the end of the block.
                self.cursor = self.block_body.len();
                continue;
            }
            if declared_len > REDO_RECORD_MAX_SIZE {
                return Err(EngineError::framing(
                    error::E_RECORD_TOO_BIG,
                    format!("record length {} exceeds cap", declared_len),
                ));
            }

            let rounded = round4(declared_len);
            let available = self.block_body.len() - self.cursor - 4;

            if rounded <= available {
                self.partial.clear();
                self.partial
                    .extend_from_slice(&self.block_body[self.cursor + 4..self.cursor + 4 + declared_len]);
                self.cursor += 4 + rounded;
                return self.finish_record().map(Some);
            }

            self.partial.clear();
            self.partial.extend_from_slice(&self.block_body[self.cursor + 4..]);
            self.record_left_to_copy = rounded - available;
            self.cursor = self.block_body.len();
        }
    }

    fn finish_record(&mut self) -> Result<(RecordHeader, RecordBuffer)> {
        let buffer: RecordBuffer = Arc::from(std::mem::take(&mut self.partial).into_boxed_slice());
        let (_splitter, header) = VectorSplitter::new(Arc::clone(&buffer), self.version)?;

        if header.is_lwn_header() {
            debug!(scn = %header.scn, "entering new LWN group");
            self.current_lwn = Some(LwnInfo {
                scn: header.scn,
                timestamp: header.timestamp,
                num_max: 0,
            });
        }

        Ok((header, buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redo::format::BLOCK_MAGIC;

    fn make_file(block_size: usize, blocks: Vec<Vec<u8>>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redo01.log");
        let mut out = Vec::new();
        out.extend(vec![0u8; block_size * 2]); // file header blocks 0-1
        for b in blocks {
            let mut block = vec![0u8; block_size];
            block[0..2].copy_from_slice(&BLOCK_MAGIC);
            let body_len = block_size - BLOCK_HEADER_LEN;
            let copy_len = b.len().min(body_len);
            block[BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + copy_len].copy_from_slice(&b[..copy_len]);
            out.extend(block);
        }
        std::fs::write(&path, out).unwrap();
        dir
    }

    fn record_bytes(vectors_payload: &[u8]) -> Vec<u8> {
        // record header (24B, pre-12.1) + payload, prefixed by 4-byte length
        let mut rec = vec![0u8; 24];
        rec.extend_from_slice(vectors_payload);
        let mut out = (rec.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&rec);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    #[test]
    fn frames_single_record_within_one_block() {
        let block_size = 512usize;
        let payload = vec![0xABu8; 10];
        let rec = record_bytes(&payload);
        let dir = make_file(block_size, vec![rec]);
        let path = dir.path().join("redo01.log");

        let metrics = EngineMetrics::new();
        let mut framer = Framer::new(&path, block_size, 10, 2, OracleVersion::V11_2, &metrics).unwrap();
        // sequence must match block headers (0 here, since we zeroed them);
        // patch the reader's expectation to 0 to match the test fixture.
        framer.reader.advance_sequence(0);

        let (_header, buffer) = framer.next_record().unwrap().unwrap();
        assert_eq!(buffer.len(), 24 + payload.len());
        assert_eq!(metrics.blocks_read.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn record_spanning_two_blocks_reassembles() {
        let block_size = 64usize;
        let body_cap = block_size - BLOCK_HEADER_LEN;
        let payload = vec![0xCDu8; body_cap]; // forces the record to spill into block 2
        let rec = record_bytes(&payload);

        let mut b1 = rec[..body_cap].to_vec();
        let mut b2 = rec[body_cap..].to_vec();
        b1.resize(body_cap, 0);
        b2.resize(body_cap, 0);

        let dir = make_file(block_size, vec![b1, b2]);
        let path = dir.path().join("redo01.log");

        let metrics = EngineMetrics::new();
        let mut framer = Framer::new(&path, block_size, 10, 2, OracleVersion::V11_2, &metrics).unwrap();
        framer.reader.advance_sequence(0);

        let (_header, buffer) = framer.next_record().unwrap().unwrap();
        assert_eq!(buffer.len(), rec.len() - 4);
        assert_eq!(metrics.blocks_read.load(std::sync::atomic::Ordering::Relaxed), 2);
    }
}
