//! Character-set transcoding for LOB values. Resolves `DESIGN.md`'s
//! "character-set table" open question: rather than pull in an ICU-scale
//! dependency for Oracle's full legacy charset list, expose a small trait
//! with the common encodings implemented directly and an explicit
//! extension point for anything else.

use crate::error::{EngineError, Result};

/// Decodes a byte slice tagged with an Oracle character-set id into a
/// Rust `String`. `feed` is called once per LOB chunk so a decoder can
/// carry state (e.g. a UTF-16 surrogate half) across chunk boundaries;
/// `finish` flushes whatever is left once the value is complete.
pub trait CharsetDecoder: Send {
    fn feed(&mut self, bytes: &[u8]) -> Result<String>;
    fn finish(&mut self) -> Result<String>;
}

pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self { carry: Vec::new() }
    }
}

impl CharsetDecoder for Utf8Decoder {
    fn feed(&mut self, bytes: &[u8]) -> Result<String> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(bytes);
        match std::str::from_utf8(&buf) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                let (good, rest) = buf.split_at(valid_up_to);
                self.carry = rest.to_vec();
                Ok(std::str::from_utf8(good).unwrap().to_string())
            }
        }
    }

    fn finish(&mut self) -> Result<String> {
        if self.carry.is_empty() {
            Ok(String::new())
        } else {
            Err(EngineError::lob(
                crate::error::E_LOB_INCOMPLETE,
                "LOB value ended mid UTF-8 sequence",
            ))
        }
    }
}

/// ISO-8859-1: every byte maps directly to the codepoint of the same
/// value, so this can never fail or need carry state.
pub struct Latin1Decoder;

impl CharsetDecoder for Latin1Decoder {
    fn feed(&mut self, bytes: &[u8]) -> Result<String> {
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    fn finish(&mut self) -> Result<String> {
        Ok(String::new())
    }
}

/// Oracle character-set id, as stored in `NLS_CHARACTERSET`-equivalent
/// dictionary metadata (e.g. 1 = US7ASCII, 178 = AL32UTF8).
pub fn decoder_for_charset_id(id: u16) -> Result<Box<dyn CharsetDecoder>> {
    match id {
        1 | 178 | 2000 => Ok(Box::new(Utf8Decoder::new())),
        31 | 46 => Ok(Box::new(Latin1Decoder)),
        other => Err(EngineError::lob(
            crate::error::E_LOB_INCOMPLETE,
            format!("unmapped character set id {other}; extend decoder_for_charset_id"),
        )),
    }
}
