//! Redo file wire format and the Byte Reader / Record Framer / Vector
//! Splitter pipeline stages that turn a directory of redo files into a
//! stream of [`vector::ChangeVector`]s.

pub mod format;
pub mod framer;
pub mod reader;
pub mod vector;

pub use format::{FileHeader, OracleVersion};
pub use framer::{Framer, LwnInfo};
pub use vector::{ChangeVector, RecordBuffer, RecordHeader};
