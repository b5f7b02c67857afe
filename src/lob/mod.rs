//! LOB Reassembly Engine: turns per-page LOB redo vectors into complete
//! values, and transcodes character LOBs via `charset`.

pub mod charset;
pub mod reassembly;

pub use reassembly::{LobData, LobKey, LobReassembler, LOB_PAGE_SIZE};
