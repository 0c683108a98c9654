//! Ring-closure bookkeeping: tree paths between ring-closing vertices, the block-level chains
//! they describe, and the archive remembering which chains could be closed.

pub mod archive;
pub mod chain;
pub mod path;

pub use archive::{
    ArchiveError, Closability, ClosingConformations, ConformationStore, DirectoryStore, RecordId,
    RingClosuresArchive,
};
pub use chain::{ChainLink, ChainParseError, ClosableChain};
pub use path::PathSubGraph;
