//! Compound File Binary ("OLE file") parsing.
//!
//! Reconstructs every stream of a CFB container, including those stored in the mini stream.
//! Every sector reference is bounds-checked and every chain is walked with a visited set, so
//! hostile containers fail with [`Error::MalformedContainer`](crate::Error::MalformedContainer)
//! instead of looping or panicking. See [MS-CFB].

mod container;
mod directory;
mod header;

pub use container::{extract_streams, CompoundFile, Stream};
pub use directory::{DirEntry, EntryType, MAX_STORAGE_DEPTH};
pub use header::{is_cfb, Header, OLE_SIGNATURE};
