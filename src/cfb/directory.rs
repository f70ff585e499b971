//! Directory entries and the storage tree they form.

use crate::cfb::header::{read_u16, read_u32, read_u64};
use crate::error::{Error, Result};

pub(crate) const DIR_ENTRY_LEN: usize = 128;

/// Sibling/child pointer meaning "no entry".
pub(crate) const NOSTREAM: u32 = 0xFFFFFFFF;

/// Deepest storage nesting accepted while resolving paths.
pub const MAX_STORAGE_DEPTH: usize = 32;

/// Directory entry object type (MS-CFB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EntryType {
    Empty,
    Storage,
    Stream,
    Root,
}

/// One directory entry, with its storage path resolved.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DirEntry {
    /// Stream id (index into the directory).
    pub id: u32,
    pub name: String,
    /// `/`-joined path from the root storage, e.g. `VBA/ThisDocument`.
    pub path: String,
    pub entry_type: EntryType,
    pub start_sector: u32,
    pub size: u64,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) left: u32,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) right: u32,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) child: u32,
}

impl DirEntry {
    pub(crate) fn parse(id: u32, raw: &[u8], major_version: u16) -> Self {
        let name_len = read_u16(raw, 64) as usize;
        let entry_type = match raw[66] {
            1 => EntryType::Storage,
            2 => EntryType::Stream,
            5 => EntryType::Root,
            _ => EntryType::Empty,
        };
        let mut size = read_u64(raw, 120);
        if major_version == 3 {
            // Version 3 writers may leave garbage in the high dword.
            size &= 0xFFFF_FFFF;
        }
        let name = decode_utf16le_name(&raw[..64], name_len.min(64));
        Self {
            id,
            path: name.clone(),
            name,
            entry_type,
            start_sector: read_u32(raw, 116),
            size,
            left: read_u32(raw, 68),
            right: read_u32(raw, 72),
            child: read_u32(raw, 76),
        }
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        self.entry_type == EntryType::Stream
    }

    #[inline]
    pub fn is_storage(&self) -> bool {
        matches!(self.entry_type, EntryType::Storage | EntryType::Root)
    }
}

fn decode_utf16le_name(b: &[u8], len: usize) -> String {
    let units = b[..len]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0);
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Pending walk work; `usize` is the nesting depth of the entries it covers.
enum Step {
    Tree(u32, String, usize),
    Emit(u32, String, usize),
}

/// Walk the red-black sibling trees from the root, assigning each reachable entry its path.
///
/// Returns entry indices in walk order: each storage is followed by its descendants, siblings
/// in tree (name) order. Allocated entries unreachable from the root are appended afterwards.
/// Storages nested deeper than [`MAX_STORAGE_DEPTH`] make the container malformed.
pub(crate) fn resolve_paths(entries: &mut [DirEntry]) -> Result<Vec<usize>> {
    let mut visited = vec![false; entries.len()];
    let mut order = Vec::with_capacity(entries.len());
    visited[0] = true;

    let mut stack = vec![Step::Tree(entries[0].child, String::new(), 1)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Tree(id, parent, depth) => {
                if id == NOSTREAM {
                    continue;
                }
                let idx = id as usize;
                if idx >= entries.len() {
                    return Err(Error::malformed(format!(
                        "directory tree references entry {id} of {}",
                        entries.len()
                    )));
                }
                if std::mem::replace(&mut visited[idx], true) {
                    return Err(Error::malformed(format!("directory tree revisits entry {id}")));
                }
                let (left, right) = (entries[idx].left, entries[idx].right);
                stack.push(Step::Tree(right, parent.clone(), depth));
                stack.push(Step::Emit(id, parent.clone(), depth));
                stack.push(Step::Tree(left, parent, depth));
            }
            Step::Emit(id, parent, depth) => {
                let entry = &mut entries[id as usize];
                if !parent.is_empty() {
                    entry.path = format!("{parent}/{}", entry.name);
                }
                order.push(id as usize);
                if entry.entry_type == EntryType::Storage && entry.child != NOSTREAM {
                    if depth > MAX_STORAGE_DEPTH {
                        return Err(Error::malformed(format!(
                            "storage {:?} nests deeper than {MAX_STORAGE_DEPTH} levels",
                            entry.name
                        )));
                    }
                    stack.push(Step::Tree(entry.child, entry.path.clone(), depth + 1));
                }
            }
        }
    }

    for (idx, entry) in entries.iter().enumerate() {
        if !visited[idx] && entry.entry_type != EntryType::Empty {
            log::debug!("orphaned directory entry {idx} ({})", entry.name);
            order.push(idx);
        }
    }
    Ok(order)
}
