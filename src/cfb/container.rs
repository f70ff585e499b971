//! Sector-chain resolution and stream reconstruction for a parsed CFB buffer.

use crate::cfb::directory::{resolve_paths, DirEntry, EntryType, DIR_ENTRY_LEN};
use crate::cfb::header::{
    read_u32, Header, DIFSECT, ENDOFCHAIN, FATSECT, FREESECT, HEADER_DIFAT_SLOTS, MAXREGSECT,
};
use crate::error::{Error, Result};

/// Upper bound for up-front allocation; declared sizes are untrusted.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// One reconstructed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub name: String,
    pub path: String,
    pub data: Vec<u8>,
}

/// A Compound File Binary container parsed over a borrowed buffer.
#[derive(Debug)]
pub struct CompoundFile<'a> {
    data: &'a [u8],
    header: Header,
    num_sectors: usize,
    fat: Vec<u32>,
    mini_fat: Vec<u32>,
    mini_stream: Vec<u8>,
    entries: Vec<DirEntry>,
    order: Vec<usize>,
}

/// Walks an allocation table from `next`, refusing out-of-range and revisited indices.
///
/// The visited bitmap is allocated on the first step, so an unread chain costs nothing.
struct Chain<'t> {
    table: &'t [u32],
    next: u32,
    limit: usize,
    visited: Vec<bool>,
    what: &'static str,
}

impl<'t> Chain<'t> {
    fn new(table: &'t [u32], start: u32, limit: usize, what: &'static str) -> Self {
        Self {
            table,
            next: start,
            limit: limit.min(table.len()),
            visited: Vec::new(),
            what,
        }
    }
}

/// Description of a special sector id found where a chain link was expected.
fn special_sector(id: u32) -> &'static str {
    match id {
        ENDOFCHAIN => "the end of the chain",
        FREESECT => "a free sector",
        FATSECT => "a FAT sector marker",
        DIFSECT => "a DIFAT sector marker",
        _ => "a reserved sector id",
    }
}

impl Iterator for Chain<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next;
        if cur == ENDOFCHAIN {
            return None;
        }
        self.next = ENDOFCHAIN;
        if cur > MAXREGSECT {
            return Some(Err(Error::malformed(format!(
                "{} chain runs into {}",
                self.what,
                special_sector(cur)
            ))));
        }
        let idx = cur as usize;
        if idx >= self.limit {
            return Some(Err(Error::malformed(format!(
                "{} chain references sector {cur:#x} beyond {} sectors",
                self.what, self.limit
            ))));
        }
        if self.visited.is_empty() {
            self.visited = vec![false; self.limit];
        }
        if std::mem::replace(&mut self.visited[idx], true) {
            return Some(Err(Error::malformed(format!(
                "{} chain loops back to sector {cur}",
                self.what
            ))));
        }
        self.next = self.table[idx];
        Some(Ok(cur))
    }
}

impl<'a> CompoundFile<'a> {
    /// Parse header, FAT, directory and mini stream. Streams are read on demand.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        let sector_size = header.sector_size();
        if data.len() < sector_size {
            return Err(Error::malformed("buffer ends inside the header sector"));
        }
        let num_sectors = (data.len() - sector_size).div_ceil(sector_size);

        let mut cf = Self {
            data,
            header,
            num_sectors,
            fat: Vec::new(),
            mini_fat: Vec::new(),
            mini_stream: Vec::new(),
            entries: Vec::new(),
            order: Vec::new(),
        };
        cf.fat = cf.load_fat()?;
        cf.entries = cf.load_directory()?;
        match cf.entries.first() {
            Some(root) if root.entry_type == EntryType::Root => {}
            _ => return Err(Error::malformed("root directory entry missing")),
        }
        cf.order = resolve_paths(&mut cf.entries)?;
        cf.mini_fat = cf.load_mini_fat()?;
        let (root_start, root_size) = (cf.entries[0].start_sector, cf.entries[0].size);
        cf.mini_stream = cf.read_regular(root_start, root_size)?;
        log::debug!(
            "CFB v{}: {} sectors, {} FAT entries, {} directory entries, mini stream {} bytes",
            cf.header.major_version,
            cf.num_sectors,
            cf.fat.len(),
            cf.entries.len(),
            cf.mini_stream.len()
        );
        Ok(cf)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The root storage entry.
    pub fn root(&self) -> &DirEntry {
        &self.entries[0]
    }

    /// All allocated entries except the root, storages before their contents.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> + '_ {
        self.order.iter().map(move |&i| &self.entries[i])
    }

    /// Reconstruct the full contents of a stream entry.
    pub fn read_stream(&self, entry: &DirEntry) -> Result<Vec<u8>> {
        if !entry.is_stream() {
            return Err(Error::malformed(format!("entry {:?} is not a stream", entry.name)));
        }
        if entry.size < u64::from(self.header.mini_stream_cutoff) {
            self.read_mini(entry.start_sector, entry.size)
        } else {
            self.read_regular(entry.start_sector, entry.size)
        }
    }

    /// Every stream entry with its contents, in directory walk order.
    pub fn streams(&self) -> impl Iterator<Item = Result<Stream>> + '_ {
        self.entries().filter(|e| e.is_stream()).map(move |e| -> Result<Stream> {
            Ok(Stream {
                name: e.name.clone(),
                path: e.path.clone(),
                data: self.read_stream(e)?,
            })
        })
    }

    fn sector(&self, id: u32) -> Result<&'a [u8]> {
        let sector_size = self.header.sector_size();
        let idx = id as usize;
        if id > MAXREGSECT || idx >= self.num_sectors {
            return Err(Error::malformed(format!(
                "sector {id:#x} outside the {} sectors present",
                self.num_sectors
            )));
        }
        let start = (idx + 1) * sector_size;
        let end = (start + sector_size).min(self.data.len());
        Ok(&self.data[start..end])
    }

    fn full_sector(&self, id: u32) -> Result<&'a [u8]> {
        let s = self.sector(id)?;
        if s.len() != self.header.sector_size() {
            return Err(Error::malformed(format!("sector {id} is truncated")));
        }
        Ok(s)
    }

    fn fat_sector_ids(&self) -> Result<Vec<u32>> {
        let wanted = self.header.num_fat_sectors as usize;
        if wanted > self.num_sectors {
            return Err(Error::malformed(format!(
                "{wanted} FAT sectors declared but only {} present",
                self.num_sectors
            )));
        }
        let mut ids: Vec<u32> = self
            .header
            .difat
            .iter()
            .copied()
            .take(wanted.min(HEADER_DIFAT_SLOTS))
            .collect();

        let per_sector = self.header.sector_size() / 4 - 1;
        let mut visited = vec![false; self.num_sectors];
        let mut cur = self.header.first_difat_sector;
        while ids.len() < wanted {
            if cur > MAXREGSECT {
                return Err(Error::malformed(format!(
                    "DIFAT lists {} of {wanted} FAT sectors, then {}",
                    ids.len(),
                    special_sector(cur)
                )));
            }
            let idx = cur as usize;
            if idx >= visited.len() || std::mem::replace(&mut visited[idx], true) {
                return Err(Error::malformed(format!("bad DIFAT sector {cur:#x}")));
            }
            let sector = self.full_sector(cur)?;
            let missing = wanted - ids.len();
            ids.extend((0..per_sector).map(|i| read_u32(sector, i * 4)).take(missing));
            cur = read_u32(sector, per_sector * 4);
        }
        Ok(ids)
    }

    fn load_fat(&self) -> Result<Vec<u32>> {
        let ids = self.fat_sector_ids()?;
        let per_sector = self.header.sector_size() / 4;
        let mut fat = Vec::with_capacity(ids.len() * per_sector);
        for id in ids {
            let sector = self.full_sector(id)?;
            fat.extend((0..per_sector).map(|i| read_u32(sector, i * 4)));
        }
        Ok(fat)
    }

    fn load_directory(&self) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let start = self.header.first_dir_sector;
        let chain = Chain::new(&self.fat, start, self.num_sectors, "directory");
        for id in chain {
            let sector = self.full_sector(id?)?;
            for raw in sector.chunks_exact(DIR_ENTRY_LEN) {
                let stream_id = entries.len() as u32;
                entries.push(DirEntry::parse(stream_id, raw, self.header.major_version));
            }
        }
        Ok(entries)
    }

    fn load_mini_fat(&self) -> Result<Vec<u32>> {
        let per_sector = self.header.sector_size() / 4;
        let mut mini_fat = Vec::new();
        let start = self.header.first_mini_fat_sector;
        let chain = Chain::new(&self.fat, start, self.num_sectors, "mini FAT");
        for id in chain.take(self.header.num_mini_fat_sectors as usize) {
            let sector = self.full_sector(id?)?;
            mini_fat.extend((0..per_sector).map(|i| read_u32(sector, i * 4)));
        }
        Ok(mini_fat)
    }

    fn read_regular(&self, start: u32, size: u64) -> Result<Vec<u8>> {
        let chain = Chain::new(&self.fat, start, self.num_sectors, "FAT");
        collect_chain(chain, size, self.header.sector_size(), |id| self.sector(id))
    }

    fn read_mini(&self, start: u32, size: u64) -> Result<Vec<u8>> {
        let mini_size = self.header.mini_sector_size();
        let limit = self.mini_stream.len().div_ceil(mini_size);
        let chain = Chain::new(&self.mini_fat, start, limit, "mini FAT");
        collect_chain(chain, size, mini_size, |id| {
            let start = id as usize * mini_size;
            let end = (start + mini_size).min(self.mini_stream.len());
            Ok(&self.mini_stream[start..end])
        })
    }
}

/// Concatenate chain units until `size` bytes are gathered; the last unit is truncated.
fn collect_chain<'s, F>(
    mut chain: Chain<'_>,
    size: u64,
    unit: usize,
    mut fetch: F,
) -> Result<Vec<u8>>
where
    F: FnMut(u32) -> Result<&'s [u8]>,
{
    let size = usize::try_from(size)
        .map_err(|_| Error::malformed(format!("stream size {size} does not fit in memory")))?;
    let mut out = Vec::with_capacity(size.min(MAX_PREALLOC));
    while out.len() < size {
        let id = match chain.next() {
            Some(id) => id?,
            None => {
                return Err(Error::malformed(format!(
                    "{} chain ends after {} of {size} bytes",
                    chain.what,
                    out.len()
                )))
            }
        };
        let unit_data = fetch(id)?;
        let take = (size - out.len()).min(unit);
        if unit_data.len() < take {
            return Err(Error::malformed(format!(
                "{} sector {id} truncated: {} of {take} bytes",
                chain.what,
                unit_data.len()
            )));
        }
        out.extend_from_slice(&unit_data[..take]);
    }
    Ok(out)
}

/// Parse `data` as a CFB container and reconstruct every stream in it.
pub fn extract_streams(data: &[u8]) -> Result<Vec<Stream>> {
    CompoundFile::parse(data)?.streams().collect()
}
