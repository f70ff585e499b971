//! Minimal Compound File writer used to build test containers.

#![allow(dead_code)]

pub const SECTOR: usize = 512;
pub const V4_SECTOR: usize = 4096;
const MINI: usize = 64;
const CUTOFF: usize = 4096;

pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
pub const FREESECT: u32 = 0xFFFF_FFFF;
pub const FATSECT: u32 = 0xFFFF_FFFD;
pub const DIFSECT: u32 = 0xFFFF_FFFC;
const HEADER_DIFAT_SLOTS: usize = 109;
const NOSTREAM: u32 = 0xFFFF_FFFF;

pub const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

struct Node {
    name: String,
    storage: bool,
    data: Vec<u8>,
    parent: usize,
}

/// Builds a CFB buffer; streams below 4096 bytes go to the mini stream.
///
/// Writes version 3 (512-byte sectors) by default, or version 4 (4096-byte sectors) after
/// [`CfbBuilder::version4`]. FAT sector ids past the 109 header slots spill into DIFAT sectors.
pub struct CfbBuilder {
    nodes: Vec<Node>,
    sector: usize,
    min_fat_sectors: usize,
}

impl CfbBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: "Root Entry".to_string(),
                storage: true,
                data: Vec::new(),
                parent: 0,
            }],
            sector: SECTOR,
            min_fat_sectors: 1,
        }
    }

    /// Write a version 4 container with 4096-byte sectors.
    pub fn version4(&mut self) -> &mut Self {
        self.sector = V4_SECTOR;
        self
    }

    /// Allocate at least `n` FAT sectors, padding the table with free entries.
    pub fn fat_sectors(&mut self, n: usize) -> &mut Self {
        self.min_fat_sectors = n.max(1);
        self
    }

    /// Add a stream at a `/`-separated path, creating storages along the way.
    pub fn stream(&mut self, path: &str, data: &[u8]) -> &mut Self {
        let mut parts: Vec<&str> = path.split('/').collect();
        let name = parts.pop().unwrap();
        let mut parent = 0;
        for storage in parts {
            parent = self.storage_in(parent, storage);
        }
        self.nodes.push(Node {
            name: name.to_string(),
            storage: false,
            data: data.to_vec(),
            parent,
        });
        self
    }

    fn storage_in(&mut self, parent: usize, name: &str) -> usize {
        let existing = self
            .nodes
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, n)| n.storage && n.parent == parent && n.name == name);
        if let Some((i, _)) = existing {
            return i;
        }
        self.nodes.push(Node {
            name: name.to_string(),
            storage: true,
            data: Vec::new(),
            parent,
        });
        self.nodes.len() - 1
    }

    pub fn build(&self) -> Vec<u8> {
        let ss = self.sector;
        let per_sector = ss / 4;
        let mut sectors: Vec<Vec<u8>> = Vec::new();
        let mut fat: Vec<u32> = Vec::new();
        let mut mini_stream: Vec<u8> = Vec::new();
        let mut mini_fat: Vec<u32> = Vec::new();
        let mut starts = vec![ENDOFCHAIN; self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            if node.storage || node.data.is_empty() {
                continue;
            }
            if node.data.len() < CUTOFF {
                let start = (mini_stream.len() / MINI) as u32;
                let count = node.data.len().div_ceil(MINI);
                for k in 0..count {
                    let chunk = &node.data[k * MINI..((k + 1) * MINI).min(node.data.len())];
                    mini_stream.extend_from_slice(chunk);
                    mini_stream.resize(mini_stream.len().div_ceil(MINI) * MINI, 0);
                    mini_fat.push(if k + 1 == count { ENDOFCHAIN } else { start + k as u32 + 1 });
                }
                starts[i] = start;
            } else {
                starts[i] = alloc_chain(&mut sectors, &mut fat, &node.data, ss);
            }
        }

        starts[0] = alloc_chain(&mut sectors, &mut fat, &mini_stream, ss);

        let (first_mini_fat, num_mini_fat) = if mini_fat.is_empty() {
            (ENDOFCHAIN, 0)
        } else {
            let mut bytes: Vec<u8> = mini_fat.iter().flat_map(|v| v.to_le_bytes()).collect();
            bytes.resize(bytes.len().div_ceil(ss) * ss, 0xFF);
            let n = bytes.len() / ss;
            (alloc_chain(&mut sectors, &mut fat, &bytes, ss), n as u32)
        };

        let dir = self.directory(&starts, mini_stream.len() as u64);
        let num_dir = dir.len() / ss;
        let first_dir = alloc_chain(&mut sectors, &mut fat, &dir, ss);

        // FAT sectors follow the data; DIFAT sectors follow the FAT.
        let difat_needed = |num_fat: usize| {
            num_fat.saturating_sub(HEADER_DIFAT_SLOTS).div_ceil(per_sector - 1)
        };
        let mut num_fat = self.min_fat_sectors;
        while sectors.len() + num_fat + difat_needed(num_fat) > num_fat * per_sector {
            num_fat += 1;
        }
        let num_difat = difat_needed(num_fat);
        let first_fat = sectors.len() as u32;
        let first_difat = first_fat + num_fat as u32;
        fat.extend(std::iter::repeat(FATSECT).take(num_fat));
        fat.extend(std::iter::repeat(DIFSECT).take(num_difat));
        fat.resize(num_fat * per_sector, FREESECT);
        let fat_bytes: Vec<u8> = fat.iter().flat_map(|v| v.to_le_bytes()).collect();
        for chunk in fat_bytes.chunks(ss) {
            sectors.push(chunk.to_vec());
        }

        let fat_ids: Vec<u32> = (0..num_fat as u32).map(|k| first_fat + k).collect();
        let spilled = fat_ids.get(HEADER_DIFAT_SLOTS..).unwrap_or(&[]);
        for (k, ids) in spilled.chunks(per_sector - 1).enumerate() {
            let mut slots = vec![FREESECT; per_sector];
            slots[..ids.len()].copy_from_slice(ids);
            slots[per_sector - 1] = if k + 1 == num_difat {
                ENDOFCHAIN
            } else {
                first_difat + k as u32 + 1
            };
            sectors.push(slots.iter().flat_map(|v| v.to_le_bytes()).collect());
        }

        let mut out = vec![0u8; ss];
        out[0..8].copy_from_slice(&OLE_SIGNATURE);
        out[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        let (version, shift) = if ss == V4_SECTOR { (4u16, 12u16) } else { (3, 9) };
        out[26..28].copy_from_slice(&version.to_le_bytes());
        out[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        out[30..32].copy_from_slice(&shift.to_le_bytes());
        out[32..34].copy_from_slice(&6u16.to_le_bytes());
        if version == 4 {
            out[40..44].copy_from_slice(&(num_dir as u32).to_le_bytes());
        }
        out[44..48].copy_from_slice(&(num_fat as u32).to_le_bytes());
        out[48..52].copy_from_slice(&first_dir.to_le_bytes());
        out[56..60].copy_from_slice(&(CUTOFF as u32).to_le_bytes());
        out[60..64].copy_from_slice(&first_mini_fat.to_le_bytes());
        out[64..68].copy_from_slice(&num_mini_fat.to_le_bytes());
        let difat_start = if num_difat == 0 { ENDOFCHAIN } else { first_difat };
        out[68..72].copy_from_slice(&difat_start.to_le_bytes());
        out[72..76].copy_from_slice(&(num_difat as u32).to_le_bytes());
        for slot in 0..HEADER_DIFAT_SLOTS {
            let v = fat_ids.get(slot).copied().unwrap_or(FREESECT);
            out[76 + slot * 4..80 + slot * 4].copy_from_slice(&v.to_le_bytes());
        }
        for s in sectors {
            out.extend_from_slice(&s);
        }
        out
    }

    fn directory(&self, starts: &[u32], mini_len: u64) -> Vec<u8> {
        let mut child = vec![NOSTREAM; self.nodes.len()];
        let mut right = vec![NOSTREAM; self.nodes.len()];
        let mut last: Vec<Option<usize>> = vec![None; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            match last[node.parent] {
                None => child[node.parent] = i as u32,
                Some(prev) => right[prev] = i as u32,
            }
            last[node.parent] = Some(i);
        }

        let mut dir = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let mut e = [0u8; 128];
            let name: Vec<u8> = node.name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
            e[..name.len()].copy_from_slice(&name);
            e[64..66].copy_from_slice(&((name.len() + 2) as u16).to_le_bytes());
            e[66] = match (i, node.storage) {
                (0, _) => 5,
                (_, true) => 1,
                (_, false) => 2,
            };
            e[67] = 1;
            e[68..72].copy_from_slice(&NOSTREAM.to_le_bytes());
            e[72..76].copy_from_slice(&right[i].to_le_bytes());
            e[76..80].copy_from_slice(&child[i].to_le_bytes());
            e[116..120].copy_from_slice(&starts[i].to_le_bytes());
            let size = if i == 0 { mini_len } else { node.data.len() as u64 };
            e[120..128].copy_from_slice(&size.to_le_bytes());
            dir.extend_from_slice(&e);
        }
        while dir.len() % self.sector != 0 {
            let mut e = [0u8; 128];
            e[68..80].copy_from_slice(&[0xFF; 12]);
            dir.extend_from_slice(&e);
        }
        dir
    }
}

fn alloc_chain(sectors: &mut Vec<Vec<u8>>, fat: &mut Vec<u32>, bytes: &[u8], ss: usize) -> u32 {
    if bytes.is_empty() {
        return ENDOFCHAIN;
    }
    let start = sectors.len() as u32;
    let count = bytes.len().div_ceil(ss);
    for (k, chunk) in bytes.chunks(ss).enumerate() {
        let mut s = chunk.to_vec();
        s.resize(ss, 0);
        sectors.push(s);
        fat.push(if k + 1 == count { ENDOFCHAIN } else { start + k as u32 + 1 });
    }
    start
}

/// Sector size recorded in the header.
pub fn sector_size(buf: &[u8]) -> usize {
    1 << u16::from_le_bytes([buf[30], buf[31]])
}

/// Byte offset of sector `id` in a buffer built by [`CfbBuilder`].
pub fn sector_offset(buf: &[u8], id: u32) -> usize {
    (id as usize + 1) * sector_size(buf)
}

/// First DIFAT sector recorded in the header.
pub fn first_difat_sector(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[68..72].try_into().unwrap())
}

/// Byte offset of FAT entry `sector` in a buffer built by [`CfbBuilder`].
pub fn fat_entry_offset(buf: &[u8], sector: u32) -> usize {
    let first_fat = u32::from_le_bytes(buf[76..80].try_into().unwrap());
    sector_offset(buf, first_fat) + sector as usize * 4
}

/// First directory sector recorded in the header.
pub fn first_dir_sector(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[48..52].try_into().unwrap())
}

/// A small VBA-project-shaped container: root streams plus a `VBA` storage.
pub fn vba_project() -> Vec<u8> {
    let module: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    CfbBuilder::new()
        .stream("PROJECT", b"ID=\"{00000000-0000-0000-0000-000000000000}\"\r\nDocument=ThisDocument/&H00000000\r\n")
        .stream("PROJECTwm", b"ThisDocument\0T\0h\0i\0s\0D\0o\0c\0u\0m\0e\0n\0t\0\0\0\0\0")
        .stream("VBA/_VBA_PROJECT", &[0xCC, 0x61, 0xFF, 0xFF, 0x00, 0x00, 0x00])
        .stream("VBA/dir", &[0x01, 0x16, 0x03, 0x00, 0x00, 0xF0, 0x00])
        .stream("VBA/ThisDocument", &module)
        .build()
}
