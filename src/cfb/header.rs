//! Compound File Binary header ([MS-CFB] 2.2).

use crate::error::{Error, Result};

/// OLE/CFB signature (DOCFILE).
pub const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// The fixed header fields occupy the first 512 bytes; version 4 pads it to a full sector.
pub(crate) const HEADER_LEN: usize = 512;

/// Special sector indices (MS-CFB).
pub(crate) const MAXREGSECT: u32 = 0xFFFFFFFA;
pub(crate) const DIFSECT: u32 = 0xFFFFFFFC;
pub(crate) const FATSECT: u32 = 0xFFFFFFFD;
pub(crate) const ENDOFCHAIN: u32 = 0xFFFFFFFE;
pub(crate) const FREESECT: u32 = 0xFFFFFFFF;

/// DIFAT slots stored directly in the header.
pub(crate) const HEADER_DIFAT_SLOTS: usize = 109;

#[derive(Debug, Clone)]
pub struct Header {
    pub major_version: u16,
    pub sector_shift: u16,
    pub mini_sector_shift: u16,
    pub num_fat_sectors: u32,
    pub first_dir_sector: u32,
    pub mini_stream_cutoff: u32,
    pub first_mini_fat_sector: u32,
    pub num_mini_fat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    /// The 109 DIFAT entries held in the header, unfiltered.
    pub difat: Vec<u32>,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !is_cfb(data) {
            return Err(Error::malformed("missing CFB signature"));
        }
        if data.len() < HEADER_LEN {
            return Err(Error::malformed(format!(
                "buffer of {} bytes is shorter than the {HEADER_LEN}-byte header",
                data.len()
            )));
        }

        let major_version = read_u16(data, 26);
        let byte_order = read_u16(data, 28);
        if byte_order != 0xFFFE {
            return Err(Error::malformed(format!("unexpected byte order mark {byte_order:#06x}")));
        }

        let sector_shift = read_u16(data, 30);
        match (major_version, sector_shift) {
            (3, 9) | (4, 12) => {}
            _ => {
                return Err(Error::malformed(format!(
                    "version {major_version} with sector shift {sector_shift}"
                )))
            }
        }
        let mini_sector_shift = read_u16(data, 32);
        if mini_sector_shift != 6 {
            return Err(Error::malformed(format!("mini sector shift {mini_sector_shift}")));
        }

        let difat = (0..HEADER_DIFAT_SLOTS)
            .map(|i| read_u32(data, 76 + i * 4))
            .collect();

        Ok(Self {
            major_version,
            sector_shift,
            mini_sector_shift,
            num_fat_sectors: read_u32(data, 44),
            first_dir_sector: read_u32(data, 48),
            mini_stream_cutoff: read_u32(data, 56),
            first_mini_fat_sector: read_u32(data, 60),
            num_mini_fat_sectors: read_u32(data, 64),
            first_difat_sector: read_u32(data, 68),
            num_difat_sectors: read_u32(data, 72),
            difat,
        })
    }

    #[inline]
    pub fn sector_size(&self) -> usize {
        1usize << self.sector_shift
    }

    #[inline]
    pub fn mini_sector_size(&self) -> usize {
        1usize << self.mini_sector_shift
    }
}

/// True if the buffer starts with the CFB signature.
#[inline]
pub fn is_cfb(data: &[u8]) -> bool {
    data.starts_with(OLE_SIGNATURE)
}

#[inline]
pub(crate) fn read_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

#[inline]
pub(crate) fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

#[inline]
pub(crate) fn read_u64(data: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[off..off + 8]);
    u64::from_le_bytes(b)
}
