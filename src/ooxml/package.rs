//! Unpacking the OOXML zip container to disk.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::Result;

/// Zip local file header magic.
pub const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

#[inline]
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_SIGNATURE)
}

/// Extract every member of `archive` under `dest`; returns member paths in archive order.
///
/// Members whose names would escape `dest` (absolute paths, `..`) are skipped.
pub fn unpack(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    fs::create_dir_all(dest)?;

    let mut out = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut member = zip.by_index(i)?;
        let Some(rel) = member.enclosed_name() else {
            log::warn!("skipping archive member with unsafe name {:?}", member.name());
            continue;
        };
        let path = dest.join(rel);
        if member.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&path)?);
        io::copy(&mut member, &mut writer)?;
        writer.flush()?;
        log::debug!("unpacked {} ({} bytes)", path.display(), member.size());
        out.push(path);
    }
    Ok(out)
}

/// Default unpack location: the archive path with its extension removed.
pub fn default_unpack_dir(archive: &Path) -> PathBuf {
    let stripped = archive.with_extension("");
    if stripped == archive {
        let mut name = archive.as_os_str().to_owned();
        name.push("_unpacked");
        PathBuf::from(name)
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_dir_strips_extension() {
        assert_eq!(default_unpack_dir(Path::new("/tmp/a/doc.docm")), PathBuf::from("/tmp/a/doc"));
        assert_eq!(
            default_unpack_dir(Path::new("/tmp/a/sample")),
            PathBuf::from("/tmp/a/sample_unpacked")
        );
    }

    #[test]
    fn zip_magic() {
        assert!(is_zip(b"PK\x03\x04rest"));
        assert!(!is_zip(b"<?xml"));
    }
}
