//! Writing extracted artifacts to the output directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Longest sanitized name in bytes. Leaves room under the usual 255-byte file name limit for
/// the `ole<N>_` prefix and a collision suffix.
pub const MAX_NAME_BYTES: usize = 200;

/// Turn a container-internal name into a single safe file name component.
///
/// Path separators, characters reserved on Windows and control characters (CFB names such as
/// `\x05SummaryInformation` carry one) become `_`. Names longer than [`MAX_NAME_BYTES`] keep
/// their tail, where the stream name is. Trailing dots and spaces are trimmed and an empty
/// result becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if out.len() > MAX_NAME_BYTES {
        let mut cut = out.len() - MAX_NAME_BYTES;
        while !out.is_char_boundary(cut) {
            cut += 1;
        }
        out.drain(..cut);
    }
    while out.ends_with(['.', ' ']) {
        out.pop();
    }
    if out.is_empty() || out.chars().all(|c| c == '.') {
        out = "_".to_string();
    }
    out
}

/// Write `bytes` to `dir/file_name`, flushing before returning.
pub fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(path)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
