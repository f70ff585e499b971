//! Run configuration, passed explicitly into [`analyze_document`](crate::analyze_document).

use std::path::{Path, PathBuf};

use crate::ooxml::package::default_unpack_dir;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where decoded payloads and OLE streams are written. Created if missing.
    pub output_dir: PathBuf,
    /// Treat the input as an already-unpacked part (or directory of parts).
    pub no_unzip: bool,
    /// Where the archive is unpacked; defaults to the input path without its extension.
    pub unpack_dir: Option<PathBuf>,
}

impl Config {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            no_unzip: false,
            unpack_dir: None,
        }
    }

    pub fn no_unzip(mut self, yes: bool) -> Self {
        self.no_unzip = yes;
        self
    }

    pub fn unpack_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unpack_dir = Some(dir.into());
        self
    }

    pub(crate) fn unpack_dir_for(&self, input: &Path) -> PathBuf {
        self.unpack_dir
            .clone()
            .unwrap_or_else(|| default_unpack_dir(input))
    }
}
