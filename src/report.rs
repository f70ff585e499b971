//! Progress events emitted while a document is processed.

use std::path::Path;

use crate::cfb::DirEntry;
use crate::error::Error;
use crate::result::{ExtractedFile, Finding};

/// Sink for human-readable events. Methods return nothing so a sink can never steer the run.
pub trait Reporter {
    fn part(&mut self, _path: &Path) {}
    fn finding(&mut self, _part: &Path, _finding: &Finding) {}
    fn ole_entry(&mut self, _container: &str, _entry: &DirEntry) {}
    fn extracted(&mut self, _file: &ExtractedFile) {}
    fn error(&mut self, _context: &str, _error: &Error) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}
