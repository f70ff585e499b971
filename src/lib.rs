//! # ooxml-checker
//!
//! Library to triage Office Open XML documents (`.docx`, `.docm`, `.xlsm`, Flat OPC `.xml`)
//! for embedded threat indicators and to pull out the OLE payloads they carry.
//!
//! ## What is detected
//!
//! - **Relationships** to images, audio, hyperlinks and VBA projects (`vbaProject.bin`).
//! - **Embedded VBA projects** stored as base64 `pkg:binaryData` in Flat OPC documents.
//! - **Macro descriptors** (`wne:mcd`) with their encryption flag.
//! - **DDE**: `ddeService`/`ddeTopic` links and `DDEAUTO` / `DDE` field instructions.
//!
//! Every VBA project found is parsed as a Compound File Binary container and each of its
//! streams is written to the output directory for further analysis.
//!
//! ## Example
//!
//! ```no_run
//! use ooxml_checker::{analyze_document, Config, NullReporter};
//!
//! let config = Config::new("out");
//! let report = analyze_document("sample.docm".as_ref(), &config, &mut NullReporter).unwrap();
//! for finding in report.findings() {
//!     println!("{finding}");
//! }
//! for file in &report.extracted {
//!     println!("wrote {} ({} bytes)", file.path.display(), file.size);
//! }
//! ```
//!
//! Processing is sequential; output order follows input part order, then signature order.

pub mod cfb;
mod config;
mod error;
pub mod ooxml;
mod output;
mod report;
mod result;

pub use cfb::{extract_streams, CompoundFile, DirEntry, EntryType, Stream, MAX_STORAGE_DEPTH};
pub use config::Config;
pub use error::{Error, Result};
pub use ooxml::{analyze_document, decode_binary_data, scan_part};
pub use output::{sanitize_file_name, sha256_hex, MAX_NAME_BYTES};
pub use report::{NullReporter, Reporter};
pub use result::{
    AnalysisReport, ArtifactKind, ExtractedFile, Finding, FindingKind, OleEntryRecord, PartFindings,
};

/// Input routing hint (by magic, or directory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InputKind {
    /// Zip-packaged OOXML document.
    Zip,
    /// Bare Compound File Binary, e.g. a `vbaProject.bin`.
    Cfb,
    /// XML text: a single part or a Flat OPC document.
    Xml,
    /// Directory of already-unpacked parts.
    Directory,
    Unknown,
}

impl InputKind {
    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self {
            InputKind::Zip => "zip",
            InputKind::Cfb => "CFB",
            InputKind::Xml => "XML",
            InputKind::Directory => "directory",
            InputKind::Unknown => "unknown",
        }
    }
}

/// Detect the input kind from its leading bytes.
#[inline]
pub fn detect_input_kind(data: &[u8]) -> InputKind {
    if ooxml::is_zip(data) {
        return InputKind::Zip;
    }
    if cfb::is_cfb(data) {
        return InputKind::Cfb;
    }
    let text = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    match text.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => InputKind::Xml,
        _ => InputKind::Unknown,
    }
}
