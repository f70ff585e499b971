//! Office Open XML triage: relationship, macro and DDE signatures, plus extraction of the
//! VBA projects a package carries, either as a `vbaProject.bin` part or as base64
//! `pkg:binaryData` inside a Flat OPC (single XML file) document.

pub mod analyzer;
pub mod package;
mod parser;

pub use analyzer::{analyze_document, decode_binary_data};
pub use package::{is_zip, unpack, ZIP_SIGNATURE};
pub use parser::{scan_kind, scan_part};
