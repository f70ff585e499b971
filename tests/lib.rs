//! Tests for input detection and output naming.

use ooxml_checker::{detect_input_kind, sanitize_file_name, InputKind};

#[test]
fn detect_zip() {
    assert_eq!(detect_input_kind(b"PK\x03\x04\x14\x00\x06\x00"), InputKind::Zip);
}

#[test]
fn detect_cfb() {
    let data = [0xD0u8, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    assert_eq!(detect_input_kind(&data), InputKind::Cfb);
}

#[test]
fn detect_xml() {
    assert_eq!(detect_input_kind(b"<?xml ve"), InputKind::Xml);
    assert_eq!(detect_input_kind(b"\xEF\xBB\xBF<?xml"), InputKind::Xml);
    assert_eq!(detect_input_kind(b"\r\n  <pkg"), InputKind::Xml);
}

#[test]
fn detect_unknown() {
    assert_eq!(detect_input_kind(&[0u8; 8]), InputKind::Unknown);
    assert_eq!(detect_input_kind(b""), InputKind::Unknown);
    assert_eq!(detect_input_kind(b"{\\rtf1\\a"), InputKind::Unknown);
}

#[test]
fn sanitize_replaces_separators() {
    assert_eq!(sanitize_file_name("VBA/ThisDocument"), "VBA_ThisDocument");
    assert_eq!(sanitize_file_name("Macros/VBA/Module1"), "Macros_VBA_Module1");
    assert_eq!(sanitize_file_name("a\\b:c*d?"), "a_b_c_d_");
    assert_eq!(sanitize_file_name("\u{1}CompObj"), "_CompObj");
}
