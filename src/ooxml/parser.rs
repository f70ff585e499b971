//! Signature matching over the serialized XML of a package part.
//!
//! Matching is textual: each signature locates a tag shape with a regular expression and then
//! reads attributes by name, so attribute order and extra attributes do not matter. No XML tree
//! is built; malformed XML is scanned as far as the tag shapes survive.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::result::{Finding, FindingKind};

static RELATIONSHIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?Relationship\b([^>]*)>").unwrap());

static BINARY_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<pkg:part\b([^>]*)>\s*<pkg:binaryData>([^<]*)</pkg:binaryData>").unwrap()
});

static MACRO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<wne:mcd\b([^>]*)>").unwrap());

/// Any element carrying DDE link attributes (`ddeLink` in SpreadsheetML, `w:ddeLink` fields).
static DDE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[\w:]+\b([^>]*\bddeService\s*=[^>]*)>").unwrap());

static INSTR_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:instrText\b[^>]*>(.*?)</w:instrText>").unwrap());

static DDEAUTO_OPCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^\w])DDEAUTO\s").unwrap());

static DDE_OPCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^\w])DDE\s").unwrap());

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

const VBA_PROJECT_CONTENT_TYPE: &str = "vnd.ms-office.vbaProject";

/// All findings in `text`, grouped by signature in [`FindingKind::ALL`] order.
///
/// The sequence is lazy and borrows `text`; calling again restarts from the top.
pub fn scan_part(text: &str) -> impl Iterator<Item = Finding> + '_ {
    FindingKind::ALL
        .into_iter()
        .flat_map(move |kind| scan_kind(kind, text))
}

/// Findings of one kind in `text`, in document order.
pub fn scan_kind(kind: FindingKind, text: &str) -> Box<dyn Iterator<Item = Finding> + '_> {
    match kind {
        FindingKind::Image => relationships(text, "image", |target| Finding::Image { target }),
        FindingKind::Audio => relationships(text, "audio", |target| Finding::Audio { target }),
        FindingKind::Hyperlink => {
            relationships(text, "hyperlink", |target| Finding::Hyperlink { target })
        }
        FindingKind::VbaProject => {
            relationships(text, "vbaProject", |target| Finding::VbaProject { target })
        }
        FindingKind::BinaryData => Box::new(BINARY_PART.captures_iter(text).filter_map(|c| {
            let attrs = c.get(1)?.as_str();
            let content_type = attribute(attrs, "pkg:contentType")?;
            if content_type.rsplit('/').next() != Some(VBA_PROJECT_CONTENT_TYPE) {
                return None;
            }
            Some(Finding::BinaryData {
                part_name: attribute(attrs, "pkg:name").unwrap_or_default(),
                payload: group(&c, 2).to_string(),
            })
        })),
        FindingKind::Macro => Box::new(MACRO.captures_iter(text).filter_map(|c| {
            let attrs = c.get(1)?.as_str();
            Some(Finding::Macro {
                macro_name: attribute(attrs, "wne:macroName")?,
                name: attribute(attrs, "wne:name").unwrap_or_default(),
                encrypted: attribute(attrs, "wne:bEncrypt").unwrap_or_default(),
            })
        })),
        FindingKind::DdeLink => Box::new(DDE_LINK.captures_iter(text).filter_map(|c| {
            let attrs = c.get(1)?.as_str();
            Some(Finding::DdeLink {
                service: attribute(attrs, "ddeService")?,
                topic: attribute(attrs, "ddeTopic")?,
            })
        })),
        FindingKind::DdeAuto => Box::new(instructions(text).filter_map(|instruction| {
            DDEAUTO_OPCODE
                .is_match(&instruction)
                .then_some(Finding::DdeAuto { instruction })
        })),
        FindingKind::Dde => Box::new(instructions(text).filter_map(|instruction| {
            DDE_OPCODE
                .is_match(&instruction)
                .then_some(Finding::Dde { instruction })
        })),
    }
}

fn relationships<'t>(
    text: &'t str,
    rel_type: &'static str,
    make: fn(String) -> Finding,
) -> Box<dyn Iterator<Item = Finding> + 't> {
    Box::new(RELATIONSHIP.captures_iter(text).filter_map(move |c| {
        let attrs = c.get(1)?.as_str();
        let ty = attribute(attrs, "Type")?;
        let suffix = ty.rsplit('/').next()?;
        if suffix != rel_type || !ty.contains("/relationships/") {
            return None;
        }
        Some(make(attribute(attrs, "Target")?))
    }))
}

fn instructions(text: &str) -> impl Iterator<Item = String> + '_ {
    INSTR_TEXT
        .captures_iter(text)
        .map(|c| unescape(group(&c, 1)).into_owned())
}

fn group<'t>(c: &Captures<'t>, i: usize) -> &'t str {
    c.get(i).map_or("", |m| m.as_str())
}

/// Value of attribute `name` inside a tag's attribute text, XML-unescaped.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTRIBUTE
        .captures_iter(attrs)
        .find(|c| group(c, 1) == name)
        .map(|c| {
            let raw = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
            unescape(raw).into_owned()
        })
}

fn unescape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}
