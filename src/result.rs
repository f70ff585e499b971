//! Analysis result types: findings, extracted artifacts and the per-document report.

use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cfb::DirEntry;
use crate::InputKind;

/// Signature categories, in the order they are applied to a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FindingKind {
    Image,
    Audio,
    Hyperlink,
    VbaProject,
    BinaryData,
    Macro,
    DdeLink,
    DdeAuto,
    Dde,
}

impl FindingKind {
    /// Priority order used when scanning a part.
    pub const ALL: [FindingKind; 9] = [
        FindingKind::Image,
        FindingKind::Audio,
        FindingKind::Hyperlink,
        FindingKind::VbaProject,
        FindingKind::BinaryData,
        FindingKind::Macro,
        FindingKind::DdeLink,
        FindingKind::DdeAuto,
        FindingKind::Dde,
    ];

    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self {
            FindingKind::Image => "image",
            FindingKind::Audio => "audio",
            FindingKind::Hyperlink => "hyperlink",
            FindingKind::VbaProject => "vbaProject",
            FindingKind::BinaryData => "vbaProject binary data",
            FindingKind::Macro => "macro",
            FindingKind::DdeLink => "DDE link",
            FindingKind::DdeAuto => "DDEAUTO field",
            FindingKind::Dde => "DDE field",
        }
    }
}

/// A signature occurrence with its captured values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Finding {
    Image { target: String },
    Audio { target: String },
    Hyperlink { target: String },
    VbaProject { target: String },
    BinaryData {
        part_name: String,
        /// Base64 text as it appears in the part (line breaks included).
        #[cfg_attr(feature = "serde", serde(skip))]
        payload: String,
    },
    Macro {
        macro_name: String,
        name: String,
        encrypted: String,
    },
    DdeLink { service: String, topic: String },
    DdeAuto { instruction: String },
    Dde { instruction: String },
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self {
            Finding::Image { .. } => FindingKind::Image,
            Finding::Audio { .. } => FindingKind::Audio,
            Finding::Hyperlink { .. } => FindingKind::Hyperlink,
            Finding::VbaProject { .. } => FindingKind::VbaProject,
            Finding::BinaryData { .. } => FindingKind::BinaryData,
            Finding::Macro { .. } => FindingKind::Macro,
            Finding::DdeLink { .. } => FindingKind::DdeLink,
            Finding::DdeAuto { .. } => FindingKind::DdeAuto,
            Finding::Dde { .. } => FindingKind::Dde,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Image { target } => write!(f, "Found image data: {target}"),
            Finding::Audio { target } => write!(f, "Found audio data: {target}"),
            Finding::Hyperlink { target } => write!(f, "Found hyperlink data: {target}"),
            Finding::VbaProject { target } => write!(f, "Found vbaProject data: {target}"),
            Finding::BinaryData { part_name, .. } => {
                write!(f, "Found vbaProject binary data: {part_name}")
            }
            Finding::Macro { macro_name, name, encrypted } => write!(
                f,
                "Found macro data: MacroName: {macro_name} # Name: {name} # bEncrypt: {encrypted}"
            ),
            Finding::DdeLink { service, topic } => {
                write!(f, "Found DDE data: Service: {service} # Topic: {topic}")
            }
            Finding::DdeAuto { instruction } | Finding::Dde { instruction } => {
                write!(f, "Found DDE data: {instruction}")
            }
        }
    }
}

/// What produced a written artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ArtifactKind {
    /// Base64-decoded `pkg:binaryData` payload.
    DecodedBinary,
    /// Stream extracted from a CFB container.
    OleStream,
}

/// A file written to the output directory.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub size: usize,
    /// Lowercase hex SHA-256 of the written bytes.
    pub sha256: String,
}

/// Findings for one scanned part, in signature priority order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PartFindings {
    pub part: PathBuf,
    pub findings: Vec<Finding>,
}

/// Directory entry seen while extracting a container.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OleEntryRecord {
    /// Where the container came from (part path or decoded part name).
    pub container: String,
    pub entry: DirEntry,
}

/// Everything learned from one input document.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AnalysisReport {
    pub input: PathBuf,
    pub input_kind: InputKind,
    /// Only parts with at least one finding are listed.
    pub parts: Vec<PartFindings>,
    pub parts_scanned: usize,
    pub ole_entries: Vec<OleEntryRecord>,
    pub extracted: Vec<ExtractedFile>,
    /// Recoverable errors, in the order they occurred.
    pub errors: Vec<String>,
}

impl AnalysisReport {
    pub fn new(input: PathBuf, input_kind: InputKind) -> Self {
        Self {
            input,
            input_kind,
            parts: Vec::new(),
            parts_scanned: 0,
            ole_entries: Vec::new(),
            extracted: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// All findings across parts, flattened in report order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.parts.iter().flat_map(|p| p.findings.iter())
    }

    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings().filter(|f| f.kind() == kind).count()
    }
}
