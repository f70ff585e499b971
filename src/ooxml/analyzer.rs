//! OOXML analyzer: runs the signatures over every part and extracts the OLE payloads they
//! point at (`vbaProject.bin` parts and base64 `pkg:binaryData` blocks).

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use base64::Engine;
use walkdir::WalkDir;

use crate::cfb::CompoundFile;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ooxml::package::unpack;
use crate::ooxml::parser::scan_part;
use crate::output::{sanitize_file_name, sha256_hex, write_artifact};
use crate::report::Reporter;
use crate::result::{
    AnalysisReport, ArtifactKind, ExtractedFile, Finding, OleEntryRecord, PartFindings,
};
use crate::{detect_input_kind, InputKind};

/// Decode a `pkg:binaryData` payload. Line breaks and other whitespace are ignored.
pub fn decode_binary_data(payload: &str) -> Result<Vec<u8>> {
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Analyze one input document, writing extracted artifacts under `config.output_dir`.
///
/// Fails only when the output directory cannot be created or the input cannot be opened;
/// every other problem is reported and recorded in [`AnalysisReport::errors`].
pub fn analyze_document(
    input: &Path,
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<AnalysisReport> {
    fs::create_dir_all(&config.output_dir)?;

    let kind = if input.is_dir() {
        InputKind::Directory
    } else {
        let mut head = Vec::with_capacity(8);
        File::open(input)?.take(8).read_to_end(&mut head)?;
        detect_input_kind(&head)
    };
    log::info!("analyzing {} as {}", input.display(), kind.label());

    let mut run = Extraction {
        config,
        reporter,
        report: AnalysisReport::new(input.to_path_buf(), kind),
        containers: 0,
        written: HashSet::new(),
        extracted_parts: HashSet::new(),
    };

    let parts = match kind {
        InputKind::Directory => collect_parts(input),
        InputKind::Zip if !config.no_unzip => {
            let dest = config.unpack_dir_for(input);
            match unpack(input, &dest) {
                Ok(parts) => parts,
                Err(e) => {
                    run.fail(&format!("unpacking {}", input.display()), e);
                    return Ok(run.report);
                }
            }
        }
        InputKind::Cfb => {
            let bytes = fs::read(input)?;
            run.extract_ole(&input.display().to_string(), &bytes);
            Vec::new()
        }
        _ => vec![input.to_path_buf()],
    };

    for part in &parts {
        run.scan(&parts, part);
    }
    Ok(run.report)
}

/// Every file under `dir`, in file-name order.
fn collect_parts(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

struct Extraction<'c, 'r> {
    config: &'c Config,
    reporter: &'r mut dyn Reporter,
    report: AnalysisReport,
    /// Containers extracted so far; numbers the `ole<N>_` prefix.
    containers: usize,
    written: HashSet<String>,
    extracted_parts: HashSet<PathBuf>,
}

impl Extraction<'_, '_> {
    fn scan(&mut self, parts: &[PathBuf], part: &Path) {
        self.reporter.part(part);
        self.report.parts_scanned += 1;
        let data = match fs::read(part) {
            Ok(d) => d,
            Err(e) => {
                self.fail(&format!("reading {}", part.display()), e.into());
                return;
            }
        };
        let text = String::from_utf8_lossy(&data);

        let mut findings = Vec::new();
        for finding in scan_part(&text) {
            log::debug!("{}: {}", part.display(), finding);
            self.reporter.finding(part, &finding);
            match &finding {
                Finding::VbaProject { target } => self.process_ole(parts, target),
                Finding::BinaryData { part_name, payload } => {
                    self.process_binary_data(part_name, payload)
                }
                _ => {}
            }
            findings.push(finding);
        }
        if !findings.is_empty() {
            self.report.parts.push(PartFindings {
                part: part.to_path_buf(),
                findings,
            });
        }
    }

    /// Extract every unpacked part whose file name matches the relationship target.
    fn process_ole(&mut self, parts: &[PathBuf], target: &str) {
        let wanted = target.rsplit(['/', '\\']).next().unwrap_or(target);
        let mut matched = false;
        for part in parts {
            if part.file_name() != Some(OsStr::new(wanted)) {
                continue;
            }
            matched = true;
            if !self.extracted_parts.insert(part.clone()) {
                continue;
            }
            match fs::read(part) {
                Ok(bytes) => self.extract_ole(&part.display().to_string(), &bytes),
                Err(e) => self.fail(&format!("reading {}", part.display()), e.into()),
            }
        }
        if !matched {
            log::warn!("no unpacked part matches vbaProject target {target}");
        }
    }

    fn process_binary_data(&mut self, part_name: &str, payload: &str) {
        let bytes = match decode_binary_data(payload) {
            Ok(b) => b,
            Err(e) => {
                self.fail(&format!("decoding binary data {part_name}"), e);
                return;
            }
        };
        if self.write(ArtifactKind::DecodedBinary, &sanitize_file_name(part_name), &bytes) {
            self.extract_ole(part_name, &bytes);
        }
    }

    /// Parse `bytes` as CFB and write out each stream. All streams are reconstructed before
    /// anything is written, so a malformed container produces no partial output.
    fn extract_ole(&mut self, label: &str, bytes: &[u8]) {
        let parsed = CompoundFile::parse(bytes).and_then(|cf| {
            let items = cf
                .entries()
                .map(|entry| -> Result<_> {
                    let data = if entry.is_stream() {
                        Some(cf.read_stream(entry)?)
                    } else {
                        None
                    };
                    Ok((entry.clone(), data))
                })
                .collect::<Result<Vec<_>>>();
            items
        });
        let items = match parsed {
            Ok(items) => items,
            Err(e) => {
                self.fail(&format!("parsing OLE data from {label}"), e);
                return;
            }
        };

        self.containers += 1;
        log::info!("{label}: {} OLE entries", items.len());
        for (entry, data) in items {
            if let Some(data) = data.filter(|d| !d.is_empty()) {
                let name = format!("ole{}_{}", self.containers, sanitize_file_name(&entry.path));
                self.write(ArtifactKind::OleStream, &name, &data);
            }
            self.reporter.ole_entry(label, &entry);
            self.report.ole_entries.push(OleEntryRecord {
                container: label.to_string(),
                entry,
            });
        }
    }

    /// Write one artifact under a run-unique name; false if nothing was written.
    fn write(&mut self, kind: ArtifactKind, file_name: &str, bytes: &[u8]) -> bool {
        let file_name = self.unique_name(file_name);
        match write_artifact(&self.config.output_dir, &file_name, bytes) {
            Ok(path) => {
                let file = ExtractedFile {
                    path,
                    kind,
                    size: bytes.len(),
                    sha256: sha256_hex(bytes),
                };
                self.reporter.extracted(&file);
                self.report.extracted.push(file);
                true
            }
            Err(e) => {
                self.fail(&format!("writing {file_name}"), e);
                false
            }
        }
    }

    fn unique_name(&mut self, file_name: &str) -> String {
        let mut candidate = file_name.to_string();
        let mut n = 1;
        while !self.written.insert(candidate.clone()) {
            n += 1;
            candidate = format!("{file_name}_{n}");
        }
        candidate
    }

    fn fail(&mut self, context: &str, error: Error) {
        log::warn!("{context}: {error}");
        self.reporter.error(context, &error);
        self.report.errors.push(format!("{context}: {error}"));
    }
}
