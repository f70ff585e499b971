//! CLI for ooxml-checker: scan an OOXML document and extract its embedded OLE streams.

use std::path::{Path, PathBuf};

use clap::Parser;
use indexmap::IndexMap;
use ooxml_checker::{
    analyze_document, sha256_hex, AnalysisReport, ArtifactKind, Config, DirEntry, EntryType,
    Error, ExtractedFile, Finding, NullReporter, Reporter,
};

#[derive(Parser)]
#[command(name = "ooxml-checker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Find macros, DDE fields and embedded OLE payloads in OOXML documents",
    long_about = None
)]
struct Args {
    /// Input file (zip-packaged document, Flat OPC XML, or a bare vbaProject.bin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for decoded payloads and extracted OLE streams
    #[arg(short, long)]
    output: PathBuf,

    /// Don't unzip the input, just process it (a directory is walked for parts)
    #[arg(short = 'n', long = "nonzip")]
    no_unzip: bool,

    /// Where to unpack the archive (default: input path without its extension)
    #[arg(long, value_name = "DIR")]
    unpack_dir: Option<PathBuf>,

    /// Print a JSON report instead of the event log
    #[arg(long)]
    json: bool,

    /// Pretty-print JSON (use with --json)
    #[arg(long)]
    pretty: bool,

    /// Quiet: only print findings and written files
    #[arg(short, long)]
    quiet: bool,
}

/// Prints events as they happen.
struct ConsoleReporter {
    quiet: bool,
}

impl Reporter for ConsoleReporter {
    fn part(&mut self, path: &Path) {
        if !self.quiet {
            println!("Checking file {}", path.display());
        }
    }

    fn finding(&mut self, _part: &Path, finding: &Finding) {
        println!("{finding}");
    }

    fn ole_entry(&mut self, _container: &str, entry: &DirEntry) {
        if !self.quiet {
            let kind = match entry.entry_type {
                EntryType::Storage | EntryType::Root => "storage",
                EntryType::Stream => "stream",
                EntryType::Empty => "empty",
            };
            println!("Found OLE entry: {} ({kind}, {} bytes)", entry.path, entry.size);
        }
    }

    fn extracted(&mut self, file: &ExtractedFile) {
        let what = match file.kind {
            ArtifactKind::DecodedBinary => "Base64 decoded binary file",
            ArtifactKind::OleStream => "OLE file",
        };
        println!("Wrote {what}: {} ({} bytes)", file.path.display(), file.size);
    }

    fn error(&mut self, context: &str, error: &Error) {
        eprintln!("Error {context}: {error}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if !args.json && !args.quiet {
        println!("\n{} v{}\n", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }

    let mut config = Config::new(&args.output).no_unzip(args.no_unzip);
    if let Some(dir) = &args.unpack_dir {
        config = config.unpack_dir(dir);
    }

    let result = if args.json {
        analyze_document(&args.input, &config, &mut NullReporter)
    } else {
        analyze_document(&args.input, &config, &mut ConsoleReporter { quiet: args.quiet })
    };
    let report = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Cannot process {}: {e}", args.input.display());
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&args, &report)?;
    } else if !args.quiet {
        print_summary(&report);
    }
    Ok(())
}

fn print_json(args: &Args, report: &AnalysisReport) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = IndexMap::<String, serde_json::Value>::new();
    let sha256 = match std::fs::read(&args.input) {
        Ok(bytes) => serde_json::Value::String(sha256_hex(&bytes)),
        Err(_) => serde_json::Value::Null,
    };
    out.insert("sha256".to_string(), sha256);
    out.insert("input".to_string(), serde_json::to_value(&report.input)?);
    out.insert("input_kind".to_string(), serde_json::to_value(report.input_kind)?);
    out.insert("parts_scanned".to_string(), serde_json::to_value(report.parts_scanned)?);
    out.insert("parts".to_string(), serde_json::to_value(&report.parts)?);
    out.insert("ole_entries".to_string(), serde_json::to_value(&report.ole_entries)?);
    out.insert("extracted".to_string(), serde_json::to_value(&report.extracted)?);
    out.insert("errors".to_string(), serde_json::to_value(&report.errors)?);
    let json_str = if args.pretty {
        serde_json::to_string_pretty(&out)?
    } else {
        serde_json::to_string(&out)?
    };
    println!("{}", json_str);
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    println!();
    println!(
        "Scanned {} part(s): {} finding(s), {} OLE entr(y/ies), {} file(s) written, {} error(s)",
        report.parts_scanned,
        report.findings().count(),
        report.ole_entries.len(),
        report.extracted.len(),
        report.errors.len()
    );
    for file in &report.extracted {
        println!("  sha256: {}  {}", file.sha256, file.path.display());
    }
}
