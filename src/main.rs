//! codebase-ingest CLI
//!
//! Thin driver around the library: validate or ingest an archive, analyze
//! a folder, or print the effective configuration.

use clap::{Args, Parser, Subcommand};
use codebase_ingest::cancel::{CancelToken, SignalHandler, EXIT_CODE_CANCELLED};
use codebase_ingest::config::{ConfigError, EffectiveConfig};
use codebase_ingest::extract::ExtractionError;
use codebase_ingest::history::{JsonFileHistory, SelectionHistory};
use codebase_ingest::{
    ArchiveValidator, DirectorySummary, IngestConfig, IngestionSession, Ingestor, SessionError,
    ValidationVerdict,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_REJECTED: i32 = 2;
const EXIT_EXTRACTION_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "codebase-ingest")]
#[command(about = "Validate, expand and summarize submitted codebases", version)]
struct Cli {
    /// Service config file (default: ./ingest.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Recent-selections file; history is not kept when omitted
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// CLI layer of the configuration
#[derive(Args)]
struct Overrides {
    /// Maximum number of archive entries
    #[arg(long, global = true)]
    max_entries: Option<u64>,

    /// Maximum total uncompressed size in bytes
    #[arg(long, global = true)]
    max_total_bytes: Option<u64>,

    /// Maximum per-entry expansion ratio
    #[arg(long, global = true)]
    max_ratio: Option<u64>,

    /// Maximum traversal depth during analysis
    #[arg(long, global = true)]
    max_depth: Option<u64>,

    /// Number of sample files to report
    #[arg(long, global = true)]
    sample_files: Option<u64>,

    /// Skip VCS metadata, dependency caches and build output
    #[arg(long, global = true)]
    default_excludes: bool,

    /// Extra exclude glob (repeatable)
    #[arg(long = "exclude", global = true)]
    exclude: Vec<String>,

    /// Overall deadline in seconds
    #[arg(long, global = true)]
    deadline: Option<u64>,

    /// Parent directory for working directories
    #[arg(long, global = true)]
    workdir_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an archive without expanding it
    Validate {
        archive: PathBuf,

        /// Size announced by the uploader (default: the file's size)
        #[arg(long)]
        declared_size: Option<u64>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate, expand and analyze an archive
    Ingest {
        archive: PathBuf,

        /// Size announced by the uploader (default: the file's size)
        #[arg(long)]
        declared_size: Option<u64>,

        /// Keep the working directory after exit
        #[arg(long)]
        keep: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Analyze an existing directory in place
    Analyze {
        dir: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration with provenance
    Config {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List recent selections (requires --history)
    History {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = run(cli);
    process::exit(code);
}

/// Filter from `INGEST_LOG` (default `info`); JSON lines when
/// `INGEST_LOG_FORMAT=json`. Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("INGEST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("INGEST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// Everything owned here is dropped before the process exits, so working
/// directories are cleaned up.
fn run(cli: Cli) -> i32 {
    let effective = match load_config(cli.config.as_deref(), &cli.overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return EXIT_ERROR;
        }
    };
    let settings = effective.settings();

    match cli.command {
        Commands::Validate {
            archive,
            declared_size,
            json,
        } => run_validate(&settings, &archive, declared_size, json),
        Commands::Ingest {
            archive,
            declared_size,
            keep,
            json,
        } => run_ingest(settings, cli.history, &archive, declared_size, keep, json),
        Commands::Analyze { dir, json } => run_analyze(settings, cli.history, &dir, json),
        Commands::Config { json } => run_config(&effective, json),
        Commands::History { json } => run_history(&settings, cli.history, json),
    }
}

fn load_config(service_path: Option<&Path>, overrides: &Overrides) -> Result<EffectiveConfig, ConfigError> {
    let host_path = EffectiveConfig::default_host_path();
    let default_service = PathBuf::from("ingest.toml");
    let service_path = service_path.unwrap_or(&default_service);

    EffectiveConfig::build(host_path.as_deref(), Some(service_path), overrides.to_value())
}

impl Overrides {
    fn to_value(&self) -> Option<Value> {
        let mut limits = Map::new();
        let mut analysis = Map::new();
        let mut root = Map::new();

        if let Some(v) = self.max_entries {
            limits.insert("max_entries".into(), json!(v));
        }
        if let Some(v) = self.max_total_bytes {
            limits.insert("max_total_uncompressed".into(), json!(v));
        }
        if let Some(v) = self.max_ratio {
            limits.insert("max_expansion_ratio".into(), json!(v));
        }
        if let Some(v) = self.max_depth {
            analysis.insert("max_depth".into(), json!(v));
        }
        if let Some(v) = self.sample_files {
            analysis.insert("sample_files".into(), json!(v));
        }
        if self.default_excludes {
            analysis.insert("default_excludes".into(), json!(true));
        }
        if !self.exclude.is_empty() {
            analysis.insert("exclude".into(), json!(self.exclude));
        }
        if let Some(v) = self.deadline {
            root.insert("session".into(), json!({ "deadline_seconds": v }));
        }
        if let Some(dir) = &self.workdir_root {
            root.insert("workdir".into(), json!({ "root": dir.display().to_string() }));
        }

        if !limits.is_empty() {
            root.insert("limits".into(), Value::Object(limits));
        }
        if !analysis.is_empty() {
            root.insert("analysis".into(), Value::Object(analysis));
        }

        if root.is_empty() {
            None
        } else {
            Some(Value::Object(root))
        }
    }
}

fn read_archive(path: &Path) -> Result<Vec<u8>, i32> {
    fs::read(path).map_err(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        EXIT_ERROR
    })
}

fn run_validate(settings: &IngestConfig, archive: &Path, declared_size: Option<u64>, json: bool) -> i32 {
    let bytes = match read_archive(archive) {
        Ok(b) => b,
        Err(code) => return code,
    };
    let declared = declared_size.unwrap_or(bytes.len() as u64);

    let verdict = ArchiveValidator::new(settings.limits.clone()).validate(&bytes, declared);

    if json {
        print_json(&verdict);
    } else {
        match &verdict {
            ValidationVerdict::Accepted(manifest) => {
                println!("Accepted: {}", archive.display());
                println!("  Entries:      {}", manifest.entry_count);
                println!("  Files:        {}", manifest.file_count());
                println!("  Uncompressed: {} bytes", manifest.total_uncompressed_size);
                println!("  Compressed:   {} bytes", manifest.total_compressed_size);
            }
            ValidationVerdict::Rejected(reason) => {
                println!("Rejected: {}", archive.display());
                println!("  Kind:   {} ({})", reason.kind(), reason.kind().user_message());
                println!("  Reason: {}", reason);
            }
        }
    }

    if verdict.is_accepted() {
        EXIT_OK
    } else {
        EXIT_REJECTED
    }
}

fn build_ingestor(settings: IngestConfig, history: Option<PathBuf>) -> Result<Ingestor, i32> {
    let max_records = settings.history_max_records;
    let handler = SignalHandler::new(CancelToken::new());
    if let Err(e) = handler.install() {
        eprintln!("Warning: could not install signal handler: {}", e);
    }

    let mut ingestor = Ingestor::new(settings)
        .map_err(|e| {
            eprintln!("Error in exclude patterns: {}", e);
            EXIT_ERROR
        })?
        .with_cancel(handler.token());

    if let Some(path) = history {
        ingestor = ingestor.with_history(Box::new(JsonFileHistory::new(path, max_records)));
    }
    Ok(ingestor)
}

fn run_ingest(
    settings: IngestConfig,
    history: Option<PathBuf>,
    archive: &Path,
    declared_size: Option<u64>,
    keep: bool,
    json: bool,
) -> i32 {
    let bytes = match read_archive(archive) {
        Ok(b) => b,
        Err(code) => return code,
    };
    let declared = declared_size.unwrap_or(bytes.len() as u64);
    let ingestor = match build_ingestor(settings, history) {
        Ok(i) => i,
        Err(code) => return code,
    };

    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| archive.display().to_string());
    let session = ingestor.ingest_archive(&file_name, &bytes, declared);

    finish_session(session, keep, json)
}

fn run_analyze(settings: IngestConfig, history: Option<PathBuf>, dir: &Path, json: bool) -> i32 {
    let ingestor = match build_ingestor(settings, history) {
        Ok(i) => i,
        Err(code) => return code,
    };
    let session = ingestor.select_directory(dir);
    finish_session(session, false, json)
}

fn finish_session(session: IngestionSession, keep: bool, json: bool) -> i32 {
    let report = session.report();
    let code = exit_code(session.failure());

    if json {
        print_json(&report);
    } else {
        println!("Session {} [{}]", report.session_id, report.phase);
        println!("  Source: {} ({})", report.path_reference, report.source_kind);
        if let Some(summary) = &report.summary {
            if let Some(root) = &report.analysis_root {
                println!("  Root:   {}", root);
            }
            print_summary(summary);
        }
        if let Some(error) = &report.error {
            let kind = error
                .kind
                .map(|k| format!("{} ({})", k, k.user_message()))
                .unwrap_or_else(|| "INTERNAL".to_string());
            println!("  Error:  {}", kind);
            println!("          {}", error.message);
        }
    }

    if keep && session.is_ready() {
        if let Some(path) = session.persist() {
            eprintln!("Kept working directory: {}", path.display());
        }
    } else {
        session.discard();
    }

    code
}

fn print_summary(summary: &DirectorySummary) {
    println!("  Files:       {}", summary.file_count);
    println!("  Directories: {}", summary.directory_count);
    println!("  Total size:  {} bytes", summary.total_size_bytes);
    if let Some(largest) = &summary.largest_file {
        println!("  Largest:     {} ({} bytes)", largest.path, largest.size_bytes);
    }
    let top: Vec<String> = summary
        .top_extensions(5)
        .into_iter()
        .map(|(ext, count)| format!("{} {}", ext, count))
        .collect();
    if !top.is_empty() {
        println!("  Extensions:  {}", top.join(", "));
    }
    if !summary.language_histogram.is_empty() {
        let languages: Vec<String> = summary
            .language_histogram
            .iter()
            .map(|(lang, count)| format!("{} {}", lang, count))
            .collect();
        println!("  Languages:   {}", languages.join(", "));
    }
    if !summary.frameworks.is_empty() {
        println!("  Frameworks:  {}", summary.frameworks.join(", "));
    }
    if summary.excluded_count > 0 {
        println!("  Excluded:    {}", summary.excluded_count);
    }
    if summary.truncated {
        println!("  Truncated:   yes (statistics are partial)");
    }
    for path in &summary.sample_files {
        println!("    {}", path);
    }
}

fn exit_code(failure: Option<&SessionError>) -> i32 {
    match failure {
        None => EXIT_OK,
        Some(SessionError::Rejected(_)) | Some(SessionError::InvalidSelection { .. }) => EXIT_REJECTED,
        Some(SessionError::Extraction(ExtractionError::Cancelled)) | Some(SessionError::Cancelled) => {
            EXIT_CODE_CANCELLED
        }
        Some(SessionError::Extraction(_)) => EXIT_EXTRACTION_FAILED,
        Some(_) => EXIT_ERROR,
    }
}

fn run_config(effective: &EffectiveConfig, json: bool) -> i32 {
    if json {
        match effective.to_json() {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                return EXIT_ERROR;
            }
        }
        return EXIT_OK;
    }

    println!("Sources:");
    for source in &effective.sources {
        match (&source.path, &source.digest) {
            (Some(path), Some(digest)) => println!("  {:?}: {} (sha256 {})", source.origin, path, digest),
            _ => println!("  {:?}", source.origin),
        }
    }
    match serde_json::to_string_pretty(&effective.config) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            return EXIT_ERROR;
        }
    }
    EXIT_OK
}

fn run_history(settings: &IngestConfig, history: Option<PathBuf>, json: bool) -> i32 {
    let Some(path) = history else {
        eprintln!("No history file given (use --history <file>)");
        return EXIT_ERROR;
    };

    let records = match JsonFileHistory::new(path, settings.history_max_records).recent() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading history: {}", e);
            return EXIT_ERROR;
        }
    };

    if json {
        print_json(&records);
    } else if records.is_empty() {
        println!("No recent selections");
    } else {
        for record in records {
            println!(
                "{}  {:<16}  {:>6} files  {:>10} bytes  {}",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                record.source_kind.to_string(),
                record.file_count,
                record.total_size_bytes,
                record.path_reference
            );
        }
    }
    EXIT_OK
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
