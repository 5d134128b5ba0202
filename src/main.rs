// LogTrail - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation
// 3. Format loading (user files + built-ins) and selection
// 4. One read pass over every resolved file, then optional live follow
// 5. Checkpoint persistence between runs

use clap::Parser;
use logtrail::app::reader::{IncrementalReader, ReaderConfig};
use logtrail::app::tail::{self, TailManager, TailSession};
use logtrail::app::{checkpoint_store, files, format_mgr};
use logtrail::core::model::{LogRecord, TailProgress};
use logtrail::platform::config::{self, AppConfig, PlatformPaths};
use logtrail::util::constants;
use logtrail::util::error::{FormatError, LogTrailError};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// LogTrail - structured extraction and tailing for plain-text logs.
///
/// Reads the given files (or glob patterns) through regex-driven format
/// definitions and prints one structured record per log entry.
#[derive(Parser, Debug)]
#[command(name = "logtrail", version, about)]
struct Cli {
    /// Files or glob patterns to read.
    #[arg(required = true)]
    patterns: Vec<String>,

    /// Additional format definition file (TOML). May be repeated.
    #[arg(short = 'F', long = "formats")]
    format_files: Vec<PathBuf>,

    /// Restrict parsing to the named format(s), tried in the order given.
    #[arg(short = 'n', long = "format")]
    format_names: Vec<String>,

    /// Keep running and print records as they are appended.
    #[arg(short = 'f', long)]
    follow: bool,

    /// Checkpoint file used to resume where the previous run stopped.
    #[arg(short = 's', long)]
    state: Option<PathBuf>,

    /// Emit one JSON object per record instead of text.
    #[arg(long)]
    json: bool,

    /// Sort each batch by timestamp across files before printing.
    #[arg(short = 'm', long)]
    merge: bool,

    /// Use this config file instead of the platform default.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let platform_paths = PlatformPaths::resolve();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| platform_paths.config_file());
    let (app_config, config_warnings) = config::load_config(&config_path);

    logtrail::util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "LogTrail starting"
    );

    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
        eprintln!("warning: {warning}");
    }

    if let Err(e) = run(&cli, &app_config, &platform_paths) {
        tracing::error!(error = %e, "Fatal error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, app_config: &AppConfig, paths: &PlatformPaths) -> Result<(), LogTrailError> {
    // CLI files take priority over configured ones, which take priority over
    // the user format directory.
    let mut user_files = cli.format_files.clone();
    user_files.extend(app_config.format_files.iter().cloned());
    user_files.extend(format_mgr::format_files_in_dir(&paths.user_formats_dir));

    let (all_formats, format_errors) = format_mgr::load_all_formats(&user_files);
    for err in &format_errors {
        eprintln!("warning: {err}");
    }

    let (formats, unknown) = format_mgr::select_formats(&all_formats, &cli.format_names);
    if let Some(name) = unknown.into_iter().next() {
        return Err(FormatError::UnknownFormat { name }.into());
    }

    let reader = IncrementalReader::new(
        &formats,
        ReaderConfig {
            max_entry_size: app_config.max_entry_size,
            detection_sample_bytes: app_config.detection_sample_bytes,
        },
    )?;

    let (log_files, warnings) = files::resolve_patterns(&cli.patterns);
    for warning in &warnings {
        eprintln!("warning: {warning}");
    }

    let saved = match &cli.state {
        Some(path) => checkpoint_store::load(path)?,
        None => Vec::new(),
    };

    let mut session = TailSession::new(Arc::new(reader));
    for path in log_files {
        match saved.iter().find(|c| c.path == path) {
            Some(checkpoint) => session.track_from(checkpoint.clone()),
            None => session.track(path),
        };
    }

    tracing::info!(
        files = session.len(),
        formats = formats.len(),
        follow = cli.follow,
        "Initial read"
    );

    let cycle = session.poll();
    for (path, message) in &cycle.errors {
        eprintln!("warning: {}: {message}", path.display());
    }
    if !print_records(cycle.records, cli) {
        return Ok(());
    }
    if let Some(state) = &cli.state {
        checkpoint_store::save(session.checkpoints(), state)?;
    }

    if cli.follow {
        follow(session, cli, app_config.poll_interval_ms)?;
    }

    Ok(())
}

/// Stream appended records until the output or the watcher goes away.
fn follow(session: TailSession, cli: &Cli, poll_interval_ms: u64) -> Result<(), LogTrailError> {
    let mut manager = TailManager::new();
    manager.start_tail(session, poll_interval_ms);

    let Some(rx) = manager.progress_rx.take() else {
        return Ok(());
    };

    for msg in rx {
        match msg {
            TailProgress::Started { file_count } => {
                tracing::debug!(files = file_count, "Following");
            }
            TailProgress::NewRecords {
                records,
                checkpoints,
            } => {
                if !print_records(records, cli) {
                    break;
                }
                if let Some(state) = &cli.state {
                    checkpoint_store::save(&checkpoints, state)?;
                }
            }
            TailProgress::FileError { path, message } => {
                eprintln!("warning: {}: {message}", path.display());
            }
            TailProgress::Stopped => break,
        }
    }

    manager.stop_tail();
    Ok(())
}

/// Print a batch. Returns `false` once stdout is closed (e.g. `| head`).
fn print_records(mut records: Vec<LogRecord>, cli: &Cli) -> bool {
    if cli.merge {
        tail::merge_by_timestamp(&mut records);
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let result = records
        .iter()
        .try_for_each(|record| write_record(&mut out, record, cli.json))
        .and_then(|()| out.flush());

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Output closed");
            false
        }
    }
}

fn write_record(out: &mut impl Write, record: &LogRecord, json: bool) -> io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, record)?;
        return writeln!(out);
    }

    let timestamp = record
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".to_string());
    write!(out, "{}:{} {timestamp}", record.file_name, record.line_number)?;
    for (name, value) in &record.fields {
        write!(out, " {name}={value}")?;
    }
    writeln!(out, " {}", record.message)
}
