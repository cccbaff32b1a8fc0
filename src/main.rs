use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wasm_fs::logfs::{LogConfig, LogSink, LoggingFs, Payload, WriterSink};
use wasm_fs::memfs::MemFs;
use wasm_fs::script::{self, Call, Outcome, OutcomeFile, ScriptFormat};
use wasm_fs::sys::{FileSystem, OpenFlags};
use wasm_fs::sysfs::DirFs;

/// Run filesystem call scripts against pluggable WASI filesystem backends
#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
struct Cli {
    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a call script and print one outcome per call
    Run {
        /// Call script (extension determines format: .json or .cbor)
        script: PathBuf,
        /// Serve from this host directory instead of the in-memory backend
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Copy a host file into the backend before the script runs
        #[arg(long, value_name = "HOST=GUEST", value_parser = parse_preload)]
        preload: Vec<(PathBuf, String)>,
        /// Log every call to stderr (or to --log-file)
        #[arg(long)]
        log: bool,
        /// Include read and written bytes in the log instead of a placeholder
        #[arg(long)]
        log_bytes: bool,
        /// Write the call log to this file
        #[arg(long, value_name = "FILE")]
        log_file: Option<PathBuf>,
        /// Write outcomes here instead of stdout (extension determines format)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Fail unless the outcomes equal those stored in this file
        #[arg(long, value_name = "FILE")]
        expect: Option<PathBuf>,
        /// Script format (json or cbor). If not specified, inferred from file extension
        #[arg(
            short = 'f',
            long = "format",
            value_name = "FORMAT",
            value_parser = ["json", "cbor"]
        )]
        format: Option<String>,
    },
}

struct LogOptions {
    enabled: bool,
    bytes: bool,
    file: Option<PathBuf>,
}

fn parse_preload(value: &str) -> Result<(PathBuf, String), String> {
    match value.split_once('=') {
        Some((host, guest)) if !host.is_empty() && !guest.is_empty() => {
            Ok((PathBuf::from(host), guest.to_string()))
        }
        _ => Err(format!("expected HOST=GUEST, got `{value}`")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run {
            script,
            root,
            preload,
            log,
            log_bytes,
            log_file,
            output,
            expect,
            format,
        } => {
            let script_format = ScriptFormat::from_path_and_option(&script, format.as_deref())?;
            let calls = script::load_calls(&script, script_format)?;
            let log = LogOptions {
                enabled: log || log_bytes || log_file.is_some(),
                bytes: log_bytes,
                file: log_file,
            };

            let outcomes = match root {
                Some(root) => {
                    if !root.is_dir() {
                        bail!("root {} is not a directory", root.display());
                    }
                    let name = root.display().to_string();
                    run_on(DirFs::new(root), &name, &preload, &log, &calls)?
                }
                None => run_on(MemFs::new(), "memfs", &preload, &log, &calls)?,
            };

            match output {
                Some(path) => {
                    let out_format = ScriptFormat::from_path_and_option(&path, None)?;
                    script::save_outcomes(&path, out_format, &outcomes)?;
                }
                None => print_outcomes(&outcomes)?,
            }

            if let Some(path) = expect {
                check_expected(&path, &outcomes)?;
            }
            Ok(())
        }
    }
}

fn run_on<F: FileSystem>(
    fs: F,
    name: &str,
    preload: &[(PathBuf, String)],
    log: &LogOptions,
    calls: &[Call],
) -> Result<Vec<Outcome>> {
    for (host, guest) in preload {
        preload_file(&fs, host, guest)?;
    }

    if !log.enabled {
        return Ok(script::run(&fs, calls));
    }

    let sink: Arc<dyn LogSink> = match &log.file {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create log file at {}", path.display()))?;
            Arc::new(WriterSink::new(file))
        }
        None => Arc::new(WriterSink::new(std::io::stderr())),
    };
    let payload = if log.bytes {
        Payload::Raw
    } else {
        Payload::Redacted
    };
    let fs = LoggingFs::new(fs, LogConfig::new(name, sink).with_payload(payload));
    Ok(script::run(&fs, calls))
}

fn preload_file(fs: &dyn FileSystem, host: &Path, guest: &str) -> Result<()> {
    let data = fs::read(host)
        .with_context(|| format!("failed to read preload file at {}", host.display()))?;
    let flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
    let mut file = fs
        .open(guest, flags, 0o644)
        .with_context(|| format!("failed to create {guest} for preload"))?;

    let mut written = 0;
    while written < data.len() {
        let n = file
            .write(&data[written..])
            .with_context(|| format!("failed to write {guest} for preload"))?;
        if n == 0 {
            bail!("short write while preloading {guest}");
        }
        written += n;
    }
    file.close()
        .with_context(|| format!("failed to close {guest} after preload"))?;
    tracing::debug!(host = %host.display(), guest, bytes = data.len(), "preloaded file");
    Ok(())
}

fn print_outcomes(outcomes: &[Outcome]) -> Result<()> {
    let doc = OutcomeFile {
        outcomes: outcomes.to_vec(),
    };
    let text = serde_json::to_string_pretty(&doc).context("failed to serialize outcomes")?;
    println!("{text}");
    Ok(())
}

fn check_expected(path: &Path, outcomes: &[Outcome]) -> Result<()> {
    let format = ScriptFormat::from_path_and_option(path, None)?;
    let expected = script::load_outcomes(path, format)?;

    if let Some((index, (want, got))) = expected
        .iter()
        .zip(outcomes)
        .enumerate()
        .find(|(_, (want, got))| want != got)
    {
        bail!("outcome {index} differs: expected {want:?}, got {got:?}");
    }
    if expected.len() != outcomes.len() {
        bail!(
            "expected {} outcomes, got {}",
            expected.len(),
            outcomes.len()
        );
    }
    Ok(())
}
