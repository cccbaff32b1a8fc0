use clap::{Parser, Subcommand};
use clap_markdown::help_markdown;
use std::path::PathBuf;

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

fn parse_preload(value: &str) -> Result<(PathBuf, String), String> {
    match value.split_once('=') {
        Some((host, guest)) if !host.is_empty() && !guest.is_empty() => {
            Ok((PathBuf::from(host), guest.to_string()))
        }
        _ => Err(format!("expected HOST=GUEST, got `{value}`")),
    }
}

fn main() {
    // Print header
    println!("# wasm-fs CLI Reference");
    println!();
    println!("This page contains the auto-generated reference documentation for the `wasm-fs` command-line interface.");
    println!();

    // Generate and print the markdown using the type parameter
    println!("{}", help_markdown::<Cli>());
}
