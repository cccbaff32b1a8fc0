use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::call::{Call, Outcome};
use crate::util::cbor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Json,
    Cbor,
}

impl ScriptFormat {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(ScriptFormat::Json),
            "cbor" => Some(ScriptFormat::Cbor),
            _ => None,
        }
    }

    /// An explicit `--format` wins; otherwise the extension of `path` decides.
    pub fn from_path_and_option(path: &Path, format_opt: Option<&str>) -> Result<Self> {
        if let Some(name) = format_opt {
            return Self::from_name(name)
                .with_context(|| format!("unsupported script format `{name}`"));
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            bail!("{} has no extension to pick json or cbor from", path.display());
        };
        Self::from_name(ext).with_context(|| {
            format!("{} has unsupported extension .{ext}", path.display())
        })
    }
}

/// JSON layout of a call script. CBOR scripts are a bare sequence of calls.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub calls: Vec<Call>,
}

/// JSON layout of a run's outcomes. CBOR output is a bare sequence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutcomeFile {
    pub outcomes: Vec<Outcome>,
}

pub fn load_calls(path: &Path, format: ScriptFormat) -> Result<Vec<Call>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open script at {}", path.display()))?;
    let reader = BufReader::new(file);

    match format {
        ScriptFormat::Json => {
            let ScriptFile { calls } = serde_json::from_reader(reader)
                .with_context(|| format!("failed to parse JSON script at {}", path.display()))?;
            Ok(calls)
        }
        ScriptFormat::Cbor => cbor::read_sequence(reader)
            .map_err(|e| anyhow::Error::msg(format!("{}", e)))
            .with_context(|| format!("failed to parse CBOR script at {}", path.display())),
    }
}

pub fn load_outcomes(path: &Path, format: ScriptFormat) -> Result<Vec<Outcome>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open outcomes at {}", path.display()))?;
    let reader = BufReader::new(file);

    match format {
        ScriptFormat::Json => {
            let OutcomeFile { outcomes } = serde_json::from_reader(reader)
                .with_context(|| format!("failed to parse JSON outcomes at {}", path.display()))?;
            Ok(outcomes)
        }
        ScriptFormat::Cbor => cbor::read_sequence(reader)
            .map_err(|e| anyhow::Error::msg(format!("{}", e)))
            .with_context(|| format!("failed to parse CBOR outcomes at {}", path.display())),
    }
}

pub fn save_calls(path: &Path, format: ScriptFormat, calls: &[Call]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create script at {}", path.display()))?;

    match format {
        ScriptFormat::Json => {
            let script = ScriptFile {
                calls: calls.to_vec(),
            };
            serde_json::to_writer_pretty(file, &script)
                .with_context(|| format!("failed to write JSON script at {}", path.display()))
        }
        ScriptFormat::Cbor => cbor::write_sequence(BufWriter::new(file), calls)
            .with_context(|| format!("failed to write CBOR script at {}", path.display())),
    }
}

pub fn save_outcomes(path: &Path, format: ScriptFormat, outcomes: &[Outcome]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create outcomes file at {}", path.display()))?;

    match format {
        ScriptFormat::Json => {
            let doc = OutcomeFile {
                outcomes: outcomes.to_vec(),
            };
            serde_json::to_writer_pretty(file, &doc)
                .with_context(|| format!("failed to write JSON outcomes at {}", path.display()))
        }
        ScriptFormat::Cbor => cbor::write_sequence(BufWriter::new(file), outcomes)
            .with_context(|| format!("failed to write CBOR outcomes at {}", path.display())),
    }
}
