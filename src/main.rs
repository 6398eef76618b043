//! aotwasm CLI entry point.
//!
//! Build-side tooling for precompiled modules: fingerprint `.wasm` files,
//! write and inspect metadata views, and check that the modules a host
//! bundles still match the checksums they were compiled from.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aotwasm_common::ConfigFile;
use aotwasm_core::{Checksum, ModuleMetadataView, compute_file_checksum};

#[derive(Debug, Parser)]
#[command(name = "aotwasm", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the checksum of each file.
    Checksum {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write or inspect metadata views.
    #[command(subcommand)]
    Metadata(MetadataCommand),
    /// Check configured modules against their expected checksums.
    Verify {
        #[arg(long, short, env = "AOTWASM_CONFIG")]
        config: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum MetadataCommand {
    /// Write a metadata view for a `.wasm` file.
    Encode {
        /// Registry name of the module.
        #[arg(long)]
        name: String,
        input: PathBuf,
        /// Defaults to the input path with a `.meta` extension.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the contents of a metadata view.
    Decode {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct DecodedView<'a> {
    version: u8,
    name: &'a str,
    checksum: &'a str,
}

fn main() -> ExitCode {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aotwasm=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Checksum { files } => checksum(&files),
        Command::Metadata(MetadataCommand::Encode {
            name,
            input,
            output,
        }) => encode(&name, &input, output),
        Command::Metadata(MetadataCommand::Decode { input, json }) => decode(&input, json),
        Command::Verify { config } => verify(&config),
    }
}

fn checksum(files: &[PathBuf]) -> anyhow::Result<()> {
    for file in files {
        let checksum = compute_file_checksum(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{checksum}  {}", file.display());
    }
    Ok(())
}

fn encode(name: &str, input: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let checksum = compute_file_checksum(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let view = ModuleMetadataView::encode(name, &checksum)?;

    let output = output.unwrap_or_else(|| input.with_extension("meta"));
    std::fs::write(&output, &view)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        module = name,
        checksum = %checksum,
        output = %output.display(),
        "Metadata view written"
    );
    println!("{}", output.display());

    Ok(())
}

fn decode(input: &Path, json: bool) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let view = ModuleMetadataView::decode(&bytes)
        .with_context(|| format!("{} is not a metadata view", input.display()))?;

    if json {
        let decoded = DecodedView {
            version: view.version(),
            name: view.name(),
            checksum: view.checksum().as_str(),
        };
        println!("{}", serde_json::to_string_pretty(&decoded)?);
    } else {
        println!("name:     {}", view.name());
        println!("version:  {}", view.version());
        println!("checksum: {}", view.checksum());
    }

    Ok(())
}

fn verify(config_path: &Path) -> anyhow::Result<()> {
    let config = ConfigFile::from_file(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    debug!(modules = config.modules.len(), "Configuration loaded");

    let mut stale = Vec::new();
    for module in &config.modules {
        let path = ConfigFile::resolve_path(config_path, module);
        let actual = compute_file_checksum(&path).with_context(|| {
            format!(
                "Failed to read module '{}' at {}",
                module.name,
                path.display()
            )
        })?;

        let Some(expected) = &module.checksum else {
            println!("{}  {actual}  (no expected checksum)", module.name);
            continue;
        };
        let expected = Checksum::from_hex(expected)
            .with_context(|| format!("Module '{}' has an invalid checksum", module.name))?;

        if expected == actual {
            println!("{}  {actual}  ok", module.name);
        } else {
            warn!(
                module = %module.name,
                expected = %expected,
                actual = %actual,
                "Module checksum mismatch"
            );
            println!("{}  {actual}  STALE (expected {expected})", module.name);
            stale.push(module.name.as_str());
        }
    }

    if !stale.is_empty() {
        bail!(
            "{} module(s) changed since they were precompiled: {}. Perhaps you forgot to rebuild the project?",
            stale.len(),
            stale.join(", ")
        );
    }

    info!(modules = config.modules.len(), "All modules verified");

    Ok(())
}
