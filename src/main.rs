mod config;
mod constant_pool;
mod descriptor;
mod error;
mod ir;
mod opcodes;
mod reader;
mod report;
mod scan;
mod sink;
mod transform;
mod writer;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde_json::Value;

use crate::config::{Properties, TransformerContext, builtin, fallback_identifier};
use crate::report::{build_invocation, build_sarif};
use crate::scan::transform_inputs;
use crate::transform::Transformer;
use crate::transform::expect_platform::ExpectPlatform;

/// CLI arguments for platformer execution.
#[derive(Parser, Debug)]
#[command(
    name = "platformer",
    about = "Rewrites @ExpectPlatform methods in JVM classes and JAR files for one platform.",
    version
)]
struct Cli {
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
    /// JSON object of context properties.
    #[arg(long, value_name = "PATH")]
    properties: Option<PathBuf>,
    #[arg(long, value_name = "NAME")]
    platform_name: Option<String>,
    #[arg(long, value_name = "PACKAGE")]
    platform_package: Option<String>,
    #[arg(long, value_name = "ID")]
    unique_identifier: Option<String>,
    /// Write a SARIF log of reported problems; `-` for stdout.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("input not found: {}", cli.input.display());
    }

    let started_at = Instant::now();
    let context = build_context(&cli)?;
    let transformers = build_transformers(&cli);
    let output = transform_inputs(&cli.input, &cli.output, &transformers, &context)?;
    let diagnostics = context.into_diagnostics();

    if let Some(path) = cli.report.as_deref() {
        let rules: Vec<_> = transformers
            .iter()
            .map(|transformer| transformer.metadata())
            .collect();
        let sarif = build_sarif(&rules, &diagnostics, build_invocation(true));
        let mut writer = output_writer(path)?;
        serde_json::to_writer_pretty(&mut writer, &sarif)
            .context("failed to serialize SARIF output")?;
        writer
            .write_all(b"\n")
            .context("failed to write SARIF output")?;
    }

    if !cli.quiet {
        info!(
            "classes={} rewritten={} diagnostics={}",
            output.class_count,
            output.rewritten_count,
            diagnostics.len()
        );
        if !diagnostics.is_empty() {
            warn!("{} method(s) could not be rewritten", diagnostics.len());
        }
    }

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} classes={} rewritten={}",
            started_at.elapsed().as_millis(),
            output.class_count,
            output.rewritten_count
        );
    }

    Ok(())
}

fn build_context(cli: &Cli) -> Result<TransformerContext> {
    let mut properties = match cli.properties.as_deref() {
        Some(path) => Properties::load(path)?,
        None => Properties::default(),
    };
    if let Some(name) = &cli.platform_name {
        properties.set(builtin::PLATFORM_NAME, name.as_str());
    }
    Ok(TransformerContext::new(
        properties,
        fallback_identifier(&cli.input),
    ))
}

fn build_transformers(cli: &Cli) -> Vec<Box<dyn Transformer>> {
    let mut own = serde_json::Map::new();
    if let Some(package) = &cli.platform_package {
        own.insert(
            builtin::PLATFORM_PACKAGE.to_string(),
            Value::String(package.clone()),
        );
    }
    if let Some(id) = &cli.unique_identifier {
        own.insert(
            builtin::UNIQUE_IDENTIFIER.to_string(),
            Value::String(id.clone()),
        );
    }

    let mut expect_platform = ExpectPlatform::default();
    expect_platform.supply_properties(&Value::Object(own));
    vec![Box::new(expect_platform)]
}

fn output_writer(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdout()));
    }
    Ok(Box::new(
        File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
    ))
}
