//! The checkflow command-line interface.
//!
//! Each subcommand reads its inputs, drives the library and prints through
//! [`output`]. Failures are rendered as miette reports with exit status 1.

use std::{fs, path::Path, process};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{io_error, Config, OutputMode};
use crate::discovery::{discover_unit, read_input};
use crate::errors::{print_error, CheckflowError, PhaseContext, SourceContext};
use crate::expand::{Driver, Snapshot};
use crate::rewrite::rewrite;
use crate::types::Checker;
use crate::unit::Unit;

pub mod args;
pub mod output;

use args::{CheckflowArgs, Command};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CHECKFLOW_LOG";

/// The main entry point for the CLI.
pub fn run() {
    let args = CheckflowArgs::parse();
    init_logging(args.verbose);

    let config = Config::default().with_stubs(args.stubs.iter().cloned());
    let result = match args.command {
        Command::Expand { dir, stdout } => {
            let mode = if stdout { OutputMode::Stdout } else { OutputMode::Write };
            handle_expand(&dir, &config.with_output(mode))
        }
        Command::Rewrite { file, json } => handle_rewrite(&file, json),
        Command::Trace { dir } => handle_trace(&dir, &config),
        Command::Ast { file } => handle_ast(&file),
    };

    if let Err(error) = result {
        print_error(error);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(format!("checkflow={fallback}"))
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_expand(dir: &Path, config: &Config) -> Result<(), CheckflowError> {
    let mut unit = Unit::assemble(discover_unit(dir, config)?)?;
    let mut checker = Checker::new(config.load_stubs()?);
    let summary = Driver::new(&mut checker).run(&mut unit)?;

    for file in unit.marked_files() {
        let text = file.render();
        match config.output {
            OutputMode::Stdout => output::print_expanded(file.name(), &text),
            OutputMode::Write => {
                let path = file.output_path(&config.output_extension);
                fs::write(&path, text).map_err(|e| io_error(&path.display().to_string(), &e))?;
                info!(file = %path.display(), "wrote");
            }
        }
    }
    output::print_summary(&summary);
    Ok(())
}

fn handle_trace(dir: &Path, config: &Config) -> Result<(), CheckflowError> {
    let mut unit = Unit::assemble(discover_unit(dir, config)?)?;
    let mut checker = Checker::new(config.load_stubs()?);
    let original: Vec<(String, String)> = unit
        .marked_files()
        .map(|f| (f.name().to_string(), f.render()))
        .collect();

    let mut snapshots = Vec::new();
    let mut record = |snapshot: &Snapshot| snapshots.push(snapshot.clone());
    let result = Driver::new(&mut checker).with_observer(&mut record).run(&mut unit);

    // Partial traces are printed before the error.
    output::print_trace(&original, &snapshots);
    output::print_summary(&result?);
    Ok(())
}

fn handle_rewrite(file: &Path, as_json: bool) -> Result<(), CheckflowError> {
    let input = read_input(file, true)?;
    let source = SourceContext::from_file(file.display().to_string(), input.text.clone());
    let rewritten = rewrite(&input.text, &PhaseContext::new(source, "rewrite"))?;
    output::print_rewritten(&rewritten, as_json);
    Ok(())
}

fn handle_ast(file: &Path) -> Result<(), CheckflowError> {
    let input = read_input(file, true)?;
    let unit = Unit::assemble(vec![input])?;
    for file in &unit.files {
        println!("{:#?}", file.ast);
    }
    Ok(())
}

