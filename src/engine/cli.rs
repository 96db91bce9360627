//! CLI command handlers: `run` drives a session, `worker` serves batches for a parent session.

use anyhow::{Context, Result};
use colored::Colorize;
use crossbeam_channel::bounded;
use log::{debug, info};
use std::path::PathBuf;
use std::time::Duration;

use crate::Config;
use crate::engine::arg_parser::{Cli, Commands, RunArgs};
use crate::engine::digest::DigestAnalyzerFactory;
use crate::engine::worker::serve_worker;
use crate::pipeline::{Collaborators, run};
use crate::utils::config::{Defaults, PackagePaths, WORKER_VERBOSE_ENV};
use crate::utils::porewatch_toml::{apply_file_to_config, load_porewatch_toml};
use crate::utils::{LogRole, prepare_output_dir, setup_logging, setup_logging_as};

pub fn handle_cli(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Worker => handle_worker(),
    }
}

/// Defaults → settings file → CLI flags, then normalize and validate.
pub fn build_config(args: &RunArgs) -> Result<Config> {
    let mut config = Config {
        analysis_start_delay: Duration::from_secs(Defaults::LIVE_ANALYSIS_DELAY_SECS),
        ..Config::default()
    };

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().settings_filename()));
    if let Some(file) = load_porewatch_toml(&settings_path) {
        debug!("Applying settings from {}", settings_path.display());
        apply_file_to_config(&file, &mut config);
    } else if args.config.is_some() {
        anyhow::bail!("Cannot load settings from {}", settings_path.display());
    }

    if let Some(ref p) = args.input {
        config.input_dir = p.clone();
    }
    if let Some(ref p) = args.output {
        config.output_dir = p.clone();
    }
    if let Some(n) = args.parallel {
        config.parallel = n;
    }
    if let Some(n) = args.batch_chunk {
        config.chunk_size = n;
    }
    if let Some(secs) = args.live_analysis_delay {
        config.analysis_start_delay = Duration::from_secs(secs);
    }
    if let Some(ref s) = args.suffix {
        config.suffix = s.clone();
    }
    config.live = args.live.unwrap_or(config.live);
    config.classify = args.classify.unwrap_or(config.classify);
    config.link_raw = args.link_raw.unwrap_or(config.link_raw);
    config.symlink_raw = args.symlink_raw.unwrap_or(config.symlink_raw);
    config.dump_parts = args.dump_parts.unwrap_or(config.dump_parts);
    config.quiet = args.quiet.unwrap_or(config.quiet);
    config.verbose = args.verbose.unwrap_or(config.verbose);
    if args.no_records {
        config.records_output = false;
    }

    let config = config.normalized();
    config.validate()?;
    Ok(config)
}

fn show_banner() {
    println!(
        "\n{} version {}\n- Batch analysis for growing directory trees\n",
        env!("CARGO_PKG_NAME").bold(),
        env!("CARGO_PKG_VERSION")
    );
}

/// Run a processing session. Fails when the session ended before every file was processed.
pub fn handle_run(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;
    setup_logging(config.verbose);
    if !config.quiet {
        show_banner();
    }

    prepare_output_dir(&config, args.yes)?;

    info!("Starting {} version {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    for line in config.describe() {
        info!("{}", line);
        if !config.quiet {
            println!("{}", line);
        }
    }

    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("set Ctrl+C handler")?;

    let collaborators = Collaborators::standard(&config)?.with_interrupt(interrupt_rx);
    match run(&config, collaborators) {
        Some(summary) => {
            if !config.quiet {
                summary.print_to(&mut std::io::stdout().lock())?;
            }
            summary.log();
            Ok(())
        }
        None => anyhow::bail!("session ended before all input files were processed"),
    }
}

/// Worker mode: serve batches from the parent over stdin/stdout until EOF.
pub fn handle_worker() -> Result<()> {
    let verbose = std::env::var_os(WORKER_VERBOSE_ENV).is_some();
    setup_logging_as(LogRole::Worker, verbose);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve_worker(stdin.lock(), stdout.lock(), &DigestAnalyzerFactory)
}
