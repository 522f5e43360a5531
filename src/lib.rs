//! LinkVault - content-addressed deduplication via hard links.
//!
//! Every distinct payload found under the source roots is moved once into a
//! master library at `<library>/<digest[0..2]>/<digest>/<name>`, and every
//! copy is replaced with a hard link to that master. A later `cleanup` pass
//! removes masters that nothing outside the library links to any more.

pub mod actions;
pub mod cli;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod library;
pub mod logging;
pub mod progress;
pub mod prompt;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::Context;

use crate::actions::{CleanupAuditor, CleanupConfig, CleanupDecision, CleanupPrompt, CleanupReport};
use crate::cli::{CleanupArgs, Cli, Commands, DedupeArgs};
use crate::config::Config;
use crate::dedupe::{DedupEngine, EngineConfig, RunSummary};
use crate::error::ExitCode;
use crate::logging::LoggingError;
use crate::progress::Progress;
use crate::prompt::{AutoConfirm, TerminalPrompt};
use crate::signal::ShutdownHandler;

/// Run the application for parsed CLI arguments.
///
/// # Errors
///
/// Configuration, logging and run-aborting errors. Per-file failures are
/// reported through the returned [`ExitCode`] instead.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);

    match logging::init_logging(cli.verbose, cli.quiet, config.log_file.as_deref()) {
        Ok(()) => {}
        Err(LoggingError::AlreadyInitialized) => {
            log::debug!("Logger already installed, keeping it");
        }
        Err(e) => return Err(e.into()),
    }
    log::debug!(
        "linkvault {} (log level {})",
        env!("CARGO_PKG_VERSION"),
        logging::current_level_name()
    );

    let handler = signal::install_handler().context("cannot install Ctrl+C handler")?;

    let code = match &cli.command {
        Commands::Dedupe(args) => run_dedupe(&cli, args, &config, &handler)?,
        Commands::Cleanup(args) => run_cleanup(&cli, args, &config)?,
    };

    if config.pause_on_exit {
        if let Err(e) = prompt::pause_for_key() {
            log::debug!("Pause skipped: {}", e);
        }
    }

    Ok(code)
}

fn run_dedupe(
    cli: &Cli,
    args: &DedupeArgs,
    config: &Config,
    handler: &ShutdownHandler,
) -> anyhow::Result<ExitCode> {
    let library = config.library_root()?.to_path_buf();
    log::debug!(
        "Dedupe roots {:?} into {} with patterns {:?}",
        args.roots,
        library.display(),
        config.patterns
    );

    let engine_config = EngineConfig::new(library)
        .with_dry_run(cli.dry_run)
        .with_link_only(args.link_only)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(cli.quiet)));

    let mut engine = DedupEngine::new(engine_config);
    let summary = engine
        .run(&args.roots, &config.patterns)
        .context("deduplication aborted")?;

    if !cli.quiet {
        print_run_summary(&summary);
    }
    report_inconsistencies(&summary);

    Ok(dedupe_exit_code(&summary))
}

fn dedupe_exit_code(summary: &RunSummary) -> ExitCode {
    if summary.interrupted {
        ExitCode::Interrupted
    } else if summary.is_empty() {
        ExitCode::NothingToDo
    } else if summary.has_failures() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}

fn print_run_summary(summary: &RunSummary) {
    let prefix = if summary.dry_run { "[dry-run] " } else { "" };
    let saved_label = if summary.dry_run { "Projected savings:" } else { "Space saved:      " };

    println!("{prefix}Files found:      {}", summary.files_found);
    println!("{prefix}Files hashed:     {}", summary.files_hashed);
    println!("{prefix}New masters:      {}", summary.unique_masters);
    println!("{prefix}Deduplicated:     {}", summary.deduped_count);
    println!("{prefix}Already linked:   {}", summary.already_linked);
    println!("{prefix}{saved_label} {}", summary.space_saved_display());

    if summary.hash_failures > 0 {
        println!("{prefix}Unreadable files: {}", summary.hash_failures);
    }
    if !summary.scan_errors.is_empty() {
        println!("{prefix}Scan errors:      {}", summary.scan_errors.len());
    }
    if !summary.failures.is_empty() {
        println!("{prefix}Failures:         {}", summary.failures.len());
        for failure in &summary.failures {
            println!("  {}: {} ({})", failure.kind, failure.path.display(), failure.message);
        }
    }
    if !summary.orphaned_backups.is_empty() {
        println!("Backups left behind (safe to delete once verified):");
        for backup in &summary.orphaned_backups {
            println!("  {}", backup.display());
        }
    }
    if summary.interrupted {
        println!("Interrupted; remaining files were not processed.");
    }
    println!("Completed in {:.2?}", summary.duration);
}

fn report_inconsistencies(summary: &RunSummary) {
    if summary.inconsistencies.is_empty() {
        return;
    }
    eprintln!(
        "WARNING: {} path(s) could not be restored and need manual attention:",
        summary.inconsistencies.len()
    );
    for path in &summary.inconsistencies {
        eprintln!("  {}", path.display());
    }
}

fn run_cleanup(cli: &Cli, args: &CleanupArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let library = config.library_root()?.to_path_buf();

    let cleanup_config = CleanupConfig::new(library)
        .with_dry_run(cli.dry_run)
        .with_trash(config.use_trash)
        .with_progress_callback(Arc::new(Progress::new(cli.quiet)));
    let auditor = CleanupAuditor::new(cleanup_config);

    let mut auto = AutoConfirm;
    let mut terminal;
    let prompt: &mut dyn CleanupPrompt = if args.yes {
        &mut auto
    } else {
        terminal = TerminalPrompt::stdio();
        &mut terminal
    };

    let report = auditor.run(prompt).context("cleanup failed")?;

    if !cli.quiet {
        print_cleanup_report(&report);
    }

    Ok(cleanup_exit_code(&report))
}

fn cleanup_exit_code(report: &CleanupReport) -> ExitCode {
    match report.decision {
        CleanupDecision::NothingToDo => ExitCode::NothingToDo,
        CleanupDecision::Cancelled => ExitCode::Success,
        CleanupDecision::Deleted if report.deleted.all_succeeded() => ExitCode::Success,
        CleanupDecision::Deleted => ExitCode::PartialSuccess,
    }
}

fn print_cleanup_report(report: &CleanupReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    if !report.audit.unknown.is_empty() {
        println!(
            "{prefix}Skipped {} file(s) whose link count could not be read",
            report.audit.unknown.len()
        );
    }

    match report.decision {
        CleanupDecision::NothingToDo => println!("{prefix}No unreferenced files in the library."),
        CleanupDecision::Cancelled => println!("{prefix}Cleanup cancelled; nothing was deleted."),
        CleanupDecision::Deleted => {
            let verb = if report.dry_run { "Would delete" } else { "Deleted" };
            println!(
                "{prefix}{verb} {} file(s), {}",
                report.deleted.success_count(),
                bytesize::ByteSize(report.deleted.bytes_freed)
            );
            if report.pruned_folders > 0 {
                println!("{prefix}Removed {} empty folder(s)", report.pruned_folders);
            }
            for (path, message) in &report.deleted.failures {
                println!("  failed: {} ({})", path.display(), message);
            }
        }
    }
}
