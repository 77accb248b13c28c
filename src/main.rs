//! WSI Compositor - Cut annotated regions out of Whole Slide Images.
//!
//! This binary parses the configuration, sets up logging and runs the
//! three-stage pipeline.

use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_compositor::{
    config::Config,
    pipeline::{run_with, LevelCounts},
    resolve_level_selection,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("WSI Compositor v{}", env!("CARGO_PKG_VERSION"));
    info!("  Slide: {}", config.slide.display());
    info!("  Annotations: {}", config.annotations.display());
    info!("  Output: {}", config.output.display());
    info!("  Temp dir: {}", config.resolved_temp_dir().display());
    info!("  Compression: {:?}", config.compression);

    let interactive = config.levels.is_none() && std::io::stdin().is_terminal();
    let configured = config.levels.clone();

    let result = run_with(&config, |counts| {
        if interactive {
            prompt_levels(counts)
        } else {
            configured
        }
    })
    .await;

    match result {
        Ok(report) => {
            info!(
                "Wrote {} level(s) {:?} to {}",
                report.composite.levels_written.len(),
                report.composite.levels_written,
                report.output_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_compositor=debug"
    } else {
        "wsi_compositor=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Ask for a level selection on the terminal.
///
/// An empty answer (or end of input) selects every level. Answers that do
/// not parse or select nothing are asked again.
fn prompt_levels(counts: LevelCounts) -> Option<String> {
    let max_levels = counts.max_levels();
    let stdin = std::io::stdin();
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "Tissue pyramid levels: {}", counts.tissue);
    let _ = writeln!(stderr, "Mask pyramid levels:   {}", counts.mask);
    let _ = writeln!(stderr, "Common levels:         {} (0-{})", max_levels, max_levels - 1);

    loop {
        let _ = write!(stderr, "Levels to composite [all]: ");
        let _ = stderr.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let answer = line.trim();
        if answer.is_empty() {
            return None;
        }

        match resolve_level_selection(Some(answer), max_levels) {
            Ok(selection) if !selection.is_empty() => {
                let _ = writeln!(stderr, "Selected levels {}", selection);
                return Some(answer.to_string());
            }
            Ok(_) => {
                let _ = writeln!(stderr, "'{}' selects none of the {} levels", answer, max_levels);
            }
            Err(e) => {
                let _ = writeln!(stderr, "{}", e);
            }
        }
    }
}
