//! collie-site - builds Collie template partials and serves the site.

mod build;
mod check;
mod cli;
mod compiler;
mod config;
mod loader;
mod logger;
mod serve;
mod utils;
mod watch;

use anyhow::Result;
use build::build_site;
use check::check_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use serve::serve_site;
use std::process::ExitCode;

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|info| {
        log!("error"; "unexpected panic: {info}");
    }));

    match run() {
        Ok(code) => code,
        Err(err) => {
            log!("error"; "{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(SiteConfig::load(cli)?));

    match &cli.command {
        Commands::Build => {
            let report = build_site(config)?;
            Ok(exit_code(report.is_success()))
        }
        Commands::Serve { .. } => {
            let report = build_site(config)?;
            if !report.is_success() {
                log!("warn"; "serving with {} failed partials", report.failed.len());
            }
            serve_site(config, report.owners())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let report = check_site(config)?;
            Ok(exit_code(report.abandoned() == 0))
        }
    }
}

const fn exit_code(success: bool) -> ExitCode {
    if success { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
