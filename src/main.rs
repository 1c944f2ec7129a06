mod access;
mod cli;
mod commands;
mod config;
mod output;
mod paths;
mod progress;
mod ui;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        config_path: cli.config,
    };

    let result = match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "plexshare", &mut io::stdout());
            return ExitCode::SUCCESS;
        }
        Command::Share(args) => commands::share::run(&ctx, args),
        Command::Remove(args) => commands::remove::run(&ctx, args),
        Command::Invites => commands::invites::run(&ctx),
        Command::InviteStatus { user } => commands::invite_status::run(&ctx, &user),
        Command::Stats => commands::stats::run(&ctx),
        Command::Resources => commands::resources::run(&ctx),
        Command::LastWatched => commands::watched::run(&ctx),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
    };

    // A structured record on stdout means the command ran; exit 1 is kept
    // for failures that happen before one can be produced.
    let (document, code) = match result {
        Ok(document) => (document, ExitCode::SUCCESS),
        Err(e) => {
            log::error!("{e:#}");
            (output::error(&e), ExitCode::FAILURE)
        }
    };

    if let Err(e) = output::print(&document) {
        ui::error(&format!("Failed to write output: {e}"));
        return ExitCode::FAILURE;
    }
    code
}
