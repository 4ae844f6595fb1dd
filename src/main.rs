mod cli;
mod commands;
mod config;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

use crate::config::Config;
use crate::state::StateFile;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    config: Option<PathBuf>,
    state: Option<PathBuf>,
}

impl Context {
    /// Config file path, from `--config` or the default location
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::default_config_path(),
        }
    }

    /// State file path, from `--state` or the default location
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state {
            Some(path) => Ok(path.clone()),
            None => StateFile::default_path(),
        }
    }

    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path()?)
    }
}

fn main() -> Result<()> {
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
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, args.dry_run, args.jobs),
        Command::Refresh => commands::refresh::run(&ctx),
        Command::Destroy { username } => commands::destroy::run(&ctx, username.as_deref()),
        Command::Import { username } => commands::import::run(&ctx, &username),
        Command::Status => commands::status::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "esuser", &mut io::stdout());
            Ok(())
        }
    }
}
