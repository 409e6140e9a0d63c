pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod render;
pub mod storage;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use crate::board::TaskBoard;
use crate::cli::Command;
use crate::datetime::{Calendar, SystemClock};
use crate::storage::JsonFileStorage;
use crate::store::TaskStore;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args);
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting taskboard");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let policy = cfg.delete_policy()?;
    let default_tab = cfg.default_tab()?;
    let calendar = Calendar::resolve(cfg.timezone().as_deref());

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;
    let storage = JsonFileStorage::open(&data_dir, &cfg.storage_key())
        .with_context(|| format!("failed to open task storage at {}", data_dir.display()))?;

    let store = TaskStore::load(storage, SystemClock, policy);
    let mut board = TaskBoard::new(store, calendar, default_tab);
    let renderer = render::Renderer::new(&cfg);

    let command = cli.command.unwrap_or(Command::List {
        tab: None,
        completed: false,
    });
    commands::dispatch(&mut board, &cfg, &renderer, command)?;

    info!("done");
    Ok(())
}
