// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the log file. The terminal belongs to the
/// dashboard, so nothing is ever written to stdout or stderr.
pub fn init(config: &Config) -> Result<PathBuf> {
    let path = config.log_path()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| {
            format!(
                "open log file {} -- set [logging].file to a writable path",
                path.display()
            )
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(config)?)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))?;
    Ok(path)
}

/// `RUST_LOG` wins over `[logging].level`.
fn filter_for(config: &Config) -> Result<EnvFilter> {
    match env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("RUST_LOG {directives:?} is not a valid filter")),
        _ => EnvFilter::try_new(config.log_level())
            .with_context(|| format!("logging.level {:?} is not a valid filter", config.log_level())),
    }
}
