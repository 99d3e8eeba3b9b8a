use anyhow::{Result, bail};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::context::FileStructContext;
use crate::walk::IgnoreWalker;

pub const LIBS_ENV: &str = "CLASS_STORE_LIBS";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub own_inputs: Vec<PathBuf>,
    pub library_inputs: Vec<PathBuf>,
    pub walk_directories: bool,
    pub log_filter: String,
}

impl Config {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        Self::resolve_with(cli, env::var_os(LIBS_ENV), env::var("RUST_LOG").ok())
    }

    pub fn resolve_with(
        cli: &Cli,
        env_libs: Option<OsString>,
        env_log: Option<String>,
    ) -> Result<Self> {
        if cli.paths.is_empty() {
            bail!("No input given, use --path to name a class file, archive or directory");
        }

        let mut library_inputs = cli.libs.clone();
        if let Some(libs) = env_libs {
            library_inputs.extend(env::split_paths(&libs).filter(|p| !p.as_os_str().is_empty()));
        }

        let log_filter = cli
            .log_level
            .clone()
            .or(env_log)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            own_inputs: cli.paths.clone(),
            library_inputs,
            walk_directories: !cli.no_walk,
            log_filter,
        })
    }

    pub fn new_context(&self) -> FileStructContext {
        if self.walk_directories {
            FileStructContext::with_walker(IgnoreWalker)
        } else {
            FileStructContext::new()
        }
    }

    /// Scans own inputs first, then libraries.
    pub fn load_context(&self) -> Result<FileStructContext> {
        let mut context = self.new_context();
        for path in &self.own_inputs {
            context.scan(path, true)?;
        }
        for path in &self.library_inputs {
            context.scan(path, false)?;
        }
        Ok(context)
    }
}
