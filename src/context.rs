// File: ./src/context.rs
//! Where the converter looks for its configuration file.
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

pub trait AppContext: std::fmt::Debug {
    /// Directory holding `config.toml`. Need not exist.
    fn config_dir(&self) -> Result<PathBuf>;

    fn config_path(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join(CONFIG_FILE_NAME))
    }
}

/// Platform config directory, or `<root>/config` when `--root` was given.
#[derive(Clone, Debug, Default)]
pub struct StandardContext {
    root: Option<PathBuf>,
}

impl StandardContext {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl AppContext for StandardContext {
    fn config_dir(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.join("config")),
            None => ProjectDirs::from("org", "ical2org", "ical2org")
                .map(|dirs| dirs.config_dir().to_path_buf())
                .context("Could not determine a home directory for the config file"),
        }
    }
}

/// Scratch directory under the system temp dir, deleted on drop.
#[derive(Debug)]
pub struct TestContext {
    dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("ical2org-{}", uuid::Uuid::new_v4()));
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `contents` as the config file this context points at.
    pub fn write_config(&self, contents: &str) -> Result<PathBuf> {
        let path = self.config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn config_dir(&self) -> Result<PathBuf> {
        Ok(self.dir.join("config"))
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
