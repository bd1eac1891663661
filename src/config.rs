//! Configuration handling for oi
//!
//! Configuration is stored in `.oi/config.toml` (project, found by walking
//! up from the current directory) and `~/.config/oi/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::OutputFormat;

/// Name of the per-project directory
pub const PROJECT_DIR: &str = ".oi";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Extra plugin search paths, relative to the project root
    pub plugin_paths: Vec<PathBuf>,

    /// Discover plugins at startup
    pub plugins_enabled: bool,

    /// Report every task's outcome and duration
    pub report: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            plugin_paths: Vec::new(),
            plugins_enabled: true,
            report: true,
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Extra plugin search paths for every project
    pub plugin_paths: Vec<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset (e.g. "info", "oi=debug")
    pub log_level: Option<String>,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        match Self::find_project_root() {
            Some(root) => Self::for_project(&root),
            None => Ok(Self {
                project: ProjectConfig::default(),
                global: Self::load_global()?,
                project_root: None,
            }),
        }
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "oi", "oi").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(PROJECT_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")
    }

    /// Finds the project root by looking for a `.oi/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Plugin search paths from configuration: global first, then project
    /// paths resolved against the project root. The project's
    /// `.oi/plugins` directory is included when in a project.
    pub fn plugin_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.global.plugin_paths.clone();

        if let Some(root) = &self.project_root {
            paths.push(root.join(PROJECT_DIR).join("plugins"));
            paths.extend(self.project.plugin_paths.iter().map(|p| root.join(p)));
        } else {
            paths.extend(self.project.plugin_paths.iter().cloned());
        }

        paths
    }
}
