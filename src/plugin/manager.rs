//! Executable plugin discovery and execution
//!
//! Plugins are executables whose file name starts with `oi-`. They are
//! discovered from:
//! 1. `.oi/plugins/` in the current directory
//! 2. The user data directory (`<data_dir>/oi/plugins`)
//! 3. PATH
//!
//! plus whatever the scanner adds.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::{debug, warn};

use super::discovery::{ConnectCallback, ConnectOptions, Discovery, DiscoveryError, Registration};
use super::protocol::{PluginManifest, PluginRequest, PluginResponse};

/// File name prefix of plugin executables
pub const PLUGIN_PREFIX: &str = "oi-";

/// Information about a discovered plugin
#[derive(Debug, Clone)]
pub struct PluginInfo {
    /// Plugin name
    pub name: String,

    /// Path to the plugin executable
    pub path: PathBuf,

    /// Plugin manifest (loaded on demand)
    pub manifest: Option<PluginManifest>,
}

/// Default [`Discovery`]: finds plugin executables and reads their manifests
pub struct PluginManager {
    /// Discovered plugins, by name
    plugins: BTreeMap<String, PluginInfo>,

    /// Errors hit while scanning, reported on the next connect
    scan_errors: Vec<DiscoveryError>,

    default_paths: Vec<PathBuf>,
}

impl PluginManager {
    /// Creates a manager searching the standard locations by default
    pub fn new() -> Self {
        Self::with_default_paths(Self::standard_paths())
    }

    /// Creates a manager with explicit default paths
    pub fn with_default_paths(default_paths: Vec<PathBuf>) -> Self {
        Self {
            plugins: BTreeMap::new(),
            scan_errors: Vec::new(),
            default_paths,
        }
    }

    /// Project-local, user and PATH locations
    pub fn standard_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".oi").join("plugins")];

        if let Some(dirs) = ProjectDirs::from("dev", "oi", "oi") {
            paths.push(dirs.data_dir().join("plugins"));
        }

        if let Some(path_var) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&path_var));
        }

        paths
    }

    /// Scans a directory for plugins
    fn scan_directory(&mut self, dir: &Path) {
        if !dir.is_dir() {
            return;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(source) => {
                self.scan_errors.push(DiscoveryError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(PLUGIN_PREFIX) && is_executable(&path) {
                    // First found wins
                    if !self.plugins.contains_key(name) {
                        debug!(plugin = name, path = %path.display(), "Found plugin");
                        self.plugins.insert(
                            name.to_string(),
                            PluginInfo {
                                name: name.to_string(),
                                path,
                                manifest: None,
                            },
                        );
                    }
                }
            }
        }
    }

    /// Loads manifests not loaded yet. A plugin that cannot produce a
    /// parsable manifest is dropped with a warning.
    fn load_manifests(&mut self) {
        let mut unusable = Vec::new();

        for info in self.plugins.values_mut() {
            if info.manifest.is_some() {
                continue;
            }
            match run_manifest(&info.path) {
                Ok(manifest) => info.manifest = Some(manifest),
                Err(e) => {
                    warn!(plugin = %info.name, "Skipping plugin: {:#}", e);
                    unusable.push(info.name.clone());
                }
            }
        }

        for name in unusable {
            self.plugins.remove(&name);
        }
    }

    fn registrations(&mut self, extension_point: &str, options: ConnectOptions) -> Result<Vec<Registration>, DiscoveryError> {
        if let Some(error) = self.scan_errors.drain(..).next() {
            return Err(error);
        }
        self.load_manifests();

        let mut found = Vec::new();
        for info in self.plugins.values() {
            let export = info.manifest.as_ref().and_then(|m| m.export(extension_point));
            if let Some(export) = export {
                found.push(Registration {
                    name: info.name.clone(),
                    path: info.path.clone(),
                    export: export.clone(),
                });
                if !options.multi {
                    break;
                }
            }
        }
        Ok(found)
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Discovery for PluginManager {
    fn default_paths(&self) -> Vec<PathBuf> {
        self.default_paths.clone()
    }

    fn scan(&mut self, paths: &[PathBuf]) {
        self.plugins.clear();
        self.scan_errors.clear();
        for dir in paths {
            self.scan_directory(dir);
        }
    }

    fn connect(&mut self, extension_point: &str, options: ConnectOptions, callback: ConnectCallback<'_>) {
        callback(self.registrations(extension_point, options));
    }
}

/// Checks if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.is_file() && meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return ext == "exe" || ext == "bat" || ext == "cmd";
        }
    }

    false
}

/// Runs `<plugin> --manifest` and parses what it prints
fn run_manifest(path: &Path) -> Result<PluginManifest> {
    let output = Command::new(path)
        .arg("--manifest")
        .output()
        .with_context(|| format!("Failed to execute plugin: {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Plugin returned error: {}", stderr.trim());
    }

    serde_json::from_slice(&output.stdout).context("Invalid plugin manifest")
}

/// Sends one request to a plugin and reads its single-line response
pub fn execute(path: &Path, request: &PluginRequest) -> Result<PluginResponse> {
    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("Failed to spawn plugin: {}", path.display()))?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to open plugin stdin"))?;
        let request_json = serde_json::to_string(request).context("Failed to serialize request")?;
        writeln!(stdin, "{}", request_json).context("Failed to write to plugin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to open plugin stdout"))?;
    let reader = BufReader::new(stdout);

    let response_line = reader
        .lines()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No response from plugin: {}", path.display()))?
        .context("Failed to read plugin response")?;

    let response: PluginResponse =
        serde_json::from_str(&response_line).context("Failed to parse plugin response")?;

    match child.wait() {
        Ok(status) if !status.success() => {
            debug!(plugin = %path.display(), %status, "Plugin exited unsuccessfully after responding");
        }
        Ok(_) => {}
        Err(e) => debug!(plugin = %path.display(), "Failed to wait for plugin: {}", e),
    }

    Ok(response)
}
