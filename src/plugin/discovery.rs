//! The seam between the scanner and whatever finds plugins

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read plugin directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin {plugin} exports an unusable module: {message}")]
    Export { plugin: String, message: String },
}

/// A plugin export found under an extension point
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Plugin name (the executable's file name)
    pub name: String,

    /// Path to the plugin executable
    pub path: PathBuf,

    /// The exported value, shape left to the consumer
    pub export: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Return every match instead of the first
    pub multi: bool,
}

/// Receives the outcome of [`Discovery::connect`], exactly once
pub type ConnectCallback<'a> = Box<dyn FnOnce(Result<Vec<Registration>, DiscoveryError>) + 'a>;

/// A plugin discovery mechanism
pub trait Discovery {
    /// Paths searched before any caller-supplied ones
    fn default_paths(&self) -> Vec<PathBuf>;

    /// Indexes the plugins found in `paths`
    fn scan(&mut self, paths: &[PathBuf]);

    /// Looks up every indexed plugin exporting `extension_point`
    fn connect(&mut self, extension_point: &str, options: ConnectOptions, callback: ConnectCallback<'_>);
}
