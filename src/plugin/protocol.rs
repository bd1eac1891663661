//! Plugin protocol types
//!
//! Plugins communicate via JSON messages over stdin/stdout.
//! Each plugin must support the `--manifest` flag to declare what it provides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Plugin manifest declaring capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name (e.g., "oi-docker")
    pub name: String,

    /// Plugin version
    #[serde(default)]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Exports keyed by extension point (e.g., "oi:module")
    #[serde(default)]
    pub provides: BTreeMap<String, serde_json::Value>,
}

impl PluginManifest {
    /// The export placed under an extension point, if any
    pub fn export(&self, extension_point: &str) -> Option<&serde_json::Value> {
        self.provides.get(extension_point)
    }
}

/// A message sent to a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The operation to perform
    pub operation: String,

    /// Operation-specific parameters
    pub params: serde_json::Value,
}

impl PluginRequest {
    pub fn new(operation: impl Into<String>, params: impl Into<serde_json::Value>) -> Self {
        Self {
            operation: operation.into(),
            params: params.into(),
        }
    }

    /// Request to run one task of a plugin module
    pub fn invoke(module: &str, task: &str, args: &[serde_json::Value]) -> Self {
        Self::new(
            "invoke",
            serde_json::json!({
                "module": module,
                "task": task,
                "args": args,
            }),
        )
    }
}

/// A response from a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Whether the operation succeeded
    pub success: bool,

    /// Result data (if success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message (if failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
