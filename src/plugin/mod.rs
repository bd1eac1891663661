//! # Plugin System
//!
//! Discovers third-party modules at startup.
//!
//! ## Overview
//!
//! Plugins are separate executables that communicate with oi via JSON over
//! stdin/stdout, so any language can implement one. A plugin exports a module
//! under the `oi:module` extension point of its manifest; the scanner turns
//! each export into a [`ModuleConfig`](crate::module::ModuleConfig) that is
//! registered next to the built-in modules.
//!
//! ## Plugin Discovery
//!
//! Executables named `oi-{name}` are discovered in:
//! 1. `.oi/plugins/` - Project-local plugins
//! 2. `<data_dir>/oi/plugins/` - User plugins
//! 3. `$PATH` - System-wide plugins
//! 4. Paths from `--plugin-path` and configuration
//!
//! and in the `@oi/` subdirectory of each of those.
//!
//! ## Protocol
//!
//! ```text
//! CLI                          Plugin Binary
//!  │                               │
//!  ├── Spawn: oi-docker --manifest │
//!  │   Stdout: {"name": "oi-docker", "provides": {"oi:module": {...}}}
//!  │                               │
//!  ├── Spawn: oi-docker            │
//!  ├── Stdin: {"operation": "invoke", "params": {"module": "docker", "task": "build", "args": [...]}}
//!  │                               │
//!  └── Stdout: {"success": true, "data": {...}}
//! ```
//!
//! ## Key Types
//!
//! - [`PluginScanner`] - Runs discovery and converts exports into modules
//! - [`Discovery`] - Seam for discovery mechanisms
//! - [`PluginManager`] - Default discovery over plugin executables
//! - [`PluginManifest`] - Declares what a plugin provides

mod discovery;
mod export;
mod manager;
mod protocol;
mod scanner;

pub use discovery::{ConnectCallback, ConnectOptions, Discovery, DiscoveryError, Registration};
pub use export::{plug_module, ActionExport, ExportObject, ModuleExport};
pub use manager::{execute, PluginInfo, PluginManager, PLUGIN_PREFIX};
pub use protocol::{PluginManifest, PluginRequest, PluginResponse};
pub use scanner::{expand_vendor_dirs, PlugFn, PluginScanner, SearchPaths, EXTENSION_POINT, VENDOR_DIR};
