//! # Command-Line Interface
//!
//! Builds the `oi` command tree from the module registry and dispatches to
//! the selected module.
//!
//! ## Startup
//!
//! 1. Options before the command are read (`--plugin-path`, `--no-plugins`,
//!    `--format`, `--verbose`)
//! 2. Configuration is loaded from `.oi/config.toml` and the global config
//! 3. Plugins are discovered and their modules registered
//! 4. The built-in `plugins` module is registered
//! 5. Every registered module becomes a subcommand; argv is parsed and the
//!    selected leaf runs through its task hooks
//!
//! ## Output Formats
//!
//! `--format text` (default) prints one report line per task;
//! `--format json` prints reports and task results as JSON lines.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod builder;
mod output;
mod plugin_cmd;

pub use app::{run, run_with, Cli, GlobalArgs};
pub use builder::{dispatch, ClapBuilder, ARGS_ID};
pub use output::{Output, OutputFormat};
pub use plugin_cmd::PLUGINS_COMMAND;
