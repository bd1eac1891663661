//! oi - a task-runner scaffold
//!
//! oi turns modules (named collections of tasks) into a command-line
//! interface, and discovers more modules from plugins at startup.

pub mod cli;
pub mod config;
pub mod logging;
pub mod module;
pub mod plugin;

pub use module::{ActionSpec, Module, ModuleConfig, Registry};
pub use plugin::PluginScanner;
