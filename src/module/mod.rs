//! # Modules
//!
//! A module is a named command node. It is either a leaf that runs one task,
//! or a dispatch table whose actions become subcommands.
//!
//! ## Shapes
//!
//! | Body | Built as | Example |
//! |------|----------|---------|
//! | [`ModuleBody::Actions`] | dispatch table (optional direct handler) | `oi db migrate` |
//! | [`ModuleBody::Handler`] | leaf | `oi build` |
//! | [`ModuleBody::Methods`] | dispatch table, one action per method | `oi git status` |
//!
//! ## Task protocol
//!
//! Every task runs through [`Module::run_task`]: `before_task` may veto
//! (the result is then `false`), the task runs, `after_task` sees the raw
//! result once, and the raw result is returned. Hooks are pluggable via
//! [`TaskHooks`].
//!
//! ## Key Types
//!
//! - [`ModuleConfig`] - Input to the adapter
//! - [`Module`] - Runnable command node
//! - [`Registry`] - Modules keyed by id
//! - [`Argv`] - Parsed arguments handed to a leaf

mod adapter;
mod argv;
mod hooks;
mod registry;
mod spec;

pub use adapter::{CommandBuilder, ConfigurationError, Module, Submodules, RESERVED_NAMES};
pub use argv::{Argv, POSITIONAL_KEY};
pub use hooks::{
    result_succeeded, LogReporter, QuietHooks, Reporter, ReportingHooks, TaskHooks, TaskReport,
};
pub use registry::Registry;
pub use spec::{task, ActionSpec, ModuleBody, ModuleConfig, TaskFn};
