//! Bridges modules and clap
//!
//! [`ClapBuilder`] is the [`CommandBuilder`] modules register their
//! subcommands with; [`dispatch`] walks parsed matches back down the module
//! tree to the selected leaf.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use serde_json::Value;

use crate::module::{Argv, CommandBuilder, ConfigurationError, Module};

/// Id of the free-form argument list of a command with a handler
pub const ARGS_ID: &str = "args";

/// Builds the clap command for one module
pub struct ClapBuilder {
    command: Command,
}

impl ClapBuilder {
    pub fn new(module: &Module) -> Self {
        Self {
            command: Command::new(module.command().to_string()).about(module.describe().to_string()),
        }
    }

    /// The full clap command tree for a module
    pub fn module_command(module: &Arc<Module>) -> Result<Command, ConfigurationError> {
        let mut builder = Self::new(module);
        module.build(&mut builder)?;

        if module.has_handler() {
            let mut command = builder.command.arg(
                Arg::new(ARGS_ID)
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true)
                    .value_name("ARGS")
                    .help("Arguments and --flags passed to the task"),
            );
            if module.is_dispatch() {
                command = command.args_conflicts_with_subcommands(true);
            }
            builder.command = command;
        }

        Ok(builder.command)
    }
}

impl CommandBuilder for ClapBuilder {
    fn command(&mut self, module: Arc<Module>) -> Result<(), ConfigurationError> {
        let subcommand = Self::module_command(&module)?;
        self.command = std::mem::take(&mut self.command).subcommand(subcommand);
        Ok(())
    }

    fn demand_subcommand(&mut self) {
        // clap already rejects unknown flags
        self.command = std::mem::take(&mut self.command)
            .subcommand_required(true)
            .arg_required_else_help(true);
    }
}

/// Runs the module selected by `matches`, descending through subcommands
pub fn dispatch(module: &Arc<Module>, matches: &ArgMatches) -> Result<Value> {
    if let Some((name, sub_matches)) = matches.subcommand() {
        let child = module
            .submodules()?
            .into_iter()
            .find(|child| child.command() == name)
            .ok_or_else(|| anyhow!("Unknown subcommand '{}' for '{}'", name, module.command()))?;
        return dispatch(&child, sub_matches);
    }

    let tokens: Vec<String> = matches
        .try_get_many::<String>(ARGS_ID)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    module.invoke(&Argv::parse(module.command(), tokens))
}
