//! Main CLI application structure

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Args, CommandFactory, Parser};
use tracing::warn;

use super::builder::{dispatch, ClapBuilder};
use super::output::{Output, OutputFormat};
use super::plugin_cmd;
use crate::config::Config;
use crate::logging;
use crate::module::{result_succeeded, Module, ModuleConfig, QuietHooks, Registry, ReportingHooks, TaskHooks};
use crate::plugin::PluginScanner;

/// Options accepted before the command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Output format
    #[arg(long, short = 'f')]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long)]
    pub verbose: bool,

    /// Extra directory to search for plugins (repeatable)
    #[arg(long = "plugin-path", env = "OI_PLUGIN_PATH", value_delimiter = ':')]
    pub plugin_paths: Vec<PathBuf>,

    /// Skip plugin discovery
    #[arg(long)]
    pub no_plugins: bool,
}

#[derive(Parser)]
#[command(name = "oi")]
#[command(author, version, about = "Runs tasks from built-in and plugin modules")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Reads the options needed before the module tree exists
#[derive(Parser, Default)]
#[command(name = "oi", disable_help_flag = true, disable_version_flag = true)]
struct Bootstrap {
    #[command(flatten)]
    global: GlobalArgs,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    rest: Vec<String>,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    run_with(Registry::global(), std::env::args_os())
}

/// Runs the CLI against `registry`: discovers plugins, registers them with
/// the built-in modules, then parses `args` and dispatches.
pub fn run_with<I, T>(registry: &Registry, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let global = Bootstrap::try_parse_from(&args).unwrap_or_default().global;

    let config = Config::load()?;
    let output = Output::new(
        global.format.unwrap_or(config.global.default_format),
        global.verbose,
    );
    logging::init_logging(output.is_verbose(), config.global.log_level.as_deref());
    output.verbose("oi starting");

    let hooks: Arc<dyn TaskHooks> = if config.project.report {
        Arc::new(ReportingHooks::new(Arc::new(output)))
    } else {
        Arc::new(QuietHooks)
    };

    let mut extra_paths = config.plugin_paths();
    extra_paths.extend(global.plugin_paths.iter().cloned());
    let mut scanner = PluginScanner::new(extra_paths);

    if config.project.plugins_enabled && !global.no_plugins {
        scanner.load_plugins(|result| match result {
            Ok(configs) => {
                output.verbose_ctx("plugins", &format!("Loaded {} plugin module(s)", configs.len()));
                for config in configs {
                    register(registry, config.or_hooks(hooks.clone()));
                }
            }
            Err(e) => output.verbose_ctx("plugins", &format!("Continuing without plugins: {}", e)),
        });
    }

    // Registered last so plugins cannot replace them by id
    let builtins = vec![Arc::new(Module::new(plugin_cmd::module(&scanner, output))?)];
    for module in &builtins {
        module.register(registry);
    }

    let mut command = Cli::command()
        .subcommand_required(true)
        .arg_required_else_help(true);
    let mut commands = HashSet::new();
    let mut modules = Vec::new();
    for module in command_order(&builtins, registry.modules()) {
        if !commands.insert(module.command().to_string()) {
            warn!(module = %module.id(), "Command '{}' is already taken, skipping", module.command());
            continue;
        }
        command = command.subcommand(ClapBuilder::module_command(&module)?);
        modules.push(module);
    }

    let matches = command.get_matches_from(&args);
    let (name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("No command given"))?;
    let module = modules
        .iter()
        .find(|m| m.command() == name)
        .ok_or_else(|| anyhow!("Unknown command: {}", name))?;

    output.verbose_ctx(name, &format!("Dispatching to module '{}'", module.id()));
    let result = dispatch(module, sub_matches)?;
    output.task_result(&result);

    if !result_succeeded(&result) {
        anyhow::bail!("Command '{}' did not succeed", name);
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// Built-ins first, so their commands are taken before any registered module
/// can claim them
fn command_order(builtins: &[Arc<Module>], registered: Vec<Arc<Module>>) -> Vec<Arc<Module>> {
    let mut ordered = builtins.to_vec();
    ordered.extend(
        registered
            .into_iter()
            .filter(|module| !builtins.iter().any(|builtin| Arc::ptr_eq(builtin, module))),
    );
    ordered
}

/// Registers a plugin module; a plugin with a bad shape is skipped, not fatal
fn register(registry: &Registry, config: ModuleConfig) {
    let id = config.effective_id().to_string();
    match Module::new(config) {
        Ok(module) => Arc::new(module).register(registry),
        Err(e) => warn!(module = %id, "Skipping plugin module: {}", e),
    }
}
