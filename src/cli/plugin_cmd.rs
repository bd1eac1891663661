//! Built-in `plugins` module

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::output::Output;
use crate::module::{task, ModuleConfig, QuietHooks};
use crate::plugin::{Discovery, PluginScanner};

pub const PLUGINS_COMMAND: &str = "plugins";

/// A discovered plugin and the modules it produced
#[derive(Debug, Clone, Serialize)]
struct PluginSummary {
    name: String,
    path: String,
    modules: Vec<String>,
}

/// Module config for `oi plugins {list,paths}`, snapshotting the scanner state
pub fn module<D: Discovery>(scanner: &PluginScanner<D>, output: Output) -> ModuleConfig {
    let plugins: Arc<Vec<PluginSummary>> = Arc::new(
        scanner
            .plugins()
            .iter()
            .zip(scanner.module_ids())
            .map(|(registration, id)| PluginSummary {
                name: registration.name.clone(),
                path: registration.path.display().to_string(),
                modules: vec![id.clone()],
            })
            .collect(),
    );
    let search_paths = Arc::new(scanner.search_paths());

    ModuleConfig::methods(PLUGINS_COMMAND)
        .describe("Inspect discovered plugins")
        .method(
            "list",
            task(move |_| {
                list_plugins(&plugins, output);
                Ok(Value::Null)
            }),
        )
        .method(
            "paths",
            task(move |_| {
                list_paths(&search_paths, output);
                Ok(Value::Null)
            }),
        )
        .hooks(Arc::new(QuietHooks))
}

fn list_plugins(plugins: &[PluginSummary], output: Output) {
    if output.is_json() {
        output.data(&plugins);
    } else if plugins.is_empty() {
        println!("No plugins found.");
        println!();
        println!("Plugins are executables named 'oi-<name>' that export an 'oi:module'.");
        println!("Run 'oi plugins paths' to see where they are searched for.");
    } else {
        println!("Available plugins:");
        println!("{:<24} {:<20} PATH", "NAME", "MODULES");
        println!("{}", "-".repeat(70));
        for plugin in plugins {
            println!("{:<24} {:<20} {}", plugin.name, plugin.modules.join(","), plugin.path);
        }
    }
}

fn list_paths(paths: &[PathBuf], output: Output) {
    if output.is_json() {
        let items: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
        output.data(&items);
    } else {
        for path in paths {
            println!("{}", path.display());
        }
    }
}
