//! Normalizes plugin exports into module configs
//!
//! A plugin may export its module in several shapes:
//!
//! ```json
//! "docker"                                             // leaf named "docker"
//! {"command": "docker", "handler": true}               // leaf
//! {"command": "docker", "actions": {"build": {}}}      // dispatch table
//! {"command": "docker", "methods": ["build", "push"]}  // method table
//! ```
//!
//! Every task of the resulting module runs the plugin executable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde::Deserialize;
use serde_json::Value;

use super::discovery::{DiscoveryError, Registration};
use super::manager::{execute, PLUGIN_PREFIX};
use super::protocol::PluginRequest;
use crate::module::{task, ActionSpec, ModuleConfig, TaskFn};

/// The shapes a plugin export can take
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModuleExport {
    /// Bare command name: a leaf module
    Command(String),

    Object(ExportObject),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportObject {
    pub id: Option<String>,
    pub command: Option<String>,
    pub describe: Option<String>,
    pub description: Option<String>,
    pub actions: BTreeMap<String, ActionExport>,
    pub handler: bool,
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionExport {
    pub describe: Option<String>,
}

/// Turns one registration into a module config backed by the plugin process
pub fn plug_module(registration: &Registration) -> Result<ModuleConfig, DiscoveryError> {
    let export: ModuleExport =
        serde_json::from_value(registration.export.clone()).map_err(|e| DiscoveryError::Export {
            plugin: registration.name.clone(),
            message: e.to_string(),
        })?;

    let path = registration.path.as_path();
    let config = match export {
        ModuleExport::Command(command) => {
            let handler = plugin_task(path, &command, &command);
            ModuleConfig::handler(command, handler)
        }
        ModuleExport::Object(object) => {
            let command = object
                .command
                .clone()
                .unwrap_or_else(|| default_command(&registration.name));
            object_config(path, command, object)
        }
    };

    Ok(config)
}

fn object_config(path: &Path, command: String, object: ExportObject) -> ModuleConfig {
    let mut config = if !object.actions.is_empty() {
        let actions = object.actions.iter().map(|(name, action)| {
            let handler = plugin_task(path, &command, name);
            match &action.describe {
                Some(describe) => ActionSpec::new(name.clone(), describe.clone(), handler),
                None => ActionSpec::undescribed(name.clone(), handler),
            }
        });
        let mut config = ModuleConfig::actions(command.clone(), actions.collect::<Vec<_>>());
        if object.handler {
            config = config.with_handler(plugin_task(path, &command, &command));
        }
        config
    } else if object.handler {
        ModuleConfig::handler(command.clone(), plugin_task(path, &command, &command))
    } else {
        object
            .methods
            .iter()
            .fold(ModuleConfig::methods(command.clone()), |config, method| {
                config.method(method.clone(), plugin_task(path, &command, method))
            })
    };

    if let Some(id) = object.id {
        config = config.id(id);
    }
    if let Some(describe) = object.describe {
        config = config.describe(describe);
    }
    if let Some(description) = object.description {
        config = config.description(description);
    }
    config
}

/// Command for an export that names none: the plugin name without its prefix
fn default_command(plugin: &str) -> String {
    plugin.strip_prefix(PLUGIN_PREFIX).unwrap_or(plugin).to_string()
}

/// A task that forwards its arguments to the plugin process
fn plugin_task(path: &Path, module: &str, task_name: &str) -> TaskFn {
    let path: PathBuf = path.to_path_buf();
    let module = module.to_string();
    let task_name = task_name.to_string();

    task(move |args: &[Value]| {
        let request = PluginRequest::invoke(&module, &task_name, args);
        let response = execute(&path, &request)?;
        if response.success {
            Ok(response.data.unwrap_or(Value::Null))
        } else {
            Err(anyhow!(
                "Plugin task '{} {}' failed: {}",
                module,
                task_name,
                response.error.unwrap_or_else(|| "unknown error".to_string())
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Module, ModuleBody};
    use serde_json::json;
    use std::sync::Arc;

    fn registration(export: Value) -> Registration {
        Registration {
            name: "oi-docker".to_string(),
            path: PathBuf::from("/plugins/oi-docker"),
            export,
        }
    }

    #[test]
    fn bare_string_is_a_leaf() {
        let config = plug_module(&registration(json!("compose"))).unwrap();

        assert_eq!(config.command(), "compose");
        assert!(matches!(config.body(), ModuleBody::Handler(_)));
    }

    #[test]
    fn command_defaults_to_plugin_name() {
        let config = plug_module(&registration(json!({"handler": true}))).unwrap();
        assert_eq!(config.command(), "docker");
    }

    #[test]
    fn actions_become_subcommands() {
        let config = plug_module(&registration(json!({
            "id": "docker-tools",
            "command": "docker",
            "describe": "Docker helpers",
            "actions": {
                "build": {"describe": "Build the image"},
                "push": {}
            }
        })))
        .unwrap();

        assert_eq!(config.effective_id(), "docker-tools");
        let module = Arc::new(Module::new(config).unwrap());
        assert_eq!(module.describe(), "Docker helpers");
        assert!(!module.has_handler());

        let children = module.submodules().unwrap();
        let commands: Vec<_> = children.iter().map(|c| c.command()).collect();
        assert_eq!(commands, vec!["build", "push"]);
        assert_eq!(children[0].describe(), "Build the image");
        assert_eq!(children[1].describe(), "Perform push");
    }

    #[test]
    fn actions_with_handler_keep_both() {
        let config = plug_module(&registration(json!({
            "command": "docker",
            "handler": true,
            "actions": {"build": {}}
        })))
        .unwrap();

        let module = Module::new(config).unwrap();
        assert!(module.is_dispatch());
        assert!(module.has_handler());
    }

    #[test]
    fn methods_become_method_table() {
        let config = plug_module(&registration(json!({"command": "docker", "methods": ["up", "down"]}))).unwrap();

        let module = Module::new(config).unwrap();
        assert_eq!(module.task_names(), vec!["down", "up"]);
    }

    #[test]
    fn empty_object_fails_at_module_construction() {
        let config = plug_module(&registration(json!({"command": "docker"}))).unwrap();
        assert!(Module::new(config).is_err());
    }

    #[test]
    fn unusable_export_is_rejected() {
        let err = plug_module(&registration(json!(42))).unwrap_err();
        assert!(matches!(err, DiscoveryError::Export { ref plugin, .. } if plugin == "oi-docker"));
    }
}
