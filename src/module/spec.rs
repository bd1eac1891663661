//! Module configuration: what a caller or plugin hands to the adapter

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use super::hooks::TaskHooks;

/// A runnable task. Receives the positional arguments followed by one
/// trailing object of keyword arguments.
pub type TaskFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Wraps a closure as a [`TaskFn`]
pub fn task<F>(f: F) -> TaskFn
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Declarative description of a subcommand before it is built into a module
#[derive(Clone)]
pub struct ActionSpec {
    pub command: String,
    pub describe: Option<String>,
    pub handler: TaskFn,
}

impl ActionSpec {
    pub fn new(command: impl Into<String>, describe: impl Into<String>, handler: TaskFn) -> Self {
        Self {
            command: command.into(),
            describe: Some(describe.into()),
            handler,
        }
    }

    /// Creates an action with the default description
    pub fn undescribed(command: impl Into<String>, handler: TaskFn) -> Self {
        Self {
            command: command.into(),
            describe: None,
            handler,
        }
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("command", &self.command)
            .field("describe", &self.describe)
            .finish_non_exhaustive()
    }
}

/// The shape of a module, decided when the config is written
#[derive(Clone)]
pub enum ModuleBody {
    /// Dispatch table of sub-actions, optionally with a direct handler
    Actions {
        actions: Vec<ActionSpec>,
        handler: Option<TaskFn>,
    },

    /// Leaf command
    Handler(TaskFn),

    /// Named methods, each exposed as a sub-action
    Methods(Vec<(String, TaskFn)>),
}

impl fmt::Debug for ModuleBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleBody::Actions { actions, handler } => f
                .debug_struct("Actions")
                .field("actions", actions)
                .field("handler", &handler.is_some())
                .finish(),
            ModuleBody::Handler(_) => f.write_str("Handler"),
            ModuleBody::Methods(methods) => f
                .debug_tuple("Methods")
                .field(&methods.iter().map(|(name, _)| name).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Input to [`Module::new`](super::Module::new)
#[derive(Clone)]
pub struct ModuleConfig {
    pub(crate) id: Option<String>,
    pub(crate) command: String,
    pub(crate) describe: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) body: ModuleBody,
    pub(crate) hooks: Option<Arc<dyn TaskHooks>>,
}

impl ModuleConfig {
    fn with_body(command: impl Into<String>, body: ModuleBody) -> Self {
        Self {
            id: None,
            command: command.into(),
            describe: None,
            description: None,
            body,
            hooks: None,
        }
    }

    /// A dispatch module with the given sub-actions
    pub fn actions(command: impl Into<String>, actions: impl IntoIterator<Item = ActionSpec>) -> Self {
        Self::with_body(
            command,
            ModuleBody::Actions {
                actions: actions.into_iter().collect(),
                handler: None,
            },
        )
    }

    /// A leaf module
    pub fn handler(command: impl Into<String>, handler: TaskFn) -> Self {
        Self::with_body(command, ModuleBody::Handler(handler))
    }

    /// A module whose methods become sub-actions; add them with [`Self::method`]
    pub fn methods(command: impl Into<String>) -> Self {
        Self::with_body(command, ModuleBody::Methods(Vec::new()))
    }

    /// Adds a method. On an action table the method becomes one more action;
    /// on a leaf it replaces the handler.
    pub fn method(mut self, name: impl Into<String>, handler: TaskFn) -> Self {
        match &mut self.body {
            ModuleBody::Methods(methods) => methods.push((name.into(), handler)),
            ModuleBody::Actions { actions, .. } => {
                let name = name.into();
                let describe = format!("Performs {}", name);
                actions.push(ActionSpec::new(name, describe, handler));
            }
            ModuleBody::Handler(_) => {
                self.body = ModuleBody::Methods(vec![(name.into(), handler)]);
            }
        }
        self
    }

    /// Adds a sub-action
    pub fn action(mut self, action: ActionSpec) -> Self {
        match &mut self.body {
            ModuleBody::Actions { actions, .. } => actions.push(action),
            _ => {
                self.body = ModuleBody::Actions {
                    actions: vec![action],
                    handler: None,
                }
            }
        }
        self
    }

    /// Sets the direct handler. A dispatch module keeps its actions and runs
    /// the handler when no subcommand is given.
    pub fn with_handler(mut self, handler: TaskFn) -> Self {
        match &mut self.body {
            ModuleBody::Actions { handler: slot, .. } => *slot = Some(handler),
            _ => self.body = ModuleBody::Handler(handler),
        }
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn describe(mut self, describe: impl Into<String>) -> Self {
        self.describe = Some(describe.into());
        self
    }

    /// Alternative to [`Self::describe`]; takes precedence when both are set
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the task hooks for this module and its children
    pub fn hooks(mut self, hooks: Arc<dyn TaskHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Sets the hooks only if none were chosen yet
    pub fn or_hooks(mut self, hooks: Arc<dyn TaskHooks>) -> Self {
        if self.hooks.is_none() {
            self.hooks = Some(hooks);
        }
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The id the module will be registered under
    pub fn effective_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.command)
    }

    pub fn body(&self) -> &ModuleBody {
        &self.body
    }
}

impl fmt::Debug for ModuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleConfig")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("describe", &self.describe)
            .field("description", &self.description)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
