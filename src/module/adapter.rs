//! Turns a [`ModuleConfig`] into a runnable command node

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::argv::Argv;
use super::hooks::{ReportingHooks, TaskHooks};
use super::registry::Registry;
use super::spec::{ActionSpec, ModuleBody, ModuleConfig, TaskFn};

/// Member names a leaf command may not take
pub const RESERVED_NAMES: &[&str] = &[
    "id",
    "name",
    "command",
    "describe",
    "description",
    "actions",
    "handler",
    "builder",
    "parent",
    "hooks",
    "tasks",
    "start_time",
    "build",
    "invoke",
    "run_task",
    "before_task",
    "after_task",
    "register",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Module must be created with a command")]
    MissingCommand,

    #[error("Module '{command}' has no actions, handler or methods to use as subcommands")]
    NoSubcommands { command: String },

    #[error("Command cannot shadow module property '{command}' (not supported yet)")]
    ShadowedProperty { command: String },
}

/// Registration context the CLI layer hands to [`Module::build`]
pub trait CommandBuilder {
    /// Registers one subcommand
    fn command(&mut self, module: Arc<Module>) -> Result<(), ConfigurationError>;

    /// Requires exactly one subcommand and rejects unknown flags
    fn demand_subcommand(&mut self);
}

/// Collects the subcommands a module builds, without a CLI
#[derive(Debug, Default)]
pub struct Submodules {
    pub modules: Vec<Arc<Module>>,
    pub demanded: bool,
}

impl CommandBuilder for Submodules {
    fn command(&mut self, module: Arc<Module>) -> Result<(), ConfigurationError> {
        self.modules.push(module);
        Ok(())
    }

    fn demand_subcommand(&mut self) {
        self.demanded = true;
    }
}

/// A named command node: a leaf task or a dispatch table of children
pub struct Module {
    id: String,
    name: String,
    command: String,
    describe: String,
    actions: Option<Vec<ActionSpec>>,
    tasks: HashMap<String, TaskFn>,
    parent: Option<Weak<Module>>,
    hooks: Arc<dyn TaskHooks>,
    start_time: Mutex<Option<DateTime<Utc>>>,
}

impl Module {
    /// Creates a top-level module
    pub fn new(config: ModuleConfig) -> Result<Self, ConfigurationError> {
        Self::with_parent(config, None)
    }

    fn with_parent(config: ModuleConfig, parent: Option<Weak<Module>>) -> Result<Self, ConfigurationError> {
        if config.command.is_empty() {
            return Err(ConfigurationError::MissingCommand);
        }

        let command = config.command;
        let id = config.id.unwrap_or_else(|| command.clone());
        let describe = config
            .description
            .or(config.describe)
            .unwrap_or_else(|| format!("Perform {}", command));
        let hooks = config
            .hooks
            .unwrap_or_else(|| Arc::new(ReportingHooks::default()));

        debug!(module = %id, "Initializing module");

        let mut tasks = HashMap::new();
        let actions = match config.body {
            ModuleBody::Actions { actions, handler } => {
                if let Some(handler) = handler {
                    tasks.insert(command.clone(), handler);
                }
                Some(actions)
            }
            ModuleBody::Handler(handler) => {
                debug!(module = %id, "Decorating handler to be invoked with module hooks");
                if RESERVED_NAMES.contains(&command.as_str()) {
                    return Err(ConfigurationError::ShadowedProperty { command });
                }
                tasks.insert(command.clone(), handler);
                None
            }
            ModuleBody::Methods(methods) => {
                if methods.is_empty() {
                    return Err(ConfigurationError::NoSubcommands { command });
                }
                debug!(
                    module = %id,
                    "No actions or handler, binding {} methods as subcommands",
                    methods.len()
                );
                let actions: Vec<ActionSpec> = methods
                    .iter()
                    .map(|(name, handler)| {
                        ActionSpec::new(name.clone(), format!("Performs {}", name), handler.clone())
                    })
                    .collect();
                tasks.extend(methods);
                Some(actions)
            }
        };

        Ok(Self {
            id,
            name: command.clone(),
            command,
            describe,
            actions,
            tasks,
            parent,
            hooks,
            start_time: Mutex::new(None),
        })
    }

    /// Builds the module for one of this module's actions
    fn submodule(self: &Arc<Self>, action: &ActionSpec) -> Result<Self, ConfigurationError> {
        let mut config = ModuleConfig::handler(action.command.clone(), action.handler.clone())
            .hooks(self.hooks.clone());
        if let Some(describe) = &action.describe {
            config = config.describe(describe.clone());
        }
        Self::with_parent(config, Some(Arc::downgrade(self)))
    }

    /// Registers one child per action with the CLI layer. Children are built
    /// fresh on every call. Leaf modules register nothing.
    pub fn build(self: &Arc<Self>, ctx: &mut dyn CommandBuilder) -> Result<(), ConfigurationError> {
        let Some(actions) = &self.actions else {
            return Ok(());
        };

        debug!(
            module = %self.id,
            "Building subcommands {}",
            actions.iter().map(|a| a.command.as_str()).collect::<Vec<_>>().join(", ")
        );
        for action in actions {
            ctx.command(Arc::new(self.submodule(action)?))?;
        }
        if !self.has_handler() {
            ctx.demand_subcommand();
        }
        Ok(())
    }

    /// Freshly built children of a dispatch module
    pub fn submodules(self: &Arc<Self>) -> Result<Vec<Arc<Module>>, ConfigurationError> {
        let mut collected = Submodules::default();
        self.build(&mut collected)?;
        Ok(collected.modules)
    }

    /// Handler the CLI layer calls with parsed arguments when this module is selected
    pub fn invoke(&self, argv: &Argv) -> Result<Value> {
        if !self.has_handler() {
            return Err(anyhow!("Module '{}' has no handler; choose a subcommand", self.id));
        }
        let args = argv.task_args();
        debug!(module = %self.id, task = %self.command, "Invoking with {} args", args.len());
        self.run_task(&self.command, args)
    }

    /// Runs a task by name between the before and after hooks
    pub fn run_task(&self, task: &str, args: Vec<Value>) -> Result<Value> {
        let handler = self
            .tasks
            .get(task)
            .cloned()
            .ok_or_else(|| anyhow!("Module '{}' has no task '{}'", self.id, task))?;
        self.run_task_fn(task, &handler, args)
    }

    /// Runs a task function between the before and after hooks.
    ///
    /// A veto from `before_task` returns `false` without running the task.
    /// Task errors propagate and skip `after_task`.
    pub fn run_task_fn(&self, task: &str, handler: &TaskFn, args: Vec<Value>) -> Result<Value> {
        if self.hooks.before_task(self, task, &args) {
            debug!(module = %self.id, task, "Task cancelled by before_task");
            return Ok(Value::Bool(false));
        }

        debug!(module = %self.name, task, "Applying task");
        let result = handler(&args)?;
        self.hooks.after_task(self, task, &result);
        Ok(result)
    }

    /// Inserts this module into the registry under its id
    pub fn register(self: &Arc<Self>, registry: &Registry) {
        registry.register(self.clone());
    }

    /// Task name as shown in reports
    pub fn qualified_name(&self, task: &str) -> String {
        match self.parent() {
            Some(parent) => format!("{} {}", parent.command, task),
            None => task.to_string(),
        }
    }

    /// Records the start timestamp read by reports
    pub fn mark_started(&self) {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    /// When the current task started, if one has run
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn describe(&self) -> &str {
        &self.describe
    }

    pub fn actions(&self) -> &[ActionSpec] {
        self.actions.as_deref().unwrap_or(&[])
    }

    pub fn parent(&self) -> Option<Arc<Module>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn hooks(&self) -> &Arc<dyn TaskHooks> {
        &self.hooks
    }

    /// True when the module has sub-actions
    pub fn is_dispatch(&self) -> bool {
        self.actions.is_some()
    }

    /// True when selecting the module itself runs a task
    pub fn has_handler(&self) -> bool {
        self.tasks.contains_key(&self.command)
    }

    /// Names of the tasks [`Self::run_task`] accepts
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("describe", &self.describe)
            .field("actions", &self.actions)
            .field("tasks", &self.task_names())
            .field("parent", &self.parent().map(|p| p.id.clone()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::hooks::{QuietHooks, Reporter, TaskReport};
    use crate::module::spec::task;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> TaskFn {
        task(|_| Ok(Value::Null))
    }

    /// Records every task's arguments
    fn recording() -> (TaskFn, Arc<Mutex<Vec<Vec<Value>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let f = task(move |args| {
            seen.lock().unwrap().push(args.to_vec());
            Ok(json!("ran"))
        });
        (f, calls)
    }

    #[derive(Default)]
    struct CountingHooks {
        veto: bool,
        before: AtomicUsize,
        after: AtomicUsize,
        results: Mutex<Vec<Value>>,
    }

    impl TaskHooks for CountingHooks {
        fn before_task(&self, module: &Module, _task: &str, _args: &[Value]) -> bool {
            module.mark_started();
            self.before.fetch_add(1, Ordering::SeqCst);
            self.veto
        }

        fn after_task(&self, _module: &Module, _task: &str, result: &Value) -> bool {
            self.after.fetch_add(1, Ordering::SeqCst);
            self.results.lock().unwrap().push(result.clone());
            true
        }
    }

    #[derive(Default)]
    struct CollectingReporter(Mutex<Vec<TaskReport>>);

    impl Reporter for CollectingReporter {
        fn report(&self, report: &TaskReport) {
            self.0.lock().unwrap().push(report.clone());
        }
    }

    #[test]
    fn missing_command_fails() {
        let result = Module::new(ModuleConfig::handler("", noop()));
        assert_eq!(result.unwrap_err(), ConfigurationError::MissingCommand);
    }

    #[test]
    fn empty_method_table_fails() {
        let result = Module::new(ModuleConfig::methods("nothing"));
        assert!(matches!(result, Err(ConfigurationError::NoSubcommands { .. })));
    }

    #[test]
    fn leaf_command_cannot_shadow_members() {
        let result = Module::new(ModuleConfig::handler("register", noop()));
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::ShadowedProperty {
                command: "register".to_string()
            }
        );
    }

    #[test]
    fn defaults() {
        let module = Module::new(ModuleConfig::handler("build", noop())).unwrap();

        assert_eq!(module.id(), "build");
        assert_eq!(module.name(), "build");
        assert_eq!(module.describe(), "Perform build");
        assert!(!module.is_dispatch());
        assert!(module.has_handler());
    }

    #[test]
    fn description_wins_over_describe() {
        let module = Module::new(
            ModuleConfig::handler("build", noop())
                .describe("short")
                .description("long"),
        )
        .unwrap();
        assert_eq!(module.describe(), "long");

        let module = Module::new(ModuleConfig::handler("build", noop()).describe("short")).unwrap();
        assert_eq!(module.describe(), "short");
    }

    #[test]
    fn builder_registers_one_child_per_action() {
        let module = Arc::new(
            Module::new(ModuleConfig::actions(
                "db",
                [
                    ActionSpec::new("migrate", "Run migrations", noop()),
                    ActionSpec::new("seed", "Load fixtures", noop()),
                ],
            ))
            .unwrap(),
        );

        let mut ctx = Submodules::default();
        module.build(&mut ctx).unwrap();

        let commands: Vec<_> = ctx.modules.iter().map(|m| m.command()).collect();
        assert_eq!(commands, vec!["migrate", "seed"]);
        assert!(ctx.demanded);
        for child in &ctx.modules {
            assert!(Arc::ptr_eq(&child.parent().unwrap(), &module));
        }
        assert_eq!(ctx.modules[0].describe(), "Run migrations");
    }

    #[test]
    fn dispatch_with_handler_does_not_demand_subcommand() {
        let module = Arc::new(
            Module::new(
                ModuleConfig::actions("db", [ActionSpec::new("migrate", "Run migrations", noop())])
                    .with_handler(noop()),
            )
            .unwrap(),
        );

        let mut ctx = Submodules::default();
        module.build(&mut ctx).unwrap();

        assert_eq!(ctx.modules.len(), 1);
        assert!(!ctx.demanded);
        assert!(module.has_handler());
    }

    #[test]
    fn children_are_rebuilt_on_every_build() {
        let module = Arc::new(
            Module::new(ModuleConfig::actions("db", [ActionSpec::new("migrate", "m", noop())])).unwrap(),
        );

        let first = module.submodules().unwrap();
        let second = module.submodules().unwrap();
        assert!(!Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn methods_become_described_actions() {
        let module = Arc::new(
            Module::new(
                ModuleConfig::methods("git")
                    .method("status", noop())
                    .method("log", noop()),
            )
            .unwrap(),
        );

        assert!(module.is_dispatch());
        assert!(!module.has_handler());
        assert_eq!(module.task_names(), vec!["log", "status"]);

        let children = module.submodules().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].describe(), "Performs status");
        assert_eq!(children[1].command(), "log");
    }

    #[test]
    fn invoke_splits_positional_and_keyword_args() {
        let (handler, calls) = recording();
        let module = Module::new(ModuleConfig::handler("build", handler).hooks(Arc::new(QuietHooks))).unwrap();

        let argv = Argv::new(["build", "a", "b"]).with_flag("flag", true);
        let result = module.invoke(&argv).unwrap();

        assert_eq!(result, json!("ran"));
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[vec![json!("a"), json!("b"), json!({"flag": true})]]
        );
    }

    #[test]
    fn invoke_without_handler_fails() {
        let module = Module::new(ModuleConfig::methods("git").method("status", noop())).unwrap();
        assert!(module.invoke(&Argv::new(["git"])).is_err());
    }

    #[test]
    fn veto_skips_task_and_returns_false() {
        let (handler, calls) = recording();
        let hooks = Arc::new(CountingHooks {
            veto: true,
            ..Default::default()
        });
        let module = Module::new(ModuleConfig::handler("build", handler).hooks(hooks.clone())).unwrap();

        let result = module.run_task("build", vec![]).unwrap();

        assert_eq!(result, Value::Bool(false));
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(hooks.before.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn after_task_runs_once_with_raw_result() {
        let hooks = Arc::new(CountingHooks::default());
        let module = Module::new(
            ModuleConfig::handler("build", task(|_| Ok(json!({"code": 1})))).hooks(hooks.clone()),
        )
        .unwrap();

        let result = module.run_task("build", vec![json!({})]).unwrap();

        assert_eq!(result, json!({"code": 1}));
        assert_eq!(hooks.after.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.results.lock().unwrap().as_slice(), &[json!({"code": 1})]);
    }

    #[test]
    fn task_errors_propagate_without_after_hook() {
        let hooks = Arc::new(CountingHooks::default());
        let module = Module::new(
            ModuleConfig::handler("build", task(|_| Err(anyhow!("boom")))).hooks(hooks.clone()),
        )
        .unwrap();

        let err = module.run_task("build", vec![]).unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(hooks.after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_task_is_an_error() {
        let module = Module::new(ModuleConfig::handler("build", noop())).unwrap();
        assert!(module.run_task("deploy", vec![]).is_err());
    }

    #[test]
    fn reports_use_parent_command_prefix() {
        let reporter = Arc::new(CollectingReporter::default());
        let module = Arc::new(
            Module::new(
                ModuleConfig::actions("db", [ActionSpec::new("migrate", "m", task(|_| Ok(json!(false))))])
                    .hooks(Arc::new(ReportingHooks::new(reporter.clone()))),
            )
            .unwrap(),
        );

        let child = module.submodules().unwrap().remove(0);
        child.invoke(&Argv::new(["migrate"])).unwrap();

        let reports = reporter.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].task, "db migrate");
        assert!(!reports[0].success);
        assert!(child.started_at().is_some());
    }

    #[test]
    fn top_level_report_is_unprefixed() {
        let module = Module::new(ModuleConfig::handler("build", noop())).unwrap();
        assert_eq!(module.qualified_name("build"), "build");
    }
}
