//! Task lifecycle hooks and result reporting

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::adapter::Module;

/// Hooks run around every task executed through [`Module::run_task`].
///
/// The default methods record a start timestamp and never veto; they do not
/// report. Implementors override either side to add pre-flight checks or
/// change how results are surfaced.
pub trait TaskHooks: Send + Sync {
    /// Runs before the task. Returning `true` cancels it.
    fn before_task(&self, module: &Module, task: &str, args: &[Value]) -> bool {
        let _ = (task, args);
        module.mark_started();
        false
    }

    /// Runs after the task with its raw result. Returns whether it succeeded.
    fn after_task(&self, module: &Module, task: &str, result: &Value) -> bool {
        let _ = (module, task);
        result_succeeded(result)
    }
}

/// Receives finished task reports
pub trait Reporter: Send + Sync {
    fn report(&self, report: &TaskReport);
}

/// Writes reports to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, report: &TaskReport) {
        info!(task = %report.task, success = report.success, elapsed_ms = report.elapsed_ms, "{}", report);
    }
}

/// Default hooks: time every task and report its outcome
#[derive(Clone)]
pub struct ReportingHooks {
    reporter: Arc<dyn Reporter>,
}

impl ReportingHooks {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }
}

impl Default for ReportingHooks {
    fn default() -> Self {
        Self::new(Arc::new(LogReporter))
    }
}

impl TaskHooks for ReportingHooks {
    fn after_task(&self, module: &Module, task: &str, result: &Value) -> bool {
        let report = TaskReport::new(module, task, result);
        self.reporter.report(&report);
        report.success
    }
}

/// Hooks that time tasks but never report
#[derive(Debug, Default, Clone, Copy)]
pub struct QuietHooks;

impl TaskHooks for QuietHooks {}

/// Outcome of one task run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Task name, prefixed with the parent's command when there is one
    pub task: String,

    pub success: bool,

    pub elapsed_ms: i64,

    pub finished_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn new(module: &Module, task: &str, result: &Value) -> Self {
        let finished_at = Utc::now();
        let elapsed = module
            .started_at()
            .map(|start| finished_at - start)
            .unwrap_or_else(Duration::zero);

        Self {
            task: module.qualified_name(task),
            success: result_succeeded(result),
            elapsed_ms: elapsed.num_milliseconds().max(0),
            finished_at,
        }
    }
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "succeeded" } else { "failed" };
        write!(f, "{} {} in {}ms", self.task, status, self.elapsed_ms)
    }
}

/// Derives success from a task's raw result.
///
/// `false` fails; objects fail on `"success": false` or a non-zero `"code"`
/// (the shape of a finished process). Anything else succeeds.
pub fn result_succeeded(result: &Value) -> bool {
    match result {
        Value::Bool(ok) => *ok,
        Value::Object(map) => {
            if let Some(Value::Bool(ok)) = map.get("success") {
                return *ok;
            }
            map.get("code")
                .and_then(Value::as_i64)
                .map_or(true, |code| code == 0)
        }
        _ => true,
    }
}
