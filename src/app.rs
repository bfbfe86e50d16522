use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::{CleanupPolicy, Stage};
use crate::error::{ErrorKind, SrefError};
use crate::nomads::Fetcher;
use crate::plan::FetchTask;
use crate::wgrib2::Converter;
use crate::workspace::{CompletionLedger, Workspace};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Fetch and convert even when the converted file already exists.
    pub force: bool,
    /// Decide every task's action without touching the network or disk.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Skipped,
    Downloaded,
    WouldDownload,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub core: String,
    pub pert: String,
    pub action: TaskAction,
    pub raw_path: String,
    pub converted_path: String,
    pub elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub core: String,
    pub pert: String,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub items: Vec<TaskResult>,
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn count(&self, action: TaskAction) -> usize {
        self.items.iter().filter(|item| item.action == action).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns a report with failures into `SrefError::BatchFailed`.
    pub fn into_result(self) -> Result<RunReport, SrefError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SrefError::BatchFailed {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanResult {
    pub policy: CleanupPolicy,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sequential fetch-and-convert driver over a planned batch.
pub struct App<F: Fetcher, C: Converter, L: CompletionLedger = Workspace> {
    workspace: Workspace,
    fetcher: F,
    converter: C,
    ledger: L,
}

impl<F: Fetcher, C: Converter> App<F, C, Workspace> {
    pub fn new(workspace: Workspace, fetcher: F, converter: C) -> Self {
        Self {
            ledger: workspace.clone(),
            workspace,
            fetcher,
            converter,
        }
    }
}

impl<F: Fetcher, C: Converter, L: CompletionLedger> App<F, C, L> {
    /// Uses `ledger` instead of the filesystem to decide which tasks are done.
    pub fn with_ledger(workspace: Workspace, fetcher: F, converter: C, ledger: L) -> Self {
        Self {
            workspace,
            fetcher,
            converter,
            ledger,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn clean(
        &self,
        tasks: &[FetchTask],
        policy: CleanupPolicy,
        sink: &dyn ProgressSink,
    ) -> Result<CleanResult, SrefError> {
        sink.event(ProgressEvent {
            message: format!("phase=Clean; policy={policy}"),
            elapsed: None,
        });
        let removed = self.workspace.cleanup(tasks, policy)?;
        for path in &removed {
            sink.event(ProgressEvent {
                message: format!("phase=Clean; removed {path}"),
                elapsed: None,
            });
        }
        Ok(CleanResult {
            policy,
            removed: removed.into_iter().map(|path| path.to_string()).collect(),
        })
    }

    /// Cleans up per `policy`, then runs the batch.
    pub fn fetch(
        &self,
        tasks: &[FetchTask],
        policy: CleanupPolicy,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, SrefError> {
        let options = if options.dry_run {
            // Cleanup would have removed the completion markers.
            RunOptions {
                force: options.force || policy != CleanupPolicy::None,
                dry_run: true,
            }
        } else {
            self.workspace.ensure_root()?;
            self.clean(tasks, policy, sink)?;
            options
        };
        Ok(self.run(tasks, &options, sink))
    }

    /// Runs every task in order. A failed task is recorded and the batch continues.
    pub fn run(
        &self,
        tasks: &[FetchTask],
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> RunReport {
        let mut report = RunReport::default();
        for (index, task) in tasks.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Resolve; task {}/{} {}",
                    index + 1,
                    tasks.len(),
                    task.label()
                ),
                elapsed: None,
            });
            let (item, failure) = self.run_task(task, options, sink);
            report.items.push(item);
            if let Some(failure) = failure {
                report.failures.push(failure);
            }
        }
        report
    }

    fn run_task(
        &self,
        task: &FetchTask,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> (TaskResult, Option<TaskFailure>) {
        let raw_path = self.workspace.raw_path(task);
        let converted_path = self.workspace.converted_path(task);
        let mut item = TaskResult {
            core: task.core.clone(),
            pert: task.pert.clone(),
            action: TaskAction::Skipped,
            raw_path: raw_path.to_string(),
            converted_path: converted_path.to_string(),
            elapsed_ms: None,
        };

        if !options.force && self.ledger.is_complete(task) {
            sink.event(ProgressEvent {
                message: format!("phase=Skip; {} already converted", task.converted_filename),
                elapsed: None,
            });
            return (item, None);
        }

        if options.dry_run {
            item.action = TaskAction::WouldDownload;
            return (item, None);
        }

        let start = Instant::now();
        sink.event(ProgressEvent {
            message: format!("nomads.request {}", task.label()),
            elapsed: None,
        });
        if let Err(err) = self.fetcher.fetch(&task.url, raw_path.as_std_path()) {
            item.action = TaskAction::Failed;
            return (item, Some(self.failure(task, Stage::Fetch, err, sink)));
        }
        sink.event(ProgressEvent {
            message: format!("nomads.response {}", task.raw_filename),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: format!(
                "phase=Convert; {} -> {}",
                task.raw_filename, task.converted_filename
            ),
            elapsed: None,
        });
        if let Err(err) = self
            .converter
            .convert(raw_path.as_std_path(), converted_path.as_std_path())
        {
            item.action = TaskAction::Failed;
            return (item, Some(self.failure(task, Stage::Convert, err, sink)));
        }

        let elapsed = start.elapsed();
        sink.event(ProgressEvent {
            message: format!("phase=Done; {}", task.converted_filename),
            elapsed: Some(elapsed),
        });
        item.action = TaskAction::Downloaded;
        item.elapsed_ms = Some(elapsed.as_millis() as u64);
        (item, None)
    }

    fn failure(
        &self,
        task: &FetchTask,
        stage: Stage,
        err: SrefError,
        sink: &dyn ProgressSink,
    ) -> TaskFailure {
        sink.event(ProgressEvent {
            message: format!("phase=Error; {} {stage}: {err}", task.label()),
            elapsed: None,
        });
        TaskFailure {
            core: task.core.clone(),
            pert: task.pert.clone(),
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
