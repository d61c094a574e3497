// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Task runner
//!
//! A [`Runner`] owns the instantiated stages of every task in a build file.
//! Running a pipeline task reads its sources, passes them through its stages
//! in order and reports a failure once, tagged with the task name. Composite
//! tasks run their members one after another or concurrently.

use chrono::{DateTime, FixedOffset, Local};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::banner::{BannerTemplate, BannerVars, PackageInfo, DEFAULT_BANNER};
use crate::errors::{AssetflowError, AssetflowResult, FailureReport, StageError};
use crate::files::SourcePatterns;
use crate::notifier::{Level, Notification, Notifier};
use crate::pipeline::{BuildFile, TaskDef, TaskGraph};
use crate::reload::{NoReload, Reloader};
use crate::sourcemap::SourceTrack;
use crate::stages::{self, Stage, TaskContext};

type RunFuture<'a> = Pin<Box<dyn Future<Output = AssetflowResult<()>> + Send + 'a>>;

/// A task with its stages instantiated
enum CompiledTask {
    Pipeline {
        sources: SourcePatterns,
        stages: Vec<Box<dyn Stage>>,
        /// Whether records carry source-map tracking
        track: bool,
    },
    Sequence(Vec<String>),
    Parallel(Vec<String>),
}

struct RunnerInner {
    working_dir: PathBuf,
    package: PathBuf,
    tasks: HashMap<String, CompiledTask>,
    notifier: Arc<dyn Notifier>,
    reloader: Arc<dyn Reloader>,
    timestamp: Option<DateTime<FixedOffset>>,
    default_banner: BannerTemplate,
}

/// Runs tasks from a build file. Cheap to clone; clones share stages.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

/// Configures a [`Runner`]
pub struct RunnerBuilder {
    build: BuildFile,
    working_dir: PathBuf,
    notifier: Option<Arc<dyn Notifier>>,
    reloader: Option<Arc<dyn Reloader>>,
    timestamp: Option<DateTime<FixedOffset>>,
}

impl RunnerBuilder {
    /// Where notifications go (default: discarded)
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Where `reload` stages signal (default: nowhere)
    pub fn reloader(mut self, reloader: Arc<dyn Reloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Pin the banner timestamp instead of using the current time
    pub fn timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Add a task that runs `members` one after another
    pub fn compose_sequential<S: AsRef<str>>(mut self, name: &str, members: &[S]) -> Self {
        self.build.tasks.insert(
            name.to_string(),
            TaskDef::Sequence {
                sequence: members.iter().map(|m| m.as_ref().to_string()).collect(),
                description: None,
            },
        );
        self
    }

    /// Add a task that runs `members` concurrently
    pub fn compose_parallel<S: AsRef<str>>(mut self, name: &str, members: &[S]) -> Self {
        self.build.tasks.insert(
            name.to_string(),
            TaskDef::Parallel {
                parallel: members.iter().map(|m| m.as_ref().to_string()).collect(),
                description: None,
            },
        );
        self
    }

    /// Check task composition and instantiate every stage
    pub fn build(self) -> AssetflowResult<Runner> {
        TaskGraph::build(&self.build)?;

        let default_banner =
            BannerTemplate::parse(self.build.banner.as_deref().unwrap_or(DEFAULT_BANNER))?;

        let mut tasks = HashMap::new();
        for (name, task) in &self.build.tasks {
            let compiled = match task {
                TaskDef::Sequence { sequence, .. } => CompiledTask::Sequence(sequence.clone()),
                TaskDef::Parallel { parallel, .. } => CompiledTask::Parallel(parallel.clone()),
                TaskDef::Pipeline(pipeline) => {
                    if pipeline.src.is_empty() {
                        return Err(AssetflowError::InvalidConfig {
                            reason: format!("Task '{}' has an empty 'src'", name),
                            help: Some("Give at least one glob, e.g. src: js/src/*.js".into()),
                        });
                    }

                    let stages = pipeline
                        .stages
                        .iter()
                        .map(|spec| stages::build(spec, name, &self.working_dir))
                        .collect::<AssetflowResult<Vec<_>>>()?;

                    CompiledTask::Pipeline {
                        sources: SourcePatterns::new(&pipeline.src.to_vec())?,
                        stages,
                        track: pipeline.has_sourcemaps(),
                    }
                }
            };
            tasks.insert(name.clone(), compiled);
        }

        Ok(Runner {
            inner: Arc::new(RunnerInner {
                package: self.working_dir.join(&self.build.package),
                working_dir: self.working_dir,
                tasks,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(Silent)),
                reloader: self.reloader.unwrap_or_else(|| Arc::new(NoReload)),
                timestamp: self.timestamp,
                default_banner,
            }),
        })
    }
}

/// Discards notifications
struct Silent;

impl Notifier for Silent {
    fn notify(&self, _notification: Notification) {}
}

impl Runner {
    /// Start configuring a runner for `build`, with paths relative to `working_dir`
    pub fn builder(build: BuildFile, working_dir: impl Into<PathBuf>) -> RunnerBuilder {
        RunnerBuilder {
            build,
            working_dir: working_dir.into(),
            notifier: None,
            reloader: None,
            timestamp: None,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.inner.working_dir
    }

    /// Whether a task with this name exists
    pub fn has_task(&self, name: &str) -> bool {
        self.inner.tasks.contains_key(name)
    }

    /// All task names, sorted
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a task by name
    ///
    /// A failing pipeline is reported through the notifier once and its
    /// error returned. A sequence stops at the first failing member; a
    /// parallel task lets every member finish and returns the first failure
    /// in member order.
    pub fn run<'a>(&'a self, name: &'a str) -> RunFuture<'a> {
        Box::pin(async move {
            let Some(task) = self.inner.tasks.get(name) else {
                return Err(AssetflowError::UnknownTask {
                    name: name.to_string(),
                    available: self.task_names().join(", "),
                });
            };

            match task {
                CompiledTask::Pipeline {
                    sources,
                    stages,
                    track,
                } => self.run_pipeline(name, sources, stages, *track).await,
                CompiledTask::Sequence(members) => {
                    debug!(task = name, members = ?members, "running sequence");
                    for member in members {
                        self.run(member).await?;
                    }
                    Ok(())
                }
                CompiledTask::Parallel(members) => self.run_parallel(name, members).await,
            }
        })
    }

    async fn run_parallel(&self, name: &str, members: &[String]) -> AssetflowResult<()> {
        debug!(task = name, members = ?members, "running in parallel");

        let mut set = JoinSet::new();
        for (idx, member) in members.iter().enumerate() {
            let runner = self.clone();
            let member = member.clone();
            set.spawn(async move { (idx, runner.run(&member).await) });
        }

        let mut results: Vec<Option<AssetflowResult<()>>> = members.iter().map(|_| None).collect();
        let mut crashed = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => {
                    crashed.get_or_insert(AssetflowError::StageFailed {
                        task: name.to_string(),
                        stage: "parallel".into(),
                        message: e.to_string(),
                    });
                }
            }
        }

        for result in results.into_iter().flatten() {
            result?;
        }
        match crashed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Per-execution context: banner values are fixed for the whole run
    fn context(&self, task: &str) -> AssetflowResult<TaskContext> {
        let package = PackageInfo::load(&self.inner.package)?.unwrap_or_default();
        let timestamp = self
            .inner
            .timestamp
            .unwrap_or_else(|| Local::now().fixed_offset());

        Ok(TaskContext {
            task: task.to_string(),
            working_dir: self.inner.working_dir.clone(),
            banner: BannerVars::new(package, timestamp),
            default_banner: self.inner.default_banner.clone(),
            notifier: self.inner.notifier.clone(),
            reloader: self.inner.reloader.clone(),
        })
    }

    async fn run_pipeline(
        &self,
        name: &str,
        sources: &SourcePatterns,
        stages: &[Box<dyn Stage>],
        track: bool,
    ) -> AssetflowResult<()> {
        let started = Instant::now();
        info!(task = name, "starting");

        let ctx = self.context(name).map_err(|e| self.report(name, e))?;
        let mut files = sources
            .collect(&self.inner.working_dir)
            .await
            .map_err(|e| self.report(name, e))?;

        if files.is_empty() {
            warn!(task = name, "no files matched");
            ctx.notify(Level::Warning, "No files matched the task's sources");
            return Ok(());
        }

        if track {
            for file in files.iter_mut() {
                let tracked = file
                    .text()
                    .ok()
                    .map(|text| SourceTrack::identity(&file.path, text));
                file.source_map = tracked;
            }
        }

        for stage in stages {
            debug!(task = name, stage = stage.name(), files = files.len(), "applying stage");
            files = stage
                .apply(files, &ctx)
                .await
                .map_err(|e| self.fail(name, stage.name(), e))?;
        }

        let elapsed = started.elapsed();
        info!(task = name, files = files.len(), elapsed_ms = elapsed.as_millis() as u64, "finished");
        ctx.notify(
            Level::Info,
            format!("Finished in {:.2}s ({} file(s))", elapsed.as_secs_f64(), files.len()),
        );
        Ok(())
    }

    fn fail(&self, task: &str, stage: &str, error: StageError) -> AssetflowError {
        self.report(task, AssetflowError::from_stage(task, stage, error))
    }

    /// Send one failure notification and hand the error back
    fn report(&self, task: &str, error: AssetflowError) -> AssetflowError {
        let report = FailureReport::from_error(&error);
        let mut notification = Notification::new(task, Level::Error, report.message);
        if let Some((file, line)) = error.location() {
            notification = notification.at(file, line);
        }
        self.inner.notifier.notify(notification);
        error
    }
}
