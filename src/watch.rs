// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Watch mode
//!
//! [`WatchBindings`] map changed paths to the watched tasks whose trigger
//! patterns match them. [`TaskScheduler`] starts those tasks and applies the
//! [`OverlapPolicy`] when a task is triggered while it is still running.
//! [`watch_loop`] ties both to file-system events.

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::errors::{AssetflowError, AssetflowResult};
use crate::files::SourcePatterns;
use crate::pipeline::{BuildFile, Runner, TaskDef, TaskGraph};

/// What to do when a task is triggered while an instance is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the trigger
    Ignore,
    /// Run once more after the current run; repeated triggers coalesce
    #[default]
    Queue,
    /// Abort the current run and start over
    Restart,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "queue" => Ok(Self::Queue),
            "restart" => Ok(Self::Restart),
            other => Err(format!(
                "invalid overlap policy '{}' (expected ignore, queue or restart)",
                other
            )),
        }
    }
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ignore => "ignore",
            Self::Queue => "queue",
            Self::Restart => "restart",
        })
    }
}

struct Binding {
    task: String,
    /// One set per pipeline the task runs
    patterns: Vec<SourcePatterns>,
}

impl Binding {
    fn matches(&self, relative: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches(relative))
    }
}

/// Trigger patterns of the watched tasks
pub struct WatchBindings {
    bindings: Vec<Binding>,
}

impl WatchBindings {
    /// Bindings for the named tasks, or for every pipeline task when `only`
    /// is empty. A composite name is bound as itself, watching the trigger
    /// patterns of every pipeline it runs, so a change re-runs the whole
    /// composite in its declared order.
    pub fn from_build(build: &BuildFile, only: &[String]) -> AssetflowResult<Self> {
        let graph = TaskGraph::build(build)?;

        let names: Vec<String> = if only.is_empty() {
            build.pipeline_tasks().map(|(name, _)| name.to_string()).collect()
        } else {
            let mut names: Vec<String> = Vec::new();
            for name in only {
                if build.task(name).is_none() {
                    return Err(AssetflowError::UnknownTask {
                        name: name.clone(),
                        available: build.available(),
                    });
                }
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            names
        };

        let mut bindings = Vec::new();
        for name in names {
            let mut patterns = Vec::new();
            for pipeline in graph.pipelines_under(&name) {
                if let Some(TaskDef::Pipeline(task)) = build.task(&pipeline) {
                    patterns.push(SourcePatterns::new(&task.trigger_patterns())?);
                }
            }
            bindings.push(Binding {
                task: name,
                patterns,
            });
        }

        Ok(Self { bindings })
    }

    /// Watched task names
    pub fn tasks(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.task.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Tasks whose patterns match a path relative to the working directory
    pub fn matching_tasks(&self, relative: &Path) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|b| b.matches(relative))
            .map(|b| b.task.clone())
            .collect()
    }

    /// Tasks triggered by a batch of changed absolute paths, without repeats
    pub fn tasks_for_changes(&self, paths: &[PathBuf], working_dir: &Path) -> Vec<String> {
        let mut tasks = Vec::new();
        for path in paths {
            let Ok(relative) = path.strip_prefix(working_dir) else {
                continue;
            };
            for task in self.matching_tasks(relative) {
                if !tasks.contains(&task) {
                    tasks.push(task);
                }
            }
        }
        tasks
    }

    /// Existing directories to watch: glob bases, without nested duplicates
    pub fn roots(&self, working_dir: &Path) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self
            .bindings
            .iter()
            .flat_map(|b| b.patterns.iter().flat_map(SourcePatterns::bases))
            .map(|base| working_dir.join(base))
            .filter(|dir| dir.is_dir())
            .collect();
        bases.sort();
        bases.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !roots.iter().any(|root| base.starts_with(root)) {
                roots.push(base);
            }
        }
        roots
    }
}

#[derive(Default)]
struct Slot {
    running: Option<AbortHandle>,
    pending: bool,
    generation: u64,
}

/// Starts triggered tasks, at most one instance per task
#[derive(Clone)]
pub struct TaskScheduler {
    runner: Runner,
    policy: OverlapPolicy,
    state: Arc<Mutex<HashMap<String, Slot>>>,
}

impl TaskScheduler {
    pub fn new(runner: Runner, policy: OverlapPolicy) -> Self {
        Self {
            runner,
            policy,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start `task`, or apply the overlap policy if it is already running
    pub fn trigger(&self, task: &str) {
        let mut slots = self.slots();
        let slot = slots.entry(task.to_string()).or_default();

        if slot.running.is_some() {
            match self.policy {
                OverlapPolicy::Ignore => {
                    debug!(task, "already running, trigger ignored");
                    return;
                }
                OverlapPolicy::Queue => {
                    debug!(task, "already running, re-run queued");
                    slot.pending = true;
                    return;
                }
                OverlapPolicy::Restart => {
                    debug!(task, "already running, restarting");
                    if let Some(handle) = slot.running.take() {
                        handle.abort();
                    }
                    slot.pending = false;
                }
            }
        }

        slot.generation += 1;
        let generation = slot.generation;
        // The slot lock is held until the handle is stored, so the spawned
        // run cannot observe an empty slot.
        let handle = tokio::spawn(self.clone().drive(task.to_string(), generation));
        slot.running = Some(handle.abort_handle());
    }

    async fn drive(self, task: String, generation: u64) {
        loop {
            if let Err(e) = self.runner.run(&task).await {
                // Already reported through the notifier
                debug!(task = %task, error = %e, "watched task failed");
            }

            let again = {
                let mut slots = self.slots();
                match slots.get_mut(&task) {
                    Some(slot) if slot.generation == generation => {
                        if slot.pending {
                            slot.pending = false;
                            true
                        } else {
                            slot.running = None;
                            false
                        }
                    }
                    _ => false,
                }
            };

            if !again {
                break;
            }
        }
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.slots().get(task).is_some_and(|s| s.running.is_some())
    }

    /// Wait until no task is running
    pub async fn idle(&self) {
        loop {
            let busy = self.slots().values().any(|s| s.running.is_some());
            if !busy {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Watch the bindings' roots and trigger tasks until Ctrl+C
pub async fn watch_loop(
    bindings: &WatchBindings,
    scheduler: &TaskScheduler,
    working_dir: &Path,
    debounce: Duration,
) -> AssetflowResult<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })
    .map_err(|e| AssetflowError::Watch {
        message: format!("Failed to create file watcher: {}", e),
    })?;

    let roots = bindings.roots(working_dir);
    if roots.is_empty() {
        warn!("none of the watched directories exist yet");
    }
    for root in &roots {
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| AssetflowError::Watch {
                message: format!("Failed to watch '{}': {}", root.display(), e),
            })?;
        debug!(root = %root.display(), "watching");
    }

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(Ok(events)) => {
                    let paths: Vec<PathBuf> = events
                        .into_iter()
                        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                        .map(|e| e.path)
                        .collect();

                    for task in bindings.tasks_for_changes(&paths, working_dir) {
                        info!(task = %task, "change detected");
                        scheduler.trigger(&task);
                    }
                }
                Some(Err(e)) => warn!(error = %e, "watch error"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("stopping watch");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MemoryNotifier;

    const BUILD: &str = r#"
tasks:
  lint-scripts:
    src: js/src/*.js
  scripts:
    src: js/src/*.js
  plugin-scripts:
    src: js/plugins/*.js
  styles:
    src: css/main.scss
    watch: ["css/**/*.scss", "!css/vendor/**"]
  js:
    sequence: [lint-scripts, scripts]
"#;

    fn build() -> BuildFile {
        BuildFile::from_yaml(BUILD).unwrap()
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Restart".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Restart));
        assert!("later".parse::<OverlapPolicy>().is_err());
        assert_eq!(OverlapPolicy::default(), OverlapPolicy::Queue);
    }

    #[test]
    fn test_fan_out_to_every_matching_task() {
        let bindings = WatchBindings::from_build(&build(), &[]).unwrap();

        assert_eq!(
            bindings.matching_tasks(Path::new("js/src/app.js")),
            vec!["lint-scripts", "scripts"]
        );
        assert_eq!(
            bindings.matching_tasks(Path::new("js/plugins/slider.js")),
            vec!["plugin-scripts"]
        );
        assert_eq!(bindings.matching_tasks(Path::new("css/partials/_x.scss")), vec!["styles"]);
        assert!(bindings.matching_tasks(Path::new("css/vendor/x.scss")).is_empty());
        assert!(bindings.matching_tasks(Path::new("README.md")).is_empty());
    }

    #[test]
    fn test_composites_are_bound_as_a_whole() {
        let bindings =
            WatchBindings::from_build(&build(), &["js".to_string(), "styles".to_string()]).unwrap();
        assert_eq!(bindings.tasks(), vec!["js", "styles"]);
        assert_eq!(bindings.matching_tasks(Path::new("js/src/app.js")), vec!["js"]);
        assert_eq!(bindings.matching_tasks(Path::new("css/a.scss")), vec!["styles"]);

        let err = WatchBindings::from_build(&build(), &["nope".to_string()]);
        assert!(matches!(err, Err(AssetflowError::UnknownTask { .. })));
    }

    const GATED: &str = r#"
tasks:
  lint-scripts:
    src: js/*.js
    stages:
      - type: lint
        rules:
          no_debugger: true
  scripts:
    src: js/*.js
    stages:
      - type: dest
        dir: dist
  js:
    sequence: [lint-scripts, scripts]
"#;

    #[tokio::test]
    async fn test_watched_composite_keeps_sequence_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/app.js"), "debugger;\n").unwrap();

        let build = BuildFile::from_yaml(GATED).unwrap();
        let bindings = WatchBindings::from_build(&build, &["js".to_string()]).unwrap();
        let runner = Runner::builder(build, dir.path())
            .notifier(Arc::new(MemoryNotifier::new()))
            .build()
            .unwrap();
        let scheduler = TaskScheduler::new(runner, OverlapPolicy::Queue);

        let changed = [dir.path().join("js/app.js")];
        for task in bindings.tasks_for_changes(&changed, dir.path()) {
            scheduler.trigger(&task);
        }
        scheduler.idle().await;

        // The failing lint gate stops the sequence before `scripts`
        assert!(!dir.path().join("dist/app.js").exists());

        std::fs::write(dir.path().join("js/app.js"), "var ok = 1;\n").unwrap();
        for task in bindings.tasks_for_changes(&changed, dir.path()) {
            scheduler.trigger(&task);
        }
        scheduler.idle().await;
        assert!(dir.path().join("dist/app.js").exists());
    }

    #[test]
    fn test_changes_are_deduplicated() {
        let bindings = WatchBindings::from_build(&build(), &[]).unwrap();
        let root = Path::new("/project");
        let tasks = bindings.tasks_for_changes(
            &[
                root.join("js/src/a.js"),
                root.join("js/src/b.js"),
                PathBuf::from("/elsewhere/js/src/c.js"),
            ],
            root,
        );
        assert_eq!(tasks, vec!["lint-scripts", "scripts"]);
    }

    #[test]
    fn test_roots_skip_nested_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("js/src")).unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();

        let bindings = WatchBindings::from_build(&build(), &[]).unwrap();
        let roots = bindings.roots(dir.path());
        assert_eq!(roots, vec![dir.path().join("css"), dir.path().join("js/src")]);
    }

    const SLOW: &str = r#"
tasks:
  slow:
    src: "*.txt"
    stages:
      - type: compile
        command: sh
        args: ["-c", "sleep 0.3; cat"]
        extension: out
"#;

    fn scheduler(policy: OverlapPolicy) -> (TaskScheduler, MemoryNotifier, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let notifier = MemoryNotifier::new();
        let runner = Runner::builder(BuildFile::from_yaml(SLOW).unwrap(), dir.path())
            .notifier(Arc::new(notifier.clone()))
            .build()
            .unwrap();
        (TaskScheduler::new(runner, policy), notifier, dir)
    }

    fn finished(notifier: &MemoryNotifier) -> usize {
        notifier
            .messages()
            .iter()
            .filter(|m| m.starts_with("Finished"))
            .count()
    }

    #[tokio::test]
    async fn test_queue_coalesces_triggers() {
        let (scheduler, notifier, _dir) = scheduler(OverlapPolicy::Queue);

        scheduler.trigger("slow");
        assert!(scheduler.is_running("slow"));
        scheduler.trigger("slow");
        scheduler.trigger("slow");
        scheduler.idle().await;

        assert_eq!(finished(&notifier), 2);
    }

    #[tokio::test]
    async fn test_ignore_drops_triggers() {
        let (scheduler, notifier, _dir) = scheduler(OverlapPolicy::Ignore);

        scheduler.trigger("slow");
        scheduler.trigger("slow");
        scheduler.idle().await;

        assert_eq!(finished(&notifier), 1);
        assert!(!scheduler.is_running("slow"));
    }

    #[tokio::test]
    async fn test_restart_aborts_running_instance() {
        let (scheduler, notifier, _dir) = scheduler(OverlapPolicy::Restart);

        scheduler.trigger("slow");
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.trigger("slow");
        scheduler.idle().await;

        assert_eq!(finished(&notifier), 1);
    }
}
