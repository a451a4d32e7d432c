//! Reload decision state machine.
//!
//! ```text
//!            no changes, not forced
//!   Idle ───────────────────────────▶ Idle (NoChange)
//!    │
//!    │ changes or forced
//!    ▼
//!   BuildInProgress ──exceptions──▶ Failed    (changes restored, force set)
//!    │
//!    └──────success──────────────▶ Succeeded (ReloadRequired | NoReloadNeeded)
//! ```
//!
//! # Invariants
//! - Checks never overlap: one mutex covers the whole check-and-rebuild
//! - The watch thread only touches the [`FileChangeTracker`]
//! - A failed build never loses changes and forces a full rebuild next time
//! - Watching is attempted at most once per process, after the first success

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use super::fingerprint::ClasspathFingerprint;
use crate::analysis::{
    AnalysisReader, JsonAnalysisReader, SourceMap, SourceMaps, SourcePosition, rebuild_source_map,
};
use crate::build::{BuildOutcome, BuildReport, FailureClassifier, RebuildExecutor, Throwable};
use crate::project::{BuildScope, ModuleGraph, ScopeFlags, compute_scope};
use crate::watch::{
    ChangeCallback, ChangeSet, FileChangeTracker, NotifyWatchService, WatchHandle, WatchService,
};
use crate::{debug, log};

/// Where the state machine is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReloadPhase {
    #[default]
    Idle,
    BuildInProgress,
    Failed,
    Succeeded,
}

/// Goal lists and the module additional goals run on.
#[derive(Debug, Clone)]
pub struct ReloadOptions {
    pub goals: Vec<String>,
    pub additional_goals: Vec<String>,
    /// Graph index of the module dev mode was started from.
    pub main_module: usize,
    /// Start watching after the first successful build.
    pub watch: bool,
}

/// State owned by the check-and-rebuild sequence.
#[derive(Default)]
struct Cycle {
    /// Indexed like the graph; `None` until first computed.
    fingerprints: Vec<Option<ClasspathFingerprint>>,
    watch: Option<Box<dyn WatchHandle>>,
    watch_attempted: bool,
}

/// Decides on each check whether to skip, rebuild, or reload.
pub struct Reloader {
    graph: Arc<ModuleGraph>,
    options: ReloadOptions,
    tracker: Arc<FileChangeTracker>,
    executor: RebuildExecutor,
    classifier: FailureClassifier,
    analysis: Arc<dyn AnalysisReader>,
    watch_service: Arc<dyn WatchService>,

    force_reload_next_time: AtomicBool,
    after_first_success: AtomicBool,
    phase: Mutex<ReloadPhase>,
    source_maps: RwLock<SourceMaps>,
    cycle: Mutex<Cycle>,
}

impl Reloader {
    pub fn new(graph: Arc<ModuleGraph>, executor: RebuildExecutor, options: ReloadOptions) -> Self {
        let source_maps = SourceMaps::new(&graph);
        let cycle = Cycle {
            fingerprints: vec![None; graph.len()],
            ..Cycle::default()
        };
        Self {
            graph,
            options,
            tracker: Arc::new(FileChangeTracker::new()),
            executor,
            classifier: FailureClassifier::default(),
            analysis: Arc::new(JsonAnalysisReader),
            watch_service: Arc::new(NotifyWatchService),
            force_reload_next_time: AtomicBool::new(true),
            after_first_success: AtomicBool::new(false),
            phase: Mutex::new(ReloadPhase::Idle),
            source_maps: RwLock::new(source_maps),
            cycle: Mutex::new(cycle),
        }
    }

    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[cfg(test)]
    pub fn with_analysis_reader(mut self, reader: Arc<dyn AnalysisReader>) -> Self {
        self.analysis = reader;
        self
    }

    #[cfg(test)]
    pub fn with_watch_service(mut self, service: Arc<dyn WatchService>) -> Self {
        self.watch_service = service;
        self
    }

    #[cfg(test)]
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &Arc<FileChangeTracker> {
        &self.tracker
    }

    #[cfg(test)]
    pub fn phase(&self) -> ReloadPhase {
        *self.phase.lock()
    }

    pub fn is_after_first_success(&self) -> bool {
        self.after_first_success.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_force_pending(&self) -> bool {
        self.force_reload_next_time.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_watching(&self) -> bool {
        self.cycle.lock().watch.is_some()
    }

    /// Request a full rebuild and reload on the next check.
    pub fn force_reload(&self) {
        self.force_reload_next_time.store(true, Ordering::SeqCst);
    }

    /// Map a class name and line back to its source.
    pub fn find_source(&self, class_name: &str, line: Option<u32>) -> Option<SourcePosition> {
        self.source_maps
            .read()
            .find_source(&self.graph, class_name, line)
    }

    /// Stop watching. Later checks still work, driven by polling only.
    pub fn close(&self) {
        if let Some(handle) = self.cycle.lock().watch.take() {
            handle.close();
        }
    }

    /// Run one reload check.
    pub fn build(&self) -> BuildOutcome {
        let mut cycle = self.cycle.lock();

        // Cleared on entry so a request arriving mid-build survives it.
        let forced = self.force_reload_next_time.swap(false, Ordering::SeqCst);
        if !forced && !self.tracker.has_pending() {
            self.set_phase(ReloadPhase::Idle);
            return BuildOutcome::NoChange;
        }

        let changes = self.tracker.drain_pending();
        let flags = ScopeFlags {
            after_first_success: self.is_after_first_success(),
            force_reload: forced,
        };
        let scope = compute_scope(changes.keys().map(PathBuf::as_path), &self.graph, flags);

        self.set_phase(ReloadPhase::BuildInProgress);
        let report = self.run_scope(&scope);

        match report.exceptions.first() {
            Some(exception) => self.on_failure(&mut cycle, &scope, changes, exception.as_ref()),
            None => self.on_success(&mut cycle, &scope, forced),
        }
    }

    /// Main goals across the scope, then additional goals on the main module.
    fn run_scope(&self, scope: &BuildScope) -> BuildReport {
        if scope.is_empty() {
            debug!("build"; "no module owns the changed files, skipping build");
            return BuildReport::success();
        }

        let names = scope.names(&self.graph);
        if scope.full {
            log!("build"; "building all {} modules", names.len());
        } else {
            log!("build"; "rebuilding {}", names.join(", "));
        }

        let modules = scope
            .modules
            .iter()
            .map(|&i| self.graph.module(i).clone())
            .collect();
        let report = self.executor.execute(modules, self.options.goals.clone());
        let report = self.without_no_sources(report);
        if !report.is_success() || self.options.additional_goals.is_empty() {
            return report;
        }

        let main = self.graph.module(self.options.main_module).clone();
        debug!("build"; "additional goals on {}: {}", main.name, self.options.additional_goals.join(" "));
        self.without_no_sources(
            self.executor
                .execute(vec![main], self.options.additional_goals.clone()),
        )
    }

    /// Drop "nothing to compile" signals; they are not failures.
    fn without_no_sources(&self, mut report: BuildReport) -> BuildReport {
        report.exceptions.retain(|exception| {
            let skip = self.classifier.is_no_sources(exception.as_ref());
            if skip {
                log!("build"; "nothing to compile: {}", exception);
            }
            !skip
        });
        report
    }

    fn on_failure(
        &self,
        cycle: &mut Cycle,
        scope: &BuildScope,
        changes: ChangeSet,
        exception: &dyn Throwable,
    ) -> BuildOutcome {
        self.tracker.restore(changes);
        self.force_reload_next_time.store(true, Ordering::SeqCst);
        self.refresh_fingerprints(cycle, scope);

        let outcome = self.classifier.classify(exception);
        debug!("build"; "{} ({})", outcome.label(), exception);
        self.set_phase(ReloadPhase::Failed);
        outcome
    }

    fn on_success(&self, cycle: &mut Cycle, scope: &BuildScope, forced: bool) -> BuildOutcome {
        if !self.after_first_success.swap(true, Ordering::SeqCst) {
            self.start_watching(cycle);
        }

        self.refresh_source_maps(scope);
        let changed = self.refresh_fingerprints(cycle, scope);

        self.set_phase(ReloadPhase::Succeeded);
        if changed || forced {
            BuildOutcome::ReloadRequired
        } else {
            BuildOutcome::NoReloadNeeded
        }
    }

    /// Watch every module's non-generated roots. Failure degrades to polling.
    fn start_watching(&self, cycle: &mut Cycle) {
        if cycle.watch_attempted {
            return;
        }
        cycle.watch_attempted = true;
        if !self.options.watch {
            debug!("watch"; "file watching disabled");
            return;
        }

        let mut seen = FxHashSet::default();
        let dirs: Vec<PathBuf> = self
            .graph
            .modules()
            .iter()
            .flat_map(|m| m.watch_dirs())
            .filter(|dir| seen.insert(dir.clone()))
            .collect();

        let tracker = Arc::clone(&self.tracker);
        let callback: ChangeCallback = Arc::new(move |path: &Path, timestamp: i64| {
            if tracker.on_change(path, timestamp) {
                debug!("watch"; "changed {}", path.display());
            }
        });

        match self.watch_service.watch(&dirs, callback) {
            Ok(handle) => {
                log!("watch"; "watching {} directories", dirs.len());
                cycle.watch = Some(handle);
            }
            Err(e) => {
                crate::logger::status_warning(&format!(
                    "hot reload disabled: {:#}",
                    anyhow::Error::new(e)
                ));
            }
        }
    }

    /// Rebuild the source maps of every scoped module with analysis data.
    fn refresh_source_maps(&self, scope: &BuildScope) {
        let rebuilt: Vec<(usize, SourceMap)> = scope
            .modules
            .par_iter()
            .filter_map(|&i| self.read_source_map(i).map(|map| (i, map)))
            .collect();

        let mut maps = self.source_maps.write();
        for (i, map) in rebuilt {
            maps.replace(i, map);
        }
    }

    fn read_source_map(&self, i: usize) -> Option<SourceMap> {
        let module = self.graph.module(i);
        let cache = module.analysis_cache.as_ref()?;
        match self.analysis.read_analysis(module, cache) {
            Ok(analysis) => Some(rebuild_source_map(module, &analysis)),
            Err(e) => {
                log!("analysis"; "{}: {:#}, keeping previous source map",
                    module.name, anyhow::Error::new(e));
                None
            }
        }
    }

    /// Recompute fingerprints; `true` if any module's output changed.
    ///
    /// An empty scope (only unowned changes) rechecks every module, so
    /// outputs rewritten outside the build are still noticed.
    fn refresh_fingerprints(&self, cycle: &mut Cycle, scope: &BuildScope) -> bool {
        let indices: Vec<usize> = if scope.is_empty() {
            (0..self.graph.len()).collect()
        } else {
            scope.modules.clone()
        };

        let computed: Vec<(usize, ClasspathFingerprint)> = indices
            .into_par_iter()
            .map(|i| (i, ClasspathFingerprint::compute(&self.graph.module(i).output_dir)))
            .collect();

        let mut changed = false;
        for (i, fingerprint) in computed {
            let differs = cycle.fingerprints[i]
                .as_ref()
                .is_none_or(|previous| fingerprint.differs(previous));
            if differs {
                debug!("reload"; "{} output changed", self.graph.module(i).name);
                changed = true;
            }
            cycle.fingerprints[i] = Some(fingerprint);
        }
        changed
    }

    fn set_phase(&self, phase: ReloadPhase) {
        let mut current = self.phase.lock();
        if *current != phase {
            debug!("reload"; "{:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }
}

impl Drop for Reloader {
    fn drop(&mut self) {
        if let Some(handle) = self.cycle.get_mut().watch.take() {
            handle.close();
        }
    }
}
