// ============================================================================
// paracoder-core/src/orchestrator.rs
// ============================================================================
//
// RECODE ORCHESTRATOR: Running One Batch from Discovery to Exit Code
//
// The Recoder ties the engine together. One call to `recode` walks the
// phases Idle, Discovering, Scheduling, AwaitingCompletion,
// RepairingDirectories and Done. Failed units never stop the batch; they
// only raise the final exit code, which is the maximum of all unit codes.
//
// The Recoder holds no per-batch state: batch parameters are passed into
// every call, so one instance may serve several batches in turn.
//
// KEY COMPONENTS:
// - Recoder: Configuration, capabilities and the batch driver
// - Phase: States of a batch, logged on every transition
// - BatchReport: Per-unit outcomes and the aggregate exit code

// ---- Internal crate imports ----
use crate::config::{BatchParams, PatternConfig, Timeouts};
use crate::cue::{expand_cue_sheet, filter_ambiguous_sources, is_cue_file, read_cue_sheet};
use crate::discovery::{PathEntry, PathTree, build_path_tree};
use crate::error::{CoreError, CoreResult, EXIT_OK, EXIT_SOFTWARE};
use crate::external::OsNative;
use crate::process::{ChildRegistry, ProcessRunner, global_children};
use crate::scheduler::{UnitHandle, WorkScheduler, preserve_timestamp};
use crate::template::CommandTemplates;
use crate::terminal;
use crate::unit::{Outcome, WorkUnit};

// ---- External crate imports ----
use log::{debug, error, info};

// ---- Standard library imports ----
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// States of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Discovering,
    Scheduling,
    AwaitingCompletion,
    RepairingDirectories,
    Done,
}

fn transition(from: Phase, to: Phase) -> Phase {
    debug!("Batch phase: {:?} -> {:?}", from, to);
    to
}

/// Result of a finished batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
    /// Directories whose timestamp could not be restored
    pub failed_directories: usize,
    pub exit_code: i32,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

/// Drives batches of work units through the engine.
pub struct Recoder {
    patterns: PatternConfig,
    templates: CommandTemplates,
    os: Arc<dyn OsNative>,
    registry: Arc<ChildRegistry>,
    timeouts: Timeouts,
}

impl Recoder {
    pub fn new(patterns: PatternConfig, os: Arc<dyn OsNative>) -> Self {
        let patterns = patterns.normalized();
        Self {
            templates: CommandTemplates::from_config(&patterns),
            patterns,
            os,
            registry: global_children(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Forwards children to `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<ChildRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Recodes one batch and returns the process exit code.
    pub fn recode(&self, params: &BatchParams) -> i32 {
        match self.run_batch(params) {
            Ok(report) => report.exit_code,
            Err(e) => {
                error!("Recode error: {}", e);
                terminal::print_error(&e.to_string());
                e.exit_code()
            }
        }
    }

    /// Recodes one batch and returns its report.
    ///
    /// Errors are batch-level failures only: invalid input, a failed
    /// traversal, missing trash support or the batch ceiling.
    pub fn run_batch(&self, params: &BatchParams) -> CoreResult<BatchReport> {
        let phase = Phase::Idle;
        params.validate()?;
        self.patterns.validate()?;
        if params.delete_to_trash && !self.os.supports_trash() {
            return Err(CoreError::TrashUnsupported);
        }

        let phase = transition(phase, Phase::Discovering);
        let mut tree = build_path_tree(
            &params.input_paths,
            params.max_depth(),
            &self.patterns.file_extensions,
        )?;
        filter_ambiguous_sources(&mut tree);
        if tree.files().next().is_none() {
            return Err(CoreError::NoFilesFound);
        }

        let phase = transition(phase, Phase::Scheduling);
        // Children of this batch only; the shared registry still sees them
        let batch_children = Arc::new(ChildRegistry::scoped(Arc::clone(&self.registry)));
        let runner = ProcessRunner::new(Arc::clone(&self.os), &self.timeouts)
            .with_registry(Arc::clone(&batch_children));
        let mut scheduler = WorkScheduler::new(params, runner, batch_children, &self.timeouts)?;
        let handles = self.schedule(&tree, &scheduler);

        let phase = transition(phase, Phase::AwaitingCompletion);
        let batch_deadline = Instant::now() + self.timeouts.batch;
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in &handles {
            match handle.wait(batch_deadline) {
                Some(outcome) => outcomes.push(outcome),
                None => {
                    error!("Batch ceiling reached while waiting for {}", handle.label());
                    scheduler.shutdown();
                    return Err(CoreError::BatchTimeout(self.timeouts.batch));
                }
            }
        }
        scheduler.shutdown();

        let phase = transition(phase, Phase::RepairingDirectories);
        let failed_directories = if params.preserve_dir_timestamp {
            println!();
            repair_directories(&tree)
        } else {
            0
        };

        transition(phase, Phase::Done);
        let mut exit_code = outcomes.iter().map(|o| o.exit_code).max().unwrap_or(EXIT_OK);
        if failed_directories > 0 {
            exit_code = exit_code.max(EXIT_SOFTWARE);
        }
        let report = BatchReport {
            outcomes,
            failed_directories,
            exit_code,
        };
        terminal::print_summary(report.completed(), report.failed(), report.exit_code);
        Ok(report)
    }

    /// Submits every file of the tree in path order.
    fn schedule(&self, tree: &PathTree, scheduler: &WorkScheduler) -> Vec<UnitHandle> {
        let mut handles = Vec::new();

        for entry in tree.files() {
            let label = entry.path.display().to_string();
            if !entry.path.exists() {
                error!("Source file doesn't exist: {}", label);
                terminal::print_missing_source(&label);
                handles.push(UnitHandle::completed(Outcome::new(label, EXIT_SOFTWARE)));
                continue;
            }

            let units = if is_cue_file(&entry.path) {
                self.cue_units(&entry.path)
            } else {
                self.file_unit(entry).map(|unit| vec![unit])
            };

            let units = match units {
                Ok(units) => units,
                Err(e) => {
                    error!("Error on processing source file: {}: {}", label, e);
                    terminal::print_unit_error(&label);
                    handles.push(UnitHandle::completed(Outcome::new(label, EXIT_SOFTWARE)));
                    continue;
                }
            };

            for unit in units {
                let unit_label = unit.label();
                match scheduler.submit(unit) {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        error!("Failed to submit {}: {}", unit_label, e);
                        handles.push(UnitHandle::completed(Outcome::new(unit_label, EXIT_SOFTWARE)));
                    }
                }
            }
        }

        debug!("Scheduled {} work units", handles.len());
        handles
    }

    fn file_unit(&self, entry: &PathEntry) -> CoreResult<WorkUnit> {
        let command = self.templates.build_command(&entry.extension(), &entry.path)?;
        Ok(WorkUnit::for_file(entry.path.clone(), entry.modified, command))
    }

    fn cue_units(&self, cue_path: &Path) -> CoreResult<Vec<WorkUnit>> {
        let sheet = read_cue_sheet(cue_path)?;
        expand_cue_sheet(&sheet, cue_path)?
            .into_iter()
            .map(|payload| {
                let command = self
                    .templates
                    .build_cue_command(&payload.audio_extension(), &payload)?;
                Ok(WorkUnit::for_cue_track(payload, command))
            })
            .collect()
    }
}

/// Restores directory timestamps deepest first and returns the number of
/// directories that failed.
fn repair_directories(tree: &PathTree) -> usize {
    let mut failed = 0;
    for dir in tree.directories_deepest_first() {
        let label = dir.path.display().to_string();
        terminal::print_dir(&label);
        match preserve_timestamp(&dir.path, dir.modified) {
            Ok(()) => info!("Completed dir OK {}", label),
            Err(e) => {
                error!("Failed to restore timestamp of {}: {}", label, e);
                failed += 1;
            }
        }
    }
    failed
}
