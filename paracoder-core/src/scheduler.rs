// ============================================================================
// paracoder-core/src/scheduler.rs
// ============================================================================
//
// WORK SCHEDULER: Bounded Worker Pool and Per-Unit Continuations
//
// Work units run on a fixed set of named worker threads fed from a bounded
// queue. When the queue is full the submitting thread runs the unit itself,
// which throttles discovery instead of growing the queue. Every unit runs
// its pipeline and then a short chain of post-actions (timestamp copy,
// trash) whose failures are values, reduced to one exit code per unit.
//
// KEY COMPONENTS:
// - WorkerPool: Named threads, bounded queue, caller-runs on saturation
// - WorkScheduler: Submits units and returns UnitHandles
// - UnitHandle: Waits for a unit's Outcome with a deadline
// - PostActions: Which continuations run after a successful pipeline

// ---- Internal crate imports ----
use crate::config::{BatchParams, Timeouts, WORK_QUEUE_CAPACITY};
use crate::error::{CoreError, CoreResult, EXIT_OK, EXIT_SOFTWARE};
use crate::process::{ChildRegistry, ProcessRunner};
use crate::terminal;
use crate::unit::{Outcome, WorkUnit};

// ---- External crate imports ----
use filetime::FileTime;
use log::{debug, error, info, warn};

// ---- Standard library imports ----
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// WORKER POOL
// ============================================================================

/// Fixed size thread pool with a bounded queue and a caller-runs policy.
pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    registry: Arc<ChildRegistry>,
    shutdown_grace: Duration,
}

impl WorkerPool {
    /// Starts `thread_count` workers named `recode-worker-<n>`.
    pub fn new(
        thread_count: usize,
        queue_capacity: usize,
        registry: Arc<ChildRegistry>,
        shutdown_grace: Duration,
    ) -> CoreResult<Self> {
        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(thread_count);
        for n in 0..thread_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let cancelled = Arc::clone(&cancelled);
            let handle = thread::Builder::new()
                .name(format!("recode-worker-{}", n))
                .spawn(move || worker_loop(&receiver, &cancelled))?;
            workers.push(handle);
        }
        debug!("Started worker pool with {} threads", workers.len());

        Ok(Self {
            sender: Some(sender),
            workers,
            cancelled,
            registry,
            shutdown_grace,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues a job, or runs it on the calling thread when the queue is full.
    pub fn execute<F>(&self, job: F) -> CoreResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(CoreError::PoolShutDown)?;
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                debug!("Work queue is full, running the job on the submitting thread");
                job();
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(CoreError::PoolShutDown),
        }
    }

    /// Stops accepting work and waits for queued and running jobs.
    ///
    /// Jobs still running after the grace period are abandoned: queued ones
    /// are skipped and every registered child process is killed. Returns
    /// `true` when the pool finished within the grace period.
    pub fn shutdown(&mut self) -> bool {
        let Some(sender) = self.sender.take() else {
            return true;
        };
        drop(sender);

        let deadline = Instant::now() + self.shutdown_grace;
        while Instant::now() < deadline && !self.workers.iter().all(|w| w.is_finished()) {
            thread::sleep(Duration::from_millis(20));
        }

        let clean = self.workers.iter().all(|w| w.is_finished());
        if !clean {
            warn!(
                "Worker pool did not finish within {:?}, terminating running processes",
                self.shutdown_grace
            );
            self.cancelled.store(true, Ordering::SeqCst);
            let killed = self.registry.terminate_all();
            debug!("Terminated {} child processes", killed);
        }

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("A worker thread panicked");
            }
        }
        clean
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>, cancelled: &AtomicBool) {
    loop {
        let job = receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recv();
        let Ok(job) = job else {
            break;
        };
        if cancelled.load(Ordering::SeqCst) {
            debug!("Skipping queued job after cancellation");
            continue;
        }
        // A panicking job drops its result sender; its handle reports failure
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("Work unit panicked on {:?}", thread::current().name());
        }
    }
}

// ============================================================================
// POST ACTIONS
// ============================================================================

/// Continuations applied after a pipeline exits with success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostActions {
    pub preserve_timestamp: bool,
    pub delete_to_trash: bool,
}

impl PostActions {
    pub fn from_params(params: &BatchParams) -> Self {
        Self {
            preserve_timestamp: params.preserve_file_timestamp,
            delete_to_trash: params.delete_to_trash,
        }
    }
}

/// Runs one unit and reduces everything that happened to an exit code.
fn run_unit(runner: &ProcessRunner, unit: &WorkUnit, actions: PostActions) -> Outcome {
    let label = unit.label();
    let worker = thread::current().name().unwrap_or("main").to_string();
    terminal::print_processing(&worker, &label);

    let result = runner.run(&unit.command).and_then(|code| {
        if code != EXIT_OK {
            return Ok(code);
        }
        if actions.preserve_timestamp {
            preserve_timestamp(&unit.target_path()?, unit.source_modified)?;
        }
        if actions.delete_to_trash && unit.is_trashable() {
            runner.os().move_to_trash(&[unit.input_path().to_path_buf()])?;
        }
        Ok(code)
    });

    let exit_code = match result {
        Ok(EXIT_OK) => {
            info!("Completed OK {}", label);
            terminal::print_completed(&label);
            EXIT_OK
        }
        Ok(code) => {
            error!("Error on processing source file: {} (exit code {})", label, code);
            terminal::print_unit_error(&label);
            code
        }
        Err(e) => {
            error!("Error on processing source file: {}: {}", label, e);
            terminal::print_unit_error(&label);
            EXIT_SOFTWARE
        }
    };
    Outcome::new(label, exit_code)
}

/// Sets the modification time of `target`, skipping the call when it
/// already matches. `target` may be a file or a directory.
pub fn preserve_timestamp(target: &Path, modified: FileTime) -> CoreResult<()> {
    let current = FileTime::from_last_modification_time(&fs::metadata(target)?);
    if current != modified {
        filetime::set_file_mtime(target, modified)?;
    }
    Ok(())
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Progress of one unit as reported by the thread running it.
enum UnitEvent {
    Started(Instant),
    Finished(Outcome),
}

/// Pending result of one submitted unit.
pub struct UnitHandle {
    label: String,
    receiver: Receiver<UnitEvent>,
    unit_timeout: Duration,
}

impl UnitHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// A handle for a unit that failed before it could be submitted.
    pub fn completed(outcome: Outcome) -> Self {
        let (sender, receiver) = mpsc::channel();
        let label = outcome.label.clone();
        let _ = sender.send(UnitEvent::Finished(outcome));
        Self {
            label,
            receiver,
            unit_timeout: Duration::ZERO,
        }
    }

    /// Waits until the unit finishes, its own deadline passes or `limit`
    /// passes, whichever comes first.
    ///
    /// The unit deadline counts from the moment a worker starts the unit,
    /// so time spent in the queue is never charged to it. Returns `None`
    /// only when `limit` expired first; a unit running past its own
    /// deadline counts as failed.
    pub fn wait(&self, limit: Instant) -> Option<Outcome> {
        let mut deadline: Option<Instant> = None;
        loop {
            let until = deadline.map_or(limit, |deadline| deadline.min(limit));
            let timeout = until.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(timeout) {
                Ok(UnitEvent::Started(at)) => deadline = Some(at + self.unit_timeout),
                Ok(UnitEvent::Finished(outcome)) => return Some(outcome),
                Err(RecvTimeoutError::Timeout) => match deadline {
                    Some(deadline) if deadline <= limit => {
                        error!("Unit did not complete in time: {}", self.label);
                        terminal::print_unit_error(&self.label);
                        return Some(Outcome::new(self.label.clone(), EXIT_SOFTWARE));
                    }
                    _ => return None,
                },
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Unit was abandoned before completion: {}", self.label);
                    return Some(Outcome::new(self.label.clone(), EXIT_SOFTWARE));
                }
            }
        }
    }
}

/// Runs work units on a worker pool and hands out their handles.
pub struct WorkScheduler {
    pool: WorkerPool,
    runner: ProcessRunner,
    actions: PostActions,
    unit_timeout: Duration,
}

impl WorkScheduler {
    pub fn new(
        params: &BatchParams,
        runner: ProcessRunner,
        registry: Arc<ChildRegistry>,
        timeouts: &Timeouts,
    ) -> CoreResult<Self> {
        let pool = WorkerPool::new(
            params.thread_count,
            WORK_QUEUE_CAPACITY,
            registry,
            timeouts.shutdown_grace,
        )?;
        Ok(Self {
            pool,
            runner,
            actions: PostActions::from_params(params),
            unit_timeout: timeouts.unit,
        })
    }

    /// Submits a unit; with a saturated pool it runs before this returns.
    pub fn submit(&self, unit: WorkUnit) -> CoreResult<UnitHandle> {
        let (sender, receiver) = mpsc::channel();
        let label = unit.label();
        let runner = self.runner.clone();
        let actions = self.actions;

        self.pool.execute(move || {
            let _ = sender.send(UnitEvent::Started(Instant::now()));
            let outcome = run_unit(&runner, &unit, actions);
            let _ = sender.send(UnitEvent::Finished(outcome));
        })?;

        Ok(UnitHandle {
            label,
            receiver,
            unit_timeout: self.unit_timeout,
        })
    }

    pub fn shutdown(&mut self) -> bool {
        self.pool.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn pool(threads: usize, capacity: usize) -> WorkerPool {
        WorkerPool::new(threads, capacity, Arc::new(ChildRegistry::new()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_pool_runs_every_job_on_named_workers() {
        let mut pool = pool(2, 10);
        let (sender, receiver) = mpsc::channel();
        for _ in 0..6 {
            let sender = sender.clone();
            pool.execute(move || {
                let name = thread::current().name().unwrap_or_default().to_string();
                sender.send(name).unwrap();
            })
            .unwrap();
        }
        drop(sender);
        assert!(pool.shutdown());

        let names: Vec<String> = receiver.iter().collect();
        assert_eq!(names.len(), 6);
        assert!(names.iter().all(|name| name.starts_with("recode-worker-")));
    }

    #[test]
    fn test_pool_runs_on_caller_when_saturated() {
        let mut pool = pool(1, 1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));

        // Occupy the only worker, then fill the one queue slot
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let blocker = Arc::clone(&release_rx);
        pool.execute(move || {
            started_tx.send(()).unwrap();
            blocker.lock().unwrap().recv().unwrap();
        })
        .unwrap();
        started_rx.recv().unwrap();
        pool.execute(|| {}).unwrap();

        let caller = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));
        let ran_on_job = Arc::clone(&ran_on);
        pool.execute(move || {
            *ran_on_job.lock().unwrap() = Some(thread::current().id());
        })
        .unwrap();
        assert_eq!(*ran_on.lock().unwrap(), Some(caller));

        release_tx.send(()).unwrap();
        assert!(pool.shutdown());
    }

    #[test]
    fn test_pool_rejects_after_shutdown() {
        let mut pool = pool(1, 4);
        let counter = Arc::new(AtomicUsize::new(0));
        let job_counter = Arc::clone(&counter);
        pool.execute(move || {
            job_counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(pool.shutdown());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(pool.execute(|| {}), Err(CoreError::PoolShutDown)));
    }

    fn pending_handle(unit_timeout: Duration) -> (mpsc::Sender<UnitEvent>, UnitHandle) {
        let (sender, receiver) = mpsc::channel();
        let handle = UnitHandle {
            label: "slow.flac".to_string(),
            receiver,
            unit_timeout,
        };
        (sender, handle)
    }

    #[test]
    fn test_handle_reports_failure_when_abandoned() {
        let (sender, handle) = pending_handle(Duration::from_secs(5));
        drop(sender);
        let outcome = handle.wait(Instant::now() + Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.exit_code, EXIT_SOFTWARE);
    }

    #[test]
    fn test_handle_deadlines() {
        // Started and never finished: the unit fails at its own deadline
        let (sender, handle) = pending_handle(Duration::from_millis(50));
        sender.send(UnitEvent::Started(Instant::now())).unwrap();
        let outcome = handle.wait(Instant::now() + Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.exit_code, EXIT_SOFTWARE);

        // Batch limit first: no outcome
        let (sender, handle) = pending_handle(Duration::from_secs(5));
        sender.send(UnitEvent::Started(Instant::now())).unwrap();
        assert!(handle.wait(Instant::now() + Duration::from_millis(50)).is_none());

        // Never started: only the batch limit applies
        let (_sender, handle) = pending_handle(Duration::from_millis(10));
        assert!(handle.wait(Instant::now() + Duration::from_millis(100)).is_none());

        let done = UnitHandle::completed(Outcome::new("gone.flac", EXIT_SOFTWARE));
        assert_eq!(done.wait(Instant::now()).unwrap().exit_code, EXIT_SOFTWARE);
    }

    #[test]
    fn test_queue_time_is_not_charged_to_the_unit() {
        let (sender, handle) = pending_handle(Duration::from_millis(200));
        let worker = thread::spawn(move || {
            // Waits in the queue longer than the unit deadline
            thread::sleep(Duration::from_millis(400));
            sender.send(UnitEvent::Started(Instant::now())).unwrap();
            thread::sleep(Duration::from_millis(50));
            sender.send(UnitEvent::Finished(Outcome::new("slow.flac", EXIT_OK))).unwrap();
        });
        let outcome = handle.wait(Instant::now() + Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.exit_code, EXIT_OK);
        worker.join().unwrap();
    }

    #[test]
    fn test_preserve_timestamp() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("out.opus");
        fs::write(&target, b"x")?;
        let wanted = FileTime::from_unix_time(1_000_000_000, 0);
        preserve_timestamp(&target, wanted)?;
        assert_eq!(FileTime::from_last_modification_time(&fs::metadata(&target)?), wanted);
        preserve_timestamp(&target, wanted)?;

        assert!(preserve_timestamp(&dir.path().join("missing"), wanted).is_err());
        Ok(())
    }
}
