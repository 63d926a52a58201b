// ============================================================================
// paracoder-core/src/process/runner.rs
// ============================================================================
//
// PROCESS PIPELINE RUNNER: Executing One Command Line
//
// A command line may chain several programs with `|`. Each stage is
// tokenized through the OsNative capability and the stages are started
// with their standard streams connected: the first stage reads the
// controlling process's stdin, every stage writes errors to its stderr and
// the last stage writes to its stdout. Only the last stage is waited on,
// and only up to the configured ceiling.
//
// KEY COMPONENTS:
// - ProcessRunner: Spawns, polls and reaps a pipeline
// - split_pipeline: Splits a command line on unquoted `|`

// ---- Internal crate imports ----
use super::registry::{ChildRegistry, SharedChild, global_children, lock_child};
use crate::config::Timeouts;
use crate::error::{CoreError, CoreResult, EXIT_SOFTWARE, invalid_command};
use crate::external::OsNative;

// ---- External crate imports ----
use log::{debug, error};

// ---- Standard library imports ----
use std::process::{ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Runs command lines as OS process pipelines.
#[derive(Clone)]
pub struct ProcessRunner {
    os: Arc<dyn OsNative>,
    registry: Arc<ChildRegistry>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ProcessRunner {
    /// Creates a runner that registers its children process-wide.
    pub fn new(os: Arc<dyn OsNative>, timeouts: &Timeouts) -> Self {
        Self {
            os,
            registry: global_children(),
            timeout: timeouts.process,
            poll_interval: timeouts.poll_interval,
        }
    }

    /// Uses a dedicated registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<ChildRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn os(&self) -> &Arc<dyn OsNative> {
        &self.os
    }

    /// Runs a command line and returns the exit code of its last stage.
    ///
    /// A stage killed by a signal reports [`EXIT_SOFTWARE`]. When the last
    /// stage is still running after the ceiling, every stage is killed and
    /// [`CoreError::Timeout`] is returned.
    pub fn run(&self, command_line: &str) -> CoreResult<i32> {
        debug!("Recode command: {}", command_line);
        let stages = split_pipeline(command_line)?;
        let argvs = stages
            .iter()
            .map(|stage| self.os.tokenize(stage))
            .collect::<CoreResult<Vec<Vec<String>>>>()?;

        let running = self.spawn_pipeline(command_line, &argvs)?;
        let result = self.wait_last(command_line, &running);
        self.reap(&running, result.is_err());
        result
    }

    fn spawn_pipeline(&self, command_line: &str, argvs: &[Vec<String>]) -> CoreResult<Vec<(u64, SharedChild)>> {
        let mut running: Vec<(u64, SharedChild)> = Vec::with_capacity(argvs.len());
        let mut upstream: Option<ChildStdout> = None;
        let last = argvs.len().saturating_sub(1);

        for (index, argv) in argvs.iter().enumerate() {
            let Some((program, args)) = argv.split_first() else {
                self.reap(&running, true);
                return Err(invalid_command(command_line, "empty pipeline stage"));
            };

            let mut command = Command::new(program);
            command.args(args).stderr(Stdio::inherit());
            match upstream.take() {
                Some(stdout) => command.stdin(Stdio::from(stdout)),
                None => command.stdin(Stdio::inherit()),
            };
            if index == last {
                command.stdout(Stdio::inherit());
            } else {
                command.stdout(Stdio::piped());
            }

            match command.spawn() {
                Ok(mut child) => {
                    upstream = child.stdout.take();
                    running.push(self.registry.register(child));
                }
                Err(e) => {
                    error!("Failed to start '{}': {}", program, e);
                    self.reap(&running, true);
                    return Err(CoreError::CommandStart(command_line.to_string(), e));
                }
            }
        }

        Ok(running)
    }

    fn wait_last(&self, command_line: &str, running: &[(u64, SharedChild)]) -> CoreResult<i32> {
        let Some((_, last)) = running.last() else {
            return Err(invalid_command(command_line, "empty pipeline"));
        };
        let start = Instant::now();

        loop {
            let polled = lock_child(last).try_wait();
            match polled {
                Ok(Some(status)) => return Ok(exit_code(status)),
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        error!("Waiting time for recode command has expired: {}", command_line);
                        return Err(CoreError::Timeout {
                            command: command_line.to_string(),
                            timeout: self.timeout,
                        });
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(e) => return Err(CoreError::CommandWait(command_line.to_string(), e)),
            }
        }
    }

    /// Waits for every stage, killing the ones still running when `kill`
    /// is set or when an upstream stage outlived the last one.
    fn reap(&self, running: &[(u64, SharedChild)], kill: bool) {
        for (id, child) in running {
            let mut child = lock_child(child);
            let finished = matches!(child.try_wait(), Ok(Some(_)));
            if !finished {
                if !kill {
                    debug!("Stage {} outlived the pipeline, killing it", child.id());
                }
                let _ = child.kill();
                let _ = child.wait();
            }
            self.registry.deregister(*id);
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(EXIT_SOFTWARE)
}

/// Splits a command line into pipeline stages on `|` outside double quotes.
pub fn split_pipeline(command_line: &str) -> CoreResult<Vec<&str>> {
    let mut stages = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut stage_start = 0;

    for (index, c) in command_line.char_indices() {
        match c {
            '\\' => {
                escaped = !escaped;
                continue;
            }
            '"' if !escaped => in_quotes = !in_quotes,
            '|' if !in_quotes => {
                stages.push(&command_line[stage_start..index]);
                stage_start = index + 1;
            }
            _ => {}
        }
        escaped = false;
    }
    stages.push(&command_line[stage_start..]);

    let stages: Vec<&str> = stages.into_iter().map(str::trim).collect();
    if stages.iter().any(|stage| stage.is_empty()) {
        return Err(invalid_command(command_line, "empty pipeline stage"));
    }
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mocks::RecordingOsNative;

    fn runner(timeout: Duration) -> (ProcessRunner, Arc<ChildRegistry>) {
        let registry = Arc::new(ChildRegistry::new());
        let timeouts = Timeouts {
            process: timeout,
            poll_interval: Duration::from_millis(20),
            ..Timeouts::default()
        };
        let runner = ProcessRunner::new(Arc::new(RecordingOsNative::new()), &timeouts)
            .with_registry(Arc::clone(&registry));
        (runner, registry)
    }

    #[test]
    fn test_split_pipeline() {
        assert_eq!(split_pipeline("a b").unwrap(), vec!["a b"]);
        assert_eq!(split_pipeline("a | b |c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            split_pipeline(r#"enc -metadata TITLE="A | B" out | tee "x\"|y""#).unwrap(),
            vec![r#"enc -metadata TITLE="A | B" out"#, r#"tee "x\"|y""#]
        );
        assert!(matches!(split_pipeline("a || b"), Err(CoreError::InvalidCommand { .. })));
        assert!(split_pipeline("  ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_returns_exit_code_of_last_stage() {
        let (runner, registry) = runner(Duration::from_secs(30));
        assert_eq!(runner.run("true").unwrap(), 0);
        assert_eq!(runner.run("sh -c 'exit 3'").unwrap(), 3);
        assert_eq!(runner.run("false | true").unwrap(), 0);
        assert_eq!(runner.run("echo hello | grep -q nothing").unwrap(), 1);
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_pipes_stages_together() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("out.txt");
        let (runner, _) = runner(Duration::from_secs(30));
        let command = format!(r#"printf "a|b" | tr "|" "-" | tee "{}""#, out.display());
        assert_eq!(runner.run(&command)?, 0);
        assert_eq!(std::fs::read_to_string(&out)?, "a-b");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_run_missing_program() {
        let (runner, registry) = runner(Duration::from_secs(30));
        let result = runner.run("definitely-not-a-real-program-paracoder --flag");
        assert!(matches!(result, Err(CoreError::CommandStart(..))));
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_times_out_and_kills_pipeline() {
        let (runner, registry) = runner(Duration::from_millis(300));
        let start = Instant::now();
        let result = runner.run("sleep 30 | sleep 30");
        assert!(matches!(result, Err(CoreError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(registry.is_empty());
    }
}
