// src/supervisor.rs

//! The process supervisor core.
//!
//! A [`Supervisor`] owns the lifecycle of exactly one external command
//! invocation at a time: `build` configures a fresh, not-yet-started
//! handle, `execute` starts the child and blocks until it exits or the
//! caller's [`CancelToken`] fires, `kill` forcibly terminates it, and
//! the status accessors expose the completed run's [`ExitReport`].
//!
//! All methods take `&self`; wrap the supervisor in an `Arc` to observe
//! `is_running` or call `kill` from other tasks while `execute` blocks.
//! Concurrent `build`/`execute`/`kill` calls are memory-safe but not
//! serialized against each other; hosts that need mutual exclusion must
//! provide it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use nix::sys::signal::{kill as send_signal, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::errors::ExecError;
use crate::sink::{self, ByteSink, ByteSource, SharedSink};
use crate::status::{ExitReport, StatusCell, UNKNOWN_EXIT_CODE};

/// How long `build` waits between kill attempts on a stale child, and
/// how many attempts it makes before replacing the handle anyway.
const KILL_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const KILL_RETRY_ATTEMPTS: u32 = 20;

/// Lifecycle of a supervisor. Transitions are linear per run:
/// `Unbuilt → Built → Running → Exited`, with `Built` reachable again
/// through a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unbuilt,
    Built,
    Running,
    Exited,
}

/// Run state shared with the background reaper task.
#[derive(Debug, Default)]
struct RunState {
    running: AtomicBool,
    status: StatusCell,
    /// Run identifier, bumped by every `build`. A reaper publishes its
    /// report only while its epoch is still current, so a superseded
    /// run can never leak status into a fresh one.
    epoch: AtomicU64,
    /// Pid of the most recently spawned child; 0 = none yet.
    pid: AtomicI32,
}

impl RunState {
    fn publish(&self, epoch: u64, report: ExitReport) {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.status.publish(report);
        } else {
            debug!("discarding exit report from a superseded run");
        }
    }
}

pub struct Supervisor {
    program: PathBuf,
    args: Vec<String>,
    envs: Option<Vec<(String, String)>>,
    current_dir: Option<PathBuf>,

    // Streams are consumed by the next run; re-arm with the setters.
    stdin: Mutex<Option<ByteSource>>,
    stdout: Mutex<Option<ByteSink>>,
    stderr: Mutex<Option<ByteSink>>,

    /// Not-yet-started handle produced by `build`, consumed by the next
    /// `execute`. Consuming it is what enforces "build before execute".
    command: Mutex<Option<Command>>,

    run: Arc<RunState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Supervisor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: None,
            current_dir: None,
            stdin: Mutex::new(None),
            stdout: Mutex::new(None),
            stderr: Mutex::new(None),
            command: Mutex::new(None),
            run: Arc::new(RunState::default()),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add one environment variable. The first call switches the child
    /// from inheriting the host environment to seeing only the supplied
    /// variables, matching an explicit `KEY=VALUE` vector.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin(self, source: ByteSource) -> Self {
        *lock(&self.stdin) = Some(source);
        self
    }

    pub fn stdout(self, sink: ByteSink) -> Self {
        *lock(&self.stdout) = Some(sink);
        self
    }

    pub fn stderr(self, sink: ByteSink) -> Self {
        *lock(&self.stderr) = Some(sink);
        self
    }

    /// Re-arm the stdout sink for the next `build` + `execute`.
    pub fn set_stdout(&self, sink: ByteSink) {
        *lock(&self.stdout) = Some(sink);
    }

    /// Re-arm the stderr sink for the next `build` + `execute`.
    pub fn set_stderr(&self, sink: ByteSink) {
        *lock(&self.stderr) = Some(sink);
    }

    /// Re-arm the stdin source for the next `build` + `execute`.
    pub fn set_stdin(&self, source: ByteSource) {
        *lock(&self.stdin) = Some(source);
    }

    /// (Re)configure the OS process handle from the current fields.
    ///
    /// If a previous child is still alive this first tries to kill it in
    /// a bounded retry loop; if the child survives every attempt the old
    /// handle is replaced anyway (best-effort, logged). Exit status from
    /// the previous run is cleared before returning. The child is not
    /// started here; a bad binary path surfaces at `execute` time.
    pub async fn build(&self) -> &Self {
        if self.is_running() {
            info!(
                program = %self.program.display(),
                "previous child still running; terminating before rebuild"
            );
            for attempt in 1..=KILL_RETRY_ATTEMPTS {
                if !self.is_running() {
                    break;
                }
                if let Err(e) = self.kill() {
                    debug!(attempt, error = %e, "kill during rebuild failed");
                }
                sleep(KILL_RETRY_INTERVAL).await;
            }
            if self.is_running() {
                warn!(
                    program = %self.program.display(),
                    attempts = KILL_RETRY_ATTEMPTS,
                    "stale child survived every kill attempt; replacing handle anyway"
                );
            }
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(envs) = &self.envs {
            cmd.env_clear();
            cmd.envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        // Wire stdio according to which streams are currently supplied.
        // Without a stderr sink, stderr is piped anyway and merged into
        // the stdout sink; without any sink the stream is discarded.
        let has_stdin = lock(&self.stdin).is_some();
        let has_stdout = lock(&self.stdout).is_some();
        let has_stderr = lock(&self.stderr).is_some();
        cmd.stdin(if has_stdin { Stdio::piped() } else { Stdio::null() });
        cmd.stdout(if has_stdout { Stdio::piped() } else { Stdio::null() });
        cmd.stderr(if has_stderr || has_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.kill_on_drop(true);

        *lock(&self.command) = Some(cmd);
        self.run.epoch.fetch_add(1, Ordering::SeqCst);
        self.run.status.clear();
        self
    }

    /// Start the child and block until it exits or `cancel` fires.
    ///
    /// The OS-level wait runs on a background task so this call can race
    /// it against the cancellation token. On cancellation the child is
    /// killed best-effort and [`ExecError::KilledByCancellation`] is
    /// returned immediately; the background task finishes reaping on its
    /// own and still records the exit status for later readers.
    pub async fn execute(&self, cancel: CancelToken) -> Result<(), ExecError> {
        let mut cmd = lock(&self.command)
            .take()
            .ok_or(ExecError::NotInitialized)?;
        let epoch = self.run.epoch.load(Ordering::SeqCst);

        info!(
            program = %self.program.display(),
            args = ?self.args,
            "starting child process"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let err = ExecError::StartFailed {
                    program: self.program.display().to_string(),
                    message: e.to_string(),
                };
                error!(
                    program = %self.program.display(),
                    error = %e,
                    "failed to start child process"
                );
                self.run.publish(epoch, ExitReport::start_failed(err.clone()));
                return Err(err);
            }
        };

        if let Some(pid) = child.id() {
            self.run.pid.store(pid as i32, Ordering::SeqCst);
        }
        self.run.running.store(true, Ordering::SeqCst);

        let pumps = self.attach_streams(&mut child);

        let (done_tx, done_rx) = oneshot::channel();
        let run = Arc::clone(&self.run);
        let program = self.program.display().to_string();
        tokio::spawn(async move {
            let mut guard = ReapGuard {
                run,
                epoch,
                program,
                done: Some(done_tx),
            };
            let (report, outcome) = wait_and_report(child, pumps, &guard.program).await;
            guard.run.publish(guard.epoch, report);
            guard.finish(outcome);
        });

        tokio::select! {
            // Once cancellation is observed it wins, even if the child
            // happens to finish in the same instant.
            biased;

            _ = cancel.fired() => {
                warn!(
                    program = %self.program.display(),
                    "cancellation signalled; killing child process"
                );
                if let Err(e) = self.kill() {
                    debug!(error = %e, "kill after cancellation failed");
                }
                Err(ExecError::KilledByCancellation)
            }

            res = done_rx => match res {
                Ok(outcome) => outcome,
                // The reaper's guard always sends before dropping, so
                // this arm means the runtime tore the task down.
                Err(_) => Err(ExecError::AbnormalExit {
                    code: UNKNOWN_EXIT_CODE,
                    message: "supervisor worker dropped without reporting".into(),
                }),
            },
        }
    }

    /// Forcibly terminate the child with `SIGKILL`.
    ///
    /// A no-op returning `Ok` when nothing was ever spawned. Safe to
    /// call repeatedly; each call is an independent attempt, and a child
    /// that already exited surfaces as a "process already finished"
    /// error without touching the recorded exit status.
    pub fn kill(&self) -> std::io::Result<()> {
        let pid = self.run.pid.load(Ordering::SeqCst);
        if pid == 0 {
            return Ok(());
        }
        info!(
            program = %self.program.display(),
            pid,
            "sending SIGKILL to child process"
        );
        send_signal(Pid::from_raw(pid), Signal::SIGKILL).map_err(|errno| match errno {
            nix::errno::Errno::ESRCH => std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "process already finished",
            ),
            other => std::io::Error::from(other),
        })
    }

    /// Lock-free running flag; `false` before anything was spawned.
    pub fn is_running(&self) -> bool {
        self.run.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> State {
        if self.is_running() {
            return State::Running;
        }
        if self.run.status.get().is_some() {
            return State::Exited;
        }
        if self.run.epoch.load(Ordering::SeqCst) > 0 {
            return State::Built;
        }
        State::Unbuilt
    }

    /// Pid of the most recently spawned child, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.run.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid as u32),
        }
    }

    /// The completed run's error; `None` before any run has finished and
    /// after a clean exit.
    pub fn last_error(&self) -> Option<ExecError> {
        self.run.status.get().and_then(|report| report.error.clone())
    }

    /// The completed run's exit code; `0` before any run has finished.
    pub fn exit_code(&self) -> i32 {
        self.run.status.get().map(|report| report.code).unwrap_or(0)
    }

    /// The completed run's diagnostic message; empty before any run has
    /// finished and after a clean exit.
    pub fn exit_message(&self) -> String {
        self.run
            .status
            .get()
            .map(|report| report.message.clone())
            .unwrap_or_default()
    }

    /// Spawn pump tasks wiring the child's pipes to the supplied
    /// streams. Returns the handles for stdout/stderr so the reaper can
    /// drain them fully before publishing the exit report.
    fn attach_streams(&self, child: &mut Child) -> Vec<JoinHandle<()>> {
        if let Some(stdin) = child.stdin.take() {
            if let Some(source) = lock(&self.stdin).take() {
                tokio::spawn(sink::feed_stdin(source, stdin));
            }
        }

        let stdout_sink: Option<SharedSink> = lock(&self.stdout)
            .take()
            .map(|s| Arc::new(tokio::sync::Mutex::new(s)));
        let stderr_sink: Option<SharedSink> = lock(&self.stderr)
            .take()
            .map(|s| Arc::new(tokio::sync::Mutex::new(s)));

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            if let Some(sink) = stdout_sink.clone() {
                pumps.push(tokio::spawn(sink::pump("stdout", stdout, sink)));
            }
        }
        if let Some(stderr) = child.stderr.take() {
            // No dedicated stderr sink: merge into the stdout sink.
            if let Some(sink) = stderr_sink.or_else(|| stdout_sink.clone()) {
                pumps.push(tokio::spawn(sink::pump("stderr", stderr, sink)));
            }
        }
        pumps
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Wait for the child, drain the output pumps, and translate the OS
/// status into a report plus the result `execute` hands its caller.
async fn wait_and_report(
    mut child: Child,
    pumps: Vec<JoinHandle<()>>,
    program: &str,
) -> (ExitReport, Result<(), ExecError>) {
    let wait_res = child.wait().await;

    // Let the pumps see EOF and flush before the status becomes visible.
    for pump in pumps {
        if let Err(e) = pump.await {
            debug!(program, error = %e, "output pump task failed");
        }
    }

    match wait_res {
        Ok(status) if status.success() => {
            info!(program, "child process exited cleanly");
            (ExitReport::clean(), Ok(()))
        }
        Ok(status) => {
            let code = status.code().unwrap_or(UNKNOWN_EXIT_CODE);
            let message = status.to_string();
            warn!(
                program,
                code,
                message = %message,
                "child process exited abnormally"
            );
            let err = ExecError::AbnormalExit {
                code,
                message: message.clone(),
            };
            let report = ExitReport {
                code,
                message,
                error: Some(err.clone()),
            };
            (report, Err(err))
        }
        Err(e) => {
            warn!(program, error = %e, "waiting on child process failed");
            let message = e.to_string();
            let err = ExecError::AbnormalExit {
                code: UNKNOWN_EXIT_CODE,
                message: message.clone(),
            };
            let report = ExitReport {
                code: UNKNOWN_EXIT_CODE,
                message,
                error: Some(err.clone()),
            };
            (report, Err(err))
        }
    }
}

/// Scoped bookkeeping for one reaper task.
///
/// `finish` is the normal path: it clears the running flag and releases
/// the caller through the done channel. If the task unwinds first,
/// `Drop` recovers the fault: logs it, records an unknown-exit report,
/// and still releases the caller so a worker bug never wedges the host
/// or leaves the supervisor marked running.
struct ReapGuard {
    run: Arc<RunState>,
    epoch: u64,
    program: String,
    done: Option<oneshot::Sender<Result<(), ExecError>>>,
}

impl ReapGuard {
    fn finish(&mut self, outcome: Result<(), ExecError>) {
        self.run.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.done.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for ReapGuard {
    fn drop(&mut self) {
        let Some(tx) = self.done.take() else {
            return;
        };
        error!(
            program = %self.program,
            "supervisor worker faulted while waiting on the child"
        );
        let message = "supervisor worker faulted while waiting on the child".to_string();
        let err = ExecError::AbnormalExit {
            code: UNKNOWN_EXIT_CODE,
            message: message.clone(),
        };
        self.run
            .publish(self.epoch, ExitReport::abnormal(UNKNOWN_EXIT_CODE, message));
        self.run.running.store(false, Ordering::SeqCst);
        let _ = tx.send(Err(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_supervisor_reads_zero_values() {
        let sup = Supervisor::new("/bin/true");
        assert!(!sup.is_running());
        assert_eq!(sup.state(), State::Unbuilt);
        assert_eq!(sup.exit_code(), 0);
        assert_eq!(sup.exit_message(), "");
        assert!(sup.last_error().is_none());
        assert!(sup.pid().is_none());
    }

    #[test]
    fn kill_before_build_is_a_noop() {
        let sup = Supervisor::new("/bin/true");
        assert!(sup.kill().is_ok());
    }

    #[tokio::test]
    async fn execute_without_build_fails() {
        let sup = Supervisor::new("/bin/true");
        let err = sup.execute(CancelToken::never()).await.unwrap_err();
        assert_eq!(err, ExecError::NotInitialized);
    }

    #[tokio::test]
    async fn build_transitions_to_built_and_resets_status() {
        let sup = Supervisor::new("/bin/sh").args(["-c", "exit 3"]);
        sup.build().await;
        assert_eq!(sup.state(), State::Built);

        let err = sup.execute(CancelToken::never()).await.unwrap_err();
        assert!(matches!(err, ExecError::AbnormalExit { code: 3, .. }));
        assert_eq!(sup.state(), State::Exited);
        assert_eq!(sup.exit_code(), 3);

        sup.build().await;
        assert_eq!(sup.state(), State::Built);
        assert_eq!(sup.exit_code(), 0);
        assert!(sup.last_error().is_none());
    }

    #[tokio::test]
    async fn execute_consumes_the_built_command() {
        let sup = Supervisor::new("/bin/true");
        sup.build().await;
        sup.execute(CancelToken::never()).await.unwrap();

        let err = sup.execute(CancelToken::never()).await.unwrap_err();
        assert_eq!(err, ExecError::NotInitialized);
    }
}
