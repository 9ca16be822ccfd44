// src/system/executor.rs

//! Process control: one persistent shell process and the commands sent to it.
//!
//! A [`ProcessControl`] spawns the process described by a [`LaunchCommand`] and keeps
//! its stdio pipes. Commands are framed by the transport's dialect and written to
//! stdin one at a time. Output is read back through reader threads (see
//! [`framing`](super::framing)), so a wait can always be interrupted by
//! [`KillHandle::kill`] or by a deadline.

use crate::{
    dialect::ShellDialect,
    models::{TransportId, TtyState},
    system::{
        error::ShellError,
        framing::{BodyRead, ChunkStream, FrameMarker, Waiter},
        provider::LaunchCommand,
    },
};
use log::{debug, trace, warn};
use std::{
    io::{self, ErrorKind, Read, Write},
    process::{Child, ChildStdin, Stdio},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

/// How long a dropped, half-read command may take to drain before the process is killed.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Locks a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTimeouts {
    /// Bound for spawning plus the first framed round trip.
    pub startup: Duration,
    /// Bound for a graceful `exit` in [`ProcessControl::exit_and_wait`] callers.
    pub exit: Duration,
    /// Default bound for a single command. `None` waits forever.
    pub command: Option<Duration>,
}

impl Default for ProcessTimeouts {
    fn default() -> Self {
        Self {
            startup: Duration::from_millis(crate::constants::DEFAULT_STARTUP_TIMEOUT_MS),
            exit: Duration::from_millis(crate::constants::DEFAULT_EXIT_TIMEOUT_MS),
            command: None,
        }
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Exit code and stderr of a command, known once its end marker was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub exit_code: i32,
    pub stderr: String,
}

#[derive(Debug)]
struct Pipes {
    stdin: ChildStdin,
    stdout: ChunkStream,
    stderr: ChunkStream,
}

#[derive(Debug)]
struct ProcessInner {
    id: TransportId,
    launch: LaunchCommand,
    dialect: ShellDialect,
    tty: TtyState,
    timeouts: ProcessTimeouts,
    child: Mutex<Option<Child>>,
    pipes: Mutex<Option<Pipes>>,
    killed: AtomicBool,
    desynchronized: AtomicBool,
    dispatched: AtomicU64,
}

impl ProcessInner {
    fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        if let Some(child) = lock(&self.child).as_mut() {
            debug!("Killing shell process {} (PID: {})...", self.id, child.id());
            if let Err(e) = child.kill() {
                // Already exited.
                debug!("Kill of shell process {} failed as expected: {}", self.id, e);
            }
            child.try_wait().ok();
        }
    }

    /// The output channel can no longer be trusted. Kills the process.
    fn desynchronize(&self) {
        if !self.desynchronized.swap(true, Ordering::SeqCst) {
            warn!("Shell process {} lost command synchronisation, terminating it.", self.id);
        }
        self.kill();
    }

    fn ensure_usable(&self) -> Result<(), ShellError> {
        if self.desynchronized.load(Ordering::SeqCst) {
            return Err(ShellError::Desynchronized(self.id));
        }
        if self.killed.load(Ordering::SeqCst) {
            return Err(ShellError::Killed(self.id));
        }
        let mut child = lock(&self.child);
        match child.as_mut().map(Child::try_wait) {
            None => Err(ShellError::ProcessDied(self.id)),
            Some(Ok(None)) => Ok(()),
            Some(Ok(Some(status))) => {
                debug!("Shell process {} has exited with {}.", self.id, status);
                Err(ShellError::ProcessDied(self.id))
            }
            Some(Err(e)) => Err(ShellError::Io(e)),
        }
    }
}

impl Drop for ProcessInner {
    fn drop(&mut self) {
        let child = self.child.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(child) = child.as_mut()
            && let Ok(None) = child.try_wait()
        {
            debug!("Reaping shell process {} on drop.", self.id);
            child.kill().ok();
            child.wait().ok();
        }
    }
}

/// Kills a process from any thread without waiting on in-flight I/O.
#[derive(Debug, Clone)]
pub struct KillHandle {
    inner: Arc<ProcessInner>,
}

impl KillHandle {
    pub fn kill(&self) {
        self.inner.kill();
    }

    pub fn transport(&self) -> TransportId {
        self.inner.id
    }
}

/// One live shell process.
#[derive(Debug, Clone)]
pub struct ProcessControl {
    inner: Arc<ProcessInner>,
}

impl ProcessControl {
    /// Prepares a process. Nothing is spawned until [`start`](Self::start).
    ///
    /// The framing dialect is the declared dialect of `launch`, otherwise the one implied
    /// by its program name, otherwise `sh`.
    pub fn new(id: TransportId, launch: LaunchCommand, timeouts: ProcessTimeouts) -> Self {
        let dialect = launch
            .dialect
            .or_else(|| ShellDialect::from_executable_name(&launch.program))
            .unwrap_or(ShellDialect::Sh);
        let tty = launch.tty;
        Self {
            inner: Arc::new(ProcessInner {
                id,
                launch,
                dialect,
                tty,
                timeouts,
                child: Mutex::new(None),
                pipes: Mutex::new(None),
                killed: AtomicBool::new(false),
                desynchronized: AtomicBool::new(false),
                dispatched: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> TransportId {
        self.inner.id
    }

    /// The dialect used to frame commands on this process.
    pub fn dialect(&self) -> ShellDialect {
        self.inner.dialect
    }

    pub fn tty(&self) -> TtyState {
        self.inner.tty
    }

    pub fn launch(&self) -> &LaunchCommand {
        &self.inner.launch
    }

    pub fn timeouts(&self) -> ProcessTimeouts {
        self.inner.timeouts
    }

    pub fn pid(&self) -> Option<u32> {
        lock(&self.inner.child).as_ref().map(Child::id)
    }

    /// Number of framed commands written to the process so far, including the handshake.
    pub fn dispatched_commands(&self) -> u64 {
        self.inner.dispatched.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        lock(&self.inner.child).is_some()
    }

    pub fn is_running(&self) -> bool {
        self.inner.ensure_usable().is_ok()
    }

    pub fn kill_handle(&self) -> KillHandle {
        KillHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Spawns the process and confirms it is alive with a framed no-op. Calling it again
    /// on a started process does nothing.
    pub fn start(&self) -> Result<(), ShellError> {
        let started_at = Instant::now();
        {
            let mut slot = lock(&self.inner.child);
            if slot.is_some() {
                drop(slot);
                return self.inner.ensure_usable();
            }
            if self.inner.killed.load(Ordering::SeqCst) {
                return Err(ShellError::Killed(self.inner.id));
            }

            // 1. Spawn with all three pipes captured.
            let launch = &self.inner.launch;
            debug!("Starting shell process {}: {}", self.inner.id, launch.display());
            let mut child = launch
                .to_command()
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| ShellError::Launch {
                    program: launch.program.clone(),
                    source: e,
                })?;

            // 2. Hand the output pipes to reader threads.
            let (Some(stdin), Some(stdout), Some(stderr)) =
                (child.stdin.take(), child.stdout.take(), child.stderr.take())
            else {
                child.kill().ok();
                child.wait().ok();
                return Err(ShellError::ProcessDied(self.inner.id));
            };
            let id = self.inner.id;
            let pipes = Pipes {
                stdin,
                stdout: ChunkStream::spawn(format!("shellctl-{}-stdout", id), stdout)?,
                stderr: ChunkStream::spawn(format!("shellctl-{}-stderr", id), stderr)?,
            };
            *lock(&self.inner.pipes) = Some(pipes);
            *slot = Some(child);
        }

        // 3. Handshake, unless the shell cannot run anything at all.
        if self.inner.dialect.dumb_mode().supports_any_possible_interaction() {
            let handshake = self
                .command(self.inner.dialect.noop_command())
                .with_exit_timeout(self.inner.timeouts.startup)
                .discard_or_throw();
            if let Err(e) = handshake {
                self.kill();
                return Err(e);
            }
        }
        debug!(
            "Shell process {} ready after {:?}.",
            self.inner.id,
            started_at.elapsed()
        );
        Ok(())
    }

    /// Binds already rendered command text to this process.
    pub fn command(&self, text: impl Into<String>) -> CommandControl<'_> {
        CommandControl {
            process: &self.inner,
            text: text.into(),
            timeout: self.inner.timeouts.command,
        }
    }

    /// Sends the exit command, closes stdin and waits for the process to end.
    ///
    /// I/O errors on the way are expected (the process may be gone already) and only
    /// logged. On timeout the process is left running so the caller can [`kill`](Self::kill) it.
    pub fn exit_and_wait(&self, timeout: Duration) -> Result<(), ShellError> {
        if lock(&self.inner.child).is_none() {
            return Ok(());
        }

        // 1. Ask politely, then close our side of every pipe.
        if let Some(mut pipes) = lock(&self.inner.pipes).take() {
            let exit = format!("{}{}", self.inner.dialect.exit_command(), self.inner.dialect.output_newline());
            if let Err(e) = pipes.stdin.write_all(exit.as_bytes()).and_then(|()| pipes.stdin.flush()) {
                debug!("Writing exit to shell process {} failed as expected: {}", self.inner.id, e);
            }
        }

        // 2. Non-blocking wait loop.
        let deadline = Instant::now() + timeout;
        loop {
            let mut slot = lock(&self.inner.child);
            let Some(child) = slot.as_mut() else {
                return Ok(());
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Shell process {} exited with {}.", self.inner.id, status);
                    return Ok(());
                }
                Ok(None) if Instant::now() >= deadline => {
                    return Err(ShellError::Timeout {
                        waiting_for: "waiting for shell exit",
                        after: timeout,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to query status of shell process {}: {}", self.inner.id, e);
                    return Ok(());
                }
            }
            drop(slot);
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Forcefully terminates the process. Safe after exit, and never blocks on I/O.
    pub fn kill(&self) {
        self.inner.kill();
    }
}

// --- COMMANDS ---

/// A command bound to a process, not yet dispatched.
#[derive(Debug)]
pub struct CommandControl<'a> {
    process: &'a ProcessInner,
    text: String,
    timeout: Option<Duration>,
}

impl<'a> CommandControl<'a> {
    /// Bounds the whole command, from dispatch to its end marker.
    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Dispatches the command and returns once its output begins.
    pub fn start(self) -> Result<RunningCommand<'a>, ShellError> {
        let process = self.process;
        process.ensure_usable()?;
        let deadline = self.timeout.map(|t| (Instant::now() + t, t));
        let mut guard = lock(&process.pipes);
        let marker = FrameMarker::new();
        let separate_stderr = process.tty.has_separate_stderr();

        let framed = process.dialect.frame_command(&self.text, &marker, separate_stderr);
        if let Err(e) = dispatch(process, guard.as_mut(), &framed, &marker, deadline) {
            process.desynchronize();
            return Err(e);
        }

        Ok(RunningCommand {
            process,
            guard,
            stdout_needle: process.dialect.stdout_end_needle(&marker),
            stderr_needle: process.dialect.stderr_end_needle(&marker),
            marker,
            deadline,
            separate_stderr,
            display: self.text,
            finished: None,
        })
    }

    /// Runs to completion and captures everything. A nonzero exit is not an error here.
    pub fn execute(self) -> Result<CommandOutput, ShellError> {
        let mut running = self.start()?;
        let stdout = running.read_all()?;
        let completion = running.close()?;
        Ok(CommandOutput {
            exit_code: completion.exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: completion.stderr,
        })
    }

    /// Runs to completion and returns stdout without its trailing line break.
    pub fn read_stdout_or_throw(self) -> Result<String, ShellError> {
        let command = self.text.clone();
        let output = self.execute()?;
        if !output.success() {
            return Err(ShellError::ProcessOutput {
                command,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn discard_or_throw(self) -> Result<(), ShellError> {
        self.read_stdout_or_throw().map(|_| ())
    }

    pub fn discard_and_check_exit(self) -> Result<bool, ShellError> {
        Ok(self.execute()?.success())
    }

    /// Exit code 0 is `true` and 1 is `false`. Any other code means the check itself
    /// is broken (syntax error, command not found) and fails.
    pub fn execute_and_check(self) -> Result<bool, ShellError> {
        let command = self.text.clone();
        let output = self.execute()?;
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            exit_code => Err(ShellError::MalformedCommand {
                command,
                exit_code,
                stderr: output.stderr,
            }),
        }
    }

    /// Raw stdout of the command, for downloads.
    pub fn start_external_stdout(self) -> Result<RunningCommand<'a>, ShellError> {
        self.start()
    }

    /// Raw stdin for the command, which must consume exactly `length` bytes.
    pub fn start_external_stdin(self, length: u64) -> Result<StdinTransfer<'a>, ShellError> {
        Ok(StdinTransfer {
            running: Some(self.start()?),
            expected: length,
            written: 0,
        })
    }
}

/// A dispatched command whose stdout body is being read.
///
/// Holds the process pipes until the end marker is reached. Dropping it early drains
/// the rest; if that fails the process is killed.
#[derive(Debug)]
pub struct RunningCommand<'a> {
    process: &'a ProcessInner,
    guard: MutexGuard<'a, Option<Pipes>>,
    marker: FrameMarker,
    stdout_needle: Vec<u8>,
    stderr_needle: Vec<u8>,
    deadline: Option<(Instant, Duration)>,
    separate_stderr: bool,
    display: String,
    finished: Option<Completion>,
}

impl<'a> RunningCommand<'a> {
    fn waiter(&self) -> Waiter<'a> {
        let process: &'a ProcessInner = self.process;
        Waiter::until(process.id, &process.killed, self.deadline, "waiting for command output")
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ShellError> {
        if self.finished.is_some() {
            return Ok(0);
        }
        let waiter = self.waiter();
        let id = self.process.id;
        let pipes = self.guard.as_mut().ok_or(ShellError::ProcessDied(id))?;
        match pipes.stdout.read_body(buf, &self.stdout_needle, &waiter)? {
            BodyRead::Data(n) => Ok(n),
            BodyRead::End => {
                self.complete()?;
                Ok(0)
            }
        }
    }

    /// Reads the exit code after the stdout end needle, then the stderr frame.
    fn complete(&mut self) -> Result<(), ShellError> {
        let waiter = self.waiter();
        let id = self.process.id;
        let pipes = self.guard.as_mut().ok_or(ShellError::ProcessDied(id))?;
        let line = pipes.stdout.read_line(&waiter)?;
        let exit_code = line
            .trim()
            .parse::<i32>()
            .map_err(|_| ShellError::UnexpectedOutput(format!("'{}' is not an exit code", line.trim())))?;

        let stderr = if self.separate_stderr {
            pipes.stderr.skip_through(self.marker.begin().as_bytes(), &waiter)?;
            pipes.stderr.read_line(&waiter)?;
            let body = pipes.stderr.read_body_to_end(&self.stderr_needle, &waiter)?;
            String::from_utf8_lossy(&body).into_owned()
        } else {
            String::new()
        };
        trace!("[{}] <<< exit {} for '{}'", id, exit_code, self.display);
        self.finished = Some(Completion { exit_code, stderr });
        Ok(())
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ShellError>) -> Result<T, ShellError> {
        let result = f(self);
        if result.is_err() {
            self.process.desynchronize();
        }
        result
    }

    /// Reads the rest of the stdout body.
    pub fn read_all(&mut self) -> Result<Vec<u8>, ShellError> {
        self.guarded(|this| {
            let mut out = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                let n = this.read_chunk(&mut buf)?;
                if n == 0 {
                    return Ok(out);
                }
                out.extend(buf.iter().take(n));
            }
        })
    }

    /// Discards the rest of the body and returns the exit code and stderr.
    pub fn close(mut self) -> Result<Completion, ShellError> {
        self.drain()?;
        // `finished` must stay set, or dropping `self` would drain a completed frame.
        self.finished
            .clone()
            .ok_or(ShellError::Desynchronized(self.process.id))
    }

    fn drain(&mut self) -> Result<(), ShellError> {
        self.guarded(|this| {
            let mut buf = [0u8; 8192];
            while this.read_chunk(&mut buf)? > 0 {}
            Ok(())
        })
    }

    /// Like [`close`](Self::close), failing on a nonzero exit code.
    pub fn close_or_throw(self) -> Result<(), ShellError> {
        let command = self.display.clone();
        let completion = self.close()?;
        if completion.exit_code != 0 {
            return Err(ShellError::ProcessOutput {
                command,
                exit_code: completion.exit_code,
                stdout: String::new(),
                stderr: completion.stderr,
            });
        }
        Ok(())
    }
}

impl Read for RunningCommand<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.guarded(|this| this.read_chunk(buf))
            .map_err(io::Error::other)
    }
}

impl Drop for RunningCommand<'_> {
    fn drop(&mut self) {
        if self.finished.is_some() || self.process.killed.load(Ordering::SeqCst) {
            return;
        }
        let drain_deadline = Instant::now() + DRAIN_TIMEOUT;
        if self.deadline.is_none_or(|(d, _)| d > drain_deadline) {
            self.deadline = Some((drain_deadline, DRAIN_TIMEOUT));
        }
        if let Err(e) = self.drain() {
            warn!(
                "Dropped command '{}' on {} could not be drained: {}",
                self.display, self.process.id, e
            );
        }
    }
}

/// Writes one framed command and consumes its begin marker line.
fn dispatch(
    process: &ProcessInner,
    pipes: Option<&mut Pipes>,
    framed: &str,
    marker: &FrameMarker,
    deadline: Option<(Instant, Duration)>,
) -> Result<(), ShellError> {
    let pipes = pipes.ok_or(ShellError::ProcessDied(process.id))?;
    trace!("[{}] >>> {}", process.id, framed.trim_end());
    pipes
        .stdin
        .write_all(framed.as_bytes())
        .and_then(|()| pipes.stdin.flush())
        .map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => ShellError::ProcessDied(process.id),
            _ => ShellError::Io(e),
        })?;
    process.dispatched.fetch_add(1, Ordering::SeqCst);

    let waiter = Waiter::until(process.id, &process.killed, deadline, "waiting for command output");
    pipes.stdout.skip_through(marker.begin().as_bytes(), &waiter)?;
    pipes.stdout.read_line(&waiter)?;
    Ok(())
}

/// Stdin of a running command, accepting exactly the announced number of bytes.
///
/// Dropping it without [`finish`](Self::finish) leaves the command waiting for input
/// that never comes, so the process is killed.
#[derive(Debug)]
pub struct StdinTransfer<'a> {
    running: Option<RunningCommand<'a>>,
    expected: u64,
    written: u64,
}

impl StdinTransfer<'_> {
    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Checks the byte count, then waits for the command to finish successfully.
    pub fn finish(mut self) -> Result<(), ShellError> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        if self.written != self.expected {
            running.process.desynchronize();
            return Err(ShellError::LengthMismatch {
                expected: self.expected,
                actual: self.written,
            });
        }
        if let Some(pipes) = running.guard.as_mut()
            && let Err(e) = pipes.stdin.flush()
        {
            running.process.desynchronize();
            return Err(ShellError::Io(e));
        }
        running.close_or_throw()
    }
}

impl Write for StdinTransfer<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.expected - self.written;
        let Some(running) = self.running.as_mut() else {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "transfer already finished"));
        };
        if buf.len() as u64 > remaining {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} bytes exceed the {} remaining of the announced length", buf.len(), remaining),
            ));
        }
        let id = running.process.id;
        let pipes = running
            .guard
            .as_mut()
            .ok_or_else(|| io::Error::other(ShellError::ProcessDied(id)))?;
        pipes.stdin.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.running.as_mut().and_then(|r| r.guard.as_mut()) {
            Some(pipes) => pipes.stdin.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StdinTransfer<'_> {
    fn drop(&mut self) {
        if let Some(running) = self.running.as_ref() {
            warn!(
                "Upload for '{}' abandoned after {} of {} bytes.",
                running.display, self.written, self.expected
            );
            running.process.desynchronize();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::system::provider::LaunchCommand;

    fn sh_process() -> ProcessControl {
        let launch = LaunchCommand::for_dialect(ShellDialect::Sh);
        ProcessControl::new(TransportId(0), launch, ProcessTimeouts::default())
    }

    #[test]
    fn test_start_runs_handshake_once() {
        // --- Setup ---
        let process = sh_process();

        // --- Execute ---
        process.start().unwrap();
        process.start().unwrap();

        // --- Assert ---
        assert!(process.is_running());
        assert_eq!(process.dispatched_commands(), 1);
        assert!(process.pid().is_some());
        process.kill();
    }

    #[test]
    fn test_execute_captures_both_streams_and_exit_code() {
        let process = sh_process();
        process.start().unwrap();

        let output = process
            .command("printf 'out'; printf 'err' >&2; exit_code=3; (exit $exit_code)")
            .execute()
            .unwrap();

        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert_eq!(output.exit_code, 3);
        // The session survives a failing command.
        assert_eq!(process.command("echo still here").read_stdout_or_throw().unwrap(), "still here");
    }

    #[test]
    fn test_execute_and_check_distinguishes_false_from_broken() {
        let process = sh_process();
        process.start().unwrap();

        assert!(process.command("true").execute_and_check().unwrap());
        assert!(!process.command("false").execute_and_check().unwrap());
        let err = process.command("(exit 2)").execute_and_check().unwrap_err();
        assert!(matches!(err, ShellError::MalformedCommand { exit_code: 2, .. }));
    }

    #[test]
    fn test_output_without_trailing_newline_and_marker_lookalikes() {
        let process = sh_process();
        process.start().unwrap();

        let text = process
            .command("printf '%s' 'SHELLCTL-fake-end:0'")
            .read_stdout_or_throw()
            .unwrap();
        assert_eq!(text, "SHELLCTL-fake-end:0");
    }

    #[test]
    fn test_streamed_read_then_close() {
        let process = sh_process();
        process.start().unwrap();

        let mut running = process.command("printf 'abc'").start().unwrap();
        let mut buf = String::new();
        running.read_to_string(&mut buf).unwrap();
        let completion = running.close().unwrap();

        assert_eq!(buf, "abc");
        assert_eq!(completion.exit_code, 0);
    }

    #[test]
    fn test_closed_commands_keep_process_usable() {
        // --- Setup ---
        let process = sh_process();
        let started = Instant::now();
        process.start().unwrap();

        // --- Execute ---
        let outputs: Vec<String> = (0..3)
            .map(|i| process.command(format!("echo {}", i)).read_stdout_or_throw().unwrap())
            .collect();

        // --- Assert ---
        assert_eq!(outputs, vec!["0", "1", "2"]);
        assert!(process.is_running());
        assert_eq!(process.dispatched_commands(), 4);
        assert!(started.elapsed() < DRAIN_TIMEOUT);
        process.kill();
    }

    #[test]
    fn test_stdin_transfer_writes_announced_bytes() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("upload.bin");
        let process = sh_process();
        process.start().unwrap();

        // --- Execute ---
        let mut transfer = process
            .command(format!("head -c 5 > '{}'", target.display()))
            .start_external_stdin(5)
            .unwrap();
        transfer.write_all(b"hello").unwrap();
        transfer.finish().unwrap();

        // --- Assert ---
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
        assert_eq!(process.command("echo after").read_stdout_or_throw().unwrap(), "after");
        process.kill();
    }

    #[test]
    fn test_dropped_command_is_drained() {
        let process = sh_process();
        process.start().unwrap();

        {
            let mut running = process.command("printf 'a%.0s' 1 2 3 4 5 6 7 8 9 10").start().unwrap();
            let mut one = [0u8; 1];
            running.read_exact(&mut one).unwrap();
        }

        assert_eq!(process.command("echo next").read_stdout_or_throw().unwrap(), "next");
    }

    #[test]
    fn test_timeout_desynchronizes_process() {
        let process = sh_process();
        process.start().unwrap();

        let err = process
            .command("sleep 5")
            .with_exit_timeout(Duration::from_millis(200))
            .execute()
            .unwrap_err();

        assert!(matches!(err, ShellError::Timeout { .. }));
        assert!(matches!(
            process.command("true").execute().unwrap_err(),
            ShellError::Desynchronized(_)
        ));
    }

    #[test]
    fn test_kill_interrupts_blocked_command() {
        // --- Setup ---
        let process = sh_process();
        process.start().unwrap();
        let handle = process.kill_handle();
        let killer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            handle.kill();
        });

        // --- Execute ---
        let started = Instant::now();
        let result = process.command("sleep 30").execute();
        killer.join().unwrap();

        // --- Assert ---
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!process.is_running());
    }

    #[test]
    fn test_exit_and_wait() {
        let process = sh_process();
        process.start().unwrap();

        process.exit_and_wait(Duration::from_secs(5)).unwrap();

        assert!(!process.is_running());
        assert!(process.command("true").execute().is_err());
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let launch = LaunchCommand::new("/nonexistent/shellctl-no-such-shell").dialect(ShellDialect::Sh);
        let process = ProcessControl::new(TransportId(0), launch, ProcessTimeouts::default());

        assert!(matches!(process.start().unwrap_err(), ShellError::Launch { .. }));
    }
}
