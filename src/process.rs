//! External command execution
//!
//! The scaffold and verification tools are opaque collaborators: a program,
//! its arguments and a working directory go in, an exit code and captured
//! output come out. [`Executor`] is the seam; [`ProcessExecutor`] is the real
//! implementation backed by `std::process` and `wait-timeout`.

use std::borrow::Cow;
use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use wait_timeout::ChildExt;

use crate::errors::CheckError;

/// Time allowed for the pipe readers to finish after the child exits
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on captured bytes per stream (10MB)
const MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

/// A program plus arguments, without any shell in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, rest)) = argv.split_first() else {
            bail!("command is empty");
        };
        if program.trim().is_empty() {
            bail!("command program is blank");
        }
        Ok(Self {
            program: program.clone(),
            args: rest.iter().map(OsString::from).collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Shell-quoted rendering for logs
    pub fn display(&self) -> String {
        let mut parts = vec![shell_escape::escape(Cow::from(self.program.as_str())).into_owned()];
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            parts.push(shell_escape::escape(arg).into_owned());
        }
        parts.join(" ")
    }

    /// Whether the program resolves on PATH (or is an existing path)
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

/// What an external command left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when killed by a signal or by the timeout
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// stderr followed by stdout, the text scanned for failure markers
    pub fn combined(&self) -> String {
        if self.stdout.is_empty() {
            return self.stderr.clone();
        }
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stderr, self.stdout)
    }
}

/// Runs an external command to completion.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        command: &CommandSpec,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, CheckError>;
}

/// Executes commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(
        &self,
        command: &CommandSpec,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, CheckError> {
        let start = Instant::now();
        let exec_err = |source: std::io::Error| CheckError::Exec {
            command: command.display(),
            source,
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        // Own process group, so a timeout can take down grandchildren that
        // still hold the output pipes.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!(command = %command.display(), "spawning");
        let mut child = cmd.spawn().map_err(exec_err)?;

        // Drain both pipes while waiting, or a chatty child blocks on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(timeout) {
            Ok(status) => status,
            Err(e) => {
                kill(&mut child);
                return Err(exec_err(e));
            }
        };
        if status.is_none() {
            kill(&mut child);
        }
        let duration = start.elapsed();

        let stdout = stdout.collect(OUTPUT_COLLECTION_TIMEOUT);
        let mut stderr = stderr.collect(OUTPUT_COLLECTION_TIMEOUT);

        let timed_out = status.is_none();
        if timed_out {
            stderr.push_str(&format!(
                "\n[Process killed after {}s timeout]",
                timeout.as_secs()
            ));
        }

        Ok(CommandOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            timed_out,
            duration,
        })
    }
}

/// Bytes read from one pipe so far
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
    failed: bool,
}

impl Captured {
    fn render(&self) -> String {
        if self.failed && self.bytes.is_empty() {
            return "[error reading output]".to_string();
        }
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str("\n[output truncated at 10MB]");
        }
        text
    }
}

/// A pipe being drained on its own thread
struct Drain {
    captured: Arc<Mutex<Captured>>,
    done: mpsc::Receiver<()>,
}

impl Drain {
    /// Wait for the reader to hit EOF, then render what it read. If the pipe
    /// stays open past `timeout`, the output read so far is kept.
    fn collect(self, timeout: Duration) -> String {
        let finished = self.done.recv_timeout(timeout).is_ok();
        let captured = self.captured.lock().unwrap_or_else(|e| e.into_inner());
        let mut text = captured.render();
        if !finished {
            text.push_str("\n[output collection timed out]");
        }
        text
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Drain {
    let captured = Arc::new(Mutex::new(Captured::default()));
    let (tx, done) = mpsc::channel();
    match stream {
        Some(stream) => {
            let sink = Arc::clone(&captured);
            thread::spawn(move || {
                read_into(stream, &sink);
                let _ = tx.send(());
            });
        }
        None => {
            let _ = tx.send(());
        }
    }
    Drain { captured, done }
}

/// Read a stream into `sink`, keeping at most MAX_OUTPUT_SIZE bytes.
/// The rest is read and discarded so the writer never sees a broken pipe.
fn read_into<R: Read>(mut stream: R, sink: &Mutex<Captured>) {
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let mut captured = sink.lock().unwrap_or_else(|e| e.into_inner());
                let room = MAX_OUTPUT_SIZE.saturating_sub(captured.bytes.len());
                captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
                if n > room {
                    captured.truncated = true;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(_) => {
                sink.lock().unwrap_or_else(|e| e.into_inner()).failed = true;
                break;
            }
        }
    }
}

#[cfg(test)]
fn read_capped<R: Read>(stream: R) -> String {
    let sink = Mutex::new(Captured::default());
    read_into(stream, &sink);
    let captured = sink.into_inner().unwrap_or_else(|e| e.into_inner());
    captured.render()
}

/// Kill the child's whole process group, then reap the child.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                tracing::debug!(pid, error = %e, "killpg failed");
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
