//! Process supervision for external tools
//!
//! Commands run synchronously with piped output, a wall-clock timeout and a
//! terminate-then-kill escalation.

use super::{Outcome, ToolRun};
use crate::config::{ToolCommand, ToolsConfig};
use crate::error::ToolError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const OUTPUT_TAIL_CHARS: usize = 2000;

/// Captured result of a command that ran to completion
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub program: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Report-friendly summary with the tail of both streams
    pub fn to_run(&self) -> ToolRun {
        let combined = if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        };
        ToolRun {
            program: self.program.clone(),
            exit_code: self.exit_code,
            duration_ms: self.duration.as_millis() as u64,
            output_tail: tail_chars(combined.trim(), OUTPUT_TAIL_CHARS),
        }
    }

    pub fn non_zero_exit(&self) -> ToolError {
        ToolError::NonZeroExit {
            program: self.program.clone(),
            code: self.exit_code,
            stderr_tail: tail_chars(self.stderr.trim(), 400),
        }
    }
}

/// Last `max_chars` characters of `s`
pub fn tail_chars(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let count = s.chars().count();
    if count <= max_chars {
        return s.to_string();
    }
    s.chars().skip(count.saturating_sub(max_chars)).collect()
}

/// Run `program` in `cwd`, terminating it when `timeout` elapses.
///
/// On unix the child leads its own process group. On timeout the whole group
/// gets SIGTERM, then `grace` to exit, then SIGKILL, so helpers the tool
/// spawned do not outlive it.
pub fn run_with_timeout(
    program: &Path,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
    grace: Duration,
) -> Result<CommandOutput, ToolError> {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    debug!("Running {} {}", program.display(), args.join(" "));
    let started = Instant::now();
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: name.clone(),
            source,
        })?;

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                terminate(&mut child, Duration::ZERO);
                return Err(ToolError::Spawn {
                    program: name,
                    source,
                });
            }
        }
        if started.elapsed() >= timeout {
            warn!("{} exceeded {}s, terminating", name, timeout.as_secs());
            terminate(&mut child, grace);
            // Readers are left detached: a grandchild may still hold the pipes.
            return Err(ToolError::TimedOut {
                program: name,
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        program: name,
        exit_code: status.code(),
        success: status.success(),
        duration: started.elapsed(),
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        // A negative pid addresses the group the child leads
        let group = -(child.id() as libc::pid_t);
        unsafe {
            let _ = libc::kill(group, libc::SIGTERM);
        }
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        // Stragglers that ignored SIGTERM, even if the leader is gone
        unsafe {
            let _ = libc::kill(group, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    let _ = child.kill();
    let _ = child.wait();
}

/// Find an executable: explicit path, then `node_modules/.bin`, then `PATH`
pub fn locate_program(root: &Path, program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains('/') || program.contains('\\') {
        let path = root.join(program);
        return path.is_file().then_some(path);
    }

    let names: Vec<String> = if cfg!(windows) {
        ["", ".cmd", ".exe"]
            .iter()
            .map(|ext| format!("{}{}", program, ext))
            .collect()
    } else {
        vec![program.to_string()]
    };

    let local_bin = root.join("node_modules").join(".bin");
    let path_dirs = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();

    std::iter::once(local_bin)
        .chain(path_dirs)
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|candidate| candidate.is_file())
}

/// Shared launcher used by all command-backed adapters
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    root: PathBuf,
    timeout: Duration,
    grace: Duration,
}

impl ToolInvoker {
    pub fn new(root: &Path, tools: &ToolsConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            timeout: Duration::from_secs(tools.timeout_secs.max(1)),
            grace: Duration::from_millis(tools.kill_grace_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a configured command. `Succeeded` means the process ran to
    /// completion, whatever its exit code.
    pub fn invoke(&self, command: &ToolCommand, vars: &[(&str, &str)]) -> Outcome<CommandOutput> {
        if !command.enabled {
            return Outcome::skipped("disabled in configuration");
        }
        if !command.requires.is_empty()
            && !command.requires.iter().any(|m| self.root.join(m).exists())
        {
            return Outcome::skipped(format!(
                "none of {} present",
                command.requires.join(", ")
            ));
        }
        let Some(program) = locate_program(&self.root, &command.program) else {
            return Outcome::skipped(ToolError::NotInstalled(command.program.clone()).to_string());
        };

        let args: Vec<String> = command
            .args
            .iter()
            .map(|arg| substitute(arg, vars))
            .collect();

        run_with_timeout(&program, &args, &self.root, self.timeout, self.grace).into()
    }
}

fn substitute(arg: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(arg.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}
