// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Running the mesher executable

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::command::CommandLine;
use super::files::WorkingFiles;
use crate::error::{TetraError, TetraResult};
use crate::session::ProgressTracker;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the executable ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(ExitStatus),
    /// Killed after a cancellation request.
    Cancelled,
}

/// Result of [`run_executable`].
#[derive(Debug, Clone)]
pub struct ExecutableRun {
    pub outcome: ExitOutcome,
    /// Full content of the log file.
    pub log: String,
}

impl ExecutableRun {
    pub fn success(&self) -> bool {
        matches!(self.outcome, ExitOutcome::Exited(status) if status.success())
    }
}

/// Kills and reaps the process when dropped before it was waited for.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.reaped = status.is_some();
        Ok(status)
    }

    fn kill(&mut self) -> std::io::Result<ExitStatus> {
        if let Err(e) = self.child.kill() {
            warn!("cannot kill mesher process {}: {}", self.child.id(), e);
        }
        self.reaped = true;
        self.child.wait()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            warn!("stopping mesher process {}", self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Follows the log file and hands complete lines to the tracker.
struct LogFollower {
    reader: File,
    pending: String,
    echo: bool,
}

impl LogFollower {
    fn open(path: &Path, echo: bool) -> std::io::Result<Self> {
        let mut reader = File::open(path)?;
        reader.seek(SeekFrom::End(0))?;
        Ok(Self {
            reader,
            pending: String::new(),
            echo,
        })
    }

    fn poll(&mut self, tracker: &ProgressTracker) {
        let mut chunk = Vec::new();
        if let Err(e) = self.reader.read_to_end(&mut chunk) {
            warn!("cannot follow mesher log: {}", e);
            return;
        }
        self.pending.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if self.echo {
                println!("{}", line);
            }
            tracker.observe(line);
        }
    }

    fn finish(&mut self, tracker: &ProgressTracker) {
        self.poll(tracker);
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            if self.echo {
                println!("{}", rest);
            }
            tracker.observe(&rest);
        }
    }
}

/// Run `program` on the working files with the options of `command`.
///
/// Standard output and error go to the log file, which is followed while the
/// process runs so its milestones reach `tracker`. A cancellation request on
/// the tracker's channel kills the process.
pub fn run_executable(
    program: &str,
    command: &CommandLine,
    files: &WorkingFiles,
    with_size_map: bool,
    tracker: &ProgressTracker,
    echo: bool,
) -> TetraResult<ExecutableRun> {
    let log_path = files.log_file();
    let mut log = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)?;

    let mut process = Command::new(program);
    process
        .arg("--in")
        .arg(files.input_mesh())
        .arg("--out")
        .arg(files.output_mesh());
    if with_size_map {
        process.arg("--sizemap").arg(files.size_map());
    }
    process.args(command.to_args());

    writeln!(
        log,
        "# {} {} {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        program,
        command
    )?;
    log.flush()?;

    let mut follower = LogFollower::open(&log_path, echo)?;
    process
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log));

    info!("running {} {}", program, command);
    let mut child = ChildGuard::new(process.spawn().map_err(|e| TetraError::Subprocess {
        status: "not started".into(),
        log: format!("{}: {}", program, e),
    })?);
    debug!("mesher process {} started", child.id());

    let channel = tracker.channel();
    let outcome = loop {
        if channel.is_cancelled() {
            child.kill()?;
            break ExitOutcome::Cancelled;
        }
        if let Some(status) = child.try_wait()? {
            break ExitOutcome::Exited(status);
        }
        follower.poll(tracker);
        thread::sleep(POLL_INTERVAL);
    };
    follower.finish(tracker);

    let text = std::fs::read_to_string(&log_path).unwrap_or_default();
    debug!("mesher finished: {:?}, {} bytes of log", outcome, text.len());
    Ok(ExecutableRun { outcome, log: text })
}
