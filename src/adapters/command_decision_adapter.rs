//! Decision adapter that shells out to an external program.
//!
//! The program is invoked as `<command> <args...> <ASSET> <YYYY-MM-DD>` and
//! must print the decision on the last non-empty line of stdout. With a
//! deadline set, a program still running when it passes is killed together
//! with its process group.

use chrono::NaiveDate;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::decision::Decision;
use crate::domain::error::TradeLedgerError;
use crate::ports::decision_port::DecisionPort;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CommandDecisionAdapter {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandDecisionAdapter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Splits a whitespace-separated argument string from the config file.
    pub fn with_arg_string(program: impl Into<String>, args: &str) -> Self {
        Self::new(
            program,
            args.split_whitespace().map(str::to_string).collect(),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self, asset_id: &str, date_arg: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(asset_id)
            .arg(date_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    /// Exit status, or `None` once the deadline has passed.
    fn wait(&self, child: &mut Child) -> io::Result<Option<ExitStatus>> {
        let Some(timeout) = self.timeout else {
            return child.wait().map(Some);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Last non-empty line of the program's output.
fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Reads a pipe to the end on its own thread so a chatty program never
/// blocks on a full pipe while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Kills the program and everything it started, then reaps it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-KILL", "--", &format!("-{}", child.id())])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

impl DecisionPort for CommandDecisionAdapter {
    fn decide(&self, asset_id: &str, date: NaiveDate) -> Result<Decision, TradeLedgerError> {
        let provider = |reason: String| TradeLedgerError::Provider {
            asset: asset_id.to_string(),
            reason,
        };
        let date_arg = date.format("%Y-%m-%d").to_string();
        debug!(program = %self.program, asset = asset_id, date = %date_arg, "invoking oracle");

        let mut child = self
            .command(asset_id, &date_arg)
            .spawn()
            .map_err(|e| provider(format!("failed to run {}: {}", self.program, e)))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.wait(&mut child) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate(&mut child);
                let timeout = self.timeout.unwrap_or_default();
                warn!(program = %self.program, asset = asset_id, ?timeout, "oracle killed after deadline");
                return Err(TradeLedgerError::Timeout {
                    asset: asset_id.to_string(),
                    operation: "decision".to_string(),
                    timeout,
                });
            }
            Err(e) => {
                terminate(&mut child);
                return Err(provider(format!("failed to wait for {}: {}", self.program, e)));
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(provider(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&stdout);
        let line = last_line(&stdout)
            .ok_or_else(|| provider(format!("{} printed no decision", self.program)))?;
        line.parse()
    }
}
