//! Privileged shell sessions
//!
//! Writing to the gadget node needs root. A session is a line-oriented
//! shell opened once per batch of strings; only its exit code is read back.

#![allow(async_fn_in_trait)]

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use log::debug;
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin, Command};

/// An open privileged shell
pub trait PrivilegedSession {
    /// Queue one command line; a trailing newline is added
    async fn send_line(&mut self, line: &str) -> io::Result<()>;

    /// Push queued lines to the shell
    async fn flush(&mut self) -> io::Result<()>;

    /// Close stdin and wait for the shell to exit.
    ///
    /// Returns the exit code, -1 when killed by a signal.
    async fn close(self) -> io::Result<i32>;
}

/// Opens privileged sessions for the writer
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: PrivilegedSession;

    async fn open(&self) -> Result<Self::Session, DeviceError>;
}

/// Launches `command` (split on whitespace) with piped stdin
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    command: String,
}

impl ShellLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.shell.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn_error(&self, source: io::Error) -> DeviceError {
        DeviceError::Spawn {
            command: self.command.clone(),
            source,
        }
    }
}

impl SessionLauncher for ShellLauncher {
    type Session = ShellSession;

    async fn open(&self) -> Result<ShellSession, DeviceError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            self.spawn_error(io::Error::new(io::ErrorKind::InvalidInput, "empty command"))
        })?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            self.spawn_error(io::Error::new(io::ErrorKind::BrokenPipe, "stdin not captured"))
        })?;

        debug!("Opened privileged session: {} (pid {:?})", self.command, child.id());
        Ok(ShellSession {
            child,
            stdin: BufWriter::new(stdin),
        })
    }
}

/// Shell child process; killed if dropped before `close`
#[derive(Debug)]
pub struct ShellSession {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

impl PrivilegedSession for ShellSession {
    async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.stdin.flush().await
    }

    async fn close(self) -> io::Result<i32> {
        let ShellSession { mut child, mut stdin } = self;
        stdin.flush().await?;
        drop(stdin);
        let status = child.wait().await?;
        debug!("Privileged session exited: {}", status);
        Ok(status.code().unwrap_or(-1))
    }
}
