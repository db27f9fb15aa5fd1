//! Driver subprocess adapter.
//!
//! A driver executable is spawned with pipes on all three standard
//! streams: stdout carries INDI frames toward the store, stdin carries
//! client commands to the driver, stderr is line-logged.

use super::{FrameSink, FrameSource, IO_TIMEOUT};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{info, warn};

/// A running driver subprocess
#[derive(Debug)]
pub struct DriverProcess {
    executable: String,
    child: Child,
}

impl DriverProcess {
    /// Spawn the driver executable with piped standard streams
    pub fn spawn(executable: &str) -> Result<Self> {
        let child = Command::new(executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        info!(driver = executable, "driver started");
        Ok(Self {
            executable: executable.to_string(),
            child,
        })
    }

    /// The executable this process was spawned from
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Take the three pipes. Callable once.
    pub fn split(&mut self) -> Result<(DriverReader, DriverWriter, ChildStderr)> {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| Error::Closed(format!("{}: stdout already taken", self.executable)))?;
        let stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| Error::Closed(format!("{}: stdin already taken", self.executable)))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| Error::Closed(format!("{}: stderr already taken", self.executable)))?;
        Ok((
            DriverReader {
                stdout,
                buf: BytesMut::with_capacity(8 * 1024),
            },
            DriverWriter { stdin },
            stderr,
        ))
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

/// Frames flowing out of the driver's stdout
#[derive(Debug)]
pub struct DriverReader {
    stdout: ChildStdout,
    buf: BytesMut,
}

#[async_trait]
impl FrameSource for DriverReader {
    async fn recv(&mut self) -> Result<Bytes> {
        self.buf.clear();
        let n = self.stdout.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Err(Error::Closed("driver closed stdout".to_string()));
        }
        Ok(self.buf.split().freeze())
    }
}

/// Commands flowing into the driver's stdin
#[derive(Debug)]
pub struct DriverWriter {
    stdin: ChildStdin,
}

#[async_trait]
impl FrameSink for DriverWriter {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        timeout(IO_TIMEOUT, async {
            self.stdin.write_all(frame).await?;
            self.stdin.flush().await
        })
        .await
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "driver stdin write timed out",
            ))
        })??;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stdin.shutdown().await?;
        Ok(())
    }
}

/// Log a driver's stderr line by line until the pipe closes
pub async fn log_stderr(executable: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => warn!(driver = %executable, "{}", line.trim_end()),
            Ok(None) => break,
            Err(e) => {
                warn!(driver = %executable, error = %e, "stderr read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_and_echo_through_pipes() {
        // cat echoes stdin to stdout, standing in for a driver
        let mut process = DriverProcess::spawn("cat").unwrap();
        let (mut reader, mut writer, _stderr) = process.split().unwrap();

        writer
            .send(b"<getProperties version=\"1.7\"/>")
            .await
            .unwrap();
        let out = reader.recv().await.unwrap();
        assert!(out.starts_with(b"<getProperties"));

        writer.close().await.unwrap();
        let status = process.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_split_is_single_use() {
        let mut process = DriverProcess::spawn("cat").unwrap();
        assert!(process.split().is_ok());
        assert!(process.split().is_err());
    }

    #[tokio::test]
    async fn test_missing_executable_fails() {
        assert!(DriverProcess::spawn("/nonexistent/indi_driver").is_err());
    }
}
