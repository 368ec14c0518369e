//! Runs and watches one clip subprocess.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::ProcessHandle;

use super::command::{ClipCommand, ClipSpec};
use super::config::ClipperConfig;
use super::error::ClipperError;
use super::progress::{ClipProgress, ProgressParser};

/// How a supervised clip ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOutcome {
    Completed,
    /// Cancellation was observed and the process killed.
    Cancelled,
}

/// Launches the clipping tool.
#[derive(Debug, Clone)]
pub struct ClipSupervisor {
    config: ClipperConfig,
}

impl ClipSupervisor {
    pub fn new(config: ClipperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClipperConfig {
        &self.config
    }

    /// Starts the process. The returned [`RunningClip`] carries the kill
    /// handle, which should be registered before supervision starts.
    pub fn spawn(&self, spec: &ClipSpec) -> Result<RunningClip, ClipperError> {
        let program = self.config.ffmpeg_path.display().to_string();
        let args = ClipCommand::new(spec)
            .log_level(self.config.log_level.clone())
            .build_args();
        debug!(program = %program, ?args, "Spawning clip process");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClipperError::Launch {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("clip process stdout not captured"))?;
        let stderr_tail = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_drain(stderr, self.config.stderr_tail_lines));

        let handle = ProcessHandle::new(child.id());
        info!(program = %program, pid = ?child.id(), inputs = spec.inputs.len(), "Clip process started");

        Ok(RunningClip {
            program,
            child,
            stdout,
            stderr_tail,
            handle,
            parser: ProgressParser::new(spec.duration_secs),
        })
    }
}

/// A clip process that has been started but not yet reaped.
pub struct RunningClip {
    program: String,
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Option<JoinHandle<Vec<String>>>,
    handle: ProcessHandle,
    parser: ProgressParser,
}

impl RunningClip {
    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    /// Reads progress until the process exits, is killed, or `cancel` fires.
    ///
    /// Stream end and read errors only end the read loop; cancellation is
    /// re-checked before the exit status is judged, so a killed process is
    /// reported as [`ClipOutcome::Cancelled`] and never as a failure.
    pub async fn supervise<F>(
        self,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ClipOutcome, ClipperError>
    where
        F: FnMut(ClipProgress) + Send,
    {
        let RunningClip {
            program,
            mut child,
            stdout,
            stderr_tail,
            handle,
            mut parser,
        } = self;
        let mut lines = BufReader::new(stdout).lines();

        let mut stop_requested = false;
        loop {
            tokio::select! {
                biased;
                _ = handle.killed() => { stop_requested = true; break; }
                _ = cancel.cancelled() => { stop_requested = true; break; }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(progress) = parser.feed_line(&line) {
                            on_progress(progress);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(program = %program, "Failed reading clip progress: {}", e);
                        break;
                    }
                },
            }
        }

        let status: Option<std::io::Result<ExitStatus>> = if stop_requested {
            None
        } else {
            tokio::select! {
                biased;
                _ = handle.killed() => None,
                _ = cancel.cancelled() => None,
                status = child.wait() => Some(status),
            }
        };

        let status = match status {
            Some(status) => status?,
            None => {
                if let Err(e) = child.kill().await {
                    debug!(program = %program, "Kill after cancel returned: {}", e);
                }
                if let Some(task) = stderr_tail {
                    task.abort();
                }
                info!(program = %program, pid = ?handle.pid(), "Clip process killed");
                return Ok(ClipOutcome::Cancelled);
            }
        };

        let tail = match stderr_tail {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if cancel.is_cancelled() || handle.is_killed() {
            return Ok(ClipOutcome::Cancelled);
        }

        if !status.success() {
            return Err(ClipperError::Execution {
                program,
                code: status.code(),
                stderr: tail.join("\n"),
            });
        }

        debug!(program = %program, "Clip process finished");
        Ok(ClipOutcome::Completed)
    }
}

fn spawn_stderr_drain<R>(stderr: R, keep: usize) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(keep);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "ytcut_core::clipper::stderr", "{}", line);
            if keep == 0 {
                continue;
            }
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::clipper::{ClipInput, ClipMode};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn supervisor(script: PathBuf) -> ClipSupervisor {
        ClipSupervisor::new(ClipperConfig {
            ffmpeg_path: script,
            ..Default::default()
        })
    }

    fn spec(dir: &Path) -> ClipSpec {
        ClipSpec {
            inputs: vec![ClipInput::new("https://cdn.example.com/v")],
            start_secs: 0.0,
            duration_secs: 10.0,
            mode: ClipMode::StreamCopy,
            output: dir.join("out.mp4"),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_progress_forwarded_and_completes() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            r#"printf 'out_time_us=2500000\ntotal_size=100\nspeed=1.5x\nprogress=continue\n'
printf 'out_time_us=5000000\ntotal_size=200\nprogress=continue\n'
printf 'out_time_us=10000000\nprogress=end\n'"#,
        );
        let running = supervisor(script).spawn(&spec(dir.path())).unwrap();

        let mut seen = Vec::new();
        let outcome = running
            .supervise(&CancellationToken::new(), |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(outcome, ClipOutcome::Completed);
        let pcts: Vec<f64> = seen.iter().map(|p| p.pct).collect();
        assert_eq!(pcts, vec![25.0, 50.0, 99.0]);
        assert_eq!(seen[0].speed.as_deref(), Some("1.5x"));
        assert_eq!(seen[1].downloaded_bytes, Some(200));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "echo 'Server returned 403 Forbidden' >&2\nexit 1");
        let running = supervisor(script).spawn(&spec(dir.path())).unwrap();

        let err = running
            .supervise(&CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        match err {
            ClipperError::Execution { code, stderr, .. } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("403 Forbidden"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_kill_handle_cancels_hanging_process() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            "printf 'out_time_us=1000000\\nprogress=continue\\n'\nexec sleep 30",
        );
        let running = supervisor(script).spawn(&spec(dir.path())).unwrap();
        let handle = running.handle();
        assert!(handle.pid().is_some());

        let killer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.kill();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            running.supervise(&CancellationToken::new(), |_| {}),
        )
        .await
        .expect("supervisor should return promptly after kill")
        .unwrap();
        killer.await.unwrap();
        assert_eq!(outcome, ClipOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_token_beats_failure() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "exec sleep 30");
        let running = supervisor(script).spawn(&spec(dir.path())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = running.supervise(&cancel, |_| {}).await.unwrap();
        assert_eq!(outcome, ClipOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let dir = TempDir::new().unwrap();
        let result = supervisor(dir.path().join("no-such-ffmpeg")).spawn(&spec(dir.path()));
        assert!(matches!(result, Err(ClipperError::Launch { .. })));
    }
}
