use std::process::Stdio;
use std::time::Duration;

use libc::pid_t;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

use watchcast_core::backoff::backoff;
use watchcast_core::model::{PipelineJob, PipelineOutcome};

use crate::error::Result;

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Spawns and supervises the extractor/re-muxer subprocess pair for one
/// [`PipelineJob`], retrying the pair on failure up to `max_retries` times.
pub struct PipelineSupervisor {
    extractor_binary: String,
    remuxer_binary: String,
    max_retries: u32,
    shutdown_grace: Duration,
}

impl PipelineSupervisor {
    #[must_use]
    pub fn new(
        extractor_binary: String,
        remuxer_binary: String,
        max_retries: u32,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            extractor_binary,
            remuxer_binary,
            max_retries,
            shutdown_grace,
        }
    }

    /// Runs the job, retrying on failure, honoring `cancel` for graceful
    /// shutdown between and during attempts.
    ///
    /// `run_once` already races the child pair's `wait()` against `cancel`
    /// internally (see `spawn_kill_task`) and only returns once both
    /// processes have actually been reaped, SIGKILL'd after `shutdown_grace`
    /// if needed. This loop always awaits that future to completion rather
    /// than racing `cancel` against it a second time here, so a shutdown
    /// signal can never cut the grace-period/reap sequence short.
    pub async fn run(
        &self,
        job: &PipelineJob,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<PipelineOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome = self.run_once(job, cancel.clone()).await?;
            if outcome.success() || attempt > self.max_retries || *cancel.borrow() {
                return Ok(outcome);
            }

            tracing::warn!(
                video_url = %job.video_url,
                attempt,
                ?outcome,
                "pipeline attempt failed, retrying"
            );

            tokio::select! {
                () = backoff(attempt, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS) => {}
                _ = cancel.changed() => return Ok(outcome),
            }
        }
    }

    async fn run_once(
        &self,
        job: &PipelineJob,
        cancel: watch::Receiver<bool>,
    ) -> Result<PipelineOutcome> {
        let mut extractor_cmd = Command::new(&self.extractor_binary);
        extractor_cmd
            .args([
                "--hls-live-edge",
                "6",
                "--ringbuffer-size",
                "128M",
                "-4",
                "--stream-sorting-excludes",
                ">720p",
                "--default-stream",
                "best",
                "--url",
                &job.video_url,
                "-o",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut extractor = extractor_cmd
            .spawn()
            .map_err(|e| crate::error::Error::Spawn("extractor", e))?;
        let extractor_stdout = extractor.stdout.take().expect("stdout piped");

        let extractor_stdout_stdio = Stdio::try_from(extractor_stdout)?;

        let mut remuxer_cmd = Command::new(&self.remuxer_binary);
        remuxer_cmd
            .args([
                "-re",
                "-hide_banner",
                "-nostats",
                "-v",
                "level+error",
                "-i",
                "-",
                "-c:v",
                "copy",
                "-c:a",
                "copy",
                "-f",
                "flv",
                &format!("rtmp://127.0.0.1{}", job.rtmp_url),
            ])
            .stdin(extractor_stdout_stdio)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut remuxer = remuxer_cmd
            .spawn()
            .map_err(|e| crate::error::Error::Spawn("remuxer", e))?;

        let extractor_stderr = extractor.stderr.take();
        let remuxer_stderr = remuxer.stderr.take();
        let extractor_drain = spawn_stderr_drain("extractor", extractor_stderr);
        let remuxer_drain = spawn_stderr_drain("remuxer", remuxer_stderr);

        let kill_task = self.spawn_kill_task(&extractor, &remuxer, cancel);

        let extractor_status = extractor.wait().await?;
        let remuxer_status = remuxer.wait().await?;

        kill_task.abort();
        let _ = extractor_drain.await;
        let _ = remuxer_drain.await;

        Ok(PipelineOutcome {
            extractor_exit: extractor_status.code(),
            remuxer_exit: remuxer_status.code(),
        })
    }

    fn spawn_kill_task(
        &self,
        extractor: &Child,
        remuxer: &Child,
        mut cancel: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let extractor_pid = extractor.id();
        let remuxer_pid = remuxer.id();
        let grace = self.shutdown_grace;

        tokio::spawn(async move {
            let _ = cancel.changed().await;
            tracing::debug!("shutdown signal received, terminating pipeline");

            // Re-muxer first so it can flush, then the extractor.
            if let Some(pid) = remuxer_pid {
                signal_pid(pid, Signal::SIGTERM);
            }
            if let Some(pid) = extractor_pid {
                signal_pid(pid, Signal::SIGTERM);
            }

            tokio::time::sleep(grace).await;

            if let Some(pid) = remuxer_pid {
                signal_pid(pid, Signal::SIGKILL);
            }
            if let Some(pid) = extractor_pid {
                signal_pid(pid, Signal::SIGKILL);
            }
        })
    }
}

fn signal_pid(pid: u32, sig: Signal) {
    let raw: pid_t = match pid.try_into() {
        Ok(v) => v,
        Err(_) => return,
    };
    if let Err(err) = signal::kill(Pid::from_raw(raw), sig) {
        tracing::debug!(pid, ?sig, ?err, "signal delivery failed (process likely already exited)");
    }
}

fn spawn_stderr_drain(
    label: &'static str,
    stderr: Option<tokio::process::ChildStderr>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Some(stderr) = stderr else { return };
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(process = label, %line);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_extractor_binary_errors_without_panicking() {
        let supervisor = PipelineSupervisor::new(
            "definitely-not-a-real-binary".to_string(),
            "also-not-real".to_string(),
            0,
            Duration::from_secs(1),
        );
        let job = PipelineJob {
            video_url: "https://www.youtube.com/watch?v=abc".to_string(),
            rtmp_url: "/live/test".to_string(),
        };
        let (_tx, rx) = watch::channel(false);
        let result = supervisor.run(&job, rx).await;
        assert!(result.is_err());
    }
}
