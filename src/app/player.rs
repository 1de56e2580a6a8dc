mod ipc;
mod process;

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use self::ipc::MpvIpc;
use self::process::InteractiveChild;

/// One external player invocation at a time.
///
/// After `launch`, `track_until_exit` must be called; it reports progress zero or more
/// times and returns once the player has terminated, whatever the reason.
pub(crate) trait Player {
    fn launch(&mut self, url: &str, start_time: f64, extra_args: &[String]) -> Result<()>;

    /// Last known playback position in seconds.
    fn elapsed_time(&self) -> f64;

    fn current_duration(&self) -> Option<f64>;

    fn track_until_exit(
        &mut self,
        interval: Duration,
        on_progress: &mut dyn FnMut(f64, Option<f64>),
    ) -> Result<()>;
}

const POLL_TICK: Duration = Duration::from_millis(250);

pub(crate) struct MpvPlayer {
    bin: PathBuf,
    child: Option<InteractiveChild>,
    ipc: Option<MpvIpc>,
    elapsed: f64,
    duration: Option<f64>,
}

impl MpvPlayer {
    pub(crate) fn new() -> Self {
        Self {
            bin: resolve_player_bin(),
            child: None,
            ipc: None,
            elapsed: 0.0,
            duration: None,
        }
    }

    fn poll_properties(&mut self) {
        let Some(ipc) = self.ipc.as_mut() else {
            return;
        };
        if let Some(elapsed) = ipc.get_f64("time-pos") {
            self.elapsed = elapsed;
        }
        if let Some(duration) = ipc.get_f64("duration").filter(|d| *d > 0.0) {
            self.duration = Some(duration);
        }
    }
}

impl Player for MpvPlayer {
    fn launch(&mut self, url: &str, start_time: f64, extra_args: &[String]) -> Result<()> {
        let ipc = MpvIpc::new(ipc_socket_path());
        let mut cmd = ProcessCommand::new(&self.bin);
        cmd.args(mpv_args(url, start_time, &ipc.path().display().to_string(), extra_args))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = InteractiveChild::spawn(cmd)
            .with_context(|| format!("failed to launch {}", self.bin.display()))?;
        self.child = Some(child);
        self.ipc = Some(ipc);
        self.elapsed = start_time;
        self.duration = None;
        Ok(())
    }

    fn elapsed_time(&self) -> f64 {
        self.elapsed
    }

    fn current_duration(&self) -> Option<f64> {
        self.duration
    }

    fn track_until_exit(
        &mut self,
        interval: Duration,
        on_progress: &mut dyn FnMut(f64, Option<f64>),
    ) -> Result<()> {
        let tick = POLL_TICK.min(interval);
        let mut last_report = Instant::now();
        let result = loop {
            let Some(child) = self.child.as_mut() else {
                break Ok(());
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("player exited with {status}");
                    break Ok(());
                }
                Ok(None) => {}
                Err(err) => break Err(err),
            }

            self.poll_properties();
            if last_report.elapsed() >= interval {
                on_progress(self.elapsed, self.duration);
                last_report = Instant::now();
            }
            thread::sleep(tick);
        };

        self.child = None;
        self.ipc = None;
        result
    }
}

pub(crate) fn mpv_args(
    url: &str,
    start_time: f64,
    ipc_path: &str,
    extra_args: &[String],
) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        format!("--start={start_time}"),
        format!("--input-ipc-server={ipc_path}"),
    ];
    args.extend(extra_args.iter().cloned());
    args
}

pub(crate) fn resolve_player_bin() -> PathBuf {
    resolve_player_bin_from_env(env::var_os("ANIPLAY_MPV_BIN"))
}

pub(crate) fn resolve_player_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("mpv"),
    }
}

fn ipc_socket_path() -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    env::temp_dir().join(format!("aniplay-mpv-{}-{ts}.sock", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpv_args_put_url_first_and_keep_extra_args_in_order() {
        let extra = vec!["-fs".to_string(), "--referrer=https://allanime.day".to_string()];
        let args = mpv_args("https://cdn.test/ep.m3u8", 115.0, "/tmp/mpv.sock", &extra);
        assert_eq!(
            args,
            vec![
                "https://cdn.test/ep.m3u8",
                "--start=115",
                "--input-ipc-server=/tmp/mpv.sock",
                "-fs",
                "--referrer=https://allanime.day",
            ]
        );
    }

    #[test]
    fn player_bin_defaults_to_mpv_and_honors_override() {
        assert_eq!(resolve_player_bin_from_env(None), PathBuf::from("mpv"));
        assert_eq!(
            resolve_player_bin_from_env(Some(OsString::new())),
            PathBuf::from("mpv")
        );
        assert_eq!(
            resolve_player_bin_from_env(Some(OsString::from("/opt/mpv/bin/mpv"))),
            PathBuf::from("/opt/mpv/bin/mpv")
        );
    }

    #[test]
    fn launch_fails_cleanly_for_missing_binary() {
        let mut player = MpvPlayer {
            bin: PathBuf::from("/nonexistent/aniplay-test-mpv"),
            child: None,
            ipc: None,
            elapsed: 0.0,
            duration: None,
        };
        assert!(player.launch("https://cdn.test/ep.mp4", 0.0, &[]).is_err());
        assert!(player.child.is_none());

        let mut calls = 0;
        player
            .track_until_exit(Duration::from_millis(10), &mut |_, _| calls += 1)
            .expect("nothing to track");
        assert_eq!(calls, 0);
    }
}
