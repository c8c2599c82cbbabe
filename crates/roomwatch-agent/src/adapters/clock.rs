//! System clock adapter.
//!
//! The host's NTP client (systemd-timesyncd) owns the actual
//! synchronization. `sync` writes the configured servers to a timesyncd
//! drop-in and makes sure NTP is enabled; the core then polls
//! [`TimeSource::now`] until the clock is plausible.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Utc;
use roomwatch_core::TimeSource;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Drop-in read by systemd-timesyncd.
pub const TIMESYNCD_DROPIN: &str = "/etc/systemd/timesyncd.conf.d/roomwatch.conf";

/// [`TimeSource`] reading the system clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    enable_ntp: bool,
    dropin: PathBuf,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            enable_ntp: true,
            dropin: PathBuf::from(TIMESYNCD_DROPIN),
        }
    }
}

impl SystemClock {
    /// A clock that never touches the host's NTP settings.
    #[must_use]
    pub fn passive() -> Self {
        Self {
            enable_ntp: false,
            ..Self::default()
        }
    }
}

/// Render the timesyncd drop-in for `servers`.
#[must_use]
pub fn render_dropin(servers: &[String]) -> String {
    let mut out = String::from("# Managed by roomwatch-agent\n[Time]\n");
    let _ = writeln!(out, "NTP={}", servers.join(" "));
    out
}

/// Write the drop-in if its contents changed. Returns whether it was written.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be written.
pub async fn write_dropin(path: &Path, servers: &[String]) -> io::Result<bool> {
    let contents = render_dropin(servers);
    if tokio::fs::read_to_string(path).await.ok().as_deref() == Some(contents.as_str()) {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(true)
}

async fn run(program: &str, args: &[&str]) {
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(program, ?args, %status, "command failed"),
        Err(e) => warn!(program, error = %e, "command unavailable"),
    }
}

impl TimeSource for SystemClock {
    async fn sync(&mut self, offset_secs: i32, servers: &[String]) {
        debug!(offset_secs, ?servers, "system clock sync requested");
        if !self.enable_ntp {
            return;
        }
        match write_dropin(&self.dropin, servers).await {
            Ok(true) => {
                info!(path = %self.dropin.display(), ?servers, "time servers updated");
                run("systemctl", &["restart", "systemd-timesyncd"]).await;
            }
            Ok(false) => {}
            Err(e) => warn!(path = %self.dropin.display(), error = %e, "cannot write time servers"),
        }
        run("timedatectl", &["set-ntp", "true"]).await;
    }

    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}
