//! Wi-Fi association through NetworkManager.
//!
//! Shells out to `nmcli` in terse mode and parses its colon-separated output.

use std::io::ErrorKind;
use std::process::Stdio;

use roomwatch_core::{LinkStatus, NetworkError, NetworkPort};
use tokio::process::Command;
use tracing::{debug, warn};

/// [`NetworkPort`] backed by `nmcli`.
#[derive(Debug, Clone)]
pub struct NmcliNetwork {
    program: String,
}

impl Default for NmcliNetwork {
    fn default() -> Self {
        Self::new("nmcli")
    }
}

impl NmcliNetwork {
    /// Use the given `nmcli` binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, NetworkError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    NetworkError::Unavailable(format!("{} not installed", self.program))
                }
                _ => NetworkError::Unavailable(e.to_string()),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(NetworkError::JoinFailed(stderr.trim().to_string()))
        }
    }

    async fn device_status(&self) -> Option<String> {
        match self
            .run(&["-t", "-f", "DEVICE,TYPE,STATE", "device", "status"])
            .await
        {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(error = %e, "failed to query device status");
                None
            }
        }
    }
}

impl NetworkPort for NmcliNetwork {
    async fn join(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        let mut args = vec!["device", "wifi", "connect", ssid];
        if !password.is_empty() {
            args.extend(["password", password]);
        }
        self.run(&args).await.map(|output| {
            debug!(output = output.trim(), "nmcli connect");
        })
    }

    async fn status(&mut self) -> LinkStatus {
        self.device_status()
            .await
            .map_or(LinkStatus::Down, |output| parse_link_status(&output))
    }

    async fn local_address(&mut self) -> Option<String> {
        let status = self.device_status().await?;
        let device = wifi_device(&status)?;
        let output = self
            .run(&["-t", "-f", "IP4.ADDRESS", "device", "show", device.as_str()])
            .await
            .ok()?;
        parse_ip4_address(&output)
    }
}

/// Fields of one `DEVICE:TYPE:STATE` line.
fn wifi_lines(output: &str) -> impl Iterator<Item = (&str, &str)> {
    output.lines().filter_map(|line| {
        let mut fields = line.split(':');
        let device = fields.next()?;
        let kind = fields.next()?;
        let state = fields.next()?;
        (kind == "wifi").then_some((device, state))
    })
}

/// `Up` if any Wi-Fi device reports `connected`.
fn parse_link_status(output: &str) -> LinkStatus {
    if wifi_lines(output).any(|(_, state)| state == "connected") {
        LinkStatus::Up
    } else {
        LinkStatus::Down
    }
}

/// The first connected Wi-Fi device name.
fn wifi_device(output: &str) -> Option<String> {
    wifi_lines(output)
        .find(|(_, state)| *state == "connected")
        .map(|(device, _)| device.to_string())
}

/// The first address from `IP4.ADDRESS[n]:a.b.c.d/prefix` lines.
fn parse_ip4_address(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if !key.starts_with("IP4.ADDRESS") {
            return None;
        }
        let address = value.split('/').next()?.trim();
        (!address.is_empty()).then(|| address.to_string())
    })
}
