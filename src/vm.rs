//! Thin handle to one VM, backed by the Qubes admin CLI tools.
//!
//! Everything the ingestion core needs from the VM side goes through here:
//! running-state check, VM class, the legacy-menu feature flag, the entry
//! listing service stream, icon retrieval and the post-sync menu refresh.
//! The core itself stays process-free and is exercised in tests without a
//! Qubes host.

// -- std imports
use std::process::Stdio;

// -- crate imports
use anyhow::{Context, Result, ensure};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

// -- module imports
use crate::error::SyncError;
use crate::icons::IconSource;
use crate::protocol::{self, Limits};

/// Name of the in-VM service listing installed launcher entries.
const ENTRY_LIST_SERVICE: &str = "qubes.GetAppmenus";

/// Name of the in-VM service resolving an icon reference to bitmap data.
const ICON_SERVICE: &str = "qubes.GetImageRGBA";

/// Largest icon dimension accepted from the converter.
const MAX_ICON_DIM: u32 = 512;

/// Handle to the VM being synchronized.
#[derive(Debug, Clone)]
pub struct Qube {
    name: String,
}

impl Qube {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn is_running(&self) -> Result<bool> {
        let status = Command::new("qvm-check")
            .args(["-q", "--running", "--", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("cannot run qvm-check")?;
        Ok(status.success())
    }

    /// VM class name (`AppVM`, `TemplateVM`, `StandaloneVM`, ...).
    pub async fn klass(&self) -> Result<String> {
        let output = Command::new("qvm-prefs")
            .args(["--", &self.name, "klass"])
            .stderr(Stdio::null())
            .output()
            .await
            .context("cannot run qvm-prefs")?;
        ensure!(
            output.status.success(),
            "qvm-prefs failed for '{}' ({})",
            self.name,
            output.status
        );
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether the `appmenus-legacy` feature is set for this VM (the feature
    /// is inherited from the template, which `qvm-features` resolves for us).
    /// An unset or empty feature means the service-based invocation is used.
    pub async fn uses_legacy_menus(&self) -> Result<bool> {
        let output = Command::new("qvm-features")
            .args(["--", &self.name, "appmenus-legacy"])
            .stderr(Stdio::null())
            .output()
            .await
            .context("cannot run qvm-features")?;
        if !output.status.success() {
            return Ok(false);
        }
        let value = String::from_utf8_lossy(&output.stdout);
        let value = value.trim();
        Ok(!value.is_empty() && value != "0")
    }

    /// Spawn a fresh entry listing call and read its output under `limits`.
    ///
    /// # Errors
    /// - [`SyncError::LimitExceeded`] via the bounded reader
    /// - [`SyncError::ServiceFailed`] on a nonzero service exit status
    pub async fn fetch_entry_lines(&self, limits: &Limits) -> Result<Vec<String>> {
        debug!(vm = %self.name, service = ENTRY_LIST_SERVICE, "spawning entry listing");
        let mut child = Command::new("qvm-run")
            .args([
                "-q",
                "-a",
                "--pass-io",
                "--service",
                "--",
                &self.name,
                ENTRY_LIST_SERVICE,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("cannot spawn entry listing service")?;

        let stdout = child
            .stdout
            .take()
            .context("entry listing service has no stdout")?;
        let lines = protocol::read_service_lines(BufReader::new(stdout), limits).await?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(SyncError::ServiceFailed(status).into());
        }
        Ok(lines)
    }

    /// Regenerate the installed per-VM menu from the synchronized templates.
    pub async fn refresh_menus(&self) -> Result<()> {
        debug!(vm = %self.name, "refreshing installed menus");
        let status = Command::new("qvm-appmenus")
            .args(["--update", "--", &self.name])
            .status()
            .await
            .context("cannot run qvm-appmenus")?;
        ensure!(
            status.success(),
            "menu refresh failed for '{}' ({status})",
            self.name
        );
        Ok(())
    }
}

impl IconSource for Qube {
    /// Ask the in-VM converter service for the bitmap behind `icon_ref`.
    /// The response is `"<width> <height>\n"` followed by RGBA data; both
    /// dimensions and the payload length are validated before the bytes are
    /// accepted as a comparable artifact.
    async fn fetch_icon(&self, icon_ref: &str) -> Result<Vec<u8>> {
        let mut child = Command::new("qvm-run")
            .args([
                "-q",
                "-a",
                "--pass-io",
                "--service",
                "--",
                &self.name,
                ICON_SERVICE,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("cannot spawn icon service")?;

        let mut stdin = child.stdin.take().context("icon service has no stdin")?;
        stdin.write_all(icon_ref.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        ensure!(
            output.status.success(),
            "icon service failed ({})",
            output.status
        );
        validate_icon_payload(&output.stdout)?;
        Ok(output.stdout)
    }
}

/// Check the converter response shape without interpreting the pixels.
fn validate_icon_payload(payload: &[u8]) -> Result<()> {
    let header_end = payload
        .iter()
        .position(|&b| b == b'\n')
        .context("icon payload has no header")?;
    let header = std::str::from_utf8(&payload[..header_end]).context("icon header not UTF-8")?;

    let (w, h) = header
        .split_once(' ')
        .context("icon header is not '<width> <height>'")?;
    let w: u32 = w.parse().context("bad icon width")?;
    let h: u32 = h.parse().context("bad icon height")?;
    ensure!(
        (1..=MAX_ICON_DIM).contains(&w) && (1..=MAX_ICON_DIM).contains(&h),
        "icon dimensions {w}x{h} out of range"
    );

    let data_len = payload.len() - header_end - 1;
    ensure!(
        data_len == (w as usize) * (h as usize) * 4,
        "icon payload length {data_len} does not match {w}x{h} RGBA"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(w: u32, h: u32, data_len: usize) -> Vec<u8> {
        let mut p = format!("{w} {h}\n").into_bytes();
        p.extend(std::iter::repeat_n(0u8, data_len));
        p
    }

    #[test]
    fn accepts_well_formed_rgba_payload() {
        assert!(validate_icon_payload(&payload(2, 3, 24)).is_ok());
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(validate_icon_payload(&payload(2, 3, 23)).is_err());
    }

    #[test]
    fn rejects_oversized_dimensions() {
        assert!(validate_icon_payload(&payload(513, 1, 513 * 4)).is_err());
        assert!(validate_icon_payload(&payload(0, 1, 0)).is_err());
    }

    #[test]
    fn rejects_garbage_header() {
        assert!(validate_icon_payload(b"not a header").is_err());
        assert!(validate_icon_payload(b"12x12\n").is_err());
    }
}
