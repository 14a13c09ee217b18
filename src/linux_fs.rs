//! VM-scoped directory layout and filesystem helpers.
//!
//! Launcher templates and their icons are shared, non-secret metadata, so
//! everything created here gets a relaxed group-writable mode instead of the
//! process umask deciding.

// -- std imports
use std::fs::Permissions;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

// -- crate imports
use anyhow::{Context, Result};
use tokio::fs;

/// Directory mode for launcher/icon directories.
const DIR_MODE: u32 = 0o775;

/// File mode for launcher files and icon artifacts.
const FILE_MODE: u32 = 0o664;

/// Per-VM target directories of one synchronization run.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Where `<entry>.desktop` template files go.
    pub templates_dir: PathBuf,
    /// Where per-entry icon artifacts go.
    pub template_icons_dir: PathBuf,
}

impl Layout {
    /// Resolve the layout for a VM under `base` (normally `/var/lib/qubes`).
    /// Template VMs live under `vm-templates`, everything else under `appvms`.
    pub fn for_vm(base: &Path, klass: &str, vm_name: &str) -> Self {
        let class_dir = match klass {
            "TemplateVM" => "vm-templates",
            _ => "appvms",
        };
        let vm_dir = base.join(class_dir).join(vm_name);
        Self {
            templates_dir: vm_dir.join("apps.templates"),
            template_icons_dir: vm_dir.join("apps.tempicons"),
        }
    }
}

/// Create `dir` (and missing parents) and relax its mode.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create directory {}", dir.display()))?;
    fs::set_permissions(dir, Permissions::from_mode(DIR_MODE)).await?;
    Ok(())
}

/// Relax the mode of a freshly written file.
pub async fn relax_file_permissions(path: &Path) -> Result<()> {
    fs::set_permissions(path, Permissions::from_mode(FILE_MODE)).await?;
    Ok(())
}

/// Write `content` to `path` only when it differs byte-for-byte from what is
/// already there. Returns whether a write happened. This comparison is the
/// pipeline's idempotence guarantee: re-running with unchanged input must be
/// a no-op on disk.
pub async fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    let existing = match fs::read_to_string(path).await {
        Ok(s) => Some(s),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e).with_context(|| format!("cannot read {}", path.display()));
        }
    };

    if existing.as_deref() == Some(content) {
        return Ok(false);
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    relax_file_permissions(path).await?;
    Ok(true)
}
