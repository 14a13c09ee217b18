//! Top-level driver: materialize an entry set as launcher template files.
//!
//! Responsibilities:
//! - ensure the template and icon directories exist
//! - write the synthetic bootstrap launcher once, where applicable
//! - per entry: icon pipeline, renderer, content-gated write
//! - garbage-collect launcher files of entries gone from the new set
//!
//! The entry set is the sole source of truth for "current names"; stale-file
//! detection is a set difference against the directory listing, no index is
//! persisted between runs.

// -- std imports
use std::path::Path;

// -- crate imports
use anyhow::Result;
use tokio::fs;
use tracing::{debug, info};

// -- module imports
use crate::entries::EntrySet;
use crate::icons::{self, IconSource};
use crate::linux_fs::{self, Layout};
use crate::render::{RenderMode, render_entry};

/// File name of the protected bootstrap launcher.
pub const BOOTSTRAP_FILE: &str = "qubes-start.desktop";

/// Bundled body of the bootstrap launcher. Generated locally, never derived
/// from VM-supplied data.
const BOOTSTRAP_TEMPLATE: &str = include_str!("../assets/qubes-start.desktop");

/// Run one full reconciliation pass over `entries`.
///
/// `include_bootstrap` is the externally supplied structural condition for
/// the synthetic start launcher (VM classes that do not inherit it from a
/// template). The reserved bootstrap name is already excluded from `entries`
/// at assembly time.
pub async fn reconcile<S: IconSource>(
    layout: &Layout,
    mut entries: EntrySet,
    mode: RenderMode,
    include_bootstrap: bool,
    icons: &S,
) -> Result<()> {
    linux_fs::ensure_dir(&layout.templates_dir).await?;
    linux_fs::ensure_dir(&layout.template_icons_dir).await?;

    if include_bootstrap {
        write_bootstrap_once(&layout.templates_dir).await?;
    }

    for (name, entry) in entries.iter_mut() {
        icons::sync_icon(icons, &layout.template_icons_dir, name, entry).await;

        let Some(body) = render_entry(name, entry, mode)? else {
            continue;
        };

        let path = layout.templates_dir.join(format!("{name}.desktop"));
        let existed = fs::try_exists(&path).await.unwrap_or(false);
        if linux_fs::write_if_changed(&path, &body).await? {
            if existed {
                info!(entry = %name, "updating launcher");
            } else {
                info!(entry = %name, "creating launcher");
            }
        } else {
            debug!(entry = %name, "launcher unchanged");
        }
    }

    collect_stale(layout, &entries, include_bootstrap).await
}

/// Write the bundled bootstrap launcher if no file exists yet. An existing
/// file is left alone even when the bundled template changed.
async fn write_bootstrap_once(templates_dir: &Path) -> Result<()> {
    let path = templates_dir.join(BOOTSTRAP_FILE);
    if fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(());
    }
    info!("creating start launcher");
    fs::write(&path, BOOTSTRAP_TEMPLATE).await?;
    linux_fs::relax_file_permissions(&path).await?;
    Ok(())
}

/// Delete launcher files whose base name is absent from the new entry set.
/// The bootstrap file is protected while it is applicable; for VM classes
/// it does not apply to, a leftover one is collected like any stale file.
async fn collect_stale(
    layout: &Layout,
    entries: &EntrySet,
    include_bootstrap: bool,
) -> Result<()> {
    let mut rd = fs::read_dir(&layout.templates_dir).await?;

    while let Some(ent) = rd.next_entry().await? {
        let file_name = ent.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = file_name.strip_suffix(".desktop") else {
            continue;
        };
        if include_bootstrap && file_name == BOOTSTRAP_FILE {
            continue;
        }
        if !entries.contains_key(stem) {
            info!(file = %file_name, "removing stale launcher");
            fs::remove_file(ent.path()).await?;
        }
    }

    Ok(())
}
