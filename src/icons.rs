//! Per-entry icon synchronization.
//!
//! The actual decoding/encoding lives behind [`IconSource`]; this module only
//! compares the converter's output against the on-disk artifact and writes on
//! change. Converter failures degrade: an existing icon is kept, otherwise
//! the entry falls back to the renderer's placeholder icon. Nothing here may
//! abort the run.

// -- std imports
use std::io::ErrorKind;
use std::path::Path;

// -- crate imports
use anyhow::Result;
use tokio::fs;
use tracing::{debug, warn};

// -- module imports
use crate::entries::Entry;
use crate::linux_fs;
use crate::sanitize::Field;

/// Seam to the external icon converter: given a sanitized icon reference,
/// produce the comparable bitmap bytes for it.
#[allow(async_fn_in_trait)]
pub trait IconSource {
    async fn fetch_icon(&self, icon_ref: &str) -> Result<Vec<u8>>;
}

/// Synchronize the icon artifact for one entry.
///
/// - converter success: write `<icons_dir>/<name>.png` only when the bytes
///   differ from the existing artifact (or none exists);
/// - converter failure with an existing artifact: keep it, warn;
/// - converter failure without one: drop the `Icon` field so the renderer
///   falls back to its placeholder, warn.
pub async fn sync_icon<S: IconSource>(
    source: &S,
    icons_dir: &Path,
    name: &str,
    entry: &mut Entry,
) {
    let Some(icon_ref) = entry.fields.get(&Field::Icon) else {
        return;
    };
    let dest = icons_dir.join(format!("{name}.png"));

    let result = match source.fetch_icon(icon_ref).await {
        Ok(bitmap) => store_if_changed(&dest, &bitmap).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!(entry = %name, error = %e, "failed to get icon");
        if fs::try_exists(&dest).await.unwrap_or(false) {
            warn!(entry = %name, "found old icon, using it instead");
        } else {
            entry.fields.remove(&Field::Icon);
        }
    }
}

async fn store_if_changed(dest: &Path, bitmap: &[u8]) -> Result<()> {
    let existing = match fs::read(dest).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    if existing.as_deref() == Some(bitmap) {
        debug!(dest = %dest.display(), "icon unchanged");
        return Ok(());
    }

    fs::write(dest, bitmap).await?;
    linux_fs::relax_file_permissions(dest).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct FixedIcon(Vec<u8>);

    impl IconSource for FixedIcon {
        async fn fetch_icon(&self, _icon_ref: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenConverter;

    impl IconSource for BrokenConverter {
        async fn fetch_icon(&self, _icon_ref: &str) -> Result<Vec<u8>> {
            anyhow::bail!("converter blew up")
        }
    }

    fn entry_with_icon() -> Entry {
        Entry {
            fields: BTreeMap::from([(Field::Icon, "editor-icon".to_string())]),
        }
    }

    #[tokio::test]
    async fn writes_new_icon_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut entry = entry_with_icon();

        sync_icon(&FixedIcon(b"PNG1".to_vec()), dir.path(), "app1", &mut entry).await;

        let written = std::fs::read(dir.path().join("app1.png")).unwrap();
        assert_eq!(written, b"PNG1");
        assert!(entry.fields.contains_key(&Field::Icon));
    }

    #[tokio::test]
    async fn unchanged_icon_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app1.png");
        std::fs::write(&dest, b"PNG1").unwrap();
        let before = std::fs::metadata(&dest).unwrap().modified().unwrap();

        let mut entry = entry_with_icon();
        sync_icon(&FixedIcon(b"PNG1".to_vec()), dir.path(), "app1", &mut entry).await;

        let after = std::fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn changed_icon_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app1.png");
        std::fs::write(&dest, b"OLD").unwrap();

        let mut entry = entry_with_icon();
        sync_icon(&FixedIcon(b"NEW".to_vec()), dir.path(), "app1", &mut entry).await;

        assert_eq!(std::fs::read(&dest).unwrap(), b"NEW");
    }

    #[tokio::test]
    async fn converter_failure_keeps_existing_icon_and_field() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app1.png");
        std::fs::write(&dest, b"OLD").unwrap();

        let mut entry = entry_with_icon();
        sync_icon(&BrokenConverter, dir.path(), "app1", &mut entry).await;

        assert_eq!(std::fs::read(&dest).unwrap(), b"OLD");
        assert!(entry.fields.contains_key(&Field::Icon));
    }

    #[tokio::test]
    async fn converter_failure_without_icon_drops_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut entry = entry_with_icon();

        sync_icon(&BrokenConverter, dir.path(), "app1", &mut entry).await;

        assert!(!entry.fields.contains_key(&Field::Icon));
        assert!(!dir.path().join("app1.png").exists());
    }

    #[tokio::test]
    async fn entries_without_icon_field_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut entry = Entry::default();

        sync_icon(&FixedIcon(b"PNG1".to_vec()), dir.path(), "app1", &mut entry).await;

        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
