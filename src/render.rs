//! Rendering one entry into a launcher template body.
//!
//! The body is a deterministic function of the entry and the render mode;
//! whether it actually hits the disk is decided later by a byte-for-byte
//! comparison against the existing file.

// -- std imports
use std::fmt::Write;

// -- crate imports
use anyhow::{Context, Result, bail};
use tracing::warn;

// -- module imports
use crate::entries::Entry;
use crate::sanitize::Field;

/// Subdirectory of `%VMDIR%` the rendered `Icon=` lines point into. The
/// per-VM icons are placed there by the menu refresh step, not by this tool.
pub const ICONS_SUBDIR: &str = "apps.icons";

/// Category appended to every rendered `Categories=` line.
const FORCED_CATEGORY: &str = "X-Qubes-VM;";

/// How `Exec=` lines are constructed, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// VM without a per-application invocation service: the sanitized raw
    /// command is shell-quoted and passed to `qvm-run` as a single argument.
    Legacy,
    /// VM with the `qubes.StartApp` service: the entry name selects the
    /// application, no shell command crosses the boundary.
    Service,
}

impl RenderMode {
    fn required_fields(self) -> &'static [Field] {
        match self {
            Self::Legacy => &[Field::Name, Field::Exec],
            Self::Service => &[Field::Name],
        }
    }
}

/// Render the launcher template body for one entry.
///
/// Returns `Ok(None)` when a required field is missing; the entry is skipped
/// with a warning and the run continues.
///
/// # Errors
/// - in service mode, if the entry name fails the pre-interpolation re-check
///   (second line of defense; the protocol parser's character set should
///   already make this impossible).
pub fn render_entry(name: &str, entry: &Entry, mode: RenderMode) -> Result<Option<String>> {
    for field in mode.required_fields() {
        if !entry.fields.contains_key(field) {
            warn!(
                entry = %name,
                missing = field.key(),
                "not creating/updating launcher because of missing required field"
            );
            return Ok(None);
        }
    }

    let mut body = String::new();
    body.push_str("[Desktop Entry]\n");
    body.push_str("Version=1.0\n");
    body.push_str("Type=Application\n");
    body.push_str("Terminal=false\n");
    body.push_str("X-Qubes-VmName=%VMNAME%\n");
    writeln!(body, "X-Qubes-AppName={name}")?;

    if entry.fields.contains_key(&Field::Icon) {
        writeln!(body, "Icon=%VMDIR%/{ICONS_SUBDIR}/{name}.png")?;
    } else {
        body.push_str("Icon=%XDGICON%\n");
    }

    for field in [Field::Name, Field::GenericName] {
        if let Some(value) = entry.fields.get(&field) {
            writeln!(body, "{}=%VMNAME%: {value}", field.key())?;
        }
    }

    if let Some(comment) = entry.fields.get(&Field::Comment) {
        writeln!(body, "Comment={comment}")?;
    }

    // The forced category is appended regardless of what the VM supplied,
    // so a Categories line is always present.
    let categories = entry
        .fields
        .get(&Field::Categories)
        .map(String::as_str)
        .unwrap_or("");
    writeln!(body, "Categories={categories}{FORCED_CATEGORY}")?;

    match mode {
        RenderMode::Legacy => {
            let exec = &entry.fields[&Field::Exec];
            let quoted = shlex::try_quote(exec)
                .with_context(|| format!("Exec value of '{name}' cannot be shell-quoted"))?;
            writeln!(body, "Exec=qvm-run -q -a %VMNAME% -- {quoted}")?;
            writeln!(
                body,
                "X-Qubes-DispvmExec=qvm-run -q -a --dispvm=%VMNAME% -- {quoted}"
            )?;
        }
        RenderMode::Service => {
            // Already excluded by the entry-name character set; re-checked
            // here as a hard error before string interpolation.
            if name.contains([' ', ';', '%']) {
                bail!("entry name {name:?} failed the pre-interpolation re-check");
            }
            writeln!(
                body,
                "Exec=qvm-run -q -a --service -- %VMNAME% qubes.StartApp+{name}"
            )?;
            writeln!(
                body,
                "X-Qubes-DispvmExec=qvm-run -q -a --service --dispvm=%VMNAME% -- qubes.StartApp+{name}"
            )?;
        }
    }

    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fields: &[(Field, &str)]) -> Entry {
        Entry {
            fields: fields
                .iter()
                .map(|(f, v)| (*f, v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn legacy_exec_is_shell_quoted() {
        let e = entry(&[
            (Field::Name, "Editor"),
            (Field::Exec, "/usr/bin/editor --new"),
        ]);
        let body = render_entry("app1", &e, RenderMode::Legacy)
            .unwrap()
            .unwrap();
        assert!(body.contains("Exec=qvm-run -q -a %VMNAME% -- '/usr/bin/editor --new'\n"));
        assert!(body.contains(
            "X-Qubes-DispvmExec=qvm-run -q -a --dispvm=%VMNAME% -- '/usr/bin/editor --new'\n"
        ));
        assert!(body.contains("Name=%VMNAME%: Editor\n"));
    }

    #[test]
    fn service_mode_interpolates_the_entry_name() {
        let e = entry(&[(Field::Name, "Editor")]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.contains("Exec=qvm-run -q -a --service -- %VMNAME% qubes.StartApp+app1\n"));
        assert!(body.contains(
            "X-Qubes-DispvmExec=qvm-run -q -a --service --dispvm=%VMNAME% -- qubes.StartApp+app1\n"
        ));
    }

    #[test]
    fn legacy_requires_name_and_exec() {
        let e = entry(&[(Field::Name, "Editor")]);
        assert!(render_entry("app1", &e, RenderMode::Legacy)
            .unwrap()
            .is_none());

        let e = entry(&[(Field::Exec, "/usr/bin/editor")]);
        assert!(render_entry("app1", &e, RenderMode::Legacy)
            .unwrap()
            .is_none());
    }

    #[test]
    fn service_requires_only_name() {
        let e = entry(&[(Field::Name, "Editor")]);
        assert!(render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .is_some());
    }

    #[test]
    fn categories_line_always_carries_the_forced_category() {
        let e = entry(&[(Field::Name, "Editor")]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.contains("Categories=X-Qubes-VM;\n"));

        let e = entry(&[
            (Field::Name, "Editor"),
            (Field::Categories, "Utility;Office;"),
        ]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.contains("Categories=Utility;Office;X-Qubes-VM;\n"));
    }

    #[test]
    fn icon_field_switches_the_icon_line() {
        let e = entry(&[(Field::Name, "Editor"), (Field::Icon, "editor-icon")]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.contains("Icon=%VMDIR%/apps.icons/app1.png\n"));

        let e = entry(&[(Field::Name, "Editor")]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.contains("Icon=%XDGICON%\n"));
    }

    #[test]
    fn generic_name_and_comment_render_only_when_present() {
        let e = entry(&[
            (Field::Name, "Editor"),
            (Field::GenericName, "Text Editor"),
            (Field::Comment, "Edit text files"),
        ]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.contains("GenericName=%VMNAME%: Text Editor\n"));
        assert!(body.contains("Comment=Edit text files\n"));
    }

    #[test]
    fn malicious_name_is_rejected_before_interpolation() {
        let e = entry(&[(Field::Name, "Editor")]);
        assert!(render_entry("a b", &e, RenderMode::Service).is_err());
        assert!(render_entry("a;b", &e, RenderMode::Service).is_err());
        assert!(render_entry("a%b", &e, RenderMode::Service).is_err());
    }

    #[test]
    fn body_starts_with_the_fixed_header() {
        let e = entry(&[(Field::Name, "Editor")]);
        let body = render_entry("app1", &e, RenderMode::Service)
            .unwrap()
            .unwrap();
        assert!(body.starts_with(
            "[Desktop Entry]\n\
             Version=1.0\n\
             Type=Application\n\
             Terminal=false\n\
             X-Qubes-VmName=%VMNAME%\n\
             X-Qubes-AppName=app1\n"
        ));
    }
}
