//! Folding sanitized triples into the per-run entry set.

// -- std imports
use std::collections::BTreeMap;

// -- crate imports
use tracing::warn;

// -- module imports
use crate::protocol::ParsedTriple;
use crate::sanitize::{Field, sanitize_value};

/// Name reserved for the synthetic "start this VM" launcher. It is generated
/// locally and must never be sourced from the VM.
pub const RESERVED_BOOTSTRAP_NAME: &str = "qubes-start";

/// One launcher entry: its sanitized field mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub fields: BTreeMap<Field, String>,
}

/// All entries of one run, keyed by entry name. Built once, then immutable
/// apart from the icon pipeline dropping a failed `Icon` field.
pub type EntrySet = BTreeMap<String, Entry>;

/// Fold parsed triples into an [`EntrySet`].
///
/// Unknown keys are ignored without a log line (forward-compatible policy);
/// a value failing its allow-list is warned about and dropped, keeping the
/// rest of the entry. The last occurrence of a key in file order wins. The
/// reserved bootstrap name is removed unconditionally at the end.
pub fn assemble(triples: Vec<ParsedTriple>) -> EntrySet {
    let mut set = EntrySet::new();

    for triple in triples {
        let Some(field) = Field::from_key(&triple.key) else {
            continue;
        };
        match sanitize_value(field, &triple.value) {
            Some(value) => {
                set.entry(triple.entry)
                    .or_default()
                    .fields
                    .insert(field, value);
            }
            None => {
                warn!(
                    entry = %triple.entry,
                    key = %triple.key,
                    "ignoring value failing its allow-list"
                );
            }
        }
    }

    set.remove(RESERVED_BOOTSTRAP_NAME);
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(entry: &str, key: &str, value: &str) -> ParsedTriple {
        ParsedTriple {
            entry: entry.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn folds_triples_per_entry() {
        let set = assemble(vec![
            triple("app1", "Name", "Editor"),
            triple("app1", "Exec", "/usr/bin/editor"),
            triple("app2", "Name", "Browser"),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(
            set["app1"].fields[&Field::Exec].as_str(),
            "/usr/bin/editor"
        );
        assert_eq!(set["app2"].fields[&Field::Name].as_str(), "Browser");
    }

    #[test]
    fn last_write_wins_per_key() {
        let set = assemble(vec![
            triple("app1", "Name", "First"),
            triple("app1", "Name", "Second"),
        ]);
        assert_eq!(set["app1"].fields[&Field::Name].as_str(), "Second");
    }

    #[test]
    fn unknown_keys_never_reach_an_entry() {
        let set = assemble(vec![
            triple("app1", "Name", "Editor"),
            triple("app1", "OnlyShowIn", "GNOME"),
            triple("app1", "Name[de]", "Editor"),
        ]);
        assert_eq!(set["app1"].fields.len(), 1);
    }

    #[test]
    fn rejected_value_drops_only_that_key() {
        let set = assemble(vec![
            triple("app1", "Name", "Editor"),
            triple("app1", "Exec", "editor; reboot"),
        ]);
        assert!(set["app1"].fields.contains_key(&Field::Name));
        assert!(!set["app1"].fields.contains_key(&Field::Exec));
    }

    #[test]
    fn categories_are_domain_filtered_during_assembly() {
        let set = assemble(vec![triple("app1", "Categories", "Utility;BogusCat;Office")]);
        assert_eq!(
            set["app1"].fields[&Field::Categories].as_str(),
            "Utility;Office;"
        );
    }

    #[test]
    fn reserved_bootstrap_name_is_removed() {
        let set = assemble(vec![
            triple("qubes-start", "Name", "sneaky"),
            triple("app1", "Name", "Editor"),
        ]);
        assert!(!set.contains_key(RESERVED_BOOTSTRAP_NAME));
        assert!(set.contains_key("app1"));
    }
}
