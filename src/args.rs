//! Command-line argument definitions.

// -- std imports
use std::path::PathBuf;

// -- crate imports
use clap::Parser;

/// Command-line arguments for `appmenu-sync`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "appmenu-sync",
    about = "Retrieve launcher entries from a VM and synchronize sanitized launcher templates"
)]
pub struct Args {
    /// Name of the VM to synchronize (may be omitted when invoked over
    /// qrexec, where the remote domain is taken from the environment)
    pub vm: Option<String>,

    /// Start a fresh service call even when invoked from an existing one
    #[arg(long)]
    pub force_rpc: bool,

    /// Skip retrieval and reconciliation, only refresh the installed menus
    #[arg(long)]
    pub regenerate_only: bool,

    /// Base directory of the per-VM state directories
    #[arg(long, default_value = "/var/lib/qubes")]
    pub base_dir: PathBuf,

    /// Suppress all logging output
    #[arg(long)]
    pub no_log: bool,
}
