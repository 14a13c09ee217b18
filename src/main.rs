// -- std imports
use std::env;

// -- crate imports
use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{debug, info};

// -- module definitions
mod args;
mod entries;
mod error;
mod icons;
mod linux_fs;
mod log;
mod protocol;
mod reconcile;
mod render;
mod sanitize;
mod vm;

// -- module imports
use crate::args::Args;
use crate::error::SyncError;
use crate::linux_fs::Layout;
use crate::protocol::Limits;
use crate::render::RenderMode;
use crate::vm::Qube;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.no_log {
        tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default())
            .expect("Failed to set no-op subscriber");
    } else {
        log::init_tracing()?;
        info!("appmenu-sync started");
        debug!("Parsed args: {args:#?}");
    }

    // Over qrexec the calling domain is the one to synchronize and its
    // service call is already connected to stdin.
    let env_vmname = env::var("QREXEC_REMOTE_DOMAIN").ok();
    let Some(vm_name) = env_vmname.clone().or_else(|| args.vm.clone()) else {
        bail!("you must specify at least the VM name");
    };
    let vm = Qube::new(vm_name);
    let use_stdin = env_vmname.is_some() && !args.force_rpc;

    if !args.regenerate_only {
        synchronize(&vm, &args, use_stdin).await?;
    }
    vm.refresh_menus().await?;

    info!("appmenu-sync done!");
    Ok(())
}

/// Retrieve entries from the VM and reconcile the template directories.
async fn synchronize(vm: &Qube, args: &Args, use_stdin: bool) -> Result<()> {
    if !vm.is_running().await? {
        return Err(SyncError::VmNotRunning(vm.name().to_string()).into());
    }

    let limits = Limits::default();
    let lines = if use_stdin {
        protocol::read_local_lines(BufReader::new(tokio::io::stdin()), &limits).await?
    } else {
        vm.fetch_entry_lines(&limits).await?
    };
    debug!(count = lines.len(), "read launcher entry lines");

    let entry_set = entries::assemble(protocol::parse_triples(&lines));
    let klass = vm.klass().await?;

    // Only non-AppVM classes get the synthetic start launcher; AppVMs use
    // the one of their template.
    let include_bootstrap = klass != "AppVM";

    if entry_set.is_empty() && include_bootstrap {
        info!("no launcher entries received, skipping reconciliation");
        return Ok(());
    }

    let mode = if vm.uses_legacy_menus().await? {
        RenderMode::Legacy
    } else {
        RenderMode::Service
    };
    info!(
        vm = vm.name(),
        entries = entry_set.len(),
        ?mode,
        "reconciling launcher templates"
    );

    let layout = Layout::for_vm(&args.base_dir, &klass, vm.name());
    reconcile::reconcile(&layout, entry_set, mode, include_bootstrap, vm)
        .await
        .with_context(|| format!("failed to reconcile launcher templates for '{}'", vm.name()))
}
