//! Cache inspection and reclamation command

use std::path::PathBuf;

use crate::cache;
use crate::cli::{CacheArgs, CacheSubcommand};
use crate::config;
use crate::error::Result;

pub fn run(args: CacheArgs) -> Result<()> {
    let cache_root = std::env::var(config::ENV_CACHE_DIR).ok().map(PathBuf::from);

    match args.command {
        Some(CacheSubcommand::Reclaim) => reclaim(cache_root.as_deref()),
        Some(CacheSubcommand::List) | None => list(cache_root.as_deref()),
    }
}

fn list(cache_root: Option<&std::path::Path>) -> Result<()> {
    let base = cache::cache_base(cache_root);
    println!("Template cache:");
    println!("  Location: {}", base.display());

    let leases = cache::list_leases(cache_root)?;
    if leases.is_empty() {
        println!("\nNo template cache directories.");
        return Ok(());
    }

    println!("\nCache directories ({}):", leases.len());
    for lease in &leases {
        let status = if lease.owner_alive {
            "live"
        } else {
            "orphaned"
        };
        println!(
            "  {} (pid {}, {})",
            lease.path.display(),
            lease.owner_pid,
            status
        );
    }
    println!("\nRun 'sddkit cache reclaim' to remove orphaned directories.");

    Ok(())
}

fn reclaim(cache_root: Option<&std::path::Path>) -> Result<()> {
    let removed = cache::reclaim_orphans(cache_root)?;
    if removed == 0 {
        println!("No orphaned cache directories found.");
    } else {
        println!(
            "Reclaimed {} orphaned cache director{}.",
            removed,
            if removed == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}
