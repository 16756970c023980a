//! Fetch command: resolve a template set and report provenance

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use walkdir::WalkDir;

use crate::cache;
use crate::cli::FetchArgs;
use crate::config::TemplateConfig;
use crate::error::{Result, SddError};
use crate::progress::ProgressDisplay;
use crate::resolver::{ResolveRequest, TemplateResolver, TemplateSourceKind};

pub fn run(project_dir: Option<PathBuf>, args: FetchArgs, verbose: bool) -> Result<()> {
    let project = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let mut config = TemplateConfig::from_env(&project)?;
    if let Some(repo) = &args.template_repo {
        config.repo = repo.parse()?;
    }

    // Reclaim leftovers from crashed invocations before opening a new lease
    match cache::reclaim_orphans(config.cache_root.as_deref()) {
        Ok(reclaimed) if reclaimed > 0 && verbose => {
            println!(
                "Reclaimed {} orphaned cache director{}",
                reclaimed,
                if reclaimed == 1 { "y" } else { "ies" }
            );
        }
        Err(e) => eprintln!("Warning: orphan reclamation failed: {}", e),
        _ => {}
    }

    let resolver = TemplateResolver::new(config);
    let request = ResolveRequest {
        logical_name: args.name.clone(),
        offline: args.offline,
        force_download: args.force_download,
        repo_override: None,
    };

    let mut display = ProgressDisplay::new();
    let mut result = {
        let mut sink = |event: &crate::progress::ProgressEvent| display.handle(event);
        resolver.resolve_with_progress(&request, &mut sink)
    };
    display.finish();

    if !result.succeeded {
        eprintln!("{}", result.message);
        std::process::exit(1);
    }

    println!("{} {}", style("✓").green().bold(), result.message);
    if let Some(source) = &result.source {
        println!("  source: {}", source.kind);
        println!("  root:   {}", source.root_path.display());
        if verbose {
            if let Some(size) = source.size_bytes {
                println!("  size:   {}", human_size(size));
            }
            if result.fallback_attempted {
                println!("  note:   fell back after a failed download");
            }
        }

        if let Some(dest) = &args.dest {
            let copied = copy_templates(&source.root_path, dest)?;
            println!(
                "Copied {} file{} into {}",
                copied,
                if copied == 1 { "" } else { "s" },
                dest.display()
            );
        }

        if args.no_cleanup && source.kind == TemplateSourceKind::Downloaded {
            result.keep_cache();
            println!("Cache directory kept (--no-cleanup)");
        }
    }

    result.cleanup();
    Ok(())
}

/// Copy the resolved template tree into `dest`, reading only from `src`.
fn copy_templates(src: &Path, dest: &Path) -> Result<usize> {
    if dest.starts_with(src) {
        return Err(SddError::IoError {
            message: format!(
                "destination {} is inside the template source",
                dest.display()
            ),
        });
    }

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SddError::IoError {
                message: e.to_string(),
            })?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
