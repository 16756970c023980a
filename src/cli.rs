//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sddkit - spec-driven development scaffolding
///
/// Fetch project scaffolding templates from a local override, the bundled
/// fallback, or a configurable GitHub repository.
#[derive(Parser, Debug)]
#[command(
    name = "sddkit",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Spec-driven development scaffolding for AI coding assistants",
    long_about = "sddkit locates a valid set of scaffolding templates for a project, \
                  choosing between a user-owned local override (.sdd/templates), the \
                  bundled fallback shipped with the installation, and a template \
                  repository downloaded from GitHub.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  sddkit fetch\n    \
                  sddkit fetch spec-templates --dest ./specs\n    \
                  sddkit fetch --offline\n    \
                  sddkit fetch --force-download --template-repo acme/sdd-templates\n    \
                  sddkit cache reclaim\n\n\
                  \x1b[1m\x1b[32mDocumentation:\x1b[0m\n    \
                  https://github.com/asyrjasalo/sddkit"
)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(long, short = 'C', global = true)]
    pub project_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a template set and report where it came from
    Fetch(FetchArgs),

    /// Inspect and reclaim ephemeral template cache directories
    Cache(CacheArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Resolve the default template set:\n    sddkit fetch\n\n\
                  Copy resolved templates into a directory:\n    sddkit fetch --dest ./specs\n\n\
                  Skip all network access:\n    sddkit fetch --offline\n\n\
                  Force a fresh download for this run only:\n    sddkit fetch --force-download\n\n\
                  Fetch from another repository:\n    sddkit fetch --template-repo acme/sdd-templates\n\n\
                  Keep the cache directory for debugging:\n    sddkit fetch --no-cleanup")]
pub struct FetchArgs {
    /// Logical template set to resolve
    #[arg(default_value = "spec-templates")]
    pub name: String,

    /// Skip the network tier entirely
    #[arg(long, env = "SDDKIT_OFFLINE")]
    pub offline: bool,

    /// Bypass local and bundled templates for this run (never modifies them)
    #[arg(long)]
    pub force_download: bool,

    /// Template repository to download from (owner/repo)
    #[arg(long, value_name = "OWNER/REPO", env = "SDDKIT_TEMPLATE_REPO")]
    pub template_repo: Option<String>,

    /// Copy the resolved templates into this directory
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Keep the ephemeral cache directory for debugging
    #[arg(long)]
    pub no_cleanup: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Show cache location and live directories:\n    sddkit cache\n\n\
                  List cache directories:\n    sddkit cache list\n\n\
                  Remove directories left by crashed processes:\n    sddkit cache reclaim")]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: Option<CacheSubcommand>,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List cache directories and their owning processes
    List,

    /// Remove cache directories whose owning process is gone
    Reclaim,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    sddkit completions --shell bash > ~/.bash_completion.d/sddkit\n\n\
                  Generate zsh completions:\n    sddkit completions --shell zsh > ~/.zfunc/_sddkit\n\n\
                  Generate fish completions:\n    sddkit completions --shell fish > ~/.config/fish/completions/sddkit.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
