//! sddkit - spec-driven development scaffolding
//!
//! Locates a valid set of scaffolding templates for a project, choosing
//! between a user-owned local override, the bundled fallback shipped with the
//! installation, and a ZIP archive downloaded from a configurable GitHub
//! repository. The download path covers the full lifecycle: ephemeral cache
//! directory, streaming HTTPS download with progress, untrusted-archive
//! validation and extraction, and crash-safe cleanup.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod progress;
pub mod resolver;
