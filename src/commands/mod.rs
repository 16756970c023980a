//! Command implementations for the sddkit CLI

pub mod cache;
pub mod completions;
pub mod fetch;
pub mod version;
