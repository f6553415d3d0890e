//! Capability layers, innermost first: commands, admin, options, cache.

pub mod admin;
pub mod cache;
pub mod commands;
pub mod options;

pub use admin::{Admin, AdminLayer, AdminSet};
pub use cache::{CacheLayer, CacheSettings, CacheState, Caching};
pub use commands::{Commands, CommandsLayer};
pub use options::{Options, OptionsLayer};
