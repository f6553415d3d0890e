//! # ircbot framework
//!
//! The capability stack of the ircbot framework. A bot is a chain of
//! [`Handler`] layers over a single [`BotContext`]:
//!
//! | Layer | Adds |
//! |-------|------|
//! | [`CommandsLayer`] | `help`, unknown-command fallback, greeting hint |
//! | [`AdminLayer`] | admin set, privileged command tier |
//! | [`OptionsLayer`] | typed runtime options and their commands |
//! | [`CacheLayer`] | expiring lookup cache and its commands |
//!
//! Domain layers (reference scanners, greeters...) go on top. The
//! [`Bot`] router feeds inbound lines through the chain one at a time.

pub mod cache;
pub mod command;
pub mod context;
pub mod fetch;
pub mod handler;
pub mod help;
pub mod layers;
pub mod options;
pub mod reply;
pub mod router;
pub mod storage;

pub use cache::{Cache, CacheKey, CacheRecord, Clock, Lookup, ManualClock, SystemClock};
pub use command::{CommandCall, CommandTable, normalize_command};
pub use context::BotContext;
pub use fetch::{Fetcher, Fetchers, cache_fetch};
pub use handler::{Base, Dispatch, Handler, Tier, join_channel};
pub use help::{HelpEntry, HelpSink};
pub use layers::{AdminLayer, AdminSet, CacheLayer, CacheSettings, CommandsLayer, OptionsLayer};
pub use options::{Constraint, OptionRegistry, OptionSpec, OptionType, set_option};
pub use reply::{OpReport, errmsg, okmsg};
pub use router::{Bot, parse_addressed};
pub use storage::{FileStore, StoreError, StoreResult};
