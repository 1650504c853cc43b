//! guidmap - user/group identity mapping for filesystem mounts
//!
//! Maps user and group names to numeric ids and back. Names are resolved
//! from the local account files when those are authoritative, and
//! otherwise from a salted digest of the name, so every name gets a stable
//! id. A [`PermissionContext`] turns a configured (user, groups, superuser,
//! supergroup) tuple into the uid/gids a mount operates as and publishes
//! them to the filesystem bridge's configuration.
//!
//! ```no_run
//! use std::sync::Arc;
//! use guidmap::{MemoryConfig, Options, PermissionContext};
//!
//! let cfg = Arc::new(MemoryConfig::new());
//! let ctx = PermissionContext::new(cfg.clone(), Options::default());
//! let perm = ctx.configure("fs", "alice", "dev,ops", "hdfs", "supergroup", 0o022)?;
//! println!("uid={} gids={}", perm.uid, perm.gids_csv());
//! # Ok::<(), guidmap::GuidError>(())
//! ```

pub mod accounts;
pub mod config;
pub mod constants;
pub mod error;
pub mod generator;
pub mod listing;
pub mod permission;
pub mod principal;
pub mod resolver;
pub mod store;

pub use accounts::{AccountFile, LocalAccounts, Snapshot};
pub use config::{ConfigSink, MemoryConfig, Options};
pub use constants::*;
pub use error::{GuidError, Result};
pub use generator::{generate, HashAlgorithm, IdGenerator};
pub use listing::{parse_groups, parse_users, GroupEntry};
pub use permission::{parse_group_csv, EffectivePermission, PermissionContext};
pub use principal::{Kind, Principal};
pub use resolver::IdentityResolver;
pub use store::IdentityStore;
