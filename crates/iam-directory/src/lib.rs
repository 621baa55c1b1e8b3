//! # IAM Directory
//!
//! Read access to an account's IAM resources: groups, users, policies,
//! bindings, and the platform's own effective-permissions resolution.
//!
//! ## Overview
//!
//! - [`Directory`]: the async trait analysis code depends on
//! - [`HttpDirectory`]: the IAM REST API over reqwest, with retries
//! - [`CachedDirectory`]: a bounded TTL cache wrapping any directory
//! - [`MemoryDirectory`]: in-memory records for tests and offline use
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iam_directory::{CachedDirectory, Directory, DirectoryConfig, HttpDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DirectoryConfig::from_env();
//! config.validate()?;
//!
//! let (ttl, capacity) = (config.cache_ttl(), config.cache_capacity);
//! let directory = CachedDirectory::with_capacity(HttpDirectory::new(config)?, ttl, capacity);
//!
//! for group in directory.list_groups().await? {
//!     println!("{} ({})", group.name, group.uuid);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheStats, CachedDirectory};
pub use config::{ConfigError, DirectoryConfig, DEFAULT_API_URL};
pub use directory::Directory;
pub use error::{DirectoryError, DirectoryResult};
pub use http::HttpDirectory;
pub use memory::MemoryDirectory;
pub use retry::{with_retry_if, RetryConfig};
pub use types::{
    Binding, EffectivePermissionsPage, EffectivePermissionsQuery, EntityType, Group, Policy, User,
};
