//! Cache storage for outrider.
//!
//! This crate defines the contract for named cache generations
//! ([`CacheStorage`]), the freshness metadata carried by every stored response
//! ([`CachedResponse`]), the TTL/size bounded [`ExpirationPlugin`] applied on
//! every runtime write, and an in-memory backend.
//!
//! # Example
//!
//! ```ignore
//! let storage = InMemoryCacheStorage::new();
//! let plugin = ExpirationPlugin::new(RuntimeCacheOptions::default());
//!
//! plugin.write(&storage, "api:42", "/p/1", response).await?;
//! let hit = plugin.lookup(&storage, "api:42", "/p/1").await?;
//! ```

pub mod expiration;
pub mod freshness;
pub mod memory;
pub mod traits;

pub use expiration::{ExpirationPlugin, WriteReport};
pub use freshness::CachedResponse;
pub use memory::InMemoryCacheStorage;
pub use traits::{CacheStats, CacheStorage, EntryMeta};
