//! Caching subsystem: key derivation and the layered cache cascade
//!
//! Query results are cached under deterministic, content-derived keys. A key
//! is a Murmur3 digest of the query text, a role tag (collection vs scalar
//! lookup), and a stable encoding of the bound parameters. Lookups walk an
//! ordered stack of pluggable layers; the first hit wins, and population
//! writes to every layer.

pub mod cascade;
pub mod key;
pub mod layer;
pub mod memory;
pub mod murmur3;

pub use cascade::CacheCascade;
pub use key::{derive_key, CacheRole};
pub use layer::CacheLayer;
pub use memory::MemoryCacheLayer;
