//! bypasser common library
//!
//! WireGuard mesh provisioning from on-disk state: an INI-like config codec,
//! a scan-based port/subnet allocator, peer block surgery, an idempotent
//! file store, and the orchestration that ties them to `wg`/`systemctl`.

pub mod address;
pub mod allocator;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod locator;
pub mod manager;
pub mod netinfo;
pub mod render;
pub mod store;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use allocator::ConfigSource;
pub use config::{Config, KeyBackend};
pub use error::{Error, Result};
pub use keys::{KeyGenerator, NativeKeyGenerator, WgCliKeyGenerator};
pub use manager::{Dependencies, Manager};
pub use store::ConfigStore;
pub use system::{ExecSystem, System};
pub use types::*;

/// bypasser version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
