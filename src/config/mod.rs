//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! binary preset (ServerConfig)
//!     → loader.rs (optional TOML file layered on top)
//!     → command-line flags (cli.rs)
//!     → validation.rs (semantic checks)
//!     → runtime.rs (DelayPolicy, BridgeTopology, timeouts, limits)
//!     → shared via Arc by every session
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never changes afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod runtime;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_layered, ConfigError};
pub use runtime::RuntimeConfig;
pub use schema::{
    DelayConfig, HttpConfig, ListenerConfig, ObservabilityConfig, ServerConfig, SyntheticConfig, TimeoutConfig,
    TopologyConfig, TopologyMode,
};
pub use validation::{validate_config, ValidationError};
