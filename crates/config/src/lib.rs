//! Configuration loading, schema, and env substitution.
//!
//! Config files: `waypost.toml`, `waypost.yaml`, or `waypost.json`
//! Searched in `./` then `~/.config/waypost/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config, load_or_default},
    schema::{
        BackendConfig, ChannelConfig, DispatchConfig, ServerConfig, StorageConfig, WaypostConfig,
    },
};
