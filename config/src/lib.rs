#![no_std]

// Configuration for the vNIC simulator
// A minimal TOML reader plus the typed device configuration built from it

extern crate alloc;

pub mod error;
pub mod toml;
pub mod types;

pub use error::ConfigError;
pub use toml::{TomlParser, Value};
pub use types::{parse_mac, MacAddress, VnicConfig, DEFAULT_MAC};
