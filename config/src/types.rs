//! Configuration types for the vNIC simulator
//!
//! `VnicConfig` describes one simulated interface: its name, hardware
//! address, descriptor ring sizes and the NAPI poll weight.

extern crate alloc;

use crate::error::ConfigError;
use crate::toml::{TomlParser, Value};
use alloc::format;
use alloc::string::ToString;

/// Interface names follow the kernel's IFNAMSIZ limit (15 chars + NUL)
pub type IfName = heapless::String<16>;

pub type MacAddress = [u8; 6];

/// 00:56:4E:49:43:53, i.e. "\0VNICS"
pub const DEFAULT_MAC: MacAddress = [0x00, 0x56, 0x4E, 0x49, 0x43, 0x53];

pub const DEFAULT_RING_SIZE: usize = 1024;
pub const DEFAULT_NAPI_WEIGHT: usize = 64;
const MIN_RING_SIZE: usize = 2;

/// Configuration of a single simulated NIC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnicConfig {
    pub name: IfName,
    pub mac: MacAddress,
    /// Transmit descriptors (one is always kept free)
    pub tx_ring_size: usize,
    /// Receive descriptors (one is always kept free)
    pub rx_ring_size: usize,
    /// Maximum packets handled per poll pass
    pub napi_weight: usize,
}

impl Default for VnicConfig {
    fn default() -> Self {
        let mut name = IfName::new();
        // "vnic0" always fits
        let _ = name.push_str("vnic0");
        Self {
            name,
            mac: DEFAULT_MAC,
            tx_ring_size: DEFAULT_RING_SIZE,
            rx_ring_size: DEFAULT_RING_SIZE,
            napi_weight: DEFAULT_NAPI_WEIGHT,
        }
    }
}

impl VnicConfig {
    /// Load from a TOML document. Every key of the `[vnic]` table is
    /// optional; missing keys keep their default.
    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        let root = TomlParser::parse(data)?;
        Self::from_value(&root)
    }

    /// Build from an already parsed document
    pub fn from_value(root: &Value) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let table = match root.get("vnic") {
            Some(Value::Table(table)) => table,
            Some(_) => return Err(ConfigError::InvalidTablePath("vnic".to_string())),
            None => {
                log::debug!("no [vnic] table, using defaults");
                return Ok(config);
            }
        };

        for (key, value) in table {
            match key.as_str() {
                "name" => config.name = parse_name(expect_str(key, value)?)?,
                "mac" => config.mac = parse_mac(expect_str(key, value)?)?,
                "tx_ring_size" => config.tx_ring_size = expect_usize(key, value)?,
                "rx_ring_size" => config.rx_ring_size = expect_usize(key, value)?,
                "napi_weight" => config.napi_weight = expect_usize(key, value)?,
                other => log::warn!("ignoring unknown key vnic.{}", other),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_ring_size < MIN_RING_SIZE {
            return Err(ConfigError::invalid_value("tx_ring_size must be at least 2"));
        }
        if self.rx_ring_size < MIN_RING_SIZE {
            return Err(ConfigError::invalid_value("rx_ring_size must be at least 2"));
        }
        if self.napi_weight == 0 {
            return Err(ConfigError::invalid_value("napi_weight must be at least 1"));
        }
        if self.name.is_empty() {
            return Err(ConfigError::invalid_value("name must not be empty"));
        }
        Ok(())
    }
}

fn expect_str<'v>(key: &str, value: &'v Value) -> Result<&'v str, ConfigError> {
    value
        .as_str()
        .ok_or_else(|| ConfigError::InvalidValue(format!("{} must be a string", key)))
}

fn expect_usize(key: &str, value: &Value) -> Result<usize, ConfigError> {
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidValue(format!("{} must be a non-negative integer", key)))
}

fn parse_name(text: &str) -> Result<IfName, ConfigError> {
    let mut name = IfName::new();
    name.push_str(text)
        .map_err(|_| ConfigError::InvalidValue(format!("name too long: {}", text)))?;
    Ok(name)
}

/// Parse six colon-separated hex octets, e.g. `02:00:00:00:00:01`
pub fn parse_mac(text: &str) -> Result<MacAddress, ConfigError> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(':');

    for octet in mac.iter_mut() {
        let part = parts.next().ok_or_else(|| ConfigError::invalid_mac(text))?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConfigError::invalid_mac(text));
        }
        *octet = u8::from_str_radix(part, 16).map_err(|_| ConfigError::invalid_mac(text))?;
    }

    if parts.next().is_some() {
        return Err(ConfigError::invalid_mac(text));
    }
    Ok(mac)
}
