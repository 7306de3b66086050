use alloc::string::String;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("line {line}: {msg}")]
    ParseError { line: usize, msg: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("invalid table path: {0}")]
    InvalidTablePath(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("invalid string: {0}")]
    InvalidString(String),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}

impl ConfigError {
    pub fn parse_error(line: usize, msg: &str) -> Self {
        ConfigError::ParseError {
            line,
            msg: String::from(msg),
        }
    }

    pub fn invalid_value(msg: &str) -> Self {
        ConfigError::InvalidValue(String::from(msg))
    }

    pub fn missing_key(key: &str) -> Self {
        ConfigError::MissingKey(String::from(key))
    }

    pub fn invalid_mac(text: &str) -> Self {
        ConfigError::InvalidMac(String::from(text))
    }
}
