extern crate alloc;

use crate::error::ConfigError;
use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec::Vec,
};

/// TOML value representation
///
/// Only the subset needed for device configuration: strings, integers,
/// booleans and (nested) tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Table(BTreeMap<String, Value>),
}

impl Value {
    /// Look up a direct child of a table
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Table(table) => table.get(key),
            _ => None,
        }
    }

    /// Look up a dotted path such as `vnic.rx_ring_size`
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |value, key| value.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Minimal line-oriented TOML parser (no_std compatible)
///
/// Supports `[table]` / `[a.b]` headers, `key = value` pairs, `#` comments,
/// basic and literal strings, decimal/hex integers with `_` separators and
/// booleans. Arrays, inline tables, floats and dotted keys are rejected.
pub struct TomlParser;

impl TomlParser {
    /// Parse a TOML document into a root table
    pub fn parse(data: &str) -> Result<Value, ConfigError> {
        let mut root = BTreeMap::new();
        let mut current: Vec<String> = Vec::new();

        for (idx, raw) in data.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let header = header
                    .strip_suffix(']')
                    .ok_or_else(|| ConfigError::parse_error(line_no, "unterminated table header"))?;
                current = parse_table_path(header, line_no)?;
                table_at(&mut root, &current)?;
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ConfigError::parse_error(line_no, "expected `key = value`"))?;
            let key = parse_key(key.trim(), line_no)?;
            let value = parse_value(value.trim(), line_no)?;

            let table = table_at(&mut root, &current)?;
            if table.contains_key(&key) {
                return Err(ConfigError::DuplicateKey(key));
            }
            table.insert(key, value);
        }

        Ok(Value::Table(root))
    }
}

/// Cut a trailing `#` comment, ignoring `#` inside quoted strings
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (pos, ch) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if ch == '\\' => escaped = true,
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '#' => return &line[..pos],
            None => {}
        }
    }

    line
}

fn table_at<'t>(
    root: &'t mut BTreeMap<String, Value>,
    path: &[String],
) -> Result<&'t mut BTreeMap<String, Value>, ConfigError> {
    let mut current = root;
    for key in path {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| Value::Table(BTreeMap::new()));
        current = match entry {
            Value::Table(table) => table,
            _ => return Err(ConfigError::InvalidTablePath(path.join("."))),
        };
    }
    Ok(current)
}

fn parse_table_path(header: &str, line: usize) -> Result<Vec<String>, ConfigError> {
    let mut path = Vec::new();
    for part in header.split('.') {
        path.push(parse_key(part.trim(), line)?);
    }
    Ok(path)
}

fn is_bare_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn parse_key(text: &str, line: usize) -> Result<String, ConfigError> {
    if text.starts_with('"') || text.starts_with('\'') {
        return parse_string(text, line);
    }
    if text.is_empty() {
        return Err(ConfigError::parse_error(line, "empty key"));
    }
    if !text.chars().all(is_bare_key_char) {
        return Err(ConfigError::parse_error(line, "invalid character in key"));
    }
    Ok(text.to_string())
}

fn parse_value(text: &str, line: usize) -> Result<Value, ConfigError> {
    match text {
        "" => Err(ConfigError::parse_error(line, "missing value")),
        "true" => Ok(Value::Boolean(true)),
        "false" => Ok(Value::Boolean(false)),
        _ if text.starts_with('"') || text.starts_with('\'') => {
            parse_string(text, line).map(Value::String)
        }
        _ if text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') => {
            parse_integer(text).map(Value::Integer)
        }
        _ => Err(ConfigError::parse_error(line, "unsupported value")),
    }
}

fn parse_string(text: &str, line: usize) -> Result<String, ConfigError> {
    let mut chars = text.chars();
    let quote = chars
        .next()
        .ok_or_else(|| ConfigError::parse_error(line, "expected string"))?;

    let mut result = String::new();
    let mut escaped = false;
    let mut closed = false;

    for ch in chars.by_ref() {
        if escaped {
            match ch {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                _ => return Err(ConfigError::InvalidString(text.to_string())),
            }
            escaped = false;
        } else if ch == '\\' && quote == '"' {
            escaped = true;
        } else if ch == quote {
            closed = true;
            break;
        } else {
            result.push(ch);
        }
    }

    if !closed {
        return Err(ConfigError::parse_error(line, "unterminated string"));
    }
    if !chars.as_str().trim().is_empty() {
        return Err(ConfigError::parse_error(line, "trailing characters after string"));
    }

    Ok(result)
}

fn parse_integer(text: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidNumber(text.to_string());

    if text.starts_with('_') || text.ends_with('_') || text.contains("__") {
        return Err(invalid());
    }
    let digits: String = text.chars().filter(|&c| c != '_').collect();

    let (negative, unsigned) = match digits.as_bytes().first() {
        Some(b'-') => (true, &digits[1..]),
        Some(b'+') => (false, &digits[1..]),
        _ => (false, digits.as_str()),
    };

    let magnitude = if let Some(hex) = unsigned.strip_prefix("0x") {
        if negative {
            return Err(invalid());
        }
        i64::from_str_radix(hex, 16).map_err(|_| invalid())?
    } else {
        unsigned.parse::<i64>().map_err(|_| invalid())?
    };

    Ok(if negative { -magnitude } else { magnitude })
}
