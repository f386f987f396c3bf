//! Output sink configuration: name, driver, free-form driver options, and
//! the write-size hint used to compute `max_chunk`.
//!
//! The `options` grammar mirrors MPD's `ao` plugin: semicolon-separated
//! `key=value` pairs, whitespace around keys/values stripped, an empty
//! key or a pair with no `=` is rejected.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("empty option key in segment {0:?}")]
    EmptyKey(String),
    #[error("missing '=' in option segment {0:?}")]
    MissingEquals(String),
    #[error("write_size must be nonzero")]
    ZeroWriteSize,
}

/// A configured output sink, as it would appear in an audio_output
/// config block: a name, the driver to instantiate, driver-specific
/// options, a write-size hint, and (pipe driver only) a shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub name: String,
    pub driver: String,
    pub options: BTreeMap<String, String>,
    pub write_size: usize,
    pub command: Option<String>,
}

impl OutputConfig {
    /// # Errors
    ///
    /// * If `options` or `write_size` fail to parse per
    ///   [`parse_options`] / the nonzero-`write_size` rule.
    pub fn new(
        name: impl Into<String>,
        driver: impl Into<String>,
        options: &str,
        write_size: usize,
        command: Option<String>,
    ) -> Result<Self, ConfigError> {
        if write_size == 0 {
            return Err(ConfigError::ZeroWriteSize);
        }
        Ok(Self {
            name: name.into(),
            driver: driver.into(),
            options: parse_options(options)?,
            write_size,
            command,
        })
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            driver: String::new(),
            options: BTreeMap::new(),
            write_size: 1024,
            command: None,
        }
    }
}

/// Parses a semicolon-separated `key=value` option string, the same
/// grammar MPD's `ao` output plugin accepts for its `options` setting.
///
/// # Errors
///
/// * [`ConfigError::MissingEquals`] if a non-blank segment has no `=`.
/// * [`ConfigError::EmptyKey`] if the stripped key is empty.
pub fn parse_options(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut options = BTreeMap::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| ConfigError::MissingEquals(segment.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::EmptyKey(segment.to_string()));
        }
        options.insert(key.to_string(), value.trim().to_string());
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_semicolon_separated_pairs() {
        let options = parse_options(" dev = default ; buffer_time=200000 ").unwrap();
        assert_eq!(options.get("dev").map(String::as_str), Some("default"));
        assert_eq!(
            options.get("buffer_time").map(String::as_str),
            Some("200000")
        );
    }

    #[test]
    fn empty_string_yields_no_options() {
        assert!(parse_options("").unwrap().is_empty());
        assert!(parse_options("  ").unwrap().is_empty());
    }

    #[test]
    fn rejects_segment_without_equals() {
        assert_eq!(
            parse_options("dev").unwrap_err(),
            ConfigError::MissingEquals("dev".to_string())
        );
    }

    #[test]
    fn rejects_empty_key() {
        assert_eq!(
            parse_options(" =default").unwrap_err(),
            ConfigError::EmptyKey("=default".to_string())
        );
    }

    #[test]
    fn zero_write_size_is_rejected() {
        assert_eq!(
            OutputConfig::new("test", "pipe", "", 0, None).unwrap_err(),
            ConfigError::ZeroWriteSize
        );
    }
}
