//! Watch service configuration
//!
//! Example `dirwatch.toml`:
//! ```toml
//! latency_ms = 250
//! recursive = true
//! ignore = ["*.swp", "target/"]
//! ```

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Parameters shared by every watched root of a service
///
/// `latency_ms` is any non-negative window; 0 flushes as soon as the native
/// layer reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    /// Coalescing window, in milliseconds on disk (default: 100)
    #[serde(rename = "latency_ms", with = "millis", default = "default_latency")]
    latency: Duration,

    /// Include subdirectories of each root (default: false)
    #[serde(default)]
    recursive: bool,

    /// Gitignore-style patterns, matched relative to each root
    #[serde(default)]
    ignore: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            latency: default_latency(),
            recursive: false,
            ignore: vec![],
        }
    }
}

fn default_latency() -> Duration {
    Duration::from_millis(100)
}

/// `Duration` as whole milliseconds, rounding partial milliseconds up
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(latency: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let ms = latency.as_nanos().div_ceil(1_000_000);
        s.serialize_u64(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

impl WatcherConfig {
    /// Create a configuration with the given window and recursion flag
    ///
    /// The window is kept exactly as given.
    pub fn new(latency: Duration, recursive: bool) -> Self {
        Self {
            latency,
            recursive,
            ignore: vec![],
        }
    }

    /// Replace the ignore patterns
    pub fn with_ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| WatchError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| WatchError::ConfigRead {
            path: path.to_path_buf(),
            source: Arc::new(e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Check ignore patterns
    pub fn validate(&self) -> Result<()> {
        if let Some(pattern) = self.ignore.iter().find(|p| p.trim().is_empty()) {
            return Err(WatchError::InvalidConfiguration(format!(
                "empty ignore pattern {:?}",
                pattern
            )));
        }

        Ok(())
    }

    /// Coalescing window
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Whether subdirectories are watched
    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Ignore patterns
    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.latency(), Duration::from_millis(100));
        assert!(!config.recursive());
        assert!(config.ignore().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let config = WatcherConfig::from_toml_str("recursive = true\n").unwrap();
        assert!(config.recursive());
        assert_eq!(config.latency(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_full_toml() {
        let config = WatcherConfig::from_toml_str(
            "latency_ms = 0\nrecursive = false\nignore = [\"*.swp\", \"build/\"]\n",
        )
        .unwrap();
        assert_eq!(config.latency(), Duration::ZERO);
        assert_eq!(config.ignore(), ["*.swp".to_string(), "build/".to_string()]);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            WatcherConfig::from_toml_str("latency = 5\n"),
            Err(WatchError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_long_latency_is_valid() {
        let config = WatcherConfig::from_toml_str("latency_ms = 120000\n").unwrap();
        assert_eq!(config.latency(), Duration::from_secs(120));

        let config = WatcherConfig::new(Duration::from_secs(3_600), false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_blank_ignore_pattern() {
        let config = WatcherConfig::default().with_ignore(["  "]);
        assert!(matches!(
            config.validate(),
            Err(WatchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_new_keeps_sub_millisecond_latency() {
        let config = WatcherConfig::new(Duration::from_micros(900), true);
        assert_eq!(config.latency(), Duration::from_micros(900));
        assert!(config.recursive());

        // Partial milliseconds round up on disk so the window stays positive
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("latency_ms = 1"), "{}", text);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dirwatch.toml");
        fs::write(&path, "latency_ms = 250\n").unwrap();

        let config = WatcherConfig::load(&path).unwrap();
        assert_eq!(config.latency(), Duration::from_millis(250));

        let missing = WatcherConfig::load(&temp_dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(WatchError::ConfigRead { .. })));
    }
}
