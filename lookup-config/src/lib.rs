//! Loader for `lookup.yaml` with environment overlays.
//!
//! Sources are merged in order: YAML files and inline snippets first, then
//! `LOOKUP_`-prefixed environment variables (`__` separates nesting levels, so
//! `LOOKUP_EXTRACTOR__DEFAULT_TIMEOUT_MS=45000` overrides
//! `extractor.default_timeout_ms`). String values may reference `${VAR}`
//! placeholders, which are expanded recursively after merging.
use config::{Config, ConfigError, Environment, File};
use lookup_common::ExtractorConfig;
pub use lookup_common::observability::{LogFormat, LoggingSettings};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub struct LookupConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct LookupConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for LookupConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupConfigLoader {
    /// Start with no files and `LOOKUP_` env overrides.
    ///
    /// ```
    /// use lookup_config::LookupConfigLoader;
    ///
    /// let config = LookupConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.extractor.default_max_attempts, 3);
    /// ```
    pub fn new() -> Self {
        Self::with_env_prefix("LOOKUP")
    }

    /// Same as [`LookupConfigLoader::new`] with a custom environment prefix.
    pub fn with_env_prefix(prefix: &str) -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: prefix.to_string(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, for deployments configured purely by environment.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use lookup_config::LookupConfigLoader;
    /// use lookup_common::StealthLevel;
    ///
    /// let cfg = LookupConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// extractor:
    ///   stealth_level: maximum
    ///   default_timeout_ms: 45000
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.extractor.stealth_level, StealthLevel::Maximum);
    /// assert_eq!(cfg.extractor.default_timeout_ms, 45000);
    /// assert_eq!(cfg.extractor.ready_timeout_ms, 10000);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into a validated config.
    pub fn load(self) -> Result<LookupConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: LookupConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        if let Some(dir) = typed.logging.dir.take() {
            let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
            typed.logging.dir = Some(PathBuf::from(expanded));
        }
        typed
            .extractor
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
