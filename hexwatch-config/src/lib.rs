//! Loader for hexwatch configuration with YAML + environment overlays.
//!
//! Every field has a compiled-in default, so a bare deployment only needs the
//! scraper credential in `APIFY_API_TOKEN`. Precedence, lowest first: defaults,
//! the optional YAML file, inline YAML snippets, then `HEXWATCH__`-prefixed
//! environment variables (`HEXWATCH__SCHEDULER__INTERVAL_SECS=600`). String values
//! may reference other variables as `${VAR}`; those are expanded after merging.
use config::{Config, ConfigError, Environment, File};
use hexwatch_common::DEFAULT_TASK_NAME;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Environment variable that carries the scraper credential.
pub const API_TOKEN_ENV: &str = "APIFY_API_TOKEN";
pub const DEFAULT_SCRAPER_BASE_URL: &str = "https://api.apify.com/v2/";
pub const DEFAULT_ACTOR_ID: &str = "apidojo~tweet-scraper";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://hexwatch.db?mode=rwc";
/// Two hours.
pub const DEFAULT_INTERVAL_SECS: u64 = 2 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct HexwatchConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_actor_id")]
    pub actor_id: String,
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: default_base_url(),
            actor_id: default_actor_id(),
            timeout_secs: default_scraper_timeout(),
        }
    }
}

// Never print the credential.
impl fmt::Debug for ScraperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("actor_id", &self.actor_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_task_name")]
    pub task_name: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub overlap: OverlapSetting,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_name: default_task_name(),
            interval_secs: default_interval_secs(),
            overlap: OverlapSetting::default(),
        }
    }
}

/// What to do with a tick that fires while the previous cycle is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapSetting {
    #[default]
    Skip,
    Queue,
    Concurrent,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_emit_stderr")]
    pub emit_stderr: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            format: default_log_format(),
            emit_stderr: default_emit_stderr(),
            filter: default_log_filter(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SCRAPER_BASE_URL.into()
}
fn default_actor_id() -> String {
    DEFAULT_ACTOR_ID.into()
}
fn default_scraper_timeout() -> u64 {
    300
}
fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.into()
}
fn default_max_connections() -> u32 {
    4
}
fn default_task_name() -> String {
    DEFAULT_TASK_NAME.into()
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_log_format() -> String {
    "text".into()
}
fn default_emit_stderr() -> bool {
    true
}
fn default_log_filter() -> String {
    "info".into()
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

fn validate(cfg: &HexwatchConfig) -> Result<(), ConfigError> {
    let token = cfg.scraper.api_token.trim();
    if token.is_empty() || token.contains("${") {
        return Err(ConfigError::Message(format!(
            "scraper.api_token is not set; export {API_TOKEN_ENV} or set HEXWATCH__SCRAPER__API_TOKEN"
        )));
    }
    if cfg.scheduler.interval_secs == 0 {
        return Err(ConfigError::Message(
            "scheduler.interval_secs must be greater than zero".into(),
        ));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Message(
            "database.max_connections must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Builder hides the `config` crate wiring (defaults + YAML + env overrides).
pub struct HexwatchConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HexwatchConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HexwatchConfigLoader {
    /// Empty loader. `HEXWATCH__` env overrides are layered last, in [`Self::load`].
    ///
    /// ```
    /// use hexwatch_config::{HexwatchConfigLoader, DEFAULT_INTERVAL_SECS};
    ///
    /// let cfg = HexwatchConfigLoader::new()
    ///     .with_yaml_str("scraper:\n  api_token: 'inline-token'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.scraper.api_token, "inline-token");
    /// assert_eq!(cfg.scheduler.interval_secs, DEFAULT_INTERVAL_SECS);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    /// A missing file is not an error, so env-only deployments work.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use hexwatch_config::{HexwatchConfigLoader, OverlapSetting};
    ///
    /// let cfg = HexwatchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// scraper:
    ///   api_token: "example"
    /// scheduler:
    ///   interval_secs: 60
    ///   overlap: queue
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.scheduler.interval_secs, 60);
    /// assert_eq!(cfg.scheduler.overlap, OverlapSetting::Queue);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `${VAR}` placeholders are expanded before the typed structs are built, and the
    /// result is validated: the API token must resolve to a non-empty value.
    ///
    /// ```
    /// use hexwatch_config::HexwatchConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_SCRAPER_TOKEN", "injected-from-env"); }
    ///
    /// let config = HexwatchConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// scraper:
    ///   api_token: "${DOCTEST_SCRAPER_TOKEN}"
    /// database:
    ///   url: "sqlite::memory:"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.scraper.api_token, "injected-from-env");
    /// assert_eq!(config.database.url, "sqlite::memory:");
    ///
    /// unsafe { std::env::remove_var("DOCTEST_SCRAPER_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<HexwatchConfig, ConfigError> {
        // Added last so the environment wins over every file source.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("HEXWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("scraper.api_token", format!("${{{API_TOKEN_ENV}}}"))?
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: HexwatchConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        validate(&typed)?;

        Ok(typed)
    }
}
