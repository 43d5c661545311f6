use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Result cache tuning. TTLs accept plain seconds or strings like "60s",
/// "5m", "1h".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Hard cap on local-store entries; overflow evicts the oldest tenth.
    pub max_entries: usize,
    /// Single-value charts (kpi/gauge/big_number).
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub ttl_single_value_secs: u64,
    /// Tabular previews.
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub ttl_table_secs: u64,
    /// Everything else.
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub ttl_default_secs: u64,
}

/// Language-model provider settings (OpenAI-compatible API). The key is
/// read from the environment variable named by `api_key_env`, never from
/// the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_base: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Ceiling on rows returned per chart query.
    pub max_rows: u64,
    /// Delegated database call timeout.
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "prism")]
#[command(version, about = "Prism - Privacy-preserving semantic query engine")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Logging level (overrides config file, e.g., "info,prism=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Enable/disable the result cache (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub cache_enabled: Option<bool>,

    /// Default cache TTL (overrides config file, e.g., "60s", "5m")
    #[arg(long, value_name = "DURATION")]
    pub cache_ttl: Option<String>,

    /// LLM API base URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub llm_api_base: Option<String>,

    /// LLM model name (overrides config file)
    #[arg(long, value_name = "MODEL")]
    pub llm_model: Option<String>,

    /// Maximum rows per chart query (overrides config file)
    #[arg(long, value_name = "ROWS")]
    pub query_max_rows: Option<u64>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with PRISM_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PRISM_SERVER_HOST: Server host (default: 0.0.0.0)
    /// - PRISM_SERVER_PORT: Server port (default: 8080)
    /// - PRISM_LOG_LEVEL: Logging level (e.g., "info,prism=debug")
    /// - PRISM_CACHE_ENABLED: Enable/disable the result cache (true/false)
    /// - PRISM_LLM_API_BASE: LLM API base URL
    /// - PRISM_LLM_MODEL: LLM model name
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PRISM_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("PRISM_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(level) = std::env::var("PRISM_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(enabled) = std::env::var("PRISM_CACHE_ENABLED")
            && let Ok(val) = enabled.parse()
        {
            self.cache.enabled = val;
            tracing::info!("Override cache.enabled from env: {}", self.cache.enabled);
        }

        if let Ok(api_base) = std::env::var("PRISM_LLM_API_BASE") {
            self.llm.api_base = api_base;
            tracing::info!("Override llm.api_base from env: {}", self.llm.api_base);
        }

        if let Ok(model) = std::env::var("PRISM_LLM_MODEL") {
            self.llm.model = model;
            tracing::info!("Override llm.model from env: {}", self.llm.model);
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(enabled) = args.cache_enabled {
            self.cache.enabled = enabled;
            tracing::info!("Override cache.enabled from CLI: {}", self.cache.enabled);
        }

        if let Some(ttl) = &args.cache_ttl {
            match parse_duration_to_secs(ttl) {
                Ok(val) => {
                    self.cache.ttl_default_secs = val;
                    tracing::info!(
                        "Override cache.ttl_default_secs from CLI: {}",
                        self.cache.ttl_default_secs
                    );
                },
                Err(e) => tracing::warn!(
                    "Invalid --cache-ttl '{}': {} (keep {})",
                    ttl,
                    e,
                    self.cache.ttl_default_secs
                ),
            }
        }

        if let Some(api_base) = &args.llm_api_base {
            self.llm.api_base = api_base.clone();
            tracing::info!("Override llm.api_base from CLI: {}", self.llm.api_base);
        }

        if let Some(model) = &args.llm_model {
            self.llm.model = model.clone();
            tracing::info!("Override llm.model from CLI: {}", self.llm.model);
        }

        if let Some(max_rows) = args.query_max_rows {
            self.query.max_rows = max_rows;
            tracing::info!("Override query.max_rows from CLI: {}", self.query.max_rows);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be > 0");
        }
        if self.cache.ttl_single_value_secs == 0
            || self.cache.ttl_table_secs == 0
            || self.cache.ttl_default_secs == 0
        {
            anyhow::bail!("cache TTLs must be > 0");
        }
        if self.query.max_rows == 0 {
            anyhow::bail!("query.max_rows must be > 0");
        }
        if self.llm.enabled && self.llm.api_base.is_empty() {
            anyhow::bail!("llm.api_base must be set when llm.enabled is true");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,prism=debug".to_string(), file: Some("logs/prism.log".to_string()) }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            ttl_single_value_secs: 60,
            ttl_table_secs: 180,
            ttl_default_secs: 600,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "PRISM_LLM_API_KEY".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            timeout_secs: 30,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_rows: 1000, timeout_secs: 30 }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    // Accept plain numbers (treated as seconds)
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

// Custom serde deserializer to support numeric or human-friendly string values
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}
