use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DB_NAME: &str = "shopping_assistant.db";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub recommendation: RecommendationConfig,
    pub seasonal: SeasonalConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub provider: CatalogProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub country: String,
    pub timeout_secs: u64,
    pub local_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct RecommendationConfig {
    pub dimensions: usize,
    pub top_k: usize,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct SeasonalConfig {
    pub use_default_calendar: bool,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub max_turns: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogProvider {
    Amazon,
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub catalog_provider: Option<CatalogProvider>,
    pub catalog_api_key: Option<String>,
    pub catalog_base_url: Option<String>,
    pub catalog_local_path: Option<PathBuf>,
    pub recommendation_catalog_path: Option<PathBuf>,
    pub seasonal_use_default_calendar: Option<bool>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: database_url_for(DEFAULT_DB_NAME),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                temperature: 0.6,
                max_tokens: 1024,
                timeout_secs: 30,
                max_tool_rounds: 5,
            },
            catalog: CatalogConfig {
                provider: CatalogProvider::Amazon,
                api_key: None,
                base_url: "https://real-time-amazon-data.p.rapidapi.com".to_string(),
                country: "US".to_string(),
                timeout_secs: 15,
                local_path: None,
            },
            recommendation: RecommendationConfig {
                dimensions: 384,
                top_k: 10,
                catalog_path: None,
            },
            seasonal: SeasonalConfig { use_default_calendar: true },
            session: SessionConfig { ttl_secs: 1800, max_turns: 20 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// `DB_NAME` holds a file location; sqlite URLs pass through untouched.
pub fn database_url_for(db_name: &str) -> String {
    let trimmed = db_name.trim();
    if trimmed.starts_with("sqlite:") || trimmed == ":memory:" {
        return trimmed.to_string();
    }
    format!("sqlite://{trimmed}?mode=rwc")
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for CatalogProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Self::Amazon),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::Validation(format!(
                "unsupported catalog provider `{other}` (expected amazon|local)"
            ))),
        }
    }
}

impl CatalogProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Local => "local",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("smartscoop.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_rounds) = llm.max_tool_rounds {
                self.llm.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(provider) = catalog.provider {
                self.catalog.provider = provider;
            }
            if let Some(api_key) = catalog.api_key {
                self.catalog.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = base_url;
            }
            if let Some(country) = catalog.country {
                self.catalog.country = country;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
            if let Some(local_path) = catalog.local_path {
                self.catalog.local_path = Some(local_path);
            }
        }

        if let Some(recommendation) = patch.recommendation {
            if let Some(dimensions) = recommendation.dimensions {
                self.recommendation.dimensions = dimensions;
            }
            if let Some(top_k) = recommendation.top_k {
                self.recommendation.top_k = top_k;
            }
            if let Some(catalog_path) = recommendation.catalog_path {
                self.recommendation.catalog_path = Some(catalog_path);
            }
        }

        if let Some(seasonal) = patch.seasonal {
            if let Some(use_default_calendar) = seasonal.use_default_calendar {
                self.seasonal.use_default_calendar = use_default_calendar;
            }
        }

        if let Some(session) = patch.session {
            if let Some(ttl_secs) = session.ttl_secs {
                self.session.ttl_secs = ttl_secs;
            }
            if let Some(max_turns) = session.max_turns {
                self.session.max_turns = max_turns;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Unprefixed names first so the prefixed forms win.
        if let Some(value) = read_env("DB_NAME") {
            self.database.url = database_url_for(&value);
        }
        if let Some(value) = read_env("GROQ_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AMAZON_API_KEY") {
            self.catalog.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("SMARTSCOOP_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SMARTSCOOP_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("SMARTSCOOP_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("SMARTSCOOP_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SMARTSCOOP_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SMARTSCOOP_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SMARTSCOOP_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SMARTSCOOP_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("SMARTSCOOP_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("SMARTSCOOP_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("SMARTSCOOP_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_env("SMARTSCOOP_LLM_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("SMARTSCOOP_CATALOG_PROVIDER") {
            self.catalog.provider = value.parse()?;
        }
        if let Some(value) = read_env("SMARTSCOOP_CATALOG_API_KEY") {
            self.catalog.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SMARTSCOOP_CATALOG_BASE_URL") {
            self.catalog.base_url = value;
        }
        if let Some(value) = read_env("SMARTSCOOP_CATALOG_COUNTRY") {
            self.catalog.country = value;
        }
        if let Some(value) = read_env("SMARTSCOOP_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_env("SMARTSCOOP_CATALOG_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_CATALOG_LOCAL_PATH") {
            self.catalog.local_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("SMARTSCOOP_RECOMMENDATION_DIMENSIONS") {
            self.recommendation.dimensions =
                parse_env("SMARTSCOOP_RECOMMENDATION_DIMENSIONS", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_RECOMMENDATION_TOP_K") {
            self.recommendation.top_k = parse_env("SMARTSCOOP_RECOMMENDATION_TOP_K", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_RECOMMENDATION_CATALOG_PATH") {
            self.recommendation.catalog_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("SMARTSCOOP_SEASONAL_USE_DEFAULT_CALENDAR") {
            self.seasonal.use_default_calendar =
                parse_env("SMARTSCOOP_SEASONAL_USE_DEFAULT_CALENDAR", &value)?;
        }

        if let Some(value) = read_env("SMARTSCOOP_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_env("SMARTSCOOP_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_SESSION_MAX_TURNS") {
            self.session.max_turns = parse_env("SMARTSCOOP_SESSION_MAX_TURNS", &value)?;
        }

        if let Some(value) = read_env("SMARTSCOOP_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SMARTSCOOP_SERVER_PORT") {
            self.server.port = parse_env("SMARTSCOOP_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SMARTSCOOP_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("SMARTSCOOP_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SMARTSCOOP_LOGGING_LEVEL").or_else(|| read_env("SMARTSCOOP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SMARTSCOOP_LOGGING_FORMAT").or_else(|| read_env("SMARTSCOOP_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(provider) = overrides.catalog_provider {
            self.catalog.provider = provider;
        }
        if let Some(api_key) = overrides.catalog_api_key {
            self.catalog.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.catalog_base_url {
            self.catalog.base_url = base_url;
        }
        if let Some(local_path) = overrides.catalog_local_path {
            self.catalog.local_path = Some(local_path);
        }
        if let Some(catalog_path) = overrides.recommendation_catalog_path {
            self.recommendation.catalog_path = Some(catalog_path);
        }
        if let Some(use_default_calendar) = overrides.seasonal_use_default_calendar {
            self.seasonal.use_default_calendar = use_default_calendar;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_catalog(&self.catalog)?;
        validate_recommendation(&self.recommendation)?;
        validate_session(&self.session)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("smartscoop.toml"), PathBuf::from("config/smartscoop.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`); \
            set DB_NAME to a file path or SMARTSCOOP_DATABASE_URL to a URL"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    validate_timeout("database.timeout_secs", database.timeout_secs)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;

    if is_blank(llm.api_key.as_ref()) {
        return Err(ConfigError::Validation(
            "llm.api_key is required. Set GROQ_API_KEY (get one at https://console.groq.com/keys)"
                .to_string(),
        ));
    }

    validate_http_url("llm.base_url", &llm.base_url)?;

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.max_tool_rounds == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tool_rounds must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    validate_timeout("catalog.timeout_secs", catalog.timeout_secs)?;

    match catalog.provider {
        CatalogProvider::Amazon => {
            if is_blank(catalog.api_key.as_ref()) {
                return Err(ConfigError::Validation(
                    "catalog.api_key is required for the amazon provider. Set AMAZON_API_KEY \
                    (RapidAPI key for real-time-amazon-data)"
                        .to_string(),
                ));
            }
            validate_http_url("catalog.base_url", &catalog.base_url)?;
        }
        CatalogProvider::Local => {
            if catalog.local_path.is_none() {
                return Err(ConfigError::Validation(
                    "catalog.local_path is required for the local provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_recommendation(recommendation: &RecommendationConfig) -> Result<(), ConfigError> {
    if recommendation.dimensions == 0 {
        return Err(ConfigError::Validation(
            "recommendation.dimensions must be greater than zero".to_string(),
        ));
    }

    if recommendation.top_k == 0 {
        return Err(ConfigError::Validation(
            "recommendation.top_k must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_secs must be greater than zero".to_string(),
        ));
    }

    if session.max_turns == 0 {
        return Err(ConfigError::Validation(
            "session.max_turns must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_timeout(key: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn is_blank(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    catalog: Option<CatalogPatch>,
    recommendation: Option<RecommendationPatch>,
    seasonal: Option<SeasonalPatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    provider: Option<CatalogProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    country: Option<String>,
    timeout_secs: Option<u64>,
    local_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    dimensions: Option<usize>,
    top_k: Option<usize>,
    catalog_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SeasonalPatch {
    use_default_calendar: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    ttl_secs: Option<u64>,
    max_turns: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        database_url_for, AppConfig, CatalogProvider, ConfigError, ConfigOverrides, LoadOptions,
        LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: &[&str] = &[
        "DB_NAME",
        "GROQ_API_KEY",
        "AMAZON_API_KEY",
        "SMARTSCOOP_DATABASE_URL",
        "SMARTSCOOP_LLM_API_KEY",
        "SMARTSCOOP_CATALOG_API_KEY",
        "SMARTSCOOP_CATALOG_PROVIDER",
        "SMARTSCOOP_LOG_LEVEL",
        "SMARTSCOOP_LOG_FORMAT",
        "SMARTSCOOP_SESSION_TTL_SECS",
        "TEST_GROQ_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env<T>(
        vars: &[(&str, &str)],
        body: impl FnOnce() -> Result<T, String>,
    ) -> Result<T, String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }

        let result = body();

        for var in MANAGED_VARS {
            env::remove_var(var);
        }
        result
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn db_name_maps_to_sqlite_url() {
        assert_eq!(
            database_url_for("shopping_assistant.db"),
            "sqlite://shopping_assistant.db?mode=rwc"
        );
        assert_eq!(database_url_for("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn original_env_names_are_recognized() -> Result<(), String> {
        with_env(
            &[
                ("DB_NAME", "/tmp/assistant.db"),
                ("GROQ_API_KEY", "gsk-1"),
                ("AMAZON_API_KEY", "rk-1"),
            ],
            || {
                let config = AppConfig::load(LoadOptions::default())
                    .map_err(|err| format!("config load failed: {err}"))?;

                ensure(
                    config.database.url == "sqlite:///tmp/assistant.db?mode=rwc",
                    "DB_NAME should become the database url",
                )?;
                ensure(
                    config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gsk-1")
                        == Some(true),
                    "GROQ_API_KEY should be the llm key",
                )?;
                ensure(
                    config.catalog.api_key.as_ref().map(|key| key.expose_secret() == "rk-1")
                        == Some(true),
                    "AMAZON_API_KEY should be the catalog key",
                )
            },
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        with_env(&[("TEST_GROQ_KEY", "gsk-from-env"), ("AMAZON_API_KEY", "rk-test")], || {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("smartscoop.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_GROQ_KEY}"
model = "llama-3.1-8b-instant"

[session]
ttl_secs = 60
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gsk-from-env")
                    == Some(true),
                "llm key should be interpolated from the environment",
            )?;
            ensure(config.llm.model == "llama-3.1-8b-instant", "model should come from file")?;
            ensure(config.session.ttl_secs == 60, "session ttl should come from file")
        })
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        with_env(
            &[
                ("DB_NAME", "legacy.db"),
                ("SMARTSCOOP_DATABASE_URL", "sqlite://from-env.db"),
                ("GROQ_API_KEY", "gsk-test"),
                ("AMAZON_API_KEY", "rk-test"),
                ("SMARTSCOOP_LOG_FORMAT", "json"),
            ],
            || {
                let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
                let path = dir.path().join("smartscoop.toml");
                fs::write(
                    &path,
                    r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
format = "pretty"
"#,
                )
                .map_err(|err| err.to_string())?;

                let config = AppConfig::load(LoadOptions {
                    config_path: Some(path),
                    overrides: ConfigOverrides {
                        log_level: Some("debug".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
                .map_err(|err| format!("config load failed: {err}"))?;

                ensure(
                    config.database.url == "sqlite://from-env.db",
                    "prefixed env url should beat DB_NAME and the file",
                )?;
                ensure(config.logging.level == "debug", "override log level should win")?;
                ensure(
                    matches!(config.logging.format, LogFormat::Json),
                    "env log format should beat the file",
                )
            },
        )
    }

    #[test]
    fn missing_llm_key_fails_with_actionable_error() -> Result<(), String> {
        with_env(&[("AMAZON_API_KEY", "rk-test")], || {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("GROQ_API_KEY")
                ),
                "validation failure should mention GROQ_API_KEY",
            )
        })
    }

    #[test]
    fn local_catalog_needs_no_amazon_key_but_needs_a_path() -> Result<(), String> {
        with_env(&[("GROQ_API_KEY", "gsk-test"), ("SMARTSCOOP_CATALOG_PROVIDER", "local")], || {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected missing local_path failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("catalog.local_path")
                ),
                "validation should mention catalog.local_path",
            )?;

            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    catalog_local_path: Some("demos/products.json".into()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.catalog.provider == CatalogProvider::Local, "provider should be local")
        })
    }

    #[test]
    fn invalid_numeric_env_is_reported() -> Result<(), String> {
        with_env(
            &[
                ("GROQ_API_KEY", "gsk-test"),
                ("AMAZON_API_KEY", "rk-test"),
                ("SMARTSCOOP_SESSION_TTL_SECS", "soon"),
            ],
            || {
                let error = match AppConfig::load(LoadOptions::default()) {
                    Ok(_) => return Err("expected env parse failure".to_string()),
                    Err(error) => error,
                };
                ensure(
                    matches!(
                        error,
                        ConfigError::InvalidEnvOverride { ref key, .. }
                            if key == "SMARTSCOOP_SESSION_TTL_SECS"
                    ),
                    "error should name the offending variable",
                )
            },
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let vars = [("GROQ_API_KEY", "gsk-secret-value"), ("AMAZON_API_KEY", "rk-secret-value")];
        with_env(&vars, || {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gsk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("rk-secret-value"),
                "debug output should not contain catalog key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })
    }

    #[test]
    fn explicit_path_is_required_when_asked() -> Result<(), String> {
        with_env(&[("GROQ_API_KEY", "gsk-test"), ("AMAZON_API_KEY", "rk-test")], || {
            let result = AppConfig::load(LoadOptions {
                config_path: Some("does-not-exist/smartscoop.toml".into()),
                require_file: true,
                ..LoadOptions::default()
            });
            ensure(
                matches!(result, Err(ConfigError::MissingConfigFile(_))),
                "missing required file should be reported",
            )
        })
    }
}
