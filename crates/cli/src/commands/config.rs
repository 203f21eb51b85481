use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use smartscoop_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let optional_path = |path: Option<&Path>| {
        path.map(|path| path.display().to_string()).unwrap_or_else(|| "<unset>".to_string())
    };

    vec![
        Field::new("database.url", &config.database.url, &["SMARTSCOOP_DATABASE_URL", "DB_NAME"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections,
            &["SMARTSCOOP_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["SMARTSCOOP_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["SMARTSCOOP_LLM_API_KEY", "GROQ_API_KEY"],
        ),
        Field::new("llm.base_url", &config.llm.base_url, &["SMARTSCOOP_LLM_BASE_URL"]),
        Field::new("llm.model", &config.llm.model, &["SMARTSCOOP_LLM_MODEL"]),
        Field::new("llm.temperature", config.llm.temperature, &["SMARTSCOOP_LLM_TEMPERATURE"]),
        Field::new("llm.max_tokens", config.llm.max_tokens, &["SMARTSCOOP_LLM_MAX_TOKENS"]),
        Field::new("llm.timeout_secs", config.llm.timeout_secs, &["SMARTSCOOP_LLM_TIMEOUT_SECS"]),
        Field::new(
            "llm.max_tool_rounds",
            config.llm.max_tool_rounds,
            &["SMARTSCOOP_LLM_MAX_TOOL_ROUNDS"],
        ),
        Field::new(
            "catalog.provider",
            config.catalog.provider.as_str(),
            &["SMARTSCOOP_CATALOG_PROVIDER"],
        ),
        Field::new(
            "catalog.api_key",
            redact_secret(config.catalog.api_key.as_ref()),
            &["SMARTSCOOP_CATALOG_API_KEY", "AMAZON_API_KEY"],
        ),
        Field::new("catalog.base_url", &config.catalog.base_url, &["SMARTSCOOP_CATALOG_BASE_URL"]),
        Field::new("catalog.country", &config.catalog.country, &["SMARTSCOOP_CATALOG_COUNTRY"]),
        Field::new(
            "catalog.timeout_secs",
            config.catalog.timeout_secs,
            &["SMARTSCOOP_CATALOG_TIMEOUT_SECS"],
        ),
        Field::new(
            "catalog.local_path",
            optional_path(config.catalog.local_path.as_deref()),
            &["SMARTSCOOP_CATALOG_LOCAL_PATH"],
        ),
        Field::new(
            "recommendation.dimensions",
            config.recommendation.dimensions,
            &["SMARTSCOOP_RECOMMENDATION_DIMENSIONS"],
        ),
        Field::new(
            "recommendation.top_k",
            config.recommendation.top_k,
            &["SMARTSCOOP_RECOMMENDATION_TOP_K"],
        ),
        Field::new(
            "recommendation.catalog_path",
            optional_path(config.recommendation.catalog_path.as_deref()),
            &["SMARTSCOOP_RECOMMENDATION_CATALOG_PATH"],
        ),
        Field::new(
            "seasonal.use_default_calendar",
            config.seasonal.use_default_calendar,
            &["SMARTSCOOP_SEASONAL_USE_DEFAULT_CALENDAR"],
        ),
        Field::new("session.ttl_secs", config.session.ttl_secs, &["SMARTSCOOP_SESSION_TTL_SECS"]),
        Field::new(
            "session.max_turns",
            config.session.max_turns,
            &["SMARTSCOOP_SESSION_MAX_TURNS"],
        ),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["SMARTSCOOP_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port, &["SMARTSCOOP_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs,
            &["SMARTSCOOP_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["SMARTSCOOP_LOGGING_LEVEL", "SMARTSCOOP_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["SMARTSCOOP_LOGGING_FORMAT", "SMARTSCOOP_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("smartscoop.toml"), PathBuf::from("config/smartscoop.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognizable key prefix (`gsk_`, `rk-`) and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.find(['_', '-']) {
        Some(index) if index <= 4 => format!("{}***", &trimmed[..=index]),
        _ => "<redacted>".to_string(),
    }
}
