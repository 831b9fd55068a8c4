use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tandem_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// Renders the effective config with one line per field, each annotated
/// with the layer that supplied it. Secrets are never printed.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let admin_token = if config.server.admin_token.is_some() { "<redacted>" } else { "<unset>" };
    let rows: Vec<(&str, String, &[&str])> = vec![
        ("database.url", config.database.url.clone(), &["TANDEM_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["TANDEM_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["TANDEM_DATABASE_TIMEOUT_SECS"],
        ),
        ("server.bind_address", config.server.bind_address.clone(), &["TANDEM_SERVER_BIND_ADDRESS"]),
        ("server.port", config.server.port.to_string(), &["TANDEM_SERVER_PORT"]),
        ("server.admin_token", admin_token.to_string(), &["TANDEM_SERVER_ADMIN_TOKEN"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["TANDEM_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "recommender.default_max_results",
            config.recommender.default_max_results.to_string(),
            &["TANDEM_RECOMMENDER_DEFAULT_MAX_RESULTS"],
        ),
        (
            "recommender.max_results_cap",
            config.recommender.max_results_cap.to_string(),
            &["TANDEM_RECOMMENDER_MAX_RESULTS_CAP"],
        ),
        ("logging.level", config.logging.level.clone(), &["TANDEM_LOGGING_LEVEL", "TANDEM_LOG_LEVEL"]),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TANDEM_LOGGING_FORMAT", "TANDEM_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in rows {
        let source = field_source(
            key_path,
            env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {key_path} = {value} (source: {source})"));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["tandem.toml", "config/tandem.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

/// Source attribution mirrors load-time precedence. Any of `env_keys`
/// being set wins over a value in the config file, which wins over the
/// built-in default.
fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
