use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use offerdesk_core::config::{AppConfig, LoadOptions};

/// Renders the effective configuration with one line per field and the
/// winning source (env > file > default) in parentheses.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let fields: [(&str, String, Option<&str>); 7] = [
        ("database.url", config.database.url.clone(), Some("OFFERDESK_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("OFFERDESK_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("OFFERDESK_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "access.code_length",
            config.access.code_length.to_string(),
            Some("OFFERDESK_ACCESS_CODE_LENGTH"),
        ),
        (
            "access.expiry_days",
            config.access.expiry_days.to_string(),
            Some("OFFERDESK_ACCESS_EXPIRY_DAYS"),
        ),
        ("logging.level", config.logging.level.clone(), Some("OFFERDESK_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            Some("OFFERDESK_LOGGING_FORMAT"),
        ),
    ];

    for (field, value, env_var) in fields {
        let source =
            field_source(field, env_var, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("  {field} = {value}  ({source})"));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("offerdesk.toml"), PathBuf::from("config/offerdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &str,
    env_var: Option<&str>,
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> String {
    if let Some(var) = env_var {
        if env::var(var).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return format!("env: {var}");
        }
    }

    if let (Some(doc), Some(path)) = (file_doc, file_path) {
        let mut cursor = Some(doc);
        for part in field.split('.') {
            cursor = cursor.and_then(|value| value.get(part));
        }
        if cursor.is_some() {
            return format!("file: {}", path.display());
        }
    }

    "default".to_string()
}
