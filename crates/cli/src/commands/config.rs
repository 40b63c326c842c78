use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use paintquote_core::config::{AppConfig, LoadOptions};
use toml::{Table, Value};

use crate::commands::{CommandResult, ErrorClass};

/// Environment aliases accepted next to the canonical `PAINTQUOTE_<SECTION>_<KEY>` names.
const ENV_ALIASES: &[(&str, &str)] =
    &[("logging.level", "PAINTQUOTE_LOG_LEVEL"), ("logging.format", "PAINTQUOTE_LOG_FORMAT")];

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options =
        LoadOptions { config_path: config_path.map(Path::to_path_buf), ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                ErrorClass::ConfigValidation,
                format!("config validation failed: {error}"),
            );
        }
    };

    let config_file_path = config_path.map(Path::to_path_buf).or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value) in config.redacted_summary() {
        let source = field_source(&key, config_file_doc.as_ref(), config_file_path.as_deref());
        let value = if value.is_empty() { "<unset>".to_string() } else { value };
        lines.push(render_line(&key, &value, source));
    }

    CommandResult::payload(lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    ["paintquote.toml", "config/paintquote.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    toml::from_str::<Table>(&raw).ok().map(Value::Table)
}

fn env_key(key_path: &str) -> String {
    format!("PAINTQUOTE_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let aliases = ENV_ALIASES
        .iter()
        .filter(|(key, _)| *key == key_path)
        .map(|(_, alias)| alias.to_string());
    for name in std::iter::once(env_key(key_path)).chain(aliases) {
        if env::var_os(&name).is_some() {
            return format!("env ({name})");
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
