use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

/// Knobs of the synchronous quote engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Allowed disagreement between stated and derived wall area, as a
    /// percentage of the larger value.
    pub measurement_tolerance_pct: Decimal,
    pub default_coats: u32,
    pub default_coverage_sqft_per_gallon: Decimal,
    /// Price ready projects before quote review, marked as preview.
    pub preview_pricing: bool,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Lets model output carry prices, labor rates, markup and tax.
    pub model_can_set_rates: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
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
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub measurement_tolerance_pct: Option<Decimal>,
    pub preview_pricing: Option<bool>,
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

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            measurement_tolerance_pct: Decimal::TEN,
            default_coats: 2,
            default_coverage_sqft_per_gallon: Decimal::new(350, 0),
            preview_pricing: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                model_can_set_rates: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        AppConfig::default().llm
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
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

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
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
                options.config_path.unwrap_or_else(|| PathBuf::from("paintquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Flattened `section.key` view of the effective configuration with
    /// secrets redacted.
    pub fn redacted_summary(&self) -> Vec<(String, String)> {
        let api_key = match &self.llm.api_key {
            Some(key) if !key.expose_secret().is_empty() => "<redacted>".to_string(),
            _ => "<unset>".to_string(),
        };
        vec![
            (
                "engine.measurement_tolerance_pct".to_string(),
                self.engine.measurement_tolerance_pct.to_string(),
            ),
            ("engine.default_coats".to_string(), self.engine.default_coats.to_string()),
            (
                "engine.default_coverage_sqft_per_gallon".to_string(),
                self.engine.default_coverage_sqft_per_gallon.to_string(),
            ),
            ("engine.preview_pricing".to_string(), self.engine.preview_pricing.to_string()),
            ("llm.enabled".to_string(), self.llm.enabled.to_string()),
            ("llm.provider".to_string(), self.llm.provider.as_str().to_string()),
            ("llm.api_key".to_string(), api_key),
            ("llm.base_url".to_string(), self.llm.base_url.clone().unwrap_or_default()),
            ("llm.model".to_string(), self.llm.model.clone()),
            ("llm.timeout_secs".to_string(), self.llm.timeout_secs.to_string()),
            ("llm.max_retries".to_string(), self.llm.max_retries.to_string()),
            ("llm.model_can_set_rates".to_string(), self.llm.model_can_set_rates.to_string()),
            ("logging.level".to_string(), self.logging.level.clone()),
            ("logging.format".to_string(), self.logging.format.as_str().to_string()),
        ]
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(tolerance) = engine.measurement_tolerance_pct {
                self.engine.measurement_tolerance_pct = tolerance;
            }
            if let Some(coats) = engine.default_coats {
                self.engine.default_coats = coats;
            }
            if let Some(coverage) = engine.default_coverage_sqft_per_gallon {
                self.engine.default_coverage_sqft_per_gallon = coverage;
            }
            if let Some(preview_pricing) = engine.preview_pricing {
                self.engine.preview_pricing = preview_pricing;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(model_can_set_rates) = llm.model_can_set_rates {
                self.llm.model_can_set_rates = model_can_set_rates;
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
        if let Some(value) = read_env("PAINTQUOTE_ENGINE_MEASUREMENT_TOLERANCE_PCT") {
            self.engine.measurement_tolerance_pct =
                parse_decimal("PAINTQUOTE_ENGINE_MEASUREMENT_TOLERANCE_PCT", &value)?;
        }
        if let Some(value) = read_env("PAINTQUOTE_ENGINE_DEFAULT_COATS") {
            self.engine.default_coats = parse_u32("PAINTQUOTE_ENGINE_DEFAULT_COATS", &value)?;
        }
        if let Some(value) = read_env("PAINTQUOTE_ENGINE_DEFAULT_COVERAGE_SQFT_PER_GALLON") {
            self.engine.default_coverage_sqft_per_gallon =
                parse_decimal("PAINTQUOTE_ENGINE_DEFAULT_COVERAGE_SQFT_PER_GALLON", &value)?;
        }
        if let Some(value) = read_env("PAINTQUOTE_ENGINE_PREVIEW_PRICING") {
            self.engine.preview_pricing = parse_bool("PAINTQUOTE_ENGINE_PREVIEW_PRICING", &value)?;
        }

        if let Some(value) = read_env("PAINTQUOTE_LLM_ENABLED") {
            self.llm.enabled = parse_bool("PAINTQUOTE_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PAINTQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("PAINTQUOTE_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("PAINTQUOTE_LLM_MODEL_CAN_SET_RATES") {
            self.llm.model_can_set_rates =
                parse_bool("PAINTQUOTE_LLM_MODEL_CAN_SET_RATES", &value)?;
        }

        let log_level =
            read_env("PAINTQUOTE_LOGGING_LEVEL").or_else(|| read_env("PAINTQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAINTQUOTE_LOGGING_FORMAT").or_else(|| read_env("PAINTQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(tolerance) = overrides.measurement_tolerance_pct {
            self.engine.measurement_tolerance_pct = tolerance;
        }
        if let Some(preview_pricing) = overrides.preview_pricing {
            self.engine.preview_pricing = preview_pricing;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine(&self.engine)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("paintquote.toml"), PathBuf::from("config/paintquote.toml")]
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

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.measurement_tolerance_pct < Decimal::ZERO
        || engine.measurement_tolerance_pct > Decimal::ONE_HUNDRED
    {
        return Err(ConfigError::Validation(
            "engine.measurement_tolerance_pct must be in range 0..=100".to_string(),
        ));
    }

    if engine.default_coats == 0 || engine.default_coats > 10 {
        return Err(ConfigError::Validation(
            "engine.default_coats must be in range 1..=10".to_string(),
        ));
    }

    if engine.default_coverage_sqft_per_gallon <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "engine.default_coverage_sqft_per_gallon must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.enabled {
        return Ok(());
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    llm: Option<LlmPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    measurement_tolerance_pct: Option<Decimal>,
    default_coats: Option<u32>,
    default_coverage_sqft_per_gallon: Option<Decimal>,
    preview_pricing: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    model_can_set_rates: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
