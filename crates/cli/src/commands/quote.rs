use std::fs;
use std::path::{Path, PathBuf};

use paintquote_agent::AgentRuntime;
use paintquote_core::config::{AppConfig, LoadOptions};
use paintquote_core::{
    input_checksum, ApplicationError, ConversationStage, ConversationTurn, DomainError,
    EngineError, PricingError, QuoteRequest, RateSchedule, StageCursor, StageOverride,
};
use serde::Deserialize;

use crate::commands::{CommandResult, ErrorClass};

const COMMAND: &str = "quote";

#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub transcript: PathBuf,
    pub rates: PathBuf,
    pub stage: Option<PathBuf>,
    pub edit: Option<ConversationStage>,
    pub pretty: bool,
    pub config_path: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Transcript {
    Turns(Vec<ConversationTurn>),
    Request(QuoteRequest),
}

pub fn run(args: &QuoteArgs) -> CommandResult {
    let options = LoadOptions { config_path: args.config_path.clone(), ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::ConfigValidation,
                format!("configuration issue: {error}"),
            );
        }
    };

    let request = match build_request(args) {
        Ok(request) => request,
        Err(message) => return CommandResult::failure(COMMAND, ErrorClass::Input, message),
    };

    let agent = match AgentRuntime::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::ConfigValidation,
                format!("{error:#}"),
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::RuntimeInit,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = match runtime.block_on(agent.process_turns(&request)) {
        Ok(result) => result,
        Err(error) => return engine_failure(&request, &error),
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match rendered {
        Ok(output) => CommandResult::payload(output),
        Err(error) => CommandResult::failure(COMMAND, ErrorClass::Serialization, error.to_string()),
    }
}

fn build_request(args: &QuoteArgs) -> Result<QuoteRequest, String> {
    let transcript = read(&args.transcript)?;
    let mut request = match serde_json::from_str::<Transcript>(&transcript) {
        Ok(Transcript::Turns(turns)) => QuoteRequest::new(turns, RateSchedule::default()),
        Ok(Transcript::Request(request)) => request,
        Err(error) => {
            return Err(format!("{} is not a transcript: {error}", args.transcript.display()));
        }
    };

    request.rate_schedule = load_rates(&args.rates)?;

    if let Some(path) = &args.stage {
        let cursor = serde_json::from_str::<StageCursor>(&read(path)?)
            .map_err(|error| format!("{} is not a stage cursor: {error}", path.display()))?;
        request.stage_cursor = Some(cursor);
    }
    if let Some(target) = args.edit {
        request.stage_override = Some(StageOverride { target, reason: None });
    }
    Ok(request)
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|error| format!("cannot read {}: {error}", path.display()))
}

/// TOML unless the file is named `.json`.
fn load_rates(path: &Path) -> Result<RateSchedule, String> {
    let raw = read(path)?;
    let is_json = path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw)
            .map_err(|error| format!("{} is not a rate schedule: {error}", path.display()))
    } else {
        toml::from_str(&raw)
            .map_err(|error| format!("{} is not a rate schedule: {error}", path.display()))
    }
}

/// Engine failures carry the contractor-facing message and the request
/// checksum so a report can be matched to its input.
fn engine_failure(request: &QuoteRequest, error: &anyhow::Error) -> CommandResult {
    let Some(engine_error) = error.downcast_ref::<EngineError>() else {
        return CommandResult::failure(COMMAND, ErrorClass::Internal, format!("{error:#}"));
    };
    let correlation_id = input_checksum(request).unwrap_or_else(|_| "unassigned".to_owned());
    let interface = ApplicationError::from(engine_error.clone()).into_interface(correlation_id);
    let hint = match engine_error {
        EngineError::Pricing(pricing) => pricing.user_message(),
        EngineError::Domain(_) => interface.user_message().to_owned(),
    };
    CommandResult::failure_with_hint(
        COMMAND,
        classify(engine_error),
        format!("{error:#}"),
        Some(&hint),
        Some(interface.correlation_id()),
    )
}

fn classify(error: &EngineError) -> ErrorClass {
    match error {
        EngineError::Pricing(PricingError::InvalidRate { .. }) => ErrorClass::InvalidRate,
        EngineError::Pricing(_) => ErrorClass::Pricing,
        EngineError::Domain(DomainError::StageTransition(_)) => ErrorClass::StageTransition,
        EngineError::Domain(DomainError::CalculationPrecondition { .. }) => {
            ErrorClass::CalculationPrecondition
        }
        EngineError::Domain(DomainError::InvariantViolation(_)) => ErrorClass::Internal,
    }
}
