pub mod config;
pub mod quote;

use serde::Serialize;

/// What a command prints and the process exit status that goes with it.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Failure categories reported in the `error_class` field. Each one owns
/// its exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Input,
    ConfigValidation,
    StageTransition,
    CalculationPrecondition,
    InvalidRate,
    Pricing,
    RuntimeInit,
    Serialization,
    Internal,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Input
            | Self::ConfigValidation
            | Self::StageTransition
            | Self::CalculationPrecondition => 2,
            Self::InvalidRate | Self::Pricing => 3,
            Self::RuntimeInit | Self::Serialization | Self::Internal => 1,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    command: &'a str,
    status: &'static str,
    error_class: ErrorClass,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<&'a str>,
}

impl CommandResult {
    /// Successful command whose output is the payload itself.
    pub fn payload(output: String) -> Self {
        Self { exit_code: 0, output }
    }

    pub fn failure(command: &str, class: ErrorClass, message: impl Into<String>) -> Self {
        Self::failure_with_hint(command, class, message, None, None)
    }

    /// Failure carrying a contractor-facing hint and the id of the request
    /// it belongs to.
    pub fn failure_with_hint(
        command: &str,
        class: ErrorClass,
        message: impl Into<String>,
        hint: Option<&str>,
        correlation_id: Option<&str>,
    ) -> Self {
        let message = message.into();
        let envelope = ErrorEnvelope {
            command,
            status: "error",
            error_class: class,
            message: &message,
            hint,
            correlation_id,
        };
        let output = serde_json::to_string(&envelope)
            .unwrap_or_else(|error| format!("{command} failed ({error}): {message}"));
        Self { exit_code: class.exit_code(), output }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{CommandResult, ErrorClass};

    #[test]
    fn failure_envelope_carries_class_and_exit_code() {
        let result = CommandResult::failure_with_hint(
            "quote",
            ErrorClass::InvalidRate,
            "invalid rate markup_pct=150",
            Some("The rate is not allowed."),
            Some("sha256:abc"),
        );
        assert_eq!(result.exit_code, 3);

        let payload: Value = serde_json::from_str(&result.output).expect("json envelope");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_rate");
        assert_eq!(payload["hint"], "The rate is not allowed.");
        assert_eq!(payload["correlation_id"], "sha256:abc");
    }

    #[test]
    fn plain_failure_omits_optional_fields() {
        let result = CommandResult::failure("config", ErrorClass::ConfigValidation, "bad coats");
        assert_eq!(result.exit_code, 2);

        let payload: Value = serde_json::from_str(&result.output).expect("json envelope");
        assert!(payload.get("hint").is_none());
        assert!(payload.get("correlation_id").is_none());
    }
}
