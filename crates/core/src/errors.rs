use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::field::FieldKey;
use crate::domain::project::Surface;
use crate::flows::StageTransitionError;

/// Failures while turning raw measurements into physical quantities.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{field} must be greater than zero, got {value}")]
    InvalidMeasurement { field: FieldKey, value: Decimal },
    #[error(
        "stated wall area {stated_sqft} sqft disagrees with {derived_sqft} sqft from length x height"
    )]
    AmbiguousMeasurement { stated_sqft: Decimal, derived_sqft: Decimal, difference_pct: Decimal },
    #[error("no quantity known for {surface}")]
    MissingQuantity { surface: Surface },
    #[error("{field} is too large to compute with")]
    Overflow { field: FieldKey },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("missing pricing input: {field}")]
    MissingInput { field: String },
    #[error("invalid rate {field}={value}: {reason}")]
    InvalidRate { field: String, value: Decimal, reason: String },
    #[error("{step} exceeds the representable amount")]
    Overflow { step: String },
}

impl PricingError {
    /// Message safe to show to the contractor.
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolution(ResolutionError::InvalidMeasurement { field, value }) => {
                format!("The measurement {field} ({value}) must be a positive number.")
            }
            Self::Resolution(ResolutionError::AmbiguousMeasurement {
                stated_sqft,
                derived_sqft,
                ..
            }) => format!(
                "The wall area was given as {stated_sqft} sqft but the dimensions work out to {derived_sqft} sqft. Which is correct?"
            ),
            Self::Resolution(ResolutionError::MissingQuantity { surface }) => {
                format!("A measurement for the {surface} is still needed.")
            }
            Self::Resolution(ResolutionError::Overflow { field }) => {
                format!("The value for {field} is too large to work with. Please check it.")
            }
            Self::MissingInput { field } => format!("A value for {field} is still needed."),
            Self::InvalidRate { field, value, reason } => {
                format!("The rate {field} ({value}) is not allowed: it {reason}.")
            }
            Self::Overflow { step } => {
                format!("The {step} is too large to price. Please check the measurements and rates.")
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    StageTransition(#[from] StageTransitionError),
    #[error("calculation requested before the quote is ready; missing: {missing_fields:?}")]
    CalculationPrecondition { missing_fields: Vec<String> },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors surfaced by the engine facade.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<StageTransitionError> for EngineError {
    fn from(value: StageTransitionError) -> Self {
        Self::Domain(DomainError::from(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("external extraction failure: {0}")]
    ExternalExtraction(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<DomainError> for ApplicationError {
    fn from(value: DomainError) -> Self {
        Self::Engine(EngineError::Domain(value))
    }
}

impl From<PricingError> for ApplicationError {
    fn from(value: PricingError) -> Self {
        Self::Engine(EngineError::Pricing(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable quote: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unprocessable { .. } => {
                "The quote could not be priced with the given rates or measurements."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Engine(EngineError::Domain(error)) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Engine(EngineError::Pricing(error)) => {
                Self::Unprocessable { message: error.user_message(), correlation_id: unassigned() }
            }
            ApplicationError::ExternalExtraction(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
