use thiserror::Error;

/// Errors raised by the regulation desk and its document store.
#[derive(Error, Debug)]
pub enum RegulationError {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("No document '{id}' in collection '{collection}'")]
    NotFound { collection: &'static str, id: String },

    #[error("Cannot {operation} {entity} '{id}' while it is {status}")]
    InvalidState {
        entity: &'static str,
        id: String,
        status: String,
        operation: &'static str,
    },

    #[error("Bed '{bed_id}' is not assignable (status: {status})")]
    BedUnavailable { bed_id: String, status: String },

    #[error(
        "Selected request has priority {selected} while priority {top} is waiting; a justification is required"
    )]
    JustificationRequired { selected: u8, top: u8 },

    #[error("Missing answer: {0}")]
    MissingAnswer(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for fallible regulation operations.
pub type RegulationResult<T> = Result<T, RegulationError>;

impl RegulationError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        RegulationError::Validation {
            field,
            message: message.into(),
        }
    }
}
