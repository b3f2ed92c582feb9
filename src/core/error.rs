use thiserror::Error;

/// Reason a single `set_value` call was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("value length {len} is too long (maximum: {max})")]
    TooLong { len: usize, max: usize },

    #[error("value {value} has more than {precision} significant digits ({integer_digits} allowed before the decimal point)")]
    Precision {
        value: String,
        precision: u32,
        integer_digits: u32,
    },

    #[error("value {value} has more than {scale} decimal places")]
    Scale { value: String, scale: u32 },

    #[error("unknown choice code '{0}'")]
    UnknownChoice(String),

    #[error("choice '{0}' is inactive")]
    InactiveChoice(String),

    #[error("field is read-only")]
    ReadOnly,

    #[error("field is mandatory")]
    Mandatory,

    #[error("expected {expected}, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid time period '{0}'")]
    TimePeriod(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Composition error: {0}")]
    Composition(String),

    #[error("Validation error on field '{field}': {failure}")]
    Validation {
        field: String,
        failure: ValidationFailure,
    },

    #[error("Transition not authorized on field '{field}': '{from}' -> '{to}'")]
    InvalidTransition {
        field: String,
        from: String,
        to: String,
    },

    #[error("Combination not permitted by constraint '{constraint}': {values}")]
    CombinationNotPermitted { constraint: String, values: String },

    #[error("Load error on field '{field}' of object '{object}' for value '{raw}': {message}")]
    Load {
        field: String,
        object: String,
        raw: String,
        message: String,
    },

    #[error("Trigger breaker: more than {limit} trigger executions in one unit of work")]
    Breaker { limit: usize },

    #[error("Field '{0}' not found in object '{1}'")]
    FieldNotFound(String, String),

    #[error("Object definition '{0}' not found")]
    ObjectNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn validation(field: impl Into<String>, failure: ValidationFailure) -> Self {
        Self::Validation {
            field: field.into(),
            failure,
        }
    }

    /// True for errors that signal a defect in the definitions themselves
    /// rather than in the data being processed.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::Composition(_) | Self::Breaker { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<bcrypt::BcryptError> for EngineError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Storage(format!("bcrypt: {}", err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::TypeMismatch(err.to_string())
    }
}
