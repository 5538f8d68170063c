use thiserror::Error;

/// **CONVENIENCE RESULT ALIAS**
pub type Result<T> = std::result::Result<T, ScopeError>;

/// **ENGINE ERROR TAXONOMY**
///
/// **STARTUP-FATAL**: `NameResolutionFailure`, `DuplicateRegistration`, `InvalidName`,
/// `AlreadyBound`, `UnresolvedDependency`, `InvalidConfiguration`.
/// **REQUEST-FATAL**: `MissingDependency`, `SupplyFailed`, `TypeMismatch`, `ContextNotFound`,
/// `DisposeFailed`.
/// **UNEXPECTED**: `LockTimeout` signals misuse or deadlock and is never retried.
#[derive(Debug, Clone, Error)]
pub enum ScopeError {
    #[error("NAME RESOLUTION FAILURE: '{name}' in namespace '{namespace}' - {reason}")]
    NameResolutionFailure {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("DUPLICATE REGISTRATION: '{name}' already registered in namespace '{namespace}'")]
    DuplicateRegistration { namespace: String, name: String },

    #[error("INVALID NAME: '{name}' is not an identifier ([A-Za-z_][A-Za-z0-9_]*)")]
    InvalidName { name: String },

    #[error("MISSING DEPENDENCY: no value or supplier for {dependency}")]
    MissingDependency { dependency: String },

    #[error("LOCK TIMEOUT: {resource} not acquired within {timeout_ms}ms")]
    LockTimeout { resource: String, timeout_ms: u64 },

    #[error("ALREADY BOUND: {operation} is not allowed after bind")]
    AlreadyBound { operation: &'static str },

    #[error("UNRESOLVED DEPENDENCY: {dependency} claimed by node {node} has no supplier")]
    UnresolvedDependency { node: u64, dependency: String },

    #[error("SUPPLY FAILED: {dependency} - {message}")]
    SupplyFailed { dependency: String, message: String },

    #[error("TYPE MISMATCH: '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("UNKNOWN NODE: scope provider {node} does not exist")]
    UnknownNode { node: u64 },

    #[error("CONTEXT NOT FOUND: {message}")]
    ContextNotFound { message: String },

    #[error("DISPOSE FAILED: context {context} - {message}")]
    DisposeFailed { context: usize, message: String },

    #[error("INVALID CONFIGURATION: {message}")]
    InvalidConfiguration { message: String },
}

impl ScopeError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ScopeError::NameResolutionFailure { .. } => error_codes::NAME_RESOLUTION_FAILURE,
            ScopeError::DuplicateRegistration { .. } => error_codes::DUPLICATE_REGISTRATION,
            ScopeError::InvalidName { .. } => error_codes::INVALID_NAME,
            ScopeError::MissingDependency { .. } => error_codes::MISSING_DEPENDENCY,
            ScopeError::LockTimeout { .. } => error_codes::LOCK_TIMEOUT,
            ScopeError::AlreadyBound { .. } => error_codes::ALREADY_BOUND,
            ScopeError::UnresolvedDependency { .. } => error_codes::UNRESOLVED_DEPENDENCY,
            ScopeError::SupplyFailed { .. } => error_codes::SUPPLY_FAILED,
            ScopeError::TypeMismatch { .. } => error_codes::TYPE_MISMATCH,
            ScopeError::UnknownNode { .. } => error_codes::UNKNOWN_NODE,
            ScopeError::ContextNotFound { .. } => error_codes::CONTEXT_NOT_FOUND,
            ScopeError::DisposeFailed { .. } => error_codes::DISPOSE_FAILED,
            ScopeError::InvalidConfiguration { .. } => error_codes::INVALID_CONFIGURATION,
        }
    }

    /// Whether the error aborts application startup rather than a single request.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            ScopeError::NameResolutionFailure { .. }
                | ScopeError::DuplicateRegistration { .. }
                | ScopeError::InvalidName { .. }
                | ScopeError::AlreadyBound { .. }
                | ScopeError::UnresolvedDependency { .. }
                | ScopeError::InvalidConfiguration { .. }
        )
    }

    /// Shorthand used by supply implementations.
    pub fn supply_failed(dependency: impl ToString, message: impl Into<String>) -> Self {
        ScopeError::SupplyFailed {
            dependency: dependency.to_string(),
            message: message.into(),
        }
    }
}

/// **ERROR CODES**
///
/// **MANDATE**: Use these standardized codes for consistent error reporting.
pub mod error_codes {
    pub const NAME_RESOLUTION_FAILURE: &str = "DATASCOPE_BINDING_NAME_RESOLUTION_FAILURE";
    pub const DUPLICATE_REGISTRATION: &str = "DATASCOPE_BINDING_DUPLICATE_REGISTRATION";
    pub const INVALID_NAME: &str = "DATASCOPE_BINDING_INVALID_NAME";
    pub const ALREADY_BOUND: &str = "DATASCOPE_BINDING_ALREADY_BOUND";
    pub const MISSING_DEPENDENCY: &str = "DATASCOPE_CONTEXT_MISSING_DEPENDENCY";
    pub const SUPPLY_FAILED: &str = "DATASCOPE_CONTEXT_SUPPLY_FAILED";
    pub const TYPE_MISMATCH: &str = "DATASCOPE_CONTEXT_TYPE_MISMATCH";
    pub const CONTEXT_NOT_FOUND: &str = "DATASCOPE_CONTEXT_NOT_FOUND";
    pub const DISPOSE_FAILED: &str = "DATASCOPE_CONTEXT_DISPOSE_FAILED";
    pub const UNRESOLVED_DEPENDENCY: &str = "DATASCOPE_SCOPING_UNRESOLVED_DEPENDENCY";
    pub const UNKNOWN_NODE: &str = "DATASCOPE_SCOPING_UNKNOWN_NODE";
    pub const LOCK_TIMEOUT: &str = "DATASCOPE_SYSTEM_LOCK_TIMEOUT";
    pub const INVALID_CONFIGURATION: &str = "DATASCOPE_SYSTEM_INVALID_CONFIGURATION";
}
