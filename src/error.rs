use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure kinds surfaced by the engine.
///
/// Every variant carries enough context to be actionable by a caller; the
/// engine never recovers silently.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// Configuration rejected by validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Body rejected by validation at construction, edit, or load.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// A create or load introduced an id that is already in use.
    #[error("duplicate body id: {0}")]
    DuplicateBodyId(String),

    /// An edit referenced an id that is not in the active set.
    #[error("body not found: {0}")]
    BodyNotFound(String),

    /// A live body became non-finite during integration.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// Scenario or snapshot document violates the schema contract.
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Operation requires an initialized engine.
    #[error("engine is not initialized")]
    NotInitialized,

    /// Operation on a disposed engine.
    #[error("engine is disposed")]
    Disposed,
}
