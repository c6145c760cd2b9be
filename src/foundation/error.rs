/// Convenience result type used across the render-setup engine.
pub type RenderSetupResult<T> = Result<T, RenderSetupError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Only conditions that abort a command surface here. Recoverable problems (missing
/// dependencies, type mismatches at apply time, unparsable selector patterns, per-node decode
/// failures) are logged and flagged on the offending object instead.
#[derive(thiserror::Error, Debug)]
pub enum RenderSetupError {
    /// Bad arguments to a tree mutation (unknown item, cyclic parent, missing attribute, ...).
    #[error("structural error: {0}")]
    Structural(String),

    /// An override references a node or plug that does not exist.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// A value or connection is incompatible with the target attribute type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A selector pattern could not be parsed.
    #[error("selector error: {0}")]
    Selector(String),

    /// Errors when encoding or decoding render-setup documents.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Invalid operation on the scene graph (unknown node/plug, bad connection, ...).
    #[error("scene error: {0}")]
    Scene(String),

    /// A command could not run in the current engine state.
    #[error("command error: {0}")]
    Command(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderSetupError {
    /// Build a [`RenderSetupError::Structural`] value.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    /// Build a [`RenderSetupError::MissingDependency`] value.
    pub fn missing_dependency(msg: impl Into<String>) -> Self {
        Self::MissingDependency(msg.into())
    }

    /// Build a [`RenderSetupError::TypeMismatch`] value.
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Build a [`RenderSetupError::Selector`] value.
    pub fn selector(msg: impl Into<String>) -> Self {
        Self::Selector(msg.into())
    }

    /// Build a [`RenderSetupError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`RenderSetupError::Scene`] value.
    pub fn scene(msg: impl Into<String>) -> Self {
        Self::Scene(msg.into())
    }

    /// Build a [`RenderSetupError::Command`] value.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }
}

impl From<serde_json::Error> for RenderSetupError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
