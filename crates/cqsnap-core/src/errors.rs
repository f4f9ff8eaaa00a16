use cqsnap_core_types::RequestId;
use thiserror::Error;

/// Result type alias using SnapError
pub type Result<T> = std::result::Result<T, SnapError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used for programmatic handling,
/// log assertions and the CLI exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapErrorKind {
    // Caller input
    /// Identity cannot be resolved or options contradict each other
    Usage,
    InvalidInput,
    NotFound,
    AlreadyExists,
    InvalidTransition,

    // Collaborators
    /// Blob store transport or permission failure (never "not found")
    Storage,
    /// Analysis engine or custom build executable failed
    Engine,
    /// Row vanished between claim and reconcile
    ConcurrencyAnomaly,

    // Preconditions
    /// Metadata store or object store has not been initialized
    NotInitialized,

    // Integration/IO
    Persistence,
    Io,
    Serialization,
    Archive,
    Config,

    // Internal
    Internal,
}

impl SnapErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            SnapErrorKind::Usage => "ERR_USAGE",
            SnapErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            SnapErrorKind::NotFound => "ERR_NOT_FOUND",
            SnapErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            SnapErrorKind::InvalidTransition => "ERR_INVALID_TRANSITION",
            SnapErrorKind::Storage => "ERR_STORAGE",
            SnapErrorKind::Engine => "ERR_ENGINE",
            SnapErrorKind::ConcurrencyAnomaly => "ERR_CONCURRENCY_ANOMALY",
            SnapErrorKind::NotInitialized => "ERR_NOT_INITIALIZED",
            SnapErrorKind::Persistence => "ERR_PERSISTENCE",
            SnapErrorKind::Io => "ERR_IO",
            SnapErrorKind::Serialization => "ERR_SERIALIZATION",
            SnapErrorKind::Archive => "ERR_ARCHIVE",
            SnapErrorKind::Config => "ERR_CONFIG",
            SnapErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind for programmatic handling plus the
/// operation and snapshot it concerns for debugging.
#[derive(Debug, Clone)]
pub struct SnapError {
    kind: SnapErrorKind,
    op: Option<String>,
    snapshot_id: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<SnapError>>,
}

impl SnapError {
    /// Create a new error with the specified kind
    pub fn new(kind: SnapErrorKind) -> Self {
        Self {
            kind,
            op: None,
            snapshot_id: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Set the operation name
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Set the snapshot global id
    pub fn with_snapshot_id(mut self, id: impl Into<String>) -> Self {
        self.snapshot_id = Some(id.into());
        self
    }

    /// Set the worker request id
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Set the error message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the error that caused this one
    pub fn with_source(mut self, source: SnapError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> SnapErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&SnapError> {
        self.source.as_deref()
    }

    /// True for blob-store lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        self.kind == SnapErrorKind::NotFound
    }
}

impl std::fmt::Display for SnapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(snapshot_id) = &self.snapshot_id {
            write!(f, " (snapshot: {})", snapshot_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for SnapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Failures decoding or validating snapshot model values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown snapshot state: {value}")]
    UnknownState { value: String },

    #[error("Unsupported snapshot language: {value}")]
    UnknownLanguage { value: String },

    #[error("Illegal state transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Identity field '{field}' must not be empty")]
    EmptyIdentityField { field: &'static str },

    #[error("Identity field '{field}' must not contain control characters")]
    ControlCharacter { field: &'static str },
}

impl From<ModelError> for SnapError {
    fn from(err: ModelError) -> Self {
        let kind = match &err {
            ModelError::UnknownState { .. } => SnapErrorKind::Serialization,
            ModelError::UnknownLanguage { .. }
            | ModelError::EmptyIdentityField { .. }
            | ModelError::ControlCharacter { .. } => SnapErrorKind::InvalidInput,
            ModelError::IllegalTransition { .. } => SnapErrorKind::InvalidTransition,
        };
        SnapError::new(kind).with_message(err.to_string())
    }
}

impl From<serde_json::Error> for SnapError {
    fn from(err: serde_json::Error) -> Self {
        SnapError::new(SnapErrorKind::Serialization).with_message(err.to_string())
    }
}
