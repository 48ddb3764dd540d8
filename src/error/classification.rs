//! Failure record and classification report types.
//!
//! An [`OperationFailure`] is the immutable input to classification: the
//! message, code, code name and labels a server returned for a failed
//! command, plus the kind of command and the negotiated wire version.
//! A [`Classification`] is the full set of facts derived from it.

use serde::Serialize;

use super::detector::FailureClassifier;
use super::resumability;

/// Server veto on change stream resumption.
pub const NON_RESUMABLE_CHANGE_STREAM_ERROR: &str = "NonResumableChangeStreamError";
/// Server grant of change stream resumption (wire version 9 and later).
pub const RESUMABLE_CHANGE_STREAM_ERROR: &str = "ResumableChangeStreamError";
/// Server grant of write retry.
pub const RETRYABLE_WRITE_ERROR: &str = "RetryableWriteError";
/// The whole transaction may be retried.
pub const TRANSIENT_TRANSACTION_ERROR: &str = "TransientTransactionError";
/// The outcome of a commit is unknown.
pub const UNKNOWN_TRANSACTION_COMMIT_RESULT: &str = "UnknownTransactionCommitResult";

/// The kind of command that failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// A cursor iteration (`getMore`) command.
    GetMore,
    /// Any other command.
    #[default]
    Other,
}

/// Where in the reply the failure was reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSource {
    /// Top level of the command reply (`ok: 0`).
    #[default]
    Command,
    /// `writeConcernError` sub-document of an otherwise successful reply.
    WriteConcern,
}

/// A failed server operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationFailure {
    message: Option<String>,
    code: Option<i32>,
    code_name: Option<String>,
    labels: Vec<String>,
    operation_kind: OperationKind,
    wire_version: u32,
    source: FailureSource,
}

impl OperationFailure {
    /// Creates a failure from a message alone.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Creates a failure carrying a server code and code name.
    pub fn with_code(
        message: impl Into<String>,
        code: i32,
        code_name: impl Into<String>,
    ) -> Self {
        Self {
            message: Some(message.into()),
            code: Some(code),
            code_name: Some(code_name.into()),
            ..Self::default()
        }
    }

    /// Sets or clears the message.
    pub fn message_opt(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// Sets or clears the code.
    pub fn code_opt(mut self, code: Option<i32>) -> Self {
        self.code = code;
        self
    }

    /// Sets or clears the code name.
    pub fn code_name_opt(mut self, code_name: Option<String>) -> Self {
        self.code_name = code_name;
        self
    }

    /// Replaces the labels.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a label unless it is already present.
    pub fn add_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.has_label(&label) {
            self.labels.push(label);
        }
        self
    }

    /// Records the command kind and negotiated wire version.
    pub fn on(mut self, operation_kind: OperationKind, wire_version: u32) -> Self {
        self.operation_kind = operation_kind;
        self.wire_version = wire_version;
        self
    }

    /// Records where in the reply the failure was reported.
    pub fn from_source(mut self, source: FailureSource) -> Self {
        self.source = source;
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn code_name(&self) -> Option<&str> {
        self.code_name.as_deref()
    }

    /// Labels exactly as the server sent them. Empty when there were none.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn operation_kind(&self) -> OperationKind {
        self.operation_kind
    }

    pub fn wire_version(&self) -> u32 {
        self.wire_version
    }

    pub fn source(&self) -> FailureSource {
        self.source
    }

    /// Returns true if the node is not the writable primary.
    pub fn is_not_primary(&self) -> bool {
        FailureClassifier::builtin().is_not_primary(self)
    }

    /// Returns true if the node is changing state.
    pub fn is_node_recovering(&self) -> bool {
        FailureClassifier::builtin().is_node_recovering(self)
    }

    /// Returns true if the node is shutting down.
    pub fn is_node_shutting_down(&self) -> bool {
        FailureClassifier::builtin().is_node_shutting_down(self)
    }

    /// Returns true if a write that failed this way may be resent.
    pub fn is_write_retryable(&self) -> bool {
        FailureClassifier::builtin().is_write_retryable(self)
    }

    /// Returns true if a read that failed this way may be resent.
    pub fn is_read_retryable(&self) -> bool {
        FailureClassifier::builtin().is_read_retryable(self)
    }

    /// Returns true if the failure should feed back into topology state.
    ///
    /// Write concern failures never do, whatever their code.
    pub fn signals_state_change(&self) -> bool {
        self.source == FailureSource::Command
            && (self.is_not_primary() || self.is_node_recovering())
    }

    /// Returns true if a change stream that failed this way may resume.
    pub fn is_change_stream_resumable(&self) -> bool {
        resumability::is_resumable(self, self.operation_kind, self.wire_version)
    }

    /// Derives every fact with the built-in classifier.
    pub fn classify(&self) -> Classification {
        FailureClassifier::builtin().classify(self)
    }
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.message, self.code, &self.code_name) {
            (Some(message), Some(code), Some(name)) => {
                write!(f, "[{}:{}]: {}", code, name, message)
            }
            (Some(message), Some(code), None) => write!(f, "[{}]: {}", code, message),
            (Some(message), None, _) => write!(f, "{}", message),
            (None, Some(code), Some(name)) => write!(f, "[{}:{}]", code, name),
            (None, Some(code), None) => write!(f, "[{}]", code),
            (None, None, _) => write!(f, "unknown operation failure"),
        }
    }
}

impl std::error::Error for OperationFailure {}

/// Every fact derived from one [`OperationFailure`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub code: Option<i32>,
    pub code_name: Option<String>,
    pub labels: Vec<String>,
    pub operation_kind: OperationKind,
    pub wire_version: u32,
    pub source: FailureSource,
    pub not_primary: bool,
    pub node_recovering: bool,
    pub node_shutting_down: bool,
    pub write_retryable: bool,
    pub read_retryable: bool,
    pub unsupported_retryable_write: bool,
    pub max_time_expired: bool,
    pub state_change: bool,
    pub change_stream_resumable: bool,
}

impl Classification {
    /// Returns true if any retry or resume is allowed.
    pub fn is_recoverable(&self) -> bool {
        self.write_retryable || self.read_retryable || self.change_stream_resumable
    }
}
