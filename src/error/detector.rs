//! Code and message classifier for operation failures.
//!
//! Servers of different generations report the same condition in different
//! ways: newer ones send a numeric code, older ones may only send a message.
//! The classifier checks both. An explicit code, either in the `code` field
//! or as a trailing `"(<number>)"` in the message, is authoritative for the
//! not-primary and node-recovering facts. Retryability treats code and
//! message as independent signals.

use std::sync::OnceLock;

use regex::Regex;

use super::classification::{Classification, FailureSource, OperationFailure};
use super::codes::{self, KnownCode};
use super::resumability;
use crate::config::ClassifierConfig;

const NOT_MASTER: &str = "not master";
const NOT_MASTER_OR_SECONDARY: &str = "not master or secondary";
const NODE_IS_RECOVERING: &str = "node is recovering";
const TRANSACTION_NUMBERS: &str = "Transaction numbers";

static BUILTIN: FailureClassifier = FailureClassifier::new();

/// Trailing numeric code annotation, e.g. `"not master (10107)"`.
fn trailing_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((-?\d+)\)\s*$").expect("trailing code regex is valid"))
}

/// Extracts a numeric code embedded at the end of a server message.
pub fn embedded_code(message: &str) -> Option<i32> {
    trailing_code_regex()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Derives not-primary, recovering and retryability facts from a failure.
///
/// The built-in code tables always apply. Deployments can add codes and
/// message fragments on top of them, see [`ClassifierConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureClassifier {
    extra_write_retryable_codes: Vec<i32>,
    extra_resumable_codes: Vec<i32>,
    extra_read_retry_messages: Vec<String>,
}

impl FailureClassifier {
    /// Creates a classifier with only the built-in tables.
    pub const fn new() -> Self {
        Self {
            extra_write_retryable_codes: Vec::new(),
            extra_resumable_codes: Vec::new(),
            extra_read_retry_messages: Vec::new(),
        }
    }

    /// Shared classifier with only the built-in tables.
    pub fn builtin() -> &'static FailureClassifier {
        &BUILTIN
    }

    /// Creates a classifier with the extras named in `config`.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            extra_write_retryable_codes: config.extra_write_retryable_codes.clone(),
            extra_resumable_codes: config.extra_resumable_codes.clone(),
            extra_read_retry_messages: config.extra_read_retry_messages.clone(),
        }
    }

    /// Adds a code that makes writes retryable.
    pub fn add_write_retryable_code(&mut self, code: i32) {
        if !self.extra_write_retryable_codes.contains(&code) {
            self.extra_write_retryable_codes.push(code);
        }
    }

    /// Adds a code that lets a change stream resume on legacy servers.
    pub fn add_resumable_code(&mut self, code: i32) {
        if !self.extra_resumable_codes.contains(&code) {
            self.extra_resumable_codes.push(code);
        }
    }

    /// Adds a message fragment that makes reads retryable.
    pub fn add_read_retry_message(&mut self, fragment: impl Into<String>) {
        self.extra_read_retry_messages.push(fragment.into());
    }

    /// The code to classify by: the `code` field, else a trailing
    /// annotation in the message.
    pub fn effective_code(&self, failure: &OperationFailure) -> Option<i32> {
        failure
            .code()
            .or_else(|| failure.message().and_then(embedded_code))
    }

    fn message_contains(failure: &OperationFailure, fragment: &str) -> bool {
        failure
            .message()
            .map(|message| message.contains(fragment))
            .unwrap_or(false)
    }

    fn code_in(&self, failure: &OperationFailure, table: &[KnownCode], extra: &[i32]) -> bool {
        self.effective_code(failure)
            .map(|code| codes::contains(table, code) || extra.contains(&code))
            .unwrap_or(false)
    }

    /// Returns true if the node is changing state.
    pub fn is_node_recovering(&self, failure: &OperationFailure) -> bool {
        if let Some(code) = self.effective_code(failure) {
            return codes::contains(codes::NODE_RECOVERING_CODES, code);
        }
        Self::message_contains(failure, NODE_IS_RECOVERING)
            || Self::message_contains(failure, NOT_MASTER_OR_SECONDARY)
    }

    /// Returns true if the node is not the writable primary.
    ///
    /// A recovering node is never reported as not-primary, which is what
    /// keeps `"not master or secondary"` out of this fact.
    pub fn is_not_primary(&self, failure: &OperationFailure) -> bool {
        if self.is_node_recovering(failure) {
            return false;
        }
        if let Some(code) = self.effective_code(failure) {
            return codes::contains(codes::NOT_PRIMARY_CODES, code);
        }
        Self::message_contains(failure, NOT_MASTER)
    }

    /// Returns true if the node is shutting down.
    pub fn is_node_shutting_down(&self, failure: &OperationFailure) -> bool {
        self.code_in(failure, codes::NODE_SHUTTING_DOWN_CODES, &[])
    }

    /// Returns true if a write that failed this way may be resent.
    pub fn is_write_retryable(&self, failure: &OperationFailure) -> bool {
        self.code_in(
            failure,
            codes::WRITE_RETRYABLE_CODES,
            &self.extra_write_retryable_codes,
        ) || codes::WRITE_RETRY_MESSAGES
            .iter()
            .any(|fragment| Self::message_contains(failure, fragment))
    }

    /// Returns true if a read that failed this way may be resent.
    pub fn is_read_retryable(&self, failure: &OperationFailure) -> bool {
        self.code_in(
            failure,
            codes::READ_RETRYABLE_CODES,
            &self.extra_write_retryable_codes,
        ) || codes::WRITE_RETRY_MESSAGES
            .iter()
            .chain(codes::READ_RETRY_EXTRA_MESSAGES)
            .any(|fragment| Self::message_contains(failure, fragment))
            || self
                .extra_read_retry_messages
                .iter()
                .any(|fragment| Self::message_contains(failure, fragment))
    }

    /// Returns true if the storage engine does not support retryable writes.
    pub fn is_unsupported_retryable_write(&self, failure: &OperationFailure) -> bool {
        failure.code() == Some(codes::ILLEGAL_OPERATION)
            && failure
                .message()
                .map(|message| message.starts_with(TRANSACTION_NUMBERS))
                .unwrap_or(false)
    }

    /// Returns true if the operation ran out of its `maxTimeMS` budget.
    pub fn is_max_time_expired(&self, failure: &OperationFailure) -> bool {
        failure.code() == Some(codes::MAX_TIME_MS_EXPIRED)
    }

    /// Returns true if the code lets a change stream resume on servers that
    /// predate resumability labels.
    pub fn is_resumable_code(&self, failure: &OperationFailure) -> bool {
        [
            codes::NODE_RECOVERING_CODES,
            codes::NOT_PRIMARY_CODES,
            codes::WRITE_RETRYABLE_CODES,
            codes::CHANGE_STREAM_RESUME_EXTRA_CODES,
        ]
        .iter()
        .any(|table| self.code_in(failure, table, &[]))
            || self.code_in(failure, &[], &self.extra_resumable_codes)
    }

    /// Derives every fact for `failure`.
    pub fn classify(&self, failure: &OperationFailure) -> Classification {
        let not_primary = self.is_not_primary(failure);
        let node_recovering = self.is_node_recovering(failure);
        let classification = Classification {
            code: failure.code(),
            code_name: failure
                .code_name()
                .or_else(|| self.effective_code(failure).and_then(codes::code_name))
                .map(str::to_string),
            labels: failure.labels().to_vec(),
            operation_kind: failure.operation_kind(),
            wire_version: failure.wire_version(),
            source: failure.source(),
            not_primary,
            node_recovering,
            node_shutting_down: self.is_node_shutting_down(failure),
            write_retryable: self.is_write_retryable(failure),
            read_retryable: self.is_read_retryable(failure),
            unsupported_retryable_write: self.is_unsupported_retryable_write(failure),
            max_time_expired: self.is_max_time_expired(failure),
            state_change: failure.source() == FailureSource::Command
                && (not_primary || node_recovering),
            change_stream_resumable: resumability::is_resumable_with(
                self,
                failure,
                failure.operation_kind(),
                failure.wire_version(),
            ),
        };
        tracing::debug!(
            code = ?classification.code,
            not_primary = classification.not_primary,
            node_recovering = classification.node_recovering,
            write_retryable = classification.write_retryable,
            change_stream_resumable = classification.change_stream_resumable,
            "classified operation failure"
        );
        classification
    }
}
