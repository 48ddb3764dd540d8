//! Decoding of server command replies into failure records.
//!
//! A command reply is a document with an `ok` field. `ok: 0` means the
//! command failed and the top-level `errmsg`, `code`, `codeName` and
//! `errorLabels` describe why. `ok: 1` with a `writeConcernError`
//! sub-document means the write was applied but its write concern was not
//! satisfied.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use crate::error::{FailureError, FailureResult, FailureSource, OperationFailure, OperationKind};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorFields {
    errmsg: Option<String>,
    #[serde(default, deserialize_with = "integral_code")]
    code: Option<i32>,
    code_name: Option<String>,
}

/// Accepts a code sent as an integer or as an integral double (`91.0`).
fn integral_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let number = match Option::<Number>::deserialize(deserializer)? {
        Some(number) => number,
        None => return Ok(None),
    };
    number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|n| n.is_finite() && n.fract() == 0.0)
                .map(|n| n as i64)
        })
        .and_then(|code| i32::try_from(code).ok())
        .map(Some)
        .ok_or_else(|| {
            D::Error::custom(format!("`code` must be a 32-bit integer, got {}", number))
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandReply {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(flatten)]
    error: ErrorFields,
    #[serde(default)]
    error_labels: Vec<String>,
    #[serde(default)]
    write_concern_error: Option<ErrorFields>,
}

/// Interprets the `ok` field, which servers send as a number or a boolean.
fn is_ok(ok: Option<&Value>) -> FailureResult<bool> {
    match ok {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::Number(number)) => Ok(number.as_f64().map(|n| n == 1.0).unwrap_or(false)),
        Some(other) => Err(FailureError::InvalidReply(format!(
            "`ok` must be a number or boolean, got {}",
            other
        ))),
    }
}

impl OperationFailure {
    /// Builds a failure record from a command reply.
    ///
    /// Returns `Ok(None)` when the reply reports success.
    ///
    /// # Errors
    ///
    /// Returns [`FailureError::InvalidReply`] if the reply is not an object or
    /// a known field has the wrong type.
    pub fn from_reply(
        reply: &Value,
        operation_kind: OperationKind,
        wire_version: u32,
    ) -> FailureResult<Option<Self>> {
        if !reply.is_object() {
            return Err(FailureError::InvalidReply(
                "reply must be a document".to_string(),
            ));
        }

        let parsed = CommandReply::deserialize(reply)
            .map_err(|e| FailureError::InvalidReply(e.to_string()))?;
        let ok = is_ok(parsed.ok.as_ref())?;

        let (fields, source) = match (ok, parsed.write_concern_error) {
            (true, None) => return Ok(None),
            (true, Some(wce)) => (wce, FailureSource::WriteConcern),
            (false, _) => (parsed.error, FailureSource::Command),
        };

        let failure = OperationFailure::default()
            .message_opt(fields.errmsg)
            .code_opt(fields.code)
            .code_name_opt(fields.code_name)
            .with_labels(parsed.error_labels)
            .on(operation_kind, wire_version)
            .from_source(source);

        tracing::trace!(%failure, ?source, "decoded operation failure");
        Ok(Some(failure))
    }

    /// Parses a JSON reply and builds a failure record from it.
    pub fn from_reply_str(
        reply: &str,
        operation_kind: OperationKind,
        wire_version: u32,
    ) -> FailureResult<Option<Self>> {
        let value: Value = serde_json::from_str(reply)?;
        Self::from_reply(&value, operation_kind, wire_version)
    }
}
