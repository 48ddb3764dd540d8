//! Server error code tables used by the failure classifier.
//!
//! Each table is an immutable list of `(code, code name)` pairs. Membership is
//! decided on the numeric code alone; the names are carried for diagnostics
//! and for the `opfail codes` listing.

/// A server error code paired with its symbolic name.
pub type KnownCode = (i32, &'static str);

/// Cursor was not found on the server.
pub const CURSOR_NOT_FOUND: i32 = 43;

/// Operation not allowed; combined with a message prefix this flags storage
/// engines that do not support retryable writes.
pub const ILLEGAL_OPERATION: i32 = 20;

/// The operation exceeded its `maxTimeMS`.
pub const MAX_TIME_MS_EXPIRED: i32 = 50;

/// Codes meaning the node is not the writable primary.
pub const NOT_PRIMARY_CODES: &[KnownCode] = &[
    (10107, "NotWritablePrimary"),
    (13435, "NotPrimaryNoSecondaryOk"),
];

/// Codes meaning the node is changing state and temporarily cannot serve.
pub const NODE_RECOVERING_CODES: &[KnownCode] = &[
    (11600, "InterruptedAtShutdown"),
    (11602, "InterruptedDueToReplStateChange"),
    (13436, "NotPrimaryOrSecondary"),
    (189, "PrimarySteppedDown"),
    (91, "ShutdownInProgress"),
];

/// Codes meaning the node is shutting down.
pub const NODE_SHUTTING_DOWN_CODES: &[KnownCode] = &[
    (11600, "InterruptedAtShutdown"),
    (91, "ShutdownInProgress"),
];

/// Codes for which a failed write may be resent.
///
/// The not-primary codes appear here as their own entries; the not-primary
/// table is not folded in.
pub const WRITE_RETRYABLE_CODES: &[KnownCode] = &[
    (6, "HostUnreachable"),
    (7, "HostNotFound"),
    (89, "NetworkTimeout"),
    (91, "ShutdownInProgress"),
    (189, "PrimarySteppedDown"),
    (262, "ExceededTimeLimit"),
    (9001, "SocketException"),
    (10107, "NotWritablePrimary"),
    (11600, "InterruptedAtShutdown"),
    (11602, "InterruptedDueToReplStateChange"),
    (13435, "NotPrimaryNoSecondaryOk"),
    (13436, "NotPrimaryOrSecondary"),
];

/// Codes for which a failed read may be resent.
pub const READ_RETRYABLE_CODES: &[KnownCode] = WRITE_RETRYABLE_CODES;

/// Codes beyond the write-retryable table that let a change stream resume
/// on servers that predate resumability labels.
pub const CHANGE_STREAM_RESUME_EXTRA_CODES: &[KnownCode] = &[
    (63, "StaleShardVersion"),
    (133, "FailedToSatisfyReadPreference"),
    (150, "StaleEpoch"),
    (234, "RetryChangeStream"),
    (13388, "StaleConfig"),
];

/// Message fragments that make a write retryable.
pub const WRITE_RETRY_MESSAGES: &[&str] = &["not master", "node is recovering"];

/// Message fragments, beyond [`WRITE_RETRY_MESSAGES`], that make a read
/// retryable. Connection-level phrasing lives here and only here.
pub const READ_RETRY_EXTRA_MESSAGES: &[&str] = &[
    "transport error",
    "socket exception",
    "can't connect",
    "connect failed",
    "error querying",
    "could not get last error",
    "connection attempt failed",
    "interrupted at shutdown",
    "unknown replica set",
    "dbclient error communicating with server",
];

/// Returns true if `code` appears in `table`.
pub fn contains(table: &[KnownCode], code: i32) -> bool {
    table.iter().any(|(known, _)| *known == code)
}

/// Looks up the symbolic name of a code across every table.
pub fn code_name(code: i32) -> Option<&'static str> {
    [
        NOT_PRIMARY_CODES,
        NODE_RECOVERING_CODES,
        WRITE_RETRYABLE_CODES,
        CHANGE_STREAM_RESUME_EXTRA_CODES,
    ]
    .iter()
    .flat_map(|table| table.iter())
    .chain(
        [
            (CURSOR_NOT_FOUND, "CursorNotFound"),
            (ILLEGAL_OPERATION, "IllegalOperation"),
            (MAX_TIME_MS_EXPIRED, "MaxTimeMSExpired"),
        ]
        .iter(),
    )
    .find(|(known, _)| *known == code)
    .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_recovering_codes_are_write_retryable() {
        for (code, name) in NODE_RECOVERING_CODES {
            assert!(
                contains(WRITE_RETRYABLE_CODES, *code),
                "{} ({}) should be write-retryable",
                name,
                code
            );
        }
    }

    #[test]
    fn test_not_primary_and_recovering_are_disjoint() {
        for (code, _) in NOT_PRIMARY_CODES {
            assert!(!contains(NODE_RECOVERING_CODES, *code));
        }
    }

    #[test]
    fn test_shutting_down_is_subset_of_recovering() {
        for (code, _) in NODE_SHUTTING_DOWN_CODES {
            assert!(contains(NODE_RECOVERING_CODES, *code));
        }
    }

    #[test]
    fn test_cursor_not_found_is_not_write_retryable() {
        assert!(!contains(WRITE_RETRYABLE_CODES, CURSOR_NOT_FOUND));
    }

    #[test]
    fn test_code_name_lookup() {
        assert_eq!(code_name(91), Some("ShutdownInProgress"));
        assert_eq!(code_name(10107), Some("NotWritablePrimary"));
        assert_eq!(code_name(234), Some("RetryChangeStream"));
        assert_eq!(code_name(43), Some("CursorNotFound"));
        assert_eq!(code_name(136), None);
    }

    #[test]
    fn test_socket_exception_is_read_only_phrase() {
        assert!(READ_RETRY_EXTRA_MESSAGES.contains(&"socket exception"));
        assert!(!WRITE_RETRY_MESSAGES.contains(&"socket exception"));
    }
}
