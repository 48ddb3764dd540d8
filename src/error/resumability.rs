//! Change stream resumability.
//!
//! Decides whether a change stream whose `getMore` failed may reopen its
//! cursor from the last seen position. Servers from wire version 9 label
//! resumable errors themselves; older servers are judged by code.

use super::classification::{
    OperationFailure, OperationKind, NON_RESUMABLE_CHANGE_STREAM_ERROR,
    RESUMABLE_CHANGE_STREAM_ERROR,
};
use super::codes::CURSOR_NOT_FOUND;
use super::detector::FailureClassifier;

/// First wire version whose servers attach resumability labels.
pub const RESUMABLE_LABEL_WIRE_VERSION: u32 = 9;

/// Returns true if a change stream that failed with `failure` may resume.
///
/// Uses the built-in code tables.
pub fn is_resumable(
    failure: &OperationFailure,
    operation_kind: OperationKind,
    wire_version: u32,
) -> bool {
    is_resumable_with(
        FailureClassifier::builtin(),
        failure,
        operation_kind,
        wire_version,
    )
}

/// Same as [`is_resumable`], judging legacy codes with `classifier`.
pub fn is_resumable_with(
    classifier: &FailureClassifier,
    failure: &OperationFailure,
    operation_kind: OperationKind,
    wire_version: u32,
) -> bool {
    if operation_kind != OperationKind::GetMore {
        tracing::trace!(?operation_kind, "not a getMore failure, not resumable");
        return false;
    }

    // The server no longer knows the cursor, so it cannot tell whether it was
    // a change stream and cannot label the error.
    if failure.code() == Some(CURSOR_NOT_FOUND) {
        tracing::debug!(wire_version, "cursor not found, resumable");
        return true;
    }

    if wire_version >= RESUMABLE_LABEL_WIRE_VERSION {
        let resumable = failure.has_label(RESUMABLE_CHANGE_STREAM_ERROR)
            && !failure.has_label(NON_RESUMABLE_CHANGE_STREAM_ERROR);
        tracing::debug!(
            wire_version,
            labels = ?failure.labels(),
            resumable,
            "change stream resumability decided by labels"
        );
        return resumable;
    }

    let resumable =
        classifier.is_resumable_code(failure) || classifier.is_write_retryable(failure);
    tracing::debug!(
        wire_version,
        code = ?failure.code(),
        resumable,
        "change stream resumability decided by code"
    );
    resumable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_more(code: i32, code_name: &str) -> OperationFailure {
        OperationFailure::with_code("no message", code, code_name)
    }

    #[test]
    fn test_resumable_code_by_wire_version() {
        let failure = get_more(91, "ShutdownInProgress");
        assert!(is_resumable(&failure, OperationKind::GetMore, 8));
        assert!(!is_resumable(&failure, OperationKind::GetMore, 9));
    }

    #[test]
    fn test_resumable_code_not_get_more() {
        let failure = get_more(91, "ShutdownInProgress");
        assert!(!is_resumable(&failure, OperationKind::Other, 8));
    }

    #[test]
    fn test_non_resumable_code() {
        let failure = get_more(136, "CappedPositionLost");
        for wire_version in [0, 8, 9, 17] {
            assert!(!is_resumable(&failure, OperationKind::GetMore, wire_version));
            assert!(!is_resumable(&failure, OperationKind::Other, wire_version));
        }
    }

    #[test]
    fn test_non_resumable_label() {
        let failure =
            get_more(91, "ShutdownInProgress").with_labels([NON_RESUMABLE_CHANGE_STREAM_ERROR]);
        // Legacy servers are judged by code only.
        assert!(is_resumable(&failure, OperationKind::GetMore, 8));
        assert!(!is_resumable(&failure, OperationKind::GetMore, 9));
        assert!(!is_resumable(&failure, OperationKind::Other, 8));
    }

    #[test]
    fn test_cursor_not_found() {
        let failure = OperationFailure::default()
            .code_opt(Some(43))
            .code_name_opt(Some("CursorNotFound".to_string()));
        assert!(is_resumable(&failure, OperationKind::GetMore, 8));
        assert!(is_resumable(&failure, OperationKind::GetMore, 9));
    }

    #[test]
    fn test_cursor_not_found_outside_get_more() {
        let failure = get_more(43, "CursorNotFound");
        assert!(!is_resumable(&failure, OperationKind::Other, 8));
        assert!(!is_resumable(&failure, OperationKind::Other, 9));
    }

    #[test]
    fn test_cursor_not_found_ignores_veto() {
        let failure =
            get_more(43, "CursorNotFound").with_labels([NON_RESUMABLE_CHANGE_STREAM_ERROR]);
        assert!(is_resumable(&failure, OperationKind::GetMore, 9));
    }

    #[test]
    fn test_resumable_label() {
        let failure =
            get_more(91, "ShutdownInProgress").with_labels([RESUMABLE_CHANGE_STREAM_ERROR]);
        assert!(is_resumable(&failure, OperationKind::GetMore, 9));

        let unknown_code =
            get_more(136, "CappedPositionLost").with_labels([RESUMABLE_CHANGE_STREAM_ERROR]);
        assert!(is_resumable(&unknown_code, OperationKind::GetMore, 9));
        assert!(!is_resumable(&unknown_code, OperationKind::GetMore, 8));
    }

    #[test]
    fn test_veto_beats_grant() {
        let failure = get_more(91, "ShutdownInProgress")
            .with_labels([RESUMABLE_CHANGE_STREAM_ERROR, NON_RESUMABLE_CHANGE_STREAM_ERROR]);
        assert!(!is_resumable(&failure, OperationKind::GetMore, 9));
    }

    #[test]
    fn test_legacy_codes() {
        for code in [
            10107, 13435, 11600, 11602, 13436, 189, 91, 6, 7, 89, 262, 9001, 63, 133, 150, 234,
            13388,
        ] {
            let failure = get_more(code, "thingy");
            assert!(
                is_resumable(&failure, OperationKind::GetMore, 8),
                "code {} should resume on legacy servers",
                code
            );
        }
    }

    #[test]
    fn test_legacy_message() {
        let failure = OperationFailure::new("node is recovering");
        assert!(is_resumable(&failure, OperationKind::GetMore, 7));
        assert!(!is_resumable(&failure, OperationKind::GetMore, 9));
    }

    #[test]
    fn test_configured_resumable_code() {
        let mut classifier = FailureClassifier::new();
        let failure = get_more(4242, "Custom");
        assert!(!is_resumable_with(&classifier, &failure, OperationKind::GetMore, 8));
        classifier.add_resumable_code(4242);
        assert!(is_resumable_with(&classifier, &failure, OperationKind::GetMore, 8));
        assert!(!is_resumable_with(&classifier, &failure, OperationKind::GetMore, 9));
    }

    #[test]
    fn test_record_uses_own_context() {
        let failure = get_more(91, "ShutdownInProgress").on(OperationKind::GetMore, 8);
        assert!(failure.is_change_stream_resumable());
        assert!(!failure.clone().on(OperationKind::GetMore, 9).is_change_stream_resumable());
        assert!(!failure.on(OperationKind::Other, 8).is_change_stream_resumable());
    }
}
