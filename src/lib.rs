//! opfail - operation failure classification for document database drivers
//!
//! Given one failed server operation, `opfail` tells the caller whether the
//! node stopped being the writable primary or is changing state, whether the
//! failed write or read may be resent, and whether a change stream may
//! resume. Retry counts, backoff and topology updates are left to the
//! caller.
//!
//! ```
//! use opfail::error::{OperationFailure, OperationKind};
//!
//! let failure = OperationFailure::with_code("no message", 91, "ShutdownInProgress")
//!     .on(OperationKind::GetMore, 8);
//!
//! assert!(failure.is_node_recovering());
//! assert!(failure.is_write_retryable());
//! assert!(failure.is_change_stream_resumable());
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod reply;
