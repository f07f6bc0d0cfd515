//! Stage Core - shared types for the Stage sandbox CLI
//!
//! Error taxonomy, transport configuration resolution, the session data
//! model, remote path helpers and the output dispatcher.

pub mod config;
pub mod error;
pub mod output;
pub mod remote_path;
pub mod session;

pub use config::{ConfigOverride, Deployment, TransportConfig, TransportKind};
pub use error::{ErrorEnvelope, StageError, EXIT_ERROR, EXIT_NOT_FOUND, EXIT_USER_ERROR};
pub use output::{Output, OutputMode, Rendered};
pub use session::{
    ExecOutput, FileEntry, FileRevision, PushBundle, RemoteFile, RenderResult, RenderState,
    SessionId, SessionInfo, SnapshotInfo, StatusSnapshot, WriteReceipt,
};

/// Result type alias for stage operations
pub type Result<T> = std::result::Result<T, StageError>;
