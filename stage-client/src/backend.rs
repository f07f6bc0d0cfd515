//! The backend contract shared by both transports.
//!
//! Commands only ever see `dyn StageBackend`; which wire strategy sits behind
//! it is decided once, from the resolved [`TransportConfig`].

use crate::direct::DirectTransport;
use crate::rpc::RpcTransport;
use stage_core::{
    ExecOutput, FileRevision, PushBundle, RemoteFile, RenderResult, SessionId, SnapshotInfo,
    StageError, StatusSnapshot, TransportConfig, TransportKind, WriteReceipt,
};

pub trait StageBackend {
    fn kind(&self) -> TransportKind;

    fn base_url(&self) -> &str;

    /// Create a session and return its id. The only call without a session.
    fn create_session(&self) -> stage_core::Result<String>;

    fn write_file(
        &self,
        session: &SessionId,
        path: &str,
        content: &str,
    ) -> stage_core::Result<WriteReceipt>;

    /// Write every entry of `bundle` in a single request.
    fn write_files(&self, session: &SessionId, bundle: &PushBundle) -> stage_core::Result<()>;

    /// Read one file. Absence is reported as [`StageError::NotFound`].
    fn read_file(&self, session: &SessionId, path: &str) -> stage_core::Result<RemoteFile>;

    /// Remote file paths at or below `dir`. Callers still filter and sort.
    fn list_files(&self, session: &SessionId, dir: &str) -> stage_core::Result<Vec<String>>;

    fn render(&self, session: &SessionId, entry: &str) -> stage_core::Result<RenderResult>;

    fn exec(&self, _session: &SessionId, _command: &str) -> stage_core::Result<ExecOutput> {
        Err(StageError::unsupported(
            "exec",
            self.kind().as_str(),
            "Use 'stage ls' to list files, or 'stage read' / 'stage write' to work with files directly.",
        ))
    }

    fn status(&self, _session: &SessionId) -> stage_core::Result<StatusSnapshot> {
        Err(StageError::unsupported(
            "status",
            self.kind().as_str(),
            "Use 'stage ls' and 'stage read' to inspect the session, or pass --transport rpc.",
        ))
    }

    fn create_snapshot(
        &self,
        _session: &SessionId,
        _name: Option<&str>,
    ) -> stage_core::Result<String> {
        Err(snapshots_unsupported(self.kind()))
    }

    fn snapshots(&self, _session: &SessionId) -> stage_core::Result<Vec<SnapshotInfo>> {
        Err(snapshots_unsupported(self.kind()))
    }

    fn file_history(
        &self,
        _session: &SessionId,
        _path: &str,
    ) -> stage_core::Result<Vec<FileRevision>> {
        Err(StageError::unsupported(
            "history",
            self.kind().as_str(),
            "File history is only kept by the query backend; pass --transport rpc.",
        ))
    }
}

fn snapshots_unsupported(kind: TransportKind) -> StageError {
    StageError::unsupported(
        "snapshot",
        kind.as_str(),
        "Snapshots are only kept by the query backend; pass --transport rpc.",
    )
}

/// Build the backend selected by `config.kind`.
pub fn connect(config: &TransportConfig) -> stage_core::Result<Box<dyn StageBackend>> {
    let backend: Box<dyn StageBackend> = match config.kind {
        TransportKind::Direct => Box::new(DirectTransport::new(config)?),
        TransportKind::Rpc => Box::new(RpcTransport::new(config)?),
    };
    tracing::debug!(
        transport = %config.kind,
        base_url = %config.base_url,
        mode = config.deployment.as_str(),
        "backend selected"
    );
    Ok(backend)
}

/// Blocking HTTP client with no request timeout; a hung call hangs the command.
pub(crate) fn http_client() -> stage_core::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(None::<std::time::Duration>)
        .build()
        .map_err(|e| StageError::transport(format!("Failed to build HTTP client: {}", e)))
}

/// Map a reqwest send failure to a transport error.
pub(crate) fn connection_error(base_url: &str, err: reqwest::Error) -> StageError {
    StageError::transport(format!("Cannot reach {}: {}", base_url, err))
}

/// Map a body decode failure to a transport error.
pub(crate) fn decode_error(err: impl std::fmt::Display) -> StageError {
    StageError::transport(format!("Unexpected response from service: {}", err))
}
