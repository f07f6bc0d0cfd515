//! Remote-call transport: every operation is a named function invoked through
//! `/api/mutation` or `/api/query`, answered with a `{status, value}` envelope.

use crate::backend::{connection_error, decode_error, http_client, StageBackend};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use stage_core::{
    FileRevision, PushBundle, RemoteFile, RenderResult, SessionId, SnapshotInfo, StageError,
    StatusSnapshot, TransportConfig, TransportKind, WriteReceipt,
};

/// Namespace prefixed to every function path.
const FUNCTION_NAMESPACE: &str = "stage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Mutation,
    Query,
}

impl Endpoint {
    fn path(&self) -> &'static str {
        match self {
            Self::Mutation => "/api/mutation",
            Self::Query => "/api/query",
        }
    }
}

pub struct RpcTransport {
    base_url: String,
    authorization: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct FunctionCall<'a> {
    path: String,
    args: &'a Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    status: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct ListedFile {
    path: String,
}

impl RpcTransport {
    pub fn new(config: &TransportConfig) -> stage_core::Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: config.authorization(),
            client: http_client()?,
        })
    }

    pub fn mutation<T: DeserializeOwned>(&self, name: &str, args: Value) -> stage_core::Result<T> {
        self.call(Endpoint::Mutation, name, args)
    }

    pub fn query<T: DeserializeOwned>(&self, name: &str, args: Value) -> stage_core::Result<T> {
        self.call(Endpoint::Query, name, args)
    }

    fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        name: &str,
        args: Value,
    ) -> stage_core::Result<T> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let function = format!("{}:{}", FUNCTION_NAMESPACE, name);
        tracing::debug!(url = %url, function = %function, "stage call");

        let mut req = self.client.post(&url).json(&FunctionCall {
            path: function,
            args: &args,
        });
        if let Some(auth) = &self.authorization {
            req = req.header(reqwest::header::AUTHORIZATION, auth);
        }
        let resp = req
            .send()
            .map_err(|e| connection_error(&self.base_url, e))?;

        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "stage response");
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(StageError::http(status.as_u16(), body));
        }

        let envelope: ResponseEnvelope = resp.json().map_err(decode_error)?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(envelope: ResponseEnvelope) -> stage_core::Result<T> {
    if envelope.status == "error" {
        return Err(StageError::transport(
            envelope
                .error_message
                .unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }
    serde_json::from_value(envelope.value).map_err(decode_error)
}

fn session_args(session: &SessionId) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("sessionId".to_string(), json!(session.as_str()));
    args
}

impl StageBackend for RpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rpc
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn create_session(&self) -> stage_core::Result<String> {
        self.mutation("createSession", json!({}))
    }

    fn write_file(
        &self,
        session: &SessionId,
        path: &str,
        content: &str,
    ) -> stage_core::Result<WriteReceipt> {
        let mut args = session_args(session);
        args.insert("path".to_string(), json!(path));
        args.insert("content".to_string(), json!(content));
        self.mutation("writeFile", Value::Object(args))
    }

    fn write_files(&self, session: &SessionId, bundle: &PushBundle) -> stage_core::Result<()> {
        let mut args = session_args(session);
        args.insert("files".to_string(), json!(bundle));
        let _: Value = self.mutation("writeFiles", Value::Object(args))?;
        Ok(())
    }

    fn read_file(&self, session: &SessionId, path: &str) -> stage_core::Result<RemoteFile> {
        let mut args = session_args(session);
        args.insert("path".to_string(), json!(path));
        let file: Option<RemoteFile> = self.query("readFile", Value::Object(args))?;
        file.ok_or_else(|| StageError::not_found(format!("File not found: {}", path)))
    }

    /// The query backend has no directory listing; every file is returned.
    fn list_files(&self, session: &SessionId, _dir: &str) -> stage_core::Result<Vec<String>> {
        let files: Vec<ListedFile> = self.query("getAllFiles", Value::Object(session_args(session)))?;
        Ok(files.into_iter().map(|f| f.path).collect())
    }

    fn render(&self, session: &SessionId, entry: &str) -> stage_core::Result<RenderResult> {
        let mut args = session_args(session);
        args.insert("entry".to_string(), json!(entry));
        self.mutation("triggerRender", Value::Object(args))
    }

    fn status(&self, session: &SessionId) -> stage_core::Result<StatusSnapshot> {
        let status: Option<StatusSnapshot> =
            self.query("getStatus", Value::Object(session_args(session)))?;
        status.ok_or_else(|| StageError::not_found(format!("Session not found: {}", session)))
    }

    fn create_snapshot(&self, session: &SessionId, name: Option<&str>) -> stage_core::Result<String> {
        let mut args = session_args(session);
        if let Some(name) = name {
            args.insert("name".to_string(), json!(name));
        }
        self.mutation("createSnapshot", Value::Object(args))
    }

    fn snapshots(&self, session: &SessionId) -> stage_core::Result<Vec<SnapshotInfo>> {
        self.query("getSnapshots", Value::Object(session_args(session)))
    }

    fn file_history(&self, session: &SessionId, path: &str) -> stage_core::Result<Vec<FileRevision>> {
        let mut args = session_args(session);
        args.insert("path".to_string(), json!(path));
        self.query("getFileHistory", Value::Object(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(raw: Value) -> ResponseEnvelope {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_success_envelope_unwraps_value() {
        let value: RenderResult = unwrap_envelope(envelope(json!({
            "status": "success",
            "value": { "entry": "/app/App.tsx", "version": 7 }
        })))
        .unwrap();
        assert_eq!(value.version, 7);
    }

    #[test]
    fn test_error_envelope_carries_error_message() {
        let err = unwrap_envelope::<Value>(envelope(json!({
            "status": "error",
            "errorMessage": "Session expired"
        })))
        .unwrap_err();
        assert!(matches!(err, StageError::Transport { status: None, .. }));
        assert_eq!(err.to_string(), "Session expired");
    }

    #[test]
    fn test_error_envelope_without_message() {
        let err = unwrap_envelope::<Value>(envelope(json!({ "status": "error" }))).unwrap_err();
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn test_null_value_decodes_as_none() {
        let file: Option<RemoteFile> =
            unwrap_envelope(envelope(json!({ "status": "success", "value": null }))).unwrap();
        assert!(file.is_none());
        let file: Option<RemoteFile> =
            unwrap_envelope(envelope(json!({ "status": "success" }))).unwrap();
        assert!(file.is_none());
    }

    #[test]
    fn test_authorization_only_for_self_hosted_with_key() {
        let mut config = TransportConfig {
            base_url: "http://127.0.0.1:3210".to_string(),
            admin_key: Some("key".to_string()),
            deployment: stage_core::Deployment::SelfHosted,
            kind: TransportKind::Rpc,
        };
        let transport = RpcTransport::new(&config).unwrap();
        assert_eq!(transport.authorization.as_deref(), Some("Convex key"));

        config.deployment = stage_core::Deployment::Cloud;
        let transport = RpcTransport::new(&config).unwrap();
        assert!(transport.authorization.is_none());
    }
}
