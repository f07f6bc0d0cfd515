//! Direct transport: REST-style `/api/stage/*` endpoints on the Stage server.

use crate::backend::{connection_error, decode_error, http_client, StageBackend};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stage_core::{
    ExecOutput, PushBundle, RemoteFile, RenderResult, SessionId, StageError, TransportConfig,
    TransportKind, WriteReceipt,
};
use std::collections::BTreeMap;

/// Header carrying the session id on every session-scoped request.
pub const SESSION_HEADER: &str = "X-Stage-Session";

pub struct DirectTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    id: String,
}

#[derive(Serialize)]
struct WriteFilesRequest<'a> {
    files: &'a PushBundle,
}

#[derive(Deserialize)]
struct ReadFileResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    entry: &'a str,
}

#[derive(Deserialize)]
struct RenderResponse {
    #[serde(default)]
    entry: Option<String>,
    version: u64,
}

#[derive(Serialize)]
struct ExecRequest<'a> {
    command: &'a str,
}

impl DirectTransport {
    pub fn new(config: &TransportConfig) -> stage_core::Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }

    /// `POST {base}{path}` with a JSON body.
    pub fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        session: Option<&SessionId>,
    ) -> stage_core::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = "POST", url = %url, session = ?session.map(SessionId::as_str), "stage request");

        let mut req = self.client.post(&url).json(body);
        if let Some(session) = session {
            req = req.header(SESSION_HEADER, session.as_str());
        }
        let resp = req
            .send()
            .map_err(|e| connection_error(&self.base_url, e))?;
        Self::finish(resp)
    }

    /// `GET {base}{path}?{query}`.
    pub fn get<T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        session: Option<&SessionId>,
    ) -> stage_core::Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = "GET", url = %url, session = ?session.map(SessionId::as_str), "stage request");

        let mut req = self.client.get(&url).query(query);
        if let Some(session) = session {
            req = req.header(SESSION_HEADER, session.as_str());
        }
        let resp = req
            .send()
            .map_err(|e| connection_error(&self.base_url, e))?;
        Self::finish(resp)
    }

    fn finish<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> stage_core::Result<T> {
        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "stage response");

        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(StageError::http(status.as_u16(), body));
        }
        resp.json::<T>().map_err(decode_error)
    }
}

impl StageBackend for DirectTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn create_session(&self) -> stage_core::Result<String> {
        let resp: CreateSessionResponse =
            self.post("/api/stage/sessions", &serde_json::json!({}), None)?;
        Ok(resp.id)
    }

    fn write_file(
        &self,
        session: &SessionId,
        path: &str,
        content: &str,
    ) -> stage_core::Result<WriteReceipt> {
        let mut bundle = BTreeMap::new();
        bundle.insert(path.to_string(), content.to_string());
        self.write_files(session, &bundle)?;
        Ok(WriteReceipt {
            path: path.to_string(),
            version: None,
            size: None,
        })
    }

    fn write_files(&self, session: &SessionId, bundle: &PushBundle) -> stage_core::Result<()> {
        let _: serde_json::Value = self.post(
            "/api/stage/files",
            &WriteFilesRequest { files: bundle },
            Some(session),
        )?;
        Ok(())
    }

    fn read_file(&self, session: &SessionId, path: &str) -> stage_core::Result<RemoteFile> {
        let resp: ReadFileResponse =
            match self.get("/api/stage/files", &[("path", path)], Some(session)) {
                Err(StageError::Transport {
                    status: Some(404), ..
                }) => return Err(StageError::not_found(format!("File not found: {}", path))),
                other => other?,
            };

        match (resp.error, resp.content) {
            (None, Some(content)) => Ok(RemoteFile {
                path: path.to_string(),
                content,
                version: resp.version,
            }),
            _ => Err(StageError::not_found(format!("File not found: {}", path))),
        }
    }

    /// Lists by running `find` in the session's shell.
    fn list_files(&self, session: &SessionId, dir: &str) -> stage_core::Result<Vec<String>> {
        let command = format!("find {} -type f", shell_quote(dir));
        let output = self.exec(session, &command)?;
        if output.exit_code != 0 {
            tracing::debug!(exit_code = output.exit_code, stderr = %output.stderr, "find exited non-zero");
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn render(&self, session: &SessionId, entry: &str) -> stage_core::Result<RenderResult> {
        let resp: RenderResponse =
            self.post("/api/stage/render", &RenderRequest { entry }, Some(session))?;
        Ok(RenderResult {
            entry: resp.entry.unwrap_or_else(|| entry.to_string()),
            version: resp.version,
        })
    }

    fn exec(&self, session: &SessionId, command: &str) -> stage_core::Result<ExecOutput> {
        self.post("/api/stage/exec", &ExecRequest { command }, Some(session))
    }
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
