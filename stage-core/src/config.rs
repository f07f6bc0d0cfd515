//! Transport configuration for stage
//!
//! Resolution is a pure function of an explicit override, an environment
//! lookup and the built-in defaults. The CLI resolves once at startup and
//! passes the result by reference into every command.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Default base URL of a local self-hosted query backend.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:3210";
/// Default base URL of the direct Stage server (also serves the UI).
pub const DEFAULT_STAGE_URL: &str = "http://localhost:3000";

pub const ENV_STAGE_URL: &str = "STAGE_URL";
pub const ENV_PUBLIC_STAGE_URL: &str = "NEXT_PUBLIC_STAGE_URL";
pub const ENV_CLOUD_URL: &str = "CONVEX_URL";
pub const ENV_SELF_HOSTED_URL: &str = "CONVEX_SELF_HOSTED_URL";
pub const ENV_SELF_HOSTED_ADMIN_KEY: &str = "CONVEX_SELF_HOSTED_ADMIN_KEY";

/// Which wire strategy talks to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// REST-style `/api/stage/*` endpoints with a session header.
    Direct,
    /// `/api/mutation` + `/api/query` with a `{status, value}` envelope.
    #[default]
    Rpc,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Rpc => "rpc",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "http" => Ok(Self::Direct),
            "rpc" | "convex" => Ok(Self::Rpc),
            other => Err(format!(
                "unknown transport '{}' (expected 'direct' or 'rpc')",
                other
            )),
        }
    }
}

/// Where the backend is hosted; decides whether an admin key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deployment {
    Cloud,
    SelfHosted,
}

impl Deployment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::SelfHosted => "self-hosted",
        }
    }
}

/// Values supplied explicitly by the caller (`--url`, `--admin-key`). Highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverride {
    pub url: Option<String>,
    /// Used with an overridden URL or a self-hosted deployment; never sent to cloud.
    pub admin_key: Option<String>,
}

impl ConfigOverride {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            admin_key: None,
        }
    }
}

/// The single active transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub base_url: String,
    pub admin_key: Option<String>,
    pub deployment: Deployment,
    pub kind: TransportKind,
}

impl TransportConfig {
    /// Resolve against the process environment.
    pub fn resolve(kind: TransportKind, overrides: &ConfigOverride) -> Self {
        Self::resolve_with(kind, overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup. First match wins.
    pub fn resolve_with<F>(kind: TransportKind, overrides: &ConfigOverride, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = overrides.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Self::new(url, overrides.admin_key.clone(), Deployment::SelfHosted, kind);
        }

        match kind {
            TransportKind::Direct => {
                let url = env(ENV_STAGE_URL).unwrap_or_else(|| DEFAULT_STAGE_URL.to_string());
                Self::new(&url, None, Deployment::SelfHosted, kind)
            }
            TransportKind::Rpc => {
                if let Some(url) = env(ENV_CLOUD_URL) {
                    return Self::new(&url, None, Deployment::Cloud, kind);
                }
                if let Some(url) = env(ENV_SELF_HOSTED_URL) {
                    let key = overrides
                        .admin_key
                        .clone()
                        .or_else(|| env(ENV_SELF_HOSTED_ADMIN_KEY));
                    return Self::new(&url, key, Deployment::SelfHosted, kind);
                }
                Self::new(DEFAULT_RPC_URL, None, Deployment::SelfHosted, kind)
            }
        }
    }

    fn new(
        url: &str,
        admin_key: Option<String>,
        deployment: Deployment,
        kind: TransportKind,
    ) -> Self {
        Self {
            base_url: url.trim().trim_end_matches('/').to_string(),
            admin_key,
            deployment,
            kind,
        }
    }

    pub fn is_self_hosted(&self) -> bool {
        self.deployment == Deployment::SelfHosted
    }

    /// The `Authorization` header value, sent only to self-hosted backends.
    pub fn authorization(&self) -> Option<String> {
        match (&self.deployment, &self.admin_key) {
            (Deployment::SelfHosted, Some(key)) => Some(format!("Convex {}", key)),
            _ => None,
        }
    }

    /// Admin key shortened for display.
    pub fn masked_admin_key(&self) -> Option<String> {
        self.admin_key.as_ref().map(|key| {
            let visible: String = key.chars().take(20).collect();
            format!("{}...", visible)
        })
    }

    /// Base URL of the Stage UI used to build session links.
    pub fn ui_base_url(&self) -> String {
        self.ui_base_url_with(|key| std::env::var(key).ok())
    }

    pub fn ui_base_url_with<F>(&self, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let url = env(ENV_STAGE_URL)
            .or_else(|| match self.deployment {
                Deployment::Cloud => env(ENV_PUBLIC_STAGE_URL),
                Deployment::SelfHosted => None,
            })
            .unwrap_or_else(|| DEFAULT_STAGE_URL.to_string());
        url.trim_end_matches('/').to_string()
    }

    /// Browser link for a session.
    pub fn session_url(&self, ui_base: &str, session_id: &str) -> String {
        format!("{}/s/{}", ui_base.trim_end_matches('/'), session_id)
    }
}
