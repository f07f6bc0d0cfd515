//! Remote path helpers. Remote paths are absolute and `/`-separated on every host.

use std::path::{Component, Path};

/// Directory used by `ls` and `push` when none is given.
pub const DEFAULT_REMOTE_DIR: &str = "/app";
/// Entry point rendered when none is given.
pub const DEFAULT_ENTRY: &str = "/app/App.tsx";
/// File name of the default entry inside a pushed directory.
pub const ENTRY_FILE_NAME: &str = "App.tsx";

/// Ensure a remote directory or path starts with `/` and has no trailing `/`.
pub fn normalize(remote: &str) -> String {
    let trimmed = remote.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Join path segments under a remote directory.
pub fn join<'a, I>(base: &str, segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = normalize(base);
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Map a host-relative path onto the remote namespace under `base`.
///
/// Components are rejoined with `/` regardless of the host separator.
pub fn from_relative(base: &str, relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    join(base, segments.iter().map(String::as_str))
}

/// Default entry point for a pushed directory.
pub fn default_entry(target_dir: &str) -> String {
    join(target_dir, [ENTRY_FILE_NAME])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/app/"), "/app");
        assert_eq!(normalize("app"), "/app");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_join_handles_root_and_slashes() {
        assert_eq!(join("/app", ["App.tsx"]), "/app/App.tsx");
        assert_eq!(join("/app/", ["lib", "util.ts"]), "/app/lib/util.ts");
        assert_eq!(join("/", ["index.tsx"]), "/index.tsx");
        assert_eq!(join("src", ["/a/", "b.ts"]), "/src/a/b.ts");
    }

    #[test]
    fn test_from_relative_uses_forward_slashes() {
        let rel: PathBuf = ["lib", "nested", "util.ts"].iter().collect();
        assert_eq!(from_relative("/app", &rel), "/app/lib/nested/util.ts");
    }

    #[test]
    fn test_default_entry() {
        assert_eq!(default_entry("/app"), DEFAULT_ENTRY);
        assert_eq!(default_entry("/site/"), "/site/App.tsx");
    }
}
