//! Directory sync engine behind `stage push`.
//!
//! Builds a [`PushBundle`] from a local file or directory tree, sends it as a
//! single write, then (optionally) renders the target's entry point.

use crate::backend::StageBackend;
use ignore::WalkBuilder;
use stage_core::remote_path;
use stage_core::{PushBundle, RenderResult, SessionId, StageError};
use std::ffi::OsStr;
use std::path::Path;

/// Dependency cache directory skipped at every level.
pub const EXCLUDED_DIR: &str = "node_modules";

/// Dotfiles, dot-directories and the dependency cache never leave the host.
pub fn is_excluded(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name == EXCLUDED_DIR
}

#[derive(Debug, Clone)]
pub struct PushRequest<'a> {
    pub local: &'a Path,
    /// Remote directory the tree lands under (e.g. `/app`).
    pub target_dir: String,
    /// Entry to render instead of `<target_dir>/App.tsx`.
    pub entry: Option<String>,
    pub render: bool,
}

impl<'a> PushRequest<'a> {
    pub fn new(local: &'a Path, target_dir: Option<&str>) -> Self {
        Self {
            local,
            target_dir: remote_path::normalize(target_dir.unwrap_or(remote_path::DEFAULT_REMOTE_DIR)),
            entry: None,
            render: true,
        }
    }

    pub fn entry(&self) -> String {
        self.entry
            .clone()
            .unwrap_or_else(|| remote_path::default_entry(&self.target_dir))
    }
}

#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub target_dir: String,
    /// Remote paths written, in bundle order.
    pub files: Vec<String>,
    pub render: Option<RenderResult>,
}

/// Collect the local file or tree into remote path -> content.
///
/// Fails with a user-input error when the path is missing or nothing is left
/// after exclusion. Makes no network calls.
pub fn collect_bundle(local: &Path, target_dir: &str) -> stage_core::Result<PushBundle> {
    let meta = std::fs::metadata(local)
        .map_err(|_| StageError::user_input(format!("Cannot read {}", local.display())))?;

    let mut bundle = PushBundle::new();

    if meta.is_file() {
        let name = local
            .file_name()
            .ok_or_else(|| StageError::user_input(format!("Cannot read {}", local.display())))?
            .to_string_lossy();
        bundle.insert(
            remote_path::join(target_dir, [&*name]),
            read_local(local)?,
        );
    } else if meta.is_dir() {
        let walker = WalkBuilder::new(local)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry.file_name()))
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| {
                StageError::user_input(format!("Cannot read {}: {}", local.display(), e))
            })?;
            let path = entry.path();
            if entry.depth() == 0 || !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(local).unwrap_or(path);
            bundle.insert(
                remote_path::from_relative(target_dir, relative),
                read_local(path)?,
            );
        }
    }

    if bundle.is_empty() {
        return Err(StageError::user_input("No files found"));
    }
    tracing::debug!(files = bundle.len(), target = target_dir, "push bundle collected");
    Ok(bundle)
}

/// Read a local file as text. Invalid UTF-8 is replaced, never rejected.
pub fn read_local(path: &Path) -> stage_core::Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| StageError::user_input(format!("Cannot read {}: {}", path.display(), e)))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(file = %path.display(), "non-UTF-8 content decoded lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

/// Write the bundle in one call, then render unless disabled.
///
/// No retries and no rollback: a failed render after a successful write
/// still fails the push.
pub fn push(
    backend: &dyn StageBackend,
    session: &SessionId,
    request: &PushRequest<'_>,
) -> stage_core::Result<PushOutcome> {
    let bundle = collect_bundle(request.local, &request.target_dir)?;

    backend.write_files(session, &bundle)?;

    let render = if request.render {
        Some(backend.render(session, &request.entry())?)
    } else {
        None
    };

    Ok(PushOutcome {
        target_dir: request.target_dir.clone(),
        files: bundle.into_keys().collect(),
        render,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_core::{RemoteFile, TransportKind, WriteReceipt};
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        WriteFiles(PushBundle),
        Render(String),
    }

    #[derive(Default)]
    struct RecordingBackend {
        calls: RefCell<Vec<Call>>,
        fail_render: bool,
    }

    impl StageBackend for RecordingBackend {
        fn kind(&self) -> TransportKind {
            TransportKind::Direct
        }

        fn base_url(&self) -> &str {
            "http://test"
        }

        fn create_session(&self) -> stage_core::Result<String> {
            unreachable!("push never creates sessions")
        }

        fn write_file(&self, _: &SessionId, _: &str, _: &str) -> stage_core::Result<WriteReceipt> {
            unreachable!("push writes bundles")
        }

        fn write_files(&self, _: &SessionId, bundle: &PushBundle) -> stage_core::Result<()> {
            self.calls.borrow_mut().push(Call::WriteFiles(bundle.clone()));
            Ok(())
        }

        fn read_file(&self, _: &SessionId, _: &str) -> stage_core::Result<RemoteFile> {
            unreachable!()
        }

        fn list_files(&self, _: &SessionId, _: &str) -> stage_core::Result<Vec<String>> {
            unreachable!()
        }

        fn render(&self, _: &SessionId, entry: &str) -> stage_core::Result<RenderResult> {
            self.calls.borrow_mut().push(Call::Render(entry.to_string()));
            if self.fail_render {
                return Err(StageError::http(500, "render crashed"));
            }
            Ok(RenderResult {
                entry: entry.to_string(),
                version: 3,
            })
        }
    }

    fn session() -> SessionId {
        SessionId::new("abc123").unwrap()
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("App.tsx"), "A").unwrap();
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::write(root.join("lib/util.ts"), "B").unwrap();
        dir
    }

    #[test]
    fn test_push_directory_writes_one_bundle_then_renders() {
        let dir = sample_tree();
        let backend = RecordingBackend::default();

        let outcome = push(&backend, &session(), &PushRequest::new(dir.path(), Some("/app"))).unwrap();

        let mut expected = PushBundle::new();
        expected.insert("/app/App.tsx".to_string(), "A".to_string());
        expected.insert("/app/lib/util.ts".to_string(), "B".to_string());
        assert_eq!(
            *backend.calls.borrow(),
            vec![
                Call::WriteFiles(expected),
                Call::Render("/app/App.tsx".to_string())
            ]
        );
        assert_eq!(outcome.files, vec!["/app/App.tsx", "/app/lib/util.ts"]);
        assert_eq!(outcome.render.map(|r| r.version), Some(3));
    }

    #[test]
    fn test_push_without_render_issues_single_call() {
        let dir = sample_tree();
        let backend = RecordingBackend::default();
        let mut request = PushRequest::new(dir.path(), None);
        request.render = false;

        let outcome = push(&backend, &session(), &request).unwrap();

        assert_eq!(backend.calls.borrow().len(), 1);
        assert!(matches!(backend.calls.borrow()[0], Call::WriteFiles(_)));
        assert!(outcome.render.is_none());
    }

    #[test]
    fn test_push_only_excluded_entries_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".env"), "SECRET=1").unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::create_dir_all(root.join("node_modules/react")).unwrap();
        std::fs::write(root.join("node_modules/react/index.js"), "x").unwrap();
        let backend = RecordingBackend::default();

        let err = push(&backend, &session(), &PushRequest::new(root, None)).unwrap_err();

        assert!(matches!(err, StageError::UserInput(ref m) if m == "No files found"));
        assert!(backend.calls.borrow().is_empty());
    }

    #[test]
    fn test_nested_exclusions_are_skipped() {
        let dir = sample_tree();
        let root = dir.path();
        std::fs::create_dir_all(root.join("lib/node_modules/pkg")).unwrap();
        std::fs::write(root.join("lib/node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(root.join("lib/.hidden.ts"), "x").unwrap();

        let bundle = collect_bundle(root, "/app").unwrap();
        assert_eq!(
            bundle.keys().cloned().collect::<Vec<_>>(),
            vec!["/app/App.tsx", "/app/lib/util.ts"]
        );
    }

    #[test]
    fn test_single_file_lands_under_target_dir() {
        let dir = sample_tree();
        let bundle = collect_bundle(&dir.path().join("lib/util.ts"), "/src/").unwrap();
        assert_eq!(bundle.get("/src/util.ts").map(String::as_str), Some("B"));
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn test_missing_path_is_user_input_error() {
        let dir = TempDir::new().unwrap();
        let backend = RecordingBackend::default();
        let missing = dir.path().join("nope");

        let err = push(&backend, &session(), &PushRequest::new(&missing, None)).unwrap_err();

        assert!(matches!(err, StageError::UserInput(_)));
        assert!(backend.calls.borrow().is_empty());
    }

    #[test]
    fn test_explicit_entry_is_rendered() {
        let dir = sample_tree();
        let backend = RecordingBackend::default();
        let mut request = PushRequest::new(dir.path(), Some("/site"));
        request.entry = Some("/site/lib/util.ts".to_string());

        push(&backend, &session(), &request).unwrap();

        assert_eq!(
            backend.calls.borrow().last(),
            Some(&Call::Render("/site/lib/util.ts".to_string()))
        );
    }

    #[test]
    fn test_render_failure_fails_push_after_write() {
        let dir = sample_tree();
        let backend = RecordingBackend {
            fail_render: true,
            ..Default::default()
        };

        let err = push(&backend, &session(), &PushRequest::new(dir.path(), None)).unwrap_err();

        assert!(matches!(err, StageError::Transport { status: Some(500), .. }));
        assert_eq!(backend.calls.borrow().len(), 2);
    }

    #[test]
    fn test_binary_file_does_not_abort_push() {
        let dir = sample_tree();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        std::fs::write(
            dir.path().join("public/logo.png"),
            [0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe],
        )
        .unwrap();
        let backend = RecordingBackend::default();

        let outcome = push(&backend, &session(), &PushRequest::new(dir.path(), None)).unwrap();

        assert_eq!(
            outcome.files,
            vec!["/app/App.tsx", "/app/lib/util.ts", "/app/public/logo.png"]
        );
        match &backend.calls.borrow()[0] {
            Call::WriteFiles(bundle) => {
                assert_eq!(bundle["/app/public/logo.png"], "\u{FFFD}PNG\u{FFFD}\u{FFFD}");
                assert_eq!(bundle["/app/App.tsx"], "A");
            }
            other => panic!("expected a bundle write, got {:?}", other),
        };
    }

    #[test]
    fn test_is_excluded() {
        assert!(is_excluded(OsStr::new(".git")));
        assert!(is_excluded(OsStr::new("node_modules")));
        assert!(!is_excluded(OsStr::new("App.tsx")));
        assert!(!is_excluded(OsStr::new("node_modules_backup")));
    }
}
