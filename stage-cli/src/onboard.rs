//! `stage onboard`: add agent instructions to the project's instruction file.

use crate::ui;
use serde_json::json;
use stage_core::{Output, OutputMode};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Presence of this tag means the block was already added.
pub const MARKER: &str = "<stage>";

const INSTRUCTIONS: &str = "<stage>
`stage` writes, reads and renders files in Stage, a sandboxed React runtime
that renders components live in the browser with no build step.

<commands>
- `stage new`: create a session and print its id
- `stage write <remote-path> [local-file] -s <id>`: upload a file (or stdin)
- `stage read <remote-path> -s <id>`: print a remote file
- `stage ls [dir] -s <id>`: list remote files
- `stage exec \"<command>\" -s <id>`: run a shell command (direct transport)
- `stage render [entry] -s <id>`: render an entry (default /app/App.tsx)
- `stage push <local> [remote-dir] -s <id>`: upload a directory and render it
- `stage status -s <id>`: show the last render and file versions
</commands>

<rules>
- Pass `-s <id>` on every command except `stage new`
- Add `--json` for structured output
- Remote paths are absolute, e.g. /app/App.tsx
- The entry file must default-export a React component
- STAGE_URL selects the server (default http://localhost:3000)
</rules>
</stage>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardOutcome {
    Added(PathBuf),
    AlreadyOnboarded(PathBuf),
}

/// `CLAUDE.md` wins; `AGENTS.md` is used only when it alone exists.
pub fn target_file(dir: &Path) -> PathBuf {
    let claude = dir.join("CLAUDE.md");
    let agents = dir.join("AGENTS.md");
    if !claude.exists() && agents.exists() {
        agents
    } else {
        claude
    }
}

/// Append the instruction block to the target file in `dir`, once.
pub fn onboard(dir: &Path) -> stage_core::Result<OnboardOutcome> {
    let target = target_file(dir);
    let existing = if target.exists() {
        std::fs::read_to_string(&target)?
    } else {
        String::new()
    };

    if existing.contains(MARKER) {
        return Ok(OnboardOutcome::AlreadyOnboarded(target));
    }

    let content = if existing.is_empty() {
        format!("{}\n", INSTRUCTIONS)
    } else {
        format!("{}\n\n{}\n", existing.trim_end(), INSTRUCTIONS)
    };
    std::fs::write(&target, content)?;
    tracing::debug!(file = %target.display(), "instructions added");

    Ok(OnboardOutcome::Added(target))
}

pub fn cmd_onboard(dir: &Path, mode: OutputMode, out: &mut dyn Write) -> stage_core::Result<()> {
    let outcome = onboard(dir)?;

    Output::human(|w| match &outcome {
        OnboardOutcome::Added(file) => ui::success(
            w,
            format!("Added stage instructions to {}", file.display()),
        ),
        OnboardOutcome::AlreadyOnboarded(file) => {
            ui::success(w, format!("Already onboarded ({})", file.display()))
        }
    })
    .json(|| match &outcome {
        OnboardOutcome::Added(file) => json!({ "success": true, "file": file }),
        OnboardOutcome::AlreadyOnboarded(file) => json!({
            "success": true,
            "file": file,
            "message": "already_onboarded",
        }),
    })
    .emit(mode, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: PathBuf) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_creates_claude_md() {
        let dir = TempDir::new().unwrap();

        let outcome = onboard(dir.path()).unwrap();

        assert_eq!(outcome, OnboardOutcome::Added(dir.path().join("CLAUDE.md")));
        let content = read(dir.path().join("CLAUDE.md"));
        assert!(content.starts_with(MARKER));
        assert!(content.contains("stage new"));
        assert!(content.ends_with("</stage>\n"));
    }

    #[test]
    fn test_appends_after_existing_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("CLAUDE.md"), "# My Project\n\nExisting content.\n\n").unwrap();

        onboard(dir.path()).unwrap();

        let content = read(dir.path().join("CLAUDE.md"));
        assert!(content.starts_with("# My Project\n\nExisting content.\n\n<stage>"));
    }

    #[test]
    fn test_uses_agents_md_when_only_it_exists() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "# Agents").unwrap();

        onboard(dir.path()).unwrap();

        assert!(!dir.path().join("CLAUDE.md").exists());
        let content = read(dir.path().join("AGENTS.md"));
        assert!(content.contains("# Agents"));
        assert!(content.contains(MARKER));
    }

    #[test]
    fn test_prefers_claude_md_over_agents_md() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("CLAUDE.md"), "# Claude").unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "# Agents").unwrap();

        onboard(dir.path()).unwrap();

        assert!(read(dir.path().join("CLAUDE.md")).contains(MARKER));
        assert_eq!(read(dir.path().join("AGENTS.md")), "# Agents");
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        onboard(dir.path()).unwrap();
        let first = read(dir.path().join("CLAUDE.md"));

        let outcome = onboard(dir.path()).unwrap();

        assert!(matches!(outcome, OnboardOutcome::AlreadyOnboarded(_)));
        assert_eq!(read(dir.path().join("CLAUDE.md")), first);
        assert_eq!(first.matches(MARKER).count(), 1);
    }

    #[test]
    fn test_json_output_reports_already_onboarded() {
        let dir = TempDir::new().unwrap();
        onboard(dir.path()).unwrap();

        let mut buf = Vec::new();
        cmd_onboard(dir.path(), OutputMode::Json, &mut buf).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["message"], "already_onboarded");
    }
}
