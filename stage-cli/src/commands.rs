//! One function per command. Each validates local input, makes its backend
//! call(s), and hands the result to the output dispatcher. Errors propagate
//! to `main`, which owns printing and the exit code.

use crate::ui;
use colored::Colorize;
use serde_json::json;
use stage_client::{PushRequest, StageBackend};
use stage_core::remote_path::{self, DEFAULT_ENTRY, DEFAULT_REMOTE_DIR};
use stage_core::{Output, OutputMode, SessionId, StageError, TransportConfig};
use std::io::{Read, Write};
use std::path::Path;

/// Everything a backend-bound command needs, resolved once at startup.
pub struct Context<'a> {
    pub config: &'a TransportConfig,
    pub backend: &'a dyn StageBackend,
    pub mode: OutputMode,
    pub ui_base_url: String,
}

pub fn cmd_new(ctx: &Context<'_>, out: &mut dyn Write) -> stage_core::Result<()> {
    let id = ctx.backend.create_session()?;
    let url = ctx.config.session_url(&ctx.ui_base_url, &id);

    Output::human(|w| {
        ui::success(w, format!("Session created: {}", id))?;
        ui::hint(w, format!("URL: {}", url))
    })
    .json(|| {
        json!({
            "id": id,
            "url": url,
            "backendUrl": ctx.config.base_url,
            "mode": ctx.config.deployment.as_str(),
            "transport": ctx.config.kind.as_str(),
        })
    })
    .quiet(|w| write!(w, "{}", id))
    .emit(ctx.mode, out)?;
    Ok(())
}

/// Resolve what `write` uploads: the named file, or stdin when the path is
/// `-` or omitted and stdin is piped.
pub fn read_write_content(
    local: Option<&str>,
    stdin_is_terminal: bool,
    mut stdin: impl Read,
) -> stage_core::Result<String> {
    match local {
        Some("-") => read_stdin(&mut stdin),
        None if !stdin_is_terminal => read_stdin(&mut stdin),
        Some(path) => stage_client::read_local(Path::new(path)),
        None => Err(StageError::user_input(
            "Provide a local file path or pipe content via stdin",
        )),
    }
}

fn read_stdin(stdin: &mut impl Read) -> stage_core::Result<String> {
    let mut content = Vec::new();
    stdin
        .read_to_end(&mut content)
        .map_err(|e| StageError::user_input(format!("Cannot read stdin: {}", e)))?;
    Ok(String::from_utf8_lossy(&content).into_owned())
}

pub fn cmd_write(
    ctx: &Context<'_>,
    session: &SessionId,
    remote: &str,
    content: &str,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let path = remote_path::normalize(remote);
    let receipt = ctx.backend.write_file(session, &path, content)?;
    let bytes = content.len();

    Output::human(|w| {
        let version = receipt
            .version
            .map(|v| format!(", v{}", v))
            .unwrap_or_default();
        ui::success(w, format!("{} ({} bytes{})", path, bytes, version))
    })
    .json(|| {
        json!({
            "success": true,
            "path": path,
            "bytes": bytes,
            "version": receipt.version,
            "session": session,
        })
    })
    .quiet(|_| Ok(()))
    .emit(ctx.mode, out)?;
    Ok(())
}

pub fn cmd_read(
    ctx: &Context<'_>,
    session: &SessionId,
    remote: &str,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let path = remote_path::normalize(remote);
    let file = ctx.backend.read_file(session, &path)?;

    Output::human(|w| write!(w, "{}", file.content))
        .json(|| {
            json!({
                "path": path,
                "content": file.content,
                "version": file.version,
                "session": session,
            })
        })
        .quiet(|w| write!(w, "{}", file.content))
        .emit(ctx.mode, out)?;
    Ok(())
}

/// Paths at or below `dir`, sorted and de-duplicated. Matches on whole
/// path segments, so `/app` does not include `/apple/x.ts`.
pub fn filter_listing(paths: Vec<String>, dir: &str) -> Vec<String> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    let mut filtered: Vec<String> = paths
        .into_iter()
        .filter(|p| p == dir || p.starts_with(&prefix))
        .collect();
    filtered.sort();
    filtered.dedup();
    filtered
}

pub fn cmd_ls(
    ctx: &Context<'_>,
    session: &SessionId,
    dir: Option<&str>,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let dir = remote_path::normalize(dir.unwrap_or(DEFAULT_REMOTE_DIR));
    let files = filter_listing(ctx.backend.list_files(session, &dir)?, &dir);

    Output::human(|w| {
        if files.is_empty() {
            return writeln!(w, "(empty)");
        }
        for f in &files {
            writeln!(w, "{}", f)?;
        }
        Ok(())
    })
    .json(|| {
        json!({
            "path": dir,
            "files": files,
            "count": files.len(),
            "session": session,
        })
    })
    .quiet(|w| {
        for f in &files {
            writeln!(w, "{}", f)?;
        }
        Ok(())
    })
    .emit(ctx.mode, out)?;
    Ok(())
}

/// Process exit code for a completed `exec`. The remote status is reported in
/// the output; any non-zero status collapses to the generic error code so the
/// user-input and not-found codes keep their meaning.
pub fn exec_exit_code(remote_exit_code: i32) -> i32 {
    if remote_exit_code == 0 {
        0
    } else {
        stage_core::EXIT_ERROR
    }
}

/// Returns the process exit code for the completed command.
pub fn cmd_exec(
    ctx: &Context<'_>,
    session: &SessionId,
    command: &str,
    out: &mut dyn Write,
) -> stage_core::Result<i32> {
    let result = ctx.backend.exec(session, command)?;

    Output::human(|w| {
        write!(w, "{}", result.stdout)?;
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
        if result.exit_code != 0 {
            eprintln!("{}", format!("(exit {})", result.exit_code).dimmed());
        }
        Ok(())
    })
    .json(|| {
        json!({
            "stdout": result.stdout,
            "stderr": result.stderr,
            "exitCode": result.exit_code,
            "session": session,
        })
    })
    .quiet(|w| write!(w, "{}", result.stdout))
    .emit(ctx.mode, out)?;
    Ok(exec_exit_code(result.exit_code))
}

pub fn cmd_render(
    ctx: &Context<'_>,
    session: &SessionId,
    entry: Option<&str>,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let requested = remote_path::normalize(entry.unwrap_or(DEFAULT_ENTRY));
    let result = ctx.backend.render(session, &requested)?;

    Output::human(|w| {
        ui::success(
            w,
            format!(
                "Rendered {} {}",
                result.entry,
                format!("(v{})", result.version).dimmed()
            ),
        )
    })
    .json(|| {
        json!({
            "success": true,
            "entry": result.entry,
            "version": result.version,
            "session": session,
        })
    })
    .quiet(|_| Ok(()))
    .emit(ctx.mode, out)?;
    Ok(())
}

pub fn cmd_status(
    ctx: &Context<'_>,
    session: &SessionId,
    now_ms: u64,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let status = ctx.backend.status(session)?;
    if status.session.is_none() {
        return Err(StageError::not_found(format!("Session not found: {}", session)));
    }

    Output::human(|w| {
        writeln!(w)?;
        ui::field(w, "Session", session.as_str().dimmed())?;
        writeln!(w)?;

        match &status.render {
            Some(render) => {
                let state = if render.error.is_some() {
                    "✗ Error".red()
                } else {
                    "✓ OK".green()
                };
                ui::field(w, "Status", state)?;
                ui::field(w, "Entry", &render.entry)?;
                ui::field(w, "Version", format!("v{}", render.version))?;
                if let Some(at) = render.rendered_at {
                    ui::field(w, "Rendered", ui::time_ago(now_ms, at))?;
                }
                if let Some(error) = &render.error {
                    writeln!(w)?;
                    writeln!(w, "{}", "Error:".bold())?;
                    ui::rule(w)?;
                    writeln!(w, "{}", error)?;
                    ui::rule(w)?;
                }
            }
            None => ui::field(w, "Status", "Not rendered yet".dimmed())?,
        }

        writeln!(w)?;
        ui::field(w, "Files", format!("({})", status.files.len()))?;
        for file in &status.files {
            writeln!(
                w,
                "  {} {}",
                file.path,
                format!("v{} {}b", file.version, file.size).dimmed()
            )?;
        }
        writeln!(w)
    })
    .json(|| {
        json!({
            "sessionId": session,
            "session": status.session,
            "render": status.render,
            "files": status.files,
        })
    })
    .quiet(|w| match status.render.as_ref().and_then(|r| r.error.as_ref()) {
        Some(error) => write!(w, "{}", error),
        None => write!(w, "ok"),
    })
    .emit(ctx.mode, out)?;
    Ok(())
}

pub fn cmd_push(
    ctx: &Context<'_>,
    session: &SessionId,
    request: &PushRequest<'_>,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let outcome = stage_client::push(ctx.backend, session, request)?;
    let count = outcome.files.len();
    let version = outcome.render.as_ref().map(|r| r.version);

    Output::human(|w| {
        ui::success(
            w,
            format!(
                "Pushed {} file{} to {}",
                count,
                if count == 1 { "" } else { "s" },
                outcome.target_dir
            ),
        )?;
        for path in &outcome.files {
            ui::bullet(w, path.dimmed())?;
        }
        if let Some(v) = version {
            ui::success(w, format!("Rendered {}", format!("(v{})", v).dimmed()))?;
        }
        Ok(())
    })
    .json(|| {
        json!({
            "success": true,
            "files": outcome.files,
            "count": count,
            "version": version,
            "session": session,
        })
    })
    .quiet(|_| Ok(()))
    .emit(ctx.mode, out)?;
    Ok(())
}

/// Print the resolved transport configuration. Makes no network calls.
pub fn cmd_config(
    config: &TransportConfig,
    mode: OutputMode,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let admin_key = if config.is_self_hosted() {
        config.masked_admin_key()
    } else {
        None
    };

    Output::human(|w| {
        writeln!(w, "Mode: {}", config.deployment.as_str())?;
        writeln!(w, "URL: {}", config.base_url)?;
        writeln!(w, "Transport: {}", config.kind)?;
        if let Some(key) = &admin_key {
            writeln!(w, "Admin key: {}", key)?;
        }
        Ok(())
    })
    .json(|| {
        json!({
            "mode": config.deployment.as_str(),
            "url": config.base_url,
            "transport": config.kind.as_str(),
            "adminKey": admin_key,
        })
    })
    .quiet(|w| writeln!(w, "{}", config.base_url))
    .emit(mode, out)?;
    Ok(())
}

pub fn cmd_snapshot(
    ctx: &Context<'_>,
    session: &SessionId,
    name: Option<&str>,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let id = ctx.backend.create_snapshot(session, name)?;

    Output::human(|w| {
        let label = name.map(|n| format!(" ({})", n)).unwrap_or_default();
        ui::success(w, format!("Snapshot created: {}{}", id, label))
    })
    .json(|| {
        json!({
            "success": true,
            "id": id,
            "name": name,
            "session": session,
        })
    })
    .quiet(|w| write!(w, "{}", id))
    .emit(ctx.mode, out)?;
    Ok(())
}

pub fn cmd_snapshots(
    ctx: &Context<'_>,
    session: &SessionId,
    now_ms: u64,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let snapshots = ctx.backend.snapshots(session)?;

    Output::human(|w| {
        if snapshots.is_empty() {
            return writeln!(w, "(none)");
        }
        for snap in &snapshots {
            writeln!(
                w,
                "{} {}",
                snap.name.as_deref().unwrap_or("(unnamed)"),
                ui::time_ago(now_ms, snap.created_at).dimmed()
            )?;
        }
        Ok(())
    })
    .json(|| {
        json!({
            "snapshots": snapshots,
            "count": snapshots.len(),
            "session": session,
        })
    })
    .emit(ctx.mode, out)?;
    Ok(())
}

pub fn cmd_history(
    ctx: &Context<'_>,
    session: &SessionId,
    remote: &str,
    now_ms: u64,
    out: &mut dyn Write,
) -> stage_core::Result<()> {
    let path = remote_path::normalize(remote);
    let revisions = ctx.backend.file_history(session, &path)?;

    Output::human(|w| {
        if revisions.is_empty() {
            return writeln!(w, "(no history for {})", path);
        }
        for rev in &revisions {
            let version = rev
                .version
                .map(|v| format!("v{}", v))
                .unwrap_or_else(|| "v?".to_string());
            let age = rev
                .created_at
                .map(|at| ui::time_ago(now_ms, at))
                .unwrap_or_default();
            writeln!(w, "{} {}", version, age.dimmed())?;
        }
        Ok(())
    })
    .json(|| {
        json!({
            "path": path,
            "revisions": revisions,
            "count": revisions.len(),
            "session": session,
        })
    })
    .emit(ctx.mode, out)?;
    Ok(())
}
