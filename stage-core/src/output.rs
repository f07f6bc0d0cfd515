//! Tri-modal output dispatch (json / quiet / human)
//!
//! Every command describes its output as a set of handlers and lets
//! [`Output::emit`] pick exactly one. A requested mode without a handler
//! falls through to the human handler.

use serde_json::Value;
use std::io::Write;

/// Output mode chosen by the global `--json` / `--quiet` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Human,
    Json,
    Quiet,
}

impl OutputMode {
    /// `--json` takes precedence when both flags are present.
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            Self::Json
        } else if quiet {
            Self::Quiet
        } else {
            Self::Human
        }
    }

    pub fn is_json(&self) -> bool {
        *self == Self::Json
    }
}

/// Which handler actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendered {
    Human,
    Json,
    Quiet,
}

type WriteFn<'a> = Box<dyn FnOnce(&mut dyn Write) -> std::io::Result<()> + 'a>;
type JsonFn<'a> = Box<dyn FnOnce() -> Value + 'a>;

pub struct Output<'a> {
    human: WriteFn<'a>,
    json: Option<JsonFn<'a>>,
    quiet: Option<WriteFn<'a>>,
}

impl<'a> Output<'a> {
    /// The human handler is mandatory; the others are opt-in.
    pub fn human<F>(human: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()> + 'a,
    {
        Self {
            human: Box::new(human),
            json: None,
            quiet: None,
        }
    }

    pub fn json<F>(mut self, json: F) -> Self
    where
        F: FnOnce() -> Value + 'a,
    {
        self.json = Some(Box::new(json));
        self
    }

    pub fn quiet<F>(mut self, quiet: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()> + 'a,
    {
        self.quiet = Some(Box::new(quiet));
        self
    }

    /// Run exactly one handler for `mode`, writing to `out`.
    pub fn emit(self, mode: OutputMode, out: &mut dyn Write) -> crate::Result<Rendered> {
        let rendered = match (mode, self.json, self.quiet) {
            (OutputMode::Json, Some(json), _) => {
                let value = json();
                writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
                Rendered::Json
            }
            (OutputMode::Quiet, _, Some(quiet)) => {
                quiet(out)?;
                Rendered::Quiet
            }
            _ => {
                (self.human)(out)?;
                Rendered::Human
            }
        };
        out.flush()?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_json_mode_never_runs_human() {
        let human_ran = Cell::new(false);
        let mut buf = Vec::new();
        let rendered = Output::human(|_| {
            human_ran.set(true);
            Ok(())
        })
        .json(|| json!({ "files": [], "count": 0 }))
        .emit(OutputMode::Json, &mut buf)
        .unwrap();

        assert_eq!(rendered, Rendered::Json);
        assert!(!human_ran.get());
        let parsed: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, json!({ "files": [], "count": 0 }));
        assert!(String::from_utf8(buf).unwrap().contains("\n  \"count\""));
    }

    #[test]
    fn test_quiet_without_handler_falls_through_to_human() {
        let mut buf = Vec::new();
        let rendered = Output::human(|w| writeln!(w, "hello"))
            .emit(OutputMode::Quiet, &mut buf)
            .unwrap();
        assert_eq!(rendered, Rendered::Human);
        assert_eq!(buf, b"hello\n");
    }

    #[test]
    fn test_json_without_handler_falls_through_to_human() {
        let mut buf = Vec::new();
        let rendered = Output::human(|w| write!(w, "plain"))
            .quiet(|w| write!(w, "q"))
            .emit(OutputMode::Json, &mut buf)
            .unwrap();
        assert_eq!(rendered, Rendered::Human);
        assert_eq!(buf, b"plain");
    }

    #[test]
    fn test_quiet_handler_runs_in_quiet_mode() {
        let mut buf = Vec::new();
        let rendered = Output::human(|w| write!(w, "human"))
            .json(|| json!({}))
            .quiet(|w| write!(w, "abc123"))
            .emit(OutputMode::Quiet, &mut buf)
            .unwrap();
        assert_eq!(rendered, Rendered::Quiet);
        assert_eq!(buf, b"abc123");
    }

    #[test]
    fn test_no_flags_always_human() {
        let mut buf = Vec::new();
        let rendered = Output::human(|w| write!(w, "human"))
            .json(|| json!({ "x": 1 }))
            .quiet(|w| write!(w, "q"))
            .emit(OutputMode::Human, &mut buf)
            .unwrap();
        assert_eq!(rendered, Rendered::Human);
        assert_eq!(buf, b"human");
    }

    #[test]
    fn test_mode_from_flags_prefers_json() {
        assert_eq!(OutputMode::from_flags(true, true), OutputMode::Json);
        assert_eq!(OutputMode::from_flags(false, true), OutputMode::Quiet);
        assert_eq!(OutputMode::from_flags(false, false), OutputMode::Human);
    }
}
