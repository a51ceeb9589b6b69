//! `$EDITOR` round trip through a temporary file.

use std::{env, fs, io::Write, process::Command};

use anyhow::{Context, bail};
use tempfile::Builder;

const DEFAULT_EDITOR: &str = "vi";

/// Open `$EDITOR` seeded with `initial` and return the edited text.
///
/// Returns `None` when the user leaves the buffer empty, which callers treat
/// as a cancel.
pub fn edit_text(initial: Option<&str>) -> anyhow::Result<Option<String>> {
    let mut file = Builder::new()
        .prefix("pebble-")
        .suffix(".txt")
        .tempfile()
        .context("create editor buffer")?;
    if let Some(text) = initial {
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .context("seed editor buffer")?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| DEFAULT_EDITOR.to_string());
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("EDITOR is set but blank");
    };

    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .with_context(|| format!("launch editor '{editor}'"))?;
    if !status.success() {
        bail!("editor '{editor}' exited with {status}");
    }

    let content = fs::read_to_string(file.path()).context("read editor buffer")?;
    if content.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(content.trim_end().to_string()))
    }
}
