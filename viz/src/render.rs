//! Output backends for DOT source.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

use crate::writer;

/// Turns DOT source into a file.
pub trait Renderer {
    /// File extension of the output, without the dot.
    fn extension(&self) -> &str;

    /// Renders `dot` into `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be produced or written.
    fn render(&self, dot: &str, path: &Path) -> Result<()>;
}

/// Writes the DOT source itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl Renderer for DotRenderer {
    fn extension(&self) -> &str {
        "dot"
    }

    fn render(&self, dot: &str, path: &Path) -> Result<()> {
        writer::write(path, dot.as_bytes())
    }
}

/// Pipes DOT source through the Graphviz `dot` program.
///
/// The source is fed on stdin, so nothing but the rendered file is left on disk.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    program: PathBuf,
    format: String,
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dot"),
            format: "pdf".to_owned(),
        }
    }
}

impl GraphvizRenderer {
    /// Renders PDF with the `dot` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses another Graphviz output format, e.g. `svg` or `png`.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Uses a specific Graphviz executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl Renderer for GraphvizRenderer {
    fn extension(&self) -> &str {
        &self.format
    }

    fn render(&self, dot: &str, path: &Path) -> Result<()> {
        writer::ensure_parent(path)?;
        let mut child = Command::new(&self.program)
            .arg(format!("-T{}", self.format))
            .arg("-o")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(dot.as_bytes())
                .with_context(|| format!("Cannot pipe graph to {}", self.program.display()))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        tracing::debug!(path = %path.display(), format = %self.format, "graph rendered");
        Ok(())
    }
}
