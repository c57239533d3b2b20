//! `d2` CLI renderer.
//!
//! DESIGN
//! ======
//! One child process per request. The source goes in on stdin and the SVG
//! comes back on stdout (`d2 ... - -`), so no file is ever shared between
//! requests. The engine is passed as `--layout`; the source text is never
//! rewritten, and `d2` lets the flag override any `layout-engine` directive
//! the caller embedded.
//!
//! The child is spawned with `kill_on_drop`, so a timeout or a cancelled
//! request tears it down with the future.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{DiagramRenderer, RenderArtifact};
use crate::error::PipelineError;
use crate::options::{DiagramSource, RenderOptions};

/// Longest diagnostic forwarded from stderr.
const MAX_DIAGNOSTIC_LEN: usize = 512;

pub struct D2Cli {
    bin: String,
    timeout: Duration,
}

impl D2Cli {
    #[must_use]
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self { bin: bin.into(), timeout }
    }

    async fn run(&self, source: &str, options: &RenderOptions) -> Result<std::process::Output, PipelineError> {
        let mut child = Command::new(&self.bin)
            .args(d2_args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::Internal(format!("failed to spawn {}: {e}", self.bin)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::Internal("d2 stdin not captured".into()))?;
        let input = source.to_owned();

        // Feed stdin while draining stdout so neither pipe fills up and stalls.
        let write = async move {
            let result = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            result
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        if let Err(e) = written {
            debug!(error = %e, "d2: stdin closed early");
        }
        output.map_err(|e| PipelineError::Internal(format!("failed to wait for d2: {e}")))
    }
}

#[async_trait::async_trait]
impl DiagramRenderer for D2Cli {
    async fn render(&self, source: &DiagramSource, options: &RenderOptions) -> Result<RenderArtifact, PipelineError> {
        let started = Instant::now();
        let output = tokio::time::timeout(self.timeout, self.run(source.as_str(), options))
            .await
            .map_err(|_| PipelineError::Render(format!("d2 timed out after {:?}", self.timeout)))??;

        debug!(
            status = ?output.status,
            stdout_len = output.stdout.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "d2: finished"
        );

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let svg = String::from_utf8(output.stdout)
            .map_err(|e| PipelineError::Render(format!("d2 produced non-UTF-8 output: {e}")))?;
        if svg.trim().is_empty() {
            return Err(PipelineError::Render("d2 produced no output".into()));
        }

        Ok(RenderArtifact::new(svg))
    }
}

/// Command-line arguments for one render. Absent options are omitted so `d2`
/// applies its own defaults.
#[must_use]
pub fn d2_args(options: &RenderOptions) -> Vec<String> {
    let mut args = vec!["--layout".to_owned(), options.layout_engine.as_str().to_owned()];
    if let Some(theme) = options.theme_id {
        args.push("--theme".into());
        args.push(theme.to_string());
    }
    if let Some(sketch) = options.sketch {
        args.push(format!("--sketch={sketch}"));
    }
    args.push("-".into());
    args.push("-".into());
    args
}

/// Map a failed run's stderr to a compile or render error.
#[must_use]
pub fn classify_failure(stderr: &str) -> PipelineError {
    let detail = diagnostic(stderr);
    if stderr.to_ascii_lowercase().contains("failed to compile") {
        PipelineError::Compile(detail)
    } else {
        PipelineError::Render(detail)
    }
}

/// Condense stderr into one line, preferring `err:` lines.
fn diagnostic(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let errors: Vec<&str> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("err:").map(str::trim))
        .collect();

    let mut detail = if errors.is_empty() { lines.join("; ") } else { errors.join("; ") };
    if detail.is_empty() {
        detail = "d2 exited with an error".into();
    }
    if detail.len() > MAX_DIAGNOSTIC_LEN {
        let mut cut = MAX_DIAGNOSTIC_LEN;
        while !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
    detail
}

#[cfg(test)]
#[path = "d2_test.rs"]
mod tests;
