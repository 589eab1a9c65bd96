//! Subprocess packager for function source.
//!
//! Zipping and uploading code is delegated to an external command. The
//! command runs in the template's base directory and receives the source
//! location on its command line:
//!
//! ```text
//! <program> [args...] --code-uri <uri> [--runtime <runtime>] [--template <path>]
//! ```
//!
//! It must print a JSON object `{"bucket": "...", "object_name": "..."}` on
//! stdout.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{CodePackager, PackageRequest, PackagedCode};

/// Packager that shells out to a configured command
pub struct CommandPackager {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PackagerOutput {
    bucket: String,
    #[serde(default)]
    object_name: Option<String>,
}

impl CommandPackager {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from a shell-style command line, split on whitespace
    pub fn from_command_line(command: &str, timeout: Duration) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .context("Packager command is empty")?;

        Ok(Self::new(program, parts.collect(), timeout))
    }

    fn command_args(&self, request: &PackageRequest) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--code-uri".to_string());
        args.push(request.code_uri.clone());

        if let Some(runtime) = &request.runtime {
            args.push("--runtime".to_string());
            args.push(runtime.clone());
        }
        if let Some(path) = &request.template_path {
            args.push("--template".to_string());
            args.push(path.display().to_string());
        }
        args
    }
}

#[async_trait]
impl CodePackager for CommandPackager {
    async fn package(&self, request: &PackageRequest) -> Result<PackagedCode> {
        let args = self.command_args(request);
        debug!(program = %self.program, ?args, "Running packager");

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(&request.base_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn packager '{}'", self.program))?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Packaging '{}' timed out after {:?}",
                    request.code_uri, self.timeout
                )
            })?
            .with_context(|| format!("Failed to wait for packager '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Packager failed for '{}' with exit code {}: {}",
                request.code_uri,
                exit_code,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8(output.stdout).context("Packager output is not valid UTF-8")?;
        let parsed: PackagerOutput = serde_json::from_str(stdout.trim())
            .with_context(|| format!("Failed to parse packager output: {}", stdout.trim()))?;

        Ok(PackagedCode {
            bucket: parsed.bucket,
            object_name: parsed.object_name.filter(|name| !name.is_empty()),
        })
    }
}

/// Packager used when no command is configured; any function that needs
/// packaging fails the deployment
#[derive(Debug, Default)]
pub struct UnconfiguredPackager;

#[async_trait]
impl CodePackager for UnconfiguredPackager {
    async fn package(&self, request: &PackageRequest) -> Result<PackagedCode> {
        anyhow::bail!(
            "CodeUri '{}' needs packaging but no packager is configured (set paths.packager)",
            request.code_uri
        )
    }
}
