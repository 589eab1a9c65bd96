//! Terminal confirmation prompt.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::Prompter;

/// Asks on stderr and reads the answer from stdin
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

/// Interpret a typed answer; anything but an explicit yes declines
pub fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, message: &str) -> Result<bool> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(format!("{} [y/N] ", message).as_bytes())
            .await
            .context("Failed to write prompt")?;
        stderr.flush().await.context("Failed to flush prompt")?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let answer = lines
            .next_line()
            .await
            .context("Failed to read confirmation from stdin")?
            .unwrap_or_default();

        Ok(parse_answer(&answer))
    }
}
