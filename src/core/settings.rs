//! Tunables for a deployment.
//!
//! Controls paging, polling cadence and the limits that keep a deployment
//! from waiting forever:
//! - Page sizes for stack and event listings
//! - Poll intervals for diffs, events and deletions
//! - Execute retry policy
//! - Optional overall poll timeout

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Stacks per `ListStacks` page (default: 50)
    #[serde(default = "default_page_size")]
    pub stack_page_size: u32,

    /// Events per `ListStackEvents` page (default: 50)
    #[serde(default = "default_page_size")]
    pub event_page_size: u32,

    /// Delay before each change set diff poll (default: 500ms)
    #[serde(default = "default_change_set_poll_interval")]
    pub change_set_poll_interval_ms: u64,

    /// Diff polls before giving up (default: 240)
    #[serde(default = "default_change_set_max_polls")]
    pub change_set_max_polls: u32,

    /// Delay between event poll rounds (default: 2s)
    #[serde(default = "default_event_poll_interval")]
    pub event_poll_interval_ms: u64,

    /// Delay between stack status checks while deleting (default: 500ms)
    #[serde(default = "default_delete_poll_interval")]
    pub delete_poll_interval_ms: u64,

    /// Give up on event polling after this long (default: never)
    #[serde(default)]
    pub poll_timeout_seconds: Option<u64>,

    /// Server-side execution timeout sent with change sets (default: 10)
    #[serde(default = "default_timeout_in_minutes")]
    pub timeout_in_minutes: u32,

    /// Delete-and-redeploy rounds allowed per deployment (default: 3)
    #[serde(default = "default_max_redeploys")]
    pub max_redeploys: u32,

    /// Console page for deploy logs; `{region}` is substituted
    #[serde(default = "default_console_url")]
    pub console_url: String,

    /// Retry policy for executing a change set whose stack is still creating
    #[serde(default)]
    pub execute_retry: RetryPolicy,
}

fn default_page_size() -> u32 {
    50
}
fn default_change_set_poll_interval() -> u64 {
    500
}
fn default_change_set_max_polls() -> u32 {
    240
} // 2 min at the default interval
fn default_event_poll_interval() -> u64 {
    2000
}
fn default_delete_poll_interval() -> u64 {
    500
}
fn default_timeout_in_minutes() -> u32 {
    10
}
fn default_max_redeploys() -> u32 {
    3
}
fn default_console_url() -> String {
    "https://ros.console.aliyun.com/#/stack/{region}".to_string()
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            stack_page_size: default_page_size(),
            event_page_size: default_page_size(),
            change_set_poll_interval_ms: default_change_set_poll_interval(),
            change_set_max_polls: default_change_set_max_polls(),
            event_poll_interval_ms: default_event_poll_interval(),
            delete_poll_interval_ms: default_delete_poll_interval(),
            poll_timeout_seconds: None,
            timeout_in_minutes: default_timeout_in_minutes(),
            max_redeploys: default_max_redeploys(),
            console_url: default_console_url(),
            execute_retry: RetryPolicy::default(),
        }
    }
}

impl DeploySettings {
    /// Settings with every delay set to zero, for driving fakes
    pub fn immediate() -> Self {
        Self {
            change_set_poll_interval_ms: 0,
            event_poll_interval_ms: 0,
            delete_poll_interval_ms: 0,
            execute_retry: RetryPolicy::fixed(RetryPolicy::default().max_attempts, Duration::ZERO),
            ..Default::default()
        }
    }

    /// Console page for `region`
    pub fn console_url_for(&self, region: &str) -> String {
        self.console_url.replace("{region}", region)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn delete_poll_interval(&self) -> Duration {
        Duration::from_millis(self.delete_poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_seconds.map(Duration::from_secs)
    }

    /// Reject values that would make paging never terminate
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stack_page_size == 0 {
            anyhow::bail!("deploy.stack_page_size must be at least 1");
        }
        if self.event_page_size == 0 {
            anyhow::bail!("deploy.event_page_size must be at least 1");
        }
        Ok(())
    }
}
