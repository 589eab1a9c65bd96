//! Tailing a stack's event log.
//!
//! The log is append-only and listed newest-first. Each poll round walks
//! pages from the top until it meets the boundary event: the stack resource
//! itself entering an in-progress status. Everything newer than the boundary
//! belongs to the running operation.
//!
//! Pages without a boundary are carried into the next fetch. A round that
//! runs out of pages without finding one is inconclusive and the caller
//! simply polls again.

use std::collections::HashSet;

use tracing::{debug, error};

use super::error::DeployError;
use crate::adapters::StackService;
use crate::domain::StackEvent;

/// What one poll round observed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollRound {
    /// The stack resource reached a completion status
    pub completed: bool,
    /// Events to show for this round
    pub events: Vec<StackEvent>,
}

impl PollRound {
    /// Nothing conclusive yet
    pub fn pending() -> Self {
        Self::default()
    }
}

/// Result of scanning one page for the boundary
#[derive(Debug, PartialEq)]
pub enum PageScan {
    /// The boundary is the newest event: the operation has produced nothing else yet
    NotStarted,
    /// No boundary on this page; carry everything seen so far
    Continue(Vec<StackEvent>),
    /// Boundary found; all events newer than it
    Boundary(Vec<StackEvent>),
}

/// Scan one page, threading the carry-over from earlier pages
pub fn scan_page(mut carry: Vec<StackEvent>, page: Vec<StackEvent>, page_number: u32) -> PageScan {
    match page.iter().position(StackEvent::is_boundary) {
        Some(0) if page_number == 1 => PageScan::NotStarted,
        Some(index) => {
            carry.extend(page.into_iter().take(index));
            PageScan::Boundary(carry)
        }
        None => {
            carry.extend(page);
            PageScan::Continue(carry)
        }
    }
}

/// Fail on the first fatal-status event in `events`
fn check_fatal(events: &[StackEvent], console_url: &str) -> Result<(), DeployError> {
    let Some(failed) = events.iter().find(|e| e.status.is_fatal()) else {
        return Ok(());
    };

    let reason = match &failed.status_reason {
        Some(reason) => format!("{} {}: {}", failed.logical_resource_id, failed.status, reason),
        None => format!("{} {}", failed.logical_resource_id, failed.status),
    };
    error!(resource = %failed.logical_resource_id, status = %failed.status, %reason, "Resource failed");

    Err(DeployError::DeploymentFailed {
        reason,
        console_url: console_url.to_string(),
    })
}

/// Keep only the newest event of each logical resource.
///
/// A resource whose completion is followed by a new attempt shows the
/// attempt; a resource that completed after earlier progress shows the
/// completion.
pub fn drop_superseded(slice: Vec<StackEvent>) -> Vec<StackEvent> {
    let mut seen = HashSet::new();
    slice
        .into_iter()
        .filter(|e| seen.insert(e.logical_resource_id.clone()))
        .collect()
}

/// Interpret the events of the running operation.
///
/// Fatal statuses fail immediately. If the newest event is the stack itself
/// completing, the round is complete and reports the completed resources
/// (without the stack's own entry).
pub fn evaluate_slice(
    slice: Vec<StackEvent>,
    stack_name: &str,
    console_url: &str,
) -> Result<PollRound, DeployError> {
    check_fatal(&slice, console_url)?;

    let completed = slice
        .first()
        .map_or(false, |e| e.is_stack_level() && e.status.is_complete());

    if completed {
        let events = slice
            .into_iter()
            .filter(|e| e.status.is_complete() && e.logical_resource_id != stack_name)
            .collect();
        return Ok(PollRound {
            completed: true,
            events,
        });
    }

    Ok(PollRound {
        completed: false,
        events: drop_superseded(slice),
    })
}

/// Polls the event log of one stack
pub struct EventPoller<'a> {
    service: &'a dyn StackService,
    stack_id: String,
    stack_name: String,
    page_size: u32,
    /// Where users can read the full deploy log
    console_url: String,
}

impl<'a> EventPoller<'a> {
    pub fn new(
        service: &'a dyn StackService,
        stack_id: impl Into<String>,
        stack_name: impl Into<String>,
        page_size: u32,
        console_url: impl Into<String>,
    ) -> Self {
        Self {
            service,
            stack_id: stack_id.into(),
            stack_name: stack_name.into(),
            page_size,
            console_url: console_url.into(),
        }
    }

    /// Run one poll round.
    ///
    /// Fatal events are checked page by page, so a failure on an early
    /// page aborts before later pages are fetched.
    pub async fn poll(&self) -> Result<PollRound, DeployError> {
        let mut carry = Vec::new();
        let mut page_number = 1u32;

        loop {
            let page = self
                .service
                .list_stack_events(&self.stack_id, page_number, self.page_size)
                .await?;
            let has_more = page.has_more(self.page_size);

            match scan_page(carry, page.items, page_number) {
                PageScan::NotStarted => {
                    debug!("Operation has not produced events yet");
                    return Ok(PollRound::pending());
                }
                PageScan::Boundary(slice) => {
                    debug!(page_number, events = slice.len(), "Found operation boundary");
                    return evaluate_slice(slice, &self.stack_name, &self.console_url);
                }
                PageScan::Continue(accumulated) => {
                    check_fatal(&accumulated, &self.console_url)?;

                    if !has_more {
                        debug!(page_number, "No boundary in any page, polling again later");
                        return Ok(PollRound::pending());
                    }
                    carry = accumulated;
                    page_number += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResourceStatus, STACK_RESOURCE_TYPE};

    const FUNCTION: &str = "ALIYUN::FC::Function";
    const URL: &str = "https://console/stack/cn-hangzhou";

    fn stack(status: ResourceStatus) -> StackEvent {
        StackEvent::new("demo", STACK_RESOURCE_TYPE, status)
    }

    fn res(id: &str, status: ResourceStatus) -> StackEvent {
        StackEvent::new(id, FUNCTION, status)
    }

    #[test]
    fn test_boundary_first_on_first_page_is_not_started() {
        let page = vec![stack(ResourceStatus::UpdateInProgress), res("fn", ResourceStatus::CreateComplete)];
        assert_eq!(scan_page(Vec::new(), page, 1), PageScan::NotStarted);
    }

    #[test]
    fn test_boundary_first_on_later_page_returns_carry() {
        let carry = vec![res("fn", ResourceStatus::CreateInProgress)];
        let page = vec![stack(ResourceStatus::CreateInProgress)];

        assert_eq!(
            scan_page(carry.clone(), page, 2),
            PageScan::Boundary(carry)
        );
    }

    #[test]
    fn test_slice_stops_before_boundary() {
        let page = vec![
            res("fn", ResourceStatus::CreateComplete),
            res("svc", ResourceStatus::CreateComplete),
            stack(ResourceStatus::CreateInProgress),
            res("old", ResourceStatus::UpdateComplete),
        ];

        match scan_page(Vec::new(), page, 1) {
            PageScan::Boundary(slice) => {
                let ids: Vec<_> = slice.iter().map(|e| e.logical_resource_id.as_str()).collect();
                assert_eq!(ids, vec!["fn", "svc"]);
            }
            other => panic!("unexpected scan: {other:?}"),
        }
    }

    #[test]
    fn test_completion_excludes_stack_entry() {
        let slice = vec![
            stack(ResourceStatus::CreateComplete),
            res("fn", ResourceStatus::CreateComplete),
            res("fn", ResourceStatus::CreateInProgress),
            res("svc", ResourceStatus::CreateComplete),
        ];

        let round = evaluate_slice(slice, "demo", URL).unwrap();
        assert!(round.completed);
        let ids: Vec<_> = round.events.iter().map(|e| e.logical_resource_id.as_str()).collect();
        assert_eq!(ids, vec!["fn", "svc"]);
    }

    #[test]
    fn test_progress_snapshot_shows_latest_state_per_resource() {
        let slice = vec![
            res("fn", ResourceStatus::UpdateInProgress),
            res("svc", ResourceStatus::UpdateComplete),
            res("fn", ResourceStatus::UpdateComplete),
            res("svc", ResourceStatus::UpdateInProgress),
        ];

        let round = evaluate_slice(slice, "demo", URL).unwrap();
        assert!(!round.completed);
        assert_eq!(
            round.events,
            vec![
                res("fn", ResourceStatus::UpdateInProgress),
                res("svc", ResourceStatus::UpdateComplete),
            ]
        );
    }

    #[test]
    fn test_fatal_event_fails_with_reason() {
        let slice = vec![
            res("svc", ResourceStatus::CreateComplete),
            res("fn", ResourceStatus::CreateFailed).with_reason("code too large"),
        ];

        match evaluate_slice(slice, "demo", URL) {
            Err(DeployError::DeploymentFailed { reason, console_url }) => {
                assert!(reason.contains("code too large"));
                assert_eq!(console_url, URL);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
