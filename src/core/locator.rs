//! Lookup of an existing stack by exact name.

use tracing::debug;

use crate::adapters::{ServiceError, StackService};
use crate::domain::LocatedStack;

/// Page through the stack listing until a stack named exactly `stack_name`
/// turns up.
///
/// An absent stack is `Ok(None)`: it is the normal trigger for creating one.
pub async fn locate(
    service: &dyn StackService,
    stack_name: &str,
    page_size: u32,
) -> Result<Option<LocatedStack>, ServiceError> {
    let mut page_number = 0u32;

    loop {
        page_number += 1;
        let page = service.list_stacks(stack_name, page_number, page_size).await?;

        if let Some(stack) = page.items.iter().find(|s| s.stack_name == stack_name) {
            debug!(stack_id = %stack.stack_id, status = %stack.status, "Found stack");
            return Ok(Some(LocatedStack {
                stack_id: stack.stack_id.clone(),
                status: stack.status.clone(),
            }));
        }

        if !page.has_more(page_size) {
            debug!(stack_name, pages = page_number, "Stack not found");
            return Ok(None);
        }
    }
}
