//! Stack Lookup Integration Tests
//!
//! Tests for paged, exact-name stack lookup.

mod common;

use common::*;
use stackdeploy::core::locate;
use stackdeploy::domain::ResourceStatus;

fn many_stacks(count: usize) -> FakeStackService {
    (0..count).fold(FakeStackService::new(), |service, i| {
        service.with_stack(
            &format!("id-{}", i),
            &format!("stack-{}", i),
            ResourceStatus::UpdateComplete,
        )
    })
}

#[tokio::test]
async fn test_locate_finds_stack_on_any_page() {
    let service = many_stacks(120);

    for (index, expected_pages) in [(0usize, 1usize), (49, 1), (50, 2), (117, 3)] {
        let before = service.calls().len();
        let found = locate(&service, &format!("stack-{}", index), 50)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.stack_id, format!("id-{}", index));
        assert_eq!(service.calls().len() - before, expected_pages);
    }
}

#[tokio::test]
async fn test_locate_missing_stack_reads_every_page() {
    let service = many_stacks(120);

    let found = locate(&service, "missing", 50).await.unwrap();

    assert!(found.is_none());
    assert_eq!(
        service.calls(),
        vec![
            Call::ListStacks { page_number: 1 },
            Call::ListStacks { page_number: 2 },
            Call::ListStacks { page_number: 3 },
        ]
    );
}

#[tokio::test]
async fn test_locate_requires_exact_name() {
    let service = FakeStackService::new().with_stack("id-1", "demo-staging", ResourceStatus::CreateComplete);

    assert!(locate(&service, STACK_NAME, 50).await.unwrap().is_none());
}

#[tokio::test]
async fn test_locate_in_empty_region() {
    let service = FakeStackService::new();

    assert!(locate(&service, STACK_NAME, 50).await.unwrap().is_none());
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_locate_with_zero_page_size_reads_one_page() {
    let service = many_stacks(3);

    let found = locate(&service, "missing", 0).await.unwrap();

    assert!(found.is_none());
    assert_eq!(service.calls(), vec![Call::ListStacks { page_number: 1 }]);
}
