//! Integration tests for Project CRUD operations.
//!
//! Tests cover:
//! - Creating projects and reading them back
//! - Patching single fields
//! - Missing ids on get, update and delete
//! - Index lookups
//! - Persistence across close/reopen

mod common;

use common::*;

#[tokio::test]
async fn test_create_and_retrieve_project() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;

    let new_project = NewProject {
        name: "Checkout".to_string(),
        description: Some("Payment flow".to_string()),
    };
    let created = store.add_project(&new_project).await?;

    assert!(created.id > 0, "Project should have positive ID");
    assert_eq!(created.name, new_project.name);
    assert_eq!(created.description, new_project.description);
    assert!(created.created_at > 0, "Store should stamp created_at");

    let fetched = store.get_project(created.id).await?;
    assert_eq!(fetched.as_ref(), Some(&created));

    let projects: Vec<Project> = store.get_projects().await?;
    assert_eq!(projects, vec![created]);

    Ok(())
}

#[tokio::test]
async fn test_update_project_leaves_other_fields() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let before = store
        .add_project(&NewProject {
            name: "Checkout".to_string(),
            description: Some("Payment flow".to_string()),
        })
        .await?;

    let patch = ProjectPatch {
        name: Some("Checkout v2".to_string()),
        ..Default::default()
    };
    let after = store.update_project(before.id, &patch).await?;

    assert_eq!(after.name, "Checkout v2");
    assert_eq!(after.id, before.id);
    assert_eq!(after.description, before.description);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(store.get_project(before.id).await?, Some(after));

    // Clearing an optional field
    let cleared = store
        .update_project(
            before.id,
            &ProjectPatch {
                description: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.name, "Checkout v2");

    Ok(())
}

#[tokio::test]
async fn test_missing_project() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;

    assert_eq!(store.get_project(42).await?, None);

    let patch = ProjectPatch {
        name: Some("Ghost".to_string()),
        ..Default::default()
    };
    let result = store.update_project(42, &patch).await;
    assert!(
        matches!(result, Err(StoreError::NotFound { collection: "projects", id: 42 })),
        "Updating a missing project should report NotFound, got {:?}",
        result
    );

    // An empty patch is still checked against the store
    let result = store.update_project(42, &ProjectPatch::default()).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));

    // Deleting is idempotent
    assert!(!store.delete_project(42).await?);

    Ok(())
}

#[tokio::test]
async fn test_query_projects_by_index() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let checkout = store.add_project(&make_project("Checkout")).await?;
    let _account = store.add_project(&make_project("Account")).await?;
    let checkout_again = store.add_project(&make_project("Checkout")).await?;

    let found = store
        .query_projects(&ProjectIndex::Name("Checkout".to_string()))
        .await?;
    let ids: Vec<i64> = found.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![checkout.id, checkout_again.id]);

    let by_time = store
        .query_projects(&ProjectIndex::CreatedAt(checkout.created_at))
        .await?;
    assert!(by_time.iter().any(|p| p.id == checkout.id));

    let none = store
        .query_projects(&ProjectIndex::Name("Nope".to_string()))
        .await?;
    assert!(none.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_project_ids_are_not_reused() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let first = store.add_project(&make_project("First")).await?;
    let second = store.add_project(&make_project("Second")).await?;
    assert!(store.delete_project(second.id).await?);

    let third = store.add_project(&make_project("Third")).await?;
    assert!(third.id > second.id);
    assert!(second.id > first.id);

    Ok(())
}

#[tokio::test]
async fn test_project_persists_after_close() -> anyhow::Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let path = temp_dir.path().join("persist_test.db");

    let created = {
        let store: Store = Store::open(&path).await?;
        let created = store.add_project(&make_project("Persistent")).await?;
        store.close().await?;
        created
    };

    let store: Store = Store::open(&path).await?;
    let projects = store.get_projects().await?;
    assert_eq!(projects, vec![created]);

    Ok(())
}

#[tokio::test]
async fn test_closed_store_rejects_operations() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    store.close().await?;
    // Closing twice is fine
    store.close().await?;

    let result = store.get_projects().await;
    assert!(result.is_err(), "Closed store should not serve queries");

    Ok(())
}
