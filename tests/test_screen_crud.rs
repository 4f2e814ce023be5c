//! Integration tests for Screen CRUD operations.
//!
//! Tests cover:
//! - Order assignment from the sibling count
//! - Gaps left behind by deletion
//! - Sorted listing and manual reordering
//! - Patching and index lookups

mod common;

use common::*;

#[tokio::test]
async fn test_create_and_retrieve_screen() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let project = store.add_project(&make_project("Checkout")).await?;

    let mut new_screen = make_screen(project.id, "Cart").await;
    new_screen.description = Some("Items before payment".to_string());
    let created = store.add_screen(&new_screen).await?;

    assert!(created.id > 0);
    assert_eq!(created.project_id, project.id);
    assert_eq!(created.name, "Cart");
    assert_eq!(created.image_url, new_screen.image_url);
    assert!(created.image_url.starts_with("data:image/png;base64,"));
    assert_eq!(created.description, new_screen.description);
    assert_eq!(created.order, 0);

    assert_eq!(store.get_screen(created.id).await?, Some(created.clone()));
    assert_eq!(store.get_screen(created.id + 100).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_order_follows_sibling_count() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let checkout = store.add_project(&make_project("Checkout")).await?;
    let account = store.add_project(&make_project("Account")).await?;

    let cart = store.add_screen(&make_screen(checkout.id, "Cart").await).await?;
    let profile = store.add_screen(&make_screen(account.id, "Profile").await).await?;
    let pay = store.add_screen(&make_screen(checkout.id, "Pay").await).await?;
    let done = store.add_screen(&make_screen(checkout.id, "Done").await).await?;

    assert_eq!((cart.order, pay.order, done.order), (0, 1, 2));
    assert_eq!(profile.order, 0, "Order counts siblings of the same project only");

    // Deleting does not renumber; the next screen reuses the count, not the max
    assert!(store.delete_screen(cart.id).await?);
    let receipt = store.add_screen(&make_screen(checkout.id, "Receipt").await).await?;
    assert_eq!(receipt.order, 2);

    let names: Vec<String> = store
        .get_screens(checkout.id)
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();
    // Pay(1), then Done(2) and Receipt(2) tie and fall back to id order
    assert_eq!(names, vec!["Pay", "Done", "Receipt"]);

    Ok(())
}

#[tokio::test]
async fn test_reorder_screens() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let project = store.add_project(&make_project("Checkout")).await?;
    let other = store.add_project(&make_project("Other")).await?;
    let a = store.add_screen(&make_screen(project.id, "A").await).await?;
    let b = store.add_screen(&make_screen(project.id, "B").await).await?;
    let c = store.add_screen(&make_screen(project.id, "C").await).await?;
    let foreign = store.add_screen(&make_screen(other.id, "Foreign").await).await?;

    store
        .reorder_screens(project.id, &[c.id, foreign.id, a.id, b.id])
        .await?;

    let ids: Vec<i64> = store
        .get_screens(project.id)
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![c.id, a.id, b.id]);

    // Screens of other projects are left alone
    let foreign_after = store.get_screen(foreign.id).await?.expect("foreign screen exists");
    assert_eq!(foreign_after.order, foreign.order);

    Ok(())
}

#[tokio::test]
async fn test_update_screen() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let project = store.add_project(&make_project("Checkout")).await?;
    let before = store.add_screen(&make_screen(project.id, "Cart").await).await?;

    let patch = ScreenPatch {
        name: Some("Basket".to_string()),
        description: Some(Some("Renamed".to_string())),
        ..Default::default()
    };
    let after = store.update_screen(before.id, &patch).await?;

    assert_eq!(after.name, "Basket");
    assert_eq!(after.description.as_deref(), Some("Renamed"));
    assert_eq!(after.image_url, before.image_url);
    assert_eq!(after.project_id, before.project_id);
    assert_eq!(after.order, before.order);

    let image_only = ScreenPatch {
        image_url: Some("data:image/png;base64,AAAA".to_string()),
        ..Default::default()
    };
    let replaced = store.update_screen(before.id, &image_only).await?;
    assert_eq!(replaced.image_url, "data:image/png;base64,AAAA");
    assert_eq!(replaced.name, "Basket");

    let result = store.update_screen(before.id + 100, &patch).await;
    assert!(matches!(
        result,
        Err(StoreError::NotFound {
            collection: "screens",
            ..
        })
    ));

    Ok(())
}

#[tokio::test]
async fn test_query_screens_by_index() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let checkout = store.add_project(&make_project("Checkout")).await?;
    let account = store.add_project(&make_project("Account")).await?;
    let cart = store.add_screen(&make_screen(checkout.id, "Cart").await).await?;
    let login = store.add_screen(&make_screen(account.id, "Login").await).await?;
    let pay = store.add_screen(&make_screen(checkout.id, "Pay").await).await?;

    let by_project: Vec<i64> = store
        .query_screens(&ScreenIndex::ProjectId(checkout.id))
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(by_project, vec![cart.id, pay.id]);

    let by_name = store
        .query_screens(&ScreenIndex::Name("Login".to_string()))
        .await?;
    assert_eq!(by_name, vec![login]);

    let first_positions: Vec<i64> = store
        .query_screens(&ScreenIndex::Order(0))
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(first_positions.len(), 2);
    assert!(first_positions.contains(&cart.id));

    Ok(())
}

#[tokio::test]
async fn test_delete_screen_is_idempotent() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let project = store.add_project(&make_project("Checkout")).await?;
    let screen = store.add_screen(&make_screen(project.id, "Cart").await).await?;

    assert!(store.delete_screen(screen.id).await?);
    assert!(!store.delete_screen(screen.id).await?);
    assert_eq!(store.get_screen(screen.id).await?, None);

    Ok(())
}
