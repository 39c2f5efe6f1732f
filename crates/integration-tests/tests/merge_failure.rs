//! Integration tests for merges that do not go through cleanly.

use cartsync::{MergePolicy, MergeStatus, Mode, Outcome, RemoteError, SyncError};
use cartsync_core::{CartItem, ProductId};
use cartsync_integration_tests::{Failure, REVOKED_TOKEN, TestError, TestShop};
use rust_decimal::Decimal;
use secrecy::SecretString;

fn tee() -> CartItem {
    CartItem::new(ProductId::new(10), "Tee", Decimal::new(1500, 2))
}

#[tokio::test]
async fn test_failed_sync_discards_guest_cart_by_default() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::ClearAlways).await?;
    let _ = t.shop.cart().add(tee(), 3).await;
    t.service.set_failure(Failure::Sync);

    let report = t.shop.login(SecretString::from("alice")).await;

    assert!(matches!(
        report.cart.status,
        MergeStatus::Failed(SyncError::Remote(RemoteError::Api { status: 503, .. }))
    ));
    assert!(report.cart.snapshot_cleared);
    assert!(report.lost_guest_lines());
    assert!(!t.storage_dir().join("guest_cart.json").exists());

    // The reload still ran and shows the (empty) account
    assert!(matches!(report.cart.reload, Some(Outcome::Applied)));
    assert!(t.shop.cart().is_empty());
    assert!(t.service.cart("alice").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_sync_keeps_guest_cart_for_retry() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::RetainOnFailure).await?;
    let _ = t.shop.cart().add(tee(), 3).await;
    t.service.set_failure(Failure::Sync);

    let report = t.shop.login(SecretString::from("alice")).await;
    assert!(matches!(report.cart.status, MergeStatus::Failed(_)));
    assert!(!report.cart.snapshot_cleared);
    assert!(!report.lost_guest_lines());
    assert!(t.storage_dir().join("guest_cart.json").exists());

    // Back to guest: the retained snapshot is the view again
    let _ = t.shop.logout().await;
    assert_eq!(t.shop.mode(), Mode::Guest);
    assert_eq!(t.shop.cart().count(), 3);

    t.service.set_failure(Failure::None);
    let report = t.shop.login(SecretString::from("alice")).await;
    assert!(matches!(report.cart.status, MergeStatus::Synced));
    assert!(report.cart.snapshot_cleared);
    assert_eq!(t.shop.cart().count(), 3);
    assert_eq!(t.service.cart("alice").len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_reload_failure_after_merge_keeps_view() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::ClearAlways).await?;
    let _ = t.shop.cart().add(tee(), 2).await;
    let guest_view = t.shop.cart().items();
    t.service.set_failure(Failure::List);

    let report = t.shop.login(SecretString::from("alice")).await;
    assert!(matches!(report.cart.status, MergeStatus::Synced));
    assert!(matches!(
        report.cart.reload,
        Some(Outcome::RetryableFailure(_))
    ));
    assert_eq!(t.shop.cart().items(), guest_view);
    assert_eq!(t.service.cart("alice")[0].quantity, 2);

    t.service.set_failure(Failure::None);
    assert!(t.shop.cart().reload().await.is_applied());
    assert_eq!(t.shop.cart().items(), t.service.cart("alice"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_credential_is_not_retryable() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::RetainOnFailure).await?;
    let _ = t.shop.cart().add(tee(), 1).await;

    let report = t.shop.login(SecretString::from(REVOKED_TOKEN)).await;
    match &report.cart.status {
        MergeStatus::Failed(e) => {
            assert!(matches!(e, SyncError::Remote(RemoteError::Unauthorized(_))));
            assert!(!e.is_retryable());
        }
        other => panic!("expected failed merge, got {other:?}"),
    }

    // Retrying with the same credential cannot help
    let outcome = t.shop.cart().add(tee(), 1).await;
    assert!(matches!(
        outcome,
        Outcome::Failed(SyncError::Remote(RemoteError::Unauthorized(_)))
    ));
    assert!(matches!(
        t.shop.cart().reload().await,
        Outcome::Failed(SyncError::Remote(RemoteError::Unauthorized(_)))
    ));
    assert_eq!(t.shop.cart().count(), 1);
    Ok(())
}
