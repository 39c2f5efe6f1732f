//! Integration tests for switching between guest and authenticated mode,
//! and for concurrent mutations on one engine.

use cartsync::{MergePolicy, Mode};
use cartsync_core::{CartItem, ProductId};
use cartsync_integration_tests::{TestError, TestShop};
use rust_decimal::Decimal;
use secrecy::SecretString;

fn product(id: i32) -> CartItem {
    CartItem::new(ProductId::new(id), format!("Product {id}"), Decimal::ONE)
}

#[tokio::test]
async fn test_logout_returns_to_empty_guest_collections() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::ClearAlways).await?;
    let _ = t.shop.cart().add(product(1), 2).await;
    let _ = t.shop.login(SecretString::from("carol")).await;
    assert_eq!(t.shop.cart().count(), 2);

    let (cart, wishlist) = t.shop.logout().await;
    assert!(cart.is_applied());
    assert!(wishlist.is_applied());
    assert_eq!(t.shop.mode(), Mode::Guest);
    // The snapshot was consumed by the merge
    assert!(t.shop.cart().is_empty());
    // The account keeps its lines
    assert_eq!(t.service.cart("carol")[0].quantity, 2);
    Ok(())
}

#[tokio::test]
async fn test_guest_mode_after_logout_stays_local() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::ClearAlways).await?;
    let _ = t.shop.login(SecretString::from("carol")).await;
    let _ = t.shop.cart().add(product(1), 5).await;
    let _ = t.shop.logout().await;
    let requests = t.service.requests();

    assert!(t.shop.cart().add(product(2), 1).await.is_applied());

    // Only the new guest line; account lines do not leak into the snapshot
    let items = t.shop.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, ProductId::new(2));
    assert!(items[0].id.is_guest());
    assert_eq!(t.service.requests(), requests);

    // Logging in again merges only that line
    let report = t.shop.login(SecretString::from("carol")).await;
    assert_eq!(report.cart.submitted, 1);
    assert_eq!(t.shop.cart().count(), 6);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_guest_adds_are_not_lost() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::ClearAlways).await?;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let cart = t.shop.cart().clone();
            tokio::spawn(async move { cart.add(product(1), 1).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await?.is_applied());
    }

    assert_eq!(t.shop.cart().count(), 10);
    // A restarted process sees the same snapshot
    assert_eq!(t.reopen()?.cart().count(), 10);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_authenticated_adds_converge() -> Result<(), TestError> {
    let t = TestShop::start(MergePolicy::ClearAlways).await?;
    let _ = t.shop.login(SecretString::from("carol")).await;

    let handles: Vec<_> = (0..10)
        .map(|n| {
            let cart = t.shop.cart().clone();
            tokio::spawn(async move { cart.add(product(n % 3), 1).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await?.is_applied());
    }

    // The last reload wins and it reflects every mutation
    assert_eq!(t.shop.cart().count(), 10);
    assert_eq!(t.shop.cart().items(), t.service.cart("carol"));
    Ok(())
}
