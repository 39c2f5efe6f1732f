//! Derived aggregates over an in-memory collection view.
//!
//! Pure functions: they never touch storage or the network.

use cartsync_core::ProductId;
use rust_decimal::Decimal;
use tracing::warn;

use crate::collection::CollectionKind;

/// Total units across all lines. For the wishlist this is the entry count.
#[must_use]
pub fn item_count<C: CollectionKind>(items: &[C::Item]) -> u64 {
    items.iter().map(|item| u64::from(C::quantity(item))).sum()
}

/// Σ unit price × quantity.
///
/// Prices are not validated, so a total outside the `Decimal` range is
/// saturated to [`Decimal::MAX`] (or [`Decimal::MIN`]) instead of failing.
#[must_use]
pub fn total_price<C: CollectionKind>(items: &[C::Item]) -> Decimal {
    let total = items.iter().try_fold(Decimal::ZERO, |total, item| {
        C::unit_price(item)
            .checked_mul(Decimal::from(C::quantity(item)))
            .and_then(|line| total.checked_add(line))
    });

    total.unwrap_or_else(|| {
        warn!(collection = C::RESOURCE, lines = items.len(), "Collection total overflowed");
        items
            .iter()
            .map(|item| C::unit_price(item).saturating_mul(Decimal::from(C::quantity(item))))
            .fold(Decimal::ZERO, Decimal::saturating_add)
    })
}

/// Whether any line references `product_id`.
#[must_use]
pub fn contains<C: CollectionKind>(items: &[C::Item], product_id: ProductId) -> bool {
    items.iter().any(|item| C::product_id(item) == product_id)
}

#[cfg(test)]
mod tests {
    use cartsync_core::{CartItem, WishlistItem};

    use super::*;
    use crate::collection::{Cart, Wishlist};

    fn line(product: i32, price: Decimal, quantity: u32) -> CartItem {
        let mut item = CartItem::new(ProductId::new(product), "line", price);
        item.quantity = quantity;
        item
    }

    #[test]
    fn test_cart_aggregates() {
        let items = vec![
            line(1, Decimal::new(1999, 2), 2),
            line(2, Decimal::new(500, 2), 1),
            line(3, Decimal::new(3, 1), 10),
        ];

        assert_eq!(item_count::<Cart>(&items), 13);
        assert_eq!(total_price::<Cart>(&items), Decimal::new(4798, 2));
        assert!(contains::<Cart>(&items, ProductId::new(2)));
        assert!(!contains::<Cart>(&items, ProductId::new(9)));
    }

    #[test]
    fn test_total_matches_sum_of_line_totals() {
        let items: Vec<CartItem> = (1..=20)
            .map(|n| line(n, Decimal::new(i64::from(n) * 137, 2), u32::try_from(n % 4 + 1).unwrap_or(1)))
            .collect();

        let expected: Decimal = items.iter().map(CartItem::line_total).sum();
        assert_eq!(total_price::<Cart>(&items), expected);
    }

    #[test]
    fn test_total_saturates_on_overflow() {
        let items = vec![line(1, Decimal::MAX, 2)];
        assert_eq!(total_price::<Cart>(&items), Decimal::MAX);

        let items = vec![line(1, Decimal::MAX, 1), line(2, Decimal::ONE, 1)];
        assert_eq!(total_price::<Cart>(&items), Decimal::MAX);

        let items = vec![line(1, Decimal::MIN, 3)];
        assert_eq!(total_price::<Cart>(&items), Decimal::MIN);
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(item_count::<Cart>(&[]), 0);
        assert_eq!(total_price::<Cart>(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_wishlist_count_is_entry_count() {
        let items = vec![
            WishlistItem::new(ProductId::new(1), "a", Decimal::ONE),
            WishlistItem::new(ProductId::new(2), "b", Decimal::ONE),
        ];
        assert_eq!(item_count::<Wishlist>(&items), 2);
        assert!(contains::<Wishlist>(&items, ProductId::new(1)));
    }
}
