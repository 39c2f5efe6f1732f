//! Wire types for the collection service.

use serde::{Deserialize, Serialize};

/// Response of `GET /{collection}`.
///
/// Services answer either with a bare array or wrapped in `{"items": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

/// Body of `PUT /{collection}/{itemId}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}

/// Body of `POST /{collection}/sync`.
#[derive(Debug, Serialize)]
pub struct BulkSyncRequest<'a, L> {
    pub items: &'a [L],
}

#[cfg(test)]
mod tests {
    use cartsync_core::{CartItem, CartLineInput, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_list_response_accepts_both_shapes() {
        let bare: ListResponse<CartItem> =
            serde_json::from_str(r#"[{"id": "a", "productId": 1, "quantity": 2}]"#)
                .expect("bare array");
        let wrapped: ListResponse<CartItem> =
            serde_json::from_str(r#"{"items": [{"id": "a", "productId": 1, "quantity": 2}]}"#)
                .expect("wrapped array");

        assert_eq!(bare.into_items(), wrapped.into_items());
    }

    #[test]
    fn test_bulk_sync_body() {
        let item = CartItem::new(ProductId::new(1), "A", Decimal::ONE);
        let lines = [CartLineInput::from_item(&item, 2)];
        let body = serde_json::to_string(&BulkSyncRequest { items: &lines }).expect("serialize");
        assert_eq!(body, r#"{"items":[{"productId":1,"quantity":2}]}"#);
    }
}
