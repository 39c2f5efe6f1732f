//! Cart and wishlist item shapes.
//!
//! Items are stored as JSON both in the guest snapshot and on the wire, so
//! field names follow the collection service's camelCase convention. Display
//! fields (`title`, `price`, `image`, ...) are denormalized copies supplied
//! by the catalog or by the remote collection and are never validated here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ItemId, ProductId, VariantId};

const fn default_quantity() -> u32 {
    1
}

/// A specific sub-variant picked by the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedVariant {
    pub id: VariantId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

/// The attributes that distinguish two cart lines for the same product.
///
/// Flattened onto [`CartItem`] and [`CartLineInput`], so on the wire it
/// appears as `selectedColor`, `selectedSize`, `selectedVariant` and
/// `customSelections` next to `productId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<SelectedVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_selections: Option<BTreeMap<String, String>>,
}

impl VariantSelection {
    /// Canonical form used for identity comparison.
    ///
    /// An empty custom-selection map means the same as no map at all.
    #[must_use]
    pub fn canonical(&self) -> Self {
        Self {
            custom_selections: self
                .custom_selections
                .clone()
                .filter(|selections| !selections.is_empty()),
            ..self.clone()
        }
    }

    /// Whether no attribute is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical() == Self::default()
    }
}

/// A line in the shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Empty until the engine (guest) or the remote collection assigns one.
    #[serde(default)]
    pub id: ItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub variant: VariantSelection,
}

impl CartItem {
    /// Create a catalog-supplied cart item with no variant selection.
    #[must_use]
    pub fn new(product_id: ProductId, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: ItemId::default(),
            product_id,
            title: title.into(),
            price,
            quantity: 1,
            image: None,
            slug: None,
            in_stock: None,
            added_at: None,
            variant: VariantSelection::default(),
        }
    }

    /// Attach a variant selection.
    #[must_use]
    pub fn with_variant(mut self, variant: VariantSelection) -> Self {
        self.variant = variant;
        self
    }

    /// Whether `other` is the same logical line: same product and an equal
    /// variant selection.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.product_id == other.product_id
            && self.variant.canonical() == other.variant.canonical()
    }

    /// Price of the whole line, saturating at the `Decimal` bounds.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// A wishlist entry. Wishlists are sets keyed by product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    #[serde(default)]
    pub id: ItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl WishlistItem {
    /// Create a catalog-supplied wishlist entry.
    #[must_use]
    pub fn new(product_id: ProductId, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: ItemId::default(),
            product_id,
            title: title.into(),
            price,
            image: None,
            slug: None,
            in_stock: None,
            added_at: None,
        }
    }
}

/// Body of a cart `add` request and one entry of a cart bulk sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(flatten)]
    pub variant: VariantSelection,
}

impl CartLineInput {
    /// Build the request line for `quantity` units of `item`.
    #[must_use]
    pub fn from_item(item: &CartItem, quantity: u32) -> Self {
        Self {
            product_id: item.product_id,
            quantity: Some(quantity),
            variant: item.variant.canonical(),
        }
    }
}

/// Body of a wishlist `add` request and one entry of a wishlist bulk sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistLineInput {
    pub product_id: ProductId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(size: &str) -> VariantSelection {
        VariantSelection {
            selected_size: Some(size.to_string()),
            ..VariantSelection::default()
        }
    }

    #[test]
    fn test_cart_item_wire_shape_is_flat_camel_case() {
        let item = CartItem::new(ProductId::new(10), "Tee", Decimal::new(1999, 2))
            .with_variant(sized("M"));
        let json = serde_json::to_value(&item).expect("serialize");

        assert_eq!(json["productId"], 10);
        assert_eq!(json["selectedSize"], "M");
        assert_eq!(json["quantity"], 1);
        assert!(json.get("variant").is_none());
        assert!(json.get("selectedColor").is_none());
    }

    #[test]
    fn test_cart_item_parses_remote_row() {
        let json = r#"{
            "id": 501,
            "productId": 3,
            "title": "Mug",
            "price": 12.5,
            "quantity": 4,
            "selectedColor": "red",
            "customSelections": {"engraving": "AW"},
            "createdBy": "server"
        }"#;
        let item: CartItem = serde_json::from_str(json).expect("deserialize");

        assert_eq!(item.id.as_str(), "501");
        assert_eq!(item.quantity, 4);
        assert_eq!(item.price, Decimal::new(125, 1));
        assert_eq!(item.variant.selected_color.as_deref(), Some("red"));
        assert_eq!(
            item.variant
                .custom_selections
                .as_ref()
                .and_then(|m| m.get("engraving"))
                .map(String::as_str),
            Some("AW")
        );
    }

    #[test]
    fn test_same_line_compares_variant_by_value() {
        let a = CartItem::new(ProductId::new(1), "A", Decimal::ONE).with_variant(sized("S"));
        let b = CartItem::new(ProductId::new(1), "A", Decimal::ONE).with_variant(sized("S"));
        let c = CartItem::new(ProductId::new(1), "A", Decimal::ONE).with_variant(sized("L"));
        let d = CartItem::new(ProductId::new(2), "A", Decimal::ONE).with_variant(sized("S"));

        assert!(a.same_line(&b));
        assert!(!a.same_line(&c));
        assert!(!a.same_line(&d));
    }

    #[test]
    fn test_empty_custom_selections_match_none() {
        let plain = CartItem::new(ProductId::new(1), "A", Decimal::ONE);
        let empty_map = plain.clone().with_variant(VariantSelection {
            custom_selections: Some(BTreeMap::new()),
            ..VariantSelection::default()
        });

        assert!(plain.same_line(&empty_map));
        assert!(empty_map.variant.is_empty());
    }

    #[test]
    fn test_line_input_omits_absent_fields() {
        let item = CartItem::new(ProductId::new(7), "Hat", Decimal::TEN);
        let json = serde_json::to_string(&CartLineInput::from_item(&item, 2)).expect("serialize");
        assert_eq!(json, r#"{"productId":7,"quantity":2}"#);
    }

    #[test]
    fn test_line_total() {
        let mut item = CartItem::new(ProductId::new(1), "A", Decimal::new(250, 2));
        item.quantity = 3;
        assert_eq!(item.line_total(), Decimal::new(750, 2));

        let mut huge = CartItem::new(ProductId::new(1), "Yacht", Decimal::MAX);
        huge.quantity = 2;
        assert_eq!(huge.line_total(), Decimal::MAX);
    }
}
