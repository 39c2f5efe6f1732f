//! Login, logout and status.

use cartsync::{MergeReport, MergeStatus, Storefront};
use secrecy::SecretString;

use super::warn_unless_applied;
use crate::error::CliError;
use crate::output;

pub async fn login(shop: &Storefront, token: &str) -> Result<(), CliError> {
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(CliError::InvalidToken("token is empty"));
    }

    let report = shop.login(SecretString::from(token)).await;
    output::message(&format!("Logged in. {}", describe("cart", &report.cart)));
    output::message(&describe("wishlist", &report.wishlist));

    if report.lost_guest_lines() {
        tracing::error!("Guest lines were discarded after a failed merge");
    }
    Ok(())
}

pub async fn logout(shop: &Storefront) {
    let (cart, wishlist) = shop.logout().await;
    warn_unless_applied("cart reload", &cart);
    warn_unless_applied("wishlist reload", &wishlist);
    output::message(&format!(
        "Logged out. Guest cart: {} item(s), guest wishlist: {} item(s)",
        shop.cart().count(),
        shop.wishlist().count()
    ));
}

pub fn status(shop: &Storefront) {
    output::message(&format!("Mode: {}", shop.mode()));
    output::message(&format!("Cart: {} item(s)", shop.cart().count()));
    output::message(&format!("Wishlist: {} item(s)", shop.wishlist().count()));
}

fn describe(collection: &str, report: &MergeReport) -> String {
    let merge = match &report.status {
        MergeStatus::Skipped => "no guest lines to merge".to_string(),
        MergeStatus::Synced => format!("merged {} guest line(s)", report.submitted),
        MergeStatus::Failed(e) if report.snapshot_cleared => {
            format!("merge of {} guest line(s) failed, lines discarded: {e}", report.submitted)
        }
        MergeStatus::Failed(e) => {
            format!("merge of {} guest line(s) failed, kept for retry: {e}", report.submitted)
        }
    };
    match &report.reload {
        Some(outcome) if !outcome.is_applied() => {
            format!("{collection}: {merge}; refresh {outcome}")
        }
        _ => format!("{collection}: {merge}"),
    }
}
