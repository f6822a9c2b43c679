//! Cross-store purchase step: checking shopping items off and stocking the
//! pantry with them commit together or not at all.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::db::{Database, insert_pantry_item_in, mark_checked_in, owned_items_in};
use crate::error::{ToolError, ToolFailure};
use crate::models::{ItemRef, NewPantryItem, ShoppingListItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub marked_bought: usize,
    pub added_to_pantry: usize,
    pub items: Vec<ItemRef>,
    /// Requested ids that matched none of the caller's items.
    pub skipped: usize,
}

impl From<&ShoppingListItem> for NewPantryItem {
    fn from(item: &ShoppingListItem) -> Self {
        Self {
            name: item.name.clone(),
            category: item.category,
            quantity: item.quantity,
            unit: item.unit.clone(),
        }
    }
}

/// Mark the caller's items among `item_ids` as bought and, when
/// `add_to_pantry` is set, copy each into the pantry.
///
/// Ids that are unknown or owned by another user are skipped. If none
/// remain the call fails with "No valid items found" and nothing changes.
pub fn mark_bought(
    db: &Database,
    user_id: &str,
    item_ids: &[String],
    add_to_pantry: bool,
) -> Result<PurchaseOutcome, ToolError> {
    let tx = db.begin()?;
    let items = owned_items_in(&tx, user_id, item_ids)?;
    if items.is_empty() {
        return Err(ToolFailure::not_found("No valid items found").into());
    }

    let mut added_to_pantry = 0;
    for item in &items {
        mark_checked_in(&tx, item)?;
        if add_to_pantry {
            insert_pantry_item_in(&tx, user_id, &NewPantryItem::from(item))?;
            added_to_pantry += 1;
        }
    }
    tx.commit().map_err(anyhow::Error::from)?;

    let requested: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
    let outcome = PurchaseOutcome {
        marked_bought: items.len(),
        added_to_pantry,
        skipped: requested.len().saturating_sub(items.len()),
        items: items.iter().map(ItemRef::from).collect(),
    };
    info!(
        user_id,
        marked_bought = outcome.marked_bought,
        added_to_pantry = outcome.added_to_pantry,
        skipped = outcome.skipped,
        "items marked bought"
    );
    Ok(outcome)
}
