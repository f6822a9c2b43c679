use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::respond;
use crate::context::ExecutionContext;
use crate::db::Database;
use crate::error::{ToolError, ToolFailure};
use crate::models::{NewPantryItem, PantryCategory, PantryItem, PantryPatch};
use crate::normalize::{max_chars, name_contains, non_blank, non_negative_at_most, required};

pub const DESCRIPTION: &str = "Query and manage the user's pantry and refrigerator inventory.

OPERATIONS:
- \"query\": See what ingredients the user has. Filter by category or search by name.
- \"add\": Add an item when the user buys groceries (\"I just bought chicken\")
- \"update\": Change an item's quantity or details (requires itemId)
- \"delete\": Remove an item when it is used up (\"I'm out of eggs\")

CATEGORIES: protein, vegetable, fruit, dairy, grain, pantry, beverage, other

Deleting by name without an itemId removes the most recently added match.";

pub const OPERATIONS: &[&str] = &["query", "add", "update", "delete"];

pub(crate) const MAX_ITEM_NAME_CHARS: usize = 200;
pub(crate) const MAX_UNIT_CHARS: usize = 50;
const MAX_QUANTITY: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PantryOperation {
    Query,
    Add,
    Update,
    Delete,
}

/// Arguments for the `pantry` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PantryInput {
    /// Operation to perform
    pub operation: PantryOperation,
    /// Category filter for query, or the item's category
    pub category: Option<PantryCategory>,
    /// Search for items by name
    pub search: Option<String>,
    /// Item name (required for add, optional for update and delete)
    pub name: Option<String>,
    /// Quantity
    pub quantity: Option<f64>,
    /// Unit (lbs, oz, count, etc.)
    pub unit: Option<String>,
    /// Item ID (required for update, optional for delete)
    pub item_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PantryOp {
    Query {
        category: Option<PantryCategory>,
        search: Option<String>,
    },
    Add(NewPantryItem),
    Update {
        item_id: String,
        patch: PantryPatch,
    },
    DeleteById {
        item_id: String,
    },
    DeleteByName {
        name: String,
    },
}

impl PantryInput {
    pub fn into_op(self) -> Result<PantryOp, ToolFailure> {
        match self.operation {
            PantryOperation::Query => Ok(PantryOp::Query {
                category: self.category,
                search: non_blank(self.search),
            }),
            PantryOperation::Delete => {
                if let Some(item_id) = non_blank(self.item_id) {
                    Ok(PantryOp::DeleteById { item_id })
                } else if let Some(name) = non_blank(self.name) {
                    Ok(PantryOp::DeleteByName { name })
                } else {
                    Err(ToolFailure::validation(
                        "Either itemId or name is required for delete",
                    ))
                }
            }
            PantryOperation::Update => {
                let item_id = required(non_blank(self.item_id), "itemId is required for update")?;
                let patch = PantryPatch {
                    name: non_blank(self.name).map(item_name).transpose()?,
                    category: self.category,
                    quantity: quantity(self.quantity)?,
                    unit: unit(self.unit)?,
                };
                Ok(PantryOp::Update { item_id, patch })
            }
            PantryOperation::Add => {
                let name = required(non_blank(self.name), "name is required for add")?;
                Ok(PantryOp::Add(NewPantryItem {
                    name: item_name(name)?,
                    category: self.category,
                    quantity: quantity(self.quantity)?,
                    unit: unit(self.unit)?,
                }))
            }
        }
    }
}

fn item_name(name: String) -> Result<String, ToolFailure> {
    max_chars("name", &name, MAX_ITEM_NAME_CHARS)?;
    Ok(name)
}

fn quantity(value: Option<f64>) -> Result<Option<f64>, ToolFailure> {
    value
        .map(|q| non_negative_at_most("quantity", q, MAX_QUANTITY))
        .transpose()
}

pub(crate) fn unit(value: Option<String>) -> Result<Option<String>, ToolFailure> {
    let unit = non_blank(value);
    if let Some(u) = &unit {
        max_chars("unit", u, MAX_UNIT_CHARS)?;
    }
    Ok(unit)
}

#[derive(Debug, Serialize)]
struct StockedItem {
    id: String,
    name: String,
    quantity: Option<f64>,
    unit: Option<String>,
}

#[derive(Debug, Serialize)]
struct CategoryGroup {
    category: PantryCategory,
    items: Vec<StockedItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PantryQueried {
    total_items: usize,
    by_category: Vec<CategoryGroup>,
}

#[derive(Debug, Serialize)]
struct PantryAdded {
    added: PantryItem,
}

#[derive(Debug, Serialize)]
struct PantryUpdated {
    updated: PantryItem,
}

#[derive(Debug, Serialize)]
struct DeletedRef {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct PantryDeleted {
    deleted: DeletedRef,
}

/// Group items by category in display order; uncategorized items land in
/// `other`. Items keep their incoming order within a group.
pub(crate) fn group_by_category(items: Vec<PantryItem>) -> Vec<(PantryCategory, Vec<PantryItem>)> {
    let mut groups: BTreeMap<PantryCategory, Vec<PantryItem>> = BTreeMap::new();
    for item in items {
        groups
            .entry(item.category.unwrap_or(PantryCategory::Other))
            .or_default()
            .push(item);
    }
    groups.into_iter().collect()
}

pub(crate) fn run(db: &Database, ctx: &ExecutionContext, op: PantryOp) -> Result<Value, ToolError> {
    let user_id = ctx.user_id();
    match op {
        PantryOp::Query { category, search } => {
            let items: Vec<PantryItem> = db
                .list_pantry(user_id)?
                .into_iter()
                .filter(|item| category.is_none_or(|c| item.category == Some(c)))
                .filter(|item| search.as_deref().is_none_or(|s| name_contains(&item.name, s)))
                .collect();
            let total_items = items.len();
            let by_category = group_by_category(items)
                .into_iter()
                .map(|(category, items)| CategoryGroup {
                    category,
                    items: items
                        .into_iter()
                        .map(|i| StockedItem {
                            id: i.id,
                            name: i.name,
                            quantity: i.quantity,
                            unit: i.unit,
                        })
                        .collect(),
                })
                .collect();
            respond(
                "query",
                &PantryQueried {
                    total_items,
                    by_category,
                },
            )
        }
        PantryOp::Add(item) => {
            let added = db.insert_pantry_item(user_id, &item)?;
            info!(user_id, item_id = %added.id, name = %added.name, "pantry item added");
            respond("add", &PantryAdded { added })
        }
        PantryOp::Update { item_id, patch } => {
            let updated = db
                .update_pantry_item(user_id, &item_id, &patch)?
                .ok_or_else(|| ToolFailure::not_found("Item not found"))?;
            info!(user_id, item_id = %updated.id, "pantry item updated");
            respond("update", &PantryUpdated { updated })
        }
        PantryOp::DeleteById { item_id } => {
            let deleted = db
                .delete_pantry_item(user_id, &item_id)?
                .ok_or_else(|| ToolFailure::not_found("Item not found"))?;
            deleted_response(user_id, deleted)
        }
        PantryOp::DeleteByName { name } => {
            let deleted = db
                .delete_pantry_item_by_name(user_id, &name)?
                .ok_or_else(|| ToolFailure::not_found(format!("Item \"{name}\" not found in pantry")))?;
            deleted_response(user_id, deleted)
        }
    }
}

fn deleted_response(user_id: &str, item: PantryItem) -> Result<Value, ToolError> {
    info!(user_id, item_id = %item.id, name = %item.name, "pantry item deleted");
    respond(
        "delete",
        &PantryDeleted {
            deleted: DeletedRef {
                id: item.id,
                name: item.name,
            },
        },
    )
}
