use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::pantry::{MAX_ITEM_NAME_CHARS, unit};
use super::respond;
use crate::context::ExecutionContext;
use crate::coordinator;
use crate::db::Database;
use crate::error::{ToolError, ToolFailure};
use crate::models::{DEFAULT_SHOPPING_LIST, ItemRef, NewShoppingItem, ShoppingList, ShoppingListItem};
use crate::normalize::{max_chars, name_contains, non_blank, non_negative_at_most, required};

pub const DESCRIPTION: &str = "Manage shopping lists and their items.

OPERATIONS:
- \"query\": View every shopping list with its items
- \"create_list\": Create a new list (\"create a Costco list\")
- \"rename_list\": Rename a list (requires listId)
- \"delete_list\": Delete a list and all of its items (requires listId)
- \"add_items\": Add items to a list. Without listName the \"Shopping List\" list is used and created if needed.
- \"remove_items\": Remove items by ID or by name
- \"mark_bought\": Check items off and, unless addToPantry is false, add them to the pantry

For add_items, pass an array of items with a name and optional category, quantity and unit.";

pub const OPERATIONS: &[&str] = &[
    "query",
    "create_list",
    "rename_list",
    "delete_list",
    "add_items",
    "remove_items",
    "mark_bought",
];

const MAX_LIST_NAME_CHARS: usize = 100;
const MAX_ITEM_QUANTITY: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShoppingOperation {
    Query,
    CreateList,
    RenameList,
    DeleteList,
    AddItems,
    RemoveItems,
    MarkBought,
}

/// Arguments for the `shopping_list` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingInput {
    /// Operation to perform
    pub operation: ShoppingOperation,
    /// List ID for rename_list and delete_list
    pub list_id: Option<String>,
    /// List name (query filter, create, rename, add_items target or remove_items scope)
    pub list_name: Option<String>,
    /// Items to add (for add_items)
    pub items: Option<Vec<NewShoppingItem>>,
    /// Item IDs to remove or mark bought
    pub item_ids: Option<Vec<String>>,
    /// Item names to search for and remove
    pub item_names: Option<Vec<String>>,
    /// Add bought items to the pantry (default: true)
    pub add_to_pantry: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum ShoppingOp {
    Query {
        name_filter: Option<String>,
    },
    CreateList {
        name: String,
    },
    RenameList {
        list_id: String,
        name: String,
    },
    DeleteList {
        list_id: String,
    },
    AddItems {
        list_name: String,
        items: Vec<NewShoppingItem>,
    },
    RemoveItems {
        item_ids: Vec<String>,
        item_names: Vec<String>,
        list_name: Option<String>,
    },
    MarkBought {
        item_ids: Vec<String>,
        add_to_pantry: bool,
    },
}

impl ShoppingInput {
    pub fn into_op(self) -> Result<ShoppingOp, ToolFailure> {
        let list_name = non_blank(self.list_name);
        if let Some(name) = &list_name {
            max_chars("listName", name, MAX_LIST_NAME_CHARS)?;
        }
        match self.operation {
            ShoppingOperation::Query => Ok(ShoppingOp::Query {
                name_filter: list_name,
            }),
            ShoppingOperation::CreateList => Ok(ShoppingOp::CreateList {
                name: required(list_name, "listName is required for create_list")?,
            }),
            ShoppingOperation::RenameList => {
                let (Some(list_id), Some(name)) = (non_blank(self.list_id), list_name) else {
                    return Err(ToolFailure::validation(
                        "listId and listName are required for rename_list",
                    ));
                };
                Ok(ShoppingOp::RenameList { list_id, name })
            }
            ShoppingOperation::DeleteList => Ok(ShoppingOp::DeleteList {
                list_id: required(non_blank(self.list_id), "listId is required for delete_list")?,
            }),
            ShoppingOperation::AddItems => {
                let items = self.items.unwrap_or_default();
                if items.is_empty() {
                    return Err(ToolFailure::validation(
                        "items array is required for add_items",
                    ));
                }
                Ok(ShoppingOp::AddItems {
                    list_name: list_name.unwrap_or_else(|| DEFAULT_SHOPPING_LIST.to_string()),
                    items: items
                        .into_iter()
                        .map(checked_item)
                        .collect::<Result<_, _>>()?,
                })
            }
            ShoppingOperation::RemoveItems => {
                let item_ids = non_blank_all(self.item_ids);
                // a blank name would match every item
                let item_names = non_blank_all(self.item_names);
                if item_ids.is_empty() && item_names.is_empty() {
                    return Err(ToolFailure::validation("Must provide itemIds or itemNames"));
                }
                Ok(ShoppingOp::RemoveItems {
                    item_ids,
                    item_names,
                    list_name,
                })
            }
            ShoppingOperation::MarkBought => {
                let item_ids = non_blank_all(self.item_ids);
                if item_ids.is_empty() {
                    return Err(ToolFailure::validation("itemIds is required for mark_bought"));
                }
                Ok(ShoppingOp::MarkBought {
                    item_ids,
                    add_to_pantry: self.add_to_pantry.unwrap_or(true),
                })
            }
        }
    }
}

fn non_blank_all(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| non_blank(Some(v)))
        .collect()
}

fn checked_item(item: NewShoppingItem) -> Result<NewShoppingItem, ToolFailure> {
    let name = required(non_blank(Some(item.name)), "item name must not be empty")?;
    max_chars("name", &name, MAX_ITEM_NAME_CHARS)?;
    Ok(NewShoppingItem {
        name,
        category: item.category,
        quantity: item
            .quantity
            .map(|q| non_negative_at_most("quantity", q, MAX_ITEM_QUANTITY))
            .transpose()?,
        unit: unit(item.unit)?,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListView {
    id: String,
    name: String,
    item_count: usize,
    checked_count: usize,
    items: Vec<ShoppingListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListsQueried {
    total_lists: usize,
    lists: Vec<ListView>,
}

#[derive(Debug, Serialize)]
struct ListCreated {
    created: ShoppingList,
}

#[derive(Debug, Serialize)]
struct ListRenamed {
    updated: ShoppingList,
}

#[derive(Debug, Serialize)]
struct ListDeleted {
    deleted: ShoppingList,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemsAdded {
    list_name: String,
    added_count: usize,
    items: Vec<ShoppingListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemsRemoved {
    removed_count: usize,
    removed: Vec<ItemRef>,
}

pub(crate) fn run(
    db: &Database,
    ctx: &ExecutionContext,
    op: ShoppingOp,
) -> Result<Value, ToolError> {
    let user_id = ctx.user_id();
    match op {
        ShoppingOp::Query { name_filter } => {
            let mut lists = Vec::new();
            for list in db.list_shopping_lists(user_id)? {
                if name_filter
                    .as_deref()
                    .is_some_and(|f| !name_contains(&list.name, f))
                {
                    continue;
                }
                let items = db.shopping_list_items(user_id, &list.id)?;
                lists.push(ListView {
                    item_count: items.len(),
                    checked_count: items.iter().filter(|i| i.checked).count(),
                    id: list.id,
                    name: list.name,
                    items,
                });
            }
            respond(
                "query",
                &ListsQueried {
                    total_lists: lists.len(),
                    lists,
                },
            )
        }
        ShoppingOp::CreateList { name } => {
            let created = db.create_shopping_list(user_id, &name)?;
            info!(user_id, list_id = %created.id, name = %created.name, "shopping list created");
            respond("create_list", &ListCreated { created })
        }
        ShoppingOp::RenameList { list_id, name } => {
            let updated = db
                .rename_shopping_list(user_id, &list_id, &name)?
                .ok_or_else(|| ToolFailure::not_found("List not found"))?;
            info!(user_id, list_id = %updated.id, name = %updated.name, "shopping list renamed");
            respond("rename_list", &ListRenamed { updated })
        }
        ShoppingOp::DeleteList { list_id } => {
            let deleted = db
                .delete_shopping_list(user_id, &list_id)?
                .ok_or_else(|| ToolFailure::not_found("List not found"))?;
            info!(user_id, list_id = %deleted.id, "shopping list deleted");
            respond("delete_list", &ListDeleted { deleted })
        }
        ShoppingOp::AddItems { list_name, items } => {
            let (list, items) = db.add_shopping_items(user_id, &list_name, &items)?;
            info!(user_id, list_id = %list.id, added = items.len(), "shopping items added");
            respond(
                "add_items",
                &ItemsAdded {
                    list_name: list.name,
                    added_count: items.len(),
                    items,
                },
            )
        }
        ShoppingOp::RemoveItems {
            item_ids,
            item_names,
            list_name,
        } => {
            let removed =
                db.remove_shopping_items(user_id, &item_ids, &item_names, list_name.as_deref())?;
            info!(user_id, removed = removed.len(), "shopping items removed");
            respond(
                "remove_items",
                &ItemsRemoved {
                    removed_count: removed.len(),
                    removed,
                },
            )
        }
        ShoppingOp::MarkBought {
            item_ids,
            add_to_pantry,
        } => {
            let outcome = coordinator::mark_bought(db, user_id, &item_ids, add_to_pantry)?;
            respond("mark_bought", &outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(db: &Database, user: &str, value: Value) -> Result<Value, ToolError> {
        let ctx = ExecutionContext::new(user, None).unwrap();
        let input: ShoppingInput = serde_json::from_value(value).unwrap();
        run(db, &ctx, input.into_op()?)
    }

    fn item_ids(result: &Value) -> Vec<String> {
        result["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_add_items_uses_default_list() {
        let db = Database::open_in_memory().unwrap();
        let result = call(
            &db,
            "u1",
            json!({"operation": "add_items", "items": [{"name": "Bananas", "category": "fruit"}]}),
        )
        .unwrap();
        assert_eq!(result["listName"], "Shopping List");
        assert_eq!(result["addedCount"], 1);
        assert_eq!(result["items"][0]["category"], "fruit");

        call(
            &db,
            "u1",
            json!({"operation": "add_items", "items": [{"name": "Bread"}]}),
        )
        .unwrap();
        let lists = db.list_shopping_lists("u1").unwrap();
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn test_add_items_validation() {
        let db = Database::open_in_memory().unwrap();
        let err = call(&db, "u1", json!({"operation": "add_items", "items": []})).unwrap_err();
        assert_eq!(err.to_string(), "items array is required for add_items");
        let err = call(
            &db,
            "u1",
            json!({"operation": "add_items", "items": [{"name": "Rice", "quantity": -1}]}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "quantity must be between 0 and 10000");
    }

    #[test]
    fn test_add_items_accepts_zero_quantity() {
        let db = Database::open_in_memory().unwrap();
        let added = call(
            &db,
            "u1",
            json!({"operation": "add_items", "items": [{"name": "Salt", "quantity": 0}]}),
        )
        .unwrap();
        assert_eq!(added["addedCount"], 1);
        assert_eq!(added["items"][0]["quantity"], 0.0);
    }

    #[test]
    fn test_query_orders_items_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let added = call(
            &db,
            "u1",
            json!({"operation": "add_items", "listName": "Costco", "items": [{"name": "Eggs"}, {"name": "Coffee"}]}),
        )
        .unwrap();
        let ids = item_ids(&added);
        call(
            &db,
            "u1",
            json!({"operation": "mark_bought", "itemIds": [ids[0]], "addToPantry": false}),
        )
        .unwrap();
        call(
            &db,
            "u1",
            json!({"operation": "add_items", "listName": "Farmers market", "items": [{"name": "Kale"}]}),
        )
        .unwrap();

        let result = call(&db, "u1", json!({"operation": "query", "listName": "cost"})).unwrap();
        assert_eq!(result["totalLists"], 1);
        let list = &result["lists"][0];
        assert_eq!(list["name"], "Costco");
        assert_eq!(list["itemCount"], 2);
        assert_eq!(list["checkedCount"], 1);
        assert_eq!(list["items"][0]["name"], "Coffee");
        assert_eq!(list["items"][1]["checked"], true);

        let all = call(&db, "u1", json!({"operation": "query"})).unwrap();
        assert_eq!(all["totalLists"], 2);
        assert_eq!(all["lists"][0]["name"], "Farmers market");
    }

    #[test]
    fn test_delete_list_removes_items() {
        let db = Database::open_in_memory().unwrap();
        let created = call(&db, "u1", json!({"operation": "create_list", "listName": "Party"})).unwrap();
        let list_id = created["created"]["id"].as_str().unwrap().to_string();
        let added = call(
            &db,
            "u1",
            json!({"operation": "add_items", "listName": "Party", "items": [{"name": "Chips"}, {"name": "Salsa"}]}),
        )
        .unwrap();
        let ids = item_ids(&added);

        let err = call(&db, "u2", json!({"operation": "delete_list", "listId": list_id})).unwrap_err();
        assert_eq!(err.to_string(), "List not found");

        let result = call(&db, "u1", json!({"operation": "delete_list", "listId": list_id})).unwrap();
        assert_eq!(result["deleted"]["name"], "Party");
        assert!(db.shopping_list_items("u1", &list_id).unwrap().is_empty());

        let err = call(&db, "u1", json!({"operation": "mark_bought", "itemIds": ids})).unwrap_err();
        assert_eq!(err.to_string(), "No valid items found");
    }

    #[test]
    fn test_rename_list() {
        let db = Database::open_in_memory().unwrap();
        let err = call(&db, "u1", json!({"operation": "rename_list", "listName": "New"})).unwrap_err();
        assert_eq!(err.to_string(), "listId and listName are required for rename_list");

        let created = call(&db, "u1", json!({"operation": "create_list", "listName": "Old"})).unwrap();
        let list_id = created["created"]["id"].as_str().unwrap();
        let result = call(
            &db,
            "u1",
            json!({"operation": "rename_list", "listId": list_id, "listName": "Weekly"}),
        )
        .unwrap();
        assert_eq!(result["updated"]["name"], "Weekly");
    }

    #[test]
    fn test_remove_items_by_id_and_name() {
        let db = Database::open_in_memory().unwrap();
        let added = call(
            &db,
            "u1",
            json!({"operation": "add_items", "items": [{"name": "Green apples"}, {"name": "Red apples"}, {"name": "Milk"}]}),
        )
        .unwrap();
        let ids = item_ids(&added);

        let err = call(&db, "u1", json!({"operation": "remove_items", "itemNames": ["  "]})).unwrap_err();
        assert_eq!(err.to_string(), "Must provide itemIds or itemNames");

        let result = call(
            &db,
            "u1",
            json!({"operation": "remove_items", "itemIds": [ids[0]], "itemNames": ["apples"]}),
        )
        .unwrap();
        assert_eq!(result["removedCount"], 2);

        let remaining = call(&db, "u1", json!({"operation": "query"})).unwrap();
        assert_eq!(remaining["lists"][0]["itemCount"], 1);
        assert_eq!(remaining["lists"][0]["items"][0]["name"], "Milk");
    }

    #[test]
    fn test_mark_bought_partial() {
        let db = Database::open_in_memory().unwrap();
        let added = call(
            &db,
            "u1",
            json!({"operation": "add_items", "items": [{"name": "Tofu", "category": "protein"}, {"name": "Rice", "quantity": 2, "unit": "lbs"}]}),
        )
        .unwrap();
        let mut ids = item_ids(&added);
        ids.push("bogus".to_string());

        let result = call(&db, "u1", json!({"operation": "mark_bought", "itemIds": ids})).unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["markedBought"], 2);
        assert_eq!(result["addedToPantry"], 2);
        assert_eq!(result["skipped"], 1);
        assert!(
            result["items"]
                .as_array()
                .unwrap()
                .iter()
                .all(|i| i["id"] != "bogus")
        );
        assert_eq!(db.list_pantry("u1").unwrap().len(), 2);
    }
}
