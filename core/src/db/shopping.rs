use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use super::{Database, new_id, now_timestamp, parse_optional_column};
use crate::models::{ItemRef, NewShoppingItem, PantryCategory, ShoppingList, ShoppingListItem};
use crate::normalize::name_contains;

const ITEM_COLUMNS: &str =
    "i.id, i.list_id, i.name, i.category, i.quantity, i.unit, i.checked";

fn list_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingList> {
    Ok(ShoppingList {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingListItem> {
    Ok(ShoppingListItem {
        id: row.get(0)?,
        list_id: row.get(1)?,
        name: row.get(2)?,
        category: parse_optional_column(row, 3)?,
        quantity: row.get(4)?,
        unit: row.get(5)?,
        checked: row.get(6)?,
    })
}

fn touch_list_in(conn: &Connection, list_id: &str, now: &str) -> Result<()> {
    conn.execute(
        "UPDATE shopping_lists SET updated_at = ?2 WHERE id = ?1",
        params![list_id, now],
    )?;
    Ok(())
}

/// The caller's items among `ids`, in the order given. Ids that are unknown,
/// repeated, or owned by someone else are dropped.
pub(crate) fn owned_items_in(
    conn: &Connection,
    user_id: &str,
    ids: &[String],
) -> Result<Vec<ShoppingListItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM shopping_list_items i
         JOIN shopping_lists l ON l.id = i.list_id
         WHERE i.id = ?1 AND l.user_id = ?2"
    ))?;
    let mut items: Vec<ShoppingListItem> = Vec::new();
    for id in ids {
        if items.iter().any(|it| &it.id == id) {
            continue;
        }
        if let Some(item) = stmt
            .query_row(params![id, user_id], item_from_row)
            .optional()?
        {
            items.push(item);
        }
    }
    Ok(items)
}

pub(crate) fn mark_checked_in(conn: &Connection, item: &ShoppingListItem) -> Result<()> {
    let now = now_timestamp();
    conn.execute(
        "UPDATE shopping_list_items SET checked = 1, updated_at = ?2 WHERE id = ?1",
        params![item.id, now],
    )?;
    touch_list_in(conn, &item.list_id, &now)
}

impl Database {
    pub fn create_shopping_list(&self, user_id: &str, name: &str) -> Result<ShoppingList> {
        let id = new_id();
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO shopping_lists (id, user_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, user_id, name, now],
        )?;
        Ok(ShoppingList {
            id,
            name: name.to_string(),
        })
    }

    /// Lists ordered by most recent activity.
    pub fn list_shopping_lists(&self, user_id: &str) -> Result<Vec<ShoppingList>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name FROM shopping_lists
             WHERE user_id = ?1 ORDER BY updated_at DESC, rowid DESC",
        )?;
        let lists = stmt
            .query_map(params![user_id], list_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lists)
    }

    /// Items of one list, unchecked first, then newest first.
    pub fn shopping_list_items(&self, user_id: &str, list_id: &str) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_list_items i
             JOIN shopping_lists l ON l.id = i.list_id
             WHERE i.list_id = ?1 AND l.user_id = ?2
             ORDER BY i.checked ASC, i.created_at DESC, i.rowid DESC"
        ))?;
        let items = stmt
            .query_map(params![list_id, user_id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn rename_shopping_list(
        &self,
        user_id: &str,
        list_id: &str,
        name: &str,
    ) -> Result<Option<ShoppingList>> {
        let rows = self.conn.execute(
            "UPDATE shopping_lists SET name = ?3, updated_at = ?4 WHERE id = ?1 AND user_id = ?2",
            params![list_id, user_id, name, now_timestamp()],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(ShoppingList {
            id: list_id.to_string(),
            name: name.to_string(),
        }))
    }

    /// Delete a list together with all of its items.
    pub fn delete_shopping_list(&self, user_id: &str, list_id: &str) -> Result<Option<ShoppingList>> {
        let tx = self.conn.unchecked_transaction()?;
        let list = tx
            .query_row(
                "SELECT id, name FROM shopping_lists WHERE id = ?1 AND user_id = ?2",
                params![list_id, user_id],
                list_from_row,
            )
            .optional()?;
        let Some(list) = list else {
            return Ok(None);
        };
        tx.execute(
            "DELETE FROM shopping_list_items WHERE list_id = ?1",
            params![list.id],
        )?;
        tx.execute(
            "DELETE FROM shopping_lists WHERE id = ?1 AND user_id = ?2",
            params![list.id, user_id],
        )?;
        tx.commit()?;
        Ok(Some(list))
    }

    /// Add a batch of items to the list named `list_name`, creating the list
    /// on first use. All rows are written in one transaction.
    pub fn add_shopping_items(
        &self,
        user_id: &str,
        list_name: &str,
        items: &[NewShoppingItem],
    ) -> Result<(ShoppingList, Vec<ShoppingListItem>)> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_timestamp();

        let existing = tx
            .query_row(
                "SELECT id, name FROM shopping_lists
                 WHERE user_id = ?1 AND name = ?2
                 ORDER BY created_at, rowid LIMIT 1",
                params![user_id, list_name],
                list_from_row,
            )
            .optional()?;
        let list = if let Some(list) = existing {
            list
        } else {
            let id = new_id();
            tx.execute(
                "INSERT INTO shopping_lists (id, user_id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, user_id, list_name, now],
            )?;
            ShoppingList {
                id,
                name: list_name.to_string(),
            }
        };

        let mut inserted = Vec::with_capacity(items.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO shopping_list_items (id, list_id, name, category, quantity, unit, checked, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
            )?;
            for item in items {
                let id = new_id();
                stmt.execute(params![
                    id,
                    list.id,
                    item.name,
                    item.category.map(PantryCategory::as_str),
                    item.quantity,
                    item.unit,
                    now,
                ])?;
                inserted.push(ShoppingListItem {
                    id,
                    list_id: list.id.clone(),
                    name: item.name.clone(),
                    category: item.category,
                    quantity: item.quantity,
                    unit: item.unit.clone(),
                    checked: false,
                });
            }
        }
        touch_list_in(&tx, &list.id, &now)?;
        tx.commit()?;

        Ok((list, inserted))
    }

    /// Remove items matched exactly by id, or by name substring (optionally
    /// within the list called `list_name`). Each removed item is reported once.
    pub fn remove_shopping_items(
        &self,
        user_id: &str,
        ids: &[String],
        names: &[String],
        list_name: Option<&str>,
    ) -> Result<Vec<ItemRef>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut matched = owned_items_in(&tx, user_id, ids)?;

        if !names.is_empty() {
            let mut stmt = tx.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM shopping_list_items i
                 JOIN shopping_lists l ON l.id = i.list_id
                 WHERE l.user_id = ?1 AND (?2 IS NULL OR l.name = ?2)
                 ORDER BY i.created_at DESC, i.rowid DESC"
            ))?;
            let candidates = stmt
                .query_map(params![user_id, list_name], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            for name in names {
                for item in candidates.iter().filter(|i| name_contains(&i.name, name)) {
                    if !matched.iter().any(|m| m.id == item.id) {
                        matched.push(item.clone());
                    }
                }
            }
        }

        let now = now_timestamp();
        for item in &matched {
            tx.execute(
                "DELETE FROM shopping_list_items WHERE id = ?1",
                params![item.id],
            )?;
            touch_list_in(&tx, &item.list_id, &now)?;
        }
        tx.commit()?;

        Ok(matched.iter().map(ItemRef::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(name: &str) -> NewShoppingItem {
        NewShoppingItem {
            name: name.to_string(),
            ..NewShoppingItem::default()
        }
    }

    fn item_count(db: &Database) -> i64 {
        db.conn
            .query_row("SELECT COUNT(*) FROM shopping_list_items", [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn test_add_items_creates_list_once() {
        let db = Database::open_in_memory().unwrap();
        let (list, items) = db
            .add_shopping_items("u1", "Shopping List", &[new_item("Milk")])
            .unwrap();
        assert_eq!(list.name, "Shopping List");
        assert_eq!(items.len(), 1);

        let (again, _) = db
            .add_shopping_items("u1", "Shopping List", &[new_item("Eggs"), new_item("Bread")])
            .unwrap();
        assert_eq!(again.id, list.id);
        assert_eq!(db.list_shopping_lists("u1").unwrap().len(), 1);
        assert_eq!(db.shopping_list_items("u1", &list.id).unwrap().len(), 3);

        // another user gets a separate default list
        let (other, _) = db
            .add_shopping_items("u2", "Shopping List", &[new_item("Tea")])
            .unwrap();
        assert_ne!(other.id, list.id);
    }

    #[test]
    fn test_items_order_unchecked_first() {
        let db = Database::open_in_memory().unwrap();
        let (list, items) = db
            .add_shopping_items("u1", "Weekly", &[new_item("A"), new_item("B")])
            .unwrap();
        let conn = &db.conn;
        mark_checked_in(conn, &items[1]).unwrap();
        let ordered = db.shopping_list_items("u1", &list.id).unwrap();
        assert_eq!(ordered[0].name, "A");
        assert!(ordered[1].checked);
    }

    #[test]
    fn test_delete_list_removes_items() {
        let db = Database::open_in_memory().unwrap();
        let (list, _) = db
            .add_shopping_items("u1", "Costco", &[new_item("Water"), new_item("Rice")])
            .unwrap();
        assert!(db.delete_shopping_list("u2", &list.id).unwrap().is_none());
        assert_eq!(item_count(&db), 2);

        let deleted = db.delete_shopping_list("u1", &list.id).unwrap().unwrap();
        assert_eq!(deleted.name, "Costco");
        assert_eq!(item_count(&db), 0);
        assert!(db.list_shopping_lists("u1").unwrap().is_empty());
    }

    #[test]
    fn test_rename_is_scoped() {
        let db = Database::open_in_memory().unwrap();
        let list = db.create_shopping_list("u1", "Old").unwrap();
        assert!(db.rename_shopping_list("u2", &list.id, "New").unwrap().is_none());
        let renamed = db
            .rename_shopping_list("u1", &list.id, "New")
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "New");
        assert_eq!(db.list_shopping_lists("u1").unwrap()[0].name, "New");
    }

    #[test]
    fn test_remove_items_by_id_and_name() {
        let db = Database::open_in_memory().unwrap();
        let (_, items) = db
            .add_shopping_items(
                "u1",
                "Shopping List",
                &[new_item("Green apples"), new_item("Red apples"), new_item("Milk")],
            )
            .unwrap();
        let (_, other) = db
            .add_shopping_items("u1", "Party", &[new_item("Apple juice")])
            .unwrap();

        let removed = db
            .remove_shopping_items(
                "u1",
                &[items[2].id.clone()],
                &["apple".to_string()],
                Some("Shopping List"),
            )
            .unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0].name, "Milk");
        assert_eq!(item_count(&db), 1);

        // id given twice and matched again by name is still one removal
        let removed = db
            .remove_shopping_items(
                "u1",
                &[other[0].id.clone(), other[0].id.clone()],
                &["juice".to_string()],
                None,
            )
            .unwrap();
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn test_remove_items_by_accented_name() {
        let db = Database::open_in_memory().unwrap();
        db.add_shopping_items("u1", "Marché", &[new_item("Épinards frais"), new_item("Leeks")])
            .unwrap();

        let removed = db
            .remove_shopping_items("u1", &[], &["ÉPINARDS".to_string()], Some("Marché"))
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "Épinards frais");
        assert_eq!(item_count(&db), 1);
    }

    #[test]
    fn test_owned_items_skips_foreign_ids() {
        let db = Database::open_in_memory().unwrap();
        let (_, mine) = db
            .add_shopping_items("u1", "Shopping List", &[new_item("Milk")])
            .unwrap();
        let (_, theirs) = db
            .add_shopping_items("u2", "Shopping List", &[new_item("Eggs")])
            .unwrap();
        let ids = vec![
            mine[0].id.clone(),
            theirs[0].id.clone(),
            "missing".to_string(),
        ];
        let owned = owned_items_in(&db.conn, "u1", &ids).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "Milk");
    }
}
