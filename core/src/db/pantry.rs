use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use super::{Database, new_id, now_timestamp, parse_optional_column};
use crate::models::{NewPantryItem, PantryCategory, PantryItem, PantryPatch};
use crate::normalize::name_contains;

const PANTRY_COLUMNS: &str = "id, name, category, quantity, unit";

fn pantry_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<PantryItem> {
    Ok(PantryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        category: parse_optional_column(row, 2)?,
        quantity: row.get(3)?,
        unit: row.get(4)?,
    })
}

/// Insert on any connection, including an open transaction.
pub(crate) fn insert_pantry_item_in(
    conn: &Connection,
    user_id: &str,
    item: &NewPantryItem,
) -> Result<PantryItem> {
    let id = new_id();
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO pantry_items (id, user_id, name, category, quantity, unit, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            user_id,
            item.name,
            item.category.map(PantryCategory::as_str),
            item.quantity,
            item.unit,
            now,
        ],
    )?;
    Ok(PantryItem {
        id,
        name: item.name.clone(),
        category: item.category,
        quantity: item.quantity,
        unit: item.unit.clone(),
    })
}

impl Database {
    pub fn insert_pantry_item(&self, user_id: &str, item: &NewPantryItem) -> Result<PantryItem> {
        insert_pantry_item_in(&self.conn, user_id, item)
    }

    pub fn get_pantry_item(&self, user_id: &str, id: &str) -> Result<Option<PantryItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                pantry_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Whole pantry, most recently added first.
    pub fn list_pantry(&self, user_id: &str) -> Result<Vec<PantryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PANTRY_COLUMNS} FROM pantry_items
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let items = stmt
            .query_map(params![user_id], pantry_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn update_pantry_item(
        &self,
        user_id: &str,
        id: &str,
        patch: &PantryPatch,
    ) -> Result<Option<PantryItem>> {
        let rows = self.conn.execute(
            "UPDATE pantry_items SET
                name = COALESCE(?3, name),
                category = COALESCE(?4, category),
                quantity = COALESCE(?5, quantity),
                unit = COALESCE(?6, unit),
                updated_at = ?7
             WHERE id = ?1 AND user_id = ?2",
            params![
                id,
                user_id,
                patch.name,
                patch.category.map(PantryCategory::as_str),
                patch.quantity,
                patch.unit,
                now_timestamp(),
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_pantry_item(user_id, id)
    }

    pub fn delete_pantry_item(&self, user_id: &str, id: &str) -> Result<Option<PantryItem>> {
        let Some(item) = self.get_pantry_item(user_id, id)? else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM pantry_items WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(Some(item))
    }

    /// Remove the most recently added item whose name contains `term`.
    pub fn delete_pantry_item_by_name(
        &self,
        user_id: &str,
        term: &str,
    ) -> Result<Option<PantryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PANTRY_COLUMNS} FROM pantry_items
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let items = stmt
            .query_map(params![user_id], pantry_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let Some(item) = items.into_iter().find(|i| name_contains(&i.name, term)) else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM pantry_items WHERE id = ?1 AND user_id = ?2",
            params![item.id, user_id],
        )?;
        Ok(Some(item))
    }
}
