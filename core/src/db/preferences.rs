use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use super::{Database, new_id, now_timestamp, parse_column};
use crate::models::{Preference, PreferenceCategory};
use crate::normalize::normalize_key;

#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceWrite {
    pub preference: Preference,
    pub already_existed: bool,
}

impl Database {
    fn preference_from_row(row: &rusqlite::Row) -> rusqlite::Result<Preference> {
        Ok(Preference {
            id: row.get(0)?,
            category: parse_column(row, 1)?,
            value: row.get(2)?,
            notes: row.get(3)?,
        })
    }

    pub fn find_preference(
        &self,
        user_id: &str,
        category: PreferenceCategory,
        value: &str,
    ) -> Result<Option<Preference>> {
        let pref = self
            .conn
            .query_row(
                "SELECT id, category, value, notes FROM preferences
                 WHERE user_id = ?1 AND category = ?2 AND value = ?3",
                params![user_id, category.as_str(), normalize_key(value)],
                Self::preference_from_row,
            )
            .optional()?;
        Ok(pref)
    }

    /// Insert the preference, or on an existing (category, value) key replace
    /// its notes when non-empty notes are given. Empty notes never clear.
    pub fn upsert_preference(
        &self,
        user_id: &str,
        category: PreferenceCategory,
        value: &str,
        notes: Option<&str>,
    ) -> Result<PreferenceWrite> {
        let key = normalize_key(value);
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let now = now_timestamp();

        let tx = self.conn.unchecked_transaction()?;
        let already_existed: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM preferences WHERE user_id = ?1 AND category = ?2 AND value = ?3)",
            params![user_id, category.as_str(), key],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO preferences (id, user_id, category, value, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(user_id, category, value) DO UPDATE SET
                notes = COALESCE(excluded.notes, preferences.notes),
                updated_at = CASE WHEN excluded.notes IS NULL
                                  THEN preferences.updated_at
                                  ELSE excluded.updated_at END",
            params![new_id(), user_id, category.as_str(), key, notes, now],
        )?;
        let preference = tx
            .query_row(
                "SELECT id, category, value, notes FROM preferences
                 WHERE user_id = ?1 AND category = ?2 AND value = ?3",
                params![user_id, category.as_str(), key],
                Self::preference_from_row,
            )
            .context("Preference not found after upsert")?;
        tx.commit()?;

        Ok(PreferenceWrite {
            preference,
            already_existed,
        })
    }

    /// Remove by identity key. `None` when no such preference exists.
    pub fn delete_preference(
        &self,
        user_id: &str,
        category: PreferenceCategory,
        value: &str,
    ) -> Result<Option<Preference>> {
        let Some(existing) = self.find_preference(user_id, category, value)? else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM preferences WHERE id = ?1 AND user_id = ?2",
            params![existing.id, user_id],
        )?;
        Ok(Some(existing))
    }

    pub fn list_preferences(&self, user_id: &str) -> Result<Vec<Preference>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, category, value, notes FROM preferences
             WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let prefs = stmt
            .query_map(params![user_id], Self::preference_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_dedupes_case_insensitively() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .upsert_preference("u1", PreferenceCategory::Dislike, "Mushrooms", None)
            .unwrap();
        assert!(!first.already_existed);
        assert_eq!(first.preference.value, "mushrooms");

        let second = db
            .upsert_preference(
                "u1",
                PreferenceCategory::Dislike,
                "  mushrooms ",
                Some("texture"),
            )
            .unwrap();
        assert!(second.already_existed);
        assert_eq!(second.preference.id, first.preference.id);
        assert_eq!(second.preference.notes.as_deref(), Some("texture"));
        assert_eq!(db.list_preferences("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_notes_do_not_clear() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_preference("u1", PreferenceCategory::Allergy, "peanuts", Some("severe"))
            .unwrap();
        let again = db
            .upsert_preference("u1", PreferenceCategory::Allergy, "Peanuts", Some(""))
            .unwrap();
        assert_eq!(again.preference.notes.as_deref(), Some("severe"));
        let again = db
            .upsert_preference("u1", PreferenceCategory::Allergy, "peanuts", None)
            .unwrap();
        assert_eq!(again.preference.notes.as_deref(), Some("severe"));
    }

    #[test]
    fn test_same_value_in_other_category_is_distinct() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_preference("u1", PreferenceCategory::Like, "spicy", None)
            .unwrap();
        db.upsert_preference("u1", PreferenceCategory::Dislike, "spicy", None)
            .unwrap();
        db.upsert_preference("u2", PreferenceCategory::Like, "spicy", None)
            .unwrap();
        assert_eq!(db.list_preferences("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_preference() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_preference("u1", PreferenceCategory::Cuisine, "Thai", None)
            .unwrap();
        assert!(
            db.delete_preference("u2", PreferenceCategory::Cuisine, "thai")
                .unwrap()
                .is_none()
        );
        let removed = db
            .delete_preference("u1", PreferenceCategory::Cuisine, "THAI")
            .unwrap()
            .unwrap();
        assert_eq!(removed.value, "thai");
        assert!(db.list_preferences("u1").unwrap().is_empty());
    }
}
