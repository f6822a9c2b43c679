use anyhow::Result;
use chrono::{NaiveDate, SecondsFormat};
use rusqlite::{OptionalExtension, params};

use super::{Database, new_id, now_timestamp};
use crate::models::{FrequentMeal, MealEntry, MealPatch, NewMealEntry};
use crate::normalize::{grouping_key, name_contains};

const MEAL_COLUMNS: &str =
    "id, name, calories, protein, carbs, fat, servings, date, logged_at";

/// Row selection for a meal history lookup. Every mode orders newest first.
#[derive(Debug, Clone, PartialEq)]
pub enum MealQuery {
    Recent { limit: i64 },
    ByDate { date: NaiveDate },
    Search { term: String, limit: i64 },
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
    },
}

impl Database {
    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealEntry> {
        Ok(MealEntry {
            id: row.get(0)?,
            name: row.get(1)?,
            calories: row.get(2)?,
            protein: row.get(3)?,
            carbs: row.get(4)?,
            fat: row.get(5)?,
            servings: row.get(6)?,
            date: row.get(7)?,
            logged_at: row.get(8)?,
        })
    }

    pub fn insert_meal(&self, user_id: &str, entry: &NewMealEntry) -> Result<MealEntry> {
        let id = new_id();
        let now = now_timestamp();
        let logged_at = entry.logged_at.map_or_else(
            || now.clone(),
            |t| t.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        self.conn.execute(
            "INSERT INTO meal_entries (id, user_id, name, calories, protein, carbs, fat, servings, date, logged_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                id,
                user_id,
                entry.name,
                entry.calories,
                entry.protein,
                entry.carbs,
                entry.fat,
                entry.servings,
                entry.date.format("%Y-%m-%d").to_string(),
                logged_at,
                now,
            ],
        )?;
        Ok(MealEntry {
            id,
            name: entry.name.clone(),
            calories: entry.calories,
            protein: entry.protein,
            carbs: entry.carbs,
            fat: entry.fat,
            servings: entry.servings,
            date: entry.date.format("%Y-%m-%d").to_string(),
            logged_at,
        })
    }

    pub fn get_meal(&self, user_id: &str, id: &str) -> Result<Option<MealEntry>> {
        let meal = self
            .conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM meal_entries WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                Self::meal_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    /// Apply the supplied fields. `None` when the meal is not the caller's.
    pub fn update_meal(
        &self,
        user_id: &str,
        id: &str,
        patch: &MealPatch,
    ) -> Result<Option<MealEntry>> {
        let rows = self.conn.execute(
            "UPDATE meal_entries SET
                name = COALESCE(?3, name),
                calories = COALESCE(?4, calories),
                protein = COALESCE(?5, protein),
                carbs = COALESCE(?6, carbs),
                fat = COALESCE(?7, fat),
                servings = COALESCE(?8, servings),
                updated_at = ?9
             WHERE id = ?1 AND user_id = ?2",
            params![
                id,
                user_id,
                patch.name,
                patch.calories,
                patch.protein,
                patch.carbs,
                patch.fat,
                patch.servings,
                now_timestamp(),
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_meal(user_id, id)
    }

    /// Delete and return the removed row.
    pub fn delete_meal(&self, user_id: &str, id: &str) -> Result<Option<MealEntry>> {
        let Some(meal) = self.get_meal(user_id, id)? else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM meal_entries WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(Some(meal))
    }

    pub fn query_meals(&self, user_id: &str, query: &MealQuery) -> Result<Vec<MealEntry>> {
        let order = "ORDER BY logged_at DESC, rowid DESC";
        let meals = match query {
            MealQuery::Recent { limit } => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {MEAL_COLUMNS} FROM meal_entries WHERE user_id = ?1 {order} LIMIT ?2"
                ))?;
                stmt.query_map(params![user_id, limit], Self::meal_from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            MealQuery::ByDate { date } => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {MEAL_COLUMNS} FROM meal_entries WHERE user_id = ?1 AND date = ?2 {order}"
                ))?;
                stmt.query_map(
                    params![user_id, date.format("%Y-%m-%d").to_string()],
                    Self::meal_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?
            }
            MealQuery::Search { term, limit } => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {MEAL_COLUMNS} FROM meal_entries WHERE user_id = ?1 {order}"
                ))?;
                let all = stmt
                    .query_map(params![user_id], Self::meal_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                all.into_iter()
                    .filter(|m| name_contains(&m.name, term))
                    .take(usize::try_from(*limit).unwrap_or(0))
                    .collect()
            }
            MealQuery::DateRange { start, end, limit } => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {MEAL_COLUMNS} FROM meal_entries
                     WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 {order} LIMIT ?4"
                ))?;
                stmt.query_map(
                    params![
                        user_id,
                        start.format("%Y-%m-%d").to_string(),
                        end.format("%Y-%m-%d").to_string(),
                        limit
                    ],
                    Self::meal_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(meals)
    }

    /// Most often logged meal names since `since`, grouped case- and
    /// whitespace-insensitively. Ties go to the most recently logged.
    pub fn frequent_meals(
        &self,
        user_id: &str,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<FrequentMeal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal_entries
             WHERE user_id = ?1 AND date >= ?2
             ORDER BY logged_at DESC, rowid DESC"
        ))?;
        let meals = stmt
            .query_map(
                params![user_id, since.format("%Y-%m-%d").to_string()],
                Self::meal_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut groups: Vec<(String, FrequentMeal)> = Vec::new();
        for meal in meals {
            let key = grouping_key(&meal.name);
            if let Some((_, group)) = groups.iter_mut().find(|(k, _)| *k == key) {
                group.times_logged += 1;
            } else {
                groups.push((
                    key,
                    FrequentMeal {
                        name: meal.name.split_whitespace().collect::<Vec<_>>().join(" "),
                        times_logged: 1,
                        calories: meal.calories,
                        protein: meal.protein,
                        carbs: meal.carbs,
                        fat: meal.fat,
                    },
                ));
            }
        }
        // stable sort keeps recency order among equal counts
        groups.sort_by(|a, b| b.1.times_logged.cmp(&a.1.times_logged));
        Ok(groups.into_iter().take(limit).map(|(_, g)| g).collect())
    }
}
