use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::{Database, now_timestamp, parse_column};
use crate::models::{DEFAULT_CALORIE_GOAL, GoalsUpdate, Profile, UnitSystem};

impl Database {
    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            units: parse_column(row, 0)?,
            calorie_goal: row.get(1)?,
            weight_goal: row.get(2)?,
            water_goal: row.get(3)?,
            stored: true,
        })
    }

    /// The stored profile, or the defaults when the user never saved one.
    pub fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let profile = self
            .conn
            .query_row(
                "SELECT units, calorie_goal, weight_goal, water_goal
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
                Self::profile_from_row,
            )
            .optional()?;
        Ok(profile.unwrap_or_default())
    }

    /// Create the profile with defaults if missing, then apply only the
    /// supplied goals.
    pub fn update_goals(&self, user_id: &str, goals: &GoalsUpdate) -> Result<Profile> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO profiles (user_id, units, calorie_goal, weight_goal, created_at, updated_at)
             VALUES (?1, 'imperial', COALESCE(?2, ?5), ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                calorie_goal = COALESCE(?2, profiles.calorie_goal),
                weight_goal = COALESCE(?3, profiles.weight_goal),
                updated_at = ?4",
            params![
                user_id,
                goals.calorie_goal,
                goals.weight_goal,
                now,
                DEFAULT_CALORIE_GOAL
            ],
        )?;
        self.get_profile(user_id)
    }

    pub fn set_units(&self, user_id: &str, units: UnitSystem) -> Result<Profile> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO profiles (user_id, units, calorie_goal, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                units = excluded.units,
                updated_at = excluded.updated_at",
            params![user_id, units.as_str(), DEFAULT_CALORIE_GOAL, now],
        )?;
        self.get_profile(user_id)
    }
}
