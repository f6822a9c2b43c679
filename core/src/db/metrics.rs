use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};

use super::{Database, new_id, now_timestamp};
use crate::models::{MetricKind, WaterTotal, WeightEntry};

/// Outcome of a weight write: `replaced` is true when the day already had one.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightWrite {
    pub entry: WeightEntry,
    pub replaced: bool,
}

fn day_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Database {
    fn weight_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightEntry {
            id: row.get(0)?,
            weight: row.get(1)?,
            date: row.get(2)?,
        })
    }

    /// Add `delta` to the day's running water ledger.
    ///
    /// `net_value` keeps the unclamped sum of every delta; `value` is that sum
    /// floored at zero, so the visible total never goes negative and the order
    /// deltas arrive in does not change the result.
    pub fn add_water(&self, user_id: &str, date: NaiveDate, delta: i32) -> Result<WaterTotal> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_timestamp();
        let date_str = day_str(date);
        tx.execute(
            "INSERT INTO body_metric_logs (id, user_id, kind, date, value, net_value, logged_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, MAX(0, ?5), ?5, ?6, ?6, ?6)
             ON CONFLICT(user_id, kind, date) DO UPDATE SET
                net_value = body_metric_logs.net_value + excluded.net_value,
                value = MAX(0, body_metric_logs.net_value + excluded.net_value),
                logged_at = excluded.logged_at,
                updated_at = excluded.updated_at",
            params![
                new_id(),
                user_id,
                MetricKind::Water.as_str(),
                date_str,
                f64::from(delta),
                now
            ],
        )?;
        let amount: f64 = tx
            .query_row(
                "SELECT value FROM body_metric_logs WHERE user_id = ?1 AND kind = ?2 AND date = ?3",
                params![user_id, MetricKind::Water.as_str(), date_str],
                |row| row.get(0),
            )
            .context("Water log not found after upsert")?;
        tx.commit()?;
        Ok(WaterTotal {
            date: date_str,
            amount: amount.round() as i64,
        })
    }

    pub fn water_total(&self, user_id: &str, date: NaiveDate) -> Result<i64> {
        let amount: Option<f64> = self
            .conn
            .query_row(
                "SELECT value FROM body_metric_logs WHERE user_id = ?1 AND kind = ?2 AND date = ?3",
                params![user_id, MetricKind::Water.as_str(), day_str(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(amount.map_or(0, |v| v.round() as i64))
    }

    /// Write the day's weight, replacing any same-day value.
    pub fn upsert_weight(&self, user_id: &str, date: NaiveDate, weight: f64) -> Result<WeightWrite> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_timestamp();
        let date_str = day_str(date);
        let replaced: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM body_metric_logs WHERE user_id = ?1 AND kind = ?2 AND date = ?3)",
            params![user_id, MetricKind::Weight.as_str(), date_str],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO body_metric_logs (id, user_id, kind, date, value, net_value, logged_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?6, ?6)
             ON CONFLICT(user_id, kind, date) DO UPDATE SET
                value = excluded.value,
                net_value = excluded.net_value,
                logged_at = excluded.logged_at,
                updated_at = excluded.updated_at",
            params![
                new_id(),
                user_id,
                MetricKind::Weight.as_str(),
                date_str,
                weight,
                now
            ],
        )?;
        let entry = tx
            .query_row(
                "SELECT id, value, date FROM body_metric_logs
                 WHERE user_id = ?1 AND kind = ?2 AND date = ?3",
                params![user_id, MetricKind::Weight.as_str(), date_str],
                Self::weight_from_row,
            )
            .context("Weight entry not found after upsert")?;
        tx.commit()?;
        Ok(WeightWrite { entry, replaced })
    }

    /// Latest weight dated strictly before `date`.
    pub fn weight_before(&self, user_id: &str, date: NaiveDate) -> Result<Option<WeightEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, value, date FROM body_metric_logs
                 WHERE user_id = ?1 AND kind = ?2 AND date < ?3
                 ORDER BY date DESC LIMIT 1",
                params![user_id, MetricKind::Weight.as_str(), day_str(date)],
                Self::weight_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Weight history, newest date first.
    pub fn weight_history(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<WeightEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, date FROM body_metric_logs
             WHERE user_id = ?1 AND kind = ?2
             ORDER BY date DESC LIMIT ?3",
        )?;
        // a negative LIMIT means no limit in SQLite
        let entries = stmt
            .query_map(
                params![user_id, MetricKind::Weight.as_str(), limit.unwrap_or(-1)],
                Self::weight_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn weight_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeightEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, date FROM body_metric_logs
             WHERE user_id = ?1 AND kind = ?2 AND date >= ?3 AND date <= ?4
             ORDER BY date DESC",
        )?;
        let entries = stmt
            .query_map(
                params![
                    user_id,
                    MetricKind::Weight.as_str(),
                    day_str(start),
                    day_str(end)
                ],
                Self::weight_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    #[cfg(test)]
    pub(crate) fn metric_row_count(&self, user_id: &str, kind: MetricKind) -> i64 {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM body_metric_logs WHERE user_id = ?1 AND kind = ?2",
                params![user_id, kind.as_str()],
                |row| row.get(0),
            )
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_water_accumulates_per_day() {
        let db = Database::open_in_memory().unwrap();
        let d = day("2024-03-01");
        assert_eq!(db.add_water("u1", d, 8).unwrap().amount, 8);
        assert_eq!(db.add_water("u1", d, 16).unwrap().amount, 24);
        assert_eq!(db.add_water("u1", day("2024-03-02"), 8).unwrap().amount, 8);
        assert_eq!(db.water_total("u1", d).unwrap(), 24);
        assert_eq!(db.water_total("u2", d).unwrap(), 0);
        assert_eq!(db.metric_row_count("u1", MetricKind::Water), 2);
    }

    #[test]
    fn test_water_never_negative_and_associative() {
        let db = Database::open_in_memory().unwrap();
        let d = day("2024-03-01");
        assert_eq!(db.add_water("u1", d, 16).unwrap().amount, 16);
        assert_eq!(db.add_water("u1", d, -50).unwrap().amount, 0);
        assert_eq!(db.add_water("u1", d, 10).unwrap().amount, 0);

        let stored: f64 = db
            .conn
            .query_row(
                "SELECT MIN(value) FROM body_metric_logs WHERE kind = 'water'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(stored >= 0.0);

        // first write of the day may itself be a correction
        assert_eq!(db.add_water("u1", day("2024-03-02"), -8).unwrap().amount, 0);
    }

    #[test]
    fn test_weight_upsert_replaces_same_day() {
        let db = Database::open_in_memory().unwrap();
        let d = day("2024-03-01");
        let first = db.upsert_weight("u1", d, 180.0).unwrap();
        assert!(!first.replaced);
        let second = db.upsert_weight("u1", d, 179.4).unwrap();
        assert!(second.replaced);
        assert_eq!(second.entry.weight, 179.4);
        assert_eq!(second.entry.id, first.entry.id);
        assert_eq!(db.metric_row_count("u1", MetricKind::Weight), 1);
    }

    #[test]
    fn test_weight_before_and_history() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_weight("u1", day("2024-03-01"), 180.0).unwrap();
        db.upsert_weight("u1", day("2024-03-05"), 178.0).unwrap();
        db.upsert_weight("u1", day("2024-03-03"), 179.0).unwrap();

        let prev = db.weight_before("u1", day("2024-03-05")).unwrap().unwrap();
        assert_eq!(prev.date, "2024-03-03");
        assert!(db.weight_before("u1", day("2024-03-01")).unwrap().is_none());

        let all = db.weight_history("u1", None).unwrap();
        let dates: Vec<&str> = all.iter().map(|w| w.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-05", "2024-03-03", "2024-03-01"]);
        assert_eq!(db.weight_history("u1", Some(1)).unwrap().len(), 1);

        let range = db
            .weight_range("u1", day("2024-03-02"), day("2024-03-05"))
            .unwrap();
        assert_eq!(range.len(), 2);
    }

    #[test]
    fn test_water_and_weight_share_a_day() {
        let db = Database::open_in_memory().unwrap();
        let d = day("2024-03-01");
        db.upsert_weight("u1", d, 80.0).unwrap();
        db.add_water("u1", d, 500).unwrap();
        assert_eq!(db.metric_row_count("u1", MetricKind::Weight), 1);
        assert_eq!(db.metric_row_count("u1", MetricKind::Water), 1);
        assert_eq!(db.weight_history("u1", None).unwrap()[0].weight, 80.0);
    }
}
