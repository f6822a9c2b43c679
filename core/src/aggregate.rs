//! Derived numbers: macro totals, water goal progress and weight trends.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::{MealEntry, WeightEntry};
use crate::normalize::round1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MacroTotals {
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
}

/// Sum over exactly the entries given; missing macros count as zero.
pub fn meal_totals(meals: &[MealEntry]) -> MacroTotals {
    meals.iter().fold(MacroTotals::default(), |acc, m| MacroTotals {
        calories: acc.calories + m.calories,
        protein: acc.protein + m.protein.unwrap_or(0),
        carbs: acc.carbs + m.carbs.unwrap_or(0),
        fat: acc.fat + m.fat.unwrap_or(0),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterProgress {
    pub total: i64,
    pub water_goal: i64,
    pub remaining: i64,
    pub percent_complete: i64,
    pub goal_reached: bool,
}

pub fn water_progress(total: i64, goal: i64) -> WaterProgress {
    let percent_complete = if goal > 0 {
        ((total as f64 / goal as f64) * 100.0).round() as i64
    } else {
        100
    };
    WaterProgress {
        total,
        water_goal: goal,
        remaining: (goal - total).max(0),
        percent_complete,
        goal_reached: total >= goal,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTrend {
    pub current_weight: f64,
    pub starting_weight: f64,
    pub total_change: f64,
    pub weekly_change: Option<f64>,
    pub monthly_change: Option<f64>,
    pub remaining_to_goal: Option<f64>,
    pub total_entries: usize,
    pub first_entry: String,
    pub last_entry: String,
}

/// Trend over a history sorted newest first. `None` for an empty history.
///
/// Weekly and monthly deltas compare against the most recent entry dated on
/// or before `today - 7` / `today - 30` days.
pub fn weight_trend(
    history: &[WeightEntry],
    today: NaiveDate,
    goal: Option<f64>,
) -> Option<WeightTrend> {
    let newest = history.first()?;
    let oldest = history.last()?;
    let current = newest.weight;

    let change_since = |days: u64| {
        let cutoff = today.checked_sub_days(Days::new(days))?;
        let cutoff = cutoff.format("%Y-%m-%d").to_string();
        history
            .iter()
            .find(|w| w.date <= cutoff)
            .map(|w| round1(current - w.weight))
    };

    Some(WeightTrend {
        current_weight: current,
        starting_weight: oldest.weight,
        total_change: round1(current - oldest.weight),
        weekly_change: change_since(7),
        monthly_change: change_since(30),
        remaining_to_goal: goal.map(|g| round1(current - g)),
        total_entries: history.len(),
        first_entry: oldest.date.clone(),
        last_entry: newest.date.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(calories: i64, protein: Option<i64>) -> MealEntry {
        MealEntry {
            id: "m".to_string(),
            name: "x".to_string(),
            calories,
            protein,
            carbs: Some(1),
            fat: None,
            servings: 1.0,
            date: "2024-03-01".to_string(),
            logged_at: "2024-03-01T12:00:00.000000Z".to_string(),
        }
    }

    fn weight(date: &str, value: f64) -> WeightEntry {
        WeightEntry {
            id: date.to_string(),
            weight: value,
            date: date.to_string(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_meal_totals() {
        let totals = meal_totals(&[meal(300, Some(20)), meal(450, None)]);
        assert_eq!(
            totals,
            MacroTotals {
                calories: 750,
                protein: 20,
                carbs: 2,
                fat: 0
            }
        );
        assert_eq!(meal_totals(&[]), MacroTotals::default());
    }

    #[test]
    fn test_water_progress() {
        let p = water_progress(48, 64);
        assert_eq!(p.remaining, 16);
        assert_eq!(p.percent_complete, 75);
        assert!(!p.goal_reached);

        let over = water_progress(80, 64);
        assert_eq!(over.remaining, 0);
        assert_eq!(over.percent_complete, 125);
        assert!(over.goal_reached);
    }

    #[test]
    fn test_weight_trend_single_point() {
        let trend = weight_trend(&[weight("2024-03-10", 180.0)], day("2024-03-10"), None).unwrap();
        assert_eq!(trend.total_change, 0.0);
        assert_eq!(trend.weekly_change, None);
        assert_eq!(trend.monthly_change, None);
        assert_eq!(trend.total_entries, 1);
        assert_eq!(trend.first_entry, "2024-03-10");
    }

    #[test]
    fn test_weight_trend_windows() {
        let history = vec![
            weight("2024-03-31", 175.0),
            weight("2024-03-26", 176.2),
            weight("2024-03-20", 177.0),
            weight("2024-02-25", 180.3),
        ];
        let trend = weight_trend(&history, day("2024-03-31"), Some(170.0)).unwrap();
        assert_eq!(trend.current_weight, 175.0);
        assert_eq!(trend.starting_weight, 180.3);
        assert_eq!(trend.total_change, -5.3);
        // 2024-03-24 cutoff: 03-20 is the latest entry at or before it
        assert_eq!(trend.weekly_change, Some(-2.0));
        // 2024-03-01 cutoff
        assert_eq!(trend.monthly_change, Some(-5.3));
        assert_eq!(trend.remaining_to_goal, Some(5.0));
        assert_eq!(trend.last_entry, "2024-03-31");
    }

    #[test]
    fn test_weight_trend_empty() {
        assert!(weight_trend(&[], day("2024-03-31"), None).is_none());
    }
}
