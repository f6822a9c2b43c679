use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::aggregate::{MacroTotals, meal_totals};
use crate::context::ExecutionContext;
use crate::db::{Database, MealQuery};
use crate::error::{EngineError, ToolError};
use crate::models::{
    FrequentMeal, MealEntry, NewMealEntry, PantryItem, Preference, PreferenceCategory, Profile,
    UnitSystem,
};
use crate::normalize::{int_in_range, parse_optional_day, positive_at_most};
use crate::tools::meals::{MAX_CALORIES, MAX_SERVINGS, macro_grams, meal_name};
use crate::tools::{self, ToolDefinition, ToolName};

const FREQUENT_MEAL_DAYS: u64 = 30;
const FREQUENT_MEAL_COUNT: usize = 5;

/// A meal the user chose to log directly, usually an accepted suggestion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealLog {
    pub name: String,
    pub calories: i64,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
    pub servings: Option<f64>,
    /// Diary date; defaults to the user's local date of `logged_at`.
    pub date: Option<String>,
    pub logged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceGroup {
    pub category: PreferenceCategory,
    pub preferences: Vec<Preference>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterToday {
    pub total: i64,
    pub goal: i64,
    pub unit: &'static str,
}

/// What a chat session needs to brief the model about one user's day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSnapshot {
    pub date: String,
    pub units: UnitSystem,
    pub calorie_goal: i64,
    pub weight_goal: Option<f64>,
    pub consumed: MacroTotals,
    pub remaining_calories: i64,
    pub water: WaterToday,
    pub preferences: Vec<PreferenceGroup>,
    pub pantry: Vec<PantryItem>,
    pub frequent_meals: Vec<FrequentMeal>,
}

/// The tool engine. One connection serves every caller; each invocation
/// holds the lock for the length of one handler.
pub struct SousService {
    db: Mutex<Database>,
}

impl SousService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(Self::from_database(Database::open(db_path)?))
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Tool engine ---

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        tools::tool_definitions()
    }

    /// Run `tool` with `args` on behalf of the caller in `context`.
    ///
    /// Validation and not-found outcomes are `Ok` with `success: false`.
    /// A context without a user id or a storage failure is an `Err`.
    pub fn invoke(&self, tool: &str, args: Value, context: &Value) -> Result<Value, EngineError> {
        let ctx = ExecutionContext::from_value(context)?;
        self.invoke_with(tool, args, &ctx)
    }

    pub fn invoke_with(
        &self,
        tool: &str,
        args: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        let tool = match tool.parse::<ToolName>() {
            Ok(tool) => tool,
            Err(failure) => {
                debug!(tool, user_id = ctx.user_id(), "unknown tool requested");
                return Ok(tools::failure_response(&failure));
            }
        };
        let db = self.db();
        Ok(tools::dispatch(&db, tool, args, ctx)?)
    }

    // --- Direct operations ---

    pub fn log_meal(&self, ctx: &ExecutionContext, meal: MealLog) -> Result<MealEntry, ToolError> {
        let date = match parse_optional_day("date", meal.date.as_deref())? {
            Some(date) => date,
            None => ctx.date_at(meal.logged_at.unwrap_or_else(Utc::now)),
        };
        let entry = NewMealEntry {
            name: meal_name(&meal.name)?,
            calories: int_in_range("calories", meal.calories, 0, MAX_CALORIES)?,
            protein: macro_grams("protein", meal.protein)?,
            carbs: macro_grams("carbs", meal.carbs)?,
            fat: macro_grams("fat", meal.fat)?,
            servings: positive_at_most("servings", meal.servings.unwrap_or(1.0), MAX_SERVINGS)?,
            date,
            logged_at: meal.logged_at,
        };
        let logged = self.db().insert_meal(ctx.user_id(), &entry)?;
        info!(user_id = ctx.user_id(), meal_id = %logged.id, calories = logged.calories, "meal logged");
        Ok(logged)
    }

    /// Most-logged meal names over the last 30 days.
    pub fn frequent_meals(&self, ctx: &ExecutionContext) -> Result<Vec<FrequentMeal>> {
        let today = ctx.today();
        let since = today
            .checked_sub_days(Days::new(FREQUENT_MEAL_DAYS))
            .unwrap_or(today);
        self.db()
            .frequent_meals(ctx.user_id(), since, FREQUENT_MEAL_COUNT)
    }

    pub fn snapshot(&self, ctx: &ExecutionContext) -> Result<AssistantSnapshot> {
        let user_id = ctx.user_id();
        let today = ctx.today();
        let db = self.db();

        let profile = db.get_profile(user_id)?;
        let meals = db.query_meals(user_id, &MealQuery::ByDate { date: today })?;
        let consumed = meal_totals(&meals);

        let mut grouped: BTreeMap<PreferenceCategory, Vec<Preference>> = BTreeMap::new();
        for pref in db.list_preferences(user_id)? {
            grouped.entry(pref.category).or_default().push(pref);
        }
        let since = today
            .checked_sub_days(Days::new(FREQUENT_MEAL_DAYS))
            .unwrap_or(today);

        Ok(AssistantSnapshot {
            date: today.format("%Y-%m-%d").to_string(),
            units: profile.units,
            calorie_goal: profile.calorie_goal,
            weight_goal: profile.weight_goal,
            remaining_calories: (profile.calorie_goal - consumed.calories).max(0),
            consumed,
            water: WaterToday {
                total: db.water_total(user_id, today)?,
                goal: profile.effective_water_goal(),
                unit: profile.units.water_unit(),
            },
            preferences: grouped
                .into_iter()
                .map(|(category, preferences)| PreferenceGroup {
                    category,
                    preferences,
                })
                .collect(),
            pantry: db.list_pantry(user_id)?,
            frequent_meals: db.frequent_meals(user_id, since, FREQUENT_MEAL_COUNT)?,
        })
    }

    pub fn profile(&self, user_id: &str) -> Result<Profile> {
        self.db().get_profile(user_id)
    }

    pub fn set_units(&self, user_id: &str, units: UnitSystem) -> Result<Profile> {
        let profile = self.db().set_units(user_id, units)?;
        info!(user_id, units = %units, "unit system changed");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        json!({"userId": "u1", "timezone": "America/Chicago"})
    }

    fn meal(name: &str, calories: i64) -> MealLog {
        MealLog {
            name: name.to_string(),
            calories,
            protein: Some(20),
            ..MealLog::default()
        }
    }

    #[test]
    fn test_invoke_requires_identity() {
        let svc = SousService::new_in_memory().unwrap();
        let err = svc
            .invoke("meals", json!({"operation": "query", "queryType": "recent"}), &json!({}))
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingIdentity));
        assert_eq!(
            err.to_string(),
            "Invalid tool execution context: missing userId"
        );
    }

    #[test]
    fn test_invoke_unknown_tool_is_reported() {
        let svc = SousService::new_in_memory().unwrap();
        let result = svc.invoke("recipes", json!({}), &ctx()).unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Unknown tool: recipes");
    }

    #[test]
    fn test_invoke_reports_validation_failures() {
        let svc = SousService::new_in_memory().unwrap();
        let result = svc
            .invoke("meals", json!({"operation": "delete"}), &ctx())
            .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "mealId is required for delete operation");

        let result = svc.invoke("pantry", json!("oops"), &ctx()).unwrap();
        assert_eq!(result["success"], false);
        assert!(
            result["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid arguments:")
        );
    }

    #[test]
    fn test_suggestion_then_log() {
        let svc = SousService::new_in_memory().unwrap();
        let suggestion = svc
            .invoke(
                "suggest_food",
                json!({"name": "Greek yogurt bowl", "calories": 320, "protein": 25, "carbs": 30, "fat": 9}),
                &ctx(),
            )
            .unwrap();
        assert_eq!(suggestion["success"], true);
        let recent = svc
            .invoke("meals", json!({"operation": "query", "queryType": "recent"}), &ctx())
            .unwrap();
        assert_eq!(recent["count"], 0);

        let exec = ExecutionContext::from_value(&ctx()).unwrap();
        let logged = svc
            .log_meal(
                &exec,
                MealLog {
                    name: "Greek yogurt bowl".to_string(),
                    calories: 320,
                    protein: Some(25),
                    carbs: Some(30),
                    fat: Some(9),
                    ..MealLog::default()
                },
            )
            .unwrap();
        assert_eq!(logged.date, exec.today().format("%Y-%m-%d").to_string());
        assert!((logged.servings - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_meal_validation() {
        let svc = SousService::new_in_memory().unwrap();
        let ctx = ExecutionContext::new("u1", None).unwrap();
        let err = svc.log_meal(&ctx, meal("", 100)).unwrap_err();
        assert_eq!(err.to_string(), "name must not be empty");
        let err = svc.log_meal(&ctx, meal("Pie", -5)).unwrap_err();
        assert_eq!(err.to_string(), "calories must be between 0 and 50000");
    }

    #[test]
    fn test_log_meal_dates_by_user_timezone() {
        let svc = SousService::new_in_memory().unwrap();
        let ctx = ExecutionContext::new("u1", Some("America/New_York")).unwrap();
        let logged_at = "2024-03-02T03:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let logged = svc
            .log_meal(
                &ctx,
                MealLog {
                    logged_at: Some(logged_at),
                    ..meal("Late pizza", 600)
                },
            )
            .unwrap();
        assert_eq!(logged.date, "2024-03-01");
    }

    #[test]
    fn test_snapshot() {
        let svc = SousService::new_in_memory().unwrap();
        let ctx = ExecutionContext::new("u1", None).unwrap();
        svc.log_meal(&ctx, meal("Oatmeal", 400)).unwrap();
        svc.log_meal(&ctx, meal("oatmeal ", 2000)).unwrap();
        for args in [
            json!({"operation": "set_preference", "category": "dislike", "value": "Cilantro"}),
            json!({"operation": "set_preference", "category": "like", "value": "Tacos"}),
            json!({"operation": "set_preference", "category": "dislike", "value": "Olives"}),
        ] {
            svc.invoke_with("preferences", args, &ctx).unwrap();
        }
        svc.invoke_with(
            "pantry",
            json!({"operation": "add", "name": "Eggs", "category": "dairy"}),
            &ctx,
        )
        .unwrap();

        let snap = svc.snapshot(&ctx).unwrap();
        assert_eq!(snap.calorie_goal, 2200);
        assert_eq!(snap.consumed.calories, 2400);
        assert_eq!(snap.consumed.protein, 40);
        assert_eq!(snap.remaining_calories, 0);
        assert_eq!(snap.water.goal, 64);
        assert_eq!(snap.preferences.len(), 2);
        assert_eq!(snap.preferences[0].category, PreferenceCategory::Like);
        assert_eq!(snap.preferences[1].preferences.len(), 2);
        assert_eq!(snap.pantry.len(), 1);
        assert_eq!(snap.frequent_meals.len(), 1);
        assert_eq!(snap.frequent_meals[0].times_logged, 2);
    }

    #[test]
    fn test_profile_units() {
        let svc = SousService::new_in_memory().unwrap();
        assert_eq!(svc.profile("u1").unwrap().units, UnitSystem::Imperial);
        svc.set_units("u1", UnitSystem::Metric).unwrap();
        assert_eq!(svc.profile("u1").unwrap().units, UnitSystem::Metric);
        assert_eq!(svc.profile("u2").unwrap().units, UnitSystem::Imperial);
    }

    #[test]
    fn test_frequent_meals() {
        let svc = SousService::new_in_memory().unwrap();
        let ctx = ExecutionContext::new("u1", None).unwrap();
        for name in ["Coffee", "Toast", "coffee", "Salad", "Coffee", "Toast"] {
            svc.log_meal(&ctx, meal(name, 100)).unwrap();
        }
        let top = svc.frequent_meals(&ctx).unwrap();
        assert_eq!(top[0].times_logged, 3);
        assert_eq!(top[1].name, "Toast");
        assert_eq!(top.len(), 3);
    }
}
