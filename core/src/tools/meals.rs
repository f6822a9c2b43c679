use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::respond;
use crate::aggregate::{MacroTotals, meal_totals};
use crate::context::ExecutionContext;
use crate::db::{Database, MealQuery};
use crate::error::{ToolError, ToolFailure};
use crate::models::{MealEntry, MealPatch};
use crate::normalize::{
    int_in_range, limit, max_chars, non_blank, parse_day, positive_at_most, required,
};

pub const DESCRIPTION: &str = "Query, edit, or delete meals from the user's food diary.

OPERATIONS:
- \"query\": Search or retrieve meal history (\"what did I eat yesterday?\", \"when did I last have pizza?\")
- \"edit\": Change an existing meal's name, calories, macros, or servings. Requires mealId.
- \"delete\": Remove a meal from the log. Requires mealId.

QUERY TYPES (for \"query\"):
- \"recent\": Latest meals (default limit: 10)
- \"by_date\": All meals for one date
- \"search\": Meals whose name contains searchTerm
- \"date_range\": Meals between startDate and endDate

To edit or delete, query first to find the meal ID.";

pub const OPERATIONS: &[&str] = &["query", "edit", "delete"];

pub(crate) const MAX_CALORIES: i64 = 50_000;
pub(crate) const MAX_MACRO_GRAMS: i64 = 5_000;
pub(crate) const MAX_SERVINGS: f64 = 100.0;
pub(crate) const MAX_NAME_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MealsOperation {
    Query,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MealQueryType {
    Recent,
    ByDate,
    Search,
    DateRange,
}

/// Arguments for the `meals` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MealsInput {
    /// Operation to perform
    pub operation: MealsOperation,
    /// Type of query (required for "query")
    pub query_type: Option<MealQueryType>,
    /// Date in YYYY-MM-DD format (for by_date)
    pub date: Option<String>,
    /// Start date YYYY-MM-DD (for date_range)
    pub start_date: Option<String>,
    /// End date YYYY-MM-DD (for date_range)
    pub end_date: Option<String>,
    /// Food name to search for
    pub search_term: Option<String>,
    /// Max results (default: 10, max: 100)
    pub limit: Option<i64>,
    /// Meal ID (required for edit/delete)
    pub meal_id: Option<String>,
    /// New meal name
    pub name: Option<String>,
    /// New calories
    pub calories: Option<i64>,
    /// New protein (g)
    pub protein: Option<i64>,
    /// New carbs (g)
    pub carbs: Option<i64>,
    /// New fat (g)
    pub fat: Option<i64>,
    /// New servings count
    pub servings: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum MealsOp {
    Query(MealQuery),
    Edit { meal_id: String, patch: MealPatch },
    Delete { meal_id: String },
}

impl MealsInput {
    pub fn into_op(self) -> Result<MealsOp, ToolFailure> {
        match self.operation {
            MealsOperation::Delete => {
                let meal_id = required(
                    non_blank(self.meal_id),
                    "mealId is required for delete operation",
                )?;
                Ok(MealsOp::Delete { meal_id })
            }
            MealsOperation::Edit => {
                let meal_id = required(
                    non_blank(self.meal_id),
                    "mealId is required for edit operation",
                )?;
                let patch = MealPatch {
                    name: match self.name {
                        Some(name) => Some(meal_name(&name)?),
                        None => None,
                    },
                    calories: self
                        .calories
                        .map(|v| int_in_range("calories", v, 0, MAX_CALORIES))
                        .transpose()?,
                    protein: macro_grams("protein", self.protein)?,
                    carbs: macro_grams("carbs", self.carbs)?,
                    fat: macro_grams("fat", self.fat)?,
                    servings: self
                        .servings
                        .map(|v| positive_at_most("servings", v, MAX_SERVINGS))
                        .transpose()?,
                };
                if patch.is_empty() {
                    return Err(ToolFailure::validation(
                        "At least one field (name, calories, protein, carbs, fat, servings) must be provided for edit",
                    ));
                }
                Ok(MealsOp::Edit { meal_id, patch })
            }
            MealsOperation::Query => {
                let query_type = required(
                    self.query_type,
                    "queryType is required for query operation",
                )?;
                let query = match query_type {
                    MealQueryType::Recent => MealQuery::Recent {
                        limit: limit(self.limit)?,
                    },
                    MealQueryType::ByDate => {
                        let raw = required(
                            non_blank(self.date),
                            "date is required for by_date query",
                        )?;
                        MealQuery::ByDate {
                            date: parse_day("date", &raw)?,
                        }
                    }
                    MealQueryType::Search => {
                        let term = required(
                            non_blank(self.search_term),
                            "searchTerm is required for search query",
                        )?;
                        max_chars("searchTerm", &term, MAX_NAME_CHARS)?;
                        MealQuery::Search {
                            term,
                            limit: limit(self.limit)?,
                        }
                    }
                    MealQueryType::DateRange => {
                        let (Some(start), Some(end)) =
                            (non_blank(self.start_date), non_blank(self.end_date))
                        else {
                            return Err(ToolFailure::validation(
                                "startDate and endDate are required for date_range query",
                            ));
                        };
                        MealQuery::DateRange {
                            start: parse_day("startDate", &start)?,
                            end: parse_day("endDate", &end)?,
                            limit: limit(self.limit)?,
                        }
                    }
                };
                Ok(MealsOp::Query(query))
            }
        }
    }
}

pub(crate) fn meal_name(raw: &str) -> Result<String, ToolFailure> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ToolFailure::validation("name must not be empty"));
    }
    max_chars("name", name, MAX_NAME_CHARS)?;
    Ok(name.to_string())
}

pub(crate) fn macro_grams(field: &str, value: Option<i64>) -> Result<Option<i64>, ToolFailure> {
    value
        .map(|v| int_in_range(field, v, 0, MAX_MACRO_GRAMS))
        .transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MealsQueried {
    count: usize,
    meals: Vec<MealEntry>,
    totals: MacroTotals,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MealValues {
    name: String,
    calories: i64,
    protein: Option<i64>,
    carbs: Option<i64>,
    fat: Option<i64>,
    servings: f64,
}

impl From<MealEntry> for MealValues {
    fn from(m: MealEntry) -> Self {
        Self {
            name: m.name,
            calories: m.calories,
            protein: m.protein,
            carbs: m.carbs,
            fat: m.fat,
            servings: m.servings,
        }
    }
}

#[derive(Debug, Serialize)]
struct MealEdited {
    previous: MealValues,
    updated: MealEntry,
}

#[derive(Debug, Serialize)]
struct MealDeleted {
    deleted: MealEntry,
}

pub(crate) fn run(db: &Database, ctx: &ExecutionContext, op: MealsOp) -> Result<Value, ToolError> {
    let user_id = ctx.user_id();
    match op {
        MealsOp::Query(query) => {
            let meals = db.query_meals(user_id, &query)?;
            let totals = meal_totals(&meals);
            respond(
                "query",
                &MealsQueried {
                    count: meals.len(),
                    meals,
                    totals,
                },
            )
        }
        MealsOp::Edit { meal_id, patch } => {
            let previous = db
                .get_meal(user_id, &meal_id)?
                .ok_or_else(|| ToolFailure::not_found("Meal not found"))?;
            let updated = db
                .update_meal(user_id, &meal_id, &patch)?
                .ok_or_else(|| ToolFailure::not_found("Meal not found"))?;
            info!(user_id, meal_id = %meal_id, "meal edited");
            respond(
                "edit",
                &MealEdited {
                    previous: previous.into(),
                    updated,
                },
            )
        }
        MealsOp::Delete { meal_id } => {
            let deleted = db
                .delete_meal(user_id, &meal_id)?
                .ok_or_else(|| ToolFailure::not_found("Meal not found"))?;
            info!(user_id, meal_id = %meal_id, "meal deleted");
            respond("delete", &MealDeleted { deleted })
        }
    }
}
