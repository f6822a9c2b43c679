use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::respond;
use super::tracking::MAX_WEIGHT;
use crate::context::ExecutionContext;
use crate::db::Database;
use crate::error::{ToolError, ToolFailure};
use crate::models::{GoalsUpdate, PreferenceCategory};
use crate::normalize::{int_in_range, max_chars, non_blank, normalize_key, positive_at_most};

pub const DESCRIPTION: &str = "Manage the user's food preferences, dietary restrictions and nutrition goals.

OPERATIONS:
- \"set_preference\": Add or update a food preference learned during the conversation
- \"remove_preference\": Remove a preference that no longer applies (\"I actually like mushrooms now\")
- \"update_goals\": Change the daily calorie target or goal weight

PREFERENCE CATEGORIES:
- like: Foods they enjoy
- dislike: Foods they avoid
- allergy: Allergies
- dietary: Restrictions (vegetarian, keto)
- cuisine: Preferred cuisines
- timing: Meal timing (\"I skip breakfast\")
- portion: Portion preferences
- other: Anything else

Values are case-insensitive and deduplicated. Setting an existing preference updates its notes.";

pub const OPERATIONS: &[&str] = &["set_preference", "remove_preference", "update_goals"];

const MIN_CALORIE_GOAL: i64 = 1000;
const MAX_CALORIE_GOAL: i64 = 5000;
const MAX_VALUE_CHARS: usize = 200;
const MAX_NOTES_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PreferencesOperation {
    SetPreference,
    RemovePreference,
    UpdateGoals,
}

/// Arguments for the `preferences` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesInput {
    /// Operation to perform
    pub operation: PreferencesOperation,
    /// Preference category (required for set/remove_preference)
    pub category: Option<PreferenceCategory>,
    /// Preference value, e.g. "mushrooms" or "vegetarian" (required for set/remove_preference)
    pub value: Option<String>,
    /// Optional context, e.g. "texture issue"
    pub notes: Option<String>,
    /// New daily calorie goal (1000-5000)
    pub calorie_goal: Option<i64>,
    /// New target weight in the user's preferred unit
    pub weight_goal: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreferencesOp {
    Set {
        category: PreferenceCategory,
        value: String,
        notes: Option<String>,
    },
    Remove {
        category: PreferenceCategory,
        value: String,
    },
    UpdateGoals {
        calorie_goal: Option<i64>,
        weight_goal: Option<f64>,
    },
}

impl PreferencesInput {
    pub fn into_op(self) -> Result<PreferencesOp, ToolFailure> {
        if self.operation == PreferencesOperation::UpdateGoals {
            if self.calorie_goal.is_none() && self.weight_goal.is_none() {
                return Err(ToolFailure::validation(
                    "At least one goal (calorieGoal or weightGoal) must be provided",
                ));
            }
            return Ok(PreferencesOp::UpdateGoals {
                calorie_goal: self
                    .calorie_goal
                    .map(|g| int_in_range("calorieGoal", g, MIN_CALORIE_GOAL, MAX_CALORIE_GOAL))
                    .transpose()?,
                weight_goal: self
                    .weight_goal
                    .map(|g| positive_at_most("weightGoal", g, MAX_WEIGHT))
                    .transpose()?,
            });
        }

        let (Some(category), Some(value)) = (self.category, non_blank(self.value)) else {
            return Err(ToolFailure::validation(
                "category and value are required for preference operations",
            ));
        };
        max_chars("value", &value, MAX_VALUE_CHARS)?;
        let value = normalize_key(&value);

        if self.operation == PreferencesOperation::RemovePreference {
            return Ok(PreferencesOp::Remove { category, value });
        }
        let notes = non_blank(self.notes);
        if let Some(notes) = &notes {
            max_chars("notes", notes, MAX_NOTES_CHARS)?;
        }
        Ok(PreferencesOp::Set {
            category,
            value,
            notes,
        })
    }
}

#[derive(Debug, Serialize)]
struct PreferenceSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    already_existed: Option<bool>,
    category: PreferenceCategory,
    value: String,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct RemovedKey {
    category: PreferenceCategory,
    value: String,
}

#[derive(Debug, Serialize)]
struct PreferenceRemoved {
    removed: RemovedKey,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Goals {
    calorie_goal: i64,
    weight_goal: Option<f64>,
}

#[derive(Debug, Serialize)]
struct GoalsUpdated {
    updated: Goals,
}

pub(crate) fn run(
    db: &Database,
    ctx: &ExecutionContext,
    op: PreferencesOp,
) -> Result<Value, ToolError> {
    let user_id = ctx.user_id();
    match op {
        PreferencesOp::Set {
            category,
            value,
            notes,
        } => {
            let write = db.upsert_preference(user_id, category, &value, notes.as_deref())?;
            info!(
                user_id,
                category = category.as_str(),
                value = %write.preference.value,
                already_existed = write.already_existed,
                "preference set"
            );
            let existed = write.already_existed;
            respond(
                "set_preference",
                &PreferenceSet {
                    created: (!existed).then_some(true),
                    already_existed: existed.then_some(true),
                    category: write.preference.category,
                    value: write.preference.value,
                    notes: write.preference.notes,
                },
            )
        }
        PreferencesOp::Remove { category, value } => {
            let removed = db
                .delete_preference(user_id, category, &value)?
                .ok_or_else(|| ToolFailure::not_found("Preference not found"))?;
            info!(user_id, category = category.as_str(), value = %removed.value, "preference removed");
            respond(
                "remove_preference",
                &PreferenceRemoved {
                    removed: RemovedKey {
                        category: removed.category,
                        value: removed.value,
                    },
                },
            )
        }
        PreferencesOp::UpdateGoals {
            calorie_goal,
            weight_goal,
        } => {
            let profile = db.update_goals(
                user_id,
                &GoalsUpdate {
                    calorie_goal,
                    weight_goal,
                },
            )?;
            info!(user_id, ?calorie_goal, ?weight_goal, "goals updated");
            respond(
                "update_goals",
                &GoalsUpdated {
                    updated: Goals {
                        calorie_goal: profile.calorie_goal,
                        weight_goal: profile.weight_goal,
                    },
                },
            )
        }
    }
}
