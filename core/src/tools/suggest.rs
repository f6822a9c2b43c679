use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::meals::{MAX_CALORIES, MAX_MACRO_GRAMS, meal_name};
use super::respond;
use crate::error::{ToolError, ToolFailure};
use crate::normalize::int_in_range;

pub const DESCRIPTION: &str = "Suggest a food item for the user to log to their food diary.

USE THIS TOOL WHEN:
- The user asks what they should eat
- The user describes a meal they had and you want to help them log it
- The user shows a photo of food and you have identified it
- The user asks for meal ideas that fit their calorie budget

The suggestion is shown with a button to log it. Include accurate macro estimates.";

pub const OPERATIONS: &[&str] = &["suggest"];

/// Arguments for the `suggest_food` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestFoodInput {
    /// Name of the food or meal (e.g. "Grilled Chicken Salad")
    pub name: String,
    /// Estimated total calories
    pub calories: i64,
    /// Protein in grams
    pub protein: i64,
    /// Carbohydrates in grams
    pub carbs: i64,
    /// Fat in grams
    pub fat: i64,
}

/// A checked, loggable meal proposal. Nothing is stored until the user
/// accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSuggestion {
    pub name: String,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
}

impl SuggestFoodInput {
    pub fn into_suggestion(self) -> Result<FoodSuggestion, ToolFailure> {
        Ok(FoodSuggestion {
            name: meal_name(&self.name)?,
            calories: int_in_range("calories", self.calories, 0, MAX_CALORIES)?,
            protein: int_in_range("protein", self.protein, 0, MAX_MACRO_GRAMS)?,
            carbs: int_in_range("carbs", self.carbs, 0, MAX_MACRO_GRAMS)?,
            fat: int_in_range("fat", self.fat, 0, MAX_MACRO_GRAMS)?,
        })
    }
}

#[derive(Serialize)]
struct Suggested<'a> {
    suggestion: &'a FoodSuggestion,
}

pub(crate) fn run(suggestion: &FoodSuggestion) -> Result<Value, ToolError> {
    respond("suggest", &Suggested { suggestion })
}
