use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the list `add_items` falls back to when none is given.
pub const DEFAULT_SHOPPING_LIST: &str = "Shopping List";

pub const DEFAULT_CALORIE_GOAL: i64 = 2200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// --- Profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    #[default]
    Imperial,
}

impl UnitSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    pub fn weight_unit(self) -> &'static str {
        match self {
            Self::Metric => "kg",
            Self::Imperial => "lbs",
        }
    }

    pub fn water_unit(self) -> &'static str {
        match self {
            Self::Metric => "ml",
            Self::Imperial => "oz",
        }
    }

    pub fn default_water_goal(self) -> i64 {
        match self {
            Self::Metric => 2000,
            Self::Imperial => 64,
        }
    }
}

impl FromStr for UnitSystem {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            _ => Err(UnknownVariant {
                kind: "unit system",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's goals and unit preference. `stored` is false when no row exists
/// and the defaults are in effect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub units: UnitSystem,
    pub calorie_goal: i64,
    pub weight_goal: Option<f64>,
    pub water_goal: Option<i64>,
    #[serde(skip)]
    pub stored: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            units: UnitSystem::Imperial,
            calorie_goal: DEFAULT_CALORIE_GOAL,
            weight_goal: None,
            water_goal: None,
            stored: false,
        }
    }
}

impl Profile {
    pub fn effective_water_goal(&self) -> i64 {
        self.water_goal
            .unwrap_or_else(|| self.units.default_water_goal())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoalsUpdate {
    pub calorie_goal: Option<i64>,
    pub weight_goal: Option<f64>,
}

// --- Meals ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: String,
    pub name: String,
    pub calories: i64,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
    pub servings: f64,
    pub date: String,
    pub logged_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMealEntry {
    pub name: String,
    pub calories: i64,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
    pub servings: f64,
    pub date: NaiveDate,
    pub logged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct MealPatch {
    pub name: Option<String>,
    pub calories: Option<i64>,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
    pub servings: Option<f64>,
}

impl MealPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.servings.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequentMeal {
    pub name: String,
    pub times_logged: i64,
    pub calories: i64,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
}

// --- Body metrics ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Weight,
    Water,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Water => "water",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightEntry {
    pub id: String,
    pub weight: f64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterTotal {
    pub date: String,
    pub amount: i64,
}

// --- Preferences ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceCategory {
    Like,
    Dislike,
    Allergy,
    Dietary,
    Cuisine,
    Timing,
    Portion,
    Other,
}

impl PreferenceCategory {
    pub const ALL: [Self; 8] = [
        Self::Like,
        Self::Dislike,
        Self::Allergy,
        Self::Dietary,
        Self::Cuisine,
        Self::Timing,
        Self::Portion,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Allergy => "allergy",
            Self::Dietary => "dietary",
            Self::Cuisine => "cuisine",
            Self::Timing => "timing",
            Self::Portion => "portion",
            Self::Other => "other",
        }
    }
}

impl FromStr for PreferenceCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "preference category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preference {
    pub id: String,
    pub category: PreferenceCategory,
    pub value: String,
    pub notes: Option<String>,
}

// --- Pantry ---

/// Declaration order is the display order used when grouping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PantryCategory {
    Protein,
    Vegetable,
    Fruit,
    Dairy,
    Grain,
    Pantry,
    Beverage,
    Other,
}

impl PantryCategory {
    pub const ALL: [Self; 8] = [
        Self::Protein,
        Self::Vegetable,
        Self::Fruit,
        Self::Dairy,
        Self::Grain,
        Self::Pantry,
        Self::Beverage,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protein => "protein",
            Self::Vegetable => "vegetable",
            Self::Fruit => "fruit",
            Self::Dairy => "dairy",
            Self::Grain => "grain",
            Self::Pantry => "pantry",
            Self::Beverage => "beverage",
            Self::Other => "other",
        }
    }
}

impl FromStr for PantryCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "pantry category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    pub id: String,
    pub name: String,
    pub category: Option<PantryCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPantryItem {
    pub name: String,
    pub category: Option<PantryCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PantryPatch {
    pub name: Option<String>,
    pub category: Option<PantryCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

// --- Shopping lists ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListItem {
    pub id: String,
    #[serde(skip)]
    pub list_id: String,
    pub name: String,
    pub category: Option<PantryCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub checked: bool,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewShoppingItem {
    /// Item name
    pub name: String,
    /// Category
    pub category: Option<PantryCategory>,
    /// Quantity
    pub quantity: Option<f64>,
    /// Unit
    pub unit: Option<String>,
}

/// Compact reference used in removal and purchase results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub id: String,
    pub name: String,
}

impl From<&ShoppingListItem> for ItemRef {
    fn from(item: &ShoppingListItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_system_labels() {
        assert_eq!(UnitSystem::Metric.weight_unit(), "kg");
        assert_eq!(UnitSystem::Metric.water_unit(), "ml");
        assert_eq!(UnitSystem::Imperial.weight_unit(), "lbs");
        assert_eq!(UnitSystem::Imperial.water_unit(), "oz");
        assert_eq!("Metric".parse::<UnitSystem>().unwrap(), UnitSystem::Metric);
        assert!("stone".parse::<UnitSystem>().is_err());
    }

    #[test]
    fn test_default_profile_water_goal() {
        let profile = Profile::default();
        assert_eq!(profile.effective_water_goal(), 64);

        let metric = Profile {
            units: UnitSystem::Metric,
            ..Profile::default()
        };
        assert_eq!(metric.effective_water_goal(), 2000);

        let custom = Profile {
            water_goal: Some(80),
            ..Profile::default()
        };
        assert_eq!(custom.effective_water_goal(), 80);
    }

    #[test]
    fn test_category_round_trip_through_str() {
        for c in PreferenceCategory::ALL {
            assert_eq!(c.as_str().parse::<PreferenceCategory>().unwrap(), c);
        }
        for c in PantryCategory::ALL {
            assert_eq!(c.as_str().parse::<PantryCategory>().unwrap(), c);
        }
        let err = "snacks".parse::<PantryCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown pantry category 'snacks'");
    }

    #[test]
    fn test_pantry_category_order() {
        let mut cats = vec![
            PantryCategory::Other,
            PantryCategory::Dairy,
            PantryCategory::Protein,
        ];
        cats.sort();
        assert_eq!(
            cats,
            vec![
                PantryCategory::Protein,
                PantryCategory::Dairy,
                PantryCategory::Other
            ]
        );
    }

    #[test]
    fn test_meal_patch_is_empty() {
        assert!(MealPatch::default().is_empty());
        let patch = MealPatch {
            fat: Some(3),
            ..MealPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
