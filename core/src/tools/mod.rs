//! Operation dispatch for the model-facing tools.
//!
//! Each tool takes a flat JSON object with an `operation` tag. The object is
//! decoded into the tool's wire struct, checked and turned into a closed
//! operation enum, then run against the store.

pub mod meals;
pub mod pantry;
pub mod preferences;
pub mod shopping;
pub mod suggest;
pub mod tracking;

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::db::Database;
use crate::error::{ToolError, ToolFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    SuggestFood,
    Meals,
    Tracking,
    Preferences,
    Pantry,
    ShoppingList,
}

impl ToolName {
    pub const ALL: [Self; 6] = [
        Self::SuggestFood,
        Self::Meals,
        Self::Tracking,
        Self::Preferences,
        Self::Pantry,
        Self::ShoppingList,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuggestFood => "suggest_food",
            Self::Meals => "meals",
            Self::Tracking => "tracking",
            Self::Preferences => "preferences",
            Self::Pantry => "pantry",
            Self::ShoppingList => "shopping_list",
        }
    }
}

impl FromStr for ToolName {
    type Err = ToolFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolFailure::validation(format!("Unknown tool: {s}")))
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the model is told about a tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub operations: &'static [&'static str],
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(definition).collect()
}

pub fn definition(tool: ToolName) -> ToolDefinition {
    let (description, operations, input_schema) = match tool {
        ToolName::SuggestFood => (
            suggest::DESCRIPTION,
            suggest::OPERATIONS,
            schemars::schema_for!(suggest::SuggestFoodInput),
        ),
        ToolName::Meals => (
            meals::DESCRIPTION,
            meals::OPERATIONS,
            schemars::schema_for!(meals::MealsInput),
        ),
        ToolName::Tracking => (
            tracking::DESCRIPTION,
            tracking::OPERATIONS,
            schemars::schema_for!(tracking::TrackingInput),
        ),
        ToolName::Preferences => (
            preferences::DESCRIPTION,
            preferences::OPERATIONS,
            schemars::schema_for!(preferences::PreferencesInput),
        ),
        ToolName::Pantry => (
            pantry::DESCRIPTION,
            pantry::OPERATIONS,
            schemars::schema_for!(pantry::PantryInput),
        ),
        ToolName::ShoppingList => (
            shopping::DESCRIPTION,
            shopping::OPERATIONS,
            schemars::schema_for!(shopping::ShoppingInput),
        ),
    };
    ToolDefinition {
        name: tool.as_str(),
        description,
        operations,
        input_schema: input_schema.to_value(),
    }
}

/// Run one tool call. Reportable failures come back as `Ok` with
/// `success: false`; only storage errors are `Err`.
pub(crate) fn dispatch(
    db: &Database,
    tool: ToolName,
    args: Value,
    ctx: &ExecutionContext,
) -> anyhow::Result<Value> {
    debug!(tool = %tool, user_id = ctx.user_id(), "dispatching tool call");
    let outcome = match tool {
        ToolName::SuggestFood => decode::<suggest::SuggestFoodInput>(args)
            .and_then(|input| Ok(input.into_suggestion()?))
            .and_then(|s| suggest::run(&s)),
        ToolName::Meals => decode::<meals::MealsInput>(args)
            .and_then(|input| Ok(input.into_op()?))
            .and_then(|op| meals::run(db, ctx, op)),
        ToolName::Tracking => decode::<tracking::TrackingInput>(args)
            .and_then(|input| Ok(input.into_op()?))
            .and_then(|op| tracking::run(db, ctx, op)),
        ToolName::Preferences => decode::<preferences::PreferencesInput>(args)
            .and_then(|input| Ok(input.into_op()?))
            .and_then(|op| preferences::run(db, ctx, op)),
        ToolName::Pantry => decode::<pantry::PantryInput>(args)
            .and_then(|input| Ok(input.into_op()?))
            .and_then(|op| pantry::run(db, ctx, op)),
        ToolName::ShoppingList => decode::<shopping::ShoppingInput>(args)
            .and_then(|input| Ok(input.into_op()?))
            .and_then(|op| shopping::run(db, ctx, op)),
    };
    match outcome {
        Ok(value) => Ok(value),
        Err(ToolError::Failure(failure)) => {
            debug!(tool = %tool, error = %failure, "tool call rejected");
            Ok(failure_response(&failure))
        }
        Err(ToolError::Storage(err)) => Err(err),
    }
}

/// Decode tool arguments. A missing object is treated as empty.
pub(crate) fn decode<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| ToolFailure::validation(format!("Invalid arguments: {e}")).into())
}

/// Success envelope: `success`, the operation tag and the body's fields.
pub(crate) fn respond<T: Serialize>(operation: &str, body: &T) -> Result<Value, ToolError> {
    let mut map = match serde_json::to_value(body).context("failed to serialize tool result")? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    };
    map.insert("success".to_string(), Value::Bool(true));
    map.insert("operation".to_string(), Value::String(operation.to_string()));
    Ok(Value::Object(map))
}

pub fn failure_response(failure: &ToolFailure) -> Value {
    json!({ "success": false, "error": failure.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
        let err = "recipes".parse::<ToolName>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: recipes");
    }

    #[test]
    fn test_definitions_carry_schemas() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), 6);
        let meals = defs.iter().find(|d| d.name == "meals").unwrap();
        assert_eq!(meals.operations, &["query", "edit", "delete"]);
        let props = &meals.input_schema["properties"];
        assert!(props.get("operation").is_some());
        assert!(props.get("queryType").is_some());
        assert!(props.get("mealId").is_some());

        let shopping = defs.iter().find(|d| d.name == "shopping_list").unwrap();
        assert!(shopping.input_schema["properties"].get("addToPantry").is_some());
    }

    #[test]
    fn test_decode_reports_bad_arguments() {
        let err = decode::<meals::MealsInput>(json!({"operation": "explode"})).unwrap_err();
        let ToolError::Failure(failure) = err else {
            panic!("expected a failure");
        };
        assert!(failure.to_string().starts_with("Invalid arguments:"));
    }

    #[test]
    fn test_respond_wraps_body() {
        #[derive(Serialize)]
        struct Body {
            count: usize,
        }
        let value = respond("query", &Body { count: 2 }).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["operation"], "query");
        assert_eq!(value["count"], 2);
    }
}
