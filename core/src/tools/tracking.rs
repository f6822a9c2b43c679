use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::respond;
use crate::aggregate::{WaterProgress, WeightTrend, water_progress, weight_trend};
use crate::context::ExecutionContext;
use crate::db::Database;
use crate::error::{ToolError, ToolFailure};
use crate::models::WeightEntry;
use crate::normalize::{
    int_in_range, limit, non_blank, parse_day, parse_optional_day, positive_at_most, required,
    round1,
};

pub const DESCRIPTION: &str = "Log or query weight and water intake.

OPERATIONS:
- \"log_weight\": Record a weight entry when the user mentions their weight (\"I weigh 175 lbs\")
- \"query_weight\": Weight history or a progress summary (\"how much have I lost?\")
- \"log_water\": Record water intake (\"had a glass of water\"). Negative amounts correct an earlier entry.

WEIGHT QUERY TYPES:
- \"recent\": Latest weight entries
- \"progress\": Current weight, total change, weekly and monthly trend, distance to goal
- \"date_range\": Entries between startDate and endDate

Common water amounts: glass = 8oz/240ml, bottle = 16-20oz/500ml, large bottle = 32oz/1000ml";

pub const OPERATIONS: &[&str] = &["log_weight", "query_weight", "log_water"];

pub(crate) const MAX_WEIGHT: f64 = 1500.0;
const MAX_WATER_STEP: i64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackingOperation {
    LogWeight,
    QueryWeight,
    LogWater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeightQueryType {
    Recent,
    Progress,
    DateRange,
}

impl WeightQueryType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Progress => "progress",
            Self::DateRange => "date_range",
        }
    }
}

/// Arguments for the `tracking` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInput {
    /// Operation to perform
    pub operation: TrackingOperation,
    /// Weight value to log, in the user's units
    pub weight: Option<f64>,
    /// Type of weight query
    pub weight_query_type: Option<WeightQueryType>,
    /// Water amount in oz or ml per the user's units; negative to correct
    pub water_amount: Option<i64>,
    /// Date in YYYY-MM-DD format (defaults to today)
    pub date: Option<String>,
    /// Start date for date_range query
    pub start_date: Option<String>,
    /// End date for date_range query
    pub end_date: Option<String>,
    /// Max entries for recent query (default: 10, max: 100)
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingOp {
    LogWater {
        amount: i32,
        date: Option<NaiveDate>,
    },
    LogWeight {
        weight: f64,
        date: Option<NaiveDate>,
    },
    RecentWeights {
        limit: i64,
    },
    WeightProgress,
    WeightRange {
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl TrackingInput {
    pub fn into_op(self) -> Result<TrackingOp, ToolFailure> {
        let date = parse_optional_day("date", self.date.as_deref())?;
        match self.operation {
            TrackingOperation::LogWater => {
                let amount = required(
                    self.water_amount,
                    "waterAmount is required for log_water operation",
                )?;
                let amount = int_in_range("waterAmount", amount, -MAX_WATER_STEP, MAX_WATER_STEP)?;
                if amount == 0 {
                    return Err(ToolFailure::validation("waterAmount must not be zero"));
                }
                let amount = i32::try_from(amount).map_err(|_| {
                    ToolFailure::validation("waterAmount is out of range")
                })?;
                Ok(TrackingOp::LogWater { amount, date })
            }
            TrackingOperation::LogWeight => {
                let weight = required(self.weight, "weight is required for log_weight operation")?;
                let weight = positive_at_most("weight", weight, MAX_WEIGHT)?;
                Ok(TrackingOp::LogWeight { weight, date })
            }
            TrackingOperation::QueryWeight => {
                let query_type = required(
                    self.weight_query_type,
                    "weightQueryType is required for query_weight operation",
                )?;
                match query_type {
                    WeightQueryType::Recent => Ok(TrackingOp::RecentWeights {
                        limit: limit(self.limit)?,
                    }),
                    WeightQueryType::Progress => Ok(TrackingOp::WeightProgress),
                    WeightQueryType::DateRange => {
                        let (Some(start), Some(end)) =
                            (non_blank(self.start_date), non_blank(self.end_date))
                        else {
                            return Err(ToolFailure::validation(
                                "startDate and endDate required for date_range query",
                            ));
                        };
                        Ok(TrackingOp::WeightRange {
                            start: parse_day("startDate", &start)?,
                            end: parse_day("endDate", &end)?,
                        })
                    }
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaterLogged {
    logged: i32,
    #[serde(flatten)]
    progress: WaterProgress,
    water_unit: &'static str,
    date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeightCreated {
    created: bool,
    weight: f64,
    weight_unit: &'static str,
    date: String,
    previous_weight: Option<f64>,
    change: Option<f64>,
    weight_goal: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeightReplaced {
    updated: bool,
    weight: f64,
    weight_unit: &'static str,
    date: String,
    weight_goal: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeightsListed {
    query_type: &'static str,
    count: usize,
    entries: Vec<WeightEntry>,
    weight_unit: &'static str,
    weight_goal: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeightProgressed {
    query_type: &'static str,
    #[serde(flatten)]
    trend: WeightTrend,
    weight_goal: Option<f64>,
    weight_unit: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoWeights {
    message: &'static str,
    weight_unit: &'static str,
    weight_goal: Option<f64>,
}

pub(crate) fn run(
    db: &Database,
    ctx: &ExecutionContext,
    op: TrackingOp,
) -> Result<Value, ToolError> {
    let user_id = ctx.user_id();
    // resolved once, every label below comes from it
    let profile = db.get_profile(user_id)?;
    let units = profile.units;

    match op {
        TrackingOp::LogWater { amount, date } => {
            let date = date.unwrap_or_else(|| ctx.today());
            let total = db.add_water(user_id, date, amount)?;
            info!(user_id, amount, total = total.amount, date = %total.date, "water logged");
            respond(
                "log_water",
                &WaterLogged {
                    logged: amount,
                    progress: water_progress(total.amount, profile.effective_water_goal()),
                    water_unit: units.water_unit(),
                    date: total.date,
                },
            )
        }
        TrackingOp::LogWeight { weight, date } => {
            let date = date.unwrap_or_else(|| ctx.today());
            let previous = db.weight_before(user_id, date)?;
            let write = db.upsert_weight(user_id, date, weight)?;
            info!(user_id, weight, date = %write.entry.date, replaced = write.replaced, "weight logged");
            if write.replaced {
                return respond(
                    "log_weight",
                    &WeightReplaced {
                        updated: true,
                        weight: write.entry.weight,
                        weight_unit: units.weight_unit(),
                        date: write.entry.date,
                        weight_goal: profile.weight_goal,
                    },
                );
            }
            let previous_weight = previous.map(|p| p.weight);
            respond(
                "log_weight",
                &WeightCreated {
                    created: true,
                    weight: write.entry.weight,
                    weight_unit: units.weight_unit(),
                    date: write.entry.date,
                    previous_weight,
                    change: previous_weight.map(|p| round1(weight - p)),
                    weight_goal: profile.weight_goal,
                },
            )
        }
        TrackingOp::WeightProgress => {
            let history = db.weight_history(user_id, None)?;
            match weight_trend(&history, ctx.today(), profile.weight_goal) {
                Some(trend) => respond(
                    "query_weight",
                    &WeightProgressed {
                        query_type: WeightQueryType::Progress.as_str(),
                        trend,
                        weight_goal: profile.weight_goal,
                        weight_unit: units.weight_unit(),
                    },
                ),
                None => respond(
                    "query_weight",
                    &NoWeights {
                        message: "No weight entries recorded yet",
                        weight_unit: units.weight_unit(),
                        weight_goal: profile.weight_goal,
                    },
                ),
            }
        }
        TrackingOp::RecentWeights { limit } => {
            let entries = db.weight_history(user_id, Some(limit))?;
            listed(WeightQueryType::Recent, entries, units.weight_unit(), profile.weight_goal)
        }
        TrackingOp::WeightRange { start, end } => {
            let entries = db.weight_range(user_id, start, end)?;
            listed(WeightQueryType::DateRange, entries, units.weight_unit(), profile.weight_goal)
        }
    }
}

fn listed(
    query_type: WeightQueryType,
    entries: Vec<WeightEntry>,
    weight_unit: &'static str,
    weight_goal: Option<f64>,
) -> Result<Value, ToolError> {
    respond(
        "query_weight",
        &WeightsListed {
            query_type: query_type.as_str(),
            count: entries.len(),
            entries,
            weight_unit,
            weight_goal,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalsUpdate, MetricKind, UnitSystem};
    use serde_json::json;

    fn op(value: Value) -> TrackingOp {
        serde_json::from_value::<TrackingInput>(value)
            .unwrap()
            .into_op()
            .unwrap()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("u1", None).unwrap()
    }

    #[test]
    fn test_water_amount_validation() {
        let err = serde_json::from_value::<TrackingInput>(json!({"operation": "log_water"}))
            .unwrap()
            .into_op()
            .unwrap_err();
        assert_eq!(err.to_string(), "waterAmount is required for log_water operation");

        for amount in [0, 5001, -5001] {
            let input: TrackingInput =
                serde_json::from_value(json!({"operation": "log_water", "waterAmount": amount}))
                    .unwrap();
            assert!(input.into_op().is_err(), "{amount} should be rejected");
        }
    }

    #[test]
    fn test_water_ledger_never_goes_negative() {
        let db = Database::open_in_memory().unwrap();
        let mut last = Value::Null;
        for amount in [16, -50, 10] {
            last = run(
                &db,
                &ctx(),
                op(json!({"operation": "log_water", "waterAmount": amount, "date": "2024-03-01"})),
            )
            .unwrap();
        }
        assert_eq!(last["total"], 0);
        assert_eq!(last["logged"], 10);
        assert_eq!(last["waterUnit"], "oz");
        assert_eq!(last["waterGoal"], 64);
        assert_eq!(last["remaining"], 64);
        assert_eq!(last["goalReached"], false);
        assert_eq!(last["date"], "2024-03-01");
    }

    #[test]
    fn test_water_uses_metric_labels() {
        let db = Database::open_in_memory().unwrap();
        db.set_units("u1", UnitSystem::Metric).unwrap();
        let result = run(
            &db,
            &ctx(),
            op(json!({"operation": "log_water", "waterAmount": 500, "date": "2024-03-01"})),
        )
        .unwrap();
        assert_eq!(result["waterUnit"], "ml");
        assert_eq!(result["waterGoal"], 2000);
        assert_eq!(result["percentComplete"], 25);
        assert_eq!(result["remaining"], 1500);
    }

    #[test]
    fn test_log_weight_created_then_updated() {
        let db = Database::open_in_memory().unwrap();
        db.update_goals(
            "u1",
            &GoalsUpdate {
                weight_goal: Some(170.0),
                ..GoalsUpdate::default()
            },
        )
        .unwrap();

        let first = run(
            &db,
            &ctx(),
            op(json!({"operation": "log_weight", "weight": 180.0, "date": "2024-03-01"})),
        )
        .unwrap();
        assert_eq!(first["created"], true);
        assert!(first["previousWeight"].is_null());
        assert!(first["change"].is_null());
        assert_eq!(first["weightUnit"], "lbs");
        assert_eq!(first["weightGoal"], 170.0);

        let second = run(
            &db,
            &ctx(),
            op(json!({"operation": "log_weight", "weight": 179.4, "date": "2024-03-02"})),
        )
        .unwrap();
        assert_eq!(second["previousWeight"], 180.0);
        assert_eq!(second["change"], -0.6);

        let again = run(
            &db,
            &ctx(),
            op(json!({"operation": "log_weight", "weight": 179.0, "date": "2024-03-02"})),
        )
        .unwrap();
        assert_eq!(again["updated"], true);
        assert!(again.get("created").is_none());
        assert_eq!(again["weight"], 179.0);

        let recent = run(
            &db,
            &ctx(),
            op(json!({"operation": "query_weight", "weightQueryType": "recent"})),
        )
        .unwrap();
        assert_eq!(recent["count"], 2);
        assert_eq!(recent["entries"][0]["date"], "2024-03-02");
        assert_eq!(recent["entries"][0]["weight"], 179.0);
    }

    #[test]
    fn test_progress_with_single_point() {
        let db = Database::open_in_memory().unwrap();
        run(&db, &ctx(), op(json!({"operation": "log_weight", "weight": 82.5}))).unwrap();
        let result = run(
            &db,
            &ctx(),
            op(json!({"operation": "query_weight", "weightQueryType": "progress"})),
        )
        .unwrap();
        assert_eq!(result["queryType"], "progress");
        assert_eq!(result["currentWeight"], 82.5);
        assert_eq!(result["totalChange"], 0.0);
        assert!(result["weeklyChange"].is_null());
        assert!(result["monthlyChange"].is_null());
        assert_eq!(result["totalEntries"], 1);
    }

    #[test]
    fn test_progress_without_history() {
        let db = Database::open_in_memory().unwrap();
        let result = run(
            &db,
            &ctx(),
            op(json!({"operation": "query_weight", "weightQueryType": "progress"})),
        )
        .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["message"], "No weight entries recorded yet");
    }

    #[test]
    fn test_weight_date_range_requires_both_ends() {
        let err = serde_json::from_value::<TrackingInput>(
            json!({"operation": "query_weight", "weightQueryType": "date_range", "endDate": "2024-03-09"}),
        )
        .unwrap()
        .into_op()
        .unwrap_err();
        assert_eq!(err.to_string(), "startDate and endDate required for date_range query");
    }

    #[test]
    fn test_one_record_per_day() {
        let db = Database::open_in_memory().unwrap();
        for amount in [8, 8, -4] {
            run(
                &db,
                &ctx(),
                op(json!({"operation": "log_water", "waterAmount": amount, "date": "2024-03-01"})),
            )
            .unwrap();
        }
        for weight in [180.0, 181.0] {
            run(
                &db,
                &ctx(),
                op(json!({"operation": "log_weight", "weight": weight, "date": "2024-03-01"})),
            )
            .unwrap();
        }
        assert_eq!(db.metric_row_count("u1", MetricKind::Water), 1);
        assert_eq!(db.metric_row_count("u1", MetricKind::Weight), 1);
    }
}
