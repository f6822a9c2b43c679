use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::EngineError;

/// Who is acting and which calendar they live in. Built once per invocation
/// and handed to every handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    user_id: String,
    timezone: Tz,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContext {
    user_id: Option<String>,
    timezone: Option<String>,
}

impl ExecutionContext {
    /// Fails closed on a missing or blank user id. An unknown timezone falls
    /// back to UTC.
    pub fn new(user_id: &str, timezone: Option<&str>) -> Result<Self, EngineError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(EngineError::MissingIdentity);
        }
        Ok(Self {
            user_id: user_id.to_string(),
            timezone: resolve_timezone(timezone),
        })
    }

    /// Resolve from the caller-supplied JSON (`{"userId": ..., "timezone": ...}`).
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        let raw: RawContext =
            RawContext::deserialize(value).map_err(|_| EngineError::MissingIdentity)?;
        let user_id = raw.user_id.ok_or(EngineError::MissingIdentity)?;
        Self::new(&user_id, raw.timezone.as_deref())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Today's date on the user's wall clock.
    pub fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }

    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }
}

fn resolve_timezone(name: Option<&str>) -> Tz {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Tz::UTC;
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!(timezone = name, "unknown timezone, using UTC");
        Tz::UTC
    })
}
