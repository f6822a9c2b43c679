mod helpers;
mod meal;
mod profile;
mod snapshot;
mod tools;

pub(crate) use meal::{MealArgs, cmd_meal_frequent, cmd_meal_log};
pub(crate) use profile::{cmd_profile_show, cmd_profile_units};
pub(crate) use snapshot::cmd_snapshot;
pub(crate) use tools::{cmd_call, cmd_tools};
