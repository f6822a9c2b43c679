use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sous_core::context::ExecutionContext;
use sous_core::service::{MealLog, SousService};

use super::helpers::{opt_grams, parse_date, truncate};

pub(crate) struct MealArgs {
    pub name: String,
    pub calories: i64,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
    pub servings: Option<f64>,
    pub date: Option<String>,
}

pub(crate) fn cmd_meal_log(
    service: &SousService,
    ctx: &ExecutionContext,
    args: MealArgs,
    json: bool,
) -> Result<()> {
    let date = parse_date(args.date, ctx.today())?;
    let meal = MealLog {
        name: args.name,
        calories: args.calories,
        protein: args.protein,
        carbs: args.carbs,
        fat: args.fat,
        servings: args.servings,
        date: Some(date.format("%Y-%m-%d").to_string()),
        logged_at: None,
    };
    let entry = service.log_meal(ctx, meal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {} ({} kcal, P {} / C {} / F {}) for {}",
            entry.name,
            entry.calories,
            opt_grams(entry.protein),
            opt_grams(entry.carbs),
            opt_grams(entry.fat),
            entry.date
        );
        println!("  ID: {}", entry.id);
    }
    Ok(())
}

pub(crate) fn cmd_meal_frequent(
    service: &SousService,
    ctx: &ExecutionContext,
    json: bool,
) -> Result<()> {
    let meals = service.frequent_meals(ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
        return Ok(());
    }
    if meals.is_empty() {
        eprintln!("No meals logged in the last 30 days. Use `sous meal log` to add one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct FrequentRow {
        #[tabled(rename = "Meal")]
        name: String,
        #[tabled(rename = "Times")]
        times: i64,
        #[tabled(rename = "Calories")]
        calories: i64,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<FrequentRow> = meals
        .iter()
        .map(|m| FrequentRow {
            name: truncate(&m.name, 35),
            times: m.times_logged,
            calories: m.calories,
            protein: opt_grams(m.protein),
            carbs: opt_grams(m.carbs),
            fat: opt_grams(m.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
