use anyhow::Result;

use sous_core::context::ExecutionContext;
use sous_core::service::SousService;

pub(crate) fn cmd_snapshot(service: &SousService, ctx: &ExecutionContext, json: bool) -> Result<()> {
    let snap = service.snapshot(ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
        return Ok(());
    }

    println!("{} ({})", snap.date, ctx.timezone());
    println!(
        "Calories:  {} / {} kcal ({} remaining)",
        snap.consumed.calories, snap.calorie_goal, snap.remaining_calories
    );
    println!(
        "Macros:    P {}g / C {}g / F {}g",
        snap.consumed.protein, snap.consumed.carbs, snap.consumed.fat
    );
    println!(
        "Water:     {} / {} {}",
        snap.water.total, snap.water.goal, snap.water.unit
    );
    if let Some(goal) = snap.weight_goal {
        println!("Weight goal: {goal:.1} {}", snap.units.weight_unit());
    }

    if !snap.preferences.is_empty() {
        println!("\nPreferences:");
        for group in &snap.preferences {
            let values: Vec<&str> = group.preferences.iter().map(|p| p.value.as_str()).collect();
            println!("  {}: {}", group.category.as_str(), values.join(", "));
        }
    }

    if !snap.pantry.is_empty() {
        let names: Vec<&str> = snap.pantry.iter().map(|p| p.name.as_str()).collect();
        println!("\nPantry ({}): {}", names.len(), names.join(", "));
    }

    if !snap.frequent_meals.is_empty() {
        println!("\nFrequent meals:");
        for meal in &snap.frequent_meals {
            println!(
                "  {} x{} ({} kcal)",
                meal.name, meal.times_logged, meal.calories
            );
        }
    }
    Ok(())
}
