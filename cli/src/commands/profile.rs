use anyhow::Result;

use sous_core::models::{Profile, UnitSystem};
use sous_core::service::SousService;

pub(crate) fn cmd_profile_show(service: &SousService, user_id: &str, json: bool) -> Result<()> {
    let profile = service.profile(user_id)?;
    print_profile(&profile, json)
}

pub(crate) fn cmd_profile_units(
    service: &SousService,
    user_id: &str,
    units: UnitSystem,
    json: bool,
) -> Result<()> {
    let profile = service.set_units(user_id, units)?;
    if !json {
        println!("Units set to {units}");
    }
    print_profile(&profile, json)
}

fn print_profile(profile: &Profile, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    let weight_unit = profile.units.weight_unit();
    println!("Units:        {}", profile.units);
    println!("Calorie goal: {} kcal", profile.calorie_goal);
    match profile.weight_goal {
        Some(goal) => println!("Weight goal:  {goal:.1} {weight_unit}"),
        None => println!("Weight goal:  not set"),
    }
    println!(
        "Water goal:   {} {}",
        profile.effective_water_goal(),
        profile.units.water_unit()
    );
    if !profile.stored {
        eprintln!("(defaults; nothing saved for this user yet)");
    }
    Ok(())
}
