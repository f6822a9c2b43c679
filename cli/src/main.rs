mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    MealArgs, cmd_call, cmd_meal_frequent, cmd_meal_log, cmd_profile_show, cmd_profile_units,
    cmd_snapshot, cmd_tools,
};
use crate::config::Config;
use sous_core::context::ExecutionContext;
use sous_core::models::UnitSystem;
use sous_core::service::SousService;

#[derive(Parser)]
#[command(
    name = "sous",
    version,
    about = "Tool engine for a conversational nutrition assistant",
    long_about = "Tool engine for a conversational nutrition assistant.\n\n\
        Meals, weight and water, food preferences, pantry and shopping lists \
        are stored locally in SQLite and exposed as model-callable tools."
)]
struct Cli {
    /// Database file (overrides SOUS_DB and the default data directory)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    /// User to act as
    #[arg(short, long, global = true, default_value = "local")]
    user: String,
    /// IANA timezone used for "today" (e.g. America/New_York, default: UTC)
    #[arg(long, global = true)]
    tz: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tools and their operations
    Tools {
        /// Output as JSON (full definitions including input schemas)
        #[arg(long)]
        json: bool,
    },
    /// Invoke a tool directly
    Call {
        /// Tool name (e.g. meals, tracking, pantry)
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Log meals and look at eating habits
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Show or change the user's profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Summarize today: goals, intake, water, preferences, pantry
    Snapshot {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal
    Log {
        /// Meal name
        name: String,
        /// Calories (kcal)
        #[arg(long)]
        calories: i64,
        /// Protein in grams
        #[arg(long)]
        protein: Option<i64>,
        /// Carbs in grams
        #[arg(long)]
        carbs: Option<i64>,
        /// Fat in grams
        #[arg(long)]
        fat: Option<i64>,
        /// Number of servings (default: 1)
        #[arg(short, long)]
        servings: Option<f64>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the most-logged meals of the last 30 days
    Frequent {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show goals and unit system
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Switch between metric and imperial units
    Units {
        /// metric or imperial
        units: UnitSystem,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let service = SousService::new(&config.db_path)?;
    let ctx = ExecutionContext::new(&cli.user, cli.tz.as_deref())?;

    match cli.command {
        Commands::Tools { json } => cmd_tools(&service, json),
        Commands::Call { tool, args } => cmd_call(&service, &ctx, &tool, &args),
        Commands::Meal { command } => match command {
            MealCommands::Log {
                name,
                calories,
                protein,
                carbs,
                fat,
                servings,
                date,
                json,
            } => cmd_meal_log(
                &service,
                &ctx,
                MealArgs {
                    name,
                    calories,
                    protein,
                    carbs,
                    fat,
                    servings,
                    date,
                },
                json,
            ),
            MealCommands::Frequent { json } => cmd_meal_frequent(&service, &ctx, json),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&service, ctx.user_id(), json),
            ProfileCommands::Units { units, json } => {
                cmd_profile_units(&service, ctx.user_id(), units, json)
            }
        },
        Commands::Snapshot { json } => cmd_snapshot(&service, &ctx, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(service, port, &bind, api_key, new_api_key).await
        }
    }
}
