use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use time::format_description::well_known::Rfc3339;

use mealmind_log::images::{services::ext_from_mime, services::parse_data_url, UploadFile};
use mealmind_log::meals::summary::{daily_totals, total_calories};
use mealmind_log::meals::MealRecord;
use mealmind_log::state::AppState;

#[derive(Parser)]
#[command(
    name = "mealmind-log",
    version,
    about = "Log meals from photos with an estimated calorie count"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more meal photos, one after another
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove a meal by id
    Remove { id: String },
    /// List meals, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calories per day
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a meal's stored photo back to a file
    Export {
        id: String,
        /// Defaults to `<id>.<ext>` in the current directory
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "mealmind_log=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let state = AppState::init().await?;
    let tracker = &state.tracker;

    match cli.command {
        Commands::Add { paths } => {
            for path in paths {
                match tracker.add_meal(UploadFile::from_path(&path)).await {
                    Ok(added) => {
                        println!("{}", line(&added.outcome));
                        if let Some(w) = added.persist_warning {
                            eprintln!("warning: meal kept for this session only: {}", w);
                        }
                    }
                    Err(e) => eprintln!("{}: {}", path.display(), e),
                }
            }
        }
        Commands::Remove { id } => {
            let res = tracker.remove_meal(&id).await;
            match res.outcome {
                Some(m) => println!("removed {}", m.id),
                None => println!("no meal with id {}", id),
            }
            if let Some(w) = res.persist_warning {
                eprintln!("warning: change not saved: {}", w);
            }
        }
        Commands::List { json } => {
            let meals = tracker.meals();
            if json {
                println!("{}", serde_json::to_string_pretty(&meals)?);
            } else if meals.is_empty() {
                println!("no meals logged yet");
            } else {
                for m in &meals {
                    println!("{}", line(m));
                }
            }
        }
        Commands::Summary { json } => {
            let meals = tracker.meals();
            let days = daily_totals(&meals);
            if json {
                println!("{}", serde_json::to_string_pretty(&days)?);
                return Ok(());
            }
            for day in days {
                println!("{}  {:>2} meals  {:>5} kcal", day.date, day.meals, day.calories);
            }
            println!("total  {:>2} meals  {:>5} kcal", meals.len(), total_calories(&meals));
        }
        Commands::Export { id, out } => {
            let meals = tracker.meals();
            let meal = meals
                .iter()
                .find(|m| m.id == id)
                .with_context(|| format!("no meal with id {}", id))?;
            let (content_type, bytes) = parse_data_url(&meal.image_url)?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "{}.{}",
                    meal.id,
                    ext_from_mime(&content_type).unwrap_or("bin")
                ))
            });
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("write {}", out.display()))?;
            println!("wrote {} ({} bytes)", out.display(), bytes.len());
        }
    }

    Ok(())
}

fn line(m: &MealRecord) -> String {
    let at = m
        .created_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| m.created_at.to_string());
    format!("{}  {:>4} kcal  {}", m.id, m.calories, at)
}
