use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod db;
mod export;
mod ingest;
mod live;
mod models;
mod source;
mod state;
mod stats;
mod store;

use export::ExportFormat;
use models::{TimeRange, UserProfile};
use source::RecordSource;
use state::StateStore;

#[derive(Parser)]
#[command(name = "weconnect-materials")]
#[command(about = "Materials analytics and export for WE CONNECT", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Summarize one owner's materials over a time range
    Stats {
        #[arg(long)]
        owner: Uuid,
        #[arg(long, value_enum, default_value = "30d")]
        range: TimeRange,
    },
    /// Export the filtered materials as CSV or JSON
    Export {
        #[arg(long)]
        owner: Uuid,
        #[arg(long, value_enum, default_value = "30d")]
        range: TimeRange,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Follow live updates and re-render the dashboard as they land
    Watch {
        #[arg(long)]
        owner: Uuid,
        #[arg(long, value_enum, default_value = "30d")]
        range: TimeRange,
    },
    /// Upload a new material record
    Add {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        school: String,
        #[arg(long, default_value = "")]
        course: String,
    },
    /// Ask the backend to delete a material
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Show or update the locally stored profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        school: Option<String>,
        #[arg(long)]
        course: Option<String>,
    },
    /// Manage favorite materials
    Favorite {
        #[command(subcommand)]
        action: FavoriteAction,
    },
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// Mark a material as a favorite
    Add { id: String },
    /// Drop a material from the favorites
    Remove { id: String },
    /// List favorite material ids
    List,
}

async fn connect_pool() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the WE CONNECT Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn state_path() -> PathBuf {
    std::env::var("WECONNECT_STATE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("weconnect-state.json"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect_pool().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect_pool().await?;
            let owner = db::seed(&pool).await?;
            println!("Seed materials inserted for owner {owner}.");
        }
        Commands::Stats { owner, range } => {
            let source = db::PgRecordSource::new(connect_pool().await?);
            match source.fetch_all(owner).await {
                Ok(records) => live::render(&records, range),
                Err(err) => println!("{err}"),
            }
        }
        Commands::Export {
            owner,
            range,
            format,
            out_dir,
        } => {
            let source = db::PgRecordSource::new(connect_pool().await?);
            let records = match source.fetch_all(owner).await {
                Ok(records) => records,
                Err(err) => {
                    println!("{err}");
                    return Ok(());
                }
            };

            let filtered = stats::filter_by_range(&records, range, Utc::now());
            match export::build_export(&filtered, range, format, Local::now().date_naive())? {
                Some(export) => {
                    let path = out_dir.join(&export.filename);
                    std::fs::write(&path, &export.body)
                        .with_context(|| format!("could not write {}", path.display()))?;
                    println!(
                        "Exported {} materials to {} ({}).",
                        filtered.len(),
                        path.display(),
                        export.mime
                    );
                }
                None => println!("No data to export for this window."),
            }
        }
        Commands::Watch { owner, range } => {
            let source = db::PgRecordSource::new(connect_pool().await?);
            live::run_watch(&source, owner, range).await?;
        }
        Commands::Add {
            owner,
            title,
            category,
            school,
            course,
        } => {
            let pool = connect_pool().await?;
            let id = db::insert_material(&pool, owner, &title, &category, &school, &course).await?;
            println!("Uploaded material {id}.");
        }
        Commands::Delete { id } => {
            let source = db::PgRecordSource::new(connect_pool().await?);
            match source.delete_record(&id).await {
                Ok(()) => {
                    println!("Delete requested for {id}; open dashboards update when the change lands.")
                }
                Err(err) => println!("{err}"),
            }
        }
        Commands::Profile {
            name,
            email,
            school,
            course,
        } => {
            let mut store = StateStore::load(state_path())?;

            if name.is_some() || email.is_some() || school.is_some() || course.is_some() {
                let mut profile = store.profile().cloned().unwrap_or_else(|| UserProfile {
                    user_id: Uuid::new_v4(),
                    display_name: String::new(),
                    email: String::new(),
                    school: String::new(),
                    course: String::new(),
                });
                if let Some(name) = name {
                    profile.display_name = name;
                }
                if let Some(email) = email {
                    profile.email = email;
                }
                if let Some(school) = school {
                    profile.school = school;
                }
                if let Some(course) = course {
                    profile.course = course;
                }
                store.set_profile(profile);
                store.save()?;
                println!("Profile updated.");
            }

            match store.profile() {
                Some(profile) => {
                    println!("{} <{}>", profile.display_name, profile.email);
                    println!("{}, {}", profile.school, profile.course);
                    println!("owner id: {}", profile.user_id);
                }
                None => {
                    println!("No profile saved yet. Set one with --name/--email/--school/--course.")
                }
            }
        }
        Commands::Favorite { action } => {
            let mut store = StateStore::load(state_path())?;
            match action {
                FavoriteAction::Add { id } => {
                    if store.add_favorite(&id) {
                        store.save()?;
                        println!("Added {id} to favorites.");
                    } else {
                        println!("{id} is already a favorite.");
                    }
                }
                FavoriteAction::Remove { id } => {
                    if store.remove_favorite(&id) {
                        store.save()?;
                        println!("Removed {id} from favorites.");
                    } else {
                        println!("{id} was not a favorite.");
                    }
                }
                FavoriteAction::List => {
                    if store.favorites().is_empty() {
                        println!("No favorites yet.");
                    } else {
                        for id in store.favorites() {
                            println!("- {id}");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
