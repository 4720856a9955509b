use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sea_orm_migration::MigratorTrait;

use tour_booking_backend::{db, seed};

/// Load or wipe the development data set.
#[derive(Debug, Parser)]
#[command(name = "import-dev-data")]
struct Cli {
    /// Import users, tours and reviews from the data directory
    #[arg(long, conflicts_with = "delete", required_unless_present = "delete")]
    import: bool,

    /// Delete all bookings, reviews, tours and users
    #[arg(long)]
    delete: bool,

    /// Directory holding users.json, tours.json and reviews.json
    #[arg(long, default_value = "dev-data")]
    dir: PathBuf,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

async fn run(cli: Cli) -> Result<(), String> {
    let db = db::connect_url(&cli.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    migration::Migrator::up(&db, None)
        .await
        .map_err(|error| format!("failed to run migrations: {error}"))?;

    if cli.delete {
        seed::wipe(&db)
            .await
            .map_err(|error| format!("failed to delete data: {error}"))?;
        println!("Data successfully deleted!");
    } else {
        let summary = seed::import(&db, &cli.dir)
            .await
            .map_err(|error| format!("failed to import data: {error}"))?;
        println!(
            "Data successfully loaded! ({} users, {} tours, {} reviews)",
            summary.users, summary.tours, summary.reviews
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tour_booking_backend=info".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
