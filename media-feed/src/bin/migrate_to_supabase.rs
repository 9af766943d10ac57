use clap::{Parser, ValueEnum};
use media_feed::migration::{load_items, Migrator, DEMO_USER_ID};
use media_feed::{MigrationReport, SupabaseClient, SupabaseConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Step {
    Products,
    Images,
    UserMedia,
}

/// Copies the legacy JSON collections and user images into the hosted backend
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Steps to run, in order
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [Step::Images, Step::UserMedia])]
    steps: Vec<Step>,

    /// Legacy product collection
    #[arg(long, default_value = "public/media.json")]
    products: PathBuf,

    /// Legacy user media collection
    #[arg(long, default_value = "public/user_media.json")]
    user_media: PathBuf,

    /// Directory with the legacy user images
    #[arg(long, default_value = "public/images/user_images")]
    images_dir: PathBuf,

    /// Owner of the migrated user media
    #[arg(long, default_value = DEMO_USER_ID)]
    user_id: Uuid,

    /// Storage bucket for user images
    #[arg(long, default_value = "user-images")]
    bucket: String,
}

fn load_env() {
    if let Err(dotenvy::Error::Io(err)) = dotenvy::dotenv() {
        log::debug!("No .env file loaded: {}", err);
    }
}

fn config_from_env(bucket: String) -> Option<SupabaseConfig> {
    let url = std::env::var("SUPABASE_URL").ok()?;
    let anon_key = std::env::var("SUPABASE_ANON_KEY").ok()?;
    let mut config = SupabaseConfig::new(url, anon_key);
    config.bucket = bucket;
    Some(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = Args::parse();

    let Some(config) = config_from_env(args.bucket.clone()) else {
        log::error!("Missing Supabase credentials: set SUPABASE_URL and SUPABASE_ANON_KEY");
        return ExitCode::FAILURE;
    };
    log::info!("Starting migration to {}", config.url);

    let client = match SupabaseClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Ok(token) = std::env::var("SUPABASE_ACCESS_TOKEN") {
        client.set_access_token(Some(token));
    }

    let migrator = Migrator::new(client.clone(), client, args.user_id);
    log::info!("Using user ID: {}", migrator.user_id());

    let mut totals = MigrationReport::default();
    let mut url_map = HashMap::new();

    for step in &args.steps {
        let report = match step {
            Step::Products => match load_items(&args.products) {
                Ok(items) => migrator.migrate_products(&items).await,
                Err(e) => {
                    log::error!("{}", e);
                    return ExitCode::FAILURE;
                }
            },
            Step::Images => match migrator.upload_user_images(&args.images_dir).await {
                Ok((report, map)) => {
                    url_map = map;
                    report
                }
                Err(e) => {
                    log::error!("{}", e);
                    return ExitCode::FAILURE;
                }
            },
            Step::UserMedia => match load_items(&args.user_media) {
                Ok(items) => migrator.migrate_user_media(&items, &url_map).await,
                Err(e) => {
                    log::error!("{}", e);
                    return ExitCode::FAILURE;
                }
            },
        };
        totals.succeeded += report.succeeded;
        totals.failed += report.failed;
    }

    log::info!("Migration complete: {}", totals);
    if totals.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
