use anyhow::Context;
use clap::{Parser, Subcommand};
use freight_core::domain::load::LoadSearchParams;
use freight_core::domain::negotiation::NegotiationRequest;
use freight_core::service::LookupError;
use freight_core::storage::call_records::PgCallHistoryStore;
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod seed;

#[derive(Debug, Parser)]
#[command(name = "freight_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search available loads and print them with negotiation windows.
    Search {
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        equipment_type: Option<String>,
        #[arg(long)]
        min_rate: Option<f64>,
        #[arg(long)]
        max_rate: Option<f64>,
        #[arg(long)]
        max_weight: Option<f64>,
        /// Earliest pickup (YYYY-MM-DD or ISO-8601).
        #[arg(long)]
        pickup_date: Option<String>,
        /// Latest delivery; a bare date includes the whole day.
        #[arg(long)]
        delivery_date: Option<String>,
    },

    /// Print one load with its negotiation window.
    Get { load_id: String },

    /// Check a carrier offer against the posted rate.
    Evaluate {
        #[arg(long)]
        load_id: String,
        #[arg(long)]
        offer: f64,
        #[arg(long, default_value_t = 1)]
        round: u32,
    },

    /// Replace all loads with the contents of a JSON array file.
    SeedLoads {
        #[arg(long, default_value = "data/seed_loads.json")]
        file: std::path::PathBuf,
    },

    /// Generate mock call records against existing loads.
    SeedCalls {
        #[arg(long, default_value_t = 300)]
        count: usize,

        /// Only delete previously generated mock records.
        #[arg(long)]
        clean: bool,
    },
}

#[derive(Debug, Serialize)]
struct GetOutput {
    #[serde(flatten)]
    load: freight_core::domain::load::PricedLoad,
    pricing_degraded: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = freight_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    match run(args, &settings).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if !reportable(&err) => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "freight_worker failed");
            Err(err)
        }
    }
}

/// Unknown or unavailable loads are answers, not incidents.
fn reportable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<LookupError>().is_none()
}

async fn run(args: Args, settings: &freight_core::config::Settings) -> anyhow::Result<()> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    freight_core::storage::migrate(&pool).await?;

    let store = PgCallHistoryStore::new(pool.clone());
    let opts = settings.pricing_options();
    let now = chrono::Utc::now();

    match args.command {
        Command::Search {
            origin,
            destination,
            equipment_type,
            min_rate,
            max_rate,
            max_weight,
            pickup_date,
            delivery_date,
        } => {
            let params = LoadSearchParams {
                origin,
                destination,
                equipment_type,
                min_rate,
                max_rate,
                max_weight,
                pickup_date,
                delivery_date,
            };
            let res = freight_core::service::search_loads(&pool, &store, params, now, &opts).await?;
            tracing::info!(total = res.total, degraded = res.pricing_degraded, "search complete");
            print_json(&res)?;
        }
        Command::Get { load_id } => {
            let (load, pricing_degraded) =
                freight_core::service::get_load(&pool, &store, &load_id, now, &opts)
                    .await
                    .and_then(|found| freight_core::service::require_load(found, &load_id))?;
            print_json(&GetOutput {
                load,
                pricing_degraded,
            })?;
        }
        Command::Evaluate {
            load_id,
            offer,
            round,
        } => {
            let request = NegotiationRequest {
                load_id,
                carrier_offer: offer,
                negotiation_round: round,
            };
            let res = freight_core::service::evaluate_offer(&pool, &request, now).await?;
            print_json(&res)?;
        }
        Command::SeedLoads { file } => {
            let inserted = seed::seed_loads(&pool, &file).await?;
            tracing::info!(inserted, file = %file.display(), "seeded loads");
        }
        Command::SeedCalls { count, clean } => {
            let deleted = freight_core::storage::call_records::delete_mock_call_records(&pool).await?;
            tracing::info!(deleted, "deleted mock call records");
            if !clean {
                let inserted = seed::seed_call_records(&pool, count, now).await?;
                tracing::info!(inserted, "seeded mock call records");
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output failed")?;
    println!("{out}");
    Ok(())
}

fn init_sentry(settings: &freight_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
