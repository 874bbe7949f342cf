use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use wayfare_agents::{BudgetPlanner, EstimateAgent, RatingCache, DEFAULT_RATING_CACHE_CAPACITY};
use wayfare_core::{
    parse_category_response, BudgetRequest, BusinessCategory, DepartureLocation, ExpenseCategory,
    TripParameters,
};
use wayfare_observability::{init_tracing, AppMetrics};
use wayfare_search::{
    FixedRatings, LlmRatingService, QueryBackend, RatingBackend, ScriptedClient, SearchConfig,
};
use wayfare_storage::{EstimateRepository, Store};

#[derive(Debug, Parser)]
#[command(name = "wayfare")]
#[command(about = "Wayfare trip cost estimates and budget planning")]
struct Cli {
    /// SQLite URL for estimate history; in-memory when unset.
    #[arg(long, global = true, env = "WAYFARE_DATABASE_URL")]
    database_url: Option<String>,

    /// JSON object of canned replies keyed by query context, used instead of
    /// the live search service.
    #[arg(long, global = true)]
    replay: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate flight and/or hotel costs for a trip.
    Estimate {
        /// flights, hotels or full
        request_type: String,
        #[arg(long)]
        country: String,
        #[arg(long, default_value_t = 1)]
        travelers: u32,
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Departure city; enables flight-specific prompts.
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        round_trip: bool,
        #[arg(long)]
        depart: Option<NaiveDate>,
        #[arg(long = "return")]
        return_date: Option<NaiveDate>,
        /// Extra categories to mention in the prompt context.
        #[arg(long = "category", value_parser = parse_expense_category)]
        categories: Vec<ExpenseCategory>,
    },
    /// Split a budget across business tiers from a JSON request file.
    Budget {
        #[arg(long)]
        input: PathBuf,
        /// `{"hotel": {"Name": 4.2}}` table used instead of live lookups.
        #[arg(long)]
        ratings: Option<PathBuf>,
        #[arg(long, env = "WAYFARE_RATING_CACHE_CAPACITY", default_value_t = DEFAULT_RATING_CACHE_CAPACITY)]
        cache_capacity: usize,
    },
    /// Normalize a saved search reply without calling the service.
    Normalize {
        #[arg(long, value_parser = parse_expense_category)]
        category: ExpenseCategory,
        #[arg(long)]
        file: PathBuf,
    },
    /// Show recently recorded estimates and budget plans.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfare_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Estimate {
            request_type,
            country,
            travelers,
            currency,
            from,
            round_trip,
            depart,
            return_date,
            categories,
        } => {
            let departure = from.map(|name| DepartureLocation {
                name,
                is_round_trip: round_trip,
                outbound_date: depart,
                inbound_date: return_date,
            });
            let params = TripParameters {
                country,
                travelers,
                currency,
                departure,
                categories: categories.into_iter().collect::<BTreeSet<_>>(),
            };

            let store = open_store(cli.database_url.as_deref()).await?;
            let backend = query_backend(cli.replay.as_deref())?;
            let agent = EstimateAgent::new(Arc::new(backend), Arc::new(store), AppMetrics::shared());

            let envelope = agent
                .handle_travel_request(&request_type, params)
                .await
                .with_context(|| format!("{request_type} estimate failed"))?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Command::Budget {
            input,
            ratings,
            cache_capacity,
        } => {
            let request: BudgetRequest = read_json(&input)?;
            let ratings = match ratings {
                Some(path) => {
                    let table: BTreeMap<BusinessCategory, BTreeMap<String, f64>> =
                        read_json(&path)?;
                    RatingBackend::Fixed(FixedRatings::from_table(table))
                }
                None => RatingBackend::Llm(LlmRatingService::new(query_backend(
                    cli.replay.as_deref(),
                )?)),
            };

            let store = open_store(cli.database_url.as_deref()).await?;
            let planner = BudgetPlanner::new(
                Arc::new(ratings),
                Arc::new(store),
                RatingCache::new(cache_capacity),
                AppMetrics::shared(),
            );

            let plan = planner
                .calculate_optimal_budget(request)
                .await
                .context("budget planning failed")?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Normalize { category, file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed reading {}", file.display()))?;
            let estimate = parse_category_response(category, &raw)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Command::History { limit } => {
            let Some(database_url) = cli.database_url.as_deref() else {
                bail!("history needs --database-url or WAYFARE_DATABASE_URL");
            };
            let store = Store::sqlite(database_url).await?;
            let records = store.recent_estimates(limit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}

fn parse_expense_category(value: &str) -> Result<ExpenseCategory, String> {
    ExpenseCategory::parse(value).ok_or_else(|| format!("unknown expense category '{value}'"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

async fn open_store(database_url: Option<&str>) -> Result<Store> {
    match database_url {
        Some(database_url) => Store::sqlite(database_url).await,
        None => Ok(Store::memory()),
    }
}

fn query_backend(replay: Option<&Path>) -> Result<QueryBackend> {
    if let Some(path) = replay {
        let replies: BTreeMap<String, String> = read_json(path)?;
        let client = replies
            .into_iter()
            .fold(ScriptedClient::new(), |client, (context, reply)| {
                client.with_reply(&context, reply)
            });
        return Ok(QueryBackend::Scripted(client));
    }

    let config = SearchConfig::from_env();
    let backend = QueryBackend::from_config(&config)?;
    if !backend.is_configured() {
        eprintln!("WAYFARE_SEARCH_API_KEY is not set; search queries will fail");
    }
    Ok(backend)
}
