//! shopcache - command-line access to the local catalog cache.
//!
//! Reads are served from the local database and work offline; syncs and
//! live prices need the catalog and pricing services to be reachable.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shopcache_core::utils::{age_display, format_price, truncate_string};
use shopcache_core::{CatalogEngine, CategoryNode, EngineConfig, EnrichedProduct, SyncOutcome};

// ============================================================================
// Constants
// ============================================================================

/// Log files are written under `<data_dir>/logs`
const LOG_DIR: &str = "logs";

/// Prefix for the daily log files
const LOG_FILE_PREFIX: &str = "shopcache.log";

/// Width of the product name column
const NAME_COLUMN_WIDTH: usize = 40;

const USAGE: &str = "\
Usage: shopcache <command> [args]

Commands:
  sync [--category ID] [--quick]   Full sync, or sync one category
  products ID                      List a category's products with prices
  search QUERY...                  Search the local catalog
  tree                             Show the category tree
  stats                            Show cache counts and sync freshness
  watch ID...                      Auto-sync categories until Ctrl-C
  help                             Show this message

Set RUST_LOG (e.g. RUST_LOG=debug) to control log output.";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Sync { category: Option<u64>, quick: bool },
    Products(u64),
    Search(String),
    Tree,
    Stats,
    Watch(Vec<u64>),
    Help,
}

fn parse_id(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("Invalid category id '{}'", raw))
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "sync" => {
            let mut category = None;
            let mut quick = false;
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--quick" => quick = true,
                    "--category" => {
                        let Some(raw) = iter.next() else {
                            bail!("--category needs an id");
                        };
                        category = Some(parse_id(raw)?);
                    }
                    other => bail!("Unknown sync option '{}'", other),
                }
            }
            if quick && category.is_none() {
                bail!("--quick needs --category");
            }
            Ok(Command::Sync { category, quick })
        }
        "products" => match rest {
            [raw] => Ok(Command::Products(parse_id(raw)?)),
            _ => bail!("products takes exactly one category id"),
        },
        "search" => {
            if rest.is_empty() {
                bail!("search needs a query");
            }
            Ok(Command::Search(rest.join(" ")))
        }
        "tree" => Ok(Command::Tree),
        "stats" => Ok(Command::Stats),
        "watch" => {
            if rest.is_empty() {
                bail!("watch needs at least one category id");
            }
            let ids = rest.iter().map(|raw| parse_id(raw)).collect::<Result<Vec<_>>>()?;
            Ok(Command::Watch(ids))
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Initialize the tracing subscriber: stderr always, plus a daily log
/// file when the log directory can be created.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = EngineConfig::load().context("Failed to load configuration")?;
    let log_dir = config.data_dir().ok().map(|dir| dir.join(LOG_DIR));
    let _guard = init_tracing(log_dir.as_deref());
    info!(command = ?command, "shopcache starting");

    let media_url = config.media_url.clone();
    let engine = CatalogEngine::open(config)?;
    let result = run(&engine, command, media_url.as_deref()).await;
    engine.shutdown().await;
    result
}

async fn run(engine: &CatalogEngine, command: Command, media_url: Option<&str>) -> Result<()> {
    match command {
        Command::Sync { category, quick } => {
            let outcome = match (category, quick) {
                (Some(id), true) => engine.quick_sync(id).await?,
                (Some(id), false) => engine.force_category_sync(id).await?,
                (None, _) => engine.force_full_sync().await?,
            };
            print_outcome(&outcome);
        }
        Command::Products(id) => {
            let products = engine.get_products_by_category(id).await?;
            if products.is_empty() {
                println!("No products in category {}", id);
            }
            for item in &products {
                print_product(item, media_url);
            }
        }
        Command::Search(query) => {
            let hits = engine.search_products(&query);
            println!("{} match(es) for '{}'", hits.len(), query);
            for item in &hits {
                print_product(item, media_url);
            }
        }
        Command::Tree => {
            let tree = engine.get_categories_hierarchy().await?;
            for node in &tree {
                print_node(node, 0);
            }
        }
        Command::Stats => print_stats(engine),
        Command::Watch(ids) => {
            engine.start_auto_sync(ids.clone());
            println!("Auto-syncing categories {:?}, press Ctrl-C to stop", ids);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            engine.stop_auto_sync();
            println!();
            print_stats(engine);
        }
        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_outcome(outcome: &SyncOutcome) {
    println!(
        "Synced {}: {} categories, {} products{}",
        outcome.scope,
        outcome.categories,
        outcome.products,
        if outcome.joined { " (joined running sync)" } else { "" }
    );
    for failed in &outcome.failed {
        println!("  failed: {}", failed);
    }
}

fn print_product(item: &EnrichedProduct, media_url: Option<&str>) {
    let price = item
        .effective_price
        .map(format_price)
        .unwrap_or_else(|| "-".to_string());
    let source = if item.prices_updated { "live" } else { "stored" };
    let promo = if item.has_promotion { " promo" } else { "" };
    let stock = item
        .stock
        .map(|s| s.to_string())
        .unwrap_or_else(|| "?".to_string());

    println!(
        "{:>8}  {:<width$}  {:>10} {:<6}{:<6} stock {}",
        item.product.id,
        truncate_string(&item.product.name, NAME_COLUMN_WIDTH),
        price,
        source,
        promo,
        stock,
        width = NAME_COLUMN_WIDTH
    );

    if let (Some(base), Some(media)) = (media_url, item.product.media.as_ref()) {
        if let Some(url) = media.candidate_urls(base).first() {
            println!("{:>8}  {}", "", url);
        }
    }
}

fn print_node(node: &CategoryNode, depth: usize) {
    let inactive = if node.active { "" } else { " (inactive)" };
    println!("{}{} [{}]{}", "  ".repeat(depth), node.name, node.id, inactive);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn print_stats(engine: &CatalogEngine) {
    let stats = engine.stats();
    let now = Utc::now();

    println!(
        "Storage:    {}",
        if stats.storage_available { "ok" } else { "unavailable" }
    );
    println!("Categories: {}", stats.total_categories);
    println!("Products:   {}", stats.total_products);
    println!(
        "Prices:     {} categories, {} entries",
        stats.price_cache.categories_cached, stats.price_cache.entry_count
    );
    println!(
        "Auto-sync:  {}",
        if stats.auto_sync_running { "running" } else { "stopped" }
    );

    if stats.scopes.is_empty() {
        println!("No syncs recorded yet");
        return;
    }
    println!();
    for scope in &stats.scopes {
        let synced = scope
            .last_success
            .map(|t| age_display(t, now))
            .unwrap_or_else(|| "never".to_string());
        let status = match (&scope.last_error, scope.in_flight) {
            (_, true) => "syncing".to_string(),
            (Some(err), false) => format!("error: {}", truncate_string(err, 60)),
            (None, false) => "ok".to_string(),
        };
        println!("  {:<16} synced {:<10} {}", scope.scope, synced, status);
    }
}
