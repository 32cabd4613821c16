// Grid trading engine CLI
// Single entry point: initialize a workspace, preview a grid, run a session.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use grid_trading_engine::gateway::rest::DEFAULT_BASE_URL;
use grid_trading_engine::{
    alert, calculator, Config, EngineMode, GridEngine, MarketDataGateway, OrderGateway,
    RestMarketDataGateway, SimulatedGateway,
};

#[derive(Parser)]
#[command(name = "grid-engine")]
#[command(version = "0.2.0")]
#[command(about = "Automated grid trading engine", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,

    /// Preview the grid a configuration would trade
    Levels {
        /// Override lower price bound
        #[arg(long)]
        lower: Option<f64>,

        /// Override upper price bound
        #[arg(long)]
        upper: Option<f64>,

        /// Override grid count
        #[arg(long)]
        grids: Option<usize>,

        /// Override total investment
        #[arg(long)]
        investment: Option<f64>,
    },

    /// Run a grid trading session
    Run {
        /// Override instrument
        #[arg(long)]
        instrument: Option<String>,

        /// Override lower price bound
        #[arg(long)]
        lower: Option<f64>,

        /// Override upper price bound
        #[arg(long)]
        upper: Option<f64>,

        /// Override grid count
        #[arg(long)]
        grids: Option<usize>,

        /// Fixed quantity per grid level
        #[arg(long)]
        quantity: Option<f64>,

        /// Total investment spread across levels
        #[arg(long)]
        investment: Option<f64>,

        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Tick strategy
        #[arg(long, value_enum)]
        mode: Option<EngineMode>,

        /// Use the live REST price feed instead of the simulated walk
        /// (order execution stays paper-traded)
        #[arg(long)]
        live: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
    );
    tracing_subscriber::fmt::init();

    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(_) => 1,
    };
    std::process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), ()> {
    match cli.command {
        Commands::Init => init_workspace(&cli.config),
        Commands::Levels {
            lower,
            upper,
            grids,
            investment,
        } => preview_levels(&cli.config, lower, upper, grids, investment),
        Commands::Run {
            instrument,
            lower,
            upper,
            grids,
            quantity,
            investment,
            interval,
            mode,
            live,
        } => {
            let mut config = load_config(&cli.config)?;
            apply_overrides(
                &mut config,
                instrument,
                lower,
                upper,
                grids,
                quantity,
                investment,
                interval,
                mode,
            );
            if let Err(e) = config.validate() {
                error!("❌ {}", e);
                return Err(());
            }
            run_session(config, live).await
        }
    }
}

fn load_config(path: &str) -> Result<Config, ()> {
    match Config::from_file(path) {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("❌ {}", e);
            error!("💡 run `grid-engine init` to create a default {}", path);
            Err(())
        }
    }
}

fn init_workspace(path: &str) -> Result<(), ()> {
    if std::path::Path::new(path).exists() {
        warn!("⚠️  {} already exists, leaving it untouched", path);
        return Ok(());
    }
    match Config::default().to_file(path) {
        Ok(()) => {
            info!("📝 created {}", path);
            info!("💡 edit the [grid] section, then run: grid-engine run");
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            Err(())
        }
    }
}

fn preview_levels(
    config_path: &str,
    lower: Option<f64>,
    upper: Option<f64>,
    grids: Option<usize>,
    investment: Option<f64>,
) -> Result<(), ()> {
    let config = Config::from_file(config_path).unwrap_or_default();
    let lower = lower.unwrap_or(config.grid.lower_price);
    let upper = upper.unwrap_or(config.grid.upper_price);
    let count = grids.unwrap_or(config.grid.grid_count);
    let total = investment
        .or(config.grid.total_investment)
        .unwrap_or(config.engine.fallback_investment);

    let levels = match calculator::compute_levels(lower, upper, count) {
        Ok(levels) => levels,
        Err(e) => {
            error!("❌ {}", e);
            return Err(());
        }
    };
    let quantities = match calculator::compute_quantities(total, &levels) {
        Ok(quantities) => quantities,
        Err(e) => {
            error!("❌ {}", e);
            return Err(());
        }
    };

    info!(
        "grid over [{:.4}, {:.4}], {} levels, {:.2} invested:",
        lower,
        upper,
        levels.len(),
        total
    );
    for (level, quantity) in levels.iter().zip(&quantities) {
        info!(
            "  level {:>3}: price {:>12.4}  quantity {:>12.6}",
            level.index, level.price, quantity
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn apply_overrides(
    config: &mut Config,
    instrument: Option<String>,
    lower: Option<f64>,
    upper: Option<f64>,
    grids: Option<usize>,
    quantity: Option<f64>,
    investment: Option<f64>,
    interval: Option<u64>,
    mode: Option<EngineMode>,
) {
    if let Some(instrument) = instrument {
        config.grid.instrument = instrument;
    }
    if let Some(lower) = lower {
        config.grid.lower_price = lower;
    }
    if let Some(upper) = upper {
        config.grid.upper_price = upper;
    }
    if let Some(grids) = grids {
        config.grid.grid_count = grids;
    }
    if let Some(quantity) = quantity {
        config.grid.quantity_per_grid = Some(quantity);
        config.grid.total_investment = None;
    }
    if let Some(investment) = investment {
        config.grid.total_investment = Some(investment);
        config.grid.quantity_per_grid = None;
    }
    if let Some(interval) = interval {
        config.grid.poll_interval_secs = interval;
    }
    if let Some(mode) = mode {
        config.engine.mode = mode;
    }
}

async fn run_session(config: Config, live: bool) -> Result<(), ()> {
    // Order execution always goes through the in-process paper book; the
    // --live flag only switches the price feed to the real REST ticker.
    let start_price = (config.grid.lower_price + config.grid.upper_price) / 2.0;
    let paper_book = Arc::new(SimulatedGateway::new(start_price));
    let order_gateway: Arc<dyn OrderGateway> = paper_book.clone();

    let market_data: Arc<dyn MarketDataGateway> = if live {
        let base_url = config
            .market_data_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        info!("📡 live price feed: {}", base_url);
        Arc::new(RestMarketDataGateway::new(base_url))
    } else {
        info!("🧪 simulated price feed (paper trading)");
        paper_book
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    let webhook = config.alert_webhook.clone();
    let mut engine = GridEngine::new(config, market_data, order_gateway, shutdown_rx);

    match engine.run().await {
        Ok(()) => {
            info!("session complete, realized profit: {:.2}", engine.realized_profit());
            Ok(())
        }
        Err(e) => {
            error!("❌ session aborted: {}", e);
            if let Some(url) = webhook {
                alert::send_fatal_alert(&url, &e.to_string()).await;
            }
            Err(())
        }
    }
}
