// Trade Cost Simulator - CLI entry point
// Wires the feed connector, simulation controller, display tick, and
// metrics sampler together.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use trade_simulator::{
    Config, FeedConnector, MetricsSampler, OrderType, SimulationController, SimulationParameters,
};

#[derive(Parser)]
#[command(name = "trade-sim")]
#[command(version = "0.2.0")]
#[command(about = "Streaming order-book trade cost simulator", long_about = None)]
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
    /// Write a default configuration file
    Init,

    /// Connect to the feed and stream cost estimates
    Run {
        /// Trading pair override
        #[arg(long)]
        pair: Option<String>,

        /// Order notional in USD
        #[arg(long)]
        quantity: Option<f64>,

        /// Order type: market or limit
        #[arg(long)]
        order_type: Option<String>,

        /// Fee tier override
        #[arg(long)]
        fee_tier: Option<String>,

        /// Fractional daily volatility
        #[arg(long)]
        volatility: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Init => {
            if std::path::Path::new(&cli.config).exists() {
                warn!("Config file {} already exists, leaving it in place", cli.config);
            } else {
                Config::default().to_file(&cli.config)?;
                info!("Created default config file: {}", cli.config);
            }
            Ok(())
        }
        Commands::Run {
            pair,
            quantity,
            order_type,
            fee_tier,
            volatility,
        } => {
            run(
                &cli.config,
                pair,
                quantity,
                order_type,
                fee_tier,
                volatility,
            )
            .await
        }
    }
}

async fn run(
    config_path: &str,
    pair: Option<String>,
    quantity: Option<f64>,
    order_type: Option<String>,
    fee_tier: Option<String>,
    volatility: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_create(config_path)?;

    let mut params = SimulationParameters::from_config(&config)?;
    if let Some(pair) = pair {
        params.pair = pair;
    }
    if let Some(quantity) = quantity {
        params.quantity = quantity;
    }
    if let Some(order_type) = order_type {
        params.order_type = order_type.parse::<OrderType>()?;
    }
    if let Some(fee_tier) = fee_tier {
        params.fee_tier = fee_tier;
    }
    if let Some(volatility) = volatility {
        params.volatility = volatility;
    }

    info!(
        exchange = %params.exchange,
        pair = %params.pair,
        order_type = %params.order_type,
        quantity = params.quantity,
        fee_tier = %params.fee_tier,
        "Starting trade cost simulator"
    );

    let controller = Arc::new(SimulationController::new(config.clone(), params)?);

    // Metrics sampler polls the controller's numeric accessors on its own timer
    let sampler = Arc::new(MetricsSampler::new());
    {
        let c = Arc::clone(&controller);
        sampler.register("avg_latency_ms", move || c.average_latency_ms());
        let c = Arc::clone(&controller);
        sampler.register("messages_per_sec", move || c.processing_rate());
        let c = Arc::clone(&controller);
        sampler.register("message_count", move || c.message_count() as f64);
        let c = Arc::clone(&controller);
        sampler.register("degraded_total", move || c.degraded_total() as f64);
        let c = Arc::clone(&controller);
        sampler.register("crossed_books", move || c.crossed_books() as f64);
    }
    let sampler_task = tokio::spawn(
        Arc::clone(&sampler).run(Duration::from_secs(config.monitoring.report_interval_secs)),
    );

    let mut feed = FeedConnector::new(&config, Arc::clone(&controller))?;
    feed.connect().await?;

    // Display tick: reads the latest published snapshot at a fixed cadence
    let refresh_ms = config.monitoring.display_refresh_ms;
    let display_task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(refresh_ms));
            // Log one status line every ~5 seconds worth of ticks
            let log_every = (5000 / refresh_ms).max(1);
            let mut ticks: u64 = 0;
            loop {
                ticker.tick().await;
                ticks += 1;
                if ticks % log_every != 0 || !controller.has_data() {
                    continue;
                }
                let snapshot = controller.snapshot();
                info!(
                    mid = snapshot.mid_price.unwrap_or(0.0),
                    slippage_pct = snapshot.estimate.slippage_pct,
                    fee_usd = snapshot.estimate.fee_usd,
                    impact_pct = snapshot.estimate.market_impact_pct,
                    net_cost_usd = snapshot.estimate.net_cost_usd,
                    maker = snapshot.estimate.maker_proportion,
                    latency_ms = controller.average_latency_ms(),
                    rate = controller.processing_rate(),
                    connected = controller.is_connected(),
                    "Cost estimate"
                );
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    feed.disconnect().await;
    display_task.abort();
    sampler_task.abort();

    info!(
        messages = controller.message_count(),
        degraded = controller.degraded_total(),
        "Simulator stopped"
    );
    Ok(())
}
