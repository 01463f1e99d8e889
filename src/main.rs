use clap::{Args, Parser, Subcommand};
use forecast_engine::{ForecastRequest, Interval, ModelKind};
use owlcast::config::ForecastDefaults;
use owlcast::{telemetry, AnalyzeRequest, AppConfig, ForecastService, ServiceError, SyncRequest};
use price_cache::AssetCategory;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "owlcast", version, about = "Cache price history and forecast it")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch full history for a symbol into the cache
    Sync {
        symbol: String,
        #[arg(long, default_value = "stock")]
        category: AssetCategory,
        #[arg(long)]
        interval: Option<Interval>,
    },
    /// Forecast from cached prices
    Forecast {
        symbol: String,
        #[command(flatten)]
        options: ForecastOptions,
    },
    /// Sync if the symbol is new, then forecast
    Analyze {
        symbol: String,
        #[arg(long, default_value = "stock")]
        category: AssetCategory,
        #[command(flatten)]
        options: ForecastOptions,
    },
    /// List cached assets
    Assets,
    /// Show cached prices, newest first
    Prices {
        symbol: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Args)]
struct ForecastOptions {
    /// Sampling interval: 1wk or 1mo
    #[arg(long)]
    interval: Option<Interval>,
    /// Periods ahead (1-52)
    #[arg(long)]
    periods: Option<usize>,
    /// Model: base, lstm or prophet
    #[arg(long)]
    model: Option<ModelKind>,
    /// Lookback window (5-60)
    #[arg(long)]
    lookback: Option<usize>,
    /// Training epochs for lstm (10-200)
    #[arg(long)]
    epochs: Option<usize>,
    /// Confidence level (0.5-0.99)
    #[arg(long)]
    confidence: Option<f64>,
}

impl ForecastOptions {
    fn into_request(self, symbol: String, defaults: &ForecastDefaults) -> ForecastRequest {
        let base = defaults.request(symbol);
        ForecastRequest {
            interval: self.interval.unwrap_or(base.interval),
            periods: self.periods.unwrap_or(base.periods),
            model: self.model.unwrap_or(base.model),
            lookback_window: self.lookback.unwrap_or(base.lookback_window),
            epochs: self.epochs.unwrap_or(base.epochs),
            confidence_level: self.confidence.unwrap_or(base.confidence_level),
            symbol: base.symbol,
        }
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), ServiceError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| ServiceError::Internal(format!("cannot encode output: {}", e)))?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        let kind = error.kind();
        eprintln!("error[{}]: {error}", kind.code());
        std::process::exit(kind.exit_code());
    }
}

async fn run() -> Result<(), ServiceError> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    telemetry::init(&config.log.filter);

    let service = ForecastService::from_config(&config)?;
    let defaults = &config.forecast;

    match cli.command {
        Command::Sync {
            symbol,
            category,
            interval,
        } => {
            let request = SyncRequest {
                symbol,
                category,
                interval: interval.unwrap_or(defaults.interval),
            };
            render(&service.sync(request).await?, cli.pretty)
        }
        Command::Forecast { symbol, options } => {
            let request = options.into_request(symbol, defaults);
            render(&service.forecast(request).await?, cli.pretty)
        }
        Command::Analyze {
            symbol,
            category,
            options,
        } => {
            let request = AnalyzeRequest {
                category,
                forecast: options.into_request(symbol.clone(), defaults),
            };
            render(&service.analyze(&symbol, request).await?, cli.pretty)
        }
        Command::Assets => render(&service.list_assets().await?, cli.pretty),
        Command::Prices { symbol, limit } => render(&service.prices(&symbol, limit).await?, cli.pretty),
    }
}
