//! stocksim - walk-forward stock forecasting simulator
//!
//! # Usage
//! ```sh
//! stocksim buy AAPL 1500
//! stocksim simulate --end 2025-06-30 --export-dir out/
//! stocksim evaluate --ticker AAPL
//! ```
//!
//! Settings come from the environment (and `.env`); see `config`.

use anyhow::{Context, Result};
use chrono::{Days, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use stocksim::application::forecasting::orchestrator::{SimulationOrchestrator, SimulationSettings};
use stocksim::application::ml::evaluation::{benchmark_return, evaluate_holdout};
use stocksim::application::ml::predictor::ModelKind;
use stocksim::config::Config;
use stocksim::domain::ports::{MarketDataProvider, PortfolioStore};
use stocksim::domain::trading::session::TradingSession;
use stocksim::infrastructure::JsonPortfolioStore;
use stocksim::interfaces::report;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Invest part of the virtual balance in a ticker
    Buy {
        ticker: String,
        amount: Decimal,
    },
    /// Show holdings and remaining balance
    Portfolio,
    /// Forecast every holding to a target date and report returns
    Simulate {
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Override FORECAST_MODEL (random_forest or recurrent)
        #[arg(long)]
        model: Option<ModelKind>,

        /// Override FORECAST_WINDOW_SIZE
        #[arg(long)]
        window: Option<usize>,

        /// Write <TICKER>_forecast.csv files here
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Hold-out accuracy of one-step predictions for a ticker
    Evaluate {
        #[arg(long)]
        ticker: String,

        /// Index to compare against over the same history
        #[arg(long, default_value = "^GSPC")]
        benchmark: String,

        /// Fraction of history used for training
        #[arg(long, default_value_t = 0.8)]
        split: f64,

        #[arg(long)]
        model: Option<ModelKind>,
    },
    /// Clear all holdings and restore the starting balance
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = JsonPortfolioStore::new(config.simulation.portfolio_path.clone());
    let starting_balance = config.simulation.starting_balance;

    match cli.command {
        Commands::Buy { ticker, amount } => {
            let mut session = TradingSession::restore(starting_balance, store.load()?);
            let balance = session.buy(&ticker, amount)?;
            store.save(session.portfolio())?;
            println!("Bought ${} of {}. Balance: ${:.2}", amount, ticker.trim().to_uppercase(), balance);
        }
        Commands::Portfolio => {
            let session = TradingSession::restore(starting_balance, store.load()?);
            print!("{}", report::render_portfolio(&session));
        }
        Commands::Reset => {
            let mut session = TradingSession::restore(starting_balance, store.load()?);
            session.reset();
            store.save(session.portfolio())?;
            println!("Portfolio cleared. Balance: ${:.2}", session.balance());
        }
        Commands::Simulate {
            end,
            model,
            window,
            export_dir,
        } => {
            let mut settings = config.to_simulation_settings();
            if let Some(kind) = model {
                settings.model.kind = kind;
            }
            if let Some(w) = window {
                settings.window_size = w;
            }

            let session = TradingSession::restore(starting_balance, store.load()?);
            let orchestrator = SimulationOrchestrator::new(config.build_provider(), settings);

            let cancel = orchestrator.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling remaining forecasts");
                    cancel.cancel();
                }
            });

            let report = orchestrator.run(&session.snapshot(), &end).await?;
            print!("{}", report::render_report(&report));

            if let Some(dir) = export_dir {
                let written = report::export_forecasts(&report, &dir)?;
                info!("Wrote {} forecast files to {:?}", written.len(), dir);
            }
        }
        Commands::Evaluate {
            ticker,
            benchmark,
            split,
            model,
        } => {
            let mut settings = config.to_simulation_settings();
            if let Some(kind) = model {
                settings.model.kind = kind;
            }
            evaluate(config.build_provider(), &ticker, &benchmark, split, settings).await?;
        }
    }

    Ok(())
}

async fn evaluate(
    provider: Arc<dyn MarketDataProvider>,
    ticker: &str,
    benchmark: &str,
    split: f64,
    settings: SimulationSettings,
) -> Result<()> {
    let end = Utc::now().date_naive();
    let start = end
        .checked_sub_days(Days::new(settings.history_days))
        .context("history window underflows the calendar")?;

    let series = provider.fetch(ticker, start, end).await?;
    let evaluation = tokio::task::spawn_blocking(move || {
        evaluate_holdout(&series, &settings.model, settings.window_size, split)
    })
    .await
    .context("evaluation worker failed")??;

    // The benchmark is informational; a failed fetch only drops that line.
    let index_return = match provider.fetch(benchmark, start, end).await {
        Ok(index) => benchmark_return(&index).ok(),
        Err(e) => {
            warn!("Benchmark {} unavailable: {}", benchmark, e);
            None
        }
    };

    print!(
        "{}",
        report::render_evaluation(
            &ticker.trim().to_uppercase(),
            &evaluation,
            index_return.map(|pct| (benchmark, pct))
        )
    );
    Ok(())
}
