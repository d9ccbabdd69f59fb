use analytics::{
    AssetReturns, AttributionEngine, AttributionOutcome, PerformanceReport, PortfolioSeries,
    WeightsSeries,
};
use anyhow::Context;
use backtester::Backtester;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{Config, ResidualPolicy, init_tracing, load_config};
use core_types::MarketData;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use strategies::create_calculator;

const REBALANCE_LOG_FILE: &str = "rebalance_log.json";
const WEIGHTS_FILE: &str = "weights.json";
const PORTFOLIO_FILE: &str = "portfolio.json";
const ASSET_RETURNS_FILE: &str = "asset_returns.json";
const PERFORMANCE_FILE: &str = "performance.json";
const ATTRIBUTION_FILE: &str = "attribution.json";

/// The main entry point for the Meridian allocation backtester.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; it only carries optional overrides.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Run(args) => handle_run(args).await,
        Commands::Attribute(args) => handle_attribute(args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Multi-asset rebalancing backtester with performance attribution.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the configured allocation and attribute its returns.
    Run(RunArgs),
    /// Re-run attribution over the series written by a previous `run`.
    Attribute(AttributeArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Market data JSON: `prices`, `valuations` and `yields` series.
    #[arg(long)]
    data: PathBuf,

    /// Directory the reports are written to.
    #[arg(long, default_value = "reports")]
    out: PathBuf,

    /// Overrides `[attribution].residual_policy`.
    #[arg(long, value_enum)]
    residual_policy: Option<ResidualPolicy>,

    /// Do not draw the progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Parser)]
struct AttributeArgs {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding the weights, portfolio and asset return series.
    #[arg(long, default_value = "reports")]
    input: PathBuf,

    /// Where to write the attribution report; defaults to the input directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Overrides `[attribution].residual_policy`.
    #[arg(long, value_enum)]
    residual_policy: Option<ResidualPolicy>,
}

// ==============================================================================
// Run Command Logic
// ==============================================================================

async fn handle_run(args: RunArgs) -> anyhow::Result<()> {
    let config = prepare(&args.config, args.residual_policy)?;
    let _guard = init_tracing(&config.logging)?;

    let data: MarketData = read_json(&args.data).await?;
    let registry = config.registry();
    let calculator = create_calculator(&config.calculator, &registry)
        .context("failed to build the weight calculator")?;
    tracing::info!(
        calculator = config.calculator.kind(),
        assets = registry.len(),
        "configuration loaded"
    );

    // The simulation is CPU-bound and synchronous; keep it off the async workers.
    let simulation = config.simulation.clone();
    let rebalance = config.rebalance.clone();
    let show_progress = !args.no_progress;
    let result = tokio::task::spawn_blocking(move || {
        let backtester = Backtester::new(data, registry, simulation, rebalance, calculator);
        let backtester = if show_progress {
            backtester
        } else {
            backtester.without_progress()
        };
        backtester.run()
    })
    .await
    .context("simulation task did not complete")??;

    let portfolio = result.portfolio_series()?;
    let weights = result.log.weights_series();
    let outcome = AttributionEngine::new(config.attribution.clone(), config.registry()).compute(
        &portfolio,
        &result.asset_returns,
        &weights,
        &config.attribution.granularities,
    )?;

    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    write_json(&args.out.join(REBALANCE_LOG_FILE), &result.log.rebalance_rows()?).await?;
    write_json(&args.out.join(WEIGHTS_FILE), &weights).await?;
    write_json(&args.out.join(PORTFOLIO_FILE), &portfolio).await?;
    write_json(&args.out.join(ASSET_RETURNS_FILE), &result.asset_returns).await?;
    write_json(&args.out.join(PERFORMANCE_FILE), &result.performance).await?;
    write_json(&args.out.join(ATTRIBUTION_FILE), &outcome).await?;

    println!("{}", performance_table(&result.calculator, &result.performance));
    println!("{}", attribution_table(&outcome));
    Ok(())
}

// ==============================================================================
// Attribute Command Logic
// ==============================================================================

async fn handle_attribute(args: AttributeArgs) -> anyhow::Result<()> {
    let config = prepare(&args.config, args.residual_policy)?;
    let _guard = init_tracing(&config.logging)?;

    let weights: WeightsSeries = read_json(&args.input.join(WEIGHTS_FILE)).await?;
    let portfolio: PortfolioSeries = read_json(&args.input.join(PORTFOLIO_FILE)).await?;
    let asset_returns: AssetReturns = read_json(&args.input.join(ASSET_RETURNS_FILE)).await?;

    let outcome = AttributionEngine::new(config.attribution.clone(), config.registry()).compute(
        &portfolio,
        &asset_returns,
        &weights,
        &config.attribution.granularities,
    )?;

    let out = args.out.unwrap_or(args.input);
    tokio::fs::create_dir_all(&out)
        .await
        .with_context(|| format!("failed to create {}", out.display()))?;
    write_json(&out.join(ATTRIBUTION_FILE), &outcome).await?;

    println!("{}", attribution_table(&outcome));
    Ok(())
}

// ==============================================================================
// Helpers
// ==============================================================================

fn prepare(path: &Path, residual_policy: Option<ResidualPolicy>) -> anyhow::Result<Config> {
    let mut config = load_config(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    if let Some(policy) = residual_policy {
        config.attribution.residual_policy = policy;
    }
    Ok(config)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

fn performance_table(calculator: &str, report: &PerformanceReport) -> Table {
    let ratio = |value: Option<rust_decimal::Decimal>| {
        value.map_or_else(|| "n/a".to_string(), |v| v.round_dp(3).to_string())
    };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Calculator".to_string(), calculator.to_string()]);
    table.add_row(vec!["Periods".to_string(), report.periods.to_string()]);
    table.add_row(vec!["Rebalances".to_string(), report.rebalance_count.to_string()]);
    table.add_row(vec!["Initial equity".to_string(), report.initial_equity.round_dp(2).to_string()]);
    table.add_row(vec!["Final equity".to_string(), report.final_equity.round_dp(2).to_string()]);
    table.add_row(vec!["Total return %".to_string(), report.total_return_pct.round_dp(2).to_string()]);
    table.add_row(vec!["Max drawdown %".to_string(), report.max_drawdown_pct.round_dp(2).to_string()]);
    table.add_row(vec!["Sharpe (per period)".to_string(), ratio(report.sharpe_ratio)]);
    table.add_row(vec!["Calmar".to_string(), ratio(report.calmar_ratio)]);
    table
}

fn attribution_table(outcome: &AttributionOutcome) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let report = match outcome {
        AttributionOutcome::Report(report) => report,
        AttributionOutcome::Insufficient { error } => {
            table.set_header(vec!["Attribution"]);
            table.add_row(vec![error.clone()]);
            return table;
        }
    };

    table.set_header(vec![
        "Granularity",
        "Periods",
        "Return (sum)",
        "Return (compounded)",
        "Asset contribution",
        "Rebalancing impact",
        "Residual",
        "Top contributor",
    ]);
    for (granularity, section) in &report.granularities {
        let stats = &section.summary_statistics;
        let residual = if stats.residual_within_tolerance {
            format!("{:.6}", stats.attribution_accuracy)
        } else {
            format!("{:.6} (!)", stats.attribution_accuracy)
        };
        let top = section
            .top_contributors
            .first()
            .map_or_else(|| "-".to_string(), |r| format!("{} ({:.4})", r.symbol, r.net_impact));
        table.add_row(vec![
            granularity.to_string(),
            stats.periods.to_string(),
            format!("{:.4}", stats.total_portfolio_return),
            format!("{:.4}", stats.compounded_portfolio_return),
            format!("{:.4}", stats.total_asset_contribution),
            format!("{:.4}", stats.total_rebalancing_impact),
            residual,
            top,
        ]);
    }
    table
}
