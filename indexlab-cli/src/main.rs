//! IndexLab CLI: collection, training, prediction and the HTTP server.
//!
//! Commands:
//! - `collect`: fetch today's index composition and append it to the warehouse
//! - `import`: load a historical CSV export into the warehouse
//! - `train`: temporal k-fold training; saves the best fold's model
//! - `predict`: one-step projection (or fitted history) from the warehouse
//! - `serve`: run the HTTP API
//! - `warehouse status`: partitions, row counts, sizes
//! - `ledger`: past training runs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use indexlab_core::data::{
    collect_portfolio, import_csv, B3Provider, CollectSummary, PortfolioProvider, Warehouse,
};
use indexlab_runner::config::PipelineConfig;
use indexlab_runner::export::{fitted_csv, projections_csv, write_file};
use indexlab_runner::ledger::TrainingLedger;
use indexlab_runner::pipeline::{load_artifact, load_for_prediction, run_training, TrainRun};
use indexlab_runner::predictor::{fitted_history, project_next, PredictOptions};
use indexlab_server::AppState;

#[derive(Parser)]
#[command(
    name = "indexlab",
    about = "IndexLab CLI: index composition warehouse and next-day forecasting"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch today's composition from the exchange and store it.
    Collect,
    /// Import a historical CSV export (cod, asset, type, part, theoricalQty, data_referencia).
    Import {
        /// CSV file to import.
        csv: PathBuf,
    },
    /// Train with temporal k-fold validation and save the selected model.
    Train,
    /// Project the next value per entity from the warehouse contents.
    Predict {
        /// Emit in-sample fitted values for every row instead.
        #[arg(long, default_value_t = false)]
        history: bool,

        /// Write CSV here instead of printing a table.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the HTTP API.
    Serve,
    /// Warehouse management commands.
    Warehouse {
        #[command(subcommand)]
        action: WarehouseAction,
    },
    /// List recorded training runs.
    Ledger {
        /// Show only the most recent N runs.
        #[arg(long)]
        last: Option<usize>,
    },
}

#[derive(Subcommand)]
enum WarehouseAction {
    /// Report partitions, row counts and sizes.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Collect => run_collect(&config),
        Commands::Import { csv } => run_import(&config, &csv),
        Commands::Train => run_train(&config),
        Commands::Predict { history, output } => run_predict(&config, history, output),
        Commands::Serve => run_serve(&config),
        Commands::Warehouse { action } => match action {
            WarehouseAction::Status => run_warehouse_status(&config),
        },
        Commands::Ledger { last } => run_ledger(&config, last),
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "indexlab=info,tower_http=info".into()),
        )
        .init();
}

fn warehouse(config: &PipelineConfig) -> Warehouse {
    Warehouse::new(&config.warehouse.dir)
}

fn run_collect(config: &PipelineConfig) -> Result<()> {
    let provider = B3Provider::new(config.collector.clone())?;
    let summary = collect_portfolio(&provider, &warehouse(config), &config.collector.index)
        .with_context(|| format!("failed to collect {}", config.collector.index))?;
    print_collect_summary(&summary);
    Ok(())
}

fn run_import(config: &PipelineConfig, csv: &Path) -> Result<()> {
    let summary = import_csv(csv, &warehouse(config))
        .with_context(|| format!("failed to import {}", csv.display()))?;
    print_collect_summary(&summary);
    Ok(())
}

fn print_collect_summary(summary: &CollectSummary) {
    println!("Source:     {}", summary.source.as_str());
    println!("Rows:       {}", summary.rows);
    if let (Some(first), Some(last)) = (summary.dates.first(), summary.dates.last()) {
        println!("Dates:      {} ({first} to {last})", summary.dates.len());
    }
    if summary.duplicates_removed > 0 {
        println!("Duplicates: {} removed", summary.duplicates_removed);
    }
    if summary.dropped > 0 {
        println!("Dropped:    {} invalid rows", summary.dropped);
    }
}

fn run_train(config: &PipelineConfig) -> Result<()> {
    let TrainRun {
        report,
        artifact_id,
        artifact_path,
    } = run_training(config)?;

    println!(
        "Data: {} rows, {} dates, {} entities ({} imputed rows)",
        report.n_rows, report.n_dates, report.n_entities, report.imputed_rows
    );
    println!();
    println!(
        "{:<6} {:<25} {:<25} {:>14} {:>14} {:>7}",
        "Fold", "Train", "Validation", "RMSE", "MAE", "Trees"
    );
    println!("{}", "-".repeat(96));
    for (i, fold) in report.folds.iter().enumerate() {
        let marker = if i == report.selected_fold { "*" } else { " " };
        println!(
            "{:<6} {:<25} {:<25} {:>14.4} {:>14.4} {:>7}",
            format!("{}{marker}", i + 1),
            format!("{} to {}", fold.train_first_date, fold.train_last_date),
            format!("{} to {}", fold.validation_first_date, fold.validation_last_date),
            fold.rmse,
            fold.mae,
            fold.n_trees,
        );
    }
    println!();
    println!(
        "Selected fold {} (validation RMSE {:.4}, MAE {:.4})",
        report.selected_fold + 1,
        report.validation_rmse,
        report.validation_mae
    );
    println!();
    println!("Feature importance (split share):");
    for (name, share) in &report.feature_importances {
        println!("  {:<16} {:>6.1}%", name, share * 100.0);
    }
    println!();
    println!("Model saved to: {} [{}]", artifact_path.display(), artifact_id.short());
    Ok(())
}

fn run_predict(config: &PipelineConfig, history: bool, output: Option<PathBuf>) -> Result<()> {
    let artifact = load_artifact(config)?;
    let loaded = load_for_prediction(config)?;

    if history {
        let fitted = fitted_history(&artifact, &loaded.observations)?;
        match output {
            Some(path) => {
                write_file(&path, &fitted_csv(&fitted)?)?;
                println!("{} fitted rows written to {}", fitted.len(), path.display());
            }
            None => {
                println!(
                    "{:<12} {:<8} {:>18} {:>18}",
                    "Date", "Code", "Actual", "Fitted"
                );
                println!("{}", "-".repeat(59));
                for f in &fitted {
                    let actual = f.actual.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
                    println!(
                        "{:<12} {:<8} {:>18} {:>18.2}",
                        f.reference_date.to_string(),
                        f.entity_code,
                        actual,
                        f.prediction
                    );
                }
            }
        }
        return Ok(());
    }

    let options = PredictOptions {
        skip_weekends: config.predict.skip_weekends,
    };
    let projections = project_next(&artifact, &loaded.observations, options)?;
    match output {
        Some(path) => {
            write_file(&path, &projections_csv(&projections)?)?;
            println!("{} projections written to {}", projections.len(), path.display());
        }
        None => {
            println!("Target: {}", artifact.target());
            println!();
            println!(
                "{:<8} {:<12} {:>18} {:<12} {:>18}",
                "Code", "Last date", "Last value", "Next date", "Projected"
            );
            println!("{}", "-".repeat(72));
            for p in &projections {
                println!(
                    "{:<8} {:<12} {:>18.2} {:<12} {:>18.2}",
                    p.entity_code,
                    p.reference_date.to_string(),
                    p.last_value,
                    p.projected_date.to_string(),
                    p.prediction
                );
            }
        }
    }
    Ok(())
}

fn run_serve(config: &PipelineConfig) -> Result<()> {
    // The blocking HTTP client must be created and dropped outside the async runtime.
    let provider: Arc<dyn PortfolioProvider> = Arc::new(B3Provider::new(config.collector.clone())?);
    let options = PredictOptions {
        skip_weekends: config.predict.skip_weekends,
    };
    let mut state = AppState::new(
        warehouse(config),
        provider.clone(),
        config.collector.index.clone(),
        options,
    );
    match load_artifact(config) {
        Ok(artifact) => state = state.with_artifact(artifact)?,
        Err(e) => warn!(error = %format!("{e:#}"), "starting without a model; prediction routes will return 503"),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let addr = config.server.bind_addr();
    let served = runtime.block_on(indexlab_server::serve(state, &addr));
    drop(runtime);
    drop(provider);

    served.with_context(|| format!("server on {addr} failed"))
}

fn run_warehouse_status(config: &PipelineConfig) -> Result<()> {
    let warehouse = warehouse(config);
    let dir = warehouse.root();
    if !dir.exists() {
        println!("Warehouse directory does not exist: {}", dir.display());
        return Ok(());
    }

    let partitions = warehouse.status()?;
    if partitions.is_empty() {
        println!("Warehouse is empty: {}", dir.display());
        return Ok(());
    }

    let total_rows: usize = partitions.iter().filter_map(|p| p.row_count).sum();
    let total_size: u64 = partitions.iter().map(|p| p.size_bytes).sum();

    println!("Warehouse: {}", dir.display());
    println!("Partitions: {}", partitions.len());
    println!("Rows: {total_rows}");
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<12} {:>8} {:<14} {:>10}", "Date", "Rows", "Source", "Size");
    println!("{}", "-".repeat(47));
    for p in &partitions {
        let rows = p
            .row_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(no meta)".into());
        let source = p.source.map(|s| s.as_str()).unwrap_or("-");
        println!(
            "{:<12} {:>8} {:<14} {:>10}",
            p.reference_date.to_string(),
            rows,
            source,
            format_size(p.size_bytes)
        );
    }
    Ok(())
}

fn run_ledger(config: &PipelineConfig, last: Option<usize>) -> Result<()> {
    let ledger = TrainingLedger::new(&config.training.ledger_path);
    let entries = ledger.read_all()?;
    if entries.is_empty() {
        println!("No training runs recorded in {}", ledger.path().display());
        return Ok(());
    }

    let skip = last.map_or(0, |n| entries.len().saturating_sub(n));
    println!(
        "{:<20} {:<14} {:<22} {:>6} {:>14} {:>14}",
        "Trained at", "Artifact", "Target", "Fold", "RMSE", "MAE"
    );
    println!("{}", "-".repeat(95));
    for e in entries.iter().skip(skip) {
        println!(
            "{:<20} {:<14} {:<22} {:>6} {:>14.4} {:>14.4}",
            e.trained_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            &e.artifact_id[..e.artifact_id.len().min(12)],
            e.target.as_str(),
            e.selected_fold + 1,
            e.validation_rmse,
            e.validation_mae
        );
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
