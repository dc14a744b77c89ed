//! CLI definition and dispatch.

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_dataset_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    validate_datasets_config, validate_signal_config, validate_simulator_config,
    validate_store_config, validate_trader_config,
};
use crate::domain::engine::{ArbitrageAlgorithm, SignalConfig};
use crate::domain::error::ArbotError;
use crate::domain::metrics::SimulationMetrics;
use crate::domain::reader::IncrementalReader;
use crate::domain::record::{OrderBookSnapshot, PricePoint};
use crate::domain::simulator::{SimulatorParams, run_simulation};
use crate::domain::store::{StoreConfig, TimeSeriesStore};
use crate::domain::trader::TraderConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::segment_port::SegmentStorePort;

#[derive(Parser, Debug)]
#[command(name = "arbot", about = "Cross-exchange arbitrage trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    /// Reference-market trade ticks
    Trades,
    /// Target-market order-book snapshots
    Orderbook,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay recorded datasets through the trading decision path
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Start bound, unix seconds (overrides config)
        #[arg(long)]
        after: Option<i64>,
        /// End bound, unix seconds (overrides config)
        #[arg(long)]
        before: Option<i64>,
        /// Step duration in seconds (overrides config)
        #[arg(long)]
        frequency: Option<i64>,
    },
    /// Import a recorded CSV file into a dataset
    ImportCsv {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        dataset: String,
        #[arg(long, value_enum)]
        schema: DatasetKind,
        file: PathBuf,
    },
    /// Show datasets and their segment ranges
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Simulate {
            config,
            after,
            before,
            frequency,
        } => run_simulate(&config, after, before, frequency),
        Command::ImportCsv {
            config,
            dataset,
            schema,
            file,
        } => run_import_csv(&config, &dataset, schema, &file),
        Command::Info { config } => run_info(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ArbotError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn validate_all(config: &dyn ConfigPort) -> Result<(), ArbotError> {
    validate_signal_config(config)?;
    validate_store_config(config)?;
    validate_trader_config(config)?;
    validate_simulator_config(config)?;
    validate_datasets_config(config)?;
    Ok(())
}

fn open_segment_store(config: &dyn ConfigPort) -> Result<Box<dyn SegmentStorePort>, ArbotError> {
    #[cfg(feature = "postgres")]
    {
        use crate::adapters::postgres_segment_store::PostgresSegmentStore;

        if config.get_string("postgres", "connection_string").is_some()
            || config.get_string("database", "conninfo").is_some()
        {
            let store = PostgresSegmentStore::from_config(config)?;
            store.initialize_schema()?;
            return Ok(Box::new(store));
        }
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_segment_store::SqliteSegmentStore;

        let store = SqliteSegmentStore::from_config(config)?;
        store.initialize_schema()?;
        Ok(Box::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(ArbotError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })
    }
}

fn dataset_names(config: &dyn ConfigPort) -> (String, String) {
    // presence is checked by validate_datasets_config
    let source = config.get_string("datasets", "source").unwrap_or_default();
    let orderbook = config
        .get_string("datasets", "orderbook")
        .unwrap_or_default();
    (source, orderbook)
}

fn run_simulate(
    config_path: &PathBuf,
    after: Option<i64>,
    before: Option<i64>,
    frequency: Option<i64>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let signal_config = match SignalConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let trader_config = TraderConfig::from_config(&adapter);

    let mut params = SimulatorParams::from_config(&adapter);
    if after.is_some() {
        params.after = after;
    }
    if before.is_some() {
        params.before = before;
    }
    if let Some(frequency) = frequency {
        params.frequency_secs = frequency;
    }

    let store = match open_segment_store(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let (source_dataset, book_dataset) = dataset_names(&adapter);
    eprintln!(
        "Replaying {} against {} at {}s steps",
        source_dataset, book_dataset, params.frequency_secs
    );

    let now = Utc::now().timestamp();
    let start = params.after.unwrap_or(0);

    let mut source_reader: IncrementalReader<PricePoint> =
        IncrementalReader::new(&source_dataset);
    let source = match source_reader.read_latest(store.as_ref(), start, params.before, now) {
        Ok(frame) => frame.clone(),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let mut book_reader: IncrementalReader<OrderBookSnapshot> =
        IncrementalReader::new(&book_dataset);
    let book = match book_reader.read_latest(store.as_ref(), start, params.before, now) {
        Ok(frame) => frame.clone(),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if source.is_empty() && book.is_empty() {
        let err = ArbotError::NoData {
            dataset: format!("{source_dataset}, {book_dataset}"),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }
    eprintln!(
        "  Loaded {} source rows, {} book rows",
        source.len(),
        book.len()
    );

    let algorithm = ArbitrageAlgorithm::new(signal_config);
    let initial_equity = trader_config.initial_equity;
    let result = run_simulation(&algorithm, &trader_config, source, book, params);
    let metrics = SimulationMetrics::compute(&result, initial_equity);

    eprintln!("\n=== Simulation Results ===");
    eprintln!("Cycles:           {}", result.cycles);
    eprintln!("Final Equity:     {:.2}", result.trader.equity);
    eprintln!(
        "Total Profit:     {:+.2} ({:+.2}%)",
        metrics.total_profit,
        metrics.total_return * 100.0
    );
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);

    if !result.trader.history.is_empty() {
        eprintln!("\n=== Closed Trades ===");
        for trade in &result.trader.history {
            let sign = if trade.profit >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} -> {}  open {:.2}  close {:.2}  {}{:.2}",
                format_time(trade.open_time),
                format_time(trade.close_time),
                trade.open_price,
                trade.close_price,
                sign,
                trade.profit,
            );
        }
    }
    if let Some(open) = result.trader.current_trade {
        eprintln!(
            "\nStill long: {:.6} opened at {:.2} ({})",
            open.volume,
            open.open_price,
            format_time(open.open_time)
        );
    }

    ExitCode::SUCCESS
}

fn run_import_csv(
    config_path: &PathBuf,
    dataset: &str,
    schema: DatasetKind,
    file: &PathBuf,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_store_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let store = match open_segment_store(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let store_config = StoreConfig::from_config(&adapter);
    let now = Utc::now();

    eprintln!("Importing {} into {}", file.display(), dataset);
    let imported = match schema {
        DatasetKind::Trades => {
            let records = match csv_dataset_adapter::read_price_points(file) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            let mut ts_store: TimeSeriesStore<PricePoint> =
                match TimeSeriesStore::open(store.as_ref(), dataset, store_config, now) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return (&e).into();
                    }
                };
            ts_store.write(&records, now);
            ts_store.flush(now);
            records.len()
        }
        DatasetKind::Orderbook => {
            let records = match csv_dataset_adapter::read_book_snapshots(file) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            let mut ts_store: TimeSeriesStore<OrderBookSnapshot> =
                match TimeSeriesStore::open(store.as_ref(), dataset, store_config, now) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return (&e).into();
                    }
                };
            ts_store.write(&records, now);
            ts_store.flush(now);
            records.len()
        }
    };

    eprintln!("Imported {} rows", imported);
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let store = match open_segment_store(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let datasets = match store.list_datasets() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if datasets.is_empty() {
        eprintln!("No datasets found");
        return ExitCode::SUCCESS;
    }

    for dataset in &datasets {
        match store.list_segments(dataset) {
            Ok(segments) if !segments.is_empty() => {
                let first = segments.first().unwrap().created_at;
                let last = segments.last().unwrap().created_at;
                println!(
                    "{}: {} segments, {} to {}",
                    dataset,
                    segments.len(),
                    first.format("%Y-%m-%d %H:%M:%S"),
                    last.format("%Y-%m-%d %H:%M:%S"),
                );
            }
            Ok(_) => println!("{}: no segments", dataset),
            Err(e) => eprintln!("error querying {}: {}", dataset, e),
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let signal = match SignalConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nSignal parameters:");
    eprintln!("  step:            {}s", signal.step_secs);
    eprintln!("  rolling window:  {}s", signal.rolling_window_secs);
    eprintln!("  lag:             {} bars", signal.lag_bars);
    eprintln!("  buy threshold:   {}", signal.buy_threshold);
    eprintln!("  sell threshold:  {}", signal.sell_threshold);
    eprintln!("  min samples:     {}", signal.min_samples);
    eprintln!("  cutoff:          {}s", signal.cutoff_secs);

    let (source, orderbook) = dataset_names(&adapter);
    eprintln!("\nDatasets:");
    eprintln!("  source:    {}", source);
    eprintln!("  orderbook: {}", orderbook);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn format_time(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::parse_from([
            "arbot", "simulate", "--config", "arbot.ini", "--after", "1000", "--frequency", "60",
        ]);
        match cli.command {
            Command::Simulate {
                after, frequency, ..
            } => {
                assert_eq!(after, Some(1000));
                assert_eq!(frequency, Some(60));
            }
            other => panic!("expected Simulate, got: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_import_csv() {
        let cli = Cli::parse_from([
            "arbot",
            "import-csv",
            "--config",
            "arbot.ini",
            "--dataset",
            "bitfinex_btcusd",
            "--schema",
            "trades",
            "ticks.csv",
        ]);
        match cli.command {
            Command::ImportCsv {
                dataset, schema, ..
            } => {
                assert_eq!(dataset, "bitfinex_btcusd");
                assert_eq!(schema, DatasetKind::Trades);
            }
            other => panic!("expected ImportCsv, got: {other:?}"),
        }
    }

    #[test]
    fn format_time_renders_utc() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
    }
}
