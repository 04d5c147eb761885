//! CLI definition and dispatch.
//!
//! Every subcommand prints exactly one JSON object on stdout, including on
//! failure (`{"success": false, "error": ...}`), so the host process can
//! always parse the result. Diagnostics go to stderr through `tracing`.

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::builtin_indicators::BuiltinIndicators;
use crate::adapters::csv_adapter::CsvCandleStore;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::condition::ConditionGroup;
use crate::domain::error::BarscanError;
use crate::domain::indicator::CATALOG;
use crate::domain::scanner::{ScanConfig, Scanner};
use crate::ports::candle_port::CandlePort;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "barscan", about = "Condition scanner over cached OHLCV bars")]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where to read candles from. `--db` and `--csv-dir` are mutually
/// exclusive; either one wins over `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// SQLite candle cache
    #[arg(long, conflicts_with = "csv_dir")]
    pub db: Option<PathBuf>,
    /// Directory of <SYMBOL>_<timeframe>.csv files
    #[arg(long)]
    pub csv_dir: Option<PathBuf>,
    /// INI config with [store] and [scan] sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a condition group for one symbol
    Evaluate {
        /// Condition group JSON, or @path to a JSON file
        #[arg(long)]
        conditions: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: String,
        #[command(flatten)]
        store: StoreArgs,
        /// Maximum number of recent bars to load
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Scan a list of symbols for matches
    Scan {
        /// Condition group JSON, or @path to a JSON file
        #[arg(long)]
        conditions: String,
        /// JSON array of symbols
        #[arg(long)]
        symbols: String,
        #[arg(long)]
        timeframe: String,
        #[command(flatten)]
        store: StoreArgs,
        /// Maximum number of recent bars to load per symbol
        #[arg(long)]
        limit: Option<usize>,
        /// Evaluate symbols on a thread pool
        #[arg(long)]
        parallel: bool,
    },
    /// Check a condition group against the built-in indicators
    Validate {
        #[arg(long)]
        conditions: String,
    },
    /// List the built-in indicators
    Indicators,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Evaluate {
            conditions,
            symbol,
            timeframe,
            store,
            limit,
        } => run_evaluate(&conditions, &symbol, &timeframe, &store, limit),
        Command::Scan {
            conditions,
            symbols,
            timeframe,
            store,
            limit,
            parallel,
        } => run_scan(&conditions, &symbols, &timeframe, &store, limit, parallel),
        Command::Validate { conditions } => {
            read_conditions(&conditions).and_then(|group| validate_response(&group))
        }
        Command::Indicators => Ok(indicators_response()),
    };

    match outcome {
        Ok(body) => {
            println!("{body}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "request failed");
            println!("{}", failure_response(&e));
            (&e).into()
        }
    }
}

/// Converts a clap parse failure into a request error.
///
/// `--help` and `--version` are not failures and yield `None`; the caller
/// lets clap print them as usual.
pub fn usage_error(err: &clap::Error) -> Option<BarscanError> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        _ => {
            // Keep the message, drop the usage block that follows it.
            let rendered = err.to_string();
            let reason = rendered
                .lines()
                .map(str::trim)
                .take_while(|line| !line.starts_with("Usage:"))
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            Some(BarscanError::Usage {
                reason: reason.trim_start_matches("error:").trim().to_string(),
            })
        }
    }
}

fn run_evaluate(
    conditions: &str,
    symbol: &str,
    timeframe: &str,
    store: &StoreArgs,
    limit: Option<usize>,
) -> Result<Value, BarscanError> {
    // Input is validated before any store is touched.
    let group = read_conditions(conditions)?;
    let config = store.config.as_deref().map(load_config).transpose()?;
    let config_port = config.as_ref().map(|c| c as &dyn ConfigPort);
    let scan_config = resolve_scan_config(config_port, limit, false)?;

    let candles = open_store(store, config_port)?;
    let indicators = BuiltinIndicators;
    let scanner = Scanner::new(candles.as_ref(), &indicators, scan_config);
    evaluate_response(&scanner, &group, symbol, timeframe)
}

fn run_scan(
    conditions: &str,
    symbols: &str,
    timeframe: &str,
    store: &StoreArgs,
    limit: Option<usize>,
    parallel: bool,
) -> Result<Value, BarscanError> {
    let group = read_conditions(conditions)?;
    let symbols = parse_symbols(symbols)?;
    let config = store.config.as_deref().map(load_config).transpose()?;
    let config_port = config.as_ref().map(|c| c as &dyn ConfigPort);
    let scan_config = resolve_scan_config(config_port, limit, parallel)?;

    let candles = open_store(store, config_port)?;
    let indicators = BuiltinIndicators;
    let scanner = Scanner::new(candles.as_ref(), &indicators, scan_config);
    Ok(scan_response(&scanner, &group, &symbols, timeframe))
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BarscanError> {
    tracing::debug!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Inline JSON, or `@path` to read the JSON from a file.
pub fn read_conditions(arg: &str) -> Result<ConditionGroup, BarscanError> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| BarscanError::ConditionParse {
                reason: format!("cannot read {path}: {e}"),
            })?;
            ConditionGroup::parse(&content)
        }
        None => ConditionGroup::parse(arg),
    }
}

pub fn parse_symbols(json: &str) -> Result<Vec<String>, BarscanError> {
    serde_json::from_str::<Vec<String>>(json).map_err(|e| BarscanError::ConditionParse {
        reason: format!("symbols must be a JSON array of strings: {e}"),
    })
}

/// `[scan]` from the config (or defaults), then CLI overrides.
pub fn resolve_scan_config(
    config: Option<&dyn ConfigPort>,
    limit: Option<usize>,
    parallel: bool,
) -> Result<ScanConfig, BarscanError> {
    let mut scan_config = match config {
        Some(c) => ScanConfig::from_config(c)?,
        None => ScanConfig::default(),
    };
    if let Some(limit) = limit {
        scan_config.bar_limit = limit;
    }
    scan_config.parallel |= parallel;
    scan_config.validate()?;
    Ok(scan_config)
}

pub fn open_store(
    args: &StoreArgs,
    config: Option<&dyn ConfigPort>,
) -> Result<Box<dyn CandlePort + Sync>, BarscanError> {
    if let Some(dir) = &args.csv_dir {
        return open_csv(dir);
    }
    if let Some(db) = &args.db {
        let pool_size = config.map_or(4, |c| c.get_int("store", "pool_size", 4));
        return open_sqlite(db, pool_size);
    }

    let config = config.ok_or_else(|| BarscanError::ConfigMissing {
        section: "store".into(),
        key: "path".into(),
    })?;
    let kind = config
        .get_string("store", "kind")
        .unwrap_or_else(|| "sqlite".to_string())
        .to_lowercase();
    let path = config
        .get_string("store", "path")
        .ok_or_else(|| BarscanError::ConfigMissing {
            section: "store".into(),
            key: "path".into(),
        })?;

    match kind.as_str() {
        "csv" => open_csv(Path::new(&path)),
        "sqlite" => open_sqlite(Path::new(&path), config.get_int("store", "pool_size", 4)),
        other => Err(BarscanError::ConfigInvalid {
            section: "store".into(),
            key: "kind".into(),
            reason: format!("unknown store kind \"{other}\" (expected sqlite or csv)"),
        }),
    }
}

fn open_csv(dir: &Path) -> Result<Box<dyn CandlePort + Sync>, BarscanError> {
    if !dir.is_dir() {
        return Err(BarscanError::Store {
            reason: format!("CSV directory not found: {}", dir.display()),
        });
    }
    Ok(Box::new(CsvCandleStore::new(dir.to_path_buf())))
}

fn open_sqlite(path: &Path, pool_size: i64) -> Result<Box<dyn CandlePort + Sync>, BarscanError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteCandleStore;

        let pool_size = u32::try_from(pool_size).map_err(|_| BarscanError::ConfigInvalid {
            section: "store".into(),
            key: "pool_size".into(),
            reason: "pool_size must be a positive integer".into(),
        })?;
        Ok(Box::new(SqliteCandleStore::open(path, pool_size)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (path, pool_size);
        Err(BarscanError::Store {
            reason: "sqlite feature is required for SQLite stores".into(),
        })
    }
}

pub fn evaluate_response(
    scanner: &Scanner<'_>,
    group: &ConditionGroup,
    symbol: &str,
    timeframe: &str,
) -> Result<Value, BarscanError> {
    let eval = scanner.evaluate_symbol(group, symbol, timeframe)?;
    Ok(json!({
        "success": true,
        "symbol": eval.symbol,
        "timeframe": timeframe,
        "candle_count": eval.candle_count,
        "price": eval.price,
        "result": eval.evaluation.result,
        "details": eval.evaluation.details,
        "logic": eval.evaluation.logic,
    }))
}

pub fn scan_response(
    scanner: &Scanner<'_>,
    group: &ConditionGroup,
    symbols: &[String],
    timeframe: &str,
) -> Value {
    let report = scanner.scan(group, symbols, timeframe);
    json!({
        "success": true,
        "match_count": report.matches.len(),
        "matches": report.matches,
        "scanned": report.scanned,
        "errors": report.errors,
        "timeframe": timeframe,
    })
}

pub fn validate_response(group: &ConditionGroup) -> Result<Value, BarscanError> {
    let warnings = group.validate()?;
    Ok(json!({
        "success": true,
        "logic": group.logic(),
        "condition_count": group.condition_count(),
        "warnings": warnings,
    }))
}

pub fn indicators_response() -> Value {
    let indicators: Vec<Value> = CATALOG
        .iter()
        .map(|info| {
            let params: serde_json::Map<String, Value> = info
                .params
                .iter()
                .map(|(name, default)| (name.to_string(), json!(default)))
                .collect();
            json!({
                "name": info.name,
                "aliases": info.aliases,
                "params": params,
                "fields": info.fields,
            })
        })
        .collect();
    json!({ "success": true, "indicators": indicators })
}

pub fn failure_response(err: &BarscanError) -> Value {
    json!({ "success": false, "error": err.to_string() })
}
