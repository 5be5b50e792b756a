mod shmoo;
mod table;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tpsl_core::{paired_cells, CandleStore, ExitPolicy, RunConfig, SweepAxis};
use tpsl_engine::{best_row, GridReport, GridSearch, ReportRow, Variant};

const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Parser, Debug)]
#[command(name = "tpsl-sweep", about = "Sweep take-profit / stop-loss levels over candle data")]
struct Cli {
    /// Path to CSV candle data file
    #[arg(long)]
    candles: PathBuf,

    /// Path to TOML config file(s), comma-separated for merge
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Bars each trade may stay open
    #[arg(long)]
    window: Option<usize>,

    /// Bars between consecutive entries
    #[arg(long)]
    stride: Option<usize>,

    /// Capital committed per trade
    #[arg(long)]
    cpt: Option<f64>,

    /// Initial capital of each run
    #[arg(long)]
    capital: Option<f64>,

    /// Fee per closed trade, in percent of the trade capital
    #[arg(long)]
    fee: Option<f64>,

    /// What to do with trades still open at the end of their window
    #[arg(long, value_name = "close|leave")]
    exit_mode: Option<ExitPolicy>,

    /// TP values in percent: numbers and/or from:step:to ranges
    #[arg(long, num_args = 1..)]
    tp: Vec<String>,

    /// SL values in percent: numbers and/or from:step:to ranges
    #[arg(long, num_args = 1..)]
    sl: Vec<String>,

    #[arg(long, requires = "tp_max")]
    tp_min: Option<f64>,
    #[arg(long, requires = "tp_min")]
    tp_max: Option<f64>,
    #[arg(long, requires = "sl_max")]
    sl_min: Option<f64>,
    #[arg(long, requires = "sl_min")]
    sl_max: Option<f64>,

    /// Points per axis for --tp-min/--tp-max and --sl-min/--sl-max
    #[arg(long, default_value = "10")]
    points: usize,

    /// Pair tp[k] with sl[k] instead of sweeping the full grid
    #[arg(long)]
    paired: bool,

    /// Print only the hedge rows and plot
    #[arg(long)]
    only_hedge: bool,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Output file path (stdout if not specified)
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log every simulated trade
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    meta: OutputMeta,
    #[serde(flatten)]
    payload: Payload,
}

#[derive(Debug, Serialize)]
struct OutputMeta {
    candle_file: String,
    total_candles: usize,
    window_size: usize,
    stride: usize,
    entries_per_run: usize,
    capital_per_trade: f64,
    initial_capital: f64,
    fee_rate: f64,
    exit_policy: ExitPolicy,
    cells: usize,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Payload {
    Grid(GridReport),
    Paired { rows: Vec<ReportRow> },
}

impl Payload {
    fn rows(&self) -> &[ReportRow] {
        match self {
            Payload::Grid(report) => &report.rows,
            Payload::Paired { rows } => rows,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    let start = Instant::now();

    let mut config = load_config(&cli.config, DEFAULT_CONFIG)?;
    apply_overrides(&cli, &mut config);

    let tp_axis = axis(&cli.tp, cli.tp_min, cli.tp_max, cli.points, &config.sweep.tp)
        .context("invalid TP sweep")?;
    let sl_axis = axis(&cli.sl, cli.sl_min, cli.sl_max, cli.points, &config.sweep.sl)
        .context("invalid SL sweep")?;
    let tp_list = tp_axis.fractions().context("invalid TP sweep")?;
    let sl_list = sl_axis.fractions().context("invalid SL sweep")?;

    eprintln!("Loading candles from {:?}...", cli.candles);
    let load_start = Instant::now();
    let candles = CandleStore::from_csv(&cli.candles)
        .with_context(|| format!("loading candles from {}", cli.candles.display()))?;
    eprintln!(
        "Loaded {} candles in {:.1}ms",
        candles.len(),
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    let grid = GridSearch::new(config.simulation.clone())?.with_threads(config.sweep.threads);
    let sim = grid.simulator().config();
    let entries = grid.simulator().entry_count(candles.len());

    let (payload, cells) = if config.sweep.paired {
        let cells = paired_cells(&tp_list, &sl_list)?;
        eprintln!("Running {} paired TP/SL cells...", cells.len());
        let rows = grid.run_cells(&candles, &cells)?;
        (Payload::Paired { rows }, cells.len())
    } else {
        let cells = tp_list.len() * sl_list.len();
        eprintln!(
            "Running {}x{} TP/SL grid ({} cells, long + short)...",
            tp_list.len(),
            sl_list.len(),
            cells
        );
        (Payload::Grid(grid.search(&candles, &tp_list, &sl_list)?), cells)
    };

    let report = OutputReport {
        meta: OutputMeta {
            candle_file: cli.candles.display().to_string(),
            total_candles: candles.len(),
            window_size: sim.window_size,
            stride: sim.stride,
            entries_per_run: entries,
            capital_per_trade: sim.capital_per_trade,
            initial_capital: sim.initial_capital,
            fee_rate: sim.fee_rate,
            exit_policy: sim.exit_policy,
            cells,
            elapsed_ms: start.elapsed().as_millis(),
        },
        payload,
    };

    if cli.output_file.is_some() {
        colored::control::set_override(false);
    }
    let rendered = match cli.output {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&report).context("serializing report")?
        }
        OutputFormat::Table => render_tables(&report, cli.only_hedge),
    };

    if let Some(output_path) = &cli.output_file {
        std::fs::write(output_path, &rendered)
            .with_context(|| format!("writing {}", output_path.display()))?;
        eprintln!("Results written to {:?}", output_path);
    } else {
        println!("{}", rendered);
    }

    print_summary(&report);
    eprintln!("\nTotal elapsed: {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the given config files. `default_path` may be absent.
fn load_config(arg: &str, default_path: &str) -> Result<RunConfig> {
    if arg == default_path && !Path::new(default_path).exists() {
        tracing::debug!(path = default_path, "no config file, using defaults");
        return Ok(RunConfig::default());
    }
    let paths: Vec<PathBuf> = arg.split(',').map(str::trim).map(PathBuf::from).collect();
    let refs: Vec<&Path> = paths.iter().map(|p| p.as_path()).collect();
    RunConfig::from_toml_files(&refs).context("loading config")
}

fn apply_overrides(cli: &Cli, config: &mut RunConfig) {
    let sim = &mut config.simulation;
    if let Some(v) = cli.window {
        sim.window_size = v;
    }
    if let Some(v) = cli.stride {
        sim.stride = v;
    }
    if let Some(v) = cli.cpt {
        sim.capital_per_trade = v;
    }
    if let Some(v) = cli.capital {
        sim.initial_capital = v;
    }
    if let Some(v) = cli.fee {
        sim.fee_rate = v / 100.0;
    }
    if let Some(v) = cli.exit_mode {
        sim.exit_policy = v;
    }
    sim.verbose |= cli.verbose;

    let sweep = &mut config.sweep;
    sweep.paired |= cli.paired;
    if cli.threads.is_some() {
        sweep.threads = cli.threads;
    }
}

/// CLI tokens win over a min/max range, which wins over the config file.
fn axis(
    tokens: &[String],
    min: Option<f64>,
    max: Option<f64>,
    points: usize,
    fallback: &SweepAxis,
) -> Result<SweepAxis> {
    if !tokens.is_empty() {
        return Ok(SweepAxis::from_tokens(tokens)?);
    }
    match (min, max) {
        (Some(min), Some(max)) => {
            if min > max {
                bail!("range min {} is above max {}", min, max);
            }
            Ok(SweepAxis::Linear { min, max, points })
        }
        _ => Ok(fallback.clone()),
    }
}

fn render_tables(report: &OutputReport, only_hedge: bool) -> String {
    let mut out = String::new();
    let keep = |r: &&ReportRow| !only_hedge || r.direction == Variant::Hedge;
    let rows: Vec<ReportRow> = report.payload.rows().iter().filter(keep).cloned().collect();
    out.push_str(&table::render(&rows));

    if let Payload::Grid(grid) = &report.payload {
        let variants: &[Variant] = if only_hedge { &[Variant::Hedge] } else { &Variant::ALL };
        for &variant in variants {
            out.push_str(&shmoo::render(
                &format!("{} ROI %", variant),
                &grid.tp_list,
                &grid.sl_list,
                grid.matrix.get(variant),
            ));
        }
    }

    if report.meta.exit_policy == ExitPolicy::Leave {
        out.push_str(
            "\nNote: exit policy is 'leave'; trades still open at the end of their \
             window are excluded, so ROI covers closed trades only.\n",
        );
    }
    out
}

fn print_summary(report: &OutputReport) {
    eprintln!("\n{}", "=".repeat(80));
    eprintln!("TP/SL Sweep Summary");
    eprintln!("{}", "=".repeat(80));
    eprintln!(
        "Candles: {} | Window: {} | Stride: {} | Cells: {} | Elapsed: {}ms",
        report.meta.total_candles,
        report.meta.window_size,
        report.meta.stride,
        report.meta.cells,
        report.meta.elapsed_ms
    );
    eprintln!(
        "Simulated {} entries per leg (every {} bars, {}-bar window)",
        report.meta.entries_per_run, report.meta.stride, report.meta.window_size
    );
    eprintln!("{}", "-".repeat(80));

    let rows = report.payload.rows();
    for variant in Variant::ALL {
        match best_row(rows, variant) {
            Some(r) => eprintln!(
                "  best {:<5}: TP {:>6.2}% SL {:>6.2}% -> ROI {:>8.2}% (success {:.1}%)",
                variant.to_string(),
                r.tp * 100.0,
                r.sl * 100.0,
                r.roi_pct,
                r.success_rate
            ),
            None => eprintln!("  best {:<5}: n/a (capital exhausted everywhere)", variant.to_string()),
        }
    }
    eprintln!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["tpsl-sweep", "--candles", "candles.csv"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn approx(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_overrides_convert_fee_percent() {
        let cli = cli(&["--fee", "0.1", "--window", "15", "--exit-mode", "leave", "--paired"]);
        let mut config = RunConfig::default();
        apply_overrides(&cli, &mut config);
        assert!((config.simulation.fee_rate - 0.001).abs() < 1e-12);
        assert_eq!(config.simulation.window_size, 15);
        assert_eq!(config.simulation.exit_policy, ExitPolicy::Leave);
        assert_eq!(config.simulation.stride, 1);
        assert!(config.sweep.paired);
    }

    #[test]
    fn test_overrides_leave_config_values_alone() {
        let mut config = RunConfig::default();
        config.simulation.fee_rate = 0.002;
        config.sweep.threads = Some(3);
        apply_overrides(&cli(&[]), &mut config);
        assert!((config.simulation.fee_rate - 0.002).abs() < 1e-12);
        assert_eq!(config.sweep.threads, Some(3));
    }

    #[test]
    fn test_axis_precedence() {
        let fallback = SweepAxis::Values(vec![9.0]);
        let tokens = vec!["0.5".to_string(), "1:1:2".to_string()];

        let from_tokens = axis(&tokens, Some(1.0), Some(2.0), 3, &fallback).unwrap();
        assert!(approx(&from_tokens.percents().unwrap(), &[0.5, 1.0, 2.0]));

        let from_range = axis(&[], Some(1.0), Some(2.0), 3, &fallback).unwrap();
        assert!(approx(&from_range.percents().unwrap(), &[1.0, 1.5, 2.0]));

        let from_config = axis(&[], None, None, 3, &fallback).unwrap();
        assert_eq!(from_config, fallback);

        assert!(axis(&[], Some(2.0), Some(1.0), 3, &fallback).is_err());
    }

    #[test]
    fn test_tp_tokens_from_command_line() {
        let cli = cli(&["--tp", "0.5", "1:0.5:2", "--sl", "1"]);
        let tp = axis(&cli.tp, None, None, cli.points, &SweepAxis::default()).unwrap();
        assert!(approx(&tp.fractions().unwrap(), &[0.005, 0.01, 0.015, 0.02]));
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let default_path = "no/such/dir/default.toml";
        let config = load_config(default_path, default_path).unwrap();
        assert_eq!(config.simulation.window_size, 60);
        assert!(load_config("no/such/dir/other.toml", default_path).is_err());
    }

    #[test]
    fn test_config_files_merge_in_order() {
        let dir = std::env::temp_dir().join(format!("tpsl-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("base.toml");
        let overlay = dir.join("overlay.toml");
        std::fs::write(&base, "[simulation]\nwindow_size = 30\nstride = 2\n").unwrap();
        std::fs::write(&overlay, "[simulation]\nstride = 5\n").unwrap();

        let arg = format!("{}, {}", base.display(), overlay.display());
        let config = load_config(&arg, DEFAULT_CONFIG).unwrap();
        assert_eq!(config.simulation.window_size, 30);
        assert_eq!(config.simulation.stride, 5);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
