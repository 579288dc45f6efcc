//! TrendLab CLI — run a weekly backtest and write reports.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use trendlab_runner::config::{
    load_universe, validate_date_range, validate_plan_mode, ExitModeParam, PlanMode, RiskParams, RunConfig,
    SizingMode, StrategyParams, TieBreakerParam,
};
use trendlab_runner::provider::CsvDirectoryProvider;
use trendlab_runner::reporting::ArtifactManager;
use trendlab_runner::{run_range, run_single};

#[derive(Parser)]
#[command(name = "trendlab", about = "Weekly-cadence equity backtest simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a backtest over a date range.
    Backtest(BacktestArgs),
}

#[derive(Parser)]
struct BacktestArgs {
    #[arg(long)]
    from: chrono::NaiveDate,

    #[arg(long)]
    to: chrono::NaiveDate,

    #[arg(long, default_value_t = 10_000_000)]
    initial_cash: i64,

    #[arg(long, default_value_t = 1_000_000)]
    order_size: i64,

    #[arg(long, default_value_t = 4)]
    trades_per_week: usize,

    /// Newline-separated universe file; falls back to a builtin default when absent.
    #[arg(long)]
    universe: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModeArg::Generate)]
    mode: ModeArg,

    /// Required when `--mode plan`: a JSON-serialized `WeeklyPlan` reused every week.
    #[arg(long)]
    plan_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = TieBreakerArg::Worst)]
    tie_breaker: TieBreakerArg,

    #[arg(long, value_enum, default_value_t = ExitModeArg::TpslOnly)]
    exit_mode: ExitModeArg,

    /// `risk-based` sizes by the recommendation's target allocation;
    /// `fixed-size` buys `--order-size` VND worth of shares per entry.
    #[arg(long, value_enum, default_value_t = SizingModeArg::RiskBased)]
    sizing_mode: SizingModeArg,

    /// Directory holding `<SYMBOL>.csv` daily bar files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory to write summary.json, equity_curve.csv, trades.csv into.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Run both worst-case and best-case tie-break and emit a diff.
    #[arg(long, default_value_t = false)]
    run_range: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Generate,
    Plan,
}

#[derive(Clone, Copy, ValueEnum)]
enum TieBreakerArg {
    Worst,
    Best,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExitModeArg {
    TpslOnly,
    ThreeAction,
    FourAction,
}

#[derive(Clone, Copy, ValueEnum)]
enum SizingModeArg {
    RiskBased,
    FixedSize,
}

/// Exit codes: 0 success, 2 input/config error, 3 provider error,
/// 4 no data for the entire universe, 1 any other failure.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Backtest(args) => run_backtest_command(args),
    }
}

fn run_backtest_command(args: BacktestArgs) -> ExitCode {
    if let Err(e) = validate_date_range(args.from, args.to) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    let universe = match load_universe(args.universe.as_deref()) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let plan_mode = match args.mode {
        ModeArg::Generate => PlanMode::Generate,
        ModeArg::Plan => PlanMode::Plan,
    };
    if let Err(e) = validate_plan_mode(plan_mode, args.plan_file.as_deref()) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    let static_plan = match args.plan_file.as_ref().map(load_static_plan).transpose() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: failed to load --plan-file: {e}");
            return ExitCode::from(2);
        }
    };

    let config = RunConfig {
        from_date: args.from,
        to_date: args.to,
        initial_cash: args.initial_cash,
        order_size: args.order_size,
        trades_per_week: args.trades_per_week,
        universe,
        strategy: StrategyParams::default(),
        risk: RiskParams::default(),
        tie_breaker: match args.tie_breaker {
            TieBreakerArg::Worst => TieBreakerParam::Worst,
            TieBreakerArg::Best => TieBreakerParam::Best,
        },
        exit_mode: match args.exit_mode {
            ExitModeArg::TpslOnly => ExitModeParam::TpslOnly,
            ExitModeArg::ThreeAction => ExitModeParam::ThreeAction,
            ExitModeArg::FourAction => ExitModeParam::FourAction,
        },
        plan_mode,
        sizing_mode: match args.sizing_mode {
            SizingModeArg::RiskBased => SizingMode::RiskBased,
            SizingModeArg::FixedSize => SizingMode::FixedSize,
        },
    };

    tracing::info!(run_id = %config.run_id(), from = %config.from_date, to = %config.to_date, "starting backtest");

    let provider = CsvDirectoryProvider::new(args.data_dir.clone());
    let manager = match ArtifactManager::new(&args.out_dir) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: could not prepare output directory: {e}");
            return ExitCode::from(2);
        }
    };

    let outcome = if args.run_range {
        run_range(&config, &provider, static_plan.as_ref(), &manager)
            .map(|o| println!("range summary written to {}", o.worst_paths.summary_json.parent().unwrap().display()))
    } else {
        run_single(&config, &provider, static_plan.as_ref(), &manager).map(|o| {
            println!(
                "final value: {}  CAGR: {:.2}%  max drawdown: {:.2}%  trades: {}",
                o.summary.final_value,
                o.summary.cagr * 100.0,
                o.summary.max_drawdown * 100.0,
                o.summary.num_trades,
            )
        })
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(trendlab_runner::RunnerError::Driver(trendlab_runner::DriverError::NoDataForUniverse)) => {
            eprintln!("error: no data available for any symbol in the universe");
            ExitCode::from(4)
        }
        Err(trendlab_runner::RunnerError::Driver(trendlab_runner::DriverError::Provider(e))) => {
            eprintln!("provider error: {e}");
            ExitCode::from(3)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn load_static_plan(path: &PathBuf) -> anyhow::Result<trendlab_core::signal::WeeklyPlan> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
