//! Affordability backtest CLI.
//!
//! Usage:
//! ```bash
//! # Run the configured walk-forward strategies
//! affordability-backtest run --config config/default.toml
//!
//! # Build the affordability feature table for one region
//! affordability-backtest features --raw-dir data/raw --region austin --output outputs/features.csv
//!
//! # Information coefficient of a signal against forward returns
//! affordability-backtest ic --input outputs/path_a/master.csv --signal dti --output outputs/ic/rolling_ic.csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use affordability_backtest::config::{forward_column, ExperimentConfig};
use affordability_backtest::data::{LoaderCapabilities, Panel, PanelLoader, RawDataLoader, RawField};
use affordability_backtest::features::{
    attach_affordability_features, prepare_panel, AffordabilityParams, PreparationSpec,
};
use affordability_backtest::metrics::{
    ic_by_regime, information_coefficient, rolling_ic, rolling_ic_in_regime,
};
use affordability_backtest::pipeline::{load_panel, run_experiment};
use affordability_backtest::report::{write_panel, ReportWriter};

#[derive(Parser)]
#[command(name = "affordability-backtest")]
#[command(about = "Walk-forward threshold filters on housing affordability signals")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured strategy and write its artifacts
    Run {
        /// Path to configuration file (built-in strategies when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the master panel path
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Override the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build affordability features from raw regional inputs
    Features {
        /// Directory holding the raw CSV inputs
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,

        /// Region slug to keep
        #[arg(short, long)]
        region: String,

        /// Output CSV path
        #[arg(short, long, default_value = "outputs/features.csv")]
        output: PathBuf,

        /// Raw fields to synthesize instead of reading (comma separated)
        #[arg(long, value_delimiter = ',')]
        synthesize: Vec<RawField>,

        /// Rolling window for the DTI shock (full sample when omitted)
        #[arg(long)]
        shock_window: Option<usize>,
    },

    /// Information coefficient of a signal against forward returns
    Ic {
        /// Master panel CSV
        #[arg(short, long, default_value = "outputs/path_a/master.csv")]
        input: PathBuf,

        /// Signal column
        #[arg(short, long, default_value = "dti")]
        signal: String,

        /// Forward-return horizon in periods
        #[arg(long, default_value = "4")]
        horizon: usize,

        /// Rolling IC window
        #[arg(short, long, default_value = "20")]
        window: usize,

        /// Price column used for forward returns
        #[arg(long, default_value = "real_price_index")]
        price_column: String,

        /// Date column
        #[arg(long, default_value = "date")]
        date_column: String,

        /// Regime column
        #[arg(long, default_value = "regime")]
        regime_column: String,

        /// Regime whose rows get their own rolling IC series
        #[arg(long, default_value = "0")]
        rolling_regime: i64,

        /// Rolling IC series CSV
        #[arg(short, long, default_value = "outputs/ic/rolling_ic.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("affordability_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input,
            output,
        } => cmd_run(config, input, output),
        Commands::Features {
            raw_dir,
            region,
            output,
            synthesize,
            shock_window,
        } => cmd_features(raw_dir, &region, output, &synthesize, shock_window),
        Commands::Ic {
            input,
            signal,
            horizon,
            window,
            price_column,
            date_column,
            regime_column,
            rolling_regime,
            output,
        } => cmd_ic(&IcArgs {
            input,
            signal,
            horizon,
            window,
            price_column,
            date_column,
            regime_column,
            rolling_regime,
            output,
        }),
    }
}

fn cmd_run(config: Option<PathBuf>, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let mut config = match config {
        Some(path) => ExperimentConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    if let Some(input) = input {
        config.data.input = input;
    }
    if let Some(output) = output {
        config.data.output_dir = output;
    }

    let panel = load_panel(&config.data)
        .with_context(|| format!("Failed to load panel {}", config.data.input.display()))?;

    // Every strategy must succeed before any artifact is written.
    let runs = run_experiment(&config, &panel).context("Walk-forward run failed")?;

    let writer = ReportWriter::new(&config.data.output_dir);
    for run in &runs {
        if run.frame.is_empty() {
            warn!("{} has no decisions; writing empty artifacts", run.frame.strategy);
        }
        writer
            .write_run(&run.frame, &run.report)
            .with_context(|| format!("Failed to write artifacts for {}", run.frame.strategy))?;
        println!("{}\n", run.report.summary());
    }

    info!("Artifacts in {}", writer.output_dir().display());
    Ok(())
}

fn cmd_features(
    raw_dir: PathBuf,
    region: &str,
    output: PathBuf,
    synthesize: &[RawField],
    shock_window: Option<usize>,
) -> Result<()> {
    let capabilities = synthesize
        .iter()
        .fold(LoaderCapabilities::default(), |caps, field| caps.synthesize(*field));

    let raw = RawDataLoader::new(&raw_dir, capabilities)
        .load_region(region)
        .with_context(|| format!("Failed to load raw inputs from {}", raw_dir.display()))?;

    let params = AffordabilityParams {
        shock_window,
        ..AffordabilityParams::default()
    };
    let features = attach_affordability_features(&raw, &params)?;

    write_panel(&features, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {} feature rows to {}", features.len(), output.display());
    Ok(())
}

struct IcArgs {
    input: PathBuf,
    signal: String,
    horizon: usize,
    window: usize,
    price_column: String,
    date_column: String,
    regime_column: String,
    rolling_regime: i64,
    output: PathBuf,
}

fn cmd_ic(args: &IcArgs) -> Result<()> {
    let signal = args.signal.as_str();
    let panel = PanelLoader::new(&args.date_column)
        .load_csv(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let spec = PreparationSpec {
        price_column: args.price_column.clone(),
        regime_column: args.regime_column.clone(),
        forward_column: forward_column(args.horizon),
        horizon: args.horizon,
        signal_columns: vec![signal.to_string()],
        trends: vec![],
        extra_required: vec![],
    };
    let prepared = prepare_panel(&panel, &spec)?;

    let x = prepared.column(signal)?;
    let y = prepared.column(&spec.forward_column)?;
    let regimes = prepared.column(&args.regime_column)?;

    let overall = information_coefficient(x, y);
    println!(
        "IC({}, {}): {:.4} (n={}, t={:.2}, p={:.4})",
        signal, spec.forward_column, overall.ic, overall.n, overall.t_stat, overall.p_value
    );

    for (regime, result) in ic_by_regime(x, y, regimes) {
        println!(
            "IC({}, {} | regime={}): {:.4} (n={}, p={:.4})",
            signal, spec.forward_column, regime, result.ic, result.n, result.p_value
        );
    }

    let window = args.window;
    let rolling = rolling_ic(x, y, window);
    match rolling.iter().rposition(|v| v.is_some()) {
        Some(idx) => println!(
            "Rolling {}-period IC at {}: {:.4}",
            window,
            prepared.dates()[idx],
            rolling[idx].unwrap_or(f64::NAN)
        ),
        None => println!("Rolling {}-period IC: not enough data", window),
    }

    let in_regime = rolling_ic_in_regime(x, y, regimes, args.rolling_regime, window);
    let series = Panel::new(prepared.dates().to_vec())
        .with_column("rolling_ic_all", rolling)?
        .with_column(&format!("rolling_ic_reg{}", args.rolling_regime), in_regime)?;
    write_panel(&series, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!("Wrote rolling IC series to {}", args.output.display());

    Ok(())
}
