use anyhow::{Context as _, Result};
use churnflow::config::{self, WorkflowConfig};
use churnflow::data::profiling::{ColumnStats, ColumnSummary};
use churnflow::data::{Dataset, categorical_columns};
use churnflow::model::{ModelStore, Prediction, TrainingReport};
use churnflow::workflow::Session;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "churnflow",
    version,
    about = "Guided customer-churn modelling: load, visualize, encode, split, train, predict"
)]
pub struct Cli {
    /// Path to a JSON config file. Defaults to the per-user config location.
    #[arg(long, global = true, env = "CHURNFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a CSV file and print a summary of every column
    Summarize {
        /// CSV file with a header row. Defaults to the configured dataset.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Load, encode, split and train, then save the model
    Run(RunArgs),
    /// Score one customer with the saved model
    Predict {
        /// Feature values as NAME=VALUE pairs
        #[arg(value_name = "NAME=VALUE", value_parser = parse_feature_value)]
        values: Vec<(String, f64)>,

        /// Directory holding the saved model
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Contributors to list on each side
        #[arg(long)]
        top_n: Option<usize>,

        /// Use 0 for features not given on the command line
        #[arg(long)]
        fill_missing: bool,
    },
    /// List the features the saved model expects
    Features {
        /// Directory holding the saved model
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// CSV file with a header row. Defaults to the configured dataset.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Column to predict
    #[arg(short, long)]
    pub target: Option<String>,

    /// Columns to one-hot encode. Defaults to every categorical column except the target.
    #[arg(short, long, value_delimiter = ',')]
    pub encode: Vec<String>,

    /// Keep the indicator for the first value of each encoded column
    #[arg(long)]
    pub keep_first: bool,

    /// Share of rows used for training, strictly between 0 and 1
    #[arg(long)]
    pub train_fraction: Option<f64>,

    /// Seed for the train/test shuffle
    #[arg(long)]
    pub seed: Option<u64>,

    /// Inverse regularization strength
    #[arg(short = 'C', long = "regularization")]
    pub regularization: Option<f64>,

    /// Iteration cap for the optimizer
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Directory the trained model is saved to
    #[arg(long)]
    pub model_dir: Option<PathBuf>,
}

pub fn load_effective_config(path: Option<PathBuf>) -> Result<WorkflowConfig> {
    match path.or_else(config::get_config_path) {
        Some(path) => config::load_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(WorkflowConfig::default()),
    }
}

pub fn run_command(command: Commands, config: WorkflowConfig) -> Result<()> {
    match command {
        Commands::Summarize { file } => handle_summarize(file, &config),
        Commands::Run(args) => handle_run(args, config),
        Commands::Predict {
            values,
            model_dir,
            top_n,
            fill_missing,
        } => handle_predict(values, model_dir, top_n, fill_missing, &config),
        Commands::Features { model_dir } => handle_features(model_dir, &config),
    }
}

fn handle_summarize(file: Option<PathBuf>, config: &WorkflowConfig) -> Result<()> {
    let file = file.unwrap_or_else(|| config.data_path.clone());
    let mut session = Session::new();
    let data = session.load(&file)?;
    print_shape(data);
    let schema = data.schema_info();

    for (summary, info) in session.summarize()?.iter().zip(&schema) {
        print_summary(summary, &info.dtype);
    }
    Ok(())
}

fn handle_run(args: RunArgs, mut config: WorkflowConfig) -> Result<()> {
    if let Some(target) = args.target {
        config.target = target;
    }
    if let Some(fraction) = args.train_fraction {
        config.train_fraction = fraction;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(c) = args.regularization {
        config.regularization = c;
    }
    if let Some(iterations) = args.max_iterations {
        config.max_iterations = iterations;
    }
    if let Some(dir) = args.model_dir {
        config.model_dir = dir;
    }
    let drop_first = config.drop_first && !args.keep_first;
    let file = args.file.unwrap_or_else(|| config.data_path.clone());

    let mut session = Session::from_config(&config);
    let data = session.load(&file)?;
    print_shape(data);

    let columns = if args.encode.is_empty() {
        categorical_columns(data)
            .into_iter()
            .filter(|c| *c != config.target)
            .collect()
    } else {
        args.encode
    };

    if columns.is_empty() {
        println!("No categorical columns to encode.");
    } else {
        let report = session.encode(&columns, drop_first)?;
        println!(
            "Encoded {}: {} -> {} columns",
            report.encoded.join(", "),
            report.columns_before,
            report.columns_after
        );
    }

    let split = session.split(&config.split_options())?;
    println!(
        "Split on '{}': {} train rows, {} test rows, {} features",
        split.target,
        split.train_len(),
        split.test_len(),
        split.feature_names.len()
    );
    for (class, share) in split.train_distribution() {
        let label = split
            .target_encoding
            .label_for(class)
            .unwrap_or_else(|| class.to_string());
        println!("  train share of {label}: {share:.3}");
    }

    let report = session.train(&config.train_options())?;
    print_training(report);
    println!("Model saved to {}", config.model_dir.display());
    Ok(())
}

fn handle_predict(
    values: Vec<(String, f64)>,
    model_dir: Option<PathBuf>,
    top_n: Option<usize>,
    fill_missing: bool,
    config: &WorkflowConfig,
) -> Result<()> {
    let store = ModelStore::new(model_dir.unwrap_or_else(|| config.model_dir.clone()));
    let mut session = Session::with_model_store(store);

    let mut inputs: BTreeMap<String, f64> = values.into_iter().collect();
    if fill_missing {
        for name in &session.prediction_model()?.feature_names {
            inputs.entry(name.clone()).or_insert(0.0);
        }
    }

    let prediction = session.predict(&inputs, top_n.unwrap_or(config.top_n))?;
    print_prediction(prediction);
    Ok(())
}

fn handle_features(model_dir: Option<PathBuf>, config: &WorkflowConfig) -> Result<()> {
    let store = ModelStore::new(model_dir.unwrap_or_else(|| config.model_dir.clone()));
    let model = store
        .load()
        .with_context(|| format!("No trained model in {}", store.dir().display()))?;
    println!("Target: {}", model.target);
    for (name, weight) in model.feature_names.iter().zip(&model.weights) {
        println!("  {name:<30} {weight:>12.4}");
    }
    println!("  {:<30} {:>12.4}", "(intercept)", model.bias);
    Ok(())
}

/// Parses a `NAME=VALUE` command-line pair.
pub fn parse_feature_value(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid number for '{name}': {e}"))?;
    if !value.is_finite() {
        return Err(format!("value for '{name}' must be finite"));
    }
    Ok((name.to_owned(), value))
}

fn print_shape(data: &Dataset) {
    println!("Loaded {} rows x {} columns", data.height(), data.width());
}

fn print_summary(summary: &ColumnSummary, dtype: &str) {
    print!(
        "{:<20} {:<12} {:<8} nulls {:>5.1}%  ",
        summary.name,
        summary.kind.as_str(),
        dtype,
        summary.null_pct()
    );
    match &summary.stats {
        ColumnStats::Numeric(s) => println!(
            "min {:.2}  max {:.2}  mean {:.2}  std {:.2}  distinct {}",
            s.min.unwrap_or(f64::NAN),
            s.max.unwrap_or(f64::NAN),
            s.mean.unwrap_or(f64::NAN),
            s.std_dev.unwrap_or(f64::NAN),
            s.distinct_count
        ),
        ColumnStats::Boolean(s) => println!("true {}  false {}", s.true_count, s.false_count),
        ColumnStats::Categorical(s) => {
            let top = s
                .top_value()
                .map(|(value, count)| format!("{value} ({count})"))
                .unwrap_or_default();
            println!("distinct {}  most frequent {top}", s.counts.len());
        }
    }
}

fn print_training(report: &TrainingReport) {
    let m = &report.metrics;
    println!("Accuracy:  {:.4}", m.accuracy);
    println!("Precision: {:.4}", m.precision);
    println!("Recall:    {:.4}", m.recall);
    println!("F1 Score:  {:.4}", m.f1);
    println!("{}", m.confusion);
    if !report.model.converged {
        println!("Warning: the optimizer did not converge.");
    }
    for line in &report.interpretation {
        println!("- {line}");
    }
    println!("Trained in {:.2}s", report.duration.as_secs_f64());
}

fn print_prediction(prediction: &Prediction) {
    println!(
        "Probability of NOT churn (0): {:.2}%",
        prediction.no_churn_probability * 100.0
    );
    println!(
        "Probability of churn (1): {:.2}%",
        prediction.churn_probability * 100.0
    );
    println!("{}", prediction.message());

    println!("Top features increasing churn risk:");
    for c in prediction.top_positive.iter().filter(|c| c.contribution > 0.0) {
        println!(
            "  {:<30} value {:>10.2}  coef {:>9.4}  contribution {:>9.4}",
            c.feature, c.value, c.weight, c.contribution
        );
    }
    println!("Top features decreasing churn risk:");
    for c in prediction.top_negative.iter().filter(|c| c.contribution < 0.0) {
        println!(
            "  {:<30} value {:>10.2}  coef {:>9.4}  contribution {:>9.4}",
            c.feature, c.value, c.weight, c.contribution
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_feature_value() {
        assert_eq!(parse_feature_value("Age=42"), Ok(("Age".to_owned(), 42.0)));
        assert_eq!(
            parse_feature_value(" Balance = 1250.5 "),
            Ok(("Balance".to_owned(), 1250.5))
        );
        assert!(parse_feature_value("Age").is_err());
        assert!(parse_feature_value("=3").is_err());
        assert!(parse_feature_value("Age=old").is_err());
        assert!(parse_feature_value("Age=NaN").is_err());
    }

    #[test]
    fn test_predict_args_parse() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "churnflow",
            "predict",
            "Age=40",
            "IsActiveMember=1",
            "--fill-missing",
        ])?;
        match cli.command {
            Commands::Predict {
                values,
                fill_missing,
                ..
            } => {
                assert_eq!(values.len(), 2);
                assert!(fill_missing);
            }
            _ => panic!("expected predict"),
        }
        Ok(())
    }
}
