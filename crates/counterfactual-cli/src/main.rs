//! # counterfactual-cli
//!
//! Command-line interface for counterfactual ET experiments. Every command
//! reads an experiment description from a JSON config file.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use counterfactual::{
    EstimatorConfig, ExperimentConfig, ExperimentRunner, MeanRegressor, RandomForestRegressor,
    Regressor, Split, TrainedModel,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = std::result::Result<T, String>;

#[derive(Parser)]
#[command(name = "counterfactual")]
#[command(about = "Counterfactual evapotranspiration experiments", long_about = None)]
struct Cli {
    /// Project root holding the data/ tree (overrides the config's layout root)
    #[arg(long, global = true, env = "COUNTERFACTUAL_DATA_ROOT")]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the experiment directory and record provenance
    Init {
        /// Experiment config (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Randomized hyperparameter search on a subsample
    Tune {
        #[arg(short, long)]
        config: PathBuf,

        /// Dataset split (train, test)
        #[arg(short, long, default_value = "train")]
        split: Split,
    },

    /// Spatially grouped cross-validation at several bin sizes
    Crossval {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "train")]
        split: Split,

        /// Bin sizes in meters (default: from the config)
        #[arg(short, long, value_delimiter = ',')]
        distances: Vec<f64>,
    },

    /// Fit on a full split and save the model
    Train {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "train")]
        split: Split,
    },

    /// Apply a saved model to application datasets
    Predict {
        #[arg(short, long)]
        config: PathBuf,

        /// Split the model was trained on
        #[arg(short, long, default_value = "train")]
        split: Split,

        /// Application dataset names (agriculture, fallow, ...)
        #[arg(short, long, required = true, num_args = 1..)]
        target: Vec<String>,
    },

    /// Create a fresh experiment and run tune, train and predict in order
    Run {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "train")]
        split: Split,

        #[arg(short, long, required = true, num_args = 1..)]
        target: Vec<String>,

        /// Train with the configured hyperparameters as they are
        #[arg(long)]
        skip_tune: bool,

        /// Also run spatial cross-validation before training
        #[arg(long)]
        crossval: bool,
    },
}

impl Commands {
    fn config_path(&self) -> &Path {
        match self {
            Commands::Init { config }
            | Commands::Tune { config, .. }
            | Commands::Crossval { config, .. }
            | Commands::Train { config, .. }
            | Commands::Predict { config, .. }
            | Commands::Run { config, .. } => config,
        }
    }
}

fn load_config(path: &Path, data_root: Option<PathBuf>) -> CliResult<ExperimentConfig> {
    let mut config = ExperimentConfig::from_json_file(path)
        .map_err(|e| format!("Failed to load config {}: {}", path.display(), e))?;
    if let Some(root) = data_root {
        config.layout.root = root;
    }
    Ok(config)
}

/// Bind the configured estimator and run the command with it.
fn dispatch(command: &Commands, config: ExperimentConfig) -> CliResult<()> {
    match config.estimator.clone() {
        EstimatorConfig::RandomForest { params } => {
            let forest = RandomForestRegressor::new()
                .with_params(&params)
                .map_err(|e| e.to_string())?;
            execute(command, config, forest)
        }
        EstimatorConfig::Mean => execute(command, config, MeanRegressor::new()),
    }
}

fn execute<R>(command: &Commands, config: ExperimentConfig, regressor: R) -> CliResult<()>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    match command {
        Commands::Init { .. } => {
            let runner = ExperimentRunner::create(config, regressor).map_err(|e| e.to_string())?;
            println!("Experiment created at {}", runner.path().display());
            Ok(())
        }

        Commands::Tune { split, .. } => {
            let runner = ExperimentRunner::open(config, regressor).map_err(|e| e.to_string())?;
            run_tune(&runner, *split).map(|_| ())
        }

        Commands::Crossval {
            split, distances, ..
        } => {
            let runner = ExperimentRunner::open(config, regressor).map_err(|e| e.to_string())?;
            let estimator = current_regressor(&runner, *split)?;
            run_crossval(&runner, *split, &estimator, distances)
        }

        Commands::Train { split, .. } => {
            let runner = ExperimentRunner::open(config, regressor).map_err(|e| e.to_string())?;
            let estimator = current_regressor(&runner, *split)?;
            run_train(&runner, *split, &estimator).map(|_| ())
        }

        Commands::Predict { split, target, .. } => {
            let runner = ExperimentRunner::open(config, regressor).map_err(|e| e.to_string())?;
            let model = runner
                .load_trained_model(*split)
                .map_err(|e| format!("Failed to load trained model: {}", e))?;
            for name in target {
                run_predict(&runner, name, &model)?;
            }
            Ok(())
        }

        Commands::Run {
            split,
            target,
            skip_tune,
            crossval,
            ..
        } => {
            let runner = ExperimentRunner::create(config, regressor).map_err(|e| e.to_string())?;
            println!("Experiment created at {}", runner.path().display());

            let estimator = if *skip_tune {
                runner.regressor().clone()
            } else {
                run_tune(&runner, *split)?
            };
            if *crossval {
                run_crossval(&runner, *split, &estimator, &[])?;
            }
            let model = run_train(&runner, *split, &estimator)?;
            for name in target {
                run_predict(&runner, name, &model)?;
            }
            Ok(())
        }
    }
}

/// The configured estimator with any saved tuning result applied.
fn current_regressor<R>(runner: &ExperimentRunner<R>, split: Split) -> CliResult<R>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    match runner.load_best_params(split).map_err(|e| e.to_string())? {
        Some(params) => {
            info!(params = %params, "using saved hyperparameters");
            runner
                .regressor()
                .with_params(&params)
                .map_err(|e| e.to_string())
        }
        None => Ok(runner.regressor().clone()),
    }
}

fn run_tune<R>(runner: &ExperimentRunner<R>, split: Split) -> CliResult<R>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    let outcome = runner
        .tune_hyperparameters(split)
        .map_err(|e| e.to_string())?;

    println!(
        "Evaluated {} candidates on {} sampled rows",
        outcome.candidates.len(),
        outcome.n_rows_sampled
    );
    println!("Best mean R2: {:.4}", outcome.best_score);
    let params = serde_json::to_string_pretty(&outcome.best_params)
        .map_err(|e| format!("Failed to render parameters: {}", e))?;
    println!("Best parameters:\n{}", params);

    Ok(outcome.regressor)
}

fn run_crossval<R>(
    runner: &ExperimentRunner<R>,
    split: Split,
    estimator: &R,
    distances: &[f64],
) -> CliResult<()>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    let distances = if distances.is_empty() {
        runner.config().crossval.distances.clone()
    } else {
        distances.to_vec()
    };

    let report = runner
        .crossval(split, estimator, &distances)
        .map_err(|e| e.to_string())?;

    println!(
        "{:>10} {:>8} {:>6} {:>8} {:>8} {:>8} {:>9}",
        "distance", "groups", "folds", "R2", "RMSE", "MAE", "seconds"
    );
    for s in &report.scores {
        println!(
            "{:>10} {:>8} {:>6} {:>8.4} {:>8.4} {:>8.4} {:>9.2}",
            s.distance, s.n_groups, s.n_folds, s.r2, s.rmse, s.mae, s.elapsed_secs
        );
    }
    println!("{} rows written to {}", report.rows_written, report.path.display());
    Ok(())
}

fn run_train<R>(
    runner: &ExperimentRunner<R>,
    split: Split,
    estimator: &R,
) -> CliResult<TrainedModel<R::Fitted>>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    let model = runner
        .train_model(split, estimator)
        .map_err(|e| e.to_string())?;
    println!(
        "Trained {} on {} rows with {}",
        model.estimator, model.n_rows, model.params
    );
    Ok(model)
}

fn run_predict<R>(
    runner: &ExperimentRunner<R>,
    name: &str,
    model: &TrainedModel<R::Fitted>,
) -> CliResult<()>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    let report = runner
        .predictions(name, model)
        .map_err(|e| e.to_string())?;
    println!(
        "{}: {} rows written to {}",
        report.name,
        report.rows_written,
        report.path.display()
    );
    if report.unknown_levels > 0 {
        println!(
            "  warning: {} category values were not seen during training",
            report.unknown_levels
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counterfactual=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.command.config_path(), cli.data_root.clone())
        .and_then(|config| dispatch(&cli.command, config));

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crossval_distances() {
        let cli = Cli::try_parse_from([
            "counterfactual",
            "crossval",
            "--config",
            "exp.json",
            "--split",
            "test",
            "--distances",
            "10000,2000",
        ])
        .unwrap();

        match cli.command {
            Commands::Crossval {
                split, distances, ..
            } => {
                assert_eq!(split, Split::Test);
                assert_eq!(distances, vec![10_000.0, 2_000.0]);
            }
            _ => panic!("expected crossval"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_split() {
        assert!(Cli::try_parse_from([
            "counterfactual",
            "train",
            "--config",
            "exp.json",
            "--split",
            "validation",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "counterfactual",
            "--data-root",
            "/srv/et",
            "run",
            "-c",
            "exp.json",
            "-t",
            "agriculture",
            "fallow",
            "--skip-tune",
        ])
        .unwrap();

        assert_eq!(cli.data_root, Some(PathBuf::from("/srv/et")));
        assert_eq!(cli.command.config_path(), Path::new("exp.json"));
        match cli.command {
            Commands::Run {
                target,
                skip_tune,
                crossval,
                ..
            } => {
                assert_eq!(target, vec!["agriculture", "fallow"]);
                assert!(skip_tune);
                assert!(!crossval);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_predict_requires_target() {
        assert!(Cli::try_parse_from(["counterfactual", "predict", "--config", "exp.json"]).is_err());
    }
}
