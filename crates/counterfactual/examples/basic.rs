//! Basic example running a full counterfactual experiment on synthetic data
//!
//! Run with: cargo run --example basic -p counterfactual

use std::fs;
use std::path::Path;

use counterfactual::prelude::*;

fn write_synthetic(path: &Path, rows: usize, offset: f64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = String::from("x,y,ET,Elevation,PET,month,year\n");
    for i in 0..rows {
        let x = -121.0 + (i % 20) as f64 * 0.05;
        let y = 37.0 + (i / 20) as f64 * 0.05;
        let elevation = 50.0 + (i % 13) as f64 * 40.0;
        let pet = 4.0 + (i % 7) as f64 * 0.3;
        let et = offset + 0.4 * pet - elevation / 1000.0;
        body.push_str(&format!(
            "{},{},{:.3},{},{:.2},{},{}\n",
            x,
            y,
            et,
            elevation,
            pet,
            6 + i % 3,
            2018 + i % 2
        ));
    }
    fs::write(path, body)
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== counterfactual Basic Example ===\n");

    let root = std::env::temp_dir().join(format!("counterfactual-basic-{}", std::process::id()));
    let config = ExperimentBuilder::new("basic_rf", "natural")
        .features(&["x", "y", "Elevation", "PET"])
        .data_root(&root)
        .crossval(CrossvalConfig::default().distances(&[20_000.0, 5_000.0]))
        .build()?;

    // 1. Synthetic inputs
    println!("1. Writing synthetic datasets under {}", root.display());
    write_synthetic(&config.layout.training_csv(Split::Train, "natural"), 400, 1.0)?;
    write_synthetic(&config.layout.application_csv("agriculture"), 100, 2.5)?;

    // 2. Experiment directory
    let forest = RandomForestRegressor::new().with_params(
        &Hyperparameters::new()
            .with("n_estimators", 50usize)
            .with("max_features", "sqrt")
            .with("random_state", 0usize),
    )?;
    let runner = ExperimentRunner::create(config, forest)?;
    println!("2. Experiment created at {}\n", runner.path().display());

    // 3. Spatial cross-validation
    println!("3. Spatial cross-validation");
    let report = runner.crossval(Split::Train, runner.regressor(), &[20_000.0, 5_000.0])?;
    for score in &report.scores {
        println!(
            "   {:>6} m: {} groups, {} folds, R2 = {:.3}, RMSE = {:.3}",
            score.distance, score.n_groups, score.n_folds, score.r2, score.rmse
        );
    }
    println!();

    // 4. Train and apply
    println!("4. Training and predicting");
    let model = runner.train_model(Split::Train, runner.regressor())?;
    let predictions = runner.predictions("agriculture", &model)?;
    println!(
        "   {} rows written to {}",
        predictions.rows_written,
        predictions.path.display()
    );

    fs::remove_dir_all(&root)?;
    println!("\n=== Example completed ===");
    Ok(())
}
