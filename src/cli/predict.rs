//! Predict command - rank parameter types for one function

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::warn;

use vadima::config::VadimaConfig;
use vadima::inference::FunctionSignature;
use vadima::{Classification, ModelSession, Predictor};

use super::{create_spinner_style, read_source};

#[derive(Serialize)]
struct PredictionReport<'a> {
    function: Option<&'a str>,
    parameters: &'a [String],
    parameter_count: usize,
    predictions: Option<&'a [Classification]>,
}

pub fn run(
    config: VadimaConfig,
    file: &Path,
    params: Option<usize>,
    top_k: Option<usize>,
    format: &str,
) -> Result<()> {
    let source = read_source(file)?;
    let signature = FunctionSignature::parse(&source);

    let parameter_count = match (params, &signature) {
        (Some(n), _) => n,
        (None, Some(sig)) => sig.parameters.len(),
        (None, None) => anyhow::bail!(
            "No `def name(...)` header found in {}; pass --params",
            file.display()
        ),
    };

    let session = Arc::new(ModelSession::from_config(config));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(create_spinner_style());
    spinner.set_message("Loading model...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let loaded = session.initialize();
    spinner.finish_and_clear();
    loaded.context("Failed to load model")?;

    let mut predictor = Predictor::new(session);
    if let Some(k) = top_k {
        predictor = predictor.with_top_k(k);
    }

    let predictions = match predictor.predict(&source, parameter_count) {
        Err(e) if e.is_retryable() => {
            warn!("Prediction failed ({}), reloading model", e);
            predictor.recover().context("Failed to reload model")?;
            predictor.predict(&source, parameter_count)?
        }
        other => other?,
    };

    if format == "json" {
        let report = PredictionReport {
            function: signature.as_ref().map(|s| s.name.as_str()),
            parameters: signature.as_ref().map(|s| s.parameters.as_slice()).unwrap_or(&[]),
            parameter_count,
            predictions: predictions.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_text(signature.as_ref(), parameter_count, predictions.as_deref());
    Ok(())
}

fn print_text(
    signature: Option<&FunctionSignature>,
    parameter_count: usize,
    predictions: Option<&[Classification]>,
) {
    match signature {
        Some(sig) if !sig.parameters.is_empty() => println!(
            "\n{} {}({})\n",
            style("def").dim(),
            style(&sig.name).bold(),
            sig.parameters.join(", ")
        ),
        Some(sig) => println!("\n{} {}()\n", style("def").dim(), style(&sig.name).bold()),
        None => println!(),
    }

    let Some(predictions) = predictions else {
        println!("{} Nothing to predict", style("○").dim());
        return;
    };

    println!(
        "{} ({} parameter{})",
        style("Suggested types").bold(),
        parameter_count,
        if parameter_count == 1 { "" } else { "s" }
    );
    println!("{}", style("──────────────────────────────────────").dim());
    for (rank, c) in predictions.iter().enumerate() {
        let pct = format!("{:>6.2}%", c.probability * 100.0);
        let pct = if rank == 0 {
            style(pct).green().bold()
        } else {
            style(pct).cyan()
        };
        println!("  {}. {}  {}", rank + 1, pct, c.label);
    }
    println!();
}
