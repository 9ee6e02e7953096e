//! Tokenize command - show what the model would see

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use vadima::config::VadimaConfig;
use vadima::session::build_encoder;

use super::read_source;

pub fn run(config: &VadimaConfig, file: &Path, format: &str) -> Result<()> {
    let source = read_source(file)?;
    let encoder = build_encoder(config).context("Failed to load tokenizer resources")?;
    let sequence = encoder.encode_text(&source);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&sequence)?);
        return Ok(());
    }

    println!(
        "\n{} {} tokens ({} strategy, context {})\n",
        style("●").cyan(),
        style(sequence.valid_length).bold(),
        config.tokenizer.strategy,
        encoder.context_limit()
    );
    let unknown = encoder.vocab().unknown_id();
    for (pos, (token, id)) in sequence.tokens.iter().zip(&sequence.token_ids).enumerate() {
        let id_text = format!("{:>7}", id);
        let id_text = if *id == unknown {
            style(id_text).yellow()
        } else {
            style(id_text).dim()
        };
        println!("  {:>4}  {}  {}", pos, id_text, token);
    }
    println!();
    Ok(())
}
