//! Init command - write an example configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;

use vadima::config::{CONFIG_FILE_NAME, EXAMPLE_CONFIG};

/// Write the example config to `target` (default: `./vadima.toml`)
pub fn run(target: Option<&Path>, force: bool) -> Result<()> {
    let config_path = target
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    println!("\n{} Initializing vadima\n", style("●").cyan().bold());

    if config_path.exists() && !force {
        println!(
            "{} Already exists: {} (use --force to overwrite)",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "\nPoint {} at a directory with the model, vocabulary and labels, then run {}",
        style("[model] dir").bold(),
        style("vadima doctor").bold()
    );
    Ok(())
}
