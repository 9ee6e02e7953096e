//! Doctor command - check configuration and model files

use std::path::Path;

use anyhow::Result;
use console::style;

use vadima::config::{load_config, VadimaConfig};
use vadima::inference::load_labels;
use vadima::tokenizer::{MergeTable, Strategy, Vocabulary};
use vadima::ModelSession;

struct Report {
    failures: usize,
}

impl Report {
    fn ok(&self, what: &str, detail: impl std::fmt::Display) {
        println!("{} {}: {}", style("✓").green(), what, detail);
    }

    fn skip(&self, what: &str, detail: impl std::fmt::Display) {
        println!("{} {}: {}", style("○").dim(), what, detail);
    }

    fn fail(&mut self, what: &str, detail: impl std::fmt::Display) {
        self.failures += 1;
        println!("{} {}: {}", style("✗").red(), what, detail);
    }
}

pub fn run(config_path: Option<&Path>) -> Result<()> {
    println!("\n{} vadima doctor\n", style("●").cyan().bold());
    let mut report = Report { failures: 0 };

    let config = match load_config(config_path) {
        Ok(config) => {
            report.ok("Configuration", "valid");
            config
        }
        Err(e) => {
            report.fail("Configuration", format!("{e:#}"));
            anyhow::bail!("configuration is invalid");
        }
    };

    check_files(&config, &mut report);

    if report.failures == 0 {
        let session = ModelSession::from_config(config);
        match session.initialize() {
            Ok(model) => report.ok(
                "Model",
                format!("loads, scores {} labels", model.labels().len()),
            ),
            Err(e) => report.fail("Model", e),
        }
    }

    if report.failures > 0 {
        anyhow::bail!("{} check(s) failed", report.failures);
    }
    println!("\n{} All checks passed!", style("✓").green().bold());
    Ok(())
}

fn check_files(config: &VadimaConfig, report: &mut Report) {
    let model = &config.model;
    let dir = model.model_dir();
    if dir.is_dir() {
        report.ok("Model directory", dir.display());
    } else {
        report.fail("Model directory", format!("{} does not exist", dir.display()));
    }

    let artifact = model.artifact_path();
    match (&model.source, artifact.is_file()) {
        (_, true) => report.ok("Model artifact", artifact.display()),
        (Some(source), false) => report.skip(
            "Model artifact",
            format!("missing, will be copied from {}", source.display()),
        ),
        (None, false) => report.fail(
            "Model artifact",
            format!(
                "{} missing and no source configured (set VADIMA_ARTIFACT_SOURCE)",
                artifact.display()
            ),
        ),
    }

    match Vocabulary::load(&model.vocabulary_path(), &config.tokenizer.unknown_token) {
        Ok(vocab) => report.ok("Vocabulary", format!("{} tokens", vocab.len())),
        Err(e) => report.fail("Vocabulary", e),
    }

    match (config.tokenizer.strategy, model.merges_path()) {
        (Strategy::Bpe, Some(path)) => match MergeTable::load(&path) {
            Ok(merges) => report.ok("Merges", format!("{} pairs", merges.len())),
            Err(e) => report.fail("Merges", e),
        },
        (Strategy::Bpe, None) => report.fail("Merges", "bpe strategy needs model.merges"),
        (Strategy::Wordpiece, _) => report.skip("Merges", "not used by wordpiece"),
    }

    match load_labels(&model.labels_path()) {
        Ok(labels) => report.ok("Labels", format!("{} labels", labels.len())),
        Err(e) => report.fail("Labels", e),
    }
}
