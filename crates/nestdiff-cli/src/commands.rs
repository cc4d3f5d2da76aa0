use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use nestdiff_engine::{CompareOutcome, Comparator};
use nestdiff_types::CompareConfig;
use tracing::debug;

use crate::cli::{Cli, Target};
use crate::present::render_text;
use crate::progress::StderrProgress;

/// Run one comparison. Returns `true` when differences were found.
pub fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = load_config(cli)?;
    debug!(?config, "effective configuration");

    for path in [&cli.file1, &cli.file2] {
        fs::symlink_metadata(path).with_context(|| format!("cannot access {}", path.display()))?;
    }

    let mut comparator = Comparator::new(config);
    if cli.progress {
        comparator = comparator.with_progress(Arc::new(StderrProgress::default()));
    }
    let outcome = comparator.compare_paths(&cli.file1, &cli.file2);

    write_reports(cli, &outcome)?;
    print_summary(&outcome);
    Ok(outcome.has_differences())
}

/// The config file, if any, with command-line flags layered on top.
pub fn load_config(cli: &Cli) -> anyhow::Result<CompareConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            CompareConfig::from_toml_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => CompareConfig::default(),
    };
    if cli.new_file {
        config.include_added_removed = true;
    }
    if let Some(threshold) = cli.fuzzy_threshold {
        config.fuzzy_threshold = threshold;
    }
    if let Some(limit) = cli.max_report_size {
        config.max_report_size = Some(limit);
    }
    if let Some(depth) = cli.max_depth {
        config.max_depth = depth;
    }
    config.validate().context("invalid option")?;
    Ok(config)
}

fn write_reports(cli: &Cli, outcome: &CompareOutcome) -> anyhow::Result<()> {
    let Some(difference) = &outcome.difference else {
        return Ok(());
    };
    let text_target = cli.text_target();
    let json_target = cli.json_target();
    if text_target == Some(Target::Stdout) && json_target == Some(Target::Stdout) {
        bail!("--text and --json cannot both write to stdout");
    }
    if let Some(target) = text_target {
        write_to(&target, &render_text(difference))?;
    }
    if let Some(target) = json_target {
        let mut json = serde_json::to_string_pretty(difference)?;
        json.push('\n');
        write_to(&target, &json)?;
    }
    Ok(())
}

fn write_to(target: &Target, content: &str) -> anyhow::Result<()> {
    match target {
        Target::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
        Target::File(path) => {
            fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
        }
    }
    Ok(())
}

fn print_summary(outcome: &CompareOutcome) {
    match &outcome.difference {
        None if !outcome.is_truncated() => eprintln!("{} no differences", "✓".green().bold()),
        None => {}
        Some(difference) => eprintln!(
            "{} {} differing node(s)",
            "✗".yellow().bold(),
            difference.node_count()
        ),
    }
    if let Some(reason) = &outcome.aborted {
        eprintln!("{} report truncated: {reason}", "!".red().bold());
    }
}
