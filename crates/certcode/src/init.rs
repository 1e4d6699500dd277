//! `cert-code init`: write a starter `.cert-code.toml`.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use certcode_core::{Config, CONFIG_FILE_NAME};
use certcode_diff::{detect_project_language, Language, LanguageInfo};
use certcode_tools::DefaultTools;

/// Write the starter config into `dir`, refusing to replace an existing
/// file unless `force` is set
pub fn write_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, Config::default().to_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    Ok(config_path)
}

pub fn handle_init(working_dir: &Path, force: bool) -> Result<()> {
    let config_path = write_config(working_dir, force)?;

    eprintln!(
        "{} Created configuration file: {}",
        "✓".bright_green(),
        config_path.display().to_string().bold()
    );
    if let Some(language) = detect_project_language(working_dir) {
        print_default_tools(language);
    }
    print_next_steps();

    Ok(())
}

/// Tool rows shown after init: family and the command that will run
fn default_tool_rows(language: Language) -> Vec<(&'static str, String)> {
    let tools = DefaultTools::for_language(language);
    [
        ("Tests", tools.test),
        ("Lint", tools.lint),
        ("Type check", tools.typecheck),
    ]
    .into_iter()
    .map(|(family, command)| (family, command.unwrap_or_else(|| "none".to_string())))
    .collect()
}

fn print_default_tools(language: Language) {
    let info = LanguageInfo::for_language(language);
    eprintln!();
    eprintln!("{} {}", "Detected language:".bold(), info.name);
    for (family, command) in default_tool_rows(language) {
        eprintln!("  {:<11} {}", family, command.dimmed());
    }
    eprintln!(
        "  {}",
        "Set [test], [lint] or [typecheck] command to override".dimmed()
    );
}

fn print_next_steps() {
    eprintln!();
    eprintln!("{}", "Next steps:".bold());
    eprintln!(
        "  {} Set your API key: {}",
        "1.".dimmed(),
        "export CERT_CODE_API_KEY=your-key".dimmed()
    );
    eprintln!("  {} Set your project id in the config file", "2.".dimmed());
    eprintln!(
        "  {} Run {} to evaluate code",
        "3.".dimmed(),
        "cert-code submit --task \"...\"".bright_cyan()
    );
}
