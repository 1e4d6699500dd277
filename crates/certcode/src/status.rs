//! `cert-code status`: configuration summary and API reachability.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use certcode_client::CertClient;
use certcode_core::Config;

use crate::ui::{mask_key, print_status_row, StatusMark};

pub async fn handle_status(config: &Config, config_file: Option<&Path>) -> Result<()> {
    eprintln!("{}", "CERT Code Status".bold());

    let url_mark = if config.api.url.is_empty() {
        StatusMark::Missing
    } else {
        StatusMark::Ok
    };
    print_status_row("API URL", &config.api.url, url_mark);

    match config.api.key.as_deref().filter(|key| !key.is_empty()) {
        Some(key) => print_status_row("API Key", &mask_key(key), StatusMark::Ok),
        None => print_status_row("API Key", "Not set", StatusMark::Missing),
    }

    match &config.project.id {
        Some(id) => print_status_row("Project ID", id, StatusMark::Ok),
        None => print_status_row("Project ID", "Not set", StatusMark::Optional),
    }

    match config_file {
        Some(path) => print_status_row("Config File", &path.display().to_string(), StatusMark::Ok),
        None => print_status_row("Config File", "None (using defaults)", StatusMark::Optional),
    }

    // Connectivity needs a key to build the client
    let Ok(client) = CertClient::new(&config.api) else {
        return Ok(());
    };

    eprintln!();
    eprintln!("Testing connectivity...");
    match client.health().await {
        Ok(status) if status.is_success() => {
            eprintln!("{} API is reachable", "✓".bright_green());
        }
        Ok(status) => {
            eprintln!(
                "{} API returned status {}",
                "○".bright_yellow(),
                status.as_u16()
            );
        }
        Err(e) => {
            eprintln!("{} Cannot reach API: {}", "✗".bright_red(), e);
        }
    }

    Ok(())
}
