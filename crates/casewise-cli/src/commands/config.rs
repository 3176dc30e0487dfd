use anyhow::{Context, Result};
use casewise_core::config::AppConfig;
use casewise_infrastructure::ConfigService;

pub fn init(service: &ConfigService) -> Result<()> {
    if service.write_default_if_missing()? {
        println!("Wrote {}", service.path().display());
    } else {
        println!("{} already exists", service.path().display());
    }
    Ok(())
}

pub fn show(config: &AppConfig) -> Result<()> {
    println!("{}", render(config)?);
    Ok(())
}

/// The effective configuration as TOML, with the API key masked.
fn render(config: &AppConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.grading.api_key.is_some() {
        shown.grading.api_key = Some("********".to_string());
    }
    toml::to_string_pretty(&shown).context("Failed to render configuration")
}
