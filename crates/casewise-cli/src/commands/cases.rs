use crate::wiring;
use anyhow::{Context, Result};
use casewise_core::config::AppConfig;
use casewise_infrastructure::CaseDirectory;

pub async fn list(config: &AppConfig) -> Result<()> {
    let root = wiring::cases_root(config);
    let directory = CaseDirectory::new(&root);
    let ids = directory
        .list_case_ids()
        .await
        .with_context(|| format!("Failed to read cases from {}", root.display()))?;

    if ids.is_empty() {
        println!("No cases under {}", root.display());
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}
