use crate::wiring;
use anyhow::{Context, Result};
use casewise_core::config::AppConfig;
use casewise_core::session::{Session, SessionRepository};
use std::time::Duration;

pub async fn list(
    config: &AppConfig,
    user: Option<&str>,
    case: Option<&str>,
    active_only: bool,
) -> Result<()> {
    let repository = wiring::session_repository(config).await?;
    let sessions = match (user, case) {
        (Some(user), _) => repository.list_by_user(user).await?,
        (None, Some(case)) => repository.list_by_case(case).await?,
        (None, None) if active_only => repository.list_active().await?,
        (None, None) => repository.list_all().await?,
    };

    let shown: Vec<&Session> = sessions
        .iter()
        .filter(|s| case.is_none_or(|c| s.case_id == c))
        .filter(|s| !active_only || s.is_active())
        .collect();

    if shown.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    for session in shown {
        println!("{}", format_row(session));
    }
    Ok(())
}

fn format_row(session: &Session) -> String {
    format!(
        "{}  {:<16} {:<12} {:>3}/{:<3} {:>4.0}%  {}",
        session.session_id,
        session.case_id,
        session.status,
        session.current_question_index,
        session.total_questions,
        session.average_score() * 100.0,
        session.updated_at.format("%Y-%m-%d %H:%M"),
    )
}

pub async fn stats(config: &AppConfig) -> Result<()> {
    let repository = wiring::session_repository(config).await?;
    let stats = repository.stats().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to render statistics")?
    );
    Ok(())
}

pub async fn purge(config: &AppConfig, older_than_hours: u64) -> Result<()> {
    let repository = wiring::session_repository(config).await?;
    let age = Duration::from_secs(older_than_hours.saturating_mul(3600));
    let removed = repository.purge_older_than(age).await?;
    tracing::info!(target: "casewise", removed, older_than_hours, "purged sessions");
    println!("Removed {removed} session(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row_shows_status_and_progress() {
        let mut session = Session::new("abc", "case001", None);
        session.total_questions = 7;
        session.current_question_index = 2;
        let row = format_row(&session);
        assert!(row.starts_with("abc  case001"));
        assert!(row.contains("initialized"));
        assert!(row.contains("2/7"));
    }
}
