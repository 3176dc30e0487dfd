use crate::wiring;
use anyhow::{Context, Result};
use casewise_application::{ActionOutcome, SessionAction, SessionOrchestrator, SessionSummary};
use casewise_core::config::AppConfig;
use casewise_core::grading::SKIP_SENTINEL;
use casewise_core::session::SessionRepository;
use casewise_core::teaching::TeachingPoint;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

/// What the student typed at an answer prompt.
#[derive(Debug, PartialEq)]
enum Reply {
    Answer(String),
    Quit,
}

fn parse_reply(line: &str) -> Reply {
    match line.trim() {
        "quit" | "exit" => Reply::Quit,
        "skip" => Reply::Answer(SKIP_SENTINEL.to_string()),
        text => Reply::Answer(text.to_string()),
    }
}

async fn prompt(input: &mut Input, label: &str) -> Result<Option<String>> {
    println!("{label}");
    input.next_line().await.context("Failed to read from stdin")
}

pub async fn run(config: &AppConfig, case_id: &str, user_id: Option<&str>) -> Result<()> {
    let orchestrator = wiring::orchestrator(config).await?;
    let session_id = orchestrator
        .start_session(case_id, user_id)
        .await
        .with_context(|| format!("Failed to start a session for case '{case_id}'"))?;

    let session = orchestrator.repository().get(&session_id).await?;
    if let Some(info) = &session.case_info {
        println!("== {} ({}, {}) ==", info.title, info.specialty, info.difficulty);
        println!("{}", info.description);
        if let Some(history) = info.clinical_history() {
            println!("\nClinical history: {history}");
        }
    }
    println!("\nSession {session_id}");
    println!("Type your answer on one line. 'skip' skips a question, 'quit' ends early.\n");

    if let ActionOutcome::Ready { total_questions } = orchestrator
        .process_action(&session_id, SessionAction::StartQuestions)
        .await?
    {
        println!("{total_questions} questions\n");
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    drive(&orchestrator, &session_id, &mut input).await?;

    let summary = orchestrator.end_session(&session_id).await?;
    print_summary(&summary);
    Ok(())
}

async fn drive(orchestrator: &SessionOrchestrator, session_id: &str, input: &mut Input) -> Result<()> {
    loop {
        let question = match orchestrator
            .process_action(session_id, SessionAction::GetQuestion)
            .await?
        {
            ActionOutcome::Question {
                question,
                question_number,
                total_questions,
                ..
            } => {
                let marker = if question.is_follow_up() { " follow-up" } else { "" };
                println!(
                    "Question {question_number}/{total_questions}{marker} [{}]",
                    question.scoring_category()
                );
                question
            }
            ActionOutcome::Complete { .. } => return Ok(()),
            ActionOutcome::Error { message } => {
                eprintln!("error: {message}");
                return Ok(());
            }
            other => {
                eprintln!("unexpected response: {}", other.status());
                return Ok(());
            }
        };

        let Some(line) = prompt(input, &question.text).await? else {
            return Ok(());
        };
        let text = match parse_reply(&line) {
            Reply::Quit => return Ok(()),
            Reply::Answer(text) => text,
        };

        let outcome = orchestrator
            .process_action(session_id, SessionAction::submit(&question.id, text))
            .await?;
        match outcome {
            ActionOutcome::FollowUpNeeded { score, feedback } => {
                print_grade(score, &feedback);
                println!("Let's dig into that a little more.\n");
            }
            ActionOutcome::NextQuestion { score, feedback } => {
                print_grade(score, &feedback);
                println!();
            }
            ActionOutcome::Complete { score, feedback } => {
                if let (Some(score), Some(feedback)) = (score, feedback) {
                    print_grade(score, &feedback);
                }
                return Ok(());
            }
            ActionOutcome::TeachingRecommended { score, feedback } => {
                print_grade(score, &feedback);
                if !wait_for_teach(input).await? {
                    return Ok(());
                }
                match orchestrator
                    .process_action(session_id, SessionAction::GetFeedback)
                    .await?
                {
                    ActionOutcome::TeachingDelivered { teaching } => print_teaching(&teaching),
                    ActionOutcome::Error { message } => {
                        eprintln!("error: {message}");
                        return Ok(());
                    }
                    other => eprintln!("unexpected response: {}", other.status()),
                }
            }
            ActionOutcome::Error { message } => {
                eprintln!("error: {message}");
                return Ok(());
            }
            other => eprintln!("unexpected response: {}", other.status()),
        }
    }
}

/// Waits for `teach`. Returns false when the student quits instead.
async fn wait_for_teach(input: &mut Input) -> Result<bool> {
    loop {
        let Some(line) = prompt(input, "Type 'teach' for a teaching point, or 'quit'.").await? else {
            return Ok(false);
        };
        match line.trim() {
            "teach" => return Ok(true),
            "quit" | "exit" => return Ok(false),
            _ => {}
        }
    }
}

fn print_grade(score: f64, feedback: &str) {
    println!("Score: {:.0}%", score * 100.0);
    println!("{feedback}");
}

fn print_teaching(teaching: &TeachingPoint) {
    println!("\n-- {} --", teaching.topic);
    println!("{}", teaching.content);
    for reference in &teaching.references {
        println!("  * {reference}");
    }
    println!();
}

fn print_summary(summary: &SessionSummary) {
    println!("\n== Session summary ==");
    println!("Overall score:  {:.0}%", summary.overall_score * 100.0);
    println!("Weighted score: {:.0}%", summary.weighted_score * 100.0);
    for category in &summary.category_scores {
        println!("  {:<30} {:.0}%", category.category, category.score * 100.0);
    }
    println!(
        "Answered {} ({} follow-ups, {} teaching points) in {:.1} min",
        summary.questions_answered,
        summary.follow_ups_completed,
        summary.teaching_points_viewed,
        summary.duration_minutes
    );
    if !summary.recommended_follow_ups.is_empty() {
        println!("\nWorth revisiting:");
        for question in &summary.recommended_follow_ups {
            println!("  [{}] {}", question.scoring_category(), question.text);
        }
    }
}
