//! Sessions shared by the repository tests.

use casewise_core::case::{CaseInfo, Rubric, RubricCategory};
use casewise_core::flow::FlowState;
use casewise_core::grading::{Answer, GradingResult};
use casewise_core::question::{Question, QuestionKind, template_follow_up};
use casewise_core::session::Session;
use casewise_core::teaching::TeachingPoint;
use serde_json::json;
use std::collections::HashMap;

/// A session that has been through a weak answer, a follow-up and a
/// teaching point, so every collection on `Session` is non-empty.
pub fn populated_session(id: &str) -> Session {
    let mut session = Session::new(id, "case-7", Some("resident-1".to_string()));

    let mut case_info = CaseInfo::placeholder("case-7");
    case_info.title = "Adnexal mass".to_string();
    case_info
        .metadata
        .insert("clinical_history".to_string(), json!("Pelvic pain, 34F."));
    session.case_info = Some(case_info);
    session.rubric = Some(Rubric {
        categories: vec![RubricCategory {
            name: "Image Interpretation".to_string(),
            weight: 0.4,
            description: "Describes the lesion".to_string(),
            criteria: vec!["size".to_string(), "septations".to_string()],
        }],
    });

    let question = Question::new(
        "q_1",
        QuestionKind::Diagnostic,
        "Image Interpretation",
        "Describe the findings.",
    )
    .with_rubric_category("Image Interpretation");
    let answer = Answer::new("q_1", id, "A 6 cm complex adnexal mass.");
    let mut grade = GradingResult::new("q_1", &answer.id, 0.55, "Basic response.");
    grade.rubric_scores.insert("Image Interpretation".into(), 0.55);

    let follow_up = template_follow_up("Image Interpretation", &["septations".to_string()]);
    let follow_up_answer = Answer::new(&follow_up.id, id, "Thin septations.");
    let follow_up_grade =
        GradingResult::new(&follow_up.id, &follow_up_answer.id, 0.25, "Too brief.");

    session.available_questions.push(question.clone());
    session.total_questions = 1;
    session.questions_asked.push(question);
    session.answers.push(answer);
    session.grades.push(grade);
    session.follow_up_questions.push(follow_up.clone());
    session.questions_asked.push(follow_up.clone());
    session.answers.push(follow_up_answer);
    session.grades.push(follow_up_grade);
    session.teaching_points.push(TeachingPoint {
        id: "teaching_q_1_1".to_string(),
        related_question_id: Some(follow_up.id),
        topic: "Adnexal Lesions".to_string(),
        content: "Look for solid components.".to_string(),
        references: vec!["Reference 1".to_string()],
        difficulty_level: "intermediate".to_string(),
        metadata: HashMap::from([("score".to_string(), json!(0.25))]),
    });
    session.current_question_index = 1;
    session.set_flow_state(FlowState::ProvidingTeaching);
    session
        .metadata
        .insert("source".to_string(), json!({"cohort": 2026}));
    session
}
