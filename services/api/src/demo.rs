use crate::infra::{load_seed_data, parse_answer, DataArgs, InMemoryResponseStore};
use clap::Args;
use onco_screen::config::AppConfig;
use onco_screen::error::AppError;
use onco_screen::screening::{
    AnswerValue, Collaborators, CompletionPayload, Question, QuestionId, QuestionKind,
    QuizOutcome, QuizSession, SubmitOutcome, TracingObserver, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    #[command(flatten)]
    pub(crate) data: DataArgs,
    /// Scripted answer as ID=VALUE; repeat for several questions.
    /// Without any, a built-in smoker persona is used.
    #[arg(long = "answer", value_parser = parse_answer)]
    pub(crate) answers: Vec<(QuestionId, AnswerValue)>,
    /// User id the results are saved under.
    #[arg(long, default_value = "demo-user")]
    pub(crate) user: String,
}

/// Smoker with a lasting cough; reaches the lung set on the bundled catalog.
fn default_script() -> HashMap<QuestionId, AnswerValue> {
    [
        (2, AnswerValue::from("Yes")),
        (3, AnswerValue::from(20.0)),
        (4, AnswerValue::from("Yes")),
        (201, AnswerValue::from("Yes")),
        (202, AnswerValue::from(15.0)),
    ]
    .into_iter()
    .map(|(id, value)| (QuestionId(id), value))
    .collect()
}

/// Answer used when the script says nothing about a question.
fn fallback_answer(question: &Question) -> AnswerValue {
    match &question.kind {
        QuestionKind::Boolean => AnswerValue::from("No"),
        QuestionKind::Range { min, .. } => AnswerValue::from(*min),
        QuestionKind::Select { choices } => choices
            .first()
            .map(|choice| AnswerValue::from(choice.as_str()))
            .unwrap_or_else(|| AnswerValue::from("")),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        data,
        answers,
        user,
    } = args;

    let config = AppConfig::load()?;
    let data = data.resolve(config.quiz);
    let (catalog, tiers) = load_seed_data(&data)?;
    let max_steps = catalog.general().len() + catalog.specialized().len();

    let script = if answers.is_empty() {
        default_script()
    } else {
        answers.into_iter().collect()
    };

    let responses = InMemoryResponseStore::default();
    let collaborators = Collaborators {
        questions: Arc::new(catalog),
        responses: Arc::new(responses.clone()),
        tiers: Arc::new(tiers),
        identity: Arc::new(UserId(user)),
        observer: Arc::new(TracingObserver),
    };

    println!("Adaptive screening demo");
    let mut session = QuizSession::start(collaborators).await?;
    let mut last_phase = None;

    for _ in 0..max_steps {
        let Some(question) = session.state().current_question().cloned() else {
            break;
        };

        let phase = (session.state().phase, session.state().active_candidate.clone());
        if last_phase.as_ref() != Some(&phase) {
            match &phase.1 {
                Some(candidate) => println!("\n== {} questions ==", candidate),
                None => println!("\n== General questions =="),
            }
            last_phase = Some(phase);
        }

        let answer = script
            .get(&question.id)
            .cloned()
            .unwrap_or_else(|| fallback_answer(&question));
        println!("  [{}] {} -> {}", question.id, question.text, answer.as_text());

        match session.submit_answer(question.id, answer).await? {
            SubmitOutcome::InProgress { .. } => {}
            SubmitOutcome::Completed { payload } => {
                render_result(&payload);
                println!("\nSaved {} responses.", responses.records().len());
                return Ok(());
            }
        }
    }

    println!("\nThe scripted answers did not reach a result; check the branch rules.");
    Ok(())
}

fn render_result(payload: &CompletionPayload) {
    println!("\nResult for {}", payload.user_id.0);
    if !payload.detected_candidates.is_empty() {
        println!(
            "  Detected conditions: {}",
            payload.detected_candidates.join(", ")
        );
    }

    match &payload.outcome {
        QuizOutcome::Healthy => {
            println!("  No specific condition was implicated. Keep up regular check-ups.");
        }
        QuizOutcome::Assessed {
            breakdown,
            tier,
            scope,
        } => {
            println!(
                "  Score: {} of {} ({}%), scope: {}",
                breakdown.score,
                breakdown.max_score,
                breakdown.percentage,
                scope.as_deref().unwrap_or("overall")
            );
            for component in &breakdown.components {
                println!(
                    "    question {:>4}: {:>5.1} ({})",
                    component.question_id, component.contribution, component.notes
                );
            }
            match tier {
                Some(tier) => {
                    println!("  Risk level: {}", tier.risk_level);
                    println!("  Advice: {}", tier.advice);
                    if !tier.foods_to_eat.is_empty() {
                        println!("  Foods to eat: {}", tier.foods_to_eat.join(", "));
                    }
                    if !tier.foods_to_avoid.is_empty() {
                        println!("  Foods to avoid: {}", tier.foods_to_avoid.join(", "));
                    }
                }
                None => println!("  No risk tier covers this score."),
            }
        }
    }

    for issue in &payload.issues {
        println!("  Warning: {issue}");
    }
}
