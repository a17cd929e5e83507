//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Each operation takes the session's guard with `try_lock`, applies a `flow` transition to a
//! copy of the state, performs the network effects, and only then writes the copy back.
//! An event arriving while another one is in flight is rejected with `FlowError::Busy`.
//!
//! On the last answer the quiz is scored once, submitted once, and moved to `result`
//! whatever the submission outcome; the outcome goes to the `SubmissionSink`.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::MutexGuard;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backend::{
  EmployeeAnswerOut, EmployeeOut, EmployeePayload, FormulaPayload, FormulaSubmission, LeadRequest, ResultSubmission,
  SubmitReceipt, TeamAnswerOut, TeamPayload, TeremokSubmission,
};
use crate::domain::{Answer, AnswerValue, LeadId, Quiz, QuestionCard, UtmParams};
use crate::flow::{FlowError, Progress, QuizOutcome, RemoteResult, SessionState, Step, SubmissionStatus};
use crate::protocol::{AnswerIn, ContactForm, CreateSessionIn, SessionView};
use crate::scoring::bank_cards;
use crate::scoring::employee::{self, compute_employee_profile, EMPLOYEE_TEST};
use crate::scoring::team::{compute_dimension_scores, TeamResult, TeaserResult, FULL_TEST, MINI_QUIZ};
use crate::state::{AppState, SessionHandle};
use crate::telemetry::SubmissionReport;
use crate::util::{fill_template, sanitize_text};
use crate::validation::validate_contact;

const LOAD_FAILED: &str = "Не удалось загрузить тест. Попробуйте позже.";

/// Cards for the banks compiled into the service; the teremok bank comes from the backend.
fn static_cards(quiz: Quiz) -> Vec<QuestionCard> {
  match quiz {
    Quiz::TeamMini => bank_cards(MINI_QUIZ),
    Quiz::TeamFull => bank_cards(FULL_TEST),
    Quiz::Employee => bank_cards(EMPLOYEE_TEST),
    Quiz::TeremokTypes => Vec::new(),
  }
}

fn acquire(handle: &SessionHandle) -> Result<MutexGuard<'_, SessionState>, FlowError> {
  handle.try_lock().map_err(|_| {
    warn!(target: "flow", "Rejected event: session busy");
    FlowError::Busy
  })
}

#[instrument(level = "info", skip(state, input), fields(quiz = ?input.quiz))]
pub async fn create_session(state: &AppState, input: CreateSessionIn) -> SessionView {
  let utm = input.page_url.as_deref().map(UtmParams::from_page_url).unwrap_or_default();
  let client_key = input.client_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
  let known = state.known_lead(client_key.as_deref()).await;
  let s = SessionState::new(input.quiz, utm, client_key, known).with_questions(static_cards(input.quiz));
  info!(target: "flow", id = %s.id, site = s.quiz.site().as_str(), registered = s.is_registered(), "Session opened");
  let view = SessionView::from(&s);
  state.insert_session(s).await;
  view
}

#[instrument(level = "debug", skip(state))]
pub async fn view(state: &AppState, id: Uuid) -> Result<SessionView, FlowError> {
  let handle = state.session(id).await?;
  let s = handle.lock().await;
  Ok(SessionView::from(&*s))
}

#[instrument(level = "info", skip(state))]
pub async fn close_session(state: &AppState, id: Uuid) -> Result<(), FlowError> {
  if state.remove_session(id).await {
    info!(target: "flow", %id, "Session closed");
    Ok(())
  } else {
    Err(FlowError::UnknownSession(id))
  }
}

/// Load the server bank if this quiz needs one, then enter the quiz.
async fn open_loaded(state: &AppState, s: SessionState) -> Result<SessionState, FlowError> {
  let needs_bank = s.step == Step::Contact && s.is_registered() && s.questions.is_empty() && s.quiz.server_delivered_bank();
  let s = if needs_bank {
    let site = state.config.site(s.quiz.site());
    let Some(path) = site.questions_path.as_deref() else {
      warn!(target: "flow", quiz = ?s.quiz, "No question source configured");
      return Err(FlowError::QuestionsUnavailable(LOAD_FAILED.into()));
    };
    let cards = state.backend.fetch_questions(path).await.map_err(|e| {
      warn!(target: "flow", id = %s.id, error = %e, "Question bank unavailable");
      FlowError::QuestionsUnavailable(LOAD_FAILED.into())
    })?;
    s.with_questions(cards)
  } else {
    s
  };
  s.open_quiz()
}

/// Validate the contact, register the lead, and open the quiz.
/// A session that already knows its lead skips the form and the network call.
#[instrument(level = "info", skip(state, form))]
pub async fn register_contact(state: &AppState, id: Uuid, form: ContactForm) -> Result<SessionView, FlowError> {
  let handle = state.session(id).await?;
  let mut guard = acquire(&handle)?;
  if guard.step != Step::Contact {
    return Err(FlowError::WrongStep { action: "register", step: guard.step.name() });
  }

  if guard.is_registered() {
    info!(target: "flow", %id, "Lead already registered; skipping contact form");
  } else {
    let contact = validate_contact(&form).map_err(FlowError::Validation)?;
    let lead = LeadRequest::new(&contact, state.config.site(guard.quiz.site()), &guard.utm);
    let lead_id = state.backend.register_lead(&lead).await.map_err(|e| {
      warn!(target: "flow", %id, error = %e, "Registration failed; staying on contact");
      FlowError::Registration(e.user_message())
    })?;
    if let Some(key) = &guard.client_key {
      state.remember_lead(key, lead_id.clone()).await;
    }
    let next = guard.clone().registered(Some(contact), lead_id)?;
    *guard = next;
  }

  let next = open_loaded(state, guard.clone()).await?;
  *guard = next;
  Ok(SessionView::from(&*guard))
}

/// Explicit "start the test" click. Without a lead the session stays on `contact` with a notice.
#[instrument(level = "info", skip(state))]
pub async fn open_quiz(state: &AppState, id: Uuid) -> Result<SessionView, FlowError> {
  let handle = state.session(id).await?;
  let mut guard = acquire(&handle)?;
  let next = open_loaded(state, guard.clone()).await?;
  *guard = next;
  Ok(SessionView::from(&*guard))
}

#[instrument(level = "info", skip(state, employee_name))]
pub async fn start_assessment(state: &AppState, id: Uuid, employee_name: &str) -> Result<SessionView, FlowError> {
  let handle = state.session(id).await?;
  let mut guard = acquire(&handle)?;
  let required = state.config.site(guard.quiz.site()).require_employee_name;
  let next = guard.clone().begin_assessment(&sanitize_text(employee_name), required)?;
  *guard = next;
  Ok(SessionView::from(&*guard))
}

#[instrument(level = "info", skip(state, input), fields(question_id = ?input.question_id))]
pub async fn submit_answer(state: &AppState, id: Uuid, input: AnswerIn) -> Result<SessionView, FlowError> {
  let question_id = input.question_id.clone();
  let value = input.into_value()?;
  let handle = state.session(id).await?;
  let mut guard = acquire(&handle)?;

  let (next, progress) = guard.clone().answer(question_id.as_deref(), value)?;
  *guard = next;
  match progress {
    Progress::Next { index } => debug!(target: "flow", %id, next = index, "Answer recorded"),
    Progress::Completed => {
      let finished = complete(state, guard.clone()).await?;
      *guard = finished;
    }
  }
  Ok(SessionView::from(&*guard))
}

/// Employee variant: back to the instruction for the next employee.
#[instrument(level = "info", skip(state))]
pub async fn assess_another(state: &AppState, id: Uuid) -> Result<SessionView, FlowError> {
  let handle = state.session(id).await?;
  let mut guard = acquire(&handle)?;
  let next = guard.clone().assess_another()?;
  info!(target: "flow", %id, assessment = %next.assessment_id, "Next employee assessment");
  *guard = next;
  Ok(SessionView::from(&*guard))
}

/// Score, submit, and move to `result`.
async fn complete(state: &AppState, s: SessionState) -> Result<SessionState, FlowError> {
  let Some(lead) = s.lead_id.clone() else {
    return Err(FlowError::WrongStep { action: "finish", step: Step::Contact.name() });
  };
  let site = state.config.site(s.quiz.site());

  let (outcome, submission) = match s.quiz {
    Quiz::TeremokTypes => {
      let submission = ResultSubmission::Teremok(TeremokSubmission {
        user_id: lead,
        answers: teremok_answers(&s.answers),
        utm: s.utm.clone(),
      });
      (None, submission)
    }
    Quiz::TeamMini => {
      let teaser = TeaserResult::from_scores(compute_dimension_scores(MINI_QUIZ, &s.answers));
      let payload = FormulaPayload::MiniQuiz(TeamPayload {
        answers: team_answers(&s.answers),
        scores: teaser.scores.clone(),
        dominant_dimension: teaser.dominant,
        dominant_percentage: teaser.scores.get(teaser.dominant),
      });
      (Some(QuizOutcome::Teaser(teaser)), formula_submission(&s, lead, payload))
    }
    Quiz::TeamFull => {
      let result = TeamResult::from_scores(compute_dimension_scores(FULL_TEST, &s.answers));
      let payload = FormulaPayload::FullTest(TeamPayload {
        answers: team_answers(&s.answers),
        scores: result.scores.clone(),
        dominant_dimension: result.dominant,
        dominant_percentage: result.dominant_percentage,
      });
      (Some(QuizOutcome::Team(result)), formula_submission(&s, lead, payload))
    }
    Quiz::Employee => {
      let profile = compute_employee_profile(&s.answers);
      let interpretation = employee::profile(profile.category);
      let headline = match &s.employee_name {
        Some(name) => fill_template("{name} — {title}", &[("name", name.as_str()), ("title", interpretation.title)]),
        None => interpretation.title.to_string(),
      };
      let payload = FormulaPayload::Employee(EmployeePayload {
        employee: EmployeeOut { name: s.employee_name.clone() },
        answers: employee_answers(&s.answers),
        result: profile.clone(),
      });
      let outcome = QuizOutcome::Employee {
        employee_name: s.employee_name.clone(),
        headline,
        profile,
        interpretation,
      };
      (Some(outcome), formula_submission(&s, lead, payload))
    }
  };

  let receipt = state.backend.submit_results(&site.submit_path, &submission).await;
  let status = match &receipt {
    Ok(_) => SubmissionStatus::Delivered,
    Err(e) => SubmissionStatus::Failed { reason: e.to_string() },
  };
  state.sink.report(&SubmissionReport {
    session_id: s.id,
    assessment_id: s.assessment_id,
    quiz: s.quiz,
    kind: submission.kind(),
    status: status.clone(),
  });

  // teremok is scored by the backend; without a receipt there is only the fallback text
  let outcome = match outcome {
    Some(o) => o,
    None => QuizOutcome::Remote(receipt.map(remote_result).unwrap_or_else(|_| RemoteResult::unavailable())),
  };
  s.finish(outcome, status)
}

fn formula_submission(s: &SessionState, lead: LeadId, payload: FormulaPayload) -> ResultSubmission {
  ResultSubmission::Formula(FormulaSubmission {
    user_id: lead,
    contact: s.contact.clone(),
    timestamp: Utc::now(),
    payload,
    utm: s.utm.clone(),
  })
}

fn remote_result(r: SubmitReceipt) -> RemoteResult {
  let fallback = RemoteResult::unavailable();
  RemoteResult {
    title: r.result_info.title.or_else(|| r.result_type.clone()).unwrap_or(fallback.title),
    description: r.result_info.description.unwrap_or(fallback.description),
    full_description: r.result_info.full_description.unwrap_or(fallback.full_description),
    result_id: r.result_id,
    result_type: r.result_type,
  }
}

/// `{question_id: option_index}`; option ids of server cards are their indices.
fn teremok_answers(answers: &[Answer]) -> BTreeMap<String, Value> {
  answers
    .iter()
    .map(|a| {
      let v = match &a.value {
        AnswerValue::Choice(id) => id.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(id.as_str())),
        AnswerValue::Rating(r) => Value::from(r.value()),
      };
      (a.question_id.clone(), v)
    })
    .collect()
}

fn team_answers(answers: &[Answer]) -> Vec<TeamAnswerOut> {
  answers
    .iter()
    .map(|a| match &a.value {
      AnswerValue::Choice(id) => TeamAnswerOut { question_id: a.question_id.clone(), answer_id: Some(id.clone()), value: None },
      AnswerValue::Rating(r) => TeamAnswerOut { question_id: a.question_id.clone(), answer_id: None, value: Some(r.value()) },
    })
    .collect()
}

fn employee_answers(answers: &[Answer]) -> Vec<EmployeeAnswerOut> {
  answers
    .iter()
    .filter_map(|a| match &a.value {
      AnswerValue::Choice(option) => {
        let question_id = a.question_id.parse().ok()?;
        Some(EmployeeAnswerOut { question_id, option: option.clone() })
      }
      AnswerValue::Rating(_) => None,
    })
    .collect()
}
