//! Quiz flow state machine.
//!
//! `SessionState` is a plain value. Every transition consumes it and returns the next
//! state, so a failed transition leaves the caller's copy untouched:
//!
//! ```text
//! contact ──registered/open──▶ instruction ──begin──▶ question[0] ─▶ … ─▶ question[N-1] ──finish──▶ result
//!                  └──────────(no instruction)───────▶ question[0]                                     │
//!                              instruction ◀──────────────── assess another (employee only) ◀──────────┘
//! ```
//!
//! Network effects (registration, bank fetch, result submission) live in `logic`;
//! this module only decides what is allowed.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Answer, AnswerValue, Contact, LeadId, Quiz, QuestionCard, UtmParams};
use crate::scoring::employee::EmployeeProfile;
use crate::scoring::team::{TeamResult, TeaserResult};
use crate::scoring::Interpretation;
use crate::validation::FieldErrors;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
  Contact,
  Instruction,
  Question { index: usize },
  Result,
}

impl Step {
  pub fn name(self) -> &'static str {
    match self {
      Step::Contact => "contact",
      Step::Instruction => "instruction",
      Step::Question { .. } => "question",
      Step::Result => "result",
    }
  }
}

/// Banner shown above the current step.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
  /// The quiz was opened without a registered lead.
  RegistrationRequired,
  /// A lead was already registered from this browser; the contact step is skipped.
  AlreadyRegistered,
}

/// Result rendered by the backend (teremok scores on the server side).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RemoteResult {
  pub result_id: Option<String>,
  pub result_type: Option<String>,
  pub title: String,
  pub description: String,
  pub full_description: String,
}

impl RemoteResult {
  /// Shown when the backend could not score the test.
  pub fn unavailable() -> Self {
    Self {
      result_id: None,
      result_type: None,
      title: String::new(),
      description: "Тест завершен".into(),
      full_description: String::new(),
    }
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuizOutcome {
  Team(TeamResult),
  Teaser(TeaserResult),
  Employee {
    employee_name: Option<String>,
    headline: String,
    profile: EmployeeProfile,
    interpretation: &'static Interpretation,
  },
  Remote(RemoteResult),
}

/// Whether the backend accepted the result submission.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
  Delivered,
  Failed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
  /// Field-level validation; the step does not change.
  #[error("validation failed")]
  Validation(FieldErrors),

  /// Lead registration was rejected or could not be sent.
  #[error("{0}")]
  Registration(String),

  #[error("`{action}` is not allowed in step `{step}`")]
  WrongStep { action: &'static str, step: &'static str },

  /// Another event for this session is still in flight.
  #[error("another action is in progress for this session")]
  Busy,

  #[error("unknown session {0}")]
  UnknownSession(Uuid),

  #[error("questions unavailable: {0}")]
  QuestionsUnavailable(String),
}

impl FlowError {
  pub fn field(field: &'static str, message: impl Into<String>) -> Self {
    let mut errors = FieldErrors::new();
    errors.insert(field, message.into());
    FlowError::Validation(errors)
  }
}

/// What an accepted answer led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
  Next { index: usize },
  /// The last question was answered; score, submit, then `finish`.
  Completed,
}

#[derive(Clone, Debug)]
pub struct SessionState {
  pub id: Uuid,
  pub quiz: Quiz,
  pub step: Step,
  pub client_key: Option<String>,
  pub contact: Option<Contact>,
  pub lead_id: Option<LeadId>,
  pub utm: UtmParams,
  /// Changes on every "assess another" so each assessment is distinguishable.
  pub assessment_id: Uuid,
  pub employee_name: Option<String>,
  pub questions: Arc<[QuestionCard]>,
  pub answers: Vec<Answer>,
  pub outcome: Option<QuizOutcome>,
  pub submission: Option<SubmissionStatus>,
  pub notice: Option<Notice>,
}

impl SessionState {
  pub fn new(quiz: Quiz, utm: UtmParams, client_key: Option<String>, known_lead: Option<LeadId>) -> Self {
    Self {
      id: Uuid::new_v4(),
      quiz,
      step: Step::Contact,
      client_key,
      notice: known_lead.as_ref().map(|_| Notice::AlreadyRegistered),
      contact: None,
      lead_id: known_lead,
      utm,
      assessment_id: Uuid::new_v4(),
      employee_name: None,
      questions: Arc::from(Vec::new()),
      answers: Vec::new(),
      outcome: None,
      submission: None,
    }
  }

  fn wrong_step(&self, action: &'static str) -> FlowError {
    FlowError::WrongStep { action, step: self.step.name() }
  }

  pub fn is_registered(&self) -> bool {
    self.lead_id.is_some()
  }

  pub fn current_card(&self) -> Option<&QuestionCard> {
    match self.step {
      Step::Question { index } => self.questions.get(index),
      _ => None,
    }
  }

  /// Record a successful lead registration. Only valid while collecting the contact.
  pub fn registered(mut self, contact: Option<Contact>, lead_id: LeadId) -> Result<Self, FlowError> {
    if self.step != Step::Contact {
      return Err(self.wrong_step("register"));
    }
    self.contact = contact;
    self.lead_id = Some(lead_id);
    Ok(self)
  }

  pub fn with_questions(mut self, cards: Vec<QuestionCard>) -> Self {
    self.questions = Arc::from(cards);
    self
  }

  /// Enter the quiz. Without a lead the session is sent back to `contact`.
  /// Outside the `contact` step this is a no-op.
  pub fn open_quiz(mut self) -> Result<Self, FlowError> {
    if self.step != Step::Contact {
      return Ok(self);
    }
    if !self.is_registered() {
      self.notice = Some(Notice::RegistrationRequired);
      return Ok(self);
    }
    if self.questions.is_empty() {
      return Err(FlowError::QuestionsUnavailable("no questions loaded".into()));
    }
    if self.notice == Some(Notice::RegistrationRequired) {
      self.notice = None;
    }
    self.step = if self.quiz.has_instruction() { Step::Instruction } else { Step::Question { index: 0 } };
    Ok(self)
  }

  /// Leave the instruction step. `name_required` rejects blank names.
  pub fn begin_assessment(mut self, employee_name: &str, name_required: bool) -> Result<Self, FlowError> {
    if self.step != Step::Instruction {
      return Err(self.wrong_step("begin_assessment"));
    }
    let name = employee_name.trim();
    if name.is_empty() && name_required {
      return Err(FlowError::field("employee_name", "Пожалуйста, укажите имя или инициалы сотрудника"));
    }
    self.employee_name = (!name.is_empty()).then(|| name.to_string());
    self.step = Step::Question { index: 0 };
    Ok(self)
  }

  /// Record an answer for the current card and advance.
  pub fn answer(mut self, question_id: Option<&str>, value: AnswerValue) -> Result<(Self, Progress), FlowError> {
    let Step::Question { index } = self.step else {
      return Err(self.wrong_step("answer"));
    };
    if self.answers.len() != index {
      // last answer is already recorded and the result is being prepared
      return Err(FlowError::WrongStep { action: "answer", step: "scoring" });
    }
    let Some(card) = self.questions.get(index) else {
      return Err(FlowError::QuestionsUnavailable(format!("no question at index {index}")));
    };
    if let Some(qid) = question_id {
      if qid != card.id {
        return Err(FlowError::field("question_id", "Ответ относится к другому вопросу"));
      }
    }
    if !card.accepts(&value) {
      return Err(FlowError::field("answer", "Выберите один из вариантов ответа"));
    }
    self.answers.push(Answer { question_id: card.id.clone(), value });

    let next = index + 1;
    if next < self.questions.len() {
      self.step = Step::Question { index: next };
      Ok((self, Progress::Next { index: next }))
    } else {
      Ok((self, Progress::Completed))
    }
  }

  pub fn is_complete(&self) -> bool {
    !self.questions.is_empty() && self.answers.len() == self.questions.len()
  }

  /// `question[N-1] → result`. The submission status is informational only.
  pub fn finish(mut self, outcome: QuizOutcome, submission: SubmissionStatus) -> Result<Self, FlowError> {
    if !matches!(self.step, Step::Question { .. }) || !self.is_complete() {
      return Err(self.wrong_step("finish"));
    }
    self.outcome = Some(outcome);
    self.submission = Some(submission);
    self.step = Step::Result;
    Ok(self)
  }

  /// `result → instruction` for another employee; the lead and contact are kept.
  pub fn assess_another(mut self) -> Result<Self, FlowError> {
    if self.step != Step::Result || !self.quiz.has_instruction() {
      return Err(self.wrong_step("assess_another"));
    }
    self.answers.clear();
    self.employee_name = None;
    self.outcome = None;
    self.submission = None;
    self.assessment_id = Uuid::new_v4();
    self.step = Step::Instruction;
    Ok(self)
  }
}
