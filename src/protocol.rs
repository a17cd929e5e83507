//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! The landing page renders `SessionView` and nothing else, so the two can evolve separately.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AnswerValue, Quiz, QuestionCard, Rating, Role, Site, TeamSize};
use crate::flow::{FlowError, Notice, QuizOutcome, SessionState, Step, SubmissionStatus};
use crate::validation::FieldErrors;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    CreateSession {
        #[serde(flatten)]
        input: CreateSessionIn,
    },
    View {
        session_id: Uuid,
    },
    Contact {
        session_id: Uuid,
        #[serde(flatten)]
        form: ContactForm,
    },
    Open {
        session_id: Uuid,
    },
    Instruction {
        session_id: Uuid,
        #[serde(default)]
        employee_name: String,
    },
    Answer {
        session_id: Uuid,
        #[serde(flatten)]
        answer: AnswerIn,
    },
    Again {
        session_id: Uuid,
    },
    Close {
        session_id: Uuid,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionView,
    },
    Closed {
        session_id: Uuid,
    },
    Error {
        #[serde(flatten)]
        error: ErrorBody,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct CreateSessionIn {
    pub quiz: Quiz,
    /// Browser-local storage key; a lead registered under it is not asked for contacts again.
    #[serde(default)]
    pub client_key: Option<String>,
    /// Landing page URL, the source of UTM parameters.
    #[serde(default)]
    pub page_url: Option<String>,
}

/// Raw contact form as submitted by the page. Validated into `domain::Contact`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub company: Option<String>,
    pub team_size: Option<TeamSize>,
    pub phone_or_messenger: Option<String>,
    /// Preferred messenger, when the page offers a choice.
    pub messenger: Option<String>,
    pub comment: Option<String>,
    pub consent: bool,
}

#[derive(Debug, Deserialize)]
pub struct InstructionIn {
    #[serde(default)]
    pub employee_name: String,
}

/// One answer: an option id for choice cards, a 1–5 `value` for scale cards.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AnswerIn {
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub option_id: Option<String>,
    #[serde(default)]
    pub value: Option<u8>,
}

impl AnswerIn {
    pub fn into_value(self) -> Result<AnswerValue, FlowError> {
        match (self.option_id, self.value) {
            (Some(option), None) => Ok(AnswerValue::Choice(option)),
            (None, Some(v)) => Rating::new(v)
                .map(AnswerValue::Rating)
                .ok_or_else(|| FlowError::field("value", format!("Оценка должна быть от {} до {}", Rating::MIN, Rating::MAX))),
            _ => Err(FlowError::field("answer", "Выберите один из вариантов ответа")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressView {
    /// Zero-based index of the card on screen.
    pub index: usize,
    pub total: usize,
}

/// Everything the page needs to render the current step.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub quiz: Quiz,
    pub site: Site,
    #[serde(flatten)]
    pub step: Step,
    pub notice: Option<Notice>,
    pub registered: bool,
    pub assessment_id: Uuid,
    pub employee_name: Option<String>,
    pub question: Option<QuestionCard>,
    pub progress: Option<ProgressView>,
    pub outcome: Option<QuizOutcome>,
    pub submission: Option<SubmissionStatus>,
}

impl From<&SessionState> for SessionView {
    fn from(s: &SessionState) -> Self {
        let progress = match s.step {
            Step::Question { index } => Some(ProgressView { index, total: s.questions.len() }),
            _ => None,
        };
        Self {
            id: s.id,
            quiz: s.quiz,
            site: s.quiz.site(),
            step: s.step,
            notice: s.notice,
            registered: s.is_registered(),
            assessment_id: s.assessment_id,
            employee_name: s.employee_name.clone(),
            question: s.current_card().cloned(),
            progress,
            outcome: s.outcome.clone(),
            submission: s.submission.clone(),
        }
    }
}

/// Error body shared by HTTP responses and WS `error` messages.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl From<&FlowError> for ErrorBody {
    fn from(e: &FlowError) -> Self {
        let error = match e {
            FlowError::Validation(_) => "validation",
            FlowError::Registration(_) => "registration",
            FlowError::WrongStep { .. } => "wrong_step",
            FlowError::Busy => "busy",
            FlowError::UnknownSession(_) => "unknown_session",
            FlowError::QuestionsUnavailable(_) => "questions_unavailable",
        };
        let fields = match e {
            FlowError::Validation(f) => Some(f.clone()),
            _ => None,
        };
        Self { error, message: e.to_string(), fields }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub sessions: usize,
    pub submissions_delivered: u64,
    pub submissions_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_input_picks_the_matching_kind() {
        let choice = AnswerIn { option_id: Some("B".into()), ..Default::default() };
        assert_eq!(choice.into_value().unwrap(), AnswerValue::Choice("B".into()));

        let rating = AnswerIn { value: Some(4), ..Default::default() };
        assert_eq!(rating.into_value().unwrap(), AnswerValue::Rating(Rating::new(4).unwrap()));

        let out_of_scale = AnswerIn { value: Some(7), ..Default::default() };
        assert!(matches!(out_of_scale.into_value(), Err(FlowError::Validation(f)) if f.contains_key("value")));

        let both = AnswerIn { option_id: Some("A".into()), value: Some(2), ..Default::default() };
        assert!(both.into_value().is_err());
    }

    #[test]
    fn ws_messages_are_tagged_by_type() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"answer","session_id":"6f1f0d7e-8f1c-4b59-9d5b-0a3a3c4b5d6e","option_id":"A"}"#,
        )
        .unwrap();
        match msg {
            ClientWsMessage::Answer { answer, .. } => assert_eq!(answer.option_id.as_deref(), Some("A")),
            other => panic!("unexpected {other:?}"),
        }

        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"contact","session_id":"6f1f0d7e-8f1c-4b59-9d5b-0a3a3c4b5d6e","name":"Анна","consent":true}"#,
        )
        .unwrap();
        match msg {
            ClientWsMessage::Contact { form, .. } => {
                assert_eq!(form.name.as_deref(), Some("Анна"));
                assert!(form.consent);
                assert!(form.role.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let out = serde_json::to_value(ServerWsMessage::Error { error: ErrorBody::from(&FlowError::Busy) }).unwrap();
        assert_eq!(out["type"], "error");
        assert_eq!(out["error"], "busy");
        assert!(out.get("fields").is_none());
    }

    #[test]
    fn view_flattens_the_step() {
        let s = SessionState::new(Quiz::TeamMini, Default::default(), None, None);
        let v = serde_json::to_value(SessionView::from(&s)).unwrap();
        assert_eq!(v["step"], "contact");
        assert_eq!(v["site"], "formula");
        assert_eq!(v["registered"], false);
        assert!(v["question"].is_null());
    }
}
