//! Client for the external lead/results backend.
//!
//! Four endpoints: lead registration, the teremok question bank, and the two result sinks
//! (`/test/submit` for teremok, `/formula/rsp/submit` for formula). Calls are instrumented and
//! log paths, statuses, and latencies; contact details are never logged.
//!
//! The backend answers with a JSON envelope. `{"status":"error","message":…}` is a rejection
//! regardless of the HTTP status; its message is shown to the user verbatim.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::{BackendCfg, SiteCfg};
use crate::domain::{CardInput, CardOption, Contact, LeadId, QuestionCard, TeamSize, UtmParams};
use crate::scoring::employee::EmployeeProfile;
use crate::scoring::team::Dimension;
use crate::scoring::ScoreSet;
use crate::util::{id_to_string, trunc_for_log};

/// Shown when the request could not be delivered or understood.
pub const GENERIC_SEND_ERROR: &str = "Произошла ошибка при отправке данных. Попробуйте позже.";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("backend HTTP {status}: {body}")]
  Status { status: u16, body: String },

  /// The backend answered with an explicit error message.
  #[error("{0}")]
  Rejected(String),

  #[error("unexpected response: {0}")]
  Decode(String),
}

impl BackendError {
  /// Text for the user: the backend's own message for rejections, a generic one otherwise.
  pub fn user_message(&self) -> String {
    match self {
      BackendError::Rejected(msg) => msg.clone(),
      _ => GENERIC_SEND_ERROR.to_string(),
    }
  }
}

/// Outbound lead registration.
#[derive(Debug, Clone, Serialize)]
pub struct LeadRequest {
  pub name: String,
  /// Backend role code (`owner`, `manager`, `sales`, `hr`, `other`).
  pub role: &'static str,
  pub company: Option<String>,
  pub team_size: TeamSize,
  pub phone_or_messenger: String,
  pub preferred_channel: String,
  pub comment: Option<String>,
  pub consent: bool,
  pub product: String,
  pub source: String,
  #[serde(flatten)]
  pub utm: UtmParams,
}

impl LeadRequest {
  pub fn new(contact: &Contact, site: &SiteCfg, utm: &UtmParams) -> Self {
    Self {
      name: contact.name.clone(),
      role: contact.role.backend_code(),
      company: contact.company.clone(),
      team_size: contact.team_size,
      phone_or_messenger: contact.channel.clone(),
      preferred_channel: contact.preferred_messenger.clone().unwrap_or_else(|| "telegram".into()),
      comment: contact.comment.clone(),
      consent: contact.consent,
      product: site.product.clone(),
      source: site.source.clone(),
      utm: utm.clone(),
    }
  }
}

/// Team answer as stored by the results sheet.
#[derive(Debug, Clone, Serialize)]
pub struct TeamAnswerOut {
  pub question_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamPayload {
  pub answers: Vec<TeamAnswerOut>,
  pub scores: ScoreSet<Dimension>,
  pub dominant_dimension: Dimension,
  pub dominant_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeOut {
  pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeAnswerOut {
  pub question_id: u32,
  pub option: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeePayload {
  pub employee: EmployeeOut,
  pub answers: Vec<EmployeeAnswerOut>,
  pub result: EmployeeProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum FormulaPayload {
  #[serde(rename = "MINI_QUIZ")]
  MiniQuiz(TeamPayload),
  #[serde(rename = "FULL_TEST")]
  FullTest(TeamPayload),
  #[serde(rename = "employee_test")]
  Employee(EmployeePayload),
}

/// `/formula/rsp/submit` body: scores computed here, sent alongside the raw answers.
#[derive(Debug, Clone, Serialize)]
pub struct FormulaSubmission {
  pub user_id: LeadId,
  pub contact: Option<Contact>,
  pub timestamp: DateTime<Utc>,
  #[serde(flatten)]
  pub payload: FormulaPayload,
  #[serde(flatten)]
  pub utm: UtmParams,
}

/// `/test/submit` body: answers keyed by question id, scored by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct TeremokSubmission {
  pub user_id: LeadId,
  /// Option index per question; non-numeric option ids are sent as text.
  pub answers: BTreeMap<String, Value>,
  #[serde(flatten)]
  pub utm: UtmParams,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultSubmission {
  Teremok(TeremokSubmission),
  Formula(FormulaSubmission),
}

impl ResultSubmission {
  pub fn kind(&self) -> &'static str {
    match self {
      ResultSubmission::Teremok(_) => "teremok_test",
      ResultSubmission::Formula(f) => match f.payload {
        FormulaPayload::MiniQuiz(_) => "MINI_QUIZ",
        FormulaPayload::FullTest(_) => "FULL_TEST",
        FormulaPayload::Employee(_) => "employee_test",
      },
    }
  }

  /// Teremok submissions carry the result; formula only needs an accepted request.
  fn requires_status_field(&self) -> bool {
    matches!(self, ResultSubmission::Teremok(_))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResultInfo {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub full_description: Option<String>,
}

/// What the backend said about an accepted submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReceipt {
  pub result_id: Option<String>,
  pub result_type: Option<String>,
  pub result_info: ResultInfo,
}

impl SubmitReceipt {
  fn from_value(v: &Value) -> Self {
    Self {
      result_id: v.get("result_id").and_then(id_to_string),
      result_type: v.get("result_type").and_then(Value::as_str).map(str::to_string),
      result_info: v
        .get("result_info")
        .and_then(|info| serde_json::from_value(info.clone()).ok())
        .unwrap_or_default(),
    }
  }
}

/// The operations the flow needs from the backend.
#[async_trait]
pub trait LeadApi: Send + Sync {
  async fn register_lead(&self, lead: &LeadRequest) -> Result<LeadId, BackendError>;
  async fn fetch_questions(&self, path: &str) -> Result<Vec<QuestionCard>, BackendError>;
  async fn submit_results(&self, path: &str, submission: &ResultSubmission) -> Result<SubmitReceipt, BackendError>;
}

#[derive(Clone)]
pub struct BackendClient {
  pub client: reqwest::Client,
  pub base_url: String,
  pub register_path: String,
}

impl BackendClient {
  pub fn new(cfg: &BackendCfg) -> Result<Self, BackendError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      register_path: cfg.register_path.clone(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// Send and unwrap the JSON envelope.
  /// With `require_success`, a body without `"status":"success"` is a rejection.
  async fn send(&self, req: reqwest::RequestBuilder, require_success: bool) -> Result<Value, BackendError> {
    let res = req.header(USER_AGENT, "quiz-backend/0.1").send().await?;
    let status = res.status();
    let body = res.text().await?;
    let parsed = serde_json::from_str::<Value>(&body).ok();

    if let Some(v) = &parsed {
      let flag = v.get("status").and_then(Value::as_str);
      if flag == Some("error") || (require_success && flag != Some("success")) {
        let msg = v
          .get("message")
          .and_then(Value::as_str)
          .filter(|m| !m.is_empty())
          .unwrap_or("Неизвестная ошибка");
        return Err(BackendError::Rejected(msg.to_string()));
      }
    }
    if !status.is_success() {
      return Err(BackendError::Status { status: status.as_u16(), body: trunc_for_log(&body, 300) });
    }
    match parsed {
      Some(v) => Ok(v),
      None if !require_success => Ok(Value::Null),
      None => Err(BackendError::Decode(format!("non-JSON body: {}", trunc_for_log(&body, 120)))),
    }
  }
}

/// `lead_id`, then `user_id`, then `id`; numbers stay numbers.
fn parse_lead_id(v: &Value) -> Option<LeadId> {
  ["lead_id", "user_id", "id"].iter().find_map(|k| match v.get(*k)? {
    Value::Number(n) => n.as_i64().map(LeadId::Numeric),
    Value::String(s) if !s.trim().is_empty() => Some(LeadId::from_text(s)),
    _ => None,
  })
}

#[derive(Deserialize)]
struct QuestionsEnvelope {
  questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
  id: Value,
  text: String,
  #[serde(default)]
  options: Vec<RawOption>,
}

#[derive(Deserialize)]
struct RawOption {
  text: String,
}

/// Server bank → cards. Option ids are the option indices.
fn parse_questions(v: Value) -> Result<Vec<QuestionCard>, BackendError> {
  let env: QuestionsEnvelope = serde_json::from_value(v).map_err(|e| BackendError::Decode(e.to_string()))?;
  let mut cards = Vec::with_capacity(env.questions.len());
  for q in env.questions {
    let Some(id) = id_to_string(&q.id) else {
      warn!(target: "backend", text = %trunc_for_log(&q.text, 60), "Skipping question without id");
      continue;
    };
    if q.options.is_empty() {
      warn!(target: "backend", %id, "Skipping question without options");
      continue;
    }
    let options = q
      .options
      .into_iter()
      .enumerate()
      .map(|(i, o)| CardOption { id: i.to_string(), text: o.text })
      .collect();
    cards.push(QuestionCard { id, text: q.text, input: CardInput::Options { options } });
  }
  Ok(cards)
}

#[async_trait]
impl LeadApi for BackendClient {
  #[instrument(level = "info", skip(self, lead), fields(product = %lead.product, source = %lead.source))]
  async fn register_lead(&self, lead: &LeadRequest) -> Result<LeadId, BackendError> {
    let start = Instant::now();
    let req = self.client.post(self.url(&self.register_path)).header(CONTENT_TYPE, "application/json").json(lead);
    let result = self.send(req, true).await.and_then(|v| {
      parse_lead_id(&v).ok_or_else(|| BackendError::Decode("registration response carries no lead id".into()))
    });
    let elapsed = start.elapsed();
    match &result {
      Ok(id) => info!(target: "backend", ?elapsed, lead_id = %id, "Lead registered"),
      Err(e) => error!(target: "backend", ?elapsed, error = %e, "Lead registration failed"),
    }
    result
  }

  #[instrument(level = "info", skip(self))]
  async fn fetch_questions(&self, path: &str) -> Result<Vec<QuestionCard>, BackendError> {
    let start = Instant::now();
    let v = self.send(self.client.get(self.url(path)), false).await?;
    let cards = parse_questions(v)?;
    info!(target: "backend", elapsed = ?start.elapsed(), count = cards.len(), "Question bank loaded");
    Ok(cards)
  }

  #[instrument(level = "info", skip(self, submission), fields(kind = submission.kind()))]
  async fn submit_results(&self, path: &str, submission: &ResultSubmission) -> Result<SubmitReceipt, BackendError> {
    let start = Instant::now();
    let req = self.client.post(self.url(path)).header(CONTENT_TYPE, "application/json").json(submission);
    let v = self.send(req, submission.requires_status_field()).await?;
    let receipt = SubmitReceipt::from_value(&v);
    info!(target: "backend", elapsed = ?start.elapsed(), result_type = ?receipt.result_type, "Results accepted");
    Ok(receipt)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Role;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server: &MockServer) -> BackendClient {
    let cfg = BackendCfg { base_url: server.uri(), timeout_secs: 5, register_path: "/lead/register".into() };
    BackendClient::new(&cfg).unwrap()
  }

  fn contact() -> Contact {
    Contact {
      name: "Анна".into(),
      role: Role::HrManager,
      company: None,
      team_size: TeamSize::UpTo10,
      channel: "@anna_hr".into(),
      preferred_messenger: None,
      comment: None,
      consent: true,
    }
  }

  fn lead() -> LeadRequest {
    let utm = UtmParams { utm_source: Some("vk".into()), ..Default::default() };
    LeadRequest::new(&contact(), &SiteCfg::teremok(), &utm)
  }

  #[test]
  fn lead_request_carries_site_tags_and_role_code() {
    let v = serde_json::to_value(lead()).unwrap();
    assert_eq!(v["role"], "hr");
    assert_eq!(v["product"], "teremok");
    assert_eq!(v["source"], "terem_landing");
    assert_eq!(v["preferred_channel"], "telegram");
    assert_eq!(v["team_size"], "1–10");
    assert_eq!(v["utm_source"], "vk");
    assert!(v.get("utm_medium").is_none());
  }

  #[tokio::test]
  async fn numeric_lead_id_is_kept_numeric() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/lead/register"))
      .and(body_partial_json(json!({"product": "teremok", "role": "hr"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "lead_id": 42})))
      .expect(1)
      .mount(&server)
      .await;

    let id = client(&server).register_lead(&lead()).await.unwrap();
    assert_eq!(id, LeadId::Numeric(42));
  }

  #[tokio::test]
  async fn lead_id_falls_back_to_user_id_then_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/lead/register"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "id": "L-7"})))
      .mount(&server)
      .await;

    let id = client(&server).register_lead(&lead()).await.unwrap();
    assert_eq!(id, LeadId::Text("L-7".into()));
  }

  #[tokio::test]
  async fn rejection_message_is_surfaced_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/lead/register"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "error", "message": "duplicate phone"})))
      .mount(&server)
      .await;

    let err = client(&server).register_lead(&lead()).await.unwrap_err();
    assert!(matches!(&err, BackendError::Rejected(m) if m == "duplicate phone"));
    assert_eq!(err.user_message(), "duplicate phone");
  }

  #[tokio::test]
  async fn server_error_without_envelope_gets_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/lead/register"))
      .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
      .mount(&server)
      .await;

    let err = client(&server).register_lead(&lead()).await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 500, .. }));
    assert_eq!(err.user_message(), GENERIC_SEND_ERROR);
  }

  #[tokio::test]
  async fn questions_get_index_option_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teremok/questions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "questions": [
          {"id": 1, "text": "Как вы принимаете решения?", "options": [{"text": "Быстро"}, {"text": "Взвешенно"}]},
          {"id": "q2", "text": "Без вариантов"}
        ]
      })))
      .mount(&server)
      .await;

    let cards = client(&server).fetch_questions("/teremok/questions").await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, "1");
    match &cards[0].input {
      CardInput::Options { options } => {
        assert_eq!(options[1], CardOption { id: "1".into(), text: "Взвешенно".into() });
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn teremok_submission_sends_lead_as_user_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/test/submit"))
      .and(body_partial_json(json!({"user_id": 42, "answers": {"1": 0, "2": 3}})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "result_id": 901,
        "result_type": "builder",
        "result_info": {"title": "Строитель", "description": "Опора команды"}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let submission = ResultSubmission::Teremok(TeremokSubmission {
      user_id: LeadId::Numeric(42),
      answers: BTreeMap::from([("1".to_string(), json!(0)), ("2".to_string(), json!(3))]),
      utm: UtmParams::default(),
    });
    let receipt = client(&server).submit_results("/test/submit", &submission).await.unwrap();
    assert_eq!(receipt.result_id.as_deref(), Some("901"));
    assert_eq!(receipt.result_info.title.as_deref(), Some("Строитель"));
    assert_eq!(receipt.result_info.full_description, None);
  }

  #[tokio::test]
  async fn formula_submission_accepts_bodies_without_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/formula/rsp/submit"))
      .and(body_partial_json(json!({"type": "employee_test", "user_id": "L-7", "employee": {"name": "И.И."}})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Результаты сохранены"})))
      .expect(1)
      .mount(&server)
      .await;

    let answers: Vec<_> = (1..=7).map(|i| crate::domain::Answer::choice(i.to_string(), "A")).collect();
    let submission = ResultSubmission::Formula(FormulaSubmission {
      user_id: LeadId::Text("L-7".into()),
      contact: Some(contact()),
      timestamp: Utc::now(),
      payload: FormulaPayload::Employee(EmployeePayload {
        employee: EmployeeOut { name: Some("И.И.".into()) },
        answers: vec![EmployeeAnswerOut { question_id: 1, option: "A".into() }],
        result: crate::scoring::employee::compute_employee_profile(&answers),
      }),
      utm: UtmParams::default(),
    });
    assert_eq!(submission.kind(), "employee_test");
    let receipt = client(&server).submit_results("/formula/rsp/submit", &submission).await.unwrap();
    assert_eq!(receipt, SubmitReceipt::default());
  }
}
