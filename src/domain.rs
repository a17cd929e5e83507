//! Domain models shared by the scoring engine, the flow controller and the wire layer:
//! sites and quiz variants, the lead contact, UTM tracking, answers and question cards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which landing site a session belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Site {
  Teremok,
  Formula,
}

impl Site {
  pub fn as_str(self) -> &'static str {
    match self {
      Site::Teremok => "teremok",
      Site::Formula => "formula",
    }
  }
}

/// Quiz variants offered by the two sites.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Quiz {
  /// Teremok "types" test. Bank is delivered by the backend, scoring happens server-side.
  TeremokTypes,
  /// Formula team mini-quiz (choice questions, teaser result).
  TeamMini,
  /// Formula full team diagnostic (1–5 ratings, rescaled to 0–100).
  TeamFull,
  /// Formula employee assessment (7 A/B/C questions, discrete tally).
  Employee,
}

impl Quiz {
  pub fn site(self) -> Site {
    match self {
      Quiz::TeremokTypes => Site::Teremok,
      Quiz::TeamMini | Quiz::TeamFull | Quiz::Employee => Site::Formula,
    }
  }

  /// Only the employee assessment passes through the `instruction` step.
  pub fn has_instruction(self) -> bool {
    matches!(self, Quiz::Employee)
  }

  pub fn server_delivered_bank(self) -> bool {
    matches!(self, Quiz::TeremokTypes)
  }
}

/// Role of the person filling the contact form.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
  #[serde(rename = "Собственник бизнеса")]
  Owner,
  #[serde(rename = "Руководитель отдела продаж")]
  SalesHead,
  #[serde(rename = "Коммерческий директор")]
  CommercialDirector,
  #[serde(rename = "HR-менеджер")]
  HrManager,
  #[serde(rename = "Внутренний тренер")]
  InternalTrainer,
  #[serde(rename = "Топ-менеджер")]
  TopManager,
  #[serde(rename = "Другое")]
  Other,
}

impl Role {
  /// Role code understood by the lead service.
  pub fn backend_code(self) -> &'static str {
    match self {
      Role::Owner => "owner",
      Role::TopManager => "manager",
      Role::SalesHead | Role::CommercialDirector => "sales",
      Role::HrManager | Role::InternalTrainer => "hr",
      Role::Other => "other",
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TeamSize {
  #[serde(rename = "1–10")]
  UpTo10,
  #[serde(rename = "10–50")]
  UpTo50,
  #[serde(rename = "50–100")]
  UpTo100,
  #[serde(rename = "100+")]
  Over100,
}

/// Registered lead contact. Immutable once the session has registered it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Contact {
  pub name: String,
  pub role: Role,
  #[serde(default)] pub company: Option<String>,
  pub team_size: TeamSize,
  /// Phone number or messenger handle.
  pub channel: String,
  #[serde(default)] pub preferred_messenger: Option<String>,
  #[serde(default)] pub comment: Option<String>,
  pub consent: bool,
}

/// Marketing campaign parameters, captured once per session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UtmParams {
  #[serde(skip_serializing_if = "Option::is_none")] pub utm_source: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")] pub utm_medium: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")] pub utm_campaign: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")] pub utm_content: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")] pub utm_term: Option<String>,
}

impl UtmParams {
  /// Extract UTM parameters from the landing page URL. Empty values count as absent.
  pub fn from_page_url(page_url: &str) -> Self {
    let mut utm = UtmParams::default();
    let Ok(url) = reqwest::Url::parse(page_url) else {
      return utm;
    };
    for (k, v) in url.query_pairs() {
      if v.is_empty() { continue; }
      let slot = match k.as_ref() {
        "utm_source" => &mut utm.utm_source,
        "utm_medium" => &mut utm.utm_medium,
        "utm_campaign" => &mut utm.utm_campaign,
        "utm_content" => &mut utm.utm_content,
        "utm_term" => &mut utm.utm_term,
        _ => continue,
      };
      if slot.is_none() {
        *slot = Some(v.into_owned());
      }
    }
    utm
  }
}

/// Lead identifier issued by the lead service, kept in the shape it arrived in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum LeadId {
  Numeric(i64),
  Text(String),
}

impl LeadId {
  /// Numeric strings are normalised to numbers, matching what the results endpoint expects.
  pub fn from_text(s: &str) -> Self {
    match s.trim().parse::<i64>() {
      Ok(n) => LeadId::Numeric(n),
      Err(_) => LeadId::Text(s.to_string()),
    }
  }
}

impl fmt::Display for LeadId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LeadId::Numeric(n) => write!(f, "{n}"),
      LeadId::Text(s) => f.write_str(s),
    }
  }
}

/// A 1–5 scale answer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn new(value: u8) -> Option<Self> {
    (Self::MIN..=Self::MAX).contains(&value).then_some(Rating(value))
  }

  pub fn value(self) -> u8 { self.0 }
}

impl TryFrom<u8> for Rating {
  type Error = String;
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Rating::new(value).ok_or_else(|| format!("rating must be within {}..={}, got {value}", Rating::MIN, Rating::MAX))
  }
}

impl From<Rating> for u8 {
  fn from(r: Rating) -> u8 { r.0 }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
  /// Selected option id (option letter, option index, or bank option id).
  Choice(String),
  Rating(Rating),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
  pub question_id: String,
  pub value: AnswerValue,
}

impl Answer {
  pub fn choice(question_id: impl Into<String>, option_id: impl Into<String>) -> Self {
    Self { question_id: question_id.into(), value: AnswerValue::Choice(option_id.into()) }
  }

  pub fn rating(question_id: impl Into<String>, rating: Rating) -> Self {
    Self { question_id: question_id.into(), value: AnswerValue::Rating(rating) }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardOption {
  pub id: String,
  pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardInput {
  Options { options: Vec<CardOption> },
  Scale { min: u8, max: u8 },
}

/// What the flow shows for one question: id, prompt and the accepted inputs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionCard {
  pub id: String,
  pub text: String,
  #[serde(flatten)]
  pub input: CardInput,
}

impl QuestionCard {
  /// True when `value` is an acceptable answer to this card.
  pub fn accepts(&self, value: &AnswerValue) -> bool {
    match (&self.input, value) {
      (CardInput::Options { options }, AnswerValue::Choice(id)) => options.iter().any(|o| &o.id == id),
      (CardInput::Scale { .. }, AnswerValue::Rating(_)) => true,
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn utm_params_are_read_from_the_page_query() {
    let utm = UtmParams::from_page_url(
      "https://terem.example/?utm_source=vk&utm_medium=cpc&utm_campaign=winter&utm_term=&x=1",
    );
    assert_eq!(utm.utm_source.as_deref(), Some("vk"));
    assert_eq!(utm.utm_medium.as_deref(), Some("cpc"));
    assert_eq!(utm.utm_campaign.as_deref(), Some("winter"));
    assert_eq!(utm.utm_content, None);
    assert_eq!(utm.utm_term, None);
  }

  #[test]
  fn malformed_page_url_yields_no_utm() {
    assert_eq!(UtmParams::from_page_url("not a url"), UtmParams::default());
  }

  #[test]
  fn rating_is_closed_over_one_to_five() {
    assert!(Rating::new(0).is_none());
    assert!(Rating::new(6).is_none());
    assert_eq!(Rating::new(3).map(Rating::value), Some(3));
    assert!(serde_json::from_str::<Rating>("9").is_err());
  }

  #[test]
  fn lead_id_keeps_numbers_numeric_on_the_wire() {
    let id: LeadId = serde_json::from_str("42").unwrap();
    assert_eq!(id, LeadId::Numeric(42));
    assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    assert_eq!(LeadId::from_text("42"), LeadId::Numeric(42));
    assert_eq!(LeadId::from_text("abc"), LeadId::Text("abc".into()));
  }

  #[test]
  fn roles_map_to_backend_codes() {
    let role: Role = serde_json::from_str("\"Коммерческий директор\"").unwrap();
    assert_eq!(role.backend_code(), "sales");
    assert_eq!(Role::InternalTrainer.backend_code(), "hr");
  }

  #[test]
  fn card_accepts_only_matching_inputs() {
    let card = QuestionCard {
      id: "q1".into(),
      text: "?".into(),
      input: CardInput::Options { options: vec![CardOption { id: "A".into(), text: "a".into() }] },
    };
    assert!(card.accepts(&AnswerValue::Choice("A".into())));
    assert!(!card.accepts(&AnswerValue::Choice("B".into())));
    assert!(!card.accepts(&AnswerValue::Rating(Rating::new(2).unwrap())));
  }
}
