//! Field-level validation of the contact form.
//!
//! Errors are keyed by form field so the page can render them next to the input.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::domain::Contact;
use crate::protocol::ContactForm;
use crate::util::sanitize_text;

pub type FieldErrors = BTreeMap<&'static str, String>;

fn name_re() -> &'static Regex {
  static RE: OnceCell<Regex> = OnceCell::new();
  RE.get_or_init(|| Regex::new(r"^[а-яА-ЯёЁa-zA-Z\s-]+$").expect("name pattern"))
}

fn phone_re() -> &'static Regex {
  static RE: OnceCell<Regex> = OnceCell::new();
  RE.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern"))
}

fn messenger_re() -> &'static Regex {
  static RE: OnceCell<Regex> = OnceCell::new();
  RE.get_or_init(|| Regex::new(r"^@[a-zA-Z0-9_]{5,}$").expect("messenger pattern"))
}

/// Phone number (separators allowed) or `@handle`.
pub fn is_valid_channel(value: &str) -> bool {
  let value = value.trim();
  let digits: String = value.chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')')).collect();
  phone_re().is_match(&digits) || messenger_re().is_match(value)
}

fn non_empty(s: &Option<String>) -> Option<String> {
  s.as_deref().map(sanitize_text).filter(|s| !s.is_empty())
}

/// Validate the raw form and build an immutable `Contact`.
pub fn validate_contact(form: &ContactForm) -> Result<Contact, FieldErrors> {
  let mut errors = FieldErrors::new();

  let name = non_empty(&form.name);
  match &name {
    None => { errors.insert("name", "Имя обязательно для заполнения".into()); }
    Some(n) if !name_re().is_match(n) => { errors.insert("name", "Имя должно содержать только буквы".into()); }
    Some(_) => {}
  }

  if form.role.is_none() {
    errors.insert("role", "Выберите вашу роль".into());
  }
  if form.team_size.is_none() {
    errors.insert("team_size", "Укажите размер команды".into());
  }

  let channel = non_empty(&form.phone_or_messenger);
  match &channel {
    None => { errors.insert("phone_or_messenger", "Укажите телефон или Telegram".into()); }
    Some(c) if !is_valid_channel(c) => {
      errors.insert("phone_or_messenger", "Введите корректный телефон (+7...) или Telegram (@username)".into());
    }
    Some(_) => {}
  }

  if !form.consent {
    errors.insert("consent", "Подтвердите согласие на обработку данных.".into());
  }

  match (name, form.role, form.team_size, channel) {
    (Some(name), Some(role), Some(team_size), Some(channel)) if errors.is_empty() => Ok(Contact {
      name,
      role,
      company: non_empty(&form.company),
      team_size,
      channel,
      preferred_messenger: non_empty(&form.messenger),
      comment: non_empty(&form.comment),
      consent: true,
    }),
    _ => Err(errors),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Role, TeamSize};

  fn form() -> ContactForm {
    ContactForm {
      name: Some("Иван Петров".into()),
      role: Some(Role::Owner),
      company: Some("  ООО <Пример> ".into()),
      team_size: Some(TeamSize::UpTo50),
      phone_or_messenger: Some("+7 (999) 123-45-67".into()),
      messenger: None,
      comment: Some("   ".into()),
      consent: true,
    }
  }

  #[test]
  fn valid_form_builds_contact() {
    let c = validate_contact(&form()).unwrap();
    assert_eq!(c.name, "Иван Петров");
    assert_eq!(c.company.as_deref(), Some("ООО Пример"));
    assert_eq!(c.comment, None);
    assert!(c.consent);
  }

  #[test]
  fn channel_accepts_phone_or_handle() {
    assert!(is_valid_channel("+375291234567"));
    assert!(is_valid_channel("8 (029) 123-45-67"));
    assert!(is_valid_channel("@team_lead"));
    assert!(!is_valid_channel("@abc"));
    assert!(!is_valid_channel("12345"));
  }

  #[test]
  fn every_bad_field_is_reported() {
    let bad = ContactForm {
      name: Some("R2D2".into()),
      role: None,
      team_size: None,
      phone_or_messenger: Some("call me".into()),
      consent: false,
      ..form()
    };
    let errors = validate_contact(&bad).unwrap_err();
    let fields: Vec<_> = errors.keys().copied().collect();
    assert_eq!(fields, vec!["consent", "name", "phone_or_messenger", "role", "team_size"]);
    assert_eq!(errors["name"], "Имя должно содержать только буквы");
  }

  #[test]
  fn blank_name_is_required_error() {
    let errors = validate_contact(&ContactForm { name: Some("  ".into()), ..form() }).unwrap_err();
    assert_eq!(errors["name"], "Имя обязательно для заполнения");
  }
}
