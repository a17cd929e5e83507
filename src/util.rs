//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Trim and strip angle brackets from free-text form input.
pub fn sanitize_text(text: &str) -> String {
  text.trim().replace(['<', '>'], "")
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) { cut -= 1; }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Identifiers from the backend arrive as numbers or strings; keep them as text.
pub fn id_to_string(v: &serde_json::Value) -> Option<String> {
  match v {
    serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
    serde_json::Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_all_keys() {
    assert_eq!(fill_template("{name} — {title}", &[("name", "И.И."), ("title", "Статусник")]), "И.И. — Статусник");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ошибка сервера";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('о'));
    assert!(t.ends_with(&format!("({} bytes total)", s.len())));
    assert_eq!(trunc_for_log("ok", 10), "ok");
  }

  #[test]
  fn ids_accept_numbers_and_strings() {
    assert_eq!(id_to_string(&serde_json::json!(7)).as_deref(), Some("7"));
    assert_eq!(id_to_string(&serde_json::json!("q7")).as_deref(), Some("q7"));
    assert_eq!(id_to_string(&serde_json::json!(null)), None);
  }
}
