//! Service configuration: backend location, per-site tags and endpoint paths.
//!
//! Loaded from the TOML file named by `QUIZ_CONFIG_PATH` (every key optional), then
//! `API_BASE`, `BACKEND_TIMEOUT_SECS` and `SESSION_TTL_SECS` from the environment override it.
//!
//! ```text
//! session_ttl_secs = 3600
//!
//! [backend]
//! base_url = "https://bot.example/api"
//! timeout_secs = 15
//!
//! [formula]
//! source = "formula_bot"
//! require_employee_name = false
//! ```
//!
//! Keys given in a site section override that site's defaults one by one.

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::Site;

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub backend: BackendCfg,
  pub teremok: SiteCfg,
  pub formula: SiteCfg,
  /// Idle sessions are dropped after this long; 0 keeps them until closed.
  pub session_ttl_secs: u64,
}

pub const DEFAULT_SESSION_TTL_SECS: u64 = 2 * 60 * 60;

/// File layout: every section and key may be left out.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
  backend: BackendCfg,
  teremok: SiteOverrides,
  formula: SiteOverrides,
  session_ttl_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BackendCfg {
  pub base_url: String,
  pub timeout_secs: u64,
  pub register_path: String,
}

impl Default for BackendCfg {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000/api".into(),
      timeout_secs: 20,
      register_path: "/lead/register".into(),
    }
  }
}

/// Tags and endpoints for one landing site.
#[derive(Clone, Debug)]
pub struct SiteCfg {
  /// `product` tag sent with the lead.
  pub product: String,
  /// `source` tag sent with the lead.
  pub source: String,
  /// Server-delivered question bank, if the site uses one.
  pub questions_path: Option<String>,
  pub submit_path: String,
  /// Whether the employee name must be filled before the assessment starts.
  pub require_employee_name: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SiteOverrides {
  product: Option<String>,
  source: Option<String>,
  questions_path: Option<String>,
  submit_path: Option<String>,
  require_employee_name: Option<bool>,
}

impl SiteCfg {
  pub fn teremok() -> Self {
    Self {
      product: "teremok".into(),
      source: "terem_landing".into(),
      questions_path: Some("/teremok/questions".into()),
      submit_path: "/test/submit".into(),
      require_employee_name: true,
    }
  }

  pub fn formula() -> Self {
    Self {
      product: "formula".into(),
      source: "formula_landing".into(),
      questions_path: None,
      submit_path: "/formula/rsp/submit".into(),
      require_employee_name: true,
    }
  }

  fn merged(mut self, o: SiteOverrides) -> Self {
    if let Some(v) = o.product { self.product = v; }
    if let Some(v) = o.source { self.source = v; }
    if let Some(v) = o.questions_path { self.questions_path = Some(v); }
    if let Some(v) = o.submit_path { self.submit_path = v; }
    if let Some(v) = o.require_employee_name { self.require_employee_name = v; }
    self
  }
}

impl AppConfig {
  /// Defaults for both sites and a local backend.
  pub fn defaults() -> Self {
    Self {
      backend: BackendCfg::default(),
      teremok: SiteCfg::teremok(),
      formula: SiteCfg::formula(),
      session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
    }
  }

  pub fn site(&self, site: Site) -> &SiteCfg {
    match site {
      Site::Teremok => &self.teremok,
      Site::Formula => &self.formula,
    }
  }

  /// Parse TOML; missing sections and keys fall back to defaults.
  pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
    let file = toml::from_str::<ConfigFile>(s)?;
    Ok(Self {
      backend: file.backend,
      teremok: SiteCfg::teremok().merged(file.teremok),
      formula: SiteCfg::formula().merged(file.formula),
      session_ttl_secs: file.session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS),
    })
  }

  /// File (if any) + environment overrides. Read or parse failures are logged and ignored.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_else(AppConfig::defaults);
    if let Ok(base) = std::env::var("API_BASE") {
      cfg.backend.base_url = base;
    }
    if let Ok(raw) = std::env::var("BACKEND_TIMEOUT_SECS") {
      match raw.parse::<u64>() {
        Ok(secs) => cfg.backend.timeout_secs = secs,
        Err(e) => warn!(target: "quiz_backend", %raw, error = %e, "Ignoring BACKEND_TIMEOUT_SECS"),
      }
    }
    if let Ok(raw) = std::env::var("SESSION_TTL_SECS") {
      match raw.parse::<u64>() {
        Ok(secs) => cfg.session_ttl_secs = secs,
        Err(e) => warn!(target: "quiz_backend", %raw, error = %e, "Ignoring SESSION_TTL_SECS"),
      }
    }
    cfg.backend.base_url = cfg.backend.base_url.trim_end_matches('/').to_string();
    cfg
  }
}

/// Attempt to load `AppConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match AppConfig::from_toml(&s) {
      Ok(cfg) => {
        info!(target: "quiz_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quiz_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quiz_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_gives_defaults() {
    let cfg = AppConfig::from_toml("").unwrap();
    assert_eq!(cfg.backend.base_url, "http://localhost:8000/api");
    assert_eq!(cfg.teremok.submit_path, "/test/submit");
    assert_eq!(cfg.formula.submit_path, "/formula/rsp/submit");
    assert_eq!(cfg.site(Site::Teremok).questions_path.as_deref(), Some("/teremok/questions"));
  }

  #[test]
  fn partial_sections_are_merged() {
    let cfg = AppConfig::from_toml(
      r#"
      [backend]
      base_url = "https://bot.example/api"

      [formula]
      require_employee_name = false
      "#,
    )
    .unwrap();
    assert_eq!(cfg.backend.base_url, "https://bot.example/api");
    assert_eq!(cfg.backend.timeout_secs, 20);
    assert!(!cfg.formula.require_employee_name);
    assert_eq!(cfg.formula.product, "formula");
    assert_eq!(cfg.formula.source, "formula_landing");
    assert_eq!(cfg.formula.submit_path, "/formula/rsp/submit");
    assert_eq!(cfg.teremok.product, "teremok");
    assert_eq!(cfg.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
  }

  #[test]
  fn single_site_key_overrides_only_that_key() {
    let cfg = AppConfig::from_toml("session_ttl_secs = 60\n\n[teremok]\nsource = \"terem_bot\"\n").unwrap();
    assert_eq!(cfg.teremok.source, "terem_bot");
    assert_eq!(cfg.teremok.product, "teremok");
    assert_eq!(cfg.teremok.questions_path.as_deref(), Some("/teremok/questions"));
    assert!(cfg.teremok.require_employee_name);
    assert_eq!(cfg.session_ttl_secs, 60);
  }
}
