use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PainelError, Result};

pub const CONFIG_DIR_ENV: &str = "PAINEL_CONFIG_DIR";
pub const API_URL_ENV: &str = "PAINEL_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("painel")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn session_path() -> PathBuf {
    config_dir().join("session.json")
}

pub fn log_path() -> PathBuf {
    config_dir().join("painel.log")
}

/// Read a JSON file, falling back to the type's default when the file is
/// missing or unreadable.
fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = std::fs::read_to_string(path).unwrap_or_default();
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            T::default()
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PainelError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Settings from disk, with `PAINEL_API_URL` taking precedence.
pub fn load_settings() -> Settings {
    let mut settings: Settings = load_json(&settings_path());
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            settings.api_url = url;
        }
    }
    settings
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_json(&settings_path(), settings)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    User,
    Assessor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessorOrganization {
    pub id: i64,
    pub name: String,
}

impl AssessorOrganization {
    /// Parse the `ID=NAME` form used on the command line.
    pub fn parse(s: &str) -> Result<Self> {
        let (id, name) = s
            .split_once('=')
            .ok_or_else(|| PainelError::Settings(format!("expected ID=NAME, got '{s}'")))?;
        let id = id
            .trim()
            .parse()
            .map_err(|_| PainelError::Settings(format!("invalid organization id '{id}'")))?;
        Ok(Self {
            id,
            name: name.trim().to_string(),
        })
    }
}

/// Authenticated context handed to the API client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub assessor_organizations: Vec<AssessorOrganization>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Switch the active organization. Assessors may only pick one of the
    /// organizations they were granted.
    pub fn use_organization(&mut self, id: i64) -> Result<()> {
        match self.profile {
            Profile::Assessor => {
                let org = self
                    .assessor_organizations
                    .iter()
                    .find(|o| o.id == id)
                    .ok_or(PainelError::UnknownOrganization(id))?;
                self.organization_name = Some(org.name.clone());
            }
            Profile::User => {
                if self.organization_id != Some(id) {
                    self.organization_name = None;
                }
            }
        }
        self.organization_id = Some(id);
        Ok(())
    }

    /// Token with everything but the last four characters hidden.
    pub fn masked_token(&self) -> String {
        match self.token.as_deref() {
            None | Some("") => "(none)".to_string(),
            Some(t) => {
                let chars: Vec<char> = t.chars().collect();
                let keep = chars.len().min(4);
                let tail: String = chars[chars.len() - keep..].iter().collect();
                format!("{}{tail}", "*".repeat(chars.len() - keep))
            }
        }
    }
}

pub fn load_session() -> Session {
    load_json(&session_path())
}

pub fn save_session(session: &Session) -> Result<()> {
    save_json(&session_path(), session)
}

pub fn clear_session() -> Result<()> {
    let path = session_path();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
