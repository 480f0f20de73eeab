pub mod directives;
pub mod error;
pub mod snapshot;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use error::{CoreError, Result};
pub use snapshot::{ImportError, ProjectSnapshot, SNAPSHOT_VERSION};
pub use store::{FileBackend, MemoryBackend, SpecStore, StateBackend, STORAGE_KEY};

/// Category assigned to constraints that arrive without a usable one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Document text for a fresh or reset project.
pub const DEFAULT_MARKDOWN: &str =
    "# Prism Editor\n\nStart typing your spec here...\n\n```mermaid\ngraph TD;\n  A-->B;\n```";

// --- Types ---

/// A requirement or business rule captured during the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Constraint {
    /// Unique within a project (UUID v4 for generated constraints)
    pub id: String,
    /// Short label used for grouping, e.g. "Auth" or "UI"
    pub category: String,
    /// The rule itself, free text
    pub content: String,
}

impl Constraint {
    /// Assign a fresh id to a constraint that has none yet.
    pub fn from_new(new: NewConstraint) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category: new.category,
            content: new.content,
        }
    }
}

/// A constraint before it has been given an id. This is also the shape sent
/// to the document endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewConstraint {
    pub category: String,
    pub content: String,
}

impl NewConstraint {
    pub fn new(category: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            content: content.into(),
        }
    }

    pub fn general(content: impl Into<String>) -> Self {
        Self::new(DEFAULT_CATEGORY, content)
    }
}

impl From<&Constraint> for NewConstraint {
    fn from(c: &Constraint) -> Self {
        Self::new(c.category.clone(), c.content.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation. Raw content is kept even when it carries
/// a structured constraint block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The synthetic assistant turn every conversation starts with.
    pub fn welcome() -> Self {
        Self {
            id: "welcome".to_string(),
            role: Role::Assistant,
            content: directives::WELCOME_MESSAGE.to_string(),
        }
    }
}

/// Everything the store persists: the constraint list and the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectState {
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default = "default_markdown")]
    pub markdown: String,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            constraints: Vec::new(),
            markdown: default_markdown(),
        }
    }
}

fn default_markdown() -> String {
    DEFAULT_MARKDOWN.to_string()
}

/// Group constraints by category. Groups appear in order of first
/// appearance; members keep insertion order.
pub fn group_by_category(constraints: &[Constraint]) -> Vec<(&str, Vec<&Constraint>)> {
    let mut groups: Vec<(&str, Vec<&Constraint>)> = Vec::new();
    for c in constraints {
        match groups.iter_mut().find(|(cat, _)| *cat == c.category) {
            Some((_, members)) => members.push(c),
            None => groups.push((c.category.as_str(), vec![c])),
        }
    }
    groups
}

// --- Storage ---

/// Resolve the Prism data directory ($PRISM_HOME, else ~/.prism/).
pub fn prism_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("PRISM_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".prism")
}

/// Write `data` to `dir/file_name` via a temp file + rename, so readers never
/// observe a truncated file.
pub fn write_atomic(dir: &Path, file_name: &str, data: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{}.tmp", file_name));
    let path = dir.join(file_name);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

// --- AI Settings ---

/// Environment variables checked, in order, for the hosted model credential.
pub const CREDENTIAL_ENV_VARS: [&str; 3] = [
    "GOOGLE_GENERATIVE_AI_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: default_model(),
        }
    }
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join("settings.json")
}

pub fn read_settings() -> AiSettings {
    read_settings_from(&prism_dir())
}

pub fn read_settings_from(dir: &Path) -> AiSettings {
    let path = settings_path(dir);
    if !path.exists() {
        return AiSettings::default();
    }
    match fs::read_to_string(&path).map(|s| serde_json::from_str(&s)) {
        Ok(Ok(settings)) => settings,
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            AiSettings::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read settings file");
            AiSettings::default()
        }
    }
}

pub fn write_settings(settings: &AiSettings) -> Result<()> {
    write_settings_to(&prism_dir(), settings)
}

pub fn write_settings_to(dir: &Path, settings: &AiSettings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    write_atomic(dir, "settings.json", &json)?;
    Ok(())
}

/// Whether the provider needs a credential at all.
pub fn requires_api_key(settings: &AiSettings) -> bool {
    settings.provider != "ollama"
}

/// The credential to use: the settings file wins, then the environment.
pub fn resolve_api_key(settings: &AiSettings) -> Option<String> {
    resolve_api_key_with(settings, |name| std::env::var(name).ok())
}

pub fn resolve_api_key_with(
    settings: &AiSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if !settings.api_key.is_empty() {
        return Some(settings.api_key.clone());
    }
    CREDENTIAL_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (!requires_api_key(settings) || resolve_api_key(settings).is_some())
}
