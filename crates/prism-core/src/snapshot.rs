//! Portable project files: export the store's state, import it back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::store::{ensure_unique_ids, SpecStore, StateBackend};
use crate::{write_atomic, Constraint, ProjectState, DEFAULT_CATEGORY};

/// Format version written into every exported file.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// The exported project file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct ProjectSnapshot {
    pub constraints: Vec<Constraint>,
    /// The specification document (Markdown with Mermaid blocks)
    pub markdown: String,
    /// Export time, RFC 3339 in UTC
    pub timestamp: String,
    pub version: String,
}

impl ProjectSnapshot {
    pub fn capture(state: &ProjectState, now: DateTime<Utc>) -> Self {
        Self {
            constraints: state.constraints.clone(),
            markdown: state.markdown.clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Download name for an export made at `now`, e.g. `prism-project-2026-10-15.json`.
    pub fn file_name(now: DateTime<Utc>) -> String {
        format!("prism-project-{}.json", now.format("%Y-%m-%d"))
    }

    /// JSON Schema describing the project file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(ProjectSnapshot)
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid project file: not valid JSON ({0})")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid project file: expected a JSON object")]
    NotAnObject,

    #[error("invalid project file: missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid project file: `{field}` {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("could not read project file: {0}")]
    Io(#[from] std::io::Error),
}

/// Constraint entry as found in a project file. Hand-edited or older files
/// may lack ids or categories.
#[derive(Deserialize)]
struct ImportedConstraint {
    #[serde(default)]
    id: Option<String>,
    /// Anything but a non-blank string falls back to the default category.
    #[serde(default)]
    category: Option<Value>,
    content: String,
}

/// Validate a project file and turn it into state. Nothing is applied here.
pub fn parse_snapshot(raw: &str) -> Result<ProjectState, ImportError> {
    let value: Value = serde_json::from_str(raw)?;
    let obj = value.as_object().ok_or(ImportError::NotAnObject)?;

    let constraints = obj
        .get("constraints")
        .filter(|v| !v.is_null())
        .ok_or(ImportError::MissingField("constraints"))?;
    let markdown = obj
        .get("markdown")
        .filter(|v| !v.is_null())
        .ok_or(ImportError::MissingField("markdown"))?
        .as_str()
        .ok_or_else(|| ImportError::InvalidField {
            field: "markdown",
            reason: "must be a string".to_string(),
        })?;

    let entries: Vec<ImportedConstraint> = serde_json::from_value(constraints.clone())
        .map_err(|e| ImportError::InvalidField {
            field: "constraints",
            reason: e.to_string(),
        })?;

    Ok(ProjectState {
        constraints: assign_ids(entries),
        markdown: markdown.to_string(),
    })
}

/// Keep ids that are present and unique; mint new ones otherwise.
fn assign_ids(entries: Vec<ImportedConstraint>) -> Vec<Constraint> {
    let mut constraints: Vec<Constraint> = entries
        .into_iter()
        .map(|entry| Constraint {
            id: entry.id.unwrap_or_default(),
            category: entry
                .category
                .as_ref()
                .and_then(Value::as_str)
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            content: entry.content,
        })
        .collect();
    ensure_unique_ids(&mut constraints);
    constraints
}

/// Write the export file into `dir` and return its path.
pub fn export_to_dir(
    state: &ProjectState,
    dir: &Path,
    now: DateTime<Utc>,
) -> crate::Result<PathBuf> {
    let snapshot = ProjectSnapshot::capture(state, now);
    let json = snapshot.to_json()?;
    write_atomic(dir, &ProjectSnapshot::file_name(now), &json)
}

impl<B: StateBackend> SpecStore<B> {
    pub fn export_snapshot(&self, now: DateTime<Utc>) -> ProjectSnapshot {
        ProjectSnapshot::capture(self.state(), now)
    }

    /// Replace constraints and document from a project file. On any error
    /// the store is left untouched.
    pub fn import_snapshot(&mut self, raw: &str) -> Result<usize, ImportError> {
        let state = parse_snapshot(raw)?;
        let count = state.constraints.len();
        self.replace(state);
        tracing::info!(constraints = count, "imported project");
        Ok(count)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<usize, ImportError> {
        let raw = std::fs::read_to_string(path)?;
        self.import_snapshot(&raw)
    }
}
