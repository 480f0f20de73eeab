//! The constraint store: single owner of the constraint list and the
//! document, with a pluggable persistence backend.
//!
//! The store rehydrates from its backend when opened and saves after every
//! mutation. Callers never trigger persistence themselves.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::{write_atomic, Constraint, NewConstraint, ProjectState, Result};

/// Fixed namespace the persisted state is stored under.
pub const STORAGE_KEY: &str = "prism-storage";

/// Where the store's state lives between runs.
pub trait StateBackend {
    /// Load previously saved state. `Ok(None)` means nothing was saved yet.
    fn load(&self) -> Result<Option<ProjectState>>;

    /// Replace the saved state.
    fn save(&self, state: &ProjectState) -> Result<()>;
}

/// JSON blob `{ constraints, markdown }` at `<dir>/prism-storage.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backend rooted at the Prism data directory.
    pub fn default_location() -> Self {
        Self::new(crate::prism_dir())
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(Self::file_name())
    }

    /// Where an unreadable state file is moved aside.
    pub fn quarantine_path(&self) -> PathBuf {
        self.dir.join(format!("{}.corrupt", Self::file_name()))
    }

    fn file_name() -> String {
        format!("{}.json", STORAGE_KEY)
    }
}

impl StateBackend for FileBackend {
    fn load(&self) -> Result<Option<ProjectState>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // Keep the bytes around; the next save would overwrite them
                let aside = self.quarantine_path();
                match fs::rename(&path, &aside) {
                    Ok(()) => tracing::warn!(path = %aside.display(), "moved unreadable state file aside"),
                    Err(io) => tracing::warn!(error = %io, "could not move unreadable state file aside"),
                }
                Err(e.into())
            }
        }
    }

    fn save(&self, state: &ProjectState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.dir, &Self::file_name(), &json)?;
        Ok(())
    }
}

/// Keeps the last saved state in memory. Clones share the same slot, so a
/// test can hold one handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    saved: Arc<Mutex<Option<ProjectState>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that already holds `state`, as if saved by an earlier run.
    pub fn with_state(state: ProjectState) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Some(state))),
        }
    }

    pub fn saved(&self) -> Option<ProjectState> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ProjectState>> {
        self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<ProjectState>> {
        Ok(self.saved())
    }

    fn save(&self, state: &ProjectState) -> Result<()> {
        *self.slot() = Some(state.clone());
        Ok(())
    }
}

/// Source of truth for constraints and document text.
#[derive(Debug)]
pub struct SpecStore<B: StateBackend = FileBackend> {
    state: ProjectState,
    backend: B,
}

impl<B: StateBackend> SpecStore<B> {
    /// Open the store, rehydrating from `backend`. Unreadable state is
    /// logged and replaced by defaults.
    pub fn open(backend: B) -> Self {
        let state = match backend.load() {
            Ok(Some(state)) => {
                tracing::debug!(constraints = state.constraints.len(), "rehydrated project state");
                state
            }
            Ok(None) => ProjectState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable project state");
                ProjectState::default()
            }
        };
        Self { state, backend }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.state.constraints
    }

    pub fn markdown(&self) -> &str {
        &self.state.markdown
    }

    /// Append one constraint, assigning it a fresh id.
    pub fn add_constraint(&mut self, new: NewConstraint) -> &Constraint {
        let index = self.state.constraints.len();
        self.state.constraints.push(Constraint::from_new(new));
        self.persist();
        &self.state.constraints[index]
    }

    /// Append several constraints in order. Returns how many were added.
    pub fn add_constraints(&mut self, batch: Vec<NewConstraint>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let added = batch.len();
        self.state
            .constraints
            .extend(batch.into_iter().map(Constraint::from_new));
        self.persist();
        added
    }

    /// Replace the whole list. Empty or repeated ids are replaced with
    /// fresh ones so ids stay unique within the store.
    pub fn set_constraints(&mut self, mut constraints: Vec<Constraint>) {
        ensure_unique_ids(&mut constraints);
        self.state.constraints = constraints;
        self.persist();
    }

    pub fn clear_constraints(&mut self) {
        self.state.constraints.clear();
        self.persist();
    }

    pub fn set_markdown(&mut self, markdown: impl Into<String>) {
        self.state.markdown = markdown.into();
        self.persist();
    }

    /// Replace constraints and document together.
    pub fn replace(&mut self, mut state: ProjectState) {
        ensure_unique_ids(&mut state.constraints);
        self.state = state;
        self.persist();
    }

    /// Back to an empty constraint list and the placeholder document.
    pub fn reset(&mut self) {
        self.state = ProjectState::default();
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.backend.save(&self.state) {
            tracing::warn!(error = %e, "failed to persist project state");
        }
    }
}

/// Keep the first occurrence of each non-empty id; mint new ids for the rest.
pub(crate) fn ensure_unique_ids(constraints: &mut [Constraint]) {
    let mut seen = HashSet::new();
    for c in constraints.iter_mut() {
        if c.id.is_empty() || !seen.insert(c.id.clone()) {
            c.id = uuid::Uuid::new_v4().to_string();
            seen.insert(c.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoreError, DEFAULT_MARKDOWN};

    /// Accepts nothing; every save fails.
    struct ReadOnlyBackend;

    impl StateBackend for ReadOnlyBackend {
        fn load(&self) -> Result<Option<ProjectState>> {
            Ok(None)
        }

        fn save(&self, _: &ProjectState) -> Result<()> {
            Err(CoreError::Io(std::io::Error::other("disk full")))
        }
    }

    fn constraint(id: &str, content: &str) -> Constraint {
        Constraint {
            id: id.to_string(),
            category: "UI".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn fresh_store_has_defaults() {
        let store = SpecStore::open(MemoryBackend::new());
        assert!(store.constraints().is_empty());
        assert_eq!(store.markdown(), DEFAULT_MARKDOWN);
    }

    #[test]
    fn mutations_are_saved() {
        let backend = MemoryBackend::new();
        let mut store = SpecStore::open(backend.clone());

        let id = store
            .add_constraint(NewConstraint::new("Auth", "Password must be 8 chars"))
            .id
            .clone();
        store.set_markdown("# Draft");

        let saved = backend.saved().unwrap();
        assert_eq!(saved.constraints.len(), 1);
        assert_eq!(saved.constraints[0].id, id);
        assert_eq!(saved.markdown, "# Draft");
    }

    #[test]
    fn batch_append_preserves_order() {
        let mut store = SpecStore::open(MemoryBackend::new());
        let added = store.add_constraints(vec![
            NewConstraint::general("first"),
            NewConstraint::new("UI", "second"),
        ]);
        assert_eq!(added, 2);
        let contents: Vec<_> = store.constraints().iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert_eq!(store.add_constraints(Vec::new()), 0);
    }

    #[test]
    fn reset_restores_defaults_from_any_state() {
        let mut store = SpecStore::open(MemoryBackend::new());
        store.add_constraint(NewConstraint::general("x"));
        store.set_markdown("");
        store.reset();
        assert!(store.constraints().is_empty());
        assert_eq!(store.markdown(), DEFAULT_MARKDOWN);
    }

    #[test]
    fn clear_keeps_document() {
        let mut store = SpecStore::open(MemoryBackend::new());
        store.add_constraint(NewConstraint::general("x"));
        store.set_markdown("# Kept");
        store.clear_constraints();
        assert!(store.constraints().is_empty());
        assert_eq!(store.markdown(), "# Kept");
    }

    #[test]
    fn file_backend_rehydrates_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SpecStore::open(FileBackend::new(dir.path()));
            store.add_constraint(NewConstraint::new("UI", "Button is blue"));
            store.set_markdown("# Spec");
        }
        assert!(dir.path().join("prism-storage.json").exists());

        let store = SpecStore::open(FileBackend::new(dir.path()));
        assert_eq!(store.constraints().len(), 1);
        assert_eq!(store.constraints()[0].category, "UI");
        assert_eq!(store.markdown(), "# Spec");
    }

    #[test]
    fn corrupt_file_opens_with_defaults_and_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        std::fs::write(backend.path(), "{not json").unwrap();

        let mut store = SpecStore::open(backend.clone());
        assert!(store.constraints().is_empty());
        assert_eq!(store.markdown(), DEFAULT_MARKDOWN);

        store.set_markdown("# Fresh");
        assert_eq!(
            std::fs::read_to_string(backend.quarantine_path()).unwrap(),
            "{not json"
        );
    }

    #[test]
    fn failed_save_still_applies_mutation() {
        let mut store = SpecStore::open(ReadOnlyBackend);
        store.add_constraint(NewConstraint::general("Works offline"));
        store.set_markdown("# Draft");
        assert_eq!(store.constraints().len(), 1);
        assert_eq!(store.markdown(), "# Draft");

        store.reset();
        assert!(store.constraints().is_empty());
    }

    #[test]
    fn set_constraints_replaces_list_with_unique_ids() {
        let backend = MemoryBackend::new();
        let mut store = SpecStore::open(backend.clone());
        store.add_constraint(NewConstraint::general("old"));

        store.set_constraints(vec![
            constraint("a", "Button is blue"),
            constraint("a", "Dark mode"),
            constraint("", "Large fonts"),
        ]);

        let ids: Vec<_> = store.constraints().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids[0], "a");
        assert_ne!(ids[1], "a");
        assert!(!ids[2].is_empty());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);

        let contents: Vec<_> = store.constraints().iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["Button is blue", "Dark mode", "Large fonts"]);
        assert_eq!(backend.saved().unwrap().constraints, store.constraints());
    }
}
