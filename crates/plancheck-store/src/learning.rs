//! Learned synonyms and corrections, persisted to a flat JSON file.
//!
//! The file is the whole state: every teach operation rewrites it through a
//! temp file in the same directory and an atomic rename, so a failed write
//! never truncates what was there. One writer at a time is assumed; two
//! processes teaching concurrently will lose updates (last write wins).
//!
//! File layout:
//!
//! ```json
//! {
//!   "synonyms": { "tpa": ["Claims Payor"] },
//!   "corrections": { "adminstrator": "Administrator" },
//!   "learning_history": [
//!     { "timestamp": "...", "action": "synonym_added", "term": "tpa", "value": "Claims Payor", "actor": "alice" }
//!   ]
//! }
//! ```
//!
//! Keys are stored normalized ([`normalize_term`]); values keep their display
//! case. Unknown top-level keys are carried through load and save untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use plancheck_core::{clean_display, normalize_term};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningAction {
    SynonymAdded,
    CorrectionAdded,
}

impl LearningAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SynonymAdded => "synonym_added",
            Self::CorrectionAdded => "correction_added",
        }
    }
}

/// One audit-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// ISO 8601 timestamp string.
    pub timestamp: String,
    pub action: LearningAction,
    pub term: String,
    pub value: String,
    #[serde(alias = "user")]
    pub actor: String,
}

/// Serialized form of the learning file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    /// normalized term → learned alternate terms (display form, unique by normalized form)
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// normalized incorrect term → correct term (display form)
    #[serde(default)]
    pub corrections: BTreeMap<String, String>,
    #[serde(default, rename = "learning_history")]
    pub history: Vec<HistoryEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LearningState {
    /// Re-key a state read from disk so hand-edited or older files obey the
    /// normalization rule.
    fn normalized(self) -> Self {
        let mut synonyms: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (term, list) in self.synonyms {
            let key = normalize_term(&term);
            if key.is_empty() {
                continue;
            }
            let entry = synonyms.entry(key).or_default();
            for synonym in list {
                let synonym = clean_display(&synonym);
                if !synonym.is_empty() && !contains_term(entry, &synonym) {
                    entry.push(synonym);
                }
            }
        }
        synonyms.retain(|_, list| !list.is_empty());

        let corrections = self
            .corrections
            .into_iter()
            .map(|(k, v)| (normalize_term(&k), clean_display(&v)))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();

        Self {
            synonyms,
            corrections,
            history: self.history,
            extra: self.extra,
        }
    }
}

fn contains_term(list: &[String], term: &str) -> bool {
    let key = normalize_term(term);
    list.iter().any(|t| normalize_term(t) == key)
}

/// Learned knowledge bound to its backing file.
///
/// Passed by reference to the validator; only the `add_*` methods mutate it,
/// and each of them persists before returning.
#[derive(Debug, Clone)]
pub struct LearningStore {
    path: PathBuf,
    state: LearningState,
}

impl LearningStore {
    /// An empty store that will persist to `path` on the first teach.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: LearningState::default(),
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing (or blank) file yields an empty store. Content that is not a
    /// valid learning file is [`StoreError::CorruptState`].
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "no learning file; starting empty");
            return Ok(Self::new(path));
        }
        let bytes = std::fs::read(path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new(path));
        }
        let state: LearningState =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::CorruptState {
                path: path.to_path_buf(),
                source,
            })?;
        let store = Self {
            path: path.to_path_buf(),
            state: state.normalized(),
        };
        info!(
            path = %path.display(),
            synonyms = store.synonym_count(),
            corrections = store.correction_count(),
            "loaded learning file"
        );
        Ok(store)
    }

    /// Load, or start empty when the file cannot be used.
    ///
    /// The returned error (if any) is the reason the store was rebuilt and
    /// should be shown to the user. A corrupt file is copied aside to
    /// `<path>.corrupt` first so the next save does not destroy it.
    pub fn load_or_rebuild(path: &Path) -> (Self, Option<StoreError>) {
        match Self::load(path) {
            Ok(store) => (store, None),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "learning file unusable; starting with empty learned mappings");
                if matches!(err, StoreError::CorruptState { .. }) {
                    let backup = backup_path(path);
                    match std::fs::copy(path, &backup) {
                        Ok(_) => warn!(backup = %backup.display(), "corrupt learning file copied aside"),
                        Err(e) => warn!(error = %e, "could not copy corrupt learning file aside"),
                    }
                }
                (Self::new(path), Some(err))
            }
        }
    }

    /// Learn `synonym` as an alternate term for `term`.
    ///
    /// Returns `false` (and writes nothing) when the synonym is already known.
    pub fn add_synonym(&mut self, term: &str, synonym: &str, actor: &str) -> Result<bool, StoreError> {
        let key = normalize_term(term);
        let synonym = clean_display(synonym);
        if key.is_empty() || synonym.is_empty() {
            return Err(StoreError::InvalidTerm(
                "term and synonym must not be empty".into(),
            ));
        }
        if self
            .state
            .synonyms
            .get(&key)
            .is_some_and(|list| contains_term(list, &synonym))
        {
            debug!(term = %key, synonym = %synonym, "synonym already known");
            return Ok(false);
        }

        let mut next = self.state.clone();
        next.synonyms
            .entry(key.clone())
            .or_default()
            .push(synonym.clone());
        next.history.push(history_entry(
            LearningAction::SynonymAdded,
            &key,
            &synonym,
            actor,
        ));
        self.commit(next)?;

        info!(term = %key, synonym = %synonym, actor, "learned synonym");
        Ok(true)
    }

    /// Learn that `incorrect` should read `correct`. Replaces any earlier
    /// correction for the same term.
    pub fn add_correction(&mut self, incorrect: &str, correct: &str, actor: &str) -> Result<(), StoreError> {
        let key = normalize_term(incorrect);
        let correct = clean_display(correct);
        if key.is_empty() || correct.is_empty() {
            return Err(StoreError::InvalidTerm(
                "incorrect and correct terms must not be empty".into(),
            ));
        }
        if key == normalize_term(&correct) {
            return Err(StoreError::InvalidTerm(format!(
                "correction maps '{correct}' to itself"
            )));
        }

        let mut next = self.state.clone();
        if let Some(previous) = next.corrections.insert(key.clone(), correct.clone()) {
            debug!(term = %key, previous = %previous, "replacing correction");
        }
        next.history.push(history_entry(
            LearningAction::CorrectionAdded,
            &key,
            &correct,
            actor,
        ));
        self.commit(next)?;

        info!(term = %key, correct = %correct, actor, "learned correction");
        Ok(())
    }

    /// The corrected form of `term`, or `term` unchanged. Single hop: a
    /// correction's target is not itself corrected.
    pub fn resolve(&self, term: &str) -> String {
        self.state
            .corrections
            .get(&normalize_term(term))
            .cloned()
            .unwrap_or_else(|| term.to_string())
    }

    /// Learned synonyms for `term`; empty when none.
    pub fn synonyms_of(&self, term: &str) -> BTreeSet<String> {
        self.state
            .synonyms
            .get(&normalize_term(term))
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    /// The last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> &[HistoryEntry] {
        let h = &self.state.history;
        &h[h.len().saturating_sub(n)..]
    }

    pub fn synonym_count(&self) -> usize {
        self.state.synonyms.values().map(Vec::len).sum()
    }

    pub fn correction_count(&self) -> usize {
        self.state.corrections.len()
    }

    pub fn state(&self) -> &LearningState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next`, then adopt it. On failure the in-memory state and the
    /// file on disk both stay as they were.
    fn commit(&mut self, next: LearningState) -> Result<(), StoreError> {
        write_atomic(&self.path, &next)?;
        self.state = next;
        Ok(())
    }
}

fn history_entry(action: LearningAction, term: &str, value: &str, actor: &str) -> HistoryEntry {
    HistoryEntry {
        timestamp: Utc::now().to_rfc3339(),
        action,
        term: term.to_string(),
        value: value.to_string(),
        actor: actor.to_string(),
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".corrupt");
    PathBuf::from(os)
}

/// Serialize to a temp file beside `path`, fsync, and rename over `path`.
fn write_atomic(path: &Path, state: &LearningState) -> Result<(), StoreError> {
    let fail = |source: std::io::Error| StoreError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(fail)?;

    let json = serde_json::to_vec_pretty(state).map_err(|e| fail(std::io::Error::other(e)))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(&json).map_err(fail)?;
    tmp.write_all(b"\n").map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;

    debug!(path = %path.display(), bytes = json.len(), "wrote learning file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> LearningStore {
        LearningStore::load(&dir.path().join("learned_mappings.json")).unwrap()
    }

    #[test]
    fn missing_file_is_empty_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert_eq!(store.synonym_count(), 0);
        assert_eq!(store.correction_count(), 0);
        assert!(store.history().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn correction_round_trip_through_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        store
            .add_correction("Adminstrator", "Administrator", "alice")
            .unwrap();
        assert_eq!(store.resolve("Adminstrator"), "Administrator");

        let reloaded = store_in(&tmp);
        assert_eq!(reloaded.resolve("Adminstrator"), "Administrator");
        assert_eq!(reloaded.resolve("  adminstrator "), "Administrator");
        assert_eq!(reloaded.history().len(), 1);
        assert_eq!(reloaded.history()[0].action, LearningAction::CorrectionAdded);
        assert_eq!(reloaded.history()[0].actor, "alice");
    }

    #[test]
    fn resolve_passes_unknown_terms_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert_eq!(store.resolve("Plan Supervisor "), "Plan Supervisor ");
    }

    #[test]
    fn correction_last_write_wins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        store.add_correction("Admin", "Administrator", "a").unwrap();
        store.add_correction("admin", "Plan Administrator", "b").unwrap();
        assert_eq!(store.resolve("Admin"), "Plan Administrator");
        assert_eq!(store.correction_count(), 1);
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn correction_to_itself_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        let err = store.add_correction("TPA", " tpa", "a").unwrap_err();
        assert!(matches!(err, StoreError::InvalidTerm(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn synonym_added_and_normalized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        assert!(store.add_synonym("TPA", "Claims  Payor", "alice").unwrap());

        let syns = store.synonyms_of(" tpa ");
        assert_eq!(syns.len(), 1);
        assert!(syns.contains("Claims Payor"));
        assert_eq!(store.state().synonyms.keys().next().unwrap(), "tpa");
    }

    #[test]
    fn duplicate_synonym_is_noop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        assert!(store.add_synonym("TPA", "Claims Payor", "a").unwrap());
        assert!(!store.add_synonym("tpa", "claims payor", "b").unwrap());
        assert_eq!(store.synonym_count(), 1);
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn synonyms_of_unknown_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(store_in(&tmp).synonyms_of("COBRA").is_empty());
    }

    #[test]
    fn empty_terms_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        assert!(matches!(
            store.add_synonym(" ", "x", "a"),
            Err(StoreError::InvalidTerm(_))
        ));
        assert!(matches!(
            store.add_correction("x", "", "a"),
            Err(StoreError::InvalidTerm(_))
        ));
    }

    #[test]
    fn corrupt_file_is_corrupt_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned_mappings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = LearningStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::CorruptState { .. }));
    }

    #[test]
    fn corrupt_file_rebuilds_empty_with_warning() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned_mappings.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let (store, warning) = LearningStore::load_or_rebuild(&path);
        assert!(matches!(warning, Some(StoreError::CorruptState { .. })));
        assert_eq!(store.synonym_count(), 0);
        assert_eq!(store.path(), path);

        let backup = tmp.path().join("learned_mappings.json.corrupt");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "[1, 2, 3]");
    }

    #[test]
    fn invalid_utf8_is_corrupt_and_survives_next_save() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned_mappings.json");
        let garbage: &[u8] = &[b'{', b' ', 0xff, 0xfe, b' ', b'}'];
        std::fs::write(&path, garbage).unwrap();

        assert!(matches!(
            LearningStore::load(&path),
            Err(StoreError::CorruptState { .. })
        ));

        let (mut store, warning) = LearningStore::load_or_rebuild(&path);
        assert!(matches!(warning, Some(StoreError::CorruptState { .. })));
        store.add_synonym("TPA", "Claims Payor", "alice").unwrap();

        let backup = tmp.path().join("learned_mappings.json.corrupt");
        assert_eq!(std::fs::read(backup).unwrap(), garbage);
    }

    #[test]
    fn healthy_file_rebuild_has_no_warning() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned_mappings.json");
        let (_, warning) = LearningStore::load_or_rebuild(&path);
        assert!(warning.is_none());
    }

    #[test]
    fn blank_file_is_empty_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned_mappings.json");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(LearningStore::load(&path).unwrap().correction_count(), 0);
    }

    #[test]
    fn reads_legacy_file_and_keeps_unknown_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned_mappings.json");
        std::fs::write(
            &path,
            r#"{
                "synonyms": {"Claims Administrator": ["Claims Payor", "claims payor"]},
                "corrections": {"Adminstrator": "Administrator"},
                "custom_rules": [{"rule": "keep me"}],
                "learning_history": [
                    {"timestamp": "2025-01-15T10:30:00.123456", "action": "synonym_added",
                     "term": "Claims Administrator", "value": "Claims Payor", "user": "bob"}
                ]
            }"#,
        )
        .unwrap();

        let mut store = LearningStore::load(&path).unwrap();
        assert_eq!(store.synonyms_of("claims administrator").len(), 1);
        assert_eq!(store.resolve("adminstrator"), "Administrator");
        assert_eq!(store.history()[0].actor, "bob");

        store.add_synonym("TPA", "Payor", "carol").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["custom_rules"][0]["rule"], "keep me");
        assert_eq!(json["learning_history"].as_array().unwrap().len(), 2);
        assert_eq!(json["learning_history"][1]["actor"], "carol");
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        store.add_synonym("TPA", "Payor", "a").unwrap();
        store.add_correction("Payer", "Payor", "a").unwrap();
        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn creates_missing_parent_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("state").join("learned.json");
        let mut store = LearningStore::load(&path).unwrap();
        store.add_synonym("TPA", "Payor", "a").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn failed_write_keeps_prior_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A non-empty directory where the file should be: the final rename fails.
        let path = tmp.path().join("learned_mappings.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "prior").unwrap();

        let mut store = LearningStore::new(&path);
        let err = store.add_synonym("TPA", "Payor", "a").unwrap_err();
        assert!(matches!(err, StoreError::Persistence { .. }));

        assert!(store.synonyms_of("TPA").is_empty());
        assert!(store.history().is_empty());
        assert_eq!(
            std::fs::read_to_string(path.join("keep.txt")).unwrap(),
            "prior"
        );
    }

    #[test]
    fn failed_write_keeps_prior_file_contents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        // Parent path is a regular file, so the temp file cannot be created.
        let mut store = LearningStore::new(&blocker.join("learned.json"));
        let err = store.add_correction("a", "b", "a").unwrap_err();
        assert!(matches!(err, StoreError::Persistence { .. }));
        assert_eq!(store.resolve("a"), "a");
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "x");
    }

    #[test]
    fn recent_history_tail() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        for i in 0..5 {
            store
                .add_synonym("TPA", &format!("Payor {i}"), "a")
                .unwrap();
        }
        let recent = store.recent_history(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].value, "Payor 4");
        assert_eq!(store.recent_history(50).len(), 5);
    }
}
