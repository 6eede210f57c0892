//! Fallback-draft persistence. Unsaved edits are mirrored to a small local
//! store so a crash or dropped connection loses nothing; records are keyed by
//! the note they shadow and removed once the remote save lands.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::PrivacyLevel;

use super::draft::Draft;

const RECORD_EXTENSION: &str = "json";
const RECORD_TMP_EXTENSION: &str = "json.tmp";

/// Key a fallback draft is filed under. A draft for a note that has never
/// been saved has no id yet, so it gets the per-user `New` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftKey {
    New(Uuid),
    Note(Uuid),
}

impl DraftKey {
    pub fn for_draft(draft: &Draft) -> Self {
        match draft.note_id {
            Some(note_id) => DraftKey::Note(note_id),
            None => DraftKey::New(draft.user_id),
        }
    }

    fn file_stem(&self) -> String {
        match self {
            DraftKey::New(user_id) => format!("new-{user_id}"),
            DraftKey::Note(note_id) => format!("note-{note_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub note_id: Option<Uuid>,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub privacy_level: PrivacyLevel,
    pub is_encrypted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

impl DraftRecord {
    pub fn capture(draft: &Draft) -> Self {
        Self {
            note_id: draft.note_id,
            user_id: draft.user_id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            category_id: draft.category_id,
            privacy_level: draft.privacy_level,
            is_encrypted: draft.is_encrypted,
            saved_at: OffsetDateTime::now_utc(),
        }
    }
}

pub trait DraftStore: Send {
    fn get(&self, key: DraftKey) -> Result<Option<DraftRecord>>;

    fn set(&self, key: DraftKey, record: &DraftRecord) -> Result<()>;

    fn remove(&self, key: DraftKey) -> Result<()>;

    /// All surviving records for a user, newest first.
    fn list(&self, user_id: Uuid) -> Result<Vec<DraftRecord>>;
}

/// File-backed store: one JSON file per record, written atomically through a
/// temp file so a crash mid-write never corrupts an existing record.
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating drafts dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn record_path(&self, key: DraftKey) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXTENSION}", key.file_stem()))
    }

    fn read_record_path(path: &Path) -> Result<DraftRecord> {
        let raw =
            fs::read(path).with_context(|| format!("reading draft {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing draft {}", path.display()))
    }
}

impl DraftStore for FileDraftStore {
    fn get(&self, key: DraftKey) -> Result<Option<DraftRecord>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record_path(&path).map(Some)
    }

    fn set(&self, key: DraftKey, record: &DraftRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("serialising draft record")?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("ensuring drafts dir {}", self.dir.display()))?;
        let final_path = self.record_path(key);
        let tmp_path = final_path.with_extension(RECORD_TMP_EXTENSION);
        fs::write(&tmp_path, &json)
            .with_context(|| format!("writing temporary draft {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("atomically persisting draft {}", final_path.display()))?;
        Ok(())
    }

    fn remove(&self, key: DraftKey) -> Result<()> {
        let path = self.record_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing draft {}", path.display())),
        }
    }

    fn list(&self, user_id: Uuid) -> Result<Vec<DraftRecord>> {
        let dir = match fs::read_dir(&self.dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading drafts dir {}", self.dir.display()))
            }
        };

        let mut records = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(?err, "skipping unreadable draft entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match Self::read_record_path(&path) {
                Ok(record) if record.user_id == user_id => records.push(record),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(?err, "failed to parse draft {}", path.display());
                }
            }
        }

        records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(records)
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryDraftStore {
    records: Mutex<HashMap<String, DraftRecord>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: DraftKey) -> Result<Option<DraftRecord>> {
        Ok(self.records.lock().get(&key.file_stem()).cloned())
    }

    fn set(&self, key: DraftKey, record: &DraftRecord) -> Result<()> {
        self.records.lock().insert(key.file_stem(), record.clone());
        Ok(())
    }

    fn remove(&self, key: DraftKey) -> Result<()> {
        self.records.lock().remove(&key.file_stem());
        Ok(())
    }

    fn list(&self, user_id: Uuid) -> Result<Vec<DraftRecord>> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(user_id: Uuid) -> DraftRecord {
        let mut draft = Draft::new(user_id);
        draft.title = "T".into();
        draft.content = "pending".into();
        DraftRecord::capture(&draft)
    }

    #[test]
    fn file_store_round_trips_and_removes() -> Result<()> {
        let temp = TempDir::new()?;
        let store = FileDraftStore::new(temp.path().join("drafts"))?;
        let user_id = Uuid::new_v4();
        let key = DraftKey::New(user_id);
        let record = sample(user_id);

        store.set(key, &record)?;
        assert_eq!(store.get(key)?, Some(record.clone()));

        let listed = store.list(user_id)?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "pending");

        store.remove(key)?;
        assert_eq!(store.get(key)?, None);
        // Removing again is fine.
        store.remove(key)?;
        Ok(())
    }

    #[test]
    fn list_is_scoped_to_the_user() -> Result<()> {
        let temp = TempDir::new()?;
        let store = FileDraftStore::new(temp.path().to_path_buf())?;
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        store.set(DraftKey::New(mine), &sample(mine))?;
        store.set(DraftKey::New(theirs), &sample(theirs))?;

        assert_eq!(store.list(mine)?.len(), 1);
        Ok(())
    }

    #[test]
    fn write_leaves_no_temp_file_behind() -> Result<()> {
        let temp = TempDir::new()?;
        let store = FileDraftStore::new(temp.path().to_path_buf())?;
        let user_id = Uuid::new_v4();
        store.set(DraftKey::New(user_id), &sample(user_id))?;

        let leftovers: Vec<_> = fs::read_dir(temp.path())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .to_string_lossy()
                    .ends_with(RECORD_TMP_EXTENSION)
            })
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }
}
