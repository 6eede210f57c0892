use uuid::Uuid;

use crate::model::{NewNote, Note, NotePatch, PrivacyLevel};

/// The persisted-field values a draft is compared against. `None` means the
/// draft has never been saved, so any non-blank content counts as unsaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub privacy_level: PrivacyLevel,
    pub is_encrypted: bool,
}

impl From<&Note> for FieldSnapshot {
    fn from(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            content: note.content.clone(),
            category_id: note.category_id,
            privacy_level: note.privacy_level,
            is_encrypted: note.is_encrypted,
        }
    }
}

/// Working copy of a note while the editor is open. Holds the editable fields
/// plus the snapshot they are diffed against; everything else (timestamps,
/// status) stays with the remote row.
#[derive(Debug, Clone)]
pub struct Draft {
    pub note_id: Option<Uuid>,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub privacy_level: PrivacyLevel,
    pub is_encrypted: bool,
    snapshot: Option<FieldSnapshot>,
}

impl Draft {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            note_id: None,
            user_id,
            title: String::new(),
            content: String::new(),
            category_id: None,
            privacy_level: PrivacyLevel::default(),
            is_encrypted: false,
            snapshot: None,
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            note_id: Some(note.id),
            user_id: note.user_id,
            title: note.title.clone(),
            content: note.content.clone(),
            category_id: note.category_id,
            privacy_level: note.privacy_level,
            is_encrypted: note.is_encrypted,
            snapshot: Some(FieldSnapshot::from(note)),
        }
    }

    fn fields(&self) -> FieldSnapshot {
        FieldSnapshot {
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id,
            privacy_level: self.privacy_level,
            is_encrypted: self.is_encrypted,
        }
    }

    /// Dirty means some field differs from the last persisted snapshot. A
    /// never-saved draft is dirty once it carries any non-blank text.
    pub fn is_dirty(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => self.fields() != *snapshot,
            None => !self.is_blank(),
        }
    }

    /// Blank drafts are never sent to the remote.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    /// Reconcile after a successful save so the current field values become
    /// the clean baseline.
    pub fn reconcile(&mut self, saved: &Note) {
        self.note_id = Some(saved.id);
        self.snapshot = Some(FieldSnapshot::from(saved));
    }

    pub fn to_new_note(&self) -> NewNote {
        NewNote {
            user_id: self.user_id,
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id,
            privacy_level: self.privacy_level,
            is_encrypted: self.is_encrypted,
        }
    }

    pub fn to_patch(&self) -> NotePatch {
        NotePatch {
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id,
            privacy_level: self.privacy_level,
            is_encrypted: self.is_encrypted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn note(title: &str, content: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            category_id: None,
            privacy_level: PrivacyLevel::Private,
            is_encrypted: false,
            status: Default::default(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn new_draft_is_clean_until_it_has_text() {
        let mut draft = Draft::new(Uuid::new_v4());
        assert!(!draft.is_dirty());
        draft.title = "  ".into();
        assert!(!draft.is_dirty());
        draft.content = "hello".into();
        assert!(draft.is_dirty());
    }

    #[test]
    fn editing_back_to_the_snapshot_clears_dirty() {
        let source = note("T", "C");
        let mut draft = Draft::from_note(&source);
        assert!(!draft.is_dirty());
        draft.content = "C2".into();
        assert!(draft.is_dirty());
        draft.content = "C".into();
        assert!(!draft.is_dirty());
    }

    #[test]
    fn reconcile_adopts_the_saved_row_as_baseline() {
        let mut draft = Draft::new(Uuid::new_v4());
        draft.title = "T".into();
        let saved = note("T", "");
        draft.reconcile(&saved);
        assert_eq!(draft.note_id, Some(saved.id));
        assert!(!draft.is_dirty());
    }
}
