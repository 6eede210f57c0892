use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{NewNote, Note, NotePatch, NoteStats, NoteStatus, PrivacyLevel};
use crate::remote::{Direction, TableQuery, TableStore};
use crate::validation;

use super::{decode_row, decode_rows};

const NOTES_TABLE: &str = "notes";

/// Filter intents from the notes-list views, translated verbatim into remote
/// query parameters.
#[derive(Debug, Clone, Default)]
pub struct NoteFilters {
    pub category_id: Option<Uuid>,
    pub privacy: Option<PrivacyLevel>,
    pub search: Option<String>,
}

/// Outcome of a soft delete. Deleting an already-deleted or unknown id is an
/// idempotent no-op rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyGone,
}

pub struct NotesService<R> {
    remote: Arc<R>,
}

impl<R> Clone for NotesService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: TableStore> NotesService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    fn active(user_id: Uuid) -> TableQuery {
        TableQuery::new(NOTES_TABLE)
            .eq("user_id", user_id)
            .eq("status", NoteStatus::Active)
    }

    pub async fn list(&self, user_id: Uuid, filters: &NoteFilters) -> ServiceResult<Vec<Note>> {
        let mut query = Self::active(user_id).order("updated_at", Direction::Descending);
        if let Some(category_id) = filters.category_id {
            query = query.eq("category_id", category_id);
        }
        if let Some(privacy) = filters.privacy {
            query = query.eq("privacy_level", privacy);
        }
        if let Some(term) = filters.search.as_deref().map(str::trim) {
            if !term.is_empty() {
                query = query.any_ilike(["title", "content"], term);
            }
        }
        let rows = self
            .remote
            .select(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load notes", err))?;
        decode_rows(rows)
    }

    pub async fn recent(&self, user_id: Uuid, limit: usize) -> ServiceResult<Vec<Note>> {
        let query = Self::active(user_id)
            .order("updated_at", Direction::Descending)
            .limit(limit);
        let rows = self
            .remote
            .select(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load recent notes", err))?;
        decode_rows(rows)
    }

    pub async fn search(&self, user_id: Uuid, term: &str) -> ServiceResult<Vec<Note>> {
        let filters = NoteFilters {
            search: Some(term.to_string()),
            ..Default::default()
        };
        self.list(user_id, &filters).await
    }

    pub async fn get(&self, user_id: Uuid, note_id: Uuid) -> ServiceResult<Note> {
        let query = TableQuery::new(NOTES_TABLE)
            .eq("id", note_id)
            .eq("user_id", user_id);
        let mut rows = self
            .remote
            .select(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load note", err))?;
        match rows.pop() {
            Some(row) => decode_row(row),
            None => Err(ServiceError::NotFound(format!("note {note_id}"))),
        }
    }

    pub async fn create(&self, new: NewNote) -> ServiceResult<Note> {
        validation::validate_note_fields(&new.title, &new.content)?;
        let mut row = serde_json::to_value(&new)?;
        if let Some(fields) = row.as_object_mut() {
            fields.insert("status".into(), serde_json::to_value(NoteStatus::Active)?);
        }
        let stored = self
            .remote
            .insert(NOTES_TABLE, row)
            .await
            .map_err(|err| ServiceError::from_remote("failed to create note", err))?;
        decode_row(stored)
    }

    /// Single atomic upsert of every editable field; the remote owns the
    /// resulting `updated_at`.
    pub async fn update(&self, user_id: Uuid, note_id: Uuid, patch: NotePatch) -> ServiceResult<Note> {
        validation::validate_note_fields(&patch.title, &patch.content)?;
        let query = TableQuery::new(NOTES_TABLE)
            .eq("id", note_id)
            .eq("user_id", user_id);
        let mut rows = self
            .remote
            .update(query, serde_json::to_value(&patch)?)
            .await
            .map_err(|err| ServiceError::from_remote("failed to update note", err))?;
        match rows.pop() {
            Some(row) => decode_row(row),
            None => Err(ServiceError::NotFound(format!("note {note_id}"))),
        }
    }

    pub async fn soft_delete(&self, user_id: Uuid, note_id: Uuid) -> ServiceResult<DeleteOutcome> {
        let query = Self::active(user_id).eq("id", note_id);
        let rows = self
            .remote
            .update(query, serde_json::json!({"status": NoteStatus::Deleted}))
            .await
            .map_err(|err| ServiceError::from_remote("failed to delete note", err))?;
        if rows.is_empty() {
            Ok(DeleteOutcome::AlreadyGone)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }

    pub async fn stats(&self, user_id: Uuid) -> ServiceResult<NoteStats> {
        let rows = self
            .remote
            .select(Self::active(user_id))
            .await
            .map_err(|err| ServiceError::from_remote("failed to load statistics", err))?;
        let notes: Vec<Note> = decode_rows(rows)?;
        Ok(NoteStats {
            total: notes.len(),
            encrypted: notes.iter().filter(|note| note.is_encrypted).count(),
            categorized: notes.iter().filter(|note| note.category_id.is_some()).count(),
            private: notes
                .iter()
                .filter(|note| note.privacy_level == PrivacyLevel::Private)
                .count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use assert_matches::assert_matches;

    fn service() -> (Arc<MemoryRemote>, NotesService<MemoryRemote>, Uuid) {
        let remote = Arc::new(MemoryRemote::new());
        let service = NotesService::new(Arc::clone(&remote));
        (remote, service, Uuid::new_v4())
    }

    fn draft(user_id: Uuid, title: &str, content: &str) -> NewNote {
        NewNote {
            user_id,
            title: title.to_string(),
            content: content.to_string(),
            category_id: None,
            privacy_level: PrivacyLevel::Private,
            is_encrypted: false,
        }
    }

    #[tokio::test]
    async fn create_then_reload_round_trips_fields() {
        let (_remote, service, user_id) = service();
        let created = service.create(draft(user_id, "T", "C")).await.unwrap();

        let reloaded = service.get(user_id, created.id).await.unwrap();
        assert_eq!(reloaded.title, "T");
        assert_eq!(reloaded.content, "C");
        assert_eq!(reloaded.category_id, None);
        assert_eq!(reloaded.privacy_level, PrivacyLevel::Private);
        assert!(reloaded.updated_at >= reloaded.created_at);
    }

    #[tokio::test]
    async fn update_bumps_updated_at() {
        let (_remote, service, user_id) = service();
        let created = service.create(draft(user_id, "T", "C")).await.unwrap();
        let updated = service
            .update(
                user_id,
                created.id,
                NotePatch {
                    title: "T2".into(),
                    content: "C2".into(),
                    category_id: None,
                    privacy_level: PrivacyLevel::Protected,
                    is_encrypted: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "T2");
        assert_eq!(updated.privacy_level, PrivacyLevel::Protected);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn soft_delete_hides_note_and_is_idempotent() {
        let (_remote, service, user_id) = service();
        let created = service.create(draft(user_id, "T", "C")).await.unwrap();

        let first = service.soft_delete(user_id, created.id).await.unwrap();
        assert_eq!(first, DeleteOutcome::Deleted);

        let listed = service.list(user_id, &NoteFilters::default()).await.unwrap();
        assert!(listed.is_empty());

        let second = service.soft_delete(user_id, created.id).await.unwrap();
        assert_eq!(second, DeleteOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn search_matches_title_or_content() {
        let (_remote, service, user_id) = service();
        service
            .create(draft(user_id, "Recipes", "lasagna steps"))
            .await
            .unwrap();
        service
            .create(draft(user_id, "Journal", "tried a new lasagna today"))
            .await
            .unwrap();
        service
            .create(draft(user_id, "Work", "quarterly report"))
            .await
            .unwrap();

        let hits = service.search(user_id, "lasagna").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn recent_applies_the_limit_newest_first() {
        let (_remote, service, user_id) = service();
        service.create(draft(user_id, "first", "x")).await.unwrap();
        service.create(draft(user_id, "second", "y")).await.unwrap();
        let newest = service.create(draft(user_id, "third", "z")).await.unwrap();

        let recent = service.recent(user_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, newest.id);
    }

    #[tokio::test]
    async fn list_is_tenant_scoped() {
        let (_remote, service, user_id) = service();
        service.create(draft(user_id, "Mine", "x")).await.unwrap();
        service
            .create(draft(Uuid::new_v4(), "Theirs", "y"))
            .await
            .unwrap();

        let listed = service.list(user_id, &NoteFilters::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Mine");
    }

    #[tokio::test]
    async fn stats_count_each_dimension() {
        let (_remote, service, user_id) = service();
        let mut encrypted = draft(user_id, "A", "x");
        encrypted.is_encrypted = true;
        service.create(encrypted).await.unwrap();

        let mut categorized = draft(user_id, "B", "y");
        categorized.category_id = Some(Uuid::new_v4());
        categorized.privacy_level = PrivacyLevel::Protected;
        service.create(categorized).await.unwrap();

        let stats = service.stats(user_id).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.encrypted, 1);
        assert_eq!(stats.categorized, 1);
        assert_eq!(stats.private, 1);
    }

    #[tokio::test]
    async fn connectivity_failures_get_the_distinct_message() {
        let (remote, service, user_id) = service();
        remote.set_offline(true);
        let err = service
            .list(user_id, &NoteFilters::default())
            .await
            .unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn missing_note_is_not_found() {
        let (_remote, service, user_id) = service();
        assert_matches!(
            service.get(user_id, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
