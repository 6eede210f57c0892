use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Category, CategoryPatch, CategoryWithCount, NewCategory, Note, NoteStatus};
use crate::remote::{Direction, TableQuery, TableStore};
use crate::validation;

use super::{decode_row, decode_rows};

const CATEGORIES_TABLE: &str = "categories";
const NOTES_TABLE: &str = "notes";

pub const DEFAULT_COLOR: &str = "#3b82f6";
pub const DEFAULT_ICON: &str = "Tag";

pub struct CategoriesService<R> {
    remote: Arc<R>,
}

impl<R> Clone for CategoriesService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: TableStore> CategoriesService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Category>> {
        let query = TableQuery::new(CATEGORIES_TABLE)
            .eq("user_id", user_id)
            .order("name", Direction::Ascending);
        let rows = self
            .remote
            .select(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load categories", err))?;
        decode_rows(rows)
    }

    pub async fn get(&self, user_id: Uuid, category_id: Uuid) -> ServiceResult<Category> {
        let query = TableQuery::new(CATEGORIES_TABLE)
            .eq("id", category_id)
            .eq("user_id", user_id);
        let mut rows = self
            .remote
            .select(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load category", err))?;
        match rows.pop() {
            Some(row) => decode_row(row),
            None => Err(ServiceError::NotFound(format!("category {category_id}"))),
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        color: Option<String>,
        icon: Option<String>,
    ) -> ServiceResult<Category> {
        validation::validate_category_name(name)?;
        let new = NewCategory {
            user_id,
            name: name.trim().to_string(),
            color: color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            icon: icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        };
        let stored = self
            .remote
            .insert(CATEGORIES_TABLE, serde_json::to_value(&new)?)
            .await
            .map_err(|err| ServiceError::from_remote("failed to create category", err))?;
        decode_row(stored)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        patch: CategoryPatch,
    ) -> ServiceResult<Category> {
        if let Some(name) = patch.name.as_deref() {
            validation::validate_category_name(name)?;
        }
        let query = TableQuery::new(CATEGORIES_TABLE)
            .eq("id", category_id)
            .eq("user_id", user_id);
        let mut rows = self
            .remote
            .update(query, serde_json::to_value(&patch)?)
            .await
            .map_err(|err| ServiceError::from_remote("failed to update category", err))?;
        match rows.pop() {
            Some(row) => decode_row(row),
            None => Err(ServiceError::NotFound(format!("category {category_id}"))),
        }
    }

    /// Physical removal; notes keep their dangling `category_id` and simply
    /// render as uncategorized, matching the remote schema's behavior.
    pub async fn delete(&self, user_id: Uuid, category_id: Uuid) -> ServiceResult<()> {
        let query = TableQuery::new(CATEGORIES_TABLE)
            .eq("id", category_id)
            .eq("user_id", user_id);
        let removed = self
            .remote
            .delete(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to delete category", err))?;
        if removed.is_empty() {
            Err(ServiceError::NotFound(format!("category {category_id}")))
        } else {
            Ok(())
        }
    }

    /// Categories joined with their active-note counts. The count is derived
    /// client-side from a single active-notes query.
    pub async fn list_with_counts(&self, user_id: Uuid) -> ServiceResult<Vec<CategoryWithCount>> {
        let categories = self.list(user_id).await?;
        let notes_query = TableQuery::new(NOTES_TABLE)
            .eq("user_id", user_id)
            .eq("status", NoteStatus::Active);
        let rows = self
            .remote
            .select(notes_query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load categories with counts", err))?;
        let notes: Vec<Note> = decode_rows(rows)?;

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for note in &notes {
            if let Some(category_id) = note.category_id {
                *counts.entry(category_id).or_default() += 1;
            }
        }
        Ok(categories
            .into_iter()
            .map(|category| {
                let note_count = counts.get(&category.id).copied().unwrap_or(0);
                CategoryWithCount {
                    category,
                    note_count,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewNote, PrivacyLevel};
    use crate::remote::MemoryRemote;
    use crate::services::NotesService;
    use assert_matches::assert_matches;

    fn service() -> (Arc<MemoryRemote>, CategoriesService<MemoryRemote>, Uuid) {
        let remote = Arc::new(MemoryRemote::new());
        let service = CategoriesService::new(Arc::clone(&remote));
        (remote, service, Uuid::new_v4())
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let (_remote, service, user_id) = service();
        let created = service.create(user_id, "Ideas", None, None).await.unwrap();
        assert_eq!(created.color, DEFAULT_COLOR);
        assert_eq!(created.icon, DEFAULT_ICON);
        assert_eq!(created.name, "Ideas");
    }

    #[tokio::test]
    async fn list_orders_by_name() {
        let (_remote, service, user_id) = service();
        service.create(user_id, "Work", None, None).await.unwrap();
        service.create(user_id, "Ideas", None, None).await.unwrap();
        let listed = service.list(user_id).await.unwrap();
        let names: Vec<_> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ideas", "Work"]);
    }

    #[tokio::test]
    async fn counts_only_active_notes_in_the_category() {
        let (remote, service, user_id) = service();
        let category = service.create(user_id, "Ideas", None, None).await.unwrap();
        let notes = NotesService::new(Arc::clone(&remote));

        let mut filed = NewNote {
            user_id,
            title: "one".into(),
            content: "x".into(),
            category_id: Some(category.id),
            privacy_level: PrivacyLevel::Private,
            is_encrypted: false,
        };
        let kept = notes.create(filed.clone()).await.unwrap();
        filed.title = "two".into();
        let dropped = notes.create(filed.clone()).await.unwrap();
        notes.soft_delete(user_id, dropped.id).await.unwrap();

        filed.title = "uncategorized".into();
        filed.category_id = None;
        notes.create(filed).await.unwrap();

        let counted = service.list_with_counts(user_id).await.unwrap();
        assert_eq!(counted.len(), 1);
        assert_eq!(counted[0].note_count, 1);
        assert_eq!(counted[0].category.id, category.id);
        let _ = kept;
    }

    #[tokio::test]
    async fn delete_of_unknown_category_is_not_found() {
        let (_remote, service, user_id) = service();
        assert_matches!(
            service.delete(user_id, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn blank_names_are_rejected_locally() {
        let (remote, service, user_id) = service();
        remote.set_offline(true);
        // Offline: a validation failure proves no network call was attempted.
        assert_matches!(
            service.create(user_id, "   ", None, None).await,
            Err(ServiceError::Validation { .. })
        );
    }
}
