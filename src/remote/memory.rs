//! In-memory stand-in for the hosted table store, used by tests and the
//! documentation examples. It applies [`TableQuery`] filters structurally and
//! emulates the server-side touches the real service performs (generated ids,
//! `created_at`/`updated_at` maintenance).

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::Session;

use super::query::{Direction, Filter, TableQuery};
use super::{AuthStore, RemoteError, TableStore};

#[derive(Debug, Clone)]
struct MemoryUser {
    id: Uuid,
    email: String,
    password: String,
}

#[derive(Default)]
pub struct MemoryRemote {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    users: RwLock<Vec<MemoryUser>>,
    offline: RwLock<bool>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as unreachable, for exercising the
    /// connectivity error path.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if *self.offline.read() {
            Err(RemoteError::Connectivity("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

fn field_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, expected) => {
            field_text(row, column).map(|v| v == *expected).unwrap_or(false)
        }
        Filter::Ilike(column, term) => field_text(row, column)
            .map(|v| v.to_lowercase().contains(&term.to_lowercase()))
            .unwrap_or(false),
        Filter::AnyIlike(columns, term) => columns.iter().any(|column| {
            field_text(row, column)
                .map(|v| v.to_lowercase().contains(&term.to_lowercase()))
                .unwrap_or(false)
        }),
    }
}

/// Chronological for timestamp columns, lexical otherwise. RFC 3339 strings
/// do not sort lexically across fractional-second lengths ("…00Z" would land
/// after "…00.5Z"), so timestamps are parsed before comparing.
fn compare_values(left: &str, right: &str) -> Ordering {
    let parse = |text: &str| OffsetDateTime::parse(text, &Rfc3339).ok();
    match (parse(left), parse(right)) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => left.cmp(right),
    }
}

fn apply_shape(mut rows: Vec<Value>, query: &TableQuery) -> Vec<Value> {
    if let Some(order) = &query.order {
        rows.sort_by(|a, b| {
            let left = field_text(a, &order.column).unwrap_or_default();
            let right = field_text(b, &order.column).unwrap_or_default();
            match order.direction {
                Direction::Ascending => compare_values(&left, &right),
                Direction::Descending => compare_values(&right, &left),
            }
        });
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    rows
}

#[async_trait]
impl TableStore for MemoryRemote {
    async fn select(&self, query: TableQuery) -> Result<Vec<Value>, RemoteError> {
        self.check_online()?;
        let tables = self.tables.read();
        let rows = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(apply_shape(rows, &query))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.check_online()?;
        let Value::Object(mut fields) = row else {
            return Err(RemoteError::Api {
                status: 400,
                message: "row payload must be a JSON object".into(),
            });
        };
        if !fields.contains_key("id") || fields["id"].is_null() {
            fields.insert("id".into(), json!(Uuid::new_v4()));
        }
        let now = now_rfc3339();
        fields.entry("created_at").or_insert_with(|| json!(now));
        fields.insert("updated_at".into(), json!(now));
        let stored = Value::Object(fields);
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, query: TableQuery, patch: Value) -> Result<Vec<Value>, RemoteError> {
        self.check_online()?;
        let Value::Object(patch_fields) = patch else {
            return Err(RemoteError::Api {
                status: 400,
                message: "patch payload must be a JSON object".into(),
            });
        };
        let mut tables = self.tables.write();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            for row in rows.iter_mut() {
                if !query.filters.iter().all(|f| matches(row, f)) {
                    continue;
                }
                if let Value::Object(fields) = row {
                    for (key, value) in &patch_fields {
                        fields.insert(key.clone(), value.clone());
                    }
                    // The real service maintains updated_at with a trigger.
                    fields.insert("updated_at".into(), json!(now_rfc3339()));
                }
                updated.push(row.clone());
            }
        }
        Ok(apply_shape(updated, &query))
    }

    async fn delete(&self, query: TableQuery) -> Result<Vec<Value>, RemoteError> {
        self.check_online()?;
        let mut tables = self.tables.write();
        let mut removed = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            rows.retain(|row| {
                if query.filters.iter().all(|f| matches(row, f)) {
                    removed.push(row.clone());
                    false
                } else {
                    true
                }
            });
        }
        Ok(apply_shape(removed, &query))
    }
}

#[async_trait]
impl AuthStore for MemoryRemote {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        self.check_online()?;
        let mut users = self.users.write();
        if users
            .iter()
            .any(|user| user.email.eq_ignore_ascii_case(email))
        {
            return Err(RemoteError::Api {
                status: 422,
                message: "user already registered".into(),
            });
        }
        let user = MemoryUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let session = Session {
            user_id: user.id,
            email: user.email.clone(),
            access_token: Uuid::new_v4().to_string(),
        };
        users.push(user);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        self.check_online()?;
        let users = self.users.read();
        match users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email) && user.password == password)
        {
            Some(user) => Ok(Session {
                user_id: user.id,
                email: user.email.clone(),
                access_token: Uuid::new_v4().to_string(),
            }),
            None => Err(RemoteError::Api {
                status: 400,
                message: "invalid login credentials".into(),
            }),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let remote = MemoryRemote::new();
        let stored = remote
            .insert("notes", json!({"title": "T", "content": "C"}))
            .await
            .unwrap();
        assert!(stored["id"].is_string());
        assert!(stored["created_at"].is_string());
        assert_eq!(stored["created_at"], stored["updated_at"]);
    }

    #[tokio::test]
    async fn select_applies_eq_and_ilike_filters() {
        let remote = MemoryRemote::new();
        remote
            .insert("notes", json!({"title": "Grocery list", "status": "active"}))
            .await
            .unwrap();
        remote
            .insert("notes", json!({"title": "Passwords", "status": "deleted"}))
            .await
            .unwrap();

        let active = remote
            .select(TableQuery::new("notes").eq("status", "active"))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let grocery = remote
            .select(TableQuery::new("notes").ilike("title", "GROCERY"))
            .await
            .unwrap();
        assert_eq!(grocery.len(), 1);
        assert_eq!(grocery[0]["title"], "Grocery list");
    }

    #[tokio::test]
    async fn any_ilike_matches_either_column() {
        let remote = MemoryRemote::new();
        remote
            .insert("notes", json!({"title": "Plain", "content": "contains needle"}))
            .await
            .unwrap();
        remote
            .insert("notes", json!({"title": "needle title", "content": "plain"}))
            .await
            .unwrap();
        remote
            .insert("notes", json!({"title": "misses", "content": "misses"}))
            .await
            .unwrap();

        let hits = remote
            .select(TableQuery::new("notes").any_ilike(["title", "content"], "needle"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn update_bumps_updated_at_and_returns_matches() {
        let remote = MemoryRemote::new();
        let stored = remote
            .insert("notes", json!({"title": "Old", "status": "active"}))
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let updated = remote
            .update(
                TableQuery::new("notes").eq("id", &id),
                json!({"title": "New"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["title"], "New");
        assert!(updated[0]["updated_at"].as_str() >= stored["updated_at"].as_str());

        let missed = remote
            .update(
                TableQuery::new("notes").eq("id", &id).eq("status", "deleted"),
                json!({"title": "Never"}),
            )
            .await
            .unwrap();
        assert!(missed.is_empty());
    }

    #[tokio::test]
    async fn ordering_is_chronological_across_fraction_lengths() {
        let remote = MemoryRemote::new();
        remote
            .insert(
                "events",
                json!({"title": "whole", "happened_at": "2025-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        remote
            .insert(
                "events",
                json!({"title": "fraction", "happened_at": "2025-01-01T00:00:00.5Z"}),
            )
            .await
            .unwrap();

        let newest_first = remote
            .select(TableQuery::new("events").order("happened_at", Direction::Descending))
            .await
            .unwrap();
        assert_eq!(newest_first[0]["title"], "fraction");
        assert_eq!(newest_first[1]["title"], "whole");
    }

    #[tokio::test]
    async fn offline_mode_reports_connectivity() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);
        let err = remote.select(TableQuery::new("notes")).await.unwrap_err();
        assert!(matches!(err, RemoteError::Connectivity(_)));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let remote = MemoryRemote::new();
        remote.sign_up("a@example.com", "pw").await.unwrap();
        let err = remote.sign_up("A@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 422, .. }));
    }
}
