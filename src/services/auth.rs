use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{ProfilePatch, Session, UserProfile};
use crate::remote::{AuthStore, TableQuery, TableStore};
use crate::validation;

use super::{decode_row, decode_rows};

const PROFILES_TABLE: &str = "user_profiles";

pub struct AuthService<R> {
    remote: Arc<R>,
}

impl<R> Clone for AuthService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: AuthStore + TableStore> AuthService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Create an account and seed its preferences row. Both inputs are
    /// validated locally before anything is sent.
    pub async fn register(&self, email: &str, password: &str) -> ServiceResult<Session> {
        validation::validate_email(email)?;
        validation::validate_password(password)?;
        let session = self
            .remote
            .sign_up(email.trim(), password)
            .await
            .map_err(|err| ServiceError::from_remote("failed to create account", err))?;

        // The profile row is a convenience; account creation already
        // succeeded, so a failure here only costs the defaults.
        let seed = json!({"user_id": session.user_id});
        if let Err(err) = self.remote.insert(PROFILES_TABLE, seed).await {
            tracing::warn!(user_id = %session.user_id, error = %err, "profile seed failed");
        }
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Session> {
        validation::validate_email(email)?;
        if password.is_empty() {
            return Err(ServiceError::validation("password", "password is required"));
        }
        self.remote
            .sign_in(email.trim(), password)
            .await
            .map_err(|err| ServiceError::from_remote("failed to sign in", err))
    }

    pub async fn sign_out(&self, session: &Session) -> ServiceResult<()> {
        self.remote
            .sign_out(&session.access_token)
            .await
            .map_err(|err| ServiceError::from_remote("failed to sign out", err))
    }

    /// Load the preferences row, falling back to defaults when the seed row
    /// never made it.
    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<UserProfile> {
        let query = TableQuery::new(PROFILES_TABLE).eq("user_id", user_id);
        let rows = self
            .remote
            .select(query)
            .await
            .map_err(|err| ServiceError::from_remote("failed to load profile", err))?;
        let mut profiles: Vec<UserProfile> = decode_rows(rows)?;
        Ok(profiles.pop().unwrap_or(UserProfile {
            user_id,
            display_name: String::new(),
            default_privacy: Default::default(),
            auto_lock_minutes: 0,
            notifications_enabled: true,
        }))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> ServiceResult<UserProfile> {
        let query = TableQuery::new(PROFILES_TABLE).eq("user_id", user_id);
        let mut rows = self
            .remote
            .update(query, serde_json::to_value(&patch)?)
            .await
            .map_err(|err| ServiceError::from_remote("failed to update profile", err))?;
        match rows.pop() {
            Some(row) => decode_row(row),
            None => {
                // First write for a user whose seed row is missing.
                let mut seed = serde_json::to_value(&patch)?;
                if let Some(fields) = seed.as_object_mut() {
                    fields.insert("user_id".into(), json!(user_id));
                }
                let stored = self
                    .remote
                    .insert(PROFILES_TABLE, seed)
                    .await
                    .map_err(|err| ServiceError::from_remote("failed to update profile", err))?;
                decode_row(stored)
            }
        }
    }
}
