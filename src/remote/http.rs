//! HTTP implementation of the remote collaborator contract, speaking the
//! PostgREST-style row API and the companion auth endpoint.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::RemoteOptions;
use crate::model::Session;

use super::query::TableQuery;
use super::{AuthStore, RemoteError, TableStore};

pub struct RestClient {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct ApiFailure {
    #[serde(alias = "msg", alias = "error_description", alias = "error")]
    message: Option<String>,
}

impl RestClient {
    pub fn new(options: &RemoteOptions) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(options.request_timeout_ms))
            .build()
            .map_err(|err| RemoteError::Connectivity(err.to_string()))?;
        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            anon_key: options.anon_key.clone(),
            access_token: RwLock::new(None),
        })
    }

    /// Attach the bearer token for row-level-security scoped requests.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn map_transport(err: reqwest::Error) -> RemoteError {
        if err.is_connect() || err.is_timeout() {
            RemoteError::Connectivity(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Connectivity(err.to_string())
        }
    }

    async fn into_value(response: Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response.json().await.map_err(Self::map_transport);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiFailure>(&body)
            .ok()
            .and_then(|failure| failure.message)
            .unwrap_or(body);
        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn rows(response: Response) -> Result<Vec<Value>, RemoteError> {
        match Self::into_value(response).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

#[async_trait]
impl TableStore for RestClient {
    async fn select(&self, query: TableQuery) -> Result<Vec<Value>, RemoteError> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(query.to_query_pairs());
        let response = self
            .request(Method::GET, &self.rest_url(&query.table))
            .query(&pairs)
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::rows(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        let response = self
            .request(Method::POST, &self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&vec![row])
            .send()
            .await
            .map_err(Self::map_transport)?;
        let mut rows = Self::rows(response).await?;
        rows.pop().ok_or_else(|| RemoteError::Api {
            status: 500,
            message: "insert returned no representation".into(),
        })
    }

    async fn update(&self, query: TableQuery, patch: Value) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .request(Method::PATCH, &self.rest_url(&query.table))
            .header("Prefer", "return=representation")
            .query(&query.to_query_pairs())
            .json(&patch)
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::rows(response).await
    }

    async fn delete(&self, query: TableQuery) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .request(Method::DELETE, &self.rest_url(&query.table))
            .header("Prefer", "return=representation")
            .query(&query.to_query_pairs())
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::rows(response).await
    }
}

#[async_trait]
impl AuthStore for RestClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("signup"))
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await
            .map_err(Self::map_transport)?;
        let payload = Self::into_value(response).await?;
        let auth: AuthResponse = serde_json::from_value(payload)?;
        Ok(Session {
            user_id: auth.user.id,
            email: auth.user.email,
            access_token: auth.access_token,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("token?grant_type=password"))
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await
            .map_err(Self::map_transport)?;
        let payload = Self::into_value(response).await?;
        let auth: AuthResponse = serde_json::from_value(payload)?;
        Ok(Session {
            user_id: auth.user.id,
            email: auth.user.email,
            access_token: auth.access_token,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::into_value(response).await.map(|_| ())
    }
}
