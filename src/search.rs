//! User search collaborator, used only by the contact-search screen.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{config::AlgoliaConfig, model::User};

pub type Search = Arc<dyn SearchIndex>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search index unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search index answered {status}")]
    Rejected { status: u16 },

    #[error("search query failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Ranked user hits for `text`.
    async fn query(&self, text: &str) -> Result<Vec<User>, SearchError>;
}

/// Searches the `users` table directly: exact name, then name prefix, then
/// any substring of name or email.
pub struct SqliteSearch {
    db_pool: SqlitePool,
    limit: u32,
}

impl SqliteSearch {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool, limit: 20 }
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl SearchIndex for SqliteSearch {
    async fn query(&self, text: &str) -> Result<Vec<User>, SearchError> {
        let escaped = escape_like(text);
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"SELECT uid, email, name, photo_url FROM users
               WHERE name LIKE ?1 ESCAPE '\' OR email LIKE ?1 ESCAPE '\'
               ORDER BY CASE
                   WHEN lower(name) = lower(?2) THEN 0
                   WHEN name LIKE ?3 ESCAPE '\' THEN 1
                   ELSE 2
               END, name
               LIMIT ?4"#,
        )
        .bind(format!("%{escaped}%"))
        .bind(text)
        .bind(format!("{escaped}%"))
        .bind(self.limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(uid, email, name, photo_url)| User { uid, email, name, photo_url })
            .collect())
    }
}

/// Algolia index holding one record per user.
pub struct AlgoliaSearch {
    http: reqwest::Client,
    config: AlgoliaConfig,
}

impl AlgoliaSearch {
    pub fn new(http: reqwest::Client, config: AlgoliaConfig) -> Self {
        Self { http, config }
    }
}

#[derive(Serialize)]
struct AlgoliaQuery<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct AlgoliaResponse {
    hits: Vec<AlgoliaHit>,
}

#[derive(Deserialize)]
struct AlgoliaHit {
    #[serde(rename = "objectID")]
    object_id: String,
    uid: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(rename = "photoURL", default)]
    photo_url: Option<String>,
}

impl From<AlgoliaHit> for User {
    fn from(hit: AlgoliaHit) -> Self {
        User {
            uid: hit.uid.unwrap_or(hit.object_id),
            email: hit.email,
            name: hit.name,
            photo_url: hit.photo_url.filter(|url| !url.is_empty()),
        }
    }
}

#[async_trait]
impl SearchIndex for AlgoliaSearch {
    async fn query(&self, text: &str) -> Result<Vec<User>, SearchError> {
        let url = format!("{}/1/indexes/{}/query", self.config.base_url, self.config.index);
        let response = self
            .http
            .post(url)
            .header("X-Algolia-Application-Id", &self.config.app_id)
            .header("X-Algolia-API-Key", &self.config.api_key)
            .json(&AlgoliaQuery { query: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Rejected { status: response.status().as_u16() });
        }

        let body: AlgoliaResponse = response.json().await?;
        Ok(body.hits.into_iter().map(User::from).collect())
    }
}
