//! PostgREST-backed implementation of the backend boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error;
use crate::query::{Predicate, QueryDescriptor};

use super::Backend;

/// Client for the Supabase data API (`/rest/v1`).
///
/// Requests carry the anon key; after sign-in the user's access token is
/// used as the bearer so row-level security applies to the signed-in user.
#[derive(Debug, Clone)]
pub struct SupabaseBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    token: Arc<RwLock<Option<String>>>,
}

impl SupabaseBackend {
    pub fn new(config: &Config) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Set or clear the access token used for subsequent requests.
    pub async fn set_token(&self, token: Option<String>) {
        let mut slot = self.token.write().await;
        *slot = token;
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().await;
        let bearer = token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// PostgREST query parameters for a composed descriptor.
    fn render_params(query: &QueryDescriptor) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for predicate in &query.predicates {
            match predicate {
                Predicate::Eq { column, value } => {
                    params.push((column.to_string(), format!("eq.{value}")));
                }
                Predicate::EqBool { column, value } => {
                    params.push((column.to_string(), format!("eq.{value}")));
                }
                Predicate::Search { columns, needle } => {
                    let pattern = sanitize_pattern(needle);
                    let clauses: Vec<String> = columns
                        .iter()
                        .map(|column| format!("{column}.ilike.*{pattern}*"))
                        .collect();
                    params.push(("or".to_string(), format!("({})", clauses.join(","))));
                }
                Predicate::HasTag { column, tag } => {
                    params.push((column.to_string(), format!("cs.{{{tag}}}")));
                }
            }
        }
        params.push((
            "order".to_string(),
            format!(
                "{}.{}",
                query.order_column,
                if query.ascending { "asc" } else { "desc" }
            ),
        ));
        params.push(("limit".to_string(), query.limit.to_string()));
        params.push(("offset".to_string(), query.offset.to_string()));
        params
    }

    async fn check(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth(body)),
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            StatusCode::CONFLICT => Err(Error::Conflict(body)),
            _ => Err(Error::BackendUnavailable(format!("HTTP {status}: {body}"))),
        }
    }

    async fn rows(response: Response) -> Result<Vec<Value>, Error> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| Error::MalformedRecord(e.to_string()))
    }
}

/// PostgREST reserves `,`, `.` and parentheses inside `or=(...)` groups;
/// strip them from user search input rather than attempting to quote.
fn sanitize_pattern(needle: &str) -> String {
    needle
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | '(' | ')' | '%' | '*'))
        .collect()
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn select(&self, query: &QueryDescriptor) -> Result<Vec<Value>, Error> {
        let request = self
            .http
            .get(self.table_url(query.table))
            .query(&Self::render_params(query));
        tracing::debug!(table = query.table, "select");
        let response = self.authorize(request).await.send().await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, Error> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.authorize(request).await.send().await?;
        let mut rows = Self::rows(Self::check(response).await?).await?;
        if rows.is_empty() {
            return Err(Error::MalformedRecord(
                "insert returned no representation".to_string(),
            ));
        }
        Ok(rows.remove(0))
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Option<Value>, Error> {
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.authorize(request).await.send().await?;
        let mut rows = Self::rows(Self::check(response).await?).await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<bool, Error> {
        let request = self
            .http
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let response = self.authorize(request).await.send().await?;
        let rows = Self::rows(Self::check(response).await?).await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterRequest;
    use crate::query;

    #[test]
    fn render_params_matches_postgrest_syntax() {
        let config = Config::new("https://example.supabase.co", "anon-key");
        let filter = FilterRequest {
            query: Some("rust".to_string()),
            category: Some("Technology".to_string()),
            tag: Some("async".to_string()),
            limit: Some(5),
            offset: 10,
            ..Default::default()
        };
        let descriptor = query::compose(&filter, false, &config).unwrap();
        let params = SupabaseBackend::render_params(&descriptor);

        assert!(params.contains(&("published".to_string(), "eq.true".to_string())));
        assert!(params.contains(&(
            "or".to_string(),
            "(title.ilike.*rust*,content.ilike.*rust*)".to_string()
        )));
        assert!(params.contains(&("category".to_string(), "eq.Technology".to_string())));
        assert!(params.contains(&("tags".to_string(), "cs.{async}".to_string())));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "5".to_string())));
        assert!(params.contains(&("offset".to_string(), "10".to_string())));
    }

    #[test]
    fn search_pattern_strips_reserved_characters() {
        assert_eq!(sanitize_pattern("a,b.(c)%*d"), "abcd");
    }
}
