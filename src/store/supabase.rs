//! Supabase REST API client using service_role key, and the leaderboard
//! backend built on it

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::SupabaseConfig;

use super::leaderboard::{LeaderboardEntry, LeaderboardStore, StoreResult};

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Get the REST API URL for a stored procedure
    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api { status: status.as_u16(), body });
        }

        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Call a Postgres function through PostgREST, discarding its result
    pub async fn rpc<T: Serialize>(&self, function: &str, args: &T) -> Result<(), SupabaseError> {
        let url = self.rpc_url(function);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .json(args)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api { status: status.as_u16(), body });
        }

        Ok(())
    }
}

/// Arguments for the `upsert_max_score` function:
///
/// ```sql
/// insert into leaderboard (name, score, updated_at) values (p_name, p_score, now())
/// on conflict (name) do update
///   set score = greatest(leaderboard.score, excluded.score),
///       updated_at = case when excluded.score > leaderboard.score
///                         then now() else leaderboard.updated_at end;
/// ```
#[derive(Debug, Serialize)]
struct UpsertMaxArgs {
    p_name: String,
    p_score: u32,
}

/// Leaderboard kept in the Supabase `leaderboard` table
#[derive(Clone)]
pub struct SupabaseLeaderboard {
    client: SupabaseClient,
}

impl SupabaseLeaderboard {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

impl LeaderboardStore for SupabaseLeaderboard {
    fn upsert_max(&self, name: String, score: u32) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(upsert_max_score(self.client.clone(), name, score))
    }

    fn list_all_descending(&self) -> BoxFuture<'static, StoreResult<Vec<LeaderboardEntry>>> {
        Box::pin(list_leaderboard(self.client.clone()))
    }
}

async fn upsert_max_score(client: SupabaseClient, name: String, score: u32) -> StoreResult<()> {
    debug!(name = %name, score, "Upserting leaderboard score");
    let args = UpsertMaxArgs {
        p_name: name,
        p_score: score,
    };
    client.rpc("upsert_max_score", &args).await?;
    Ok(())
}

async fn list_leaderboard(client: SupabaseClient) -> StoreResult<Vec<LeaderboardEntry>> {
    let rows = client
        .get("leaderboard", "select=name,score,updated_at&order=score.desc")
        .await?;
    Ok(rows)
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] reqwest::Error),
}
