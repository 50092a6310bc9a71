//! HTTP client for a contentserver-style content source.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reindex_shared::{ReindexError, Result};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{ContentSource, RepoNode};

/// User-Agent string for content requests.
const USER_AGENT: &str = concat!("reindex/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct UrisRequest<'a> {
    dimension: &'a str,
    ids: &'a [String],
}

/// Content server client. Each call is a JSON POST to `<base>/<handler>`.
#[derive(Debug, Clone)]
pub struct ContentServerClient {
    client: Client,
    base: Url,
}

impl ContentServerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ReindexError::config(format!("invalid content url '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ReindexError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    async fn post<B: Serialize + ?Sized>(&self, handler: &str, body: &B) -> Result<Response> {
        let url = self
            .base
            .join(handler)
            .map_err(|e| ReindexError::validation(format!("invalid handler '{handler}': {e}")))?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ReindexError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReindexError::Backend {
                status: status.as_u16(),
                message: format!("content server {handler}: {message}"),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentSource for ContentServerClient {
    #[instrument(skip_all, fields(dimension = %dimension))]
    async fn get_tree(&self, dimension: &str) -> Result<Option<RepoNode>> {
        let response = self.post("getRepo", &serde_json::json!({})).await?;
        let mut repo: HashMap<String, RepoNode> = response
            .json()
            .await
            .map_err(|e| ReindexError::Decode(format!("repo: {e}")))?;

        debug!(dimensions = repo.len(), "repo fetched");
        Ok(repo.remove(dimension))
    }

    #[instrument(skip_all, fields(dimension = %dimension, ids = ids.len()))]
    async fn get_uris(&self, dimension: &str, ids: &[String]) -> Result<HashMap<String, String>> {
        let response = self
            .post("getURIs", &UrisRequest { dimension, ids })
            .await?;
        response
            .json()
            .await
            .map_err(|e| ReindexError::Decode(format!("uris: {e}")))
    }
}
