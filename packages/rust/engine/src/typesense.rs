//! HTTP client for a Typesense-compatible search server.

use std::time::Duration;

use async_trait::async_trait;
use reindex_shared::{CollectionSchema, ReindexError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{AliasInfo, CollectionInfo, ImportResult, SearchBackend, SearchParams, SearchResponse};

/// Header carrying the admin API key.
const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// User-Agent string for engine requests.
const USER_AGENT: &str = concat!("reindex/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct HealthBody {
    ok: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AliasList {
    aliases: Vec<AliasInfo>,
}

/// Typesense REST client.
#[derive(Debug, Clone)]
pub struct TypesenseClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl TypesenseClient {
    /// Build a client for `base_url`. `timeout` bounds every request except
    /// the health probe, which carries its own.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ReindexError::config(format!("invalid engine url '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ReindexError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ReindexError::validation(format!("invalid engine path '{path}': {e}")))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoint(path)?;
        Ok(self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key))
    }
}

/// Send a request, mapping transport failures and non-2xx statuses.
async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ReindexError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        return Err(ReindexError::NotFound(message));
    }
    Err(ReindexError::Backend {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ReindexError::Decode(e.to_string()))
}

/// Parse the JSONL body of an import call: one result object per line.
fn parse_import_response(body: &str) -> Result<Vec<ImportResult>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<ImportResult>(line)
                .map_err(|e| ReindexError::Decode(format!("bad import result line '{line}': {e}")))
        })
        .collect()
}

fn to_jsonl(documents: &[serde_json::Value]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let line = serde_json::to_string(doc).map_err(|e| ReindexError::Decode(e.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl SearchBackend for TypesenseClient {
    #[instrument(skip_all)]
    async fn health(&self, timeout: Duration) -> Result<()> {
        let request = self
            .request(reqwest::Method::GET, "health")?
            .timeout(timeout);
        let response = send(request).await.map_err(|e| match e {
            ReindexError::Network(msg) => ReindexError::Network(format!("health check failed: {msg}")),
            other => ReindexError::Network(format!("health check failed: {other}")),
        })?;

        let body: HealthBody = decode(response).await?;
        if !body.ok {
            return Err(ReindexError::Network(
                "health check failed: engine reported not ok".into(),
            ));
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let response = send(self.request(reqwest::Method::GET, "collections")?).await?;
        decode(response).await
    }

    #[instrument(skip_all, fields(collection = %schema.name))]
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, "collections")?
            .json(schema);
        send(request).await?;
        debug!("collection created");
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %name))]
    async fn delete_collection(&self, name: &str) -> Result<()> {
        send(self.request(reqwest::Method::DELETE, &format!("collections/{name}"))?).await?;
        Ok(())
    }

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>> {
        let response = send(self.request(reqwest::Method::GET, "aliases")?).await?;
        let list: AliasList = decode(response).await?;
        Ok(list.aliases)
    }

    #[instrument(skip_all, fields(alias = %alias, collection = %collection))]
    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::PUT, &format!("aliases/{alias}"))?
            .json(&serde_json::json!({ "collection_name": collection }));
        send(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %collection, documents = documents.len()))]
    async fn import_documents(
        &self,
        collection: &str,
        documents: &[serde_json::Value],
    ) -> Result<Vec<ImportResult>> {
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("collections/{collection}/documents/import"),
            )?
            .query(&[("action", "upsert")])
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(to_jsonl(documents)?);

        let response = send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ReindexError::Network(e.to_string()))?;
        parse_import_response(&body)
    }

    #[instrument(skip_all, fields(preset = %name))]
    async fn upsert_preset(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        let request = self
            .request(reqwest::Method::PUT, &format!("presets/{name}"))?
            .json(value);
        send(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn search(&self, collection: &str, params: &SearchParams) -> Result<SearchResponse> {
        let request = self
            .request(
                reqwest::Method::GET,
                &format!("collections/{collection}/documents/search"),
            )?
            .query(params);
        let response = send(request).await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> TypesenseClient {
        TypesenseClient::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header(API_KEY_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.health(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn health_unavailable_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({"ok": false})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.health(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ReindexError::Network(_)));
    }

    #[tokio::test]
    async fn create_conflict_is_reported_as_409() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"message": "A collection with name `docs-2024-01-01-00-00` already exists."})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_collection(&CollectionSchema::default().named("docs-2024-01-01-00-00"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn delete_missing_collection_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/collections/docs-2024-01-01-00-00"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.delete_collection("docs-2024-01-01-00-00").await.unwrap_err();
        assert!(matches!(err, ReindexError::NotFound(_)));
    }

    #[tokio::test]
    async fn alias_upsert_sends_collection_name() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/aliases/docs"))
            .and(body_json(serde_json::json!({"collection_name": "docs-2024-01-01-00-00"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"name": "docs", "collection_name": "docs-2024-01-01-00-00"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.upsert_alias("docs", "docs-2024-01-01-00-00").await.unwrap();
    }

    #[tokio::test]
    async fn list_aliases_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/aliases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aliases": [{"name": "docs", "collection_name": "docs-2024-01-01-00-00"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let aliases = client.list_aliases().await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].collection_name, "docs-2024-01-01-00-00");
    }

    #[tokio::test]
    async fn import_sends_jsonl_and_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/docs-2024-01-01-00-00/documents/import"))
            .and(query_param("action", "upsert"))
            .and(body_string("{\"id\":\"a\"}\n{\"id\":\"b\"}\n"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"success\":true}\n{\"success\":false,\"error\":\"Field `title` has been declared in the schema, but is not found in the document.\",\"document\":\"{\\\"id\\\":\\\"b\\\"}\"}\n",
            ))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let docs = vec![serde_json::json!({"id": "a"}), serde_json::json!({"id": "b"})];
        let results = client
            .import_documents("docs-2024-01-01-00-00", &docs)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn search_passes_params_and_decodes_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/docs/documents/search"))
            .and(query_param("q", "rust"))
            .and(query_param("query_by", "title"))
            .and(query_param("filter_by", "lang:=\"en\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": 1,
                "page": 1,
                "hits": [{
                    "document": {"id": "a", "title": "Rust"},
                    "text_match_info": {"score": "578730123365187705"}
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params = SearchParams {
            q: "rust".into(),
            query_by: Some("title".into()),
            filter_by: Some("lang:=\"en\"".into()),
            ..SearchParams::default()
        };
        let response = client.search("docs", &params).await.unwrap();
        assert_eq!(response.found, 1);
        assert_eq!(response.hits[0].document["title"], "Rust");
        assert_eq!(
            response.hits[0].text_match_info.as_ref().unwrap().score.as_deref(),
            Some("578730123365187705")
        );
    }

    #[test]
    fn base_url_with_path_keeps_prefix() {
        let client =
            TypesenseClient::new("http://localhost:8108/ts", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("collections").unwrap().as_str(),
            "http://localhost:8108/ts/collections"
        );
    }

    #[test]
    fn import_response_rejects_garbage_lines() {
        assert!(parse_import_response("{\"success\":true}\nnot json\n").is_err());
        assert!(parse_import_response("\n").unwrap().is_empty());
    }
}
