//! Search facade over the public aliases.

use std::collections::BTreeMap;
use std::sync::Arc;

use reindex_engine::SearchBackend;
pub use reindex_engine::SearchParams;
use reindex_shared::{DocumentId, IndexId, ReindexError, Result, Score, Scores};
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

/// Render `field -> values` as an engine filter expression.
///
/// One value becomes `field:="v"`, several become `field:["a","b"]`;
/// clauses are AND-ed in key order. Fields without values are skipped.
pub fn format_filter_query(filter_by: &BTreeMap<String, Vec<String>>) -> Option<String> {
    let clauses: Vec<String> = filter_by
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| match values.as_slice() {
            [single] => format!("{key}:=\"{single}\""),
            many => {
                let quoted: Vec<String> = many.iter().map(|v| format!("\"{v}\"")).collect();
                format!("{key}:[{}]", quoted.join(","))
            }
        })
        .collect();

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" && "))
    }
}

pub fn build_search_params(
    q: &str,
    filter_by: &BTreeMap<String, Vec<String>>,
    page: u32,
    per_page: u32,
    sort_by: Option<&str>,
) -> SearchParams {
    SearchParams {
        q: q.to_string(),
        filter_by: format_filter_query(filter_by),
        page: Some(page),
        per_page: Some(per_page),
        sort_by: sort_by.filter(|s| !s.is_empty()).map(str::to_string),
        ..SearchParams::default()
    }
}

/// Typed search over index aliases.
pub struct Searcher<B> {
    backend: Arc<B>,
    default_query_by: String,
}

impl<B: SearchBackend> Searcher<B> {
    pub fn new(backend: Arc<B>, default_query_by: impl Into<String>) -> Self {
        Self {
            backend,
            default_query_by: default_query_by.into(),
        }
    }

    /// Search `index` querying the default field(s).
    pub async fn simple_search<R: DeserializeOwned>(
        &self,
        index: &IndexId,
        q: &str,
        filter_by: &BTreeMap<String, Vec<String>>,
        page: u32,
        per_page: u32,
        sort_by: Option<&str>,
    ) -> Result<(Vec<R>, Scores)> {
        let mut params = build_search_params(q, filter_by, page, per_page, sort_by);
        params.query_by = Some(self.default_query_by.clone());
        self.expert_search(index, &params).await
    }

    /// Search `index` with caller-supplied parameters.
    ///
    /// Hits without a string `id`, or that do not decode into `R`, are
    /// skipped. A hit whose score cannot be parsed scores 0.
    #[instrument(skip_all, fields(index = %index))]
    pub async fn expert_search<R: DeserializeOwned>(
        &self,
        index: &IndexId,
        params: &SearchParams,
    ) -> Result<(Vec<R>, Scores)> {
        if params.q.is_empty() {
            return Err(ReindexError::config(
                "search parameters need a query (use \"*\" to match everything)",
            ));
        }

        let response = self.backend.search(index.as_str(), params).await?;

        let mut results = Vec::with_capacity(response.hits.len());
        let mut scores = Scores::new();

        for hit in response.hits {
            let Some(id) = hit.document.get("id").and_then(|v| v.as_str()).map(str::to_string)
            else {
                warn!("missing or invalid document id in search result");
                continue;
            };

            let document: R = match serde_json::from_value(serde_json::Value::Object(hit.document)) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(%id, error = %e, "failed to decode search result");
                    continue;
                }
            };

            let raw_score = hit.text_match_info.and_then(|info| info.score);
            let score = match raw_score.as_deref().map(str::parse::<i64>) {
                Some(Ok(score)) => score,
                Some(Err(e)) => {
                    warn!(%id, score = raw_score.as_deref().unwrap_or_default(), error = %e, "invalid score value");
                    0
                }
                None => 0,
            };

            results.push(document);
            let id = DocumentId(id);
            scores.insert(
                id.clone(),
                Score {
                    id,
                    index: score,
                },
            );
        }

        info!(results = results.len(), found = response.found, "search completed");
        Ok((results, scores))
    }
}
