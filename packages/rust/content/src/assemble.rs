//! Document assembly: turn selected descriptors into search documents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reindex_shared::{DocumentId, DocumentType, IndexId, ReindexError, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::extract::{ExtractOptions, extract_descriptors};
use crate::{ContentSource, DocumentProvider};

// ---------------------------------------------------------------------------
// Type providers
// ---------------------------------------------------------------------------

/// Builds the search document for one document type.
///
/// `Ok(None)` means "nothing to index for this id" and is not a failure.
#[async_trait]
pub trait TypeProvider<D>: Send + Sync {
    async fn build(
        &self,
        index_id: &IndexId,
        document_id: &DocumentId,
        uris: &HashMap<String, String>,
    ) -> Result<Option<D>>;
}

/// Type providers keyed by document type.
pub struct TypeProviderRegistry<D> {
    providers: HashMap<DocumentType, Arc<dyn TypeProvider<D>>>,
}

impl<D> Default for TypeProviderRegistry<D> {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }
}

impl<D> TypeProviderRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        document_type: impl Into<DocumentType>,
        provider: Arc<dyn TypeProvider<D>>,
    ) -> Self {
        self.providers.insert(document_type.into(), provider);
        self
    }

    pub fn get(&self, document_type: &DocumentType) -> Option<&Arc<dyn TypeProvider<D>>> {
        self.providers.get(document_type)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Provided
// ---------------------------------------------------------------------------

/// Assembly result for one index.
///
/// `documents` has one slot per selected descriptor, in descriptor order.
/// Empty slots come from missing providers, provider failures, or
/// providers that chose to skip the id.
#[derive(Debug)]
pub struct Provided<D> {
    pub documents: Vec<Option<D>>,
    pub missing_provider: usize,
    pub failed: usize,
}

impl<D> Default for Provided<D> {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            missing_provider: 0,
            failed: 0,
        }
    }
}

impl<D> Provided<D> {
    /// Number of filled slots.
    pub fn present(&self) -> usize {
        self.documents.iter().filter(|d| d.is_some()).count()
    }

    /// Drop empty slots.
    pub fn into_documents(self) -> Vec<D> {
        self.documents.into_iter().flatten().collect()
    }
}

// ---------------------------------------------------------------------------
// ContentServerProvider
// ---------------------------------------------------------------------------

/// [`DocumentProvider`] reading from a [`ContentSource`].
pub struct ContentServerProvider<S, D> {
    source: Arc<S>,
    registry: TypeProviderRegistry<D>,
    options: ExtractOptions,
}

impl<S: ContentSource, D> ContentServerProvider<S, D> {
    pub fn new(source: Arc<S>, registry: TypeProviderRegistry<D>, options: ExtractOptions) -> Self {
        Self {
            source,
            registry,
            options,
        }
    }
}

#[async_trait]
impl<S, D> DocumentProvider<D> for ContentServerProvider<S, D>
where
    S: ContentSource + 'static,
    D: Send + 'static,
{
    #[instrument(skip_all, fields(index = %index_id))]
    async fn provide(&self, index_id: &IndexId) -> Result<Provided<D>> {
        let descriptors = extract_descriptors(self.source.as_ref(), index_id, &self.options).await?;

        let ids: Vec<String> = descriptors
            .iter()
            .map(|d| d.document_id.0.clone())
            .collect();
        let uris = self.source.get_uris(index_id.as_str(), &ids).await?;

        let mut provided = Provided {
            documents: Vec::with_capacity(descriptors.len()),
            ..Provided::default()
        };

        for descriptor in &descriptors {
            let Some(provider) = self.registry.get(&descriptor.document_type) else {
                warn!(
                    document_type = %descriptor.document_type,
                    document_id = %descriptor.document_id,
                    "no provider for document type"
                );
                provided.missing_provider += 1;
                provided.documents.push(None);
                continue;
            };

            match provider.build(index_id, &descriptor.document_id, &uris).await {
                Ok(document) => provided.documents.push(document),
                Err(e) => {
                    error!(
                        error = %e,
                        document_type = %descriptor.document_type,
                        document_id = %descriptor.document_id,
                        "document not built"
                    );
                    provided.failed += 1;
                    provided.documents.push(None);
                }
            }
        }

        info!(
            selected = descriptors.len(),
            built = provided.present(),
            missing_provider = provided.missing_provider,
            failed = provided.failed,
            "documents assembled"
        );
        Ok(provided)
    }

    async fn provide_paged(
        &self,
        _index_id: &IndexId,
        _offset: usize,
    ) -> Result<(Provided<D>, usize)> {
        Err(ReindexError::NotImplemented("paged document provision"))
    }
}

// ---------------------------------------------------------------------------
// BasicDocument
// ---------------------------------------------------------------------------

/// Minimal search document: identity, type and resolved URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicDocument {
    pub id: String,
    pub document_type: String,
    pub uri: String,
    pub index_id: String,
}

/// Builds a [`BasicDocument`] stamped with its document type. Ids without
/// a URI are skipped.
#[derive(Debug, Clone)]
pub struct BasicDocumentBuilder {
    document_type: String,
}

impl BasicDocumentBuilder {
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
        }
    }

    /// Registry mapping every given mime type to a basic builder.
    pub fn registry(mime_types: &[String]) -> TypeProviderRegistry<BasicDocument> {
        mime_types
            .iter()
            .fold(TypeProviderRegistry::new(), |registry, mime| {
                registry.register(DocumentType(mime.clone()), Arc::new(Self::new(mime.clone())))
            })
    }
}

#[async_trait]
impl TypeProvider<BasicDocument> for BasicDocumentBuilder {
    async fn build(
        &self,
        index_id: &IndexId,
        document_id: &DocumentId,
        uris: &HashMap<String, String>,
    ) -> Result<Option<BasicDocument>> {
        Ok(basic_document(index_id, document_id, &self.document_type, uris))
    }
}

fn basic_document(
    index_id: &IndexId,
    document_id: &DocumentId,
    document_type: &str,
    uris: &HashMap<String, String>,
) -> Option<BasicDocument> {
    let uri = uris.get(document_id.as_str())?;
    Some(BasicDocument {
        id: document_id.0.clone(),
        document_type: document_type.to_string(),
        uri: uri.clone(),
        index_id: index_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RepoNode, StaticContentSource};

    const PAGE: &str = "application/x-page";
    const ARTICLE: &str = "application/x-article";
    const VIDEO: &str = "application/x-video";

    struct FailingProvider;

    #[async_trait]
    impl TypeProvider<BasicDocument> for FailingProvider {
        async fn build(
            &self,
            _index_id: &IndexId,
            document_id: &DocumentId,
            _uris: &HashMap<String, String>,
        ) -> Result<Option<BasicDocument>> {
            Err(ReindexError::Provider(format!("cannot render {document_id}")))
        }
    }

    fn index() -> IndexId {
        IndexId::parse("site-de").unwrap()
    }

    fn source() -> StaticContentSource {
        let tree = RepoNode::new("root", "application/x-folder")
            .with_child(RepoNode::new("a", PAGE))
            .with_child(RepoNode::new("b", ARTICLE))
            .with_child(RepoNode::new("c", VIDEO))
            .with_child(RepoNode::new("d", PAGE));
        StaticContentSource::new()
            .with_tree("site-de", tree)
            .with_uri("site-de", "a", "/de/a")
            .with_uri("site-de", "b", "/de/b")
            .with_uri("site-de", "c", "/de/c")
    }

    fn options() -> ExtractOptions {
        ExtractOptions {
            supported_mime_types: vec![PAGE.into(), ARTICLE.into(), VIDEO.into()],
            exclude_attribute: "excludeFromSearch".into(),
            skip_hidden: false,
        }
    }

    #[tokio::test]
    async fn slots_follow_descriptor_order() {
        let registry = BasicDocumentBuilder::registry(&[PAGE.to_string(), ARTICLE.to_string()])
            .register(VIDEO, Arc::new(FailingProvider));
        let source = Arc::new(source());
        let provider = ContentServerProvider::new(source.clone(), registry, options());

        let provided = provider.provide(&index()).await.unwrap();

        assert_eq!(provided.documents.len(), 4);
        let a = provided.documents[0].as_ref().unwrap();
        assert_eq!(a.uri, "/de/a");
        assert_eq!(a.document_type, PAGE);
        assert_eq!(provided.documents[1].as_ref().unwrap().document_type, ARTICLE);
        // c fails, d has no uri
        assert!(provided.documents[2].is_none());
        assert!(provided.documents[3].is_none());
        assert_eq!(provided.failed, 1);
        assert_eq!(provided.missing_provider, 0);
        assert_eq!(source.uri_calls(), 1);
    }

    #[tokio::test]
    async fn missing_provider_leaves_empty_slot() {
        let registry = BasicDocumentBuilder::registry(&[PAGE.to_string()]);
        let provider = ContentServerProvider::new(Arc::new(source()), registry, options());

        let provided = provider.provide(&index()).await.unwrap();
        assert_eq!(provided.missing_provider, 2);
        assert_eq!(provided.present(), 1);

        let docs = provided.into_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
    }

    #[tokio::test]
    async fn unregistered_type_keeps_its_slot() {
        let tree = RepoNode::new("root", "application/x-folder")
            .with_child(RepoNode::new("1", PAGE))
            .with_child(RepoNode::new("2", ARTICLE))
            .with_child(RepoNode::new("3", PAGE));
        let source = StaticContentSource::new()
            .with_tree("site-de", tree)
            .with_uri("site-de", "1", "/de/1")
            .with_uri("site-de", "2", "/de/2")
            .with_uri("site-de", "3", "/de/3");
        let registry = BasicDocumentBuilder::registry(&[PAGE.to_string()]);
        let provider = ContentServerProvider::new(Arc::new(source), registry, options());

        let provided = provider.provide(&index()).await.unwrap();

        assert_eq!(provided.documents.len(), 3);
        assert_eq!(provided.documents[0].as_ref().unwrap().id, "1");
        assert!(provided.documents[1].is_none());
        assert_eq!(provided.documents[2].as_ref().unwrap().id, "3");
        assert_eq!(provided.missing_provider, 1);
        assert_eq!(provided.failed, 0);
    }

    #[tokio::test]
    async fn uri_failure_fails_the_index() {
        let registry = BasicDocumentBuilder::registry(&[PAGE.to_string()]);
        let source = Arc::new(source().with_failing_uris("site-de"));
        let provider = ContentServerProvider::new(source, registry, options());

        assert!(provider.provide(&index()).await.is_err());
    }

    #[tokio::test]
    async fn paged_provision_is_not_implemented() {
        let registry = TypeProviderRegistry::<BasicDocument>::new();
        let provider = ContentServerProvider::new(Arc::new(source()), registry, options());

        let err = provider.provide_paged(&index(), 0).await.unwrap_err();
        assert!(matches!(err, ReindexError::NotImplemented(_)));
    }
}
