//! Content tree extraction: flatten a dimension's tree and select the
//! nodes that become search documents.

use std::collections::{HashMap, HashSet};

use reindex_shared::{
    ContentConfig, DocumentDescriptor, DocumentId, DocumentType, IndexId, ReindexError, Result,
};
use tracing::{debug, info, instrument};

use crate::{ContentSource, RepoNode};

/// Node selection rules.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Mime types eligible for indexing.
    pub supported_mime_types: Vec<String>,
    /// Metadata key that opts a node out of search when truthy.
    pub exclude_attribute: String,
    /// Also drop nodes hidden from navigation.
    pub skip_hidden: bool,
}

impl From<&ContentConfig> for ExtractOptions {
    fn from(config: &ContentConfig) -> Self {
        Self {
            supported_mime_types: config.supported_mime_types.clone(),
            exclude_attribute: config.exclude_attribute.clone(),
            skip_hidden: config.skip_hidden,
        }
    }
}

/// Flatten a tree into `id -> node`.
///
/// Iterative pre-order walk. Each node instance is visited once; when two
/// distinct nodes share an id the one visited last wins.
pub fn flatten(root: &RepoNode) -> HashMap<&str, &RepoNode> {
    let mut flat = HashMap::new();
    let mut visited: HashSet<*const RepoNode> = HashSet::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if !visited.insert(std::ptr::from_ref(node)) {
            continue;
        }
        flat.insert(node.id.as_str(), node);
        // reverse so children pop in key order
        stack.extend(node.nodes.values().rev());
    }

    flat
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
        serde_json::Value::Number(n) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Whether a node should be indexed. Rules apply in order: absent nodes,
/// explicit exclusion, hidden (when configured), unsupported mime type.
pub fn is_indexable(node: Option<&RepoNode>, opts: &ExtractOptions) -> bool {
    let Some(node) = node else {
        return false;
    };
    if node
        .data
        .get(&opts.exclude_attribute)
        .is_some_and(is_truthy)
    {
        return false;
    }
    if opts.skip_hidden && node.hidden {
        return false;
    }
    opts.supported_mime_types
        .iter()
        .any(|mime| mime == &node.mime_type)
}

/// Fetch the tree named by `index_id` and return its indexable documents,
/// sorted by document id.
#[instrument(skip_all, fields(index = %index_id))]
pub async fn extract_descriptors<S: ContentSource + ?Sized>(
    source: &S,
    index_id: &IndexId,
    opts: &ExtractOptions,
) -> Result<Vec<DocumentDescriptor>> {
    let root = source
        .get_tree(index_id.as_str())
        .await?
        .ok_or_else(|| ReindexError::NotFound(format!("content dimension {index_id} not found")))?;

    let flat = flatten(&root);
    let mut descriptors: Vec<DocumentDescriptor> = flat
        .values()
        .filter(|node| is_indexable(Some(node), opts))
        .map(|node| DocumentDescriptor {
            document_type: DocumentType(node.mime_type.clone()),
            document_id: DocumentId(node.id.clone()),
        })
        .collect();
    descriptors.sort_by(|a, b| a.document_id.cmp(&b.document_id));

    debug!(nodes = flat.len(), "tree flattened");
    info!(selected = descriptors.len(), "documents selected");
    Ok(descriptors)
}
