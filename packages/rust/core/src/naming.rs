//! Generation naming: `"{index_id}-{revision_id}"`.

use reindex_shared::{IndexId, REVISION_ID_LEN, RevisionId};

/// Name of the backing collection holding `revision` of `index_id`.
pub fn format_generation_name(index_id: &IndexId, revision: &RevisionId) -> String {
    format!("{index_id}-{revision}")
}

/// Revision encoded in a generation name, if `name` belongs to `index_id`.
///
/// Returns `None` for names of other indices (including ones that merely
/// share a prefix, like `docs-archive-...` for `docs`) and for suffixes that
/// are not a well-formed revision id.
pub fn extract_revision_id(name: &str, index_id: &IndexId) -> Option<RevisionId> {
    let suffix = name
        .strip_prefix(index_id.as_str())?
        .strip_prefix('-')?;
    if suffix.len() != REVISION_ID_LEN {
        return None;
    }
    suffix.parse().ok()
}
