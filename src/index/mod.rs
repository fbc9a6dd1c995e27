//! Search index over persisted snapshots

mod builder;
mod logo;
mod query;

pub use builder::{
    build_from_store, build_search_index, entry_from_snapshot, rebuild_search_index, SearchIndexBuilder,
    SearchIndexEntry,
};
pub use logo::{infer_logo_keys, is_token_like, normalize_protocol_key};
pub use query::{apy_as_percent, Facets, RootIdSet, SearchQuery};
