//! URL layer: raw query strings and the search-state codec.

pub mod codec;
pub mod query;

pub use codec::{FacetParseError, merge_params, parse_state, state_to_params};
pub use query::{QueryParams, join_href, split_href};
