//! Request option module
//!
//! Query parameters, headers and bodies can be contributed independently by
//! the paginator, the stream slicer/cursor and the requester itself.
//!
//! # Overview
//!
//! - `RequestOption` - where a single value is injected
//! - `RequestOptionsProvider` - a component that contributes options
//! - `combine_mappings` - merges contributions, failing on conflicts

mod merge;
mod types;

pub use merge::{combine_bodies, combine_mappings, combine_options, into_headers};
pub use types::{
    RequestBody, RequestOption, RequestOptionType, RequestOptions, RequestOptionsProvider,
    StaticRequestOptions,
};
