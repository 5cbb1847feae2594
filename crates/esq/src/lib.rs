//! 🔎 esq — an Elasticsearch HTTP/JSON client: typed request builders, a
//! retrying dispatcher, bulk batching with per-item verdicts, and scroll
//! pagination that cleans up after itself.
//!
//! Start at [`EsClient`]; everything else is born from its `prepare_*` calls.

pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod requests;
pub mod response;
pub mod scroll;

pub use bulk::{BulkItem, BulkRequest, BulkResponse, Refresh};
pub use client::EsClient;
pub use config::{EsConfig, load_config};
pub use error::{EsError, EsResult};
pub use requests::{
    DeleteRequest, EsRequest, GetRequest, IndexRequest, SearchRequest, SearchResponse,
    UpdateRequest,
};
pub use response::EsResponse;
pub use scroll::{PageSource, ScrollCursor};
