//! 📄 GetRequest — fetch one document by address, judge nothing.
//!
//! A 404 here is pass-through data ("not found" is an answer), which is why
//! the dispatcher's unwrap hook leaves this kind's responses alone.

use tokio::task::JoinHandle;

use crate::client::EsClient;
use crate::error::EsResult;
use crate::requests::{EsRequest, RequestKind};
use crate::response::EsResponse;

#[derive(Debug)]
pub struct GetRequest {
    client: EsClient,
    req: EsRequest,
}

impl GetRequest {
    pub(crate) fn new(client: EsClient, index: String, doc_type: String, id: String) -> Self {
        Self {
            client,
            req: EsRequest::new(RequestKind::Get, Some(index), Some(doc_type), Some(id)),
        }
    }

    /// 🔧 Restrict which stored fields come back, e.g. `_parent`, `_routing`.
    /// Joined into one comma-separated url param, the way the API likes it.
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.req.param("fields", fields.join(","));
        self
    }

    /// Source filtering — wildcards welcome, e.g. `*.bloat`.
    pub fn source_include(mut self, included: &[&str]) -> Self {
        self.req.param("_source_include", included.join(","));
        self
    }

    pub fn source_exclude(mut self, excluded: &[&str]) -> Self {
        self.req.param("_source_exclude", excluded.join(","));
        self
    }

    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.req.param("routing", routing);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.req.set_retries(retries);
        self
    }

    pub async fn execute(self) -> EsResult<EsResponse> {
        self.client.execute(self.req).await
    }

    pub fn execute_spawned(self) -> JoinHandle<EsResult<EsResponse>> {
        let Self { client, req } = self;
        tokio::spawn(async move { client.execute(req).await })
    }
}
