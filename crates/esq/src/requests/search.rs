//! 🔍 SearchRequest / SearchResponse — asking the cluster questions and
//! actually understanding the answers.
//!
//! 🧠 Knowledge graph:
//! - Query DSL construction is NOT this module's business — callers hand us a
//!   `serde_json::Value` query and we place it in the body unexamined.
//! - `SearchResponse` decodes the three things everyone wants from a search:
//!   the hits array, the total, and (for scrolled searches) the `_scroll_id`.
//! - `scroll_over_all` is the hand-off to the pagination engine: the search
//!   request becomes the seed of a [`crate::scroll::ScrollCursor`].

use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::client::EsClient;
use crate::error::EsResult;
use crate::requests::{EsRequest, RequestKind};
use crate::response::EsResponse;
use crate::scroll::ScrollCursor;

/// 🔍 A fluent builder for one search against ONE index.
#[derive(Debug)]
pub struct SearchRequest {
    client: EsClient,
    req: EsRequest,
}

impl SearchRequest {
    pub(crate) fn new(client: EsClient, index: String) -> Self {
        Self {
            client,
            req: EsRequest::new(RequestKind::Search, Some(index), None, None),
        }
    }

    /// Narrow the search to one document type.
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.req.doc_type = Some(doc_type.into());
        self
    }

    /// 📏 Page size — how many hits per response.
    pub fn size(mut self, size: usize) -> Self {
        self.req.param("size", size.to_string());
        self
    }

    /// 📦 The query, as a ready-made DSL value. Goes into the body under
    /// `"query"`, unexamined — we're a courier, not a critic.
    pub fn query(mut self, query: Value) -> EsResult<Self> {
        self.req.body_entry("query", query)?;
        Ok(self)
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.req.param("fields", fields.join(","));
        self
    }

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

    /// 🚀 Run the search once and decode the answer.
    pub async fn execute(self) -> EsResult<SearchResponse> {
        let resp = self.client.execute(self.req).await?;
        SearchResponse::decode(resp)
    }

    pub fn execute_spawned(self) -> JoinHandle<EsResult<SearchResponse>> {
        let Self { client, req } = self;
        tokio::spawn(async move {
            let resp = client.execute(req).await?;
            SearchResponse::decode(resp)
        })
    }

    /// 📜 Trade this one-shot search for the whole result set, one page at a
    /// time. `keep_alive` bounds the server-side gap BETWEEN page fetches,
    /// not the total iteration time. See [`ScrollCursor`] for the rules.
    pub fn scroll_over_all(self, keep_alive: Duration) -> ScrollCursor {
        ScrollCursor::new(self.client, self.req, keep_alive)
    }
}

/// 📬 A decoded search answer: status + parsed body, with the good parts
/// within arm's reach.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    status: u16,
    json: Value,
}

impl SearchResponse {
    pub(crate) fn decode(resp: EsResponse) -> EsResult<Self> {
        let json = resp.json()?;
        Ok(Self {
            status: resp.status(),
            json,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The hits array — empty slice if the response has none (or the shape
    /// surprised us; an empty search result has no hits key drama in it).
    pub fn hits(&self) -> &[Value] {
        self.json["hits"]["hits"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total matching docs. Handles both the object form `{"value": 10}` and
    /// the bare-number form older clusters emit.
    pub fn total(&self) -> Option<u64> {
        self.json["hits"]["total"]["value"]
            .as_u64()
            .or_else(|| self.json["hits"]["total"].as_u64())
    }

    /// The scroll cursor token, when the search asked for one. Opaque —
    /// schlep it back to the server, never read the tea leaves in it.
    pub fn scroll_id(&self) -> Option<&str> {
        self.json["_scroll_id"].as_str()
    }

    /// The whole parsed body, for everything we didn't pre-chew.
    pub fn json(&self) -> &Value {
        &self.json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decoded(body: Value) -> SearchResponse {
        SearchResponse::decode(EsResponse::new(200, body.to_string())).unwrap()
    }

    #[test]
    fn the_one_where_hits_and_total_come_out_of_the_modern_shape() {
        let resp = decoded(json!({
            "_scroll_id": "cursor-1",
            "hits": {"total": {"value": 2}, "hits": [{"_id": "a"}, {"_id": "b"}]}
        }));
        assert_eq!(resp.hits().len(), 2);
        assert_eq!(resp.total(), Some(2));
        assert_eq!(resp.scroll_id(), Some("cursor-1"));
    }

    #[test]
    fn the_one_where_an_elderly_cluster_sends_a_bare_total() {
        let resp = decoded(json!({"hits": {"total": 7, "hits": []}}));
        assert_eq!(resp.total(), Some(7));
        assert!(resp.hits().is_empty());
        assert!(resp.scroll_id().is_none());
    }
}
