//! 📦 IndexRequest — "store this document, exactly here, exactly like this."

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::client::EsClient;
use crate::error::EsResult;
use crate::requests::{EsRequest, RequestKind};
use crate::response::EsResponse;

/// 📦 A fluent builder for one index (create/overwrite) operation.
///
/// With `.id(…)` this is a PUT to a known address; without, a POST and the
/// cluster auto-generates an id. Auto-generated ids are like auto-generated
/// passwords: technically fine, spiritually unsettling.
#[derive(Debug)]
pub struct IndexRequest {
    client: EsClient,
    req: EsRequest,
}

impl IndexRequest {
    pub(crate) fn new(client: EsClient, index: String, doc_type: String) -> Self {
        Self {
            client,
            req: EsRequest::new(RequestKind::Index, Some(index), Some(doc_type), None),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.req.id = Some(id.into());
        self
    }

    /// 🔧 Routing key — tells the cluster which shard to bother. Without it,
    /// the cluster hashes the id and decides for you, which is usually fine.
    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.req.param("routing", routing);
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.req.param("parent", parent_id);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.req.set_retries(retries);
        self
    }

    /// 📦 The document, as a structured map. 💀 Once only — see
    /// [`crate::EsError::BodyAlreadySet`].
    pub fn source_map(mut self, map: Map<String, Value>) -> EsResult<Self> {
        self.req.set_source_map(map)?;
        Ok(self)
    }

    /// 📦 The document, as pre-serialized JSON. Passed through verbatim,
    /// integrity-checked at dispatch. Same once-only rule.
    pub fn source_json(mut self, json: impl Into<String>) -> EsResult<Self> {
        self.req.set_source_raw(json)?;
        Ok(self)
    }

    pub async fn execute(self) -> EsResult<EsResponse> {
        self.client.execute(self.req).await
    }

    /// 🚀 Fire on the runtime's pool instead of awaiting in place. The handle
    /// is the standard cancellable future — `abort()` is best-effort once the
    /// bytes have left the building.
    pub fn execute_spawned(self) -> JoinHandle<EsResult<EsResponse>> {
        let Self { client, req } = self;
        tokio::spawn(async move { client.execute(req).await })
    }
}

// 🎫 The ticket that lets an IndexRequest board a bulk batch.
impl From<IndexRequest> for EsRequest {
    fn from(request: IndexRequest) -> EsRequest {
        request.req
    }
}
