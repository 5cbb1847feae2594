//! 🗑️ DeleteRequest — the shortest goodbye in the API.

use tokio::task::JoinHandle;

use crate::client::EsClient;
use crate::error::EsResult;
use crate::requests::{EsRequest, RequestKind};
use crate::response::EsResponse;

/// 🗑️ A fluent builder for one delete-by-id operation.
/// No body, no ceremony. In a bulk batch it's the one op that rides a single line.
#[derive(Debug)]
pub struct DeleteRequest {
    client: EsClient,
    req: EsRequest,
}

impl DeleteRequest {
    pub(crate) fn new(client: EsClient, index: String, doc_type: String) -> Self {
        Self {
            client,
            req: EsRequest::new(RequestKind::Delete, Some(index), Some(doc_type), None),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.req.id = Some(id.into());
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

impl From<DeleteRequest> for EsRequest {
    fn from(request: DeleteRequest) -> EsRequest {
        request.req
    }
}
