//! 🔄 UpdateRequest — partial updates, upserts, and scripted pokes at `_update`.
//!
//! The body here is grown entry by entry (`doc`, `upsert`, `script`, …) into
//! one structured map — the builder equivalent of packing a suitcase one item
//! at a time and only zipping it at dispatch.

use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::client::EsClient;
use crate::error::EsResult;
use crate::requests::{EsRequest, RequestKind};
use crate::response::EsResponse;

/// 🔄 A fluent builder for one `_update` operation.
///
/// Needs index, type AND id before it flies — the validator checks all three
/// before any network happens, because an update without an id is not an
/// update, it's a wish.
#[derive(Debug)]
pub struct UpdateRequest {
    client: EsClient,
    req: EsRequest,
}

impl UpdateRequest {
    pub(crate) fn new(client: EsClient, index: String, doc_type: String) -> Self {
        Self {
            client,
            req: EsRequest::new(RequestKind::Update, Some(index), Some(doc_type), None),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.req.id = Some(id.into());
        self
    }

    /// 📦 The partial document to merge into the existing one.
    pub fn doc(mut self, doc: Value) -> EsResult<Self> {
        self.req.body_entry("doc", doc)?;
        Ok(self)
    }

    /// 📦 The full document to insert if the target doesn't exist yet.
    ///
    /// ⚠️ `upsert` and `doc` are INDEPENDENT body entries. Toggling
    /// [`UpdateRequest::doc_as_upsert`] does not migrate data between them —
    /// set the one(s) you mean.
    pub fn upsert(mut self, doc: Value) -> EsResult<Self> {
        self.req.body_entry("upsert", doc)?;
        Ok(self)
    }

    /// 🔧 When true, the cluster treats `doc` itself as the upsert document.
    pub fn doc_as_upsert(mut self, doc_as_upsert: bool) -> EsResult<Self> {
        self.req.body_entry("doc_as_upsert", json!(doc_as_upsert))?;
        Ok(self)
    }

    /// 🔧 A scripted update. Pass the whole script object
    /// (`{"source": …, "params": …}`) — we don't second-guess script shapes.
    /// ⚠️ Whether this runs at all depends on your cluster's script settings.
    pub fn script(mut self, script: Value) -> EsResult<Self> {
        self.req.body_entry("script", script)?;
        Ok(self)
    }

    /// The script language, as a url param. You almost certainly want the default.
    pub fn script_lang(mut self, lang: impl Into<String>) -> Self {
        self.req.param("lang", lang);
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

impl From<UpdateRequest> for EsRequest {
    fn from(request: UpdateRequest) -> EsRequest {
        request.req
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EsConfig;
    use serde_json::json;

    fn builder() -> UpdateRequest {
        let client = EsClient::new(EsConfig::default()).unwrap();
        client.prepare_update("idx", "doc").id("1")
    }

    #[test]
    fn the_one_where_doc_and_upsert_mind_their_own_business() {
        // 🧪 doc_as_upsert flips a flag; it does NOT shuffle data between
        // the doc and upsert entries. They are roommates, not a couple.
        let request = builder()
            .doc(json!({"likes": 1}))
            .unwrap()
            .doc_as_upsert(true)
            .unwrap();
        let req: EsRequest = request.into();
        let body: Value = serde_json::from_str(&req.body_json().unwrap().unwrap()).unwrap();
        assert_eq!(body["doc"], json!({"likes": 1}));
        assert_eq!(body["doc_as_upsert"], json!(true));
        assert!(body.get("upsert").is_none(), "no upsert entry appears uninvited");
    }

    #[test]
    fn the_one_where_the_body_packs_all_three_entries() {
        let request = builder()
            .doc(json!({"a": 1}))
            .unwrap()
            .upsert(json!({"a": 0}))
            .unwrap()
            .script(json!({"source": "ctx._source.a += 1"}))
            .unwrap();
        let req: EsRequest = request.into();
        let body: Value = serde_json::from_str(&req.body_json().unwrap().unwrap()).unwrap();
        assert_eq!(body["upsert"], json!({"a": 0}));
        assert_eq!(body["script"]["source"], "ctx._source.a += 1");
    }
}
