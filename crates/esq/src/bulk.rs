//! 📋 Bulk — many operations, one flight, individual landings.
//!
//! 🎬 COLD OPEN — INT. ELASTICSEARCH CLUSTER — BULK ENDPOINT — HIGH NOON
//!
//! The bulk API has rules. Rule 1: two lines per operation — action metadata,
//! then document source. Always. (Delete is excused: it travels light, one
//! line, no luggage.) Rule 2: newline-delimited. Not comma-separated. Not
//! XML. NEWLINES. Rule 3: the trailing newline on the whole body matters.
//! It MATTERS. Three engineers lost weekends to this. Their families miss them.
//!
//! 🧠 Knowledge graph:
//! - `BulkRequest` holds an ORDERED `Vec<EsRequest>` — order becomes line
//!   order becomes response-item order. Order is the contract.
//! - The NDJSON body is assembled lazily at execute time from each member's
//!   action metadata + single-line source.
//! - `BulkResponse` decodes the `items` array back into N positionally
//!   aligned `BulkItem`s and refuses to proceed if N doesn't match.
//! - Per-item failures are DATA (`has_errors()` + `error_summary()`), not
//!   errors — a batch where 3 of 100 items failed still delivered 97.
//!
//! 🦆 When the singularity happens, the bulk API will still require the
//! trailing newline. Some things transcend consciousness.

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::EsClient;
use crate::error::{EsError, EsResult};
use crate::requests::{Body, EsRequest, RequestKind};
use crate::response::EsResponse;

/// 🔄 When should the cluster make these writes visible to readers?
///
/// - `None` — whenever it gets around to it (the default, and the fast one)
/// - `Immediate` — refresh now; great for tests, rude to production clusters
/// - `WaitFor` — don't answer until a refresh has happened naturally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refresh {
    #[default]
    None,
    Immediate,
    WaitFor,
}

impl Refresh {
    fn as_param(self) -> Option<&'static str> {
        match self {
            Refresh::None => None,
            Refresh::Immediate => Some("true"),
            Refresh::WaitFor => Some("wait_for"),
        }
    }
}

/// 📋 An ordered batch of index/update/delete operations, shipped as one
/// `POST /_bulk` and answered item by item.
#[derive(Debug)]
pub struct BulkRequest {
    client: EsClient,
    ops: Vec<EsRequest>,
    refresh: Refresh,
    debug: bool,
    retries: u32,
}

impl BulkRequest {
    pub(crate) fn new(client: EsClient) -> Self {
        Self {
            client,
            ops: Vec::new(),
            refresh: Refresh::None,
            debug: false,
            retries: 0,
        }
    }

    /// ➕ Append a prepared index/update/delete request to the batch.
    /// Position in, position out — the response item for this op will sit at
    /// the same offset you just added it at.
    pub fn add(&mut self, op: impl Into<EsRequest>) -> &mut Self {
        self.ops.push(op.into());
        self
    }

    pub fn set_refresh(&mut self, refresh: Refresh) -> &mut Self {
        self.refresh = refresh;
        self
    }

    /// 🐛 Log the rendered payload and the raw response at debug level.
    /// For when the cluster says 400 and you want to see EXACTLY what we said first.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    pub fn set_retries(&mut self, retries: u32) -> &mut Self {
        self.retries = retries;
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// 🏗️ Render the NDJSON body: for each op, one action line, then (except
    /// delete) exactly one source line. Trailing `\n` included — the bulk API
    /// requires it. Ancient proverb: "He who omits the trailing newline,
    /// debugs at 3am."
    pub fn payload(&self) -> EsResult<String> {
        // 🧮 Pre-allocate on vibes: ~96 bytes of action metadata per op plus
        // whatever the sources weigh. Usually close enough.
        let mut payload = String::with_capacity(self.ops.len() * 96);
        for op in &self.ops {
            let name = op.kind.bulk_op_name().ok_or_else(|| {
                EsError::config(format!(
                    "a {:?} request cannot ride in a bulk batch — only index/update/delete board here",
                    op.kind
                ))
            })?;
            // 🔍 Same preconditions as a solo flight — checked per member,
            // before the batch gets anywhere near the wire.
            op.kind.validate(op)?;

            // 🏗️ Action metadata — the cover letter for each operation.
            // Missing fields are omitted, not set to null; the cluster treats
            // absent as "figure it out yourself".
            let mut meta = Map::new();
            if let Some(ref index) = op.index {
                meta.insert("_index".to_string(), Value::String(index.clone()));
            }
            if let Some(ref doc_type) = op.doc_type {
                meta.insert("_type".to_string(), Value::String(doc_type.clone()));
            }
            if let Some(ref id) = op.id {
                meta.insert("_id".to_string(), Value::String(id.clone()));
            }
            if let Some(routing) = op.params.get("routing") {
                meta.insert("routing".to_string(), Value::String(routing.clone()));
            }
            let mut envelope = Map::new();
            envelope.insert(name.to_string(), Value::Object(meta));
            let action =
                serde_json::to_string(&Value::Object(envelope)).map_err(EsError::Serialization)?;
            payload.push_str(&action);
            payload.push('\n');

            // 📦 The source line. Delete travels without one; everyone else
            // must check a bag.
            if name != "delete" {
                let line = op.body_json_single_line()?.ok_or_else(|| {
                    EsError::config(format!("bulk {name} op has no document body"))
                })?;
                payload.push_str(&line);
                payload.push('\n');
            }
        }
        Ok(payload)
    }

    /// 🚀 Ship the batch. An empty batch is a polite no-op: empty response,
    /// zero errors, zero network calls, zero judgment.
    pub async fn execute(self) -> EsResult<BulkResponse> {
        if self.ops.is_empty() {
            debug!("📋 bulk batch is empty — declaring victory without leaving the house");
            return Ok(BulkResponse::empty());
        }
        let submitted = self.ops.len();
        let payload = self.payload()?;
        if self.debug {
            debug!("📋 bulk payload ({} ops):\n{}", submitted, payload);
        }

        let mut req = EsRequest::new(RequestKind::Bulk, None, None, None);
        if let Some(refresh) = self.refresh.as_param() {
            req.param("refresh", refresh);
        }
        req.set_retries(self.retries);
        req.body = Some(Body::Ndjson(payload));

        let resp = self.client.execute(req).await?;
        if self.debug {
            debug!("📋 raw bulk response: {}", resp.body());
        }
        BulkResponse::decode(&resp, submitted)
    }
}

/// 🎯 One operation's individual landing report.
#[derive(Debug, Clone)]
pub struct BulkItem {
    /// The action name this item answered to: "index", "update" or "delete".
    pub op: String,
    pub index: Option<String>,
    pub id: Option<String>,
    pub status: u16,
    /// The server's error object for this item, if it crashed on landing.
    pub error: Option<Value>,
}

impl BulkItem {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// 💬 `[error_type] reason`, or the raw error blob if the shape is exotic.
    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(|e| {
            match (e["type"].as_str(), e["reason"].as_str()) {
                (Some(kind), Some(reason)) => format!("[{kind}] {reason}"),
                _ => e.to_string(),
            }
        })
    }
}

/// 📬 The batch's answer: N items, positionally aligned with the N submitted ops.
#[derive(Debug, Clone)]
pub struct BulkResponse {
    items: Vec<BulkItem>,
}

impl BulkResponse {
    pub(crate) fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// 🔄 Decode the `items` array. 💀 If the server returns a different item
    /// count than we submitted, positional alignment is broken and every
    /// per-item conclusion would be a lie — so we refuse, loudly.
    pub(crate) fn decode(resp: &EsResponse, submitted: usize) -> EsResult<Self> {
        let body = resp.json()?;
        let items = body["items"]
            .as_array()
            .ok_or_else(|| EsError::parse("bulk response has no items array"))?;
        if items.len() != submitted {
            return Err(EsError::parse(format!(
                "bulk response carries {} items for {} submitted ops — positional alignment is broken",
                items.len(),
                submitted
            )));
        }
        let mut decoded = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            // Each item is a single-key object: {"index": {…}} / {"update": {…}} / …
            let (op, detail) = item
                .as_object()
                .and_then(|o| o.iter().next())
                .ok_or_else(|| {
                    EsError::parse(format!("bulk item #{position} is not an op-keyed object"))
                })?;
            decoded.push(BulkItem {
                op: op.clone(),
                index: detail["_index"].as_str().map(str::to_string),
                id: detail["_id"].as_str().map(str::to_string),
                status: detail["status"].as_u64().unwrap_or(0) as u16,
                error: detail.get("error").filter(|e| !e.is_null()).cloned(),
            });
        }
        Ok(Self { items: decoded })
    }

    pub fn items(&self) -> &[BulkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True iff at least one item carries an error. False for an all-success
    /// batch — including the empty one, which succeeded at doing nothing.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| item.error.is_some())
    }

    /// 💬 ALL the failures, enumerated — not just the first. Bulk failures are
    /// partial by nature; "something failed" without WHICH items is a
    /// postmortem with the names redacted.
    pub fn error_summary(&self) -> Option<String> {
        let failures: Vec<String> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| {
                item.error_text().map(|text| {
                    format!(
                        "#{position} {} id={}: {}",
                        item.op,
                        item.id.as_deref().unwrap_or("<auto>"),
                        text
                    )
                })
            })
            .collect();
        if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EsConfig;
    use serde_json::json;
    use wiremock::matchers::{any, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(url: &str) -> EsClient {
        EsClient::new(EsConfig {
            url: url.to_string(),
            ..EsConfig::default()
        })
        .unwrap()
    }

    fn offline_client() -> EsClient {
        client_for("http://localhost:9200")
    }

    /// 🔧 One of each op flavor, in a fixed order: index, update, delete.
    fn three_op_batch(client: &EsClient) -> BulkRequest {
        let mut bulk = client.prepare_bulk();
        bulk.add(
            client
                .prepare_index("people", "person")
                .id("s_0")
                .source_map([("k".to_string(), json!("0"))].into_iter().collect())
                .unwrap(),
        );
        bulk.add(
            client
                .prepare_update("people", "person")
                .id("s_1")
                .doc(json!({"k": "1"}))
                .unwrap(),
        );
        bulk.add(client.prepare_delete("people", "person").id("s_2"));
        bulk
    }

    fn items_response(items: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "took": 7,
            "errors": false,
            "items": items
        }))
    }

    #[test]
    fn the_one_where_three_ops_render_as_five_sacred_lines() {
        // 🧪 index (2 lines) + update (2 lines) + delete (1 line) = 5 lines,
        // plus the trailing newline that MATTERS.
        let client = offline_client();
        let payload = three_op_batch(&client).payload().unwrap();
        assert!(payload.ends_with('\n'), "the trailing newline is not optional");
        let lines: Vec<&str> = payload.trim_end_matches('\n').split('\n').collect();
        assert_eq!(lines.len(), 5);

        let index_action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(index_action["index"]["_index"], "people");
        assert_eq!(index_action["index"]["_id"], "s_0");
        let index_source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(index_source, json!({"k": "0"}));

        let update_action: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(update_action["update"]["_id"], "s_1");
        let update_source: Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(update_source["doc"], json!({"k": "1"}));

        // 🗑️ delete rides alone — one action line, zero source lines
        let delete_action: Value = serde_json::from_str(lines[4]).unwrap();
        assert_eq!(delete_action["delete"]["_id"], "s_2");
    }

    #[test]
    fn the_one_where_a_search_tries_to_board_the_bulk_and_is_escorted_out() {
        let client = offline_client();
        let mut bulk = client.prepare_bulk();
        let search: EsRequest =
            EsRequest::new(RequestKind::Search, Some("idx".into()), None, None);
        bulk.add(search);
        let err = bulk.payload().expect_err("search is not a bulk op");
        assert!(matches!(err, EsError::Config(_)));
    }

    #[tokio::test]
    async fn the_one_where_an_empty_batch_is_a_polite_no_op() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0) // -- zero network calls; that's the decision, and it's tested
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let resp = client.prepare_bulk().execute().await.unwrap();
        assert!(resp.is_empty());
        assert!(!resp.has_errors());
        assert!(resp.error_summary().is_none());
    }

    #[tokio::test]
    async fn the_one_where_n_ops_in_means_n_items_out_in_the_same_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Type", "application/x-ndjson"))
            .respond_with(items_response(json!([
                {"index":  {"_index": "people", "_id": "s_0", "status": 201}},
                {"update": {"_index": "people", "_id": "s_1", "status": 200}},
                {"delete": {"_index": "people", "_id": "s_2", "status": 200}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let resp = three_op_batch(&client).execute().await.unwrap();

        assert_eq!(resp.len(), 3);
        assert!(!resp.has_errors());
        // 🎯 positional alignment: same order we added them in
        let ops: Vec<&str> = resp.items().iter().map(|i| i.op.as_str()).collect();
        assert_eq!(ops, ["index", "update", "delete"]);
        let ids: Vec<_> = resp.items().iter().map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, [Some("s_0"), Some("s_1"), Some("s_2")]);
    }

    #[tokio::test]
    async fn the_one_where_one_bad_apple_flags_the_batch_but_names_every_apple() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(items_response(json!([
                {"index": {"_id": "s_0", "status": 201}},
                {"update": {"_id": "s_1", "status": 409, "error":
                    {"type": "version_conflict_engine_exception", "reason": "someone got there first"}}},
                {"delete": {"_id": "s_2", "status": 404, "error":
                    {"type": "not_found", "reason": "already gone"}}}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let resp = three_op_batch(&client).execute().await.unwrap();

        assert!(resp.has_errors());
        assert!(resp.items()[0].is_ok(), "the successful item stays successful");
        let summary = resp.error_summary().expect("failures must be enumerable");
        // 💬 BOTH failures appear, with positions and ids — not just the first
        assert!(summary.contains("#1 update id=s_1"), "summary: {summary}");
        assert!(summary.contains("someone got there first"));
        assert!(summary.contains("#2 delete id=s_2"), "summary: {summary}");
        assert!(summary.contains("already gone"));
    }

    #[tokio::test]
    async fn the_one_where_refresh_wait_for_rides_the_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(query_param("refresh", "wait_for"))
            .respond_with(items_response(json!([
                {"index": {"_id": "s_0", "status": 201}},
                {"update": {"_id": "s_1", "status": 200}},
                {"delete": {"_id": "s_2", "status": 200}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let mut bulk = three_op_batch(&client);
        bulk.set_refresh(Refresh::WaitFor).set_debug(true);
        let resp = bulk.execute().await.unwrap();
        assert!(!resp.has_errors());
    }

    #[tokio::test]
    async fn the_one_where_big_payloads_travel_squished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Encoding", "gzip"))
            .respond_with(items_response(json!([
                {"index": {"_id": "s_0", "status": 201}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = EsClient::new(EsConfig {
            url: server.uri(),
            gzip_bulk_over_bytes: Some(1), // -- everything is "big" today
            ..EsConfig::default()
        })
        .unwrap();
        let mut bulk = client.prepare_bulk();
        bulk.add(
            client
                .prepare_index("people", "person")
                .id("s_0")
                .source_map([("k".to_string(), json!("0"))].into_iter().collect())
                .unwrap(),
        );
        let resp = bulk.execute().await.unwrap();
        assert_eq!(resp.len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_a_hundred_docs_land_and_one_is_immediately_readable() {
        // 🧪 The classic loader handshake: bulk-index 100 docs with
        // refresh=wait_for, then read one straight back by id.
        let server = MockServer::start().await;
        let items: Vec<Value> = (0..100)
            .map(|i| json!({"index": {"_index": "fresh", "_id": format!("s_{i}"), "status": 201}}))
            .collect();
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(query_param("refresh", "wait_for"))
            .respond_with(items_response(json!(items)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fresh/simple/s_22"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": true,
                "_source": {"k": "22"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let mut bulk = client.prepare_bulk();
        for i in 0..100 {
            bulk.add(
                client
                    .prepare_index("fresh", "simple")
                    .id(format!("s_{i}"))
                    .source_map([("k".to_string(), json!(i.to_string()))].into_iter().collect())
                    .unwrap(),
            );
        }
        bulk.set_refresh(Refresh::WaitFor);
        let resp = bulk.execute().await.unwrap();
        assert_eq!(resp.len(), 100);
        assert!(!resp.has_errors(), "{:?}", resp.error_summary());

        let got = client.get_doc("fresh", "simple", "s_22").await.unwrap();
        assert_eq!(got, Some(json!({"k": "22"})), "the write is visible, as promised");
    }

    #[tokio::test]
    async fn the_one_where_a_miscounted_response_is_rejected_whole() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(items_response(json!([
                {"index": {"_id": "s_0", "status": 201}}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = three_op_batch(&client)
            .execute()
            .await
            .expect_err("1 item for 3 ops is not alignment, it's abstract art");
        assert!(matches!(err, EsError::Parse(_)));
    }
}
