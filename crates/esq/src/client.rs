//! 📡 EsClient + the dispatcher — where requests stop being values and start being I/O.
//!
//! 🎬 *[a request arrives, fully validated. the url assembles itself, segment by
//! percent-encoded segment. somewhere, a connection pool stirs.]*
//!
//! 🧠 Knowledge graph:
//! - `EsClient` = one `reqwest::Client` (pooled, shared) + one `Arc<EsConfig>`.
//!   Cheap to clone — clone freely, share read-mostly, never lock.
//! - `prepare_*` factories are the ONLY way requests get born. Explicit
//!   dependency injection: you hold the client, you pass the client. There is
//!   no global registry and there never will be. We've seen where that leads.
//! - Dispatch pipeline: validate → build url → render body → send (with
//!   retries) → unwrap. Each step can refuse; refusals before `send` never
//!   touch the network.
//! - Retries reissue the IDENTICAL request on the same task, transport
//!   failures only. An error *response* is an answer; we don't argue with answers.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use flate2::{Compression, write::GzEncoder};
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::bulk::BulkRequest;
use crate::config::EsConfig;
use crate::error::{EsError, EsResult};
use crate::requests::{
    Body, DeleteRequest, EsRequest, GetRequest, IndexRequest, SearchRequest, UpdateRequest,
};
use crate::response::EsResponse;

const CONTENT_TYPE_JSON: &str = "application/json";
// ⚠️ application/x-ndjson, not application/json — VERY important for /_bulk.
// The cluster will return a 406 or silently misbehave without it.
// The x- prefix means "we made this up but we're committing to it." Classic.
const CONTENT_TYPE_NDJSON: &str = "application/x-ndjson";

/// 📡 The client: one per cluster, cloned everywhere, owned by no one in particular.
///
/// Holds the HTTP muscle 💪 (reused across requests — reqwest pools connections
/// internally) and the config. All request builders borrow nothing: they carry
/// a clone, which is two `Arc` bumps and a vibe.
#[derive(Debug, Clone)]
pub struct EsClient {
    http: reqwest::Client,
    config: Arc<EsConfig>,
}

impl EsClient {
    /// 🚀 Stand up a client from config. Builds the `reqwest::Client` with the
    /// configured timeouts. Like a polite person — we will wait, but not forever.
    ///
    /// 💀 Fails only if the HTTP client refuses to be born (cursed TLS stack,
    /// grieving OpenSSL). No network is touched here; use [`EsClient::ping`]
    /// when you want proof of life from the cluster.
    pub fn new(config: EsConfig) -> EsResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                EsError::config(format!(
                    "💀 the HTTP client refused to be born (probably a TLS stack problem): {e}"
                ))
            })?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EsConfig {
        &self.config
    }

    // ===== Factories — requests are born here and nowhere else =====

    /// 📦 Prepare an index (create/overwrite) request. Add `.id(…)` for PUT
    /// semantics; leave it off and the cluster invents an id (POST, YOLO mode).
    pub fn prepare_index(
        &self,
        index: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> IndexRequest {
        IndexRequest::new(self.clone(), index.into(), doc_type.into())
    }

    /// 🔄 Prepare a partial-update request. Needs `.id(…)` before execute —
    /// the validator will remind you, loudly, before any network happens.
    pub fn prepare_update(
        &self,
        index: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> UpdateRequest {
        UpdateRequest::new(self.clone(), index.into(), doc_type.into())
    }

    /// 🗑️ Prepare a delete request. Needs `.id(…)` too.
    pub fn prepare_delete(
        &self,
        index: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> DeleteRequest {
        DeleteRequest::new(self.clone(), index.into(), doc_type.into())
    }

    /// 📄 Prepare a get-by-id request.
    pub fn prepare_get(
        &self,
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> GetRequest {
        GetRequest::new(self.clone(), index.into(), doc_type.into(), id.into())
    }

    /// 🔍 Prepare a search against one index. ONE index — multi-index search
    /// is a different sport and this client doesn't play it.
    pub fn prepare_search(&self, index: impl Into<String>) -> SearchRequest {
        SearchRequest::new(self.clone(), index.into())
    }

    /// 📋 Prepare an empty bulk batch. Feed it index/update/delete requests.
    pub fn prepare_bulk(&self) -> BulkRequest {
        BulkRequest::new(self.clone())
    }

    // ===== Convenience calls =====

    /// 📡 Connectivity ping — "Hello? Is this thing on?" Hits the cluster root
    /// and returns its info blob. Fail loudly here, rather than quietly
    /// 50,000 documents later.
    pub async fn ping(&self) -> EsResult<Value> {
        let request = self.apply_auth(self.http.get(self.config.url.trim_end_matches('/')));
        let response = request.send().await.map_err(|e| EsError::Transport {
            attempts: 1,
            source: e,
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| EsError::Transport {
            attempts: 1,
            source: e,
        })?;
        let resp = EsResponse::new(status, body);
        if !resp.is_success() {
            return Err(EsError::Api {
                status: resp.status(),
                reason: resp.error_reason(),
            });
        }
        resp.json()
    }

    /// 📄 Fetch one document's `_source` by id. `Ok(None)` when the document
    /// simply isn't there — absence is data, not an error.
    pub async fn get_doc(
        &self,
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> EsResult<Option<Value>> {
        let resp = self.prepare_get(index, doc_type, id).execute().await?;
        if resp.status() == 404 {
            return Ok(None);
        }
        if !resp.is_success() {
            return Err(EsError::Api {
                status: resp.status(),
                reason: resp.error_reason(),
            });
        }
        let json = resp.json()?;
        if json["found"].as_bool() == Some(true) {
            Ok(Some(json["_source"].clone()))
        } else {
            Ok(None)
        }
    }

    // ===== The dispatcher =====

    /// 🚀 Execute one request: validate → url → body → send-with-retries → unwrap.
    ///
    /// Consumes the request — one value, one flight. Idempotent re-execution
    /// is the caller's game to play, with a fresh builder.
    pub(crate) async fn execute(&self, req: EsRequest) -> EsResult<EsResponse> {
        // 🔍 Precondition check FIRST. A missing id is a bug in the caller,
        // and bugs in the caller do not deserve network latency.
        req.kind.validate(&req)?;

        let url = self.build_url(&req)?;
        let method = req.kind.http_method(&req);
        let payload = self.render_payload(&req)?;

        debug!(
            "📡 {} {} ({} byte body)",
            method,
            url,
            payload.as_ref().map(|p| p.bytes.len()).unwrap_or(0)
        );

        // 🔄 The retry loop. Transport failures only — a dead socket gets
        // `retries` more chances; an unflattering HTTP status gets zero.
        // Same task, same request, no implicit backoff. Callers wanting
        // backoff layer it on top; we don't guess at their patience.
        let mut attempt: u32 = 0;
        let resp = loop {
            attempt += 1;
            match self.send_once(&method, &url, payload.as_ref()).await {
                Ok(resp) => break resp,
                Err(e) if attempt <= req.retries => {
                    warn!(
                        "⚠️ attempt {}/{} failed in transit, going again: {}",
                        attempt,
                        req.retries + 1,
                        e
                    );
                }
                Err(e) => {
                    return Err(EsError::Transport {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        };

        trace!("🚀 {} {} → {}", method, url, resp.status());
        req.kind.unwrap_response(resp)
    }

    /// 📬 One wire round-trip. Everything in here is retryable territory —
    /// including a connection that dies halfway through reading the body.
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&WirePayload>,
    ) -> Result<EsResponse, reqwest::Error> {
        let mut request = self.http.request(method.clone(), url.clone());
        request = self.apply_auth(request);
        if let Some(p) = payload {
            request = request.header("Content-Type", p.content_type);
            if p.gzipped {
                request = request.header("Content-Encoding", "gzip");
            }
            request = request.body(p.bytes.clone());
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(EsResponse::new(status, body))
    }

    /// 🔒 Auth priority: API key wins over basic auth. This is not a democracy.
    /// This is an Elasticsearch cluster and api_key is the premium tier.
    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }

    /// 📡 `<server>/<index>/<type>/<id>/<endpoint>`, omitting absent segments.
    ///
    /// Each segment rides through `path_segments_mut().push()` on its own, so
    /// each gets percent-encoded independently — an id of `a/b` becomes
    /// `a%2Fb` in the path instead of becoming two segments and a very
    /// confusing 404. Endpoint literals like `_search/scroll` are OUR slashes
    /// and get split first, so they stay real path separators.
    pub(crate) fn build_url(&self, req: &EsRequest) -> EsResult<Url> {
        let base = self.config.url.trim_end_matches('/');
        let mut url = Url::parse(base)
            .map_err(|e| EsError::config(format!("bad server url '{base}': {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| EsError::config(format!("server url '{base}' cannot carry a path")))?;
            segments.pop_if_empty();
            for segment in [&req.index, &req.doc_type, &req.id].into_iter().flatten() {
                segments.push(segment);
            }
            if let Some(endpoint) = req.kind.endpoint() {
                for piece in endpoint.split('/') {
                    segments.push(piece);
                }
            }
        }
        if !req.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &req.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// 📦 Resolve the body into wire bytes + content type, by matching the tag.
    ///
    /// NDJSON payloads may additionally get gzipped when the config says large
    /// bodies should travel squished.
    fn render_payload(&self, req: &EsRequest) -> EsResult<Option<WirePayload>> {
        match &req.body {
            None => Ok(None),
            Some(Body::Ndjson(payload)) => {
                let bytes = payload.clone().into_bytes();
                if let Some(threshold) = self.config.gzip_bulk_over_bytes {
                    if bytes.len() >= threshold {
                        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                        let squished = encoder
                            .write_all(&bytes)
                            .and_then(|_| encoder.finish())
                            .map_err(|e| {
                                EsError::config(format!("could not gzip bulk payload: {e}"))
                            })?;
                        trace!(
                            "🫁 bulk payload squished {} → {} bytes",
                            bytes.len(),
                            squished.len()
                        );
                        return Ok(Some(WirePayload {
                            bytes: squished,
                            content_type: CONTENT_TYPE_NDJSON,
                            gzipped: true,
                        }));
                    }
                }
                Ok(Some(WirePayload {
                    bytes,
                    content_type: CONTENT_TYPE_NDJSON,
                    gzipped: false,
                }))
            }
            // RawJson and Structured both resolve through body_json(), which is
            // where the round-trip integrity check lives.
            Some(Body::RawJson(_)) | Some(Body::Structured(_)) => {
                let json = req.body_json()?.unwrap_or_default();
                Ok(Some(WirePayload {
                    bytes: json.into_bytes(),
                    content_type: CONTENT_TYPE_JSON,
                    gzipped: false,
                }))
            }
        }
    }
}

/// 📬 A body ready for the wire: bytes, label, and whether it's been squished.
#[derive(Debug)]
struct WirePayload {
    bytes: Vec<u8>,
    content_type: &'static str,
    gzipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::RequestKind;
    use serde_json::json;
    use wiremock::matchers::{any, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(url: &str) -> EsClient {
        EsClient::new(EsConfig {
            url: url.to_string(),
            ..EsConfig::default()
        })
        .expect("💀 client construction should not fail in tests")
    }

    #[tokio::test]
    async fn the_one_where_update_without_id_never_dials_the_network() {
        let server = MockServer::start().await;
        // 🧪 A tripwire mock: ANY request at all trips the .expect(0) below.
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .prepare_update("people", "person")
            // -- no .id(…) — that's the whole point
            .doc(json!({"name": "Becca"}))
            .expect("setting the doc is fine")
            .execute()
            .await
            .expect_err("💀 a config error, surfaced BEFORE any network call");
        assert!(matches!(err, EsError::Config(_)), "got: {err:?}");
        // server verifies zero invocations on drop
    }

    #[test]
    fn the_one_where_path_segments_get_percent_encoded_independently() {
        let client = client_for("http://localhost:9200");
        let req = EsRequest::new(
            RequestKind::Get,
            Some("my-index".into()),
            Some("doc".into()),
            Some("weird id/ü".into()),
        );
        let url = client.build_url(&req).unwrap();
        assert_eq!(url.path(), "/my-index/doc/weird%20id%2F%C3%BC");
    }

    #[test]
    fn the_one_where_the_endpoint_keeps_its_own_slashes() {
        let client = client_for("http://localhost:9200/");
        let req = EsRequest::new(RequestKind::ScrollContinue, None, None, None);
        let url = client.build_url(&req).unwrap();
        assert_eq!(url.path(), "/_search/scroll");
    }

    #[tokio::test]
    async fn the_one_where_a_dead_socket_exhausts_its_retry_budget() {
        // 🧪 Start a server, memorize its address, then let it die.
        // Connection refused, guaranteed, no flakiness, no waiting.
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let client = client_for(&uri);
        let err = client
            .prepare_get("idx", "doc", "1")
            .retries(2)
            .execute()
            .await
            .expect_err("💀 nobody is listening on that port anymore");
        match err {
            EsError::Transport { attempts, .. } => {
                assert_eq!(attempts, 3, "1 original try + 2 retries = 3 attempts")
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_one_where_a_500_is_an_answer_not_an_invitation_to_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idx/doc/1/_update"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string(r#"{"error":{"reason":"shard having a rough morning"}}"#),
            )
            .expect(1) // -- exactly one call; retries would trip this
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .prepare_update("idx", "doc")
            .id("1")
            .doc(json!({"k": "v"}))
            .unwrap()
            .retries(3)
            .execute()
            .await
            .expect_err("a 500 is an application error");
        match err {
            EsError::Api { status, reason } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "shard having a rough morning");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_one_where_get_doc_finds_the_goods() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/people/person/s_22"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": true,
                "_source": {"k": "22"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let doc = client.get_doc("people", "person", "s_22").await.unwrap();
        assert_eq!(doc, Some(json!({"k": "22"})));
    }

    #[tokio::test]
    async fn the_one_where_get_doc_shrugs_at_a_missing_doc() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"found": false})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let doc = client.get_doc("people", "person", "ghost").await.unwrap();
        assert!(doc.is_none(), "absence is data, not an error");
    }

    #[tokio::test]
    async fn the_one_where_api_key_outranks_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "ApiKey sekrit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"found": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = EsClient::new(EsConfig {
            url: server.uri(),
            username: Some("elastic".into()),
            password: Some("hunter2".into()),
            api_key: Some("sekrit".into()),
            ..EsConfig::default()
        })
        .unwrap();
        client.get_doc("idx", "doc", "1").await.unwrap();
    }

    #[tokio::test]
    async fn the_one_where_index_goes_put_when_an_id_is_given() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/idx/doc/42"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"result": "created"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let resp = client
            .prepare_index("idx", "doc")
            .id("42")
            .source_map([("one".to_string(), json!("a"))].into_iter().collect())
            .unwrap()
            .execute()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    #[tokio::test]
    async fn the_one_where_execution_happens_on_a_detached_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"found": false})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        // 🚀 fire on the pool, keep the handle — the cancellable-future contract
        let handle = client.prepare_get("idx", "doc", "1").execute_spawned();
        let resp = handle.await.expect("task not aborted").unwrap();
        assert_eq!(resp.status(), 200);
    }
}
